//! Runs an instant query and a label listing against a mocked Prometheus, with a tenant
//! parameter carried by the configured query string.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use prometrix::{
	client::PrometheusClient,
	config::{Backend, PrometheusConfig},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let query_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/query").query_param("tenant", "demo");
			then.status(200).header("content-type", "application/json").body(
				r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"__name__":"up","job":"node"},"value":[1700000000,"1"]}]}}"#,
			);
		})
		.await;
	let labels_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/label/job/values");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"status":"success","data":["node","prometheus"]}"#);
		})
		.await;
	let config = PrometheusConfig::builder(Url::parse(&server.url("/"))?, Backend::Prometheus)
		.url_query_string("tenant=demo")
		.build()?;
	let client = PrometheusClient::connect(config).await?;
	let result = client.query("up", &[]).await?;

	for sample in result.as_vector().unwrap_or_default() {
		println!("{:?} => {}", sample.metric, sample.value.value);
	}

	println!("Jobs: {:?}.", client.label_values("job", &[]).await?);

	query_mock.assert_async().await;
	labels_mock.assert_async().await;

	Ok(())
}
