// crates.io
use httpmock::prelude::*;
use serde_json::Value;
use time::OffsetDateTime;
use url::Url;
// self
use prometrix::{
	api::PrometheusApi,
	client::PrometheusClient,
	config::{Backend, CoralogixConfig, PrometheusConfig},
	error::{ApiError, Error},
	result::QueryResult,
};

const VECTOR_BODY: &str = r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"__name__":"up","job":"node"},"value":[1700000000.5,"1"]}]}}"#;
const MATRIX_BODY: &str = r#"{"status":"success","data":{"resultType":"matrix","result":[{"metric":{"pod":"api-0"},"values":[[1700000000,"10"],[1700000300,"12"]]}]}}"#;

fn config(server: &MockServer, backend: Backend) -> PrometheusConfig {
	let url = Url::parse(&server.url("/")).expect("Mock server URL should parse.");

	PrometheusConfig::builder(url, backend).build().expect("Mock backend config should build.")
}

async fn connect(config: PrometheusConfig) -> PrometheusClient {
	PrometheusClient::connect(config).await.expect("Client should connect to the mock backend.")
}

#[tokio::test]
async fn instant_query_sends_base_params_and_maps_vectors() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v1/query")
				.query_param("tenant", "team-a")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(VECTOR_BODY);
		})
		.await;
	let url = Url::parse(&server.url("/")).expect("Mock server URL should parse.");
	let config = PrometheusConfig::builder(url, Backend::Prometheus)
		.url_query_string("tenant=team-a")
		.build()
		.expect("Config with a query string should build.");
	let client = connect(config).await;
	let result = client.query("up", &[("time", "1700000000")]).await.expect("Query should succeed.");
	let samples = result.as_vector().expect("Instant query should yield a vector.");

	assert_eq!(samples.len(), 1);
	assert_eq!(samples[0].metric.get("job").map(String::as_str), Some("node"));
	assert_eq!(samples[0].value.value, "1");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn range_query_maps_matrix_series() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/query_range");
			then.status(200).header("content-type", "application/json").body(MATRIX_BODY);
		})
		.await;
	let client = connect(config(&server, Backend::VictoriaMetrics)).await;
	let end = OffsetDateTime::from_unix_timestamp(1_700_000_300).expect("End instant should be valid.");
	let start = end - time::Duration::minutes(5);
	let result = client
		.query_range("container_memory_working_set_bytes", start, end, "5m", &[])
		.await
		.expect("Range query should succeed.");

	assert_eq!(result.result_type(), "matrix");

	let series = result.as_matrix().expect("Range query should yield a matrix.");

	assert_eq!(series[0].len(), 2);
	assert_eq!(series[0].points().last(), Some((1_700_000_300.0, "12")));

	mock.assert_async().await;
}

#[tokio::test]
async fn query_recent_uses_configured_window() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/query_range");
			then.status(200).header("content-type", "application/json").body(MATRIX_BODY);
		})
		.await;
	let url = Url::parse(&server.url("/")).expect("Mock server URL should parse.");
	let config = PrometheusConfig::builder(url, Backend::Prometheus)
		.query_interval("6h")
		.query_step("1m")
		.build()
		.expect("Config with a custom window should build.");
	let client = connect(config).await;
	let result = client
		.query_recent("container_memory_working_set_bytes")
		.await
		.expect("Recent range query should succeed.")
		.require_samples("container_memory_working_set_bytes")
		.expect("Matrix should carry samples.");

	assert!(matches!(result, QueryResult::Matrix(ref series) if series.len() == 1));

	mock.assert_async().await;
}

#[tokio::test]
async fn envelope_errors_are_reported() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/query");
			then.status(400).header("content-type", "application/json").body(
				r#"{"status":"error","errorType":"bad_data","error":"1:4: parse error: unexpected end of input"}"#,
			);
		})
		.await;
	let client = connect(config(&server, Backend::Prometheus)).await;
	let err = client.query("sum(", &[]).await.expect_err("Bad PromQL should fail.");

	assert!(matches!(
		err,
		Error::Api(ApiError::Envelope { status: Some(400), ref error_type, .. }) if error_type == "bad_data"
	));
	assert_eq!(err.status(), Some(400));
	assert_eq!(
		err.to_string(),
		"HTTP Status Code 400 (bad_data: 1:4: parse error: unexpected end of input)."
	);
}

#[tokio::test]
async fn label_values_and_metric_names_are_listed() {
	let server = MockServer::start_async().await;
	let names = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/label/__name__/values");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"status":"success","data":["node_load1","up"]}"#);
		})
		.await;
	let jobs = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/label/job/values").query_param("start", "1700000000");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"status":"success","data":["node"]}"#);
		})
		.await;
	let client = connect(config(&server, Backend::Prometheus)).await;

	assert_eq!(
		client.all_metrics(&[]).await.expect("Metric names should be listed."),
		vec!["node_load1".to_owned(), "up".to_owned()]
	);
	assert_eq!(
		client.label_values("job", &[("start", "1700000000")]).await.expect("Label values should be listed."),
		vec!["node".to_owned()]
	);

	names.assert_async().await;
	jobs.assert_async().await;
}

#[tokio::test]
async fn series_lookup_returns_label_sets() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/series");
			then.status(200).header("content-type", "application/json").body(
				r#"{"status":"success","data":[{"__name__":"up","job":"node","instance":"a:9100"}]}"#,
			);
		})
		.await;
	let client = connect(config(&server, Backend::Prometheus)).await;
	let series = client.series(&["up"], None, None, &[]).await.expect("Series lookup should succeed.");

	assert_eq!(series.len(), 1);
	assert_eq!(series[0].get("instance").map(String::as_str), Some("a:9100"));

	mock.assert_async().await;
}

#[tokio::test]
async fn unsupported_apis_fail_without_network() {
	let server = MockServer::start_async().await;
	let url = Url::parse(&server.url("/")).expect("Mock server URL should parse.");
	let config = PrometheusConfig::builder(url, Backend::Prometheus)
		.supported_apis([PrometheusApi::Query, PrometheusApi::QueryRange])
		.build()
		.expect("Config with restricted APIs should build.");
	let client = connect(config).await;
	let err = client.label_values("job", &[]).await.expect_err("Labels should be unsupported.");

	assert!(matches!(err, Error::UnsupportedApi { api: PrometheusApi::Labels }));
	assert_eq!(err.to_string(), "Labels Api not supported");
	assert_eq!(client.flags().await.expect("Flag lookup should not fail."), None);
}

#[tokio::test]
async fn prometheus_flags_are_fetched() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/status/flags");
			then.status(200).header("content-type", "application/json").body(
				r#"{"status":"success","data":{"storage.tsdb.retention.time":"15d","web.enable-lifecycle":"false"}}"#,
			);
		})
		.await;
	let client = connect(config(&server, Backend::Prometheus)).await;
	let flags = client
		.flags()
		.await
		.expect("Flags should be fetched.")
		.expect("Prometheus should expose flags.");

	assert_eq!(flags.get("storage.tsdb.retention.time"), Some(&Value::String("15d".into())));

	mock.assert_async().await;
}

#[tokio::test]
async fn victoria_metrics_flags_are_parsed_from_text() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/flags");
			then.status(200)
				.header("content-type", "text/plain")
				.body("-retentionPeriod=\"1y\"\n-search.maxPointsPerTimeseries=\"30000\"\n");
		})
		.await;
	let client = connect(config(&server, Backend::VictoriaMetrics)).await;
	let flags = client
		.flags()
		.await
		.expect("Flags should be fetched.")
		.expect("VictoriaMetrics should expose flags.");

	assert_eq!(flags.get("-retentionPeriod"), Some(&Value::String("1y".into())));
	assert_eq!(flags.len(), 2);

	mock.assert_async().await;
}

#[tokio::test]
async fn flag_failures_name_the_backend_family() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/flags");
			then.status(503).body("unavailable");
		})
		.await;
	let client = connect(config(&server, Backend::VictoriaMetrics)).await;
	let err = client.flags().await.expect_err("Unavailable flag endpoints should fail.");

	match err {
		Error::PrometheusFlagsConnection { service, source, .. } => {
			assert_eq!(service, "Victoria Metrics");
			assert!(matches!(*source, Error::VictoriaMetricsNotFound { .. }));
		},
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn check_connection_reports_unreachable_backends() {
	let server = MockServer::start_async().await;
	let probe = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/query");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"status":"success","data":{"resultType":"scalar","result":[1700000000,"1"]}}"#);
		})
		.await;
	let client = connect(config(&server, Backend::Prometheus)).await;

	client.check_connection(&[]).await.expect("Healthy backend should pass the probe.");
	probe.assert_async().await;

	probe.delete_async().await;

	let _down = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/query");
			then.status(500).body("boom");
		})
		.await;
	let err = client.check_connection(&[]).await.expect_err("Failing backend should fail the probe.");

	assert!(matches!(err, Error::PrometheusNotFound { .. }));
	assert!(err.to_string().starts_with("Couldn't connect to Prometheus found under http://"));
}

#[tokio::test]
async fn coralogix_token_header_is_sent() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/query").header("token", "cx-token");
			then.status(200).header("content-type", "application/json").body(VECTOR_BODY);
		})
		.await;
	let client = connect(config(
		&server,
		Backend::Coralogix(CoralogixConfig { prometheus_token: "cx-token".into() }),
	))
	.await;

	client.query("up", &[]).await.expect("Coralogix query should succeed.");

	mock.assert_async().await;
}

#[tokio::test]
async fn raw_authorization_header_is_sent() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/label/__name__/values")
				.header("authorization", "Basic cHJvbTpwcm9t");
			then.status(200).header("content-type", "application/json").body(r#"{"status":"success","data":[]}"#);
		})
		.await;
	let url = Url::parse(&server.url("/")).expect("Mock server URL should parse.");
	let config = PrometheusConfig::builder(url, Backend::Prometheus)
		.prometheus_auth("Basic cHJvbTpwcm9t")
		.header("X-Scope-OrgID", "tenant-a")
		.build()
		.expect("Config with static auth should build.");
	let client = connect(config).await;

	assert!(client.all_metrics(&[]).await.expect("Label listing should succeed.").is_empty());

	mock.assert_async().await;
}
