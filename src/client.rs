//! Backend-agnostic Prometheus client.
//!
//! [`PrometheusClient::connect`] turns a [`PrometheusConfig`] into a ready client: it builds the
//! pooled transport, merges the derived authorization headers into the static header set, picks
//! the [`Authorizer`] for the backend (SigV4 for AWS, Azure bearer tokens, static headers
//! otherwise), and parses the configured query-string suffix into parameters sent with every
//! request. Query operations live in the submodules.

pub mod common;

mod flags;
mod query;

pub use common::*;
pub use flags::*;

// crates.io
use reqwest::header::HeaderMap;
// self
use crate::{
	_prelude::*,
	api::PrometheusApi,
	auth::{self, Authorizer, header},
	config::PrometheusConfig,
	http::ReqwestHttpClient,
};

/// Client bound to one backend.
#[derive(Clone)]
pub struct PrometheusClient {
	/// Effective config, including the merged authorization headers.
	pub config: PrometheusConfig,
	/// Pooled transport shared by every request.
	pub http: ReqwestHttpClient,
	/// Authorizer applied to every request.
	pub authorizer: Arc<dyn Authorizer>,
	headers: HeaderMap,
	base_params: Vec<(String, String)>,
}
impl PrometheusClient {
	/// Builds a client with a pooled transport derived from the config.
	pub async fn connect(config: PrometheusConfig) -> Result<Self> {
		let http = ReqwestHttpClient::pooled(config.disable_ssl)?;

		Self::connect_with(config, http).await
	}

	/// Builds a client over a caller-provided transport.
	pub async fn connect_with(config: PrometheusConfig, http: ReqwestHttpClient) -> Result<Self> {
		config.validate()?;

		let authorizer = auth::authorizer_for(&config, &http).await?;

		Self::with_authorizer(config, http, authorizer)
	}

	/// Builds a client around an explicit authorizer.
	pub fn with_authorizer(
		mut config: PrometheusConfig,
		http: ReqwestHttpClient,
		authorizer: Arc<dyn Authorizer>,
	) -> Result<Self> {
		let derived = auth::authorization_headers(&config);

		config.headers.extend(derived);

		let headers = header::header_map(&config.headers)?;
		let base_params = config
			.prometheus_url_query_string
			.as_deref()
			.map(parse_query_string)
			.unwrap_or_default();

		Ok(Self { config, http, authorizer, headers, base_params })
	}

	/// Base URL without a trailing slash, as used in error messages.
	pub fn url(&self) -> &str {
		self.config.url.as_str().trim_end_matches('/')
	}

	/// Parameters appended to every request.
	pub fn base_params(&self) -> &[(String, String)] {
		&self.base_params
	}

	/// Checks whether the backend exposes a capability.
	pub fn supports(&self, api: PrometheusApi) -> bool {
		self.config.supports(api)
	}

	fn require(&self, api: PrometheusApi) -> Result<()> {
		if self.supports(api) { Ok(()) } else { Err(Error::UnsupportedApi { api }) }
	}
}
impl Debug for PrometheusClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PrometheusClient")
			.field("url", &self.config.url.as_str())
			.field("backend", &self.config.backend.as_str())
			.field("apis", &self.config.apis())
			.field("base_params", &self.base_params.len())
			.finish()
	}
}

/// Parses a query string into ordered pairs, keeping repeated keys and blank values.
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
	url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
		.map(|(key, value)| (key.into_owned(), value.into_owned()))
		.collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{connect_test_client, prometheus_config},
		config::{Backend, CoralogixConfig},
	};

	#[test]
	fn query_strings_keep_repeats_and_blanks() {
		assert_eq!(
			parse_query_string("?tenant=a&tenant=b&debug=&x=1%202"),
			vec![
				("tenant".to_owned(), "a".to_owned()),
				("tenant".to_owned(), "b".to_owned()),
				("debug".to_owned(), String::new()),
				("x".to_owned(), "1 2".to_owned()),
			]
		);
		assert!(parse_query_string("").is_empty());
	}

	#[tokio::test]
	async fn connect_merges_authorization_headers() {
		let config = PrometheusConfig::builder(
			Url::parse("https://prom.coralogix.example/").expect("URL fixture should parse."),
			Backend::Coralogix(CoralogixConfig { prometheus_token: "cx-token".into() }),
		)
		.url_query_string("region=eu")
		.build()
		.expect("Coralogix config should build.");
		let client = PrometheusClient::connect(config).await.expect("Client should connect.");

		assert_eq!(client.config.headers.get("token").map(String::as_str), Some("cx-token"));
		assert_eq!(client.url(), "https://prom.coralogix.example");
		assert_eq!(client.base_params(), &[("region".to_owned(), "eu".to_owned())]);
		assert!(matches!(
			client.require(PrometheusApi::Flags),
			Err(Error::UnsupportedApi { api: PrometheusApi::Flags })
		));
		assert!(!format!("{client:?}").contains("cx-token"));
	}

	#[tokio::test]
	async fn endpoints_keep_base_path_prefix() {
		let client = connect_test_client(
			prometheus_config("http://vmselect:8481/select/0/prometheus/")
				.build()
				.expect("Prefixed config should build."),
		)
		.await;

		assert_eq!(
			client.endpoint("/api/v1/query").as_str(),
			"http://vmselect:8481/select/0/prometheus/api/v1/query"
		);
		assert_eq!(client.url(), "http://vmselect:8481/select/0/prometheus");
	}
}
