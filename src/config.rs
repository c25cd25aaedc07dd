//! Backend configuration shared by every client.
//!
//! [`PrometheusConfig`] carries the fields every backend understands (URL, TLS toggle, static
//! headers, optional query-string suffix, capability set, default step/interval) and a
//! [`Backend`] discriminant holding the provider-specific credentials. Configs deserialize from
//! any serde format; [`loader`] layers YAML files and `PROMETRIX_*` environment variables.

pub mod backend;
pub mod loader;

pub use backend::*;

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	api::{ApiSet, PrometheusApi},
	auth::Secret,
	error::ConfigError,
};

const DEFAULT_QUERY_STEP: &str = "5m";
const DEFAULT_QUERY_INTERVAL: &str = "1d";

/// Connection settings for a Prometheus-compatible backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrometheusConfig {
	/// Base URL of the backend; API paths are appended to it.
	pub url: Url,
	/// Skips TLS certificate verification when true.
	#[serde(default)]
	pub disable_ssl: bool,
	/// Static headers attached to every request.
	#[serde(default)]
	pub headers: BTreeMap<String, String>,
	/// Raw `Authorization` header value.
	#[serde(default)]
	pub prometheus_auth: Option<Secret>,
	/// Query string merged into the parameters of every request.
	#[serde(default)]
	pub prometheus_url_query_string: Option<String>,
	/// Labels callers attach to the queries they build.
	#[serde(default)]
	pub additional_labels: Option<BTreeMap<String, String>>,
	/// Capability override; falls back to the backend defaults when absent.
	#[serde(default)]
	pub supported_apis: Option<ApiSet>,
	/// Default resolution step for range queries.
	#[serde(default = "default_query_step")]
	pub query_step: String,
	/// Default look-back window for range queries.
	#[serde(default = "default_query_interval")]
	pub query_interval: String,
	/// Backend discriminant plus provider-specific settings.
	#[serde(flatten)]
	pub backend: Backend,
}
impl PrometheusConfig {
	/// Creates a new builder for the provided URL and backend.
	pub fn builder(url: Url, backend: Backend) -> PrometheusConfigBuilder {
		PrometheusConfigBuilder::new(url, backend)
	}

	/// Returns the effective capability set.
	pub fn apis(&self) -> ApiSet {
		self.supported_apis.unwrap_or_else(|| self.backend.default_apis())
	}

	/// Checks whether the backend exposes a capability.
	pub fn supports(&self, api: PrometheusApi) -> bool {
		self.apis().supports(api)
	}

	/// Parses [`Self::query_interval`] as a humantime duration (`1d`, `6h`, `90m`).
	pub fn query_interval(&self) -> Result<StdDuration, ConfigError> {
		humantime::parse_duration(&self.query_interval).map_err(|source| {
			ConfigError::InvalidInterval { value: self.query_interval.clone(), source }
		})
	}

	/// Validates invariants for the config.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !matches!(self.url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { url: self.url.to_string() });
		}
		if self.url.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl { url: self.url.to_string() });
		}
		if self.apis().is_empty() {
			return Err(ConfigError::NoSupportedApis);
		}

		self.query_interval()?;

		Ok(())
	}
}

/// Builder for [`PrometheusConfig`] values.
#[derive(Debug)]
pub struct PrometheusConfigBuilder {
	config: PrometheusConfig,
}
impl PrometheusConfigBuilder {
	/// Creates a new builder seeded with the provided URL and backend.
	pub fn new(url: Url, backend: Backend) -> Self {
		Self {
			config: PrometheusConfig {
				url,
				disable_ssl: false,
				headers: BTreeMap::new(),
				prometheus_auth: None,
				prometheus_url_query_string: None,
				additional_labels: None,
				supported_apis: None,
				query_step: default_query_step(),
				query_interval: default_query_interval(),
				backend,
			},
		}
	}

	/// Disables TLS certificate verification.
	pub fn disable_ssl(mut self, disable: bool) -> Self {
		self.config.disable_ssl = disable;

		self
	}

	/// Adds a static header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.config.headers.insert(name.into(), value.into());

		self
	}

	/// Sets the raw `Authorization` header value.
	pub fn prometheus_auth(mut self, value: impl Into<String>) -> Self {
		self.config.prometheus_auth = Some(Secret::new(value));

		self
	}

	/// Sets the query string appended to every request.
	pub fn url_query_string(mut self, query: impl Into<String>) -> Self {
		self.config.prometheus_url_query_string = Some(query.into());

		self
	}

	/// Adds a label callers attach to their queries.
	pub fn additional_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.config
			.additional_labels
			.get_or_insert_with(BTreeMap::new)
			.insert(name.into(), value.into());

		self
	}

	/// Overrides the backend's default capability set.
	pub fn supported_apis<I>(mut self, apis: I) -> Self
	where
		I: IntoIterator<Item = PrometheusApi>,
	{
		self.config.supported_apis = Some(ApiSet::of(apis));

		self
	}

	/// Overrides the default range-query step.
	pub fn query_step(mut self, step: impl Into<String>) -> Self {
		self.config.query_step = step.into();

		self
	}

	/// Overrides the default look-back window.
	pub fn query_interval(mut self, interval: impl Into<String>) -> Self {
		self.config.query_interval = interval.into();

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<PrometheusConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

fn default_query_step() -> String {
	DEFAULT_QUERY_STEP.into()
}

fn default_query_interval() -> String {
	DEFAULT_QUERY_INTERVAL.into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse config URL fixture.")
	}

	#[test]
	fn builder_applies_backend_defaults() {
		let config = PrometheusConfig::builder(url("http://prometheus:9090"), Backend::Prometheus)
			.build()
			.expect("Plain Prometheus config should build.");

		assert_eq!(config.query_step, "5m");
		assert_eq!(config.query_interval().expect("Default interval should parse.").as_secs(), 86_400);
		assert!(config.supports(PrometheusApi::Flags));
		assert!(!config.supports(PrometheusApi::VmFlags));

		let vm = PrometheusConfig::builder(url("http://vm:8428"), Backend::VictoriaMetrics)
			.build()
			.expect("VictoriaMetrics config should build.");

		assert!(vm.supports(PrometheusApi::VmFlags));
		assert!(!vm.supports(PrometheusApi::Flags));
	}

	#[test]
	fn builder_rejects_invalid_settings() {
		let err = PrometheusConfig::builder(url("ftp://prometheus"), Backend::Prometheus)
			.build()
			.expect_err("Non-HTTP schemes should be rejected.");

		assert!(matches!(err, ConfigError::UnsupportedScheme { .. }));

		let err = PrometheusConfig::builder(url("http://prometheus:9090"), Backend::Prometheus)
			.supported_apis(Vec::<PrometheusApi>::new())
			.build()
			.expect_err("Empty capability sets should be rejected.");

		assert!(matches!(err, ConfigError::NoSupportedApis));

		let err = PrometheusConfig::builder(url("http://prometheus:9090"), Backend::Prometheus)
			.query_interval("yesterday")
			.build()
			.expect_err("Unparseable intervals should be rejected.");

		assert!(matches!(err, ConfigError::InvalidInterval { .. }));
	}

	#[test]
	fn deserializes_backend_specific_fields() {
		let payload = r#"{
			"type": "aws",
			"url": "https://aps-workspaces.us-east-1.amazonaws.com/workspaces/ws-1",
			"aws_region": "us-east-1",
			"access_key": "AKIDEXAMPLE",
			"secret_access_key": "secret",
			"query_step": "1m"
		}"#;
		let config: PrometheusConfig =
			serde_json::from_str(payload).expect("AWS config should deserialize.");

		assert_eq!(config.query_step, "1m");
		assert_eq!(config.query_interval, "1d");
		assert!(config.supports(PrometheusApi::Labels));
		assert!(!config.supports(PrometheusApi::Flags));

		match &config.backend {
			Backend::Aws(aws) => {
				assert_eq!(aws.aws_region, "us-east-1");
				assert_eq!(aws.service_name, "aps");
				assert_eq!(aws.secret_access_key.as_ref().map(Secret::expose), Some("secret"));
			},
			other => panic!("Unexpected backend: {other:?}."),
		}
	}

	#[test]
	fn explicit_capabilities_override_defaults() {
		let payload = r#"{
			"type": "coralogix",
			"url": "https://prom.coralogix.example",
			"prometheus_token": "cx-token",
			"supported_apis": ["query"]
		}"#;
		let config: PrometheusConfig =
			serde_json::from_str(payload).expect("Coralogix config should deserialize.");

		assert!(config.supports(PrometheusApi::Query));
		assert!(!config.supports(PrometheusApi::QueryRange));
	}
}
