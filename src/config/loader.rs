//! Layered config loading with `figment`.
//!
//! A single config comes from a YAML document with `PROMETRIX_*` environment overrides
//! (`PROMETRIX_URL`, `PROMETRIX_AZURE_CLIENT_SECRET`, ...). Config lists use the
//! `testConfig: [{type, params}]` layout shared with older tooling, where `type` may be a backend
//! name or a legacy class name.

// crates.io
use figment::{
	Figment,
	providers::{Env, Format, Serialized, Yaml},
};
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, config::PrometheusConfig, error::ConfigError};

/// Prefix of environment variables that override file values.
pub const ENV_PREFIX: &str = "PROMETRIX_";

const BACKEND_TYPES: [&str; 10] = [
	"prometheus",
	"victoria_metrics",
	"aws",
	"azure",
	"coralogix",
	"PrometheusConfig",
	"VictoriaMetricsPrometheusConfig",
	"AWSPrometheusConfig",
	"AzurePrometheusConfig",
	"CoralogixPrometheusConfig",
];

#[derive(Debug, Deserialize)]
struct ConfigList {
	#[serde(rename = "testConfig", alias = "configs")]
	entries: Vec<ConfigEntry>,
}

#[derive(Debug, Deserialize)]
struct ConfigEntry {
	#[serde(rename = "type")]
	kind: String,
	#[serde(default)]
	params: Map<String, Value>,
}
impl ConfigEntry {
	fn into_config(self) -> Result<PrometheusConfig, ConfigError> {
		if !BACKEND_TYPES.contains(&self.kind.as_str()) {
			return Err(ConfigError::UnknownBackend { kind: self.kind });
		}

		let mut params = self.params;

		params.insert("type".into(), Value::String(self.kind));

		extract(Figment::from(Serialized::defaults(Value::Object(params))))
	}
}

/// Builds the figment for a YAML file plus environment overrides.
pub fn figment_for(path: &Path) -> Figment {
	Figment::new().merge(Yaml::file(path)).merge(Env::prefixed(ENV_PREFIX))
}

/// Loads and validates a config from a YAML file with environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<PrometheusConfig, ConfigError> {
	extract(figment_for(path))
}

/// Loads and validates a config from a YAML document (no environment overrides).
pub fn load_config_from_str(yaml: &str) -> Result<PrometheusConfig, ConfigError> {
	extract(Figment::new().merge(Yaml::string(yaml)))
}

/// Loads and validates every entry of a `testConfig` list file.
pub fn load_config_list_from_path(path: &Path) -> Result<Vec<PrometheusConfig>, ConfigError> {
	config_list(Figment::new().merge(Yaml::file(path)))
}

/// Loads and validates every entry of a `testConfig` list document.
pub fn load_config_list_from_str(yaml: &str) -> Result<Vec<PrometheusConfig>, ConfigError> {
	config_list(Figment::new().merge(Yaml::string(yaml)))
}

fn config_list(figment: Figment) -> Result<Vec<PrometheusConfig>, ConfigError> {
	let list: ConfigList = figment.extract()?;

	list.entries.into_iter().map(ConfigEntry::into_config).collect()
}

fn extract(figment: Figment) -> Result<PrometheusConfig, ConfigError> {
	let config: PrometheusConfig = figment.extract()?;

	config.validate()?;

	Ok(config)
}
