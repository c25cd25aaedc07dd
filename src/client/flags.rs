//! Connection probing and runtime flag retrieval.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	api::PrometheusApi,
	client::{
		PrometheusClient,
		common::{self, ApiRequest},
	},
	error::ApiError,
};

/// Runtime flags keyed by flag name.
pub type Flags = BTreeMap<String, Value>;

const PROBE_QUERY: &str = "example";

#[derive(Deserialize)]
struct FlagsEnvelope {
	#[serde(default)]
	data: Option<Flags>,
}

impl PrometheusClient {
	/// Verifies the backend answers an instant query.
	///
	/// A 401 triggers one credential renewal and retry. Any failure is reported as
	/// [`Error::PrometheusNotFound`].
	pub async fn check_connection(&self, params: &[(&str, &str)]) -> Result<()> {
		let mut form = vec![("query".to_owned(), PROBE_QUERY.to_owned())];

		form.extend(common::owned_pairs(params));

		let call = ApiRequest::post_form("/api/v1/query", form);

		self.send(PrometheusApi::Query.as_str(), &call)
			.await
			.and_then(|reply| reply.error_for_status().map_err(Error::from))
			.map(|_| ())
			.map_err(|e| Error::PrometheusNotFound { url: self.url().to_owned(), source: Box::new(e) })
	}

	/// Fetches runtime flags from whichever flag endpoint the backend exposes.
	///
	/// Returns `None` when neither the Prometheus nor the VictoriaMetrics flag endpoint is
	/// supported. Failures are wrapped in [`Error::PrometheusFlagsConnection`].
	pub async fn flags(&self) -> Result<Option<Flags>> {
		let (service, result) = if self.supports(PrometheusApi::Flags) {
			("Prometheus", self.prometheus_flags().await)
		} else if self.supports(PrometheusApi::VmFlags) {
			("Victoria Metrics", self.victoria_metrics_flags().await)
		} else {
			return Ok(None);
		};

		result.map(Some).map_err(|e| Error::PrometheusFlagsConnection {
			url: self.url().to_owned(),
			service,
			source: Box::new(e),
		})
	}

	/// Fetches `GET /api/v1/status/flags`; a missing `data` field yields an empty map.
	pub async fn prometheus_flags(&self) -> Result<Flags> {
		let call = ApiRequest::get("/api/v1/status/flags");
		let result: Result<Flags> = async {
			let reply = self.send(PrometheusApi::Flags.as_str(), &call).await?.error_for_status()?;

			Ok(reply.json::<FlagsEnvelope>()?.data.unwrap_or_default())
		}
		.await;

		result.map_err(|e| Error::PrometheusNotFound {
			url: self.url().to_owned(),
			source: Box::new(e),
		})
	}

	/// Fetches `GET /flags` and parses the `key=value` listing.
	pub async fn victoria_metrics_flags(&self) -> Result<Flags> {
		let call = ApiRequest::get("/flags");
		let result: Result<Flags> = async {
			let reply = self.send(PrometheusApi::VmFlags.as_str(), &call).await?.error_for_status()?;

			Ok(parse_vm_flags(&reply.text())?)
		}
		.await;

		result.map_err(|e| Error::VictoriaMetricsNotFound {
			url: self.url().to_owned(),
			source: Box::new(e),
		})
	}
}

/// Parses the VictoriaMetrics `/flags` listing (`-name="value"` or `name=value` per line).
///
/// Blank lines are skipped; surrounding double quotes are stripped from values.
pub fn parse_vm_flags(text: &str) -> Result<Flags, ApiError> {
	let mut flags = Flags::new();

	for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
		let Some((key, value)) = line.split_once('=') else {
			return Err(ApiError::MalformedFlag { line: line.to_owned() });
		};

		flags.insert(key.to_owned(), Value::String(value.trim_matches('"').to_owned()));
	}

	Ok(flags)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn vm_flags_strip_quotes() {
		let flags = parse_vm_flags(
			"-retentionPeriod=\"30d\"\n\n-search.maxQueryDuration=\"30s\"\n-dedup.minScrapeInterval=1ms\n",
		)
		.expect("Flag listing should parse.");

		assert_eq!(flags.get("-retentionPeriod"), Some(&Value::String("30d".into())));
		assert_eq!(flags.get("-dedup.minScrapeInterval"), Some(&Value::String("1ms".into())));
		assert_eq!(flags.len(), 3);
	}

	#[test]
	fn vm_flags_reject_lines_without_separator() {
		let err = parse_vm_flags("-retentionPeriod\n").expect_err("Lines without `=` should fail.");

		assert!(matches!(err, ApiError::MalformedFlag { ref line } if line == "-retentionPeriod"));
	}
}
