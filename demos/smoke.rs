//! Connectivity smoke test for a list of live backends.
//!
//! Reads a `testConfig` YAML file (see `demos/smoke.example.yaml`), then for every entry checks
//! the connection, checks the label api (`pod` values when supported, an error otherwise) and
//! runs a recent range query that must return at least one series with more than one point.
//! Exits non-zero when any backend fails.
//!
//! ```sh
//! cargo run --example smoke -- demos/smoke.example.yaml
//! ```

// std
use std::{env, path::PathBuf, process::ExitCode};
// crates.io
use color_eyre::{Result, eyre::eyre};
use tracing_subscriber::EnvFilter;
// self
use prometrix::{
	api::PrometheusApi,
	client::PrometheusClient,
	config::{PrometheusConfig, loader},
	result::{PrometheusSeries, QueryResult},
};

const SMOKE_QUERY: &str = "container_memory_working_set_bytes";
const SMOKE_LABEL: &str = "pod";

#[tokio::main]
async fn main() -> Result<ExitCode> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
		.init();

	let path = env::args_os()
		.nth(1)
		.map(PathBuf::from)
		.ok_or_else(|| eyre!("usage: smoke <config.yaml>"))?;
	let configs = loader::load_config_list_from_path(&path)?;
	let mut failures = 0;

	for config in configs {
		let target = format!("{} ({})", config.url, config.backend);

		match check(config).await {
			Ok(points) => tracing::info!("{target}: ok, {points} points."),
			Err(e) => {
				failures += 1;

				tracing::error!("{target}: {e:?}");
			},
		}
	}

	Ok(if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn check(config: PrometheusConfig) -> Result<usize> {
	let client = PrometheusClient::connect(config).await?;

	client.check_connection(&[]).await?;

	if client.supports(PrometheusApi::Labels) {
		let pods = client.label_values(SMOKE_LABEL, &[]).await?;

		if pods.is_empty() {
			return Err(eyre!("label api returned no `{SMOKE_LABEL}` values"));
		}

		tracing::info!("{} exposes {} `{SMOKE_LABEL}` values.", client.url(), pods.len());
	} else if client.label_values(SMOKE_LABEL, &[]).await.is_ok() {
		return Err(eyre!("label api should be unsupported"));
	}

	let result = client.query_recent(SMOKE_QUERY).await?.require_samples(SMOKE_QUERY)?;
	let kind = result.result_type();
	let QueryResult::Matrix(series) = result else {
		return Err(eyre!("expected a matrix, got {kind}"));
	};

	multi_point_series(&series)
}

/// Passes when any series carries more than one point; returns the largest point count.
fn multi_point_series(series: &[PrometheusSeries]) -> Result<usize> {
	let points = series.iter().map(PrometheusSeries::len).max().unwrap_or_default();

	if !series.iter().any(|series| series.len() > 1) {
		return Err(eyre!("expected a series with more than one point, got at most {points}"));
	}

	Ok(points)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn series(points: usize) -> PrometheusSeries {
		PrometheusSeries {
			metric: Default::default(),
			timestamps: (0..points).map(|at| at as f64).collect(),
			values: (0..points).map(|value| value.to_string()).collect(),
		}
	}

	#[test]
	fn any_multi_point_series_passes() {
		assert_eq!(
			multi_point_series(&[series(1), series(3)]).expect("A later long series should pass."),
			3
		);
		assert!(multi_point_series(&[series(1), series(0)]).is_err());
		assert!(multi_point_series(&[]).is_err());
	}
}
