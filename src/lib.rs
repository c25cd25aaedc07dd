//! One Prometheus client for Prometheus, VictoriaMetrics, AWS Managed Prometheus, Azure Monitor,
//! and Coralogix, with per-backend authentication built in.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod result;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::PrometheusClient,
		config::{Backend, PrometheusConfig, PrometheusConfigBuilder},
	};

	/// Starts a config builder for a vanilla Prometheus backend served at `base`.
	pub fn prometheus_config(base: &str) -> PrometheusConfigBuilder {
		let url = Url::parse(base).expect("Test Prometheus URL should parse.");

		PrometheusConfig::builder(url, Backend::Prometheus)
	}

	/// Connects a client for the provided config, panicking on construction failures.
	pub async fn connect_test_client(config: PrometheusConfig) -> PrometheusClient {
		PrometheusClient::connect(config).await.expect("Test client should connect.")
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		path::{Path, PathBuf},
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::RwLock;
	pub use reqwest::Client as ReqwestClient;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)]
use {color_eyre as _, httpmock as _, tokio as _, tracing_subscriber as _};
