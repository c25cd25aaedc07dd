//! Transport primitives shared by query paths and identity endpoints.
//!
//! [`ReqwestHttpClient`] wraps the pooled [`ReqwestClient`] built from a
//! [`PrometheusConfig`](crate::config::PrometheusConfig); [`HttpReply`] buffers a response so
//! callers can classify status codes, parse JSON with field paths in errors, and keep the
//! `Retry-After` hint for [`ApiError::Status`].

// std
use std::ops::Deref;
// crates.io
use reqwest::{
	Request, StatusCode,
	header::{HeaderMap, RETRY_AFTER},
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ApiError, ConfigError, TransportError},
};

/// Idle connections kept per backend host.
pub const POOL_MAX_IDLE_PER_HOST: usize = 10;

const BODY_PREVIEW_LIMIT: usize = 1024;

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a pooled client; certificate verification is skipped when `disable_ssl` is set.
	pub fn pooled(disable_ssl: bool) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(disable_ssl)
			.pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self(client))
	}

	/// Executes a request and buffers the reply.
	pub async fn execute(&self, request: Request) -> Result<HttpReply, TransportError> {
		let endpoint = redacted_endpoint(request.url());
		let response = self
			.0
			.execute(request)
			.await
			.map_err(|e| TransportError::network(endpoint.clone(), e))?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let body =
			response.bytes().await.map_err(|e| TransportError::network(endpoint, e))?.to_vec();

		Ok(HttpReply { status, headers, body })
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

/// Buffered HTTP response.
#[derive(Clone, Debug)]
pub struct HttpReply {
	/// Status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl HttpReply {
	/// Returns true for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns the body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Deserializes the body, reporting the failing field path on errors.
	pub fn json<T>(&self) -> Result<T, ApiError>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ApiError::ResponseParse { source, status: Some(self.status.as_u16()) })
	}

	/// Converts the reply into a status error carrying a body preview.
	pub fn status_error(&self) -> ApiError {
		ApiError::Status {
			status: self.status.as_u16(),
			body: body_preview(self.text()),
			retry_after: parse_retry_after(&self.headers),
		}
	}

	/// Returns `self` for 2xx replies and a status error otherwise.
	pub fn error_for_status(self) -> Result<Self, ApiError> {
		if self.is_success() { Ok(self) } else { Err(self.status_error()) }
	}
}

fn body_preview(mut body: String) -> String {
	if body.len() > BODY_PREVIEW_LIMIT {
		let mut cut = BODY_PREVIEW_LIMIT;

		while !body.is_char_boundary(cut) {
			cut -= 1;
		}

		body.truncate(cut);
		body.push_str("...");
	}

	body
}

// Query strings may carry tenant tokens; keep them out of error messages.
fn redacted_endpoint(url: &Url) -> String {
	let mut endpoint = url.clone();

	endpoint.set_query(None);

	endpoint.to_string()
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
