//! Request shaping, the renew-and-retry loop, and response envelope decoding.

// crates.io
use reqwest::{Method, Request, header::HeaderMap};
use serde::de::{DeserializeOwned, IgnoredAny};
// self
use crate::{
	_prelude::*,
	client::PrometheusClient,
	error::{ApiError, TransportError},
	http::HttpReply,
	obs::{self, Outcome, RequestSpan},
};

/// One backend call before authorization.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path appended to the base URL (`/api/v1/query`).
	pub path: String,
	/// Extra URL query parameters; the client's base parameters are always sent too.
	pub query: Vec<(String, String)>,
	/// Form body for POST calls.
	pub form: Option<Vec<(String, String)>>,
}
impl ApiRequest {
	/// Creates a GET call.
	pub fn get(path: impl Into<String>) -> Self {
		Self { method: Method::GET, path: path.into(), query: Vec::new(), form: None }
	}

	/// Creates a form-encoded POST call.
	pub fn post_form(path: impl Into<String>, form: Vec<(String, String)>) -> Self {
		Self { method: Method::POST, path: path.into(), query: Vec::new(), form: Some(form) }
	}

	/// Appends URL query parameters.
	pub fn with_query(mut self, params: &[(&str, &str)]) -> Self {
		self.query.extend(owned_pairs(params));

		self
	}
}

/// Successful Prometheus API envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
	status: Option<String>,
	data: Option<T>,
	error_type: Option<String>,
	error: Option<String>,
}

impl PrometheusClient {
	/// Sends a call, renewing credentials and retrying once when the backend rejects them.
	pub async fn send(&self, api: &'static str, call: &ApiRequest) -> Result<HttpReply> {
		let span = RequestSpan::new(api, self.config.backend.as_str());

		obs::record_request_outcome(api, Outcome::Attempt);

		let result = span
			.instrument(async {
				let (reply, sent) = self.send_once(call).await?;

				if !self.authorizer.renews_on(reply.status) {
					return Ok(reply);
				}

				obs::event!(
					info,
					"{} rejected credentials with {}; renewing before one retry.",
					self.url(),
					reply.status
				);

				if self.authorizer.renew(&sent).await? {
					return self.send_once(call).await.map(|(reply, _)| reply);
				}

				Ok(reply)
			})
			.await;

		obs::record_request_outcome(api, Outcome::of(&result));

		result
	}

	/// Sends a call and decodes the `data` field of a successful envelope.
	///
	/// Non-2xx replies that still carry an error envelope (Prometheus answers bad PromQL with
	/// 400 plus `errorType`) surface as [`ApiError::Envelope`].
	pub async fn fetch_data<T>(&self, api: &'static str, call: &ApiRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let reply = self.send(api, call).await?;

		if !reply.is_success() {
			return Err(envelope_error(&reply).unwrap_or_else(|| reply.status_error()).into());
		}

		decode_data(&reply)
	}

	/// Resolves an API path against the base URL, keeping any base path prefix.
	pub fn endpoint(&self, path: &str) -> Url {
		let mut url = self.config.url.clone();
		let joined = format!("{}{path}", url.path().trim_end_matches('/'));

		url.set_path(&joined);

		url
	}

	/// Sends one attempt; also returns the headers it carried so a rejection can name them.
	async fn send_once(&self, call: &ApiRequest) -> Result<(HttpReply, HeaderMap)> {
		let mut request = self.build_request(call)?;

		self.authorizer.authorize(&mut request).await?;

		let sent = request.headers().clone();

		Ok((self.http.execute(request).await?, sent))
	}

	fn build_request(&self, call: &ApiRequest) -> Result<Request> {
		let url = self.endpoint(&call.path);
		let mut builder =
			self.http.request(call.method.clone(), url.clone()).headers(self.headers.clone());

		if !self.base_params.is_empty() {
			builder = builder.query(&self.base_params);
		}
		if !call.query.is_empty() {
			builder = builder.query(&call.query);
		}
		if let Some(form) = &call.form {
			builder = builder.form(form);
		}

		builder.build().map_err(|e| TransportError::network(url.path(), e).into())
	}
}

/// Decodes the `data` field of a Prometheus envelope.
pub fn decode_data<T>(reply: &HttpReply) -> Result<T>
where
	T: DeserializeOwned,
{
	let envelope: Envelope<T> = reply.json()?;

	if envelope.status.as_deref() == Some("error") {
		return Err(reported_error(reply, envelope.error_type, envelope.error).into());
	}

	envelope.data.ok_or_else(|| {
		ApiError::Envelope {
			status: None,
			error_type: "bad_data".into(),
			message: "response carried no data".into(),
		}
		.into()
	})
}

fn envelope_error(reply: &HttpReply) -> Option<ApiError> {
	let envelope = reply.json::<Envelope<IgnoredAny>>().ok()?;

	(envelope.status.as_deref() == Some("error"))
		.then(|| reported_error(reply, envelope.error_type, envelope.error))
}

fn reported_error(reply: &HttpReply, error_type: Option<String>, message: Option<String>) -> ApiError {
	ApiError::Envelope {
		status: (!reply.is_success()).then(|| reply.status.as_u16()),
		error_type: error_type.unwrap_or_else(|| "unknown".into()),
		message: message.unwrap_or_default(),
	}
}

/// Rounds an instant to whole unix seconds.
pub fn unix_seconds(instant: OffsetDateTime) -> i64 {
	let seconds = instant.unix_timestamp();

	if instant.nanosecond() >= 500_000_000 { seconds + 1 } else { seconds }
}

pub(crate) fn owned_pairs(params: &[(&str, &str)]) -> impl Iterator<Item = (String, String)> {
	params.iter().map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use httpmock::prelude::*;
	use reqwest::StatusCode;
	use time::macros;
	// self
	use super::*;
	use crate::{
		_preludet::prometheus_config,
		auth::{AuthFuture, Authorizer},
		http::ReqwestHttpClient,
	};

	#[derive(Default)]
	struct RotatingAuthorizer {
		generation: AtomicUsize,
		renewals: AtomicUsize,
		renewable: bool,
	}
	impl Authorizer for RotatingAuthorizer {
		fn authorize<'a>(&'a self, request: &'a mut Request) -> AuthFuture<'a, ()> {
			Box::pin(async move {
				let value = format!("key-{}", self.generation.load(Ordering::SeqCst));

				request.headers_mut().insert(
					"x-api-key",
					value.parse().expect("Generated key should be a valid header."),
				);

				Ok(())
			})
		}

		fn renew<'a>(&'a self, rejected: &'a HeaderMap) -> AuthFuture<'a, bool> {
			Box::pin(async move {
				let current = format!("key-{}", self.generation.load(Ordering::SeqCst));

				// Only the key that was actually sent is rotated.
				if rejected.get("x-api-key").is_some_and(|key| key != current.as_str()) {
					return Ok(true);
				}

				self.renewals.fetch_add(1, Ordering::SeqCst);
				self.generation.fetch_add(1, Ordering::SeqCst);

				Ok(self.renewable)
			})
		}
	}

	fn client(server: &MockServer, authorizer: Arc<RotatingAuthorizer>) -> PrometheusClient {
		let config = prometheus_config(&server.url("/")).build().expect("Mock config should build.");

		PrometheusClient::with_authorizer(config, ReqwestHttpClient::default(), authorizer)
			.expect("Mock client should build.")
	}

	fn reply(body: &str) -> HttpReply {
		HttpReply { status: StatusCode::OK, headers: HeaderMap::new(), body: body.as_bytes().to_vec() }
	}

	#[test]
	fn envelope_errors_surface_prometheus_messages() {
		let err = decode_data::<serde_json::Value>(&reply(
			r#"{"status":"error","errorType":"bad_data","error":"parse error at char 3"}"#,
		))
		.expect_err("Error envelopes should fail.");

		assert_eq!(err.to_string(), "Prometheus API reported bad_data: parse error at char 3.");

		let labels = decode_data::<Vec<String>>(&reply(r#"{"status":"success","data":["up"]}"#))
			.expect("Success envelopes should decode.");

		assert_eq!(labels, vec!["up".to_owned()]);
	}

	#[test]
	fn failed_replies_prefer_envelope_errors() {
		let mut failed = reply(r#"{"status":"error","errorType":"timeout","error":"query timed out"}"#);

		failed.status = StatusCode::SERVICE_UNAVAILABLE;

		let err = envelope_error(&failed).expect("Error envelopes on failed replies should be kept.");

		assert!(matches!(
			err,
			ApiError::Envelope { status: Some(503), ref error_type, .. } if error_type == "timeout"
		));
		assert_eq!(err.to_string(), "HTTP Status Code 503 (timeout: query timed out).");

		failed.body = b"upstream connect error".to_vec();

		assert!(envelope_error(&failed).is_none());
	}

	#[test]
	fn instants_round_to_whole_seconds() {
		let midnight = macros::datetime!(2024-01-01 00:00 UTC);

		assert_eq!(unix_seconds(midnight + Duration::milliseconds(400)), 1_704_067_200);
		assert_eq!(unix_seconds(midnight + Duration::milliseconds(500)), 1_704_067_201);
	}

	#[tokio::test]
	async fn rejected_credentials_are_renewed_and_retried_once() {
		let server = MockServer::start_async().await;
		let stale = server
			.mock_async(|when, then| {
				when.method(GET).path("/api/v1/label/job/values").header("x-api-key", "key-0");
				then.status(401);
			})
			.await;
		let fresh = server
			.mock_async(|when, then| {
				when.method(GET).path("/api/v1/label/job/values").header("x-api-key", "key-1");
				then.status(200)
					.header("content-type", "application/json")
					.body(r#"{"status":"success","data":["node"]}"#);
			})
			.await;
		let authorizer = Arc::new(RotatingAuthorizer { renewable: true, ..Default::default() });
		let client = client(&server, authorizer.clone());
		let labels = client.label_values("job", &[]).await.expect("Retry should succeed.");

		assert_eq!(labels, vec!["node".to_owned()]);
		assert_eq!(authorizer.renewals.load(Ordering::SeqCst), 1);

		stale.assert_calls_async(1).await;
		fresh.assert_calls_async(1).await;
	}

	#[tokio::test]
	async fn unrenewable_rejections_are_returned_without_retry() {
		let server = MockServer::start_async().await;
		let rejected = server
			.mock_async(|when, then| {
				when.method(GET).path("/api/v1/label/job/values");
				then.status(401).body("unauthorized");
			})
			.await;
		let authorizer = Arc::new(RotatingAuthorizer::default());
		let client = client(&server, authorizer.clone());
		let err = client.label_values("job", &[]).await.expect_err("Rejection should surface.");

		assert_eq!(err.status(), Some(401));
		assert_eq!(authorizer.renewals.load(Ordering::SeqCst), 1);

		rejected.assert_calls_async(1).await;
	}
}
