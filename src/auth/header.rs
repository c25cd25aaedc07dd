//! Static header authorization (Coralogix tokens, raw `Authorization` values, no auth).

// crates.io
use reqwest::{
	Request,
	header::{HeaderMap, HeaderName, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	auth::{AuthFuture, Authorizer},
	error::ConfigError,
};

/// Authorizer that stamps a fixed header set onto every request.
#[derive(Clone, Debug, Default)]
pub struct HeaderAuthorizer {
	headers: HeaderMap,
}
impl HeaderAuthorizer {
	/// Validates and wraps the provided header pairs.
	pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
		Ok(Self { headers: header_map(map)? })
	}

	/// Returns true when no header will be added.
	pub fn is_empty(&self) -> bool {
		self.headers.is_empty()
	}
}
impl Authorizer for HeaderAuthorizer {
	fn authorize<'a>(&'a self, request: &'a mut Request) -> AuthFuture<'a, ()> {
		Box::pin(async move {
			for (name, value) in &self.headers {
				request.headers_mut().insert(name.clone(), value.clone());
			}

			Ok(())
		})
	}
}

/// Converts string pairs into a [`HeaderMap`], rejecting names or values HTTP cannot carry.
pub(crate) fn header_map(map: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
	let mut headers = HeaderMap::with_capacity(map.len());

	for (name, value) in map {
		let invalid = || ConfigError::InvalidHeader { name: name.clone() };
		let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
		let mut header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;

		if header_name == reqwest::header::AUTHORIZATION || header_name.as_str() == "token" {
			header_value.set_sensitive(true);
		}

		headers.insert(header_name, header_value);
	}

	Ok(headers)
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::Method;
	// self
	use super::*;

	#[tokio::test]
	async fn stamps_configured_headers() {
		let authorizer = HeaderAuthorizer::from_map(&BTreeMap::from_iter([(
			"token".to_owned(),
			"cx-token".to_owned(),
		)]))
		.expect("Header fixture should be valid.");
		let mut request = Request::new(
			Method::GET,
			Url::parse("https://metrics.example.com/api/v1/query")
				.expect("Request URL fixture should parse."),
		);

		authorizer.authorize(&mut request).await.expect("Static authorization should not fail.");

		assert_eq!(
			request.headers().get("token").and_then(|value| value.to_str().ok()),
			Some("cx-token")
		);
		assert!(!authorizer.renew(request.headers()).await.expect("Renew should not fail."));
	}

	#[test]
	fn rejects_invalid_header_names() {
		let err = HeaderAuthorizer::from_map(&BTreeMap::from_iter([(
			"bad header".to_owned(),
			"value".to_owned(),
		)]))
		.expect_err("Header names with spaces should be rejected.");

		assert!(matches!(err, ConfigError::InvalidHeader { .. }));
	}
}
