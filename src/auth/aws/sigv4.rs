//! AWS Signature Version 4, S3 flavor, through `aws-sigv4`.
//!
//! The payload hash travels in `x-amz-content-sha256` and the path is signed as sent (no second
//! round of URI encoding), which is what Managed Prometheus accepts for form-encoded POSTs.

// std
use std::time::SystemTime;
// crates.io
use aws_sigv4::{
	http_request::{
		self, PayloadChecksumKind, PercentEncodingMode, SignableBody, SignableRequest,
		SigningSettings, UriPathNormalizationMode,
	},
	sign::v4,
};
use reqwest::{
	Request,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue},
};
// self
use crate::{_prelude::*, auth::aws::AwsCredentials, error::AuthError};

/// Region, service, and instant a signature is scoped to.
#[derive(Clone, Debug)]
pub struct SigningScope<'a> {
	/// Signing region.
	pub region: &'a str,
	/// Signing service name.
	pub service: &'a str,
	/// Signing instant.
	pub time: SystemTime,
}

/// Signs a fully built request in place.
///
/// Adds `x-amz-date`, `x-amz-content-sha256`, `x-amz-security-token` (for temporary
/// credentials), and `Authorization`. Form-encoded spaces in the query are rewritten to `%20`
/// first, so the query sent is the query signed.
pub fn sign_request(
	request: &mut Request,
	credentials: &AwsCredentials,
	scope: &SigningScope<'_>,
) -> Result<(), AuthError> {
	normalize_query(request.url_mut());

	let payload = match request.body() {
		Some(body) => body.as_bytes().ok_or_else(|| AuthError::Signing {
			reason: "streaming bodies cannot be signed".into(),
		})?,
		None => &[],
	};
	let content_type =
		request.headers().get(CONTENT_TYPE).map(HeaderValue::to_str).transpose().map_err(signing_error)?;
	let identity = credentials.to_sdk().into();
	let params: http_request::SigningParams<'_> = v4::SigningParams::builder()
		.identity(&identity)
		.region(scope.region)
		.name(scope.service)
		.time(scope.time)
		.settings(settings())
		.build()
		.map_err(signing_error)?
		.into();
	let signable = SignableRequest::new(
		request.method().as_str(),
		request.url().as_str(),
		content_type.map(|value| (CONTENT_TYPE.as_str(), value)).into_iter(),
		SignableBody::Bytes(payload),
	)
	.map_err(signing_error)?;
	let (instructions, _) = http_request::sign(signable, &params).map_err(signing_error)?.into_parts();
	let (headers, _) = instructions.into_parts();

	for header in headers {
		let mut value = HeaderValue::from_str(header.value()).map_err(signing_error)?;

		value.set_sensitive(header.sensitive() || header.name() == AUTHORIZATION.as_str());
		request.headers_mut().insert(header.name(), value);
	}

	Ok(())
}

/// Access key id named in a SigV4 `Authorization` value.
pub fn signed_access_key(authorization: &str) -> Option<&str> {
	let (_, credential) = authorization.split_once("Credential=")?;

	credential.split_once('/').map(|(access_key_id, _)| access_key_id)
}

fn settings() -> SigningSettings {
	let mut settings = SigningSettings::default();

	settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
	settings.percent_encoding_mode = PercentEncodingMode::Single;
	settings.uri_path_normalization_mode = UriPathNormalizationMode::Disabled;

	settings
}

// The canonical query decodes `+` to a space and encodes it back as `%20`. Literal plus signs
// are already `%2B`.
fn normalize_query(url: &mut Url) {
	let Some(query) = url.query().filter(|query| query.contains('+')) else {
		return;
	};
	let query = query.replace('+', "%20");

	url.set_query(Some(&query));
}

fn signing_error(e: impl Display) -> AuthError {
	AuthError::Signing { reason: e.to_string() }
}
