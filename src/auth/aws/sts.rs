//! STS `AssumeRoleWithWebIdentity` through the AWS SDK.
//!
//! The call is unsigned: the web identity token is the credential, so the client needs a region
//! (or an explicit endpoint) and nothing else.

// crates.io
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sts::{Client, error::DisplayErrorContext, types::Credentials};
// self
use crate::{
	_prelude::*,
	auth::{Secret, aws::AwsCredentials},
	error::AuthError,
	obs,
};

/// Session name attached to every assumed-role session.
pub const SESSION_NAME: &str = "amp-auto";

/// STS client used for role assumption.
#[derive(Clone, Debug)]
pub struct StsClient {
	client: Client,
}
impl StsClient {
	/// Targets the STS endpoint the shared AWS config resolves (regional by default).
	pub fn new(sdk: &SdkConfig) -> Self {
		Self { client: Client::new(sdk) }
	}

	/// Targets a custom endpoint (VPC endpoints, local mocks).
	pub fn with_endpoint(region: &str, endpoint: &Url) -> Self {
		let config = aws_sdk_sts::Config::builder()
			.behavior_version(BehaviorVersion::latest())
			.region(Region::new(region.to_owned()))
			.endpoint_url(endpoint.as_str())
			.build();

		Self { client: Client::from_conf(config) }
	}

	/// Exchanges a web identity token for temporary credentials.
	pub async fn assume_role_with_web_identity(
		&self,
		role_arn: &str,
		session_name: &str,
		web_identity_token: &str,
	) -> Result<AwsCredentials> {
		let output = self
			.client
			.assume_role_with_web_identity()
			.role_arn(role_arn)
			.role_session_name(session_name)
			.web_identity_token(web_identity_token)
			.send()
			.await
			.map_err(|e| AuthError::AssumeRole {
				role_arn: role_arn.to_owned(),
				reason: DisplayErrorContext(&e).to_string(),
			})?;
		let Some(credentials) = output.credentials() else {
			obs::event!(error, "Invalid assume role response for {role_arn}: no credentials.");

			return Err(AuthError::AssumeRole {
				role_arn: role_arn.to_owned(),
				reason: "response carried no credentials".into(),
			}
			.into());
		};

		Ok(assumed_credentials(credentials)?)
	}
}

fn assumed_credentials(raw: &Credentials) -> Result<AwsCredentials, AuthError> {
	let missing = [
		("AccessKeyId", raw.access_key_id()),
		("SecretAccessKey", raw.secret_access_key()),
		("SessionToken", raw.session_token()),
	]
	.into_iter()
	.filter_map(|(field, value)| value.is_empty().then_some(field))
	.collect::<Vec<_>>();

	if !missing.is_empty() {
		obs::event!(error, "Missing required credential fields: {missing:?}.");

		return Err(AuthError::IncompleteCredentials { missing });
	}

	let expires_at = OffsetDateTime::from_unix_timestamp(raw.expiration().secs()).ok();
	let credentials = AwsCredentials::new(raw.access_key_id(), raw.secret_access_key())
		.with_session_token(Some(Secret::new(raw.session_token())));

	Ok(AwsCredentials { expires_at, ..credentials })
}

#[cfg(test)]
mod tests {
	// crates.io
	use aws_sdk_sts::primitives::DateTime;
	// self
	use super::*;

	fn raw(access_key_id: &str, secret: &str, session: &str) -> Credentials {
		Credentials::builder()
			.access_key_id(access_key_id)
			.secret_access_key(secret)
			.session_token(session)
			.expiration(DateTime::from_secs(1_700_000_000))
			.build()
			.expect("Credential fixture should build.")
	}

	#[test]
	fn complete_credentials_convert_with_expiry() {
		let credentials = assumed_credentials(&raw("ASIA", "secret", "session"))
			.expect("Complete credentials should convert.");

		assert_eq!(credentials.access_key_id, "ASIA");
		assert_eq!(credentials.session_token.as_ref().map(Secret::expose), Some("session"));
		assert_eq!(credentials.expires_at.map(OffsetDateTime::unix_timestamp), Some(1_700_000_000));
	}

	#[test]
	fn missing_fields_are_reported_together() {
		let err = assumed_credentials(&raw("ASIA", "", ""))
			.expect_err("Incomplete credentials should fail.");

		match err {
			AuthError::IncompleteCredentials { missing } =>
				assert_eq!(missing, vec!["SecretAccessKey", "SessionToken"]),
			other => panic!("Unexpected error: {other:?}."),
		}
	}
}
