//! AWS credential sources: static config keys, then the SDK's default provider chain.
//!
//! The default chain covers the environment, shared profile files, IRSA web identity, ECS
//! container credentials, and instance metadata, in that order.

// std
use std::{env, fs, time::SystemTime};
// crates.io
use aws_config::SdkConfig;
use aws_credential_types::{
	Credentials,
	provider::{ProvideCredentials, SharedCredentialsProvider, error::CredentialsError},
};
use aws_sdk_sts::error::DisplayErrorContext;
// self
use crate::{
	_prelude::*,
	auth::{Secret, token},
	config::AwsConfig,
	error::AuthError,
};

const DEFAULT_SA_TOKEN_PATH: &str = "/var/run/secrets/eks.amazonaws.com/serviceaccount/token";
const PROVIDER_NAME: &str = "prometrix";

/// Key pair (plus optional session token) used to sign requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AwsCredentials {
	/// Access key id; not secret.
	pub access_key_id: String,
	/// Secret access key.
	pub secret_access_key: Secret,
	/// Session token paired with temporary keys.
	pub session_token: Option<Secret>,
	/// Expiry reported by the issuer of temporary keys.
	pub expires_at: Option<OffsetDateTime>,
}
impl AwsCredentials {
	/// Creates long-lived credentials.
	pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<Secret>) -> Self {
		Self {
			access_key_id: access_key_id.into(),
			secret_access_key: secret_access_key.into(),
			session_token: None,
			expires_at: None,
		}
	}

	/// Attaches a session token.
	pub fn with_session_token(mut self, token: Option<Secret>) -> Self {
		self.session_token = token.filter(|token| !token.is_empty());

		self
	}

	/// Reads the static key pair from a config; both halves must be non-empty.
	pub fn from_config(config: &AwsConfig) -> Option<Self> {
		let access_key = config.access_key.as_deref().filter(|key| !key.is_empty())?;
		let secret = config.secret_access_key.as_ref().filter(|secret| !secret.is_empty())?;

		Some(Self::new(access_key, secret.clone()).with_session_token(config.token.clone()))
	}

	/// Converts credentials handed out by an SDK provider.
	pub fn from_sdk(credentials: &Credentials) -> Self {
		let session_token = credentials.session_token().map(Secret::new);
		let converted = Self::new(credentials.access_key_id(), credentials.secret_access_key())
			.with_session_token(session_token);

		Self { expires_at: credentials.expiry().and_then(offset_from_system), ..converted }
	}

	/// Builds the SDK credential value the signer consumes.
	///
	/// Expiry stays on this side; the signer never sees it.
	pub fn to_sdk(&self) -> Credentials {
		Credentials::new(
			&self.access_key_id,
			self.secret_access_key.expose(),
			self.session_token.as_ref().map(|token| token.expose().to_owned()),
			None,
			PROVIDER_NAME,
		)
	}

	/// Returns true when the credentials should be refreshed before signing at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| now >= token::skewed(expires_at))
	}
}

/// Role-assumption environment variables, captured once so resolution is reproducible.
///
/// Everything else (`AWS_ACCESS_KEY_ID`, `AWS_PROFILE`, `AWS_ROLE_ARN`, ...) is read by the SDK's
/// default chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AwsEnvironment {
	/// `AWS_ASSUME_ROLE`, used when the config names no role.
	pub assume_role: Option<String>,
	/// `SA_TOKEN_PATH`; the service-account token presented when assuming a role.
	pub sa_token_path: Option<PathBuf>,
}
impl AwsEnvironment {
	/// Captures the variables from the current process.
	pub fn from_process() -> Self {
		Self { assume_role: var("AWS_ASSUME_ROLE"), sa_token_path: var("SA_TOKEN_PATH").map(PathBuf::from) }
	}

	/// Service-account token path, falling back to the EKS projection path.
	pub fn sa_token_path(&self) -> PathBuf {
		self.sa_token_path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_SA_TOKEN_PATH))
	}
}

/// Where the signing credentials come from before any explicit role assumption.
#[derive(Clone, Debug)]
pub enum BaseCredentials {
	/// Keys from the config file.
	Static(AwsCredentials),
	/// The SDK provider chain resolved from the shared AWS config.
	Chain(SharedCredentialsProvider),
}
impl BaseCredentials {
	/// Uses static config keys when both halves are present, else the SDK's provider chain.
	pub fn resolve(config: &AwsConfig, sdk: &SdkConfig) -> Result<Self, AuthError> {
		if let Some(credentials) = AwsCredentials::from_config(config) {
			return Ok(Self::Static(credentials));
		}

		sdk.credentials_provider().map(Self::Chain).ok_or(AuthError::MissingAwsCredentials)
	}

	/// Produces a key pair; chain providers are asked again on every call.
	pub async fn load(&self) -> Result<AwsCredentials, AuthError> {
		match self {
			Self::Static(credentials) => Ok(credentials.clone()),
			Self::Chain(provider) => provider
				.provide_credentials()
				.await
				.map(|credentials| AwsCredentials::from_sdk(&credentials))
				.map_err(provider_error),
		}
	}

	/// Returns true when loading again may yield different keys.
	pub const fn is_dynamic(&self) -> bool {
		matches!(self, Self::Chain(_))
	}

	/// Returns a stable label suitable for log fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Static(_) => "static",
			Self::Chain(_) => "default_chain",
		}
	}
}

/// Role the client must assume after resolving its base credentials, if any.
pub fn assume_role_target(config: &AwsConfig, env: &AwsEnvironment) -> Option<String> {
	config
		.assume_role_arn
		.clone()
		.filter(|role| !role.is_empty())
		.or_else(|| env.assume_role.clone())
}

/// Reads a projected web identity token.
pub fn read_web_identity_token(path: &Path) -> Result<String, AuthError> {
	fs::read_to_string(path)
		.map(|token| token.trim().to_owned())
		.map_err(|source| AuthError::ServiceAccountToken { path: path.to_path_buf(), source })
}

fn provider_error(e: CredentialsError) -> AuthError {
	match e {
		CredentialsError::CredentialsNotLoaded(_) => AuthError::MissingAwsCredentials,
		e => AuthError::CredentialsProvider { reason: DisplayErrorContext(&e).to_string() },
	}
}

fn offset_from_system(instant: SystemTime) -> Option<OffsetDateTime> {
	let since_epoch = instant.duration_since(SystemTime::UNIX_EPOCH).ok()?;

	OffsetDateTime::UNIX_EPOCH.checked_add(Duration::try_from(since_epoch).ok()?)
}

fn var(name: &str) -> Option<String> {
	env::var(name).ok().filter(|value| !value.is_empty())
}
