//! AWS Managed Prometheus: SigV4 request signing with optional web identity role assumption.
//!
//! Base credentials are the static config keys when both halves are set, otherwise whatever the
//! AWS SDK's default provider chain yields. When a role is named (`assume_role_arn` or
//! `AWS_ASSUME_ROLE`) the service-account token is exchanged through STS and the assumed-role
//! keys replace the base ones. Each request is signed with the credentials current at signing
//! time, so renewed keys apply to the next attempt.

pub mod credentials;
pub mod sigv4;
pub mod sts;

pub use credentials::*;
pub use sts::StsClient;

// std
use std::time::SystemTime;
// crates.io
use aws_config::{BehaviorVersion, Region, SdkConfig};
use reqwest::{
	Request, StatusCode,
	header::{AUTHORIZATION, HeaderMap},
};
// self
use crate::{
	_prelude::*,
	auth::{AuthFuture, Authorizer, aws::sigv4::SigningScope},
	config::AwsConfig,
	obs::{self, Outcome},
};

/// Authorizer that signs requests with AWS SigV4.
#[derive(Debug)]
pub struct SigV4Authorizer {
	region: String,
	service: String,
	base: BaseCredentials,
	role_arn: Option<String>,
	sa_token_path: PathBuf,
	sts: StsClient,
	credentials: RwLock<AwsCredentials>,
	renewal: AsyncMutex<()>,
}
impl SigV4Authorizer {
	/// Loads the shared AWS config for the configured region, then resolves credentials.
	pub async fn connect(config: &AwsConfig) -> Result<Self> {
		let sdk = aws_config::defaults(BehaviorVersion::latest())
			.region(Region::new(config.aws_region.clone()))
			.load()
			.await;

		Self::connect_with(config, &sdk, StsClient::new(&sdk), AwsEnvironment::from_process()).await
	}

	/// Resolves credentials against an explicit AWS config, STS client, and environment snapshot.
	pub async fn connect_with(
		config: &AwsConfig,
		sdk: &SdkConfig,
		sts: StsClient,
		env: AwsEnvironment,
	) -> Result<Self> {
		let base = BaseCredentials::resolve(config, sdk)?;
		let role_arn = assume_role_target(config, &env);
		let sa_token_path = env.sa_token_path();
		let credentials = fetch(&base, role_arn.as_deref(), &sa_token_path, &sts).await?;

		obs::event!(
			debug,
			"Resolved AWS credentials from {} (assumed role: {}).",
			base.as_str(),
			role_arn.as_deref().unwrap_or("none")
		);

		Ok(Self {
			region: config.aws_region.clone(),
			service: config.service_name.clone(),
			base,
			role_arn,
			sa_token_path,
			sts,
			credentials: RwLock::new(credentials),
			renewal: AsyncMutex::new(()),
		})
	}

	/// Returns a snapshot of the signing credentials.
	pub fn credentials(&self) -> AwsCredentials {
		self.credentials.read().clone()
	}

	/// Returns true when credentials can be fetched again (STS or the provider chain).
	pub fn is_renewable(&self) -> bool {
		self.role_arn.is_some() || self.base.is_dynamic()
	}

	/// Fetches fresh credentials and swaps them in.
	pub async fn refresh(&self) -> Result<AwsCredentials> {
		self.refresh_if(|_| true).await
	}

	/// Fetches fresh credentials unless, once the renewal lock is held, `still_stale` says the
	/// current ones were already replaced.
	async fn refresh_if<F>(&self, still_stale: F) -> Result<AwsCredentials>
	where
		F: Fn(&AwsCredentials) -> bool,
	{
		let _singleflight = self.renewal.lock().await;

		// Another caller may have refreshed while this one waited.
		{
			let current = self.credentials.read();

			if !still_stale(&current) {
				return Ok(current.clone());
			}
		}

		let result =
			fetch(&self.base, self.role_arn.as_deref(), &self.sa_token_path, &self.sts).await;

		obs::record_auth_renewal("aws", Outcome::of(&result));

		let credentials = result?;

		*self.credentials.write() = credentials.clone();

		obs::event!(info, "Refreshed AWS credentials.");

		Ok(credentials)
	}

	async fn signing_credentials(&self) -> Result<AwsCredentials> {
		let credentials = self.credentials();

		if self.is_renewable() && credentials.is_expired_at(OffsetDateTime::now_utc()) {
			return self.refresh_if(|current| current.is_expired_at(OffsetDateTime::now_utc())).await;
		}

		Ok(credentials)
	}
}
impl Authorizer for SigV4Authorizer {
	fn authorize<'a>(&'a self, request: &'a mut Request) -> AuthFuture<'a, ()> {
		Box::pin(async move {
			let credentials = self.signing_credentials().await?;
			let scope = SigningScope {
				region: &self.region,
				service: &self.service,
				time: SystemTime::now(),
			};

			sigv4::sign_request(request, &credentials, &scope)?;

			Ok(())
		})
	}

	fn renew<'a>(&'a self, rejected: &'a HeaderMap) -> AuthFuture<'a, bool> {
		Box::pin(async move {
			if !self.is_renewable() {
				return Ok(false);
			}

			let rejected_key = rejected
				.get(AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.and_then(sigv4::signed_access_key);

			self.refresh_if(|current| {
				rejected_key.is_none_or(|key| key == current.access_key_id)
					|| current.is_expired_at(OffsetDateTime::now_utc())
			})
			.await
			.map(|_| true)
		})
	}

	fn renews_on(&self, status: StatusCode) -> bool {
		matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
	}
}

async fn fetch(
	base: &BaseCredentials,
	role_arn: Option<&str>,
	sa_token_path: &Path,
	sts: &StsClient,
) -> Result<AwsCredentials> {
	if let Some(role_arn) = role_arn {
		let token = read_web_identity_token(sa_token_path)?;

		return sts.assume_role_with_web_identity(role_arn, sts::SESSION_NAME, &token).await;
	}

	Ok(base.load().await?)
}

#[cfg(test)]
mod tests {
	// std
	use std::fs;
	// crates.io
	use reqwest::Method;
	// self
	use super::*;
	use crate::error::AuthError;

	fn sts() -> StsClient {
		StsClient::with_endpoint(
			"us-east-1",
			&Url::parse("http://127.0.0.1:9/").expect("STS URL fixture should parse."),
		)
	}

	fn without_chain() -> SdkConfig {
		SdkConfig::builder().build()
	}

	#[tokio::test]
	async fn static_keys_sign_without_sts() {
		let config = AwsConfig::new("us-east-1").with_static_keys("AKIDEXAMPLE", "secret");
		let authorizer =
			SigV4Authorizer::connect_with(&config, &without_chain(), sts(), AwsEnvironment::default())
				.await
				.expect("Static keys should connect without STS.");
		let mut request = Request::new(
			Method::GET,
			Url::parse("https://aps.example.com/api/v1/label/__name__/values")
				.expect("Request URL fixture should parse."),
		);

		authorizer.authorize(&mut request).await.expect("Signing should succeed.");

		assert!(!authorizer.is_renewable());
		assert!(
			!authorizer
				.renew(request.headers())
				.await
				.expect("Static keys should not fail to renew.")
		);
		assert!(authorizer.renews_on(StatusCode::FORBIDDEN));
		assert!(request.headers().contains_key("x-amz-content-sha256"));
		assert!(
			request
				.headers()
				.get("authorization")
				.and_then(|value| value.to_str().ok())
				.is_some_and(|value| value.contains("Credential=AKIDEXAMPLE/"))
		);
	}

	#[tokio::test]
	async fn missing_credentials_fail_at_connect() {
		let err = SigV4Authorizer::connect_with(
			&AwsConfig::new("us-east-1"),
			&without_chain(),
			sts(),
			AwsEnvironment::default(),
		)
		.await
		.expect_err("No credential source should fail.");

		assert!(matches!(err, Error::Auth(AuthError::MissingAwsCredentials)));
		assert_eq!(
			err.to_string(),
			"No AWS credentials found (neither static keys nor the default provider chain)."
		);
	}

	#[tokio::test]
	async fn assume_role_requires_service_account_token() {
		let dir = std::env::temp_dir().join("prometrix-aws-missing-sa-token");
		let _ = fs::remove_dir_all(&dir);
		let env = AwsEnvironment { sa_token_path: Some(dir.join("token")), ..Default::default() };
		let config = AwsConfig::new("us-east-1")
			.with_static_keys("AKIDEXAMPLE", "secret")
			.with_assume_role("arn:aws:iam::123456789012:role/amp");
		let err = SigV4Authorizer::connect_with(&config, &without_chain(), sts(), env)
			.await
			.expect_err("Missing service-account token should fail.");

		assert!(matches!(err, Error::Auth(AuthError::ServiceAccountToken { .. })));
	}
}
