//! Azure Monitor bearer tokens: managed identity, workload identity, and service principal.
//!
//! Managed identity calls the instance metadata endpoint. Otherwise the authorizer posts a
//! `client_credentials` grant to the token endpoint, presenting the federated workload identity
//! token as a client assertion when the projected token file is readable and falling back to the
//! service principal secret when it is not. Issued tokens land in a [`TokenCache`] (the
//! process-wide one unless another is injected) and are reused until they expire or the backend
//! answers 401.

// std
use std::{fs, io::ErrorKind};
// crates.io
use reqwest::{
	Method, Request,
	header::{AUTHORIZATION, HeaderMap},
};
// self
use crate::{
	_prelude::*,
	auth::{AuthFuture, Authorizer, BearerToken, Secret, TokenCache},
	config::AzureConfig,
	error::{AuthError, TransportError},
	http::{HttpReply, ReqwestHttpClient},
	obs::{self, Outcome},
};

const METADATA_API_VERSION: &str = "2018-02-01";
const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Which identity flow produced a token request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AzureFlow {
	/// Instance metadata endpoint.
	ManagedIdentity,
	/// Federated token presented as a client assertion.
	WorkloadIdentity,
	/// Client id plus client secret.
	ServicePrincipal,
}
impl AzureFlow {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AzureFlow::ManagedIdentity => "managed_identity",
			AzureFlow::WorkloadIdentity => "workload_identity",
			AzureFlow::ServicePrincipal => "service_principal",
		}
	}
}

/// Authorizer that attaches Azure AD bearer tokens.
#[derive(Clone, Debug)]
pub struct AzureAuthorizer {
	config: AzureConfig,
	http: ReqwestHttpClient,
	cache: Arc<TokenCache>,
}
impl AzureAuthorizer {
	/// Creates an authorizer backed by the process-wide token cache.
	pub fn new(config: AzureConfig, http: ReqwestHttpClient) -> Self {
		Self { config, http, cache: TokenCache::shared() }
	}

	/// Replaces the token cache.
	pub fn with_cache(mut self, cache: Arc<TokenCache>) -> Self {
		self.cache = cache;

		self
	}

	/// Returns the cache tokens are stored in.
	pub fn cache(&self) -> &Arc<TokenCache> {
		&self.cache
	}

	/// Exchanges credentials for a new token and stores it, bypassing the cache.
	pub async fn request_new_token(&self) -> Result<BearerToken> {
		let (flow, request) = self.token_request()?;

		obs::event!(debug, "Requesting azure access token via {}.", flow.as_str());

		let reply = self.http.execute(request).await?;
		let token = parse_token_reply(&reply)?;

		self.cache.store(token.clone());

		obs::event!(info, "Generated new azure access token.");

		Ok(token)
	}

	/// Returns a usable cached token, exchanging credentials when none is cached.
	pub async fn bearer(&self) -> Result<BearerToken> {
		if let Some(token) = self.cache.usable_at(OffsetDateTime::now_utc()) {
			return Ok(token);
		}

		let stale = self.cache.current().map(|token| token.access_token);

		self.renew_from(stale.as_ref()).await
	}

	async fn renew_from(&self, stale: Option<&Secret>) -> Result<BearerToken> {
		let _singleflight = self.cache.renewal_guard().lock().await;

		if self.cache.replaced_since(stale) {
			if let Some(token) = self.cache.usable_at(OffsetDateTime::now_utc()) {
				return Ok(token);
			}
		}

		let result = self.request_new_token().await;

		obs::record_auth_renewal("azure", Outcome::of(&result));

		if let Err(e) = &result {
			obs::event!(error, "Could not generate an azure access token: {e}");
		}

		result
	}

	fn token_request(&self) -> Result<(AzureFlow, Request)> {
		if self.config.azure_use_managed_id {
			let request = self
				.http
				.request(Method::GET, self.config.azure_metadata_endpoint.clone())
				.header("Metadata", "true")
				.query(&[
					("api-version", METADATA_API_VERSION),
					("client_id", self.config.client_id()),
					("resource", self.config.azure_resource.as_str()),
				])
				.build()
				.map_err(|e| TransportError::network(self.config.azure_metadata_endpoint.as_str(), e))?;

			return Ok((AzureFlow::ManagedIdentity, request));
		}

		let (flow, form) = self.token_form()?;
		let request = self
			.http
			.request(Method::POST, self.config.azure_token_endpoint.clone())
			.form(&form)
			.build()
			.map_err(|e| TransportError::network(self.config.azure_token_endpoint.as_str(), e))?;

		Ok((flow, request))
	}

	fn token_form(&self) -> Result<(AzureFlow, Vec<(&'static str, String)>)> {
		let config = &self.config;

		if let Some(assertion) = read_federated_token(&config.azure_token_file) {
			return Ok((
				AzureFlow::WorkloadIdentity,
				vec![
					("grant_type", "client_credentials".into()),
					("client_assertion_type", CLIENT_ASSERTION_TYPE.into()),
					("client_assertion", assertion),
					("client_id", config.client_id().into()),
					("scope", format!("{}/.default", config.azure_resource)),
				],
			));
		}
		if config.azure_use_workload_id {
			return Err(
				AuthError::WorkloadTokenUnavailable { path: config.azure_token_file.clone() }.into()
			);
		}

		Ok((
			AzureFlow::ServicePrincipal,
			vec![
				("grant_type", "client_credentials".into()),
				("client_id", config.client_id().into()),
				("client_secret", config.client_secret().into()),
				("resource", config.azure_resource.clone()),
			],
		))
	}
}
impl Authorizer for AzureAuthorizer {
	fn authorize<'a>(&'a self, request: &'a mut Request) -> AuthFuture<'a, ()> {
		Box::pin(async move {
			let token = self.bearer().await?;
			let mut value = token
				.header_value()
				.parse::<reqwest::header::HeaderValue>()
				.map_err(|_| AuthError::Signing { reason: "bearer token is not a valid header".into() })?;

			value.set_sensitive(true);
			request.headers_mut().insert(AUTHORIZATION, value);

			Ok(())
		})
	}

	fn renew<'a>(&'a self, rejected: &'a HeaderMap) -> AuthFuture<'a, bool> {
		Box::pin(async move {
			let stale = rejected_bearer(rejected);

			self.renew_from(stale.as_ref()).await.map(|_| true)
		})
	}
}

/// Bearer token a rejected request was sent with.
fn rejected_bearer(headers: &HeaderMap) -> Option<Secret> {
	headers
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.map(Secret::new)
}

#[derive(Deserialize)]
struct TokenResponse {
	access_token: String,
	#[serde(default, deserialize_with = "lenient_seconds")]
	expires_in: Option<i64>,
	#[serde(default, deserialize_with = "lenient_seconds")]
	expires_on: Option<i64>,
}

fn parse_token_reply(reply: &HttpReply) -> Result<BearerToken> {
	if !reply.is_success() {
		let reason = reply.status.canonical_reason().unwrap_or("unexpected status");

		return Err(AuthError::AzureToken {
			reason: format!("{reason}: {}", reply.text().trim()),
			status: Some(reply.status.as_u16()),
		}
		.into());
	}

	let mut de = serde_json::Deserializer::from_slice(&reply.body);
	let response: TokenResponse = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| AuthError::TokenResponseParse { source })?;
	let token = BearerToken::new(response.access_token);
	let token = match (response.expires_in, response.expires_on) {
		(Some(secs), _) if secs > 0 => token.expires_in(Duration::seconds(secs)),
		(_, Some(epoch)) => match OffsetDateTime::from_unix_timestamp(epoch) {
			Ok(instant) => token.expires_at(instant),
			Err(_) => token,
		},
		_ => token,
	};

	Ok(token)
}

fn read_federated_token(path: &Path) -> Option<String> {
	match fs::read_to_string(path) {
		Ok(raw) => {
			let token = raw.trim();

			if token.is_empty() { None } else { Some(token.to_owned()) }
		},
		Err(e) if e.kind() == ErrorKind::NotFound => {
			obs::event!(
				info,
				"Workload identity token file not found, using Service Principal authentication."
			);

			None
		},
		Err(e) => {
			obs::event!(warn, "Failed to read workload identity token file: {e}");

			None
		},
	}
}

// Identity endpoints report lifetimes as numbers or numeric strings.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Seconds {
		Number(i64),
		Text(String),
	}

	match Option::<Seconds>::deserialize(deserializer)? {
		None => Ok(None),
		Some(Seconds::Number(value)) => Ok(Some(value)),
		Some(Seconds::Text(text)) =>
			text.trim().parse().map(Some).map_err(serde::de::Error::custom),
	}
}
