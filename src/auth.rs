//! Per-backend request authorization.
//!
//! Every outbound request passes through an [`Authorizer`]. Static credentials (Coralogix
//! tokens, a raw `Authorization` value) are plain headers; Azure Monitor uses OAuth bearer tokens
//! from a process-wide [`TokenCache`]; AWS Managed Prometheus signs each request with SigV4.
//! When the backend answers 401, the client calls [`Authorizer::renew`] once with the headers the
//! rejected attempt carried and retries if the authorizer produced fresh credentials.

pub mod aws;
pub mod azure;
pub mod header;
pub mod secret;
pub mod token;

pub use aws::SigV4Authorizer;
pub use azure::AzureAuthorizer;
pub use header::HeaderAuthorizer;
pub use secret::*;
pub use token::*;

// crates.io
use reqwest::{Request, StatusCode, header::HeaderMap};
// self
use crate::{
	_prelude::*,
	config::{Backend, PrometheusConfig},
	http::ReqwestHttpClient,
};

/// Boxed future returned by [`Authorizer`] hooks.
pub type AuthFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Attaches credentials to outbound requests and renews them on demand.
pub trait Authorizer
where
	Self: Send + Sync,
{
	/// Decorates a fully built request (URL, headers, and body are final).
	fn authorize<'a>(&'a self, request: &'a mut Request) -> AuthFuture<'a, ()>;

	/// Replaces rejected credentials; resolves to `true` when a retry may succeed.
	///
	/// `rejected` holds the headers the rejected attempt was sent with. Callers rejected with
	/// credentials that were already replaced reuse the replacement instead of renewing again.
	/// The default implementation has nothing to renew.
	fn renew<'a>(&'a self, rejected: &'a HeaderMap) -> AuthFuture<'a, bool> {
		let _ = rejected;

		Box::pin(async { Ok(false) })
	}

	/// Returns true when a reply with `status` means the credentials were rejected.
	fn renews_on(&self, status: StatusCode) -> bool {
		status == StatusCode::UNAUTHORIZED
	}
}

/// Returns true when an Azure config carries enough identity to request tokens.
///
/// Client and tenant ids are mandatory; at least one of a client secret, managed identity, or
/// workload identity must be enabled.
pub fn azure_authorization(config: &PrometheusConfig) -> bool {
	let Backend::Azure(azure) = &config.backend else {
		return false;
	};

	(!azure.client_id().is_empty() && !azure.tenant_id().is_empty())
		&& (!azure.client_secret().is_empty()
			|| azure.azure_use_managed_id
			|| azure.azure_use_workload_id)
}

/// Derives the authorization headers for a config.
///
/// Precedence: the Coralogix `token` header, then a raw `Authorization` value, then the cached
/// Azure bearer token. Azure configs without a cached token yield an empty bearer, matching
/// what the backend sees before the first token exchange.
pub fn authorization_headers(config: &PrometheusConfig) -> BTreeMap<String, String> {
	let mut headers = BTreeMap::new();

	if let Backend::Coralogix(coralogix) = &config.backend {
		headers.insert("token".into(), coralogix.prometheus_token.expose().to_owned());
	} else if let Some(auth) = &config.prometheus_auth {
		headers.insert("Authorization".into(), auth.expose().to_owned());
	} else if azure_authorization(config) {
		let bearer = TokenCache::shared()
			.current()
			.map(|token| token.access_token.expose().to_owned())
			.unwrap_or_default();

		headers.insert("Authorization".into(), format!("Bearer {bearer}"));
	}

	headers
}

/// Picks the authorizer for a config.
///
/// AWS resolves credentials eagerly (including any STS role assumption) so misconfiguration
/// surfaces at connect time. AWS traffic to STS and the credential chain rides on the AWS SDK's
/// own HTTP client.
pub async fn authorizer_for(
	config: &PrometheusConfig,
	http: &ReqwestHttpClient,
) -> Result<Arc<dyn Authorizer>> {
	let authorizer: Arc<dyn Authorizer> = match &config.backend {
		Backend::Aws(aws) => Arc::new(SigV4Authorizer::connect(aws).await?),
		Backend::Azure(azure) if config.prometheus_auth.is_none() && azure_authorization(config) =>
			Arc::new(AzureAuthorizer::new(azure.clone(), http.clone())),
		_ => Arc::new(HeaderAuthorizer::from_map(&authorization_headers(config))?),
	};

	Ok(authorizer)
}
