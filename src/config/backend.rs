//! Provider-specific settings carried by [`Backend`](crate::config::Backend).

// self
use crate::{
	_prelude::*,
	api::{ApiSet, PrometheusApi},
	auth::Secret,
};

const DEFAULT_AWS_SERVICE: &str = "aps";
const DEFAULT_AZURE_TOKEN_FILE: &str = "/var/run/secrets/azure/tokens/azure-identity-token";

/// Backend family plus the credentials it needs.
///
/// The discriminant is read from the `type` field. The class-style names used by older
/// configuration files (`AWSPrometheusConfig`, `AzurePrometheusConfig`, ...) are accepted as
/// aliases.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backend {
	/// Vanilla Prometheus (or any API-compatible server).
	#[serde(alias = "PrometheusConfig")]
	Prometheus,
	/// VictoriaMetrics single-node or cluster.
	#[serde(alias = "VictoriaMetricsPrometheusConfig")]
	VictoriaMetrics,
	/// AWS Managed Prometheus, SigV4-signed.
	#[serde(alias = "AWSPrometheusConfig")]
	Aws(AwsConfig),
	/// Azure Monitor managed Prometheus, OAuth bearer tokens.
	#[serde(alias = "AzurePrometheusConfig")]
	Azure(AzureConfig),
	/// Coralogix, static `token` header.
	#[serde(alias = "CoralogixPrometheusConfig")]
	Coralogix(CoralogixConfig),
}
impl Backend {
	/// Capabilities the backend exposes unless the config overrides them.
	pub fn default_apis(&self) -> ApiSet {
		use PrometheusApi::*;

		match self {
			Self::Prometheus => ApiSet::of([Query, QueryRange, Labels, Flags]),
			Self::VictoriaMetrics => ApiSet::of([Query, QueryRange, Labels, VmFlags]),
			Self::Aws(_) | Self::Coralogix(_) => ApiSet::of([Query, QueryRange, Labels]),
			// Azure Monitor does not serve the label endpoints.
			Self::Azure(_) => ApiSet::of([Query, QueryRange]),
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Prometheus => "prometheus",
			Self::VictoriaMetrics => "victoria_metrics",
			Self::Aws(_) => "aws",
			Self::Azure(_) => "azure",
			Self::Coralogix(_) => "coralogix",
		}
	}
}
impl Display for Backend {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// AWS Managed Prometheus settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsConfig {
	/// Region the workspace lives in; also the SigV4 signing region.
	pub aws_region: String,
	/// Static access key id.
	#[serde(default)]
	pub access_key: Option<String>,
	/// Static secret access key.
	#[serde(default)]
	pub secret_access_key: Option<Secret>,
	/// Static session token paired with temporary keys.
	#[serde(default)]
	pub token: Option<Secret>,
	/// SigV4 service name.
	#[serde(default = "default_aws_service")]
	pub service_name: String,
	/// Role assumed through STS web identity federation before signing.
	#[serde(default)]
	pub assume_role_arn: Option<String>,
}
impl AwsConfig {
	/// Creates settings for the provided region with every optional field unset.
	pub fn new(region: impl Into<String>) -> Self {
		Self {
			aws_region: region.into(),
			access_key: None,
			secret_access_key: None,
			token: None,
			service_name: default_aws_service(),
			assume_role_arn: None,
		}
	}

	/// Sets a static key pair.
	pub fn with_static_keys(
		mut self,
		access_key: impl Into<String>,
		secret_access_key: impl Into<String>,
	) -> Self {
		self.access_key = Some(access_key.into());
		self.secret_access_key = Some(Secret::new(secret_access_key));

		self
	}

	/// Sets the role assumed through STS.
	pub fn with_assume_role(mut self, role_arn: impl Into<String>) -> Self {
		self.assume_role_arn = Some(role_arn.into());

		self
	}
}

/// Azure Monitor settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureConfig {
	/// Resource (audience) the token is requested for.
	pub azure_resource: String,
	/// Instance metadata endpoint used by managed identity.
	pub azure_metadata_endpoint: Url,
	/// Token endpoint used by service principal and workload identity.
	pub azure_token_endpoint: Url,
	/// Requests tokens from the instance metadata endpoint.
	#[serde(default, deserialize_with = "lenient_flag")]
	pub azure_use_managed_id: bool,
	/// Requires the federated workload identity token.
	#[serde(default, deserialize_with = "lenient_flag")]
	pub azure_use_workload_id: bool,
	/// Application (client) id.
	#[serde(default)]
	pub azure_client_id: Option<String>,
	/// Directory (tenant) id.
	#[serde(default)]
	pub azure_tenant_id: Option<String>,
	/// Client secret for service principal auth.
	#[serde(default)]
	pub azure_client_secret: Option<Secret>,
	/// Federated token projected by the workload identity webhook.
	#[serde(default = "default_azure_token_file")]
	pub azure_token_file: PathBuf,
}
impl AzureConfig {
	/// Creates settings for the provided resource and endpoints with every optional field unset.
	pub fn new(resource: impl Into<String>, metadata_endpoint: Url, token_endpoint: Url) -> Self {
		Self {
			azure_resource: resource.into(),
			azure_metadata_endpoint: metadata_endpoint,
			azure_token_endpoint: token_endpoint,
			azure_use_managed_id: false,
			azure_use_workload_id: false,
			azure_client_id: None,
			azure_tenant_id: None,
			azure_client_secret: None,
			azure_token_file: default_azure_token_file(),
		}
	}

	/// Sets the client and tenant ids.
	pub fn with_identity(mut self, client_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
		self.azure_client_id = Some(client_id.into());
		self.azure_tenant_id = Some(tenant_id.into());

		self
	}

	/// Sets the service principal secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.azure_client_secret = Some(Secret::new(secret));

		self
	}

	/// Toggles managed identity.
	pub fn with_managed_identity(mut self, enabled: bool) -> Self {
		self.azure_use_managed_id = enabled;

		self
	}

	/// Toggles the workload identity requirement.
	pub fn with_workload_identity(mut self, enabled: bool) -> Self {
		self.azure_use_workload_id = enabled;

		self
	}

	/// Overrides the federated token path.
	pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.azure_token_file = path.into();

		self
	}

	pub(crate) fn client_id(&self) -> &str {
		self.azure_client_id.as_deref().unwrap_or_default()
	}

	pub(crate) fn tenant_id(&self) -> &str {
		self.azure_tenant_id.as_deref().unwrap_or_default()
	}

	pub(crate) fn client_secret(&self) -> &str {
		self.azure_client_secret.as_ref().map(Secret::expose).unwrap_or_default()
	}
}

/// Coralogix settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoralogixConfig {
	/// Token sent in the `token` header.
	pub prometheus_token: Secret,
}

fn default_aws_service() -> String {
	DEFAULT_AWS_SERVICE.into()
}

fn default_azure_token_file() -> PathBuf {
	PathBuf::from(DEFAULT_AZURE_TOKEN_FILE)
}

// Older configs carry these toggles as free-form strings.
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
	D: serde::Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Flag {
		Bool(bool),
		Text(String),
	}

	Ok(match Option::<Flag>::deserialize(deserializer)? {
		None => false,
		Some(Flag::Bool(value)) => value,
		Some(Flag::Text(text)) =>
			!matches!(text.trim().to_ascii_lowercase().as_str(), "" | "false" | "0" | "no"),
	})
}
