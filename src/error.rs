//! Client-level error types shared across configuration, authorization, and query paths.

// self
use crate::{_prelude::*, api::PrometheusApi};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential acquisition or request signing failed.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Backend answered with an unexpected status or payload.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Query result envelope could not be mapped.
	#[error(transparent)]
	Result(#[from] ResultError),

	/// Requested API is not exposed by the configured backend.
	#[error("{api} Api not supported")]
	UnsupportedApi {
		/// Capability the caller attempted to use.
		api: PrometheusApi,
	},
	/// Prometheus could not be reached or rejected the probe.
	#[error("Couldn't connect to Prometheus found under {url}.")]
	PrometheusNotFound {
		/// Base URL of the backend.
		url: String,
		/// Failure observed while probing.
		#[source]
		source: Box<Error>,
	},
	/// VictoriaMetrics could not be reached or returned an unreadable flag listing.
	#[error("Couldn't connect to VictoriaMetrics found under {url}.")]
	VictoriaMetricsNotFound {
		/// Base URL of the backend.
		url: String,
		/// Failure observed while probing.
		#[source]
		source: Box<Error>,
	},
	/// Runtime flags could not be fetched.
	#[error("Couldn't connect to the url: {url} ({service}).")]
	PrometheusFlagsConnection {
		/// Base URL of the backend.
		url: String,
		/// Human-readable backend family (`Prometheus` or `Victoria Metrics`).
		service: &'static str,
		/// Failure observed while fetching flags.
		#[source]
		source: Box<Error>,
	},
	/// Query succeeded but returned no usable samples.
	#[error("No metrics were returned for query `{query}`.")]
	MetricsNotFound {
		/// PromQL expression that came back empty.
		query: String,
	},
}
impl Error {
	/// Returns the HTTP status carried by the error chain, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api(ApiError::Status { status, .. }) => Some(*status),
			Self::Api(ApiError::ResponseParse { status, .. })
			| Self::Api(ApiError::Envelope { status, .. }) => *status,
			Self::PrometheusNotFound { source, .. }
			| Self::VictoriaMetricsNotFound { source, .. }
			| Self::PrometheusFlagsConnection { source, .. } => source.status(),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Backend URL does not use HTTP or HTTPS.
	#[error("The backend URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// URL that failed validation.
		url: String,
	},
	/// Backend URL cannot be joined with an API path.
	#[error("The backend URL cannot be used as a base: {url}.")]
	InvalidBaseUrl {
		/// URL that failed validation.
		url: String,
	},
	/// The configured capability set is empty.
	#[error("At least one Prometheus API must be supported.")]
	NoSupportedApis,
	/// `query_interval` is not a valid duration.
	#[error("Query interval `{value}` is not a valid duration.")]
	InvalidInterval {
		/// Raw interval string.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: humantime::DurationError,
	},
	/// A static header name or value cannot be sent over HTTP.
	#[error("Header `{name}` cannot be sent over HTTP.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// Config file or environment could not be extracted.
	#[error("Configuration could not be loaded.")]
	Load(#[from] Box<figment::Error>),
	/// Config list references an unknown backend type.
	#[error("Unknown backend type `{kind}`.")]
	UnknownBackend {
		/// Type label found in the config list.
		kind: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<figment::Error> for ConfigError {
	fn from(e: figment::Error) -> Self {
		Self::Load(Box::new(e))
	}
}

/// Credential acquisition and signing failures.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Azure token endpoint or metadata service rejected the request.
	#[error("Could not generate an azure access token: {reason}.")]
	AzureToken {
		/// Status line or reason string from the identity endpoint.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Workload identity was requested but no federated token is readable.
	#[error("Workload identity requested but token file {} not found or empty.", path.display())]
	WorkloadTokenUnavailable {
		/// Federated token file that was probed.
		path: PathBuf,
	},
	/// Identity endpoint answered with JSON that could not be parsed.
	#[error("Identity endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// No AWS credential source yielded a key pair.
	#[error("No AWS credentials found (neither static keys nor the default provider chain).")]
	MissingAwsCredentials,
	/// The AWS provider chain found a source but could not load keys from it.
	#[error("AWS credential provider failed: {reason}.")]
	CredentialsProvider {
		/// Provider error rendered with its causes.
		reason: String,
	},
	/// Service-account token could not be read for web identity federation.
	#[error("Service Account token not found at {}.", path.display())]
	ServiceAccountToken {
		/// Token path that was probed.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// STS refused to assume the role.
	#[error("Failed to assume role {role_arn} with web identity: {reason}.")]
	AssumeRole {
		/// Role the client attempted to assume.
		role_arn: String,
		/// STS error string.
		reason: String,
	},
	/// STS answered without a complete credential set.
	#[error("Failed to assume role: missing fields {missing:?}.")]
	IncompleteCredentials {
		/// Names of the absent credential fields.
		missing: Vec<&'static str>,
	},
	/// Request could not be signed.
	#[error("Request could not be signed: {reason}.")]
	Signing {
		/// Description of the signing failure.
		reason: String,
	},
}

/// Failures reported by the backend HTTP API.
#[derive(Debug, ThisError)]
pub enum ApiError {
	/// Backend answered with a non-success status.
	#[error("HTTP Status Code {status} ({body:?}).")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Response body preview.
		body: String,
		/// Retry-After hint, when supplied.
		retry_after: Option<Duration>,
	},
	/// Backend answered with JSON that does not match the Prometheus envelope.
	#[error("Prometheus API returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Envelope reported `status: error`.
	#[error("{}", envelope_message(.status, .error_type, .message))]
	Envelope {
		/// HTTP status code when the envelope rode on a non-2xx reply.
		status: Option<u16>,
		/// Prometheus `errorType` field.
		error_type: String,
		/// Prometheus `error` field.
		message: String,
	},
	/// Flag listing line was not `key=value`.
	#[error("Flag line `{line}` is not a key=value pair.")]
	MalformedFlag {
		/// Offending line.
		line: String,
	},
}

fn envelope_message(status: &Option<u16>, error_type: &str, message: &str) -> String {
	match *status {
		Some(status) => format!("HTTP Status Code {status} ({error_type}: {message})."),
		None => format!("Prometheus API reported {error_type}: {message}."),
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Endpoint being called.
		endpoint: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint: endpoint.into(), source: Box::new(src) }
	}
}

/// Raw query data could not be mapped into a [`crate::result::QueryResult`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ResultError {
	/// `resultType` field is absent.
	#[error("resultType missing")]
	MissingResultType,
	/// `result` field is absent.
	#[error("result object missing")]
	MissingResult,
	/// `resultType` and `result` do not agree.
	#[error("result or returnType is invalid")]
	Invalid,
	/// Sample pair did not hold exactly a timestamp and a value.
	#[error("Invalid prometheus scalar value {raw}")]
	InvalidScalar {
		/// JSON rendering of the offending sample.
		raw: String,
	},
	/// A vector or matrix entry lacked a required field.
	#[error("Result entry is missing `{field}`.")]
	MissingField {
		/// Field name.
		field: &'static str,
	},
}
