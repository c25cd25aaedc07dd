//! Prometheus HTTP API capabilities a backend may expose.

// self
use crate::_prelude::*;

/// HTTP API families a backend can serve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrometheusApi {
	/// Instant queries (`/api/v1/query`).
	Query,
	/// Range queries (`/api/v1/query_range`).
	QueryRange,
	/// Label value listing (`/api/v1/label/<name>/values`).
	Labels,
	/// Prometheus runtime flags (`/api/v1/status/flags`).
	Flags,
	/// VictoriaMetrics runtime flags (`/flags`).
	#[serde(alias = "vm-flags")]
	VmFlags,
}
impl PrometheusApi {
	/// Every capability, in declaration order.
	pub const ALL: [PrometheusApi; 5] =
		[Self::Query, Self::QueryRange, Self::Labels, Self::Flags, Self::VmFlags];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			PrometheusApi::Query => "query",
			PrometheusApi::QueryRange => "query_range",
			PrometheusApi::Labels => "labels",
			PrometheusApi::Flags => "flags",
			PrometheusApi::VmFlags => "vm_flags",
		}
	}

	const fn title(self) -> &'static str {
		match self {
			PrometheusApi::Query => "Query",
			PrometheusApi::QueryRange => "Query Range",
			PrometheusApi::Labels => "Labels",
			PrometheusApi::Flags => "Flags",
			PrometheusApi::VmFlags => "VictoriaMetrics Flags",
		}
	}
}
impl Display for PrometheusApi {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.title())
	}
}

/// Set of capability flags attached to a backend config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PrometheusApi>", into = "Vec<PrometheusApi>")]
pub struct ApiSet {
	/// Instant queries are available.
	pub query: bool,
	/// Range queries are available.
	pub query_range: bool,
	/// Label value listing is available.
	pub labels: bool,
	/// Prometheus flags endpoint is available.
	pub flags: bool,
	/// VictoriaMetrics flags endpoint is available.
	pub vm_flags: bool,
}
impl ApiSet {
	/// Builds a set from a list of capabilities.
	pub fn of<I>(apis: I) -> Self
	where
		I: IntoIterator<Item = PrometheusApi>,
	{
		apis.into_iter().fold(Self::default(), Self::enable)
	}

	/// Returns true if the provided capability is present.
	pub fn supports(self, api: PrometheusApi) -> bool {
		match api {
			PrometheusApi::Query => self.query,
			PrometheusApi::QueryRange => self.query_range,
			PrometheusApi::Labels => self.labels,
			PrometheusApi::Flags => self.flags,
			PrometheusApi::VmFlags => self.vm_flags,
		}
	}

	/// Marks a capability as available.
	pub fn enable(mut self, api: PrometheusApi) -> Self {
		match api {
			PrometheusApi::Query => self.query = true,
			PrometheusApi::QueryRange => self.query_range = true,
			PrometheusApi::Labels => self.labels = true,
			PrometheusApi::Flags => self.flags = true,
			PrometheusApi::VmFlags => self.vm_flags = true,
		}

		self
	}

	/// Returns true when no capability is enabled.
	pub fn is_empty(self) -> bool {
		!PrometheusApi::ALL.iter().any(|api| self.supports(*api))
	}

	/// Iterates the enabled capabilities in declaration order.
	pub fn iter(self) -> impl Iterator<Item = PrometheusApi> {
		PrometheusApi::ALL.into_iter().filter(move |api| self.supports(*api))
	}
}
impl From<Vec<PrometheusApi>> for ApiSet {
	fn from(value: Vec<PrometheusApi>) -> Self {
		Self::of(value)
	}
}
impl From<ApiSet> for Vec<PrometheusApi> {
	fn from(value: ApiSet) -> Self {
		value.iter().collect()
	}
}
