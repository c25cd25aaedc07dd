// self
use crate::obs::Outcome;

/// Records a request outcome via the global metrics recorder (when enabled).
pub fn record_request_outcome(api: &'static str, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"prometrix_request_total",
			"api" => api,
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (api, outcome);
	}
}

/// Records a credential renewal outcome via the global metrics recorder (when enabled).
pub fn record_auth_renewal(backend: &'static str, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"prometrix_auth_renewal_total",
			"backend" => backend,
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (backend, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_are_noops_without_an_installed_recorder() {
		record_request_outcome("query", Outcome::Failure);
		record_auth_renewal("azure", Outcome::Success);
	}
}
