//! PromQL queries, label listing, and series lookup.

// self
use crate::{
	_prelude::*,
	api::PrometheusApi,
	client::{
		PrometheusClient,
		common::{self, ApiRequest},
	},
	result::{PrometheusMetric, QueryResult},
};

impl PrometheusClient {
	/// Runs an instant query (`POST /api/v1/query`).
	///
	/// `params` are sent in the form body next to `query` (`time`, `timeout`, ...).
	pub async fn query(&self, query: &str, params: &[(&str, &str)]) -> Result<QueryResult> {
		let data = self.query_data(query, params).await?;

		Ok(QueryResult::from_data(&data)?)
	}

	/// Runs an instant query and returns the raw `data` object.
	pub async fn query_data(
		&self,
		query: &str,
		params: &[(&str, &str)],
	) -> Result<serde_json::Value> {
		let mut form = vec![("query".to_owned(), query.to_owned())];

		form.extend(common::owned_pairs(params));

		self.fetch_data(PrometheusApi::Query.as_str(), &ApiRequest::post_form("/api/v1/query", form))
			.await
	}

	/// Runs a range query (`POST /api/v1/query_range`); `start` and `end` are rounded to whole
	/// seconds.
	pub async fn query_range(
		&self,
		query: &str,
		start: OffsetDateTime,
		end: OffsetDateTime,
		step: &str,
		params: &[(&str, &str)],
	) -> Result<QueryResult> {
		let mut form = vec![
			("query".to_owned(), query.to_owned()),
			("start".to_owned(), common::unix_seconds(start).to_string()),
			("end".to_owned(), common::unix_seconds(end).to_string()),
			("step".to_owned(), step.to_owned()),
		];

		form.extend(common::owned_pairs(params));

		let data: serde_json::Value = self
			.fetch_data(
				PrometheusApi::QueryRange.as_str(),
				&ApiRequest::post_form("/api/v1/query_range", form),
			)
			.await?;

		Ok(QueryResult::from_data(&data)?)
	}

	/// Runs a range query over the configured `query_interval` ending now, at `query_step`.
	pub async fn query_recent(&self, query: &str) -> Result<QueryResult> {
		let interval = self.config.query_interval()?;
		let end = OffsetDateTime::now_utc();
		let start = Duration::try_from(interval)
			.ok()
			.and_then(|interval| end.checked_sub(interval))
			.unwrap_or(OffsetDateTime::UNIX_EPOCH);

		self.query_range(query, start, end, &self.config.query_step, &[]).await
	}

	/// Lists the values of a label (`GET /api/v1/label/<name>/values`).
	///
	/// Fails with [`Error::UnsupportedApi`] when the backend does not serve label endpoints.
	pub async fn label_values(&self, label: &str, params: &[(&str, &str)]) -> Result<Vec<String>> {
		self.require(PrometheusApi::Labels)?;

		let call = ApiRequest::get(format!("/api/v1/label/{label}/values")).with_query(params);

		self.fetch_data(PrometheusApi::Labels.as_str(), &call).await
	}

	/// Lists every metric name the backend knows about.
	pub async fn all_metrics(&self, params: &[(&str, &str)]) -> Result<Vec<String>> {
		self.label_values("__name__", params).await
	}

	/// Finds series matching any of the selectors (`POST /api/v1/series`).
	pub async fn series(
		&self,
		matches: &[&str],
		start: Option<OffsetDateTime>,
		end: Option<OffsetDateTime>,
		params: &[(&str, &str)],
	) -> Result<Vec<PrometheusMetric>> {
		let mut form = matches
			.iter()
			.map(|selector| ("match[]".to_owned(), (*selector).to_owned()))
			.collect::<Vec<_>>();

		if let Some(start) = start {
			form.push(("start".into(), common::unix_seconds(start).to_string()));
		}
		if let Some(end) = end {
			form.push(("end".into(), common::unix_seconds(end).to_string()));
		}

		let call = ApiRequest::post_form("/api/v1/series", form).with_query(params);

		self.fetch_data("series", &call).await
	}
}
