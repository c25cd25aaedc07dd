//! Typed view over the `data` object of a Prometheus query response.
//!
//! The raw envelope carries a `resultType` discriminant and a `result` payload whose shape depends
//! on it. [`QueryResult`] holds exactly one of the four shapes; it serializes back to JSON keyed by
//! `result_type`.

// crates.io
use serde_json::Value;
// self
use crate::{_prelude::*, error::ResultError};

/// Label set identifying a series.
pub type PrometheusMetric = BTreeMap<String, String>;

/// One `[timestamp, value]` sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalarValue {
	/// Unix timestamp in seconds (fractional).
	pub timestamp: f64,
	/// Sample value as reported; Prometheus encodes floats as strings.
	pub value: String,
}
impl ScalarValue {
	/// Parses a two-element `[timestamp, value]` array.
	pub fn from_raw(raw: &Value) -> Result<Self, ResultError> {
		let invalid = || ResultError::InvalidScalar { raw: raw.to_string() };
		let [timestamp, value] = raw.as_array().map(Vec::as_slice).ok_or_else(invalid)? else {
			return Err(invalid());
		};
		let timestamp = match timestamp {
			Value::Number(number) => number.as_f64(),
			Value::String(text) => text.trim().parse().ok(),
			_ => None,
		}
		.ok_or_else(invalid)?;

		Ok(Self { timestamp, value: stringify(value) })
	}
}

/// Instant-vector element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorSample {
	/// Series labels.
	pub metric: PrometheusMetric,
	/// Sample at the evaluation instant.
	pub value: ScalarValue,
}

/// Range-vector element with parallel timestamp and value columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrometheusSeries {
	/// Series labels.
	pub metric: PrometheusMetric,
	/// Sample timestamps, ascending as returned by the backend.
	pub timestamps: Vec<f64>,
	/// Sample values aligned with `timestamps`.
	pub values: Vec<String>,
}
impl PrometheusSeries {
	/// Number of samples in the series.
	pub fn len(&self) -> usize {
		self.values.len()
	}

	/// Returns true when the series has no samples.
	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Iterates `(timestamp, value)` pairs.
	pub fn points(&self) -> impl Iterator<Item = (f64, &str)> {
		self.timestamps.iter().copied().zip(self.values.iter().map(String::as_str))
	}
}

/// Parsed query result; exactly one shape per result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result_type", content = "result", rename_all = "snake_case")]
pub enum QueryResult {
	/// `string` (or `error`) result, stringified.
	String(String),
	/// Single sample.
	Scalar(ScalarValue),
	/// Instant vector.
	Vector(Vec<VectorSample>),
	/// Range vector.
	Matrix(Vec<PrometheusSeries>),
}
impl QueryResult {
	/// Maps the `data` object of a query response.
	pub fn from_data(data: &Value) -> Result<Self, ResultError> {
		let result_type = data
			.get("resultType")
			.and_then(Value::as_str)
			.filter(|kind| !kind.is_empty())
			.ok_or(ResultError::MissingResultType)?;
		let result =
			data.get("result").filter(|result| !result.is_null()).ok_or(ResultError::MissingResult)?;

		match (result_type, result) {
			("string" | "error", result) => Ok(Self::String(stringify(result))),
			("scalar", Value::Array(_)) => Ok(Self::Scalar(ScalarValue::from_raw(result)?)),
			("vector", Value::Array(items)) =>
				items.iter().map(vector_sample).collect::<Result<_, _>>().map(Self::Vector),
			("matrix", Value::Array(items)) =>
				items.iter().map(series).collect::<Result<_, _>>().map(Self::Matrix),
			_ => Err(ResultError::Invalid),
		}
	}

	/// Returns the discriminant label.
	pub const fn result_type(&self) -> &'static str {
		match self {
			Self::String(_) => "string",
			Self::Scalar(_) => "scalar",
			Self::Vector(_) => "vector",
			Self::Matrix(_) => "matrix",
		}
	}

	/// Returns the series of a matrix result.
	pub fn as_matrix(&self) -> Option<&[PrometheusSeries]> {
		match self {
			Self::Matrix(series) => Some(series),
			_ => None,
		}
	}

	/// Returns the samples of a vector result.
	pub fn as_vector(&self) -> Option<&[VectorSample]> {
		match self {
			Self::Vector(samples) => Some(samples),
			_ => None,
		}
	}

	/// Fails with [`Error::MetricsNotFound`] when a vector or matrix result holds no samples.
	pub fn require_samples(self, query: &str) -> Result<Self> {
		let empty = match &self {
			Self::Vector(samples) => samples.is_empty(),
			Self::Matrix(series) => series.iter().all(PrometheusSeries::is_empty),
			Self::String(_) | Self::Scalar(_) => false,
		};

		if empty {
			return Err(Error::MetricsNotFound { query: query.to_owned() });
		}

		Ok(self)
	}
}
impl TryFrom<&Value> for QueryResult {
	type Error = ResultError;

	fn try_from(data: &Value) -> Result<Self, Self::Error> {
		Self::from_data(data)
	}
}
impl TryFrom<Value> for QueryResult {
	type Error = ResultError;

	fn try_from(data: Value) -> Result<Self, Self::Error> {
		Self::from_data(&data)
	}
}

fn vector_sample(item: &Value) -> Result<VectorSample, ResultError> {
	Ok(VectorSample {
		metric: metric(item)?,
		value: ScalarValue::from_raw(
			item.get("value").ok_or(ResultError::MissingField { field: "value" })?,
		)?,
	})
}

fn series(item: &Value) -> Result<PrometheusSeries, ResultError> {
	let values = item
		.get("values")
		.and_then(Value::as_array)
		.ok_or(ResultError::MissingField { field: "values" })?;
	let mut timestamps = Vec::with_capacity(values.len());
	let mut samples = Vec::with_capacity(values.len());

	for value in values {
		let sample = ScalarValue::from_raw(value)?;

		timestamps.push(sample.timestamp);
		samples.push(sample.value);
	}

	Ok(PrometheusSeries { metric: metric(item)?, timestamps, values: samples })
}

fn metric(item: &Value) -> Result<PrometheusMetric, ResultError> {
	let labels = item
		.get("metric")
		.and_then(Value::as_object)
		.ok_or(ResultError::MissingField { field: "metric" })?;

	Ok(labels.iter().map(|(name, value)| (name.clone(), stringify(value))).collect())
}

fn stringify(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		other => other.to_string(),
	}
}
