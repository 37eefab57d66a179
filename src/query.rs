use crate::{
    metric::{Point, RawSample},
    normalize::{normalize_raw, parse_sample, NormalizeError},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

const INSTANCE_LABEL: &str = "instance";

#[derive(Error, Debug, PartialEq)]
pub enum QueryError {
    #[error("metrics query failed ({error_type}): {message}")]
    Api { error_type: String, message: String },
    #[error("metrics response has no data")]
    MissingData,
    #[error("{0} results can't be charted")]
    UnsupportedResult(&'static str),
    #[error("error normalizing query result")]
    Normalize(#[from] NormalizeError),
}

/// A query feeding one or more chart datasets.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartQuery {
    pub query: String,
    // Seconds between points, falls back to the configured default.
    #[serde(default)]
    pub step: Option<i64>,
    // Merged over every dataset the query produces.
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl ChartQuery {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            step: None,
            options: Map::new(),
        }
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_option(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }

    pub fn step_or(&self, default_step: i64) -> i64 {
        self.step.unwrap_or(default_step)
    }
}

impl From<&str> for ChartQuery {
    fn from(query: &str) -> Self {
        ChartQuery::new(query)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub status: Status,
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl QueryResponse {
    pub fn into_data(self) -> Result<QueryData, QueryError> {
        match self.status {
            Status::Success => self.data.ok_or(QueryError::MissingData),
            Status::Error => Err(QueryError::Api {
                error_type: self.error_type.unwrap_or_default(),
                message: self.error.unwrap_or_default(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryData {
    Matrix(Vec<RangeSeries>),
    Vector(Vec<InstantSeries>),
    Scalar(RawSample),
    String(RawSample),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RangeSeries {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    pub values: Vec<RawSample>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstantSeries {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    pub value: RawSample,
}

/// What a chart draws for one dataset. Range queries give a series,
/// instant queries give the single current value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DatasetData {
    Series(Vec<Point>),
    Scalar(f64),
}

impl DatasetData {
    /// Latest value, as shown in chart legends. None for an empty series
    /// or a series ending in a gap.
    pub fn current(&self) -> Option<f64> {
        match self {
            DatasetData::Series(points) => points.last().and_then(|p| p.value),
            DatasetData::Scalar(value) => Some(*value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub data: DatasetData,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl Dataset {
    fn new(metric: &BTreeMap<String, String>, data: DatasetData, query: &ChartQuery) -> Self {
        let mut options = query.options.clone();
        // `data` belongs to the query result and can't be overridden.
        options.remove("data");
        let label = match options.remove("label") {
            Some(Value::String(label)) => Some(label),
            _ => metric.get(INSTANCE_LABEL).cloned(),
        };
        Self {
            label,
            data,
            options,
        }
    }
}

/// Turns a query response into chart datasets, one per returned series.
pub fn datasets(
    query: &ChartQuery,
    response: QueryResponse,
    default_step: i64,
) -> Result<Vec<Dataset>, QueryError> {
    match response.into_data()? {
        QueryData::Matrix(series) => {
            let step = query.step_or(default_step);
            series
                .iter()
                .map(|s| -> Result<Dataset, QueryError> {
                    let points = normalize_raw(&s.values, step)?;
                    Ok(Dataset::new(&s.metric, DatasetData::Series(points), query))
                })
                .collect()
        }
        QueryData::Vector(series) => series
            .iter()
            .map(|s| -> Result<Dataset, QueryError> {
                let value = scalar(&s.value)?;
                Ok(Dataset::new(&s.metric, DatasetData::Scalar(value), query))
            })
            .collect(),
        QueryData::Scalar(sample) => {
            let value = scalar(&sample)?;
            Ok(vec![Dataset::new(
                &BTreeMap::new(),
                DatasetData::Scalar(value),
                query,
            )])
        }
        QueryData::String(_) => Err(QueryError::UnsupportedResult("string")),
    }
}

/// Datasets for several queries, flattened in query order.
pub fn all_datasets(
    queries: &[ChartQuery],
    responses: Vec<QueryResponse>,
    default_step: i64,
) -> Result<Vec<Dataset>, QueryError> {
    let mut result = vec![];
    for (query, response) in queries.iter().zip(responses) {
        result.append(&mut datasets(query, response, default_step)?);
    }
    Ok(result)
}

fn scalar(sample: &RawSample) -> Result<f64, NormalizeError> {
    parse_sample(sample).map(|(_, value)| value)
}
