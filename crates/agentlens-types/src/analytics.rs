//! Metric, Issue, Annotation, Recommendation — the artifacts analytics plugins produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::element::ElementHeader;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    Numeric,
    String,
    Distribution,
    TimeSeries,
    Histogram,
    Statistics,
}

/// The union-typed metric value, tagged by `metric_type`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Numeric(f64),
    String(String),
    Distribution(std::collections::HashMap<String, u64>),
    TimeSeries(Vec<(DateTime<Utc>, f64)>),
    Histogram(Vec<f64>),
    Statistics(std::collections::HashMap<String, f64>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Metric {
    #[serde(flatten)]
    pub header: ElementHeader,
    pub metric_type: MetricType,
    pub value: MetricValue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum IssueLevel {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Issue {
    #[serde(flatten)]
    pub header: ElementHeader,
    pub level: IssueLevel,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub effect: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(flatten)]
    pub header: ElementHeader,
    pub annotation_type: String,
    pub path_to_string: Option<String>,
    pub segment_start: Option<u64>,
    pub segment_end: Option<u64>,
    pub annotation_title: Option<String>,
    pub annotation_content: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub header: ElementHeader,
    pub level: IssueLevel,
    #[serde(default)]
    pub effect: Vec<String>,
    pub timestamp: DateTime<Utc>,
}
