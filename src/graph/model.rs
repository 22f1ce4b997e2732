//! Domain records for the architecture graph.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::error::{GraphError, Result};

static UID_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{32}$").expect("Invalid regex pattern"));

/// Identifier of a process, component or edge: 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Uid(String);

/// Edges use the same id format as nodes
pub type EdgeId = Uid;

impl Uid {
    /// Fresh random id (UUID v4, hyphens stripped)
    pub fn generate() -> Self {
        Uid(Uuid::new_v4().simple().to_string())
    }

    /// Accept only well-formed ids
    pub fn parse(raw: &str) -> Result<Self> {
        if UID_FORMAT.is_match(raw) {
            Ok(Uid(raw.to_string()))
        } else {
            Err(GraphError::Validation(format!("malformed id {:?}", raw)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Uid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Uid::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Reject NaN and infinities; they can never be matched again by value.
pub fn check_finite(what: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GraphError::Validation(format!("{} must be a finite number, got {}", what, value)))
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GraphError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Metric names are natural keys: trimmed and non-empty.
pub fn metric_key(name: &str) -> Result<String> {
    require("metric name", name)?;
    Ok(name.trim().to_string())
}

/// Client-editable process attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessFields {
    pub name: String,
    pub responsible_person: String,
    #[serde(default)]
    pub description: String,
}

impl ProcessFields {
    pub fn validate(&self) -> Result<()> {
        require("process name", &self.name)?;
        require("responsible_person", &self.responsible_person)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Process {
    pub uid: Uid,
    pub name: String,
    pub responsible_person: String,
    pub description: String,
    pub creation_timestamp: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
}

/// Target value as sent by clients: `{"loc": {"value": 50}}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetValue {
    pub value: f64,
}

/// Requested targets, keyed by metric name
pub type TargetInput = BTreeMap<String, TargetValue>;

/// Resolved targets, metric name to value
pub type TargetMetrics = BTreeMap<String, f64>;

/// A component reached over an `includes` edge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncludedComponent {
    pub edge_id: EdgeId,
    pub uid: Uid,
    pub name: String,
    pub category: String,
    pub weight: f64,
}

/// Process with its outgoing edges resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub process: Process,
    pub target_metrics: TargetMetrics,
    pub components: Vec<IncludedComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentFields {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
}

impl ComponentFields {
    pub fn validate(&self) -> Result<()> {
        require("component name", &self.name)?;
        require("category", &self.category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub uid: Uid,
    pub name: String,
    pub category: String,
    pub description: String,
    pub creation_timestamp: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
}

/// A process that includes a component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessUsage {
    pub edge_id: EdgeId,
    pub process_uid: Uid,
    pub process_name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentRecord {
    pub component: Component,
    pub used_by: Vec<ProcessUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Metric {
    pub fn validate(&self) -> Result<()> {
        require("metric name", &self.name)
    }
}

/// A process that targets a metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricTarget {
    pub edge_id: EdgeId,
    pub process_uid: Uid,
    pub process_name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub metric: Metric,
    pub targeted_by: Vec<MetricTarget>,
}
