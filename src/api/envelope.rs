use serde::Serialize;

use crate::graph::{
    Component, ComponentRecord, EdgeId, Metric, MetricRecord, Process, ProcessRecord, Uid,
};

/// Uniform result wrapper: `{"success": true, ...payload}`.
///
/// Only successful outcomes are wrapped. Failures travel as `GraphError`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(payload: T) -> Self {
        Self { success: true, payload }
    }
}

/// Empty payload
#[derive(Debug, Clone, Default, Serialize)]
pub struct Done {}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessList {
    pub process: Vec<Process>,
}

/// `process`, `target_metrics` and `components` at top level
pub type ProcessView = ProcessRecord;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessSaved {
    pub process_uid: Uid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentList {
    pub components: Vec<Component>,
}

pub type ComponentView = ComponentRecord;

#[derive(Debug, Clone, Serialize)]
pub struct ComponentSaved {
    pub component_uid: Uid,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricList {
    pub metrics: Vec<Metric>,
}

pub type MetricView = MetricRecord;

#[derive(Debug, Clone, Serialize)]
pub struct MetricSaved {
    pub metric_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsImported {
    pub imported: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeTouched {
    pub edge_id: EdgeId,
}
