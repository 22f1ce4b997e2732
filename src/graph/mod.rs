//! Architecture knowledge graph: Process, Component and Metric nodes joined by
//! `includes{weight}` and `targets{value}` edges.
//!
//! Data flow for every operation: repository or relationship manager ->
//! `queries` (statement) -> `Db` transaction -> rows -> `reformat` -> record.

mod component;
mod metric;
mod model;
mod process;
mod relationships;

pub mod queries;
pub mod reformat;

pub use component::Components;
pub use metric::Metrics;
pub use model::{
    check_finite, metric_key, Component, ComponentFields, ComponentRecord, EdgeId, IncludedComponent,
    Metric, MetricRecord, MetricTarget, Process, ProcessFields, ProcessRecord, ProcessUsage,
    TargetInput, TargetMetrics, TargetValue, Uid,
};
pub use process::Processes;
pub use relationships::Relationships;
