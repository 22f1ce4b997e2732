//! Turns flat rows from `queries` into nested records.
//!
//! Rows are expected in exactly the column order the matching builder
//! documents; anything else is reported as an internal error.

use crate::db::Row;
use crate::error::{GraphError, Result};
use super::model::{
    Component, ComponentRecord, EdgeId, IncludedComponent, Metric, MetricRecord, MetricTarget,
    Process, ProcessRecord, ProcessUsage, TargetMetrics, Uid,
};

fn uid_at(row: &Row, idx: usize) -> Result<Uid> {
    let raw = row.text(idx)?;
    Uid::parse(raw).map_err(|_| GraphError::internal(format!("column {}: stored id {:?} is malformed", idx, raw)))
}

/// Single edge id column from a `find_*` lookup
pub fn edge_id(row: &Row) -> Result<EdgeId> {
    uid_at(row, 0)
}

pub fn process(row: &Row) -> Result<Process> {
    Ok(Process {
        uid: uid_at(row, 0)?,
        name: row.text(1)?.to_string(),
        responsible_person: row.text(2)?.to_string(),
        description: row.text(3)?.to_string(),
        creation_timestamp: row.timestamp(4)?,
        last_timestamp: row.timestamp(5)?,
    })
}

pub fn process_list(rows: &[Row]) -> Result<Vec<Process>> {
    rows.iter().map(process).collect()
}

pub fn included_component(row: &Row) -> Result<IncludedComponent> {
    Ok(IncludedComponent {
        edge_id: uid_at(row, 0)?,
        uid: uid_at(row, 1)?,
        name: row.text(2)?.to_string(),
        category: row.text(3)?.to_string(),
        weight: row.real(4)?,
    })
}

/// Builds the nested process from the `get_process` join (one row per target,
/// a single all-NULL target row when there are none) and the
/// `get_process_components` rows.
pub fn process_record(rows: &[Row], component_rows: &[Row]) -> Result<ProcessRecord> {
    let first = rows
        .first()
        .ok_or_else(|| GraphError::internal("process_record called without a process row"))?;
    let process = process(first)?;

    let mut target_metrics = TargetMetrics::new();
    for row in rows {
        if row.text(0)? != process.uid.as_str() {
            return Err(GraphError::internal(format!(
                "target row for process {:?} mixed into process {}",
                row.text(0)?,
                process.uid
            )));
        }
        match (row.opt_text(6)?, row.opt_real(7)?) {
            (Some(name), Some(value)) => {
                target_metrics.insert(name.to_string(), value);
            }
            (None, None) => {}
            (name, value) => {
                return Err(GraphError::internal(format!(
                    "half-populated target row for process {}: {:?} / {:?}",
                    process.uid, name, value
                )));
            }
        }
    }

    let components = component_rows
        .iter()
        .map(included_component)
        .collect::<Result<Vec<_>>>()?;

    Ok(ProcessRecord { process, target_metrics, components })
}

/// `get_process_targets` rows to a name/value map
pub fn target_metrics(rows: &[Row]) -> Result<TargetMetrics> {
    rows.iter()
        .map(|row| Ok((row.text(1)?.to_string(), row.real(2)?)))
        .collect()
}

pub fn component(row: &Row) -> Result<Component> {
    Ok(Component {
        uid: uid_at(row, 0)?,
        name: row.text(1)?.to_string(),
        category: row.text(2)?.to_string(),
        description: row.text(3)?.to_string(),
        creation_timestamp: row.timestamp(4)?,
        last_timestamp: row.timestamp(5)?,
    })
}

pub fn component_list(rows: &[Row]) -> Result<Vec<Component>> {
    rows.iter().map(component).collect()
}

pub fn component_record(row: &Row, usage_rows: &[Row]) -> Result<ComponentRecord> {
    let used_by = usage_rows
        .iter()
        .map(|r| {
            Ok(ProcessUsage {
                edge_id: uid_at(r, 0)?,
                process_uid: uid_at(r, 1)?,
                process_name: r.text(2)?.to_string(),
                weight: r.real(3)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ComponentRecord { component: component(row)?, used_by })
}

pub fn metric(row: &Row) -> Result<Metric> {
    Ok(Metric {
        name: row.text(0)?.to_string(),
        description: row.text(1)?.to_string(),
    })
}

pub fn metric_list(rows: &[Row]) -> Result<Vec<Metric>> {
    rows.iter().map(metric).collect()
}

pub fn metric_record(row: &Row, target_rows: &[Row]) -> Result<MetricRecord> {
    let targeted_by = target_rows
        .iter()
        .map(|r| {
            Ok(MetricTarget {
                edge_id: uid_at(r, 0)?,
                process_uid: uid_at(r, 1)?,
                process_name: r.text(2)?.to_string(),
                value: r.real(3)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(MetricRecord { metric: metric(row)?, targeted_by })
}

/// Inverse of `process_record`, used to check the two layers agree.
#[cfg(test)]
pub(crate) fn flatten_process(record: &ProcessRecord) -> (Vec<Row>, Vec<Row>) {
    use rusqlite::types::Value;

    let p = &record.process;
    let base = vec![
        Value::Text(p.uid.to_string()),
        Value::Text(p.name.clone()),
        Value::Text(p.responsible_person.clone()),
        Value::Text(p.description.clone()),
        Value::Text(p.creation_timestamp.to_rfc3339()),
        Value::Text(p.last_timestamp.to_rfc3339()),
    ];

    let rows = if record.target_metrics.is_empty() {
        let mut cols = base.clone();
        cols.extend([Value::Null, Value::Null]);
        vec![Row::new(cols)]
    } else {
        record
            .target_metrics
            .iter()
            .map(|(name, value)| {
                let mut cols = base.clone();
                cols.extend([Value::Text(name.clone()), Value::Real(*value)]);
                Row::new(cols)
            })
            .collect()
    };

    let component_rows = record
        .components
        .iter()
        .map(|c| {
            Row::new(vec![
                Value::Text(c.edge_id.to_string()),
                Value::Text(c.uid.to_string()),
                Value::Text(c.name.clone()),
                Value::Text(c.category.clone()),
                Value::Real(c.weight),
            ])
        })
        .collect();

    (rows, component_rows)
}
