//! Statement builders for every node and edge operation.
//!
//! Pure: each function only assembles SQL text and bound parameters. Column
//! order of the read statements is part of the contract with `reformat`.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

use crate::db::Statement;
use super::model::{ComponentFields, Metric, ProcessFields, Uid};

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn uid(u: &Uid) -> Value {
    text(u.as_str())
}

fn real(v: f64) -> Value {
    Value::Real(v)
}

fn stamp(ts: &DateTime<Utc>) -> Value {
    Value::Text(ts.to_rfc3339())
}

// ---- Process ----

/// Columns: uid, name, responsible_person, description, creation_timestamp, last_timestamp
pub fn get_process_list() -> Statement {
    Statement::new(
        "SELECT uid, name, responsible_person, description, creation_timestamp, last_timestamp \
         FROM process ORDER BY name COLLATE NOCASE, uid",
        vec![],
    )
}

/// Process columns followed by metric_name, value (NULL when no targets)
pub fn get_process(process_uid: &Uid) -> Statement {
    Statement::new(
        "SELECT p.uid, p.name, p.responsible_person, p.description, p.creation_timestamp, p.last_timestamp, \
                t.metric_name, t.value \
         FROM process p LEFT JOIN targets t ON t.process_uid = p.uid \
         WHERE p.uid = ?1 \
         ORDER BY t.metric_name",
        vec![uid(process_uid)],
    )
}

/// Columns: edge_id, component uid, name, category, weight
pub fn get_process_components(process_uid: &Uid) -> Statement {
    Statement::new(
        "SELECT i.edge_id, c.uid, c.name, c.category, i.weight \
         FROM includes i JOIN component c ON c.uid = i.component_uid \
         WHERE i.process_uid = ?1 \
         ORDER BY i.weight, i.rowid",
        vec![uid(process_uid)],
    )
}

pub fn process_exists(process_uid: &Uid) -> Statement {
    Statement::new("SELECT 1 FROM process WHERE uid = ?1", vec![uid(process_uid)])
}

pub fn add_process(process_uid: &Uid, fields: &ProcessFields, now: &DateTime<Utc>) -> Statement {
    Statement::new(
        "INSERT INTO process (uid, name, responsible_person, description, creation_timestamp, last_timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        vec![
            uid(process_uid),
            text(&fields.name),
            text(&fields.responsible_person),
            text(&fields.description),
            stamp(now),
        ],
    )
}

/// Leaves creation_timestamp alone
pub fn update_process(process_uid: &Uid, fields: &ProcessFields, now: &DateTime<Utc>) -> Statement {
    Statement::new(
        "UPDATE process SET name = ?2, responsible_person = ?3, description = ?4, last_timestamp = ?5 \
         WHERE uid = ?1",
        vec![
            uid(process_uid),
            text(&fields.name),
            text(&fields.responsible_person),
            text(&fields.description),
            stamp(now),
        ],
    )
}

pub fn delete_process_includes(process_uid: &Uid) -> Statement {
    Statement::new("DELETE FROM includes WHERE process_uid = ?1", vec![uid(process_uid)])
}

pub fn delete_process_targets(process_uid: &Uid) -> Statement {
    Statement::new("DELETE FROM targets WHERE process_uid = ?1", vec![uid(process_uid)])
}

pub fn delete_process(process_uid: &Uid) -> Statement {
    Statement::new("DELETE FROM process WHERE uid = ?1", vec![uid(process_uid)])
}

// ---- Component ----

/// Columns: uid, name, category, description, creation_timestamp, last_timestamp
pub fn get_component_list() -> Statement {
    Statement::new(
        "SELECT uid, name, category, description, creation_timestamp, last_timestamp \
         FROM component ORDER BY name COLLATE NOCASE, uid",
        vec![],
    )
}

pub fn get_component(component_uid: &Uid) -> Statement {
    Statement::new(
        "SELECT uid, name, category, description, creation_timestamp, last_timestamp \
         FROM component WHERE uid = ?1",
        vec![uid(component_uid)],
    )
}

/// Columns: edge_id, process uid, process name, weight
pub fn get_component_usages(component_uid: &Uid) -> Statement {
    Statement::new(
        "SELECT i.edge_id, p.uid, p.name, i.weight \
         FROM includes i JOIN process p ON p.uid = i.process_uid \
         WHERE i.component_uid = ?1 \
         ORDER BY i.rowid",
        vec![uid(component_uid)],
    )
}

pub fn component_exists(component_uid: &Uid) -> Statement {
    Statement::new("SELECT 1 FROM component WHERE uid = ?1", vec![uid(component_uid)])
}

pub fn add_component(component_uid: &Uid, fields: &ComponentFields, now: &DateTime<Utc>) -> Statement {
    Statement::new(
        "INSERT INTO component (uid, name, category, description, creation_timestamp, last_timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        vec![
            uid(component_uid),
            text(&fields.name),
            text(&fields.category),
            text(&fields.description),
            stamp(now),
        ],
    )
}

pub fn update_component(component_uid: &Uid, fields: &ComponentFields, now: &DateTime<Utc>) -> Statement {
    Statement::new(
        "UPDATE component SET name = ?2, category = ?3, description = ?4, last_timestamp = ?5 \
         WHERE uid = ?1",
        vec![
            uid(component_uid),
            text(&fields.name),
            text(&fields.category),
            text(&fields.description),
            stamp(now),
        ],
    )
}

/// Incoming `includes` edges
pub fn delete_component_includes(component_uid: &Uid) -> Statement {
    Statement::new("DELETE FROM includes WHERE component_uid = ?1", vec![uid(component_uid)])
}

pub fn delete_component(component_uid: &Uid) -> Statement {
    Statement::new("DELETE FROM component WHERE uid = ?1", vec![uid(component_uid)])
}

// ---- Metric ----

/// Columns: name, description
pub fn get_metric_list() -> Statement {
    Statement::new("SELECT name, description FROM metric ORDER BY name", vec![])
}

pub fn get_metric(name: &str) -> Statement {
    Statement::new("SELECT name, description FROM metric WHERE name = ?1", vec![text(name)])
}

/// Columns: edge_id, process uid, process name, value
pub fn get_metric_targets(name: &str) -> Statement {
    Statement::new(
        "SELECT t.edge_id, p.uid, p.name, t.value \
         FROM targets t JOIN process p ON p.uid = t.process_uid \
         WHERE t.metric_name = ?1 \
         ORDER BY t.rowid",
        vec![text(name)],
    )
}

pub fn metric_exists(name: &str) -> Statement {
    Statement::new("SELECT 1 FROM metric WHERE name = ?1", vec![text(name)])
}

pub fn add_metric(metric: &Metric) -> Statement {
    Statement::new(
        "INSERT INTO metric (name, description) VALUES (?1, ?2)",
        vec![text(&metric.name), text(&metric.description)],
    )
}

/// Insert, or refresh the description of an existing name
pub fn upsert_metric(metric: &Metric) -> Statement {
    Statement::new(
        "INSERT INTO metric (name, description) VALUES (?1, ?2) \
         ON CONFLICT(name) DO UPDATE SET description = excluded.description",
        vec![text(&metric.name), text(&metric.description)],
    )
}

pub fn update_metric(metric: &Metric) -> Statement {
    Statement::new(
        "UPDATE metric SET description = ?2 WHERE name = ?1",
        vec![text(&metric.name), text(&metric.description)],
    )
}

/// Incoming `targets` edges
pub fn delete_metric_targets(name: &str) -> Statement {
    Statement::new("DELETE FROM targets WHERE metric_name = ?1", vec![text(name)])
}

pub fn delete_metric(name: &str) -> Statement {
    Statement::new("DELETE FROM metric WHERE name = ?1", vec![text(name)])
}

// ---- includes{weight} ----

pub fn connect_includes(edge_id: &Uid, process_uid: &Uid, component_uid: &Uid, weight: f64) -> Statement {
    Statement::new(
        "INSERT INTO includes (edge_id, process_uid, component_uid, weight) VALUES (?1, ?2, ?3, ?4)",
        vec![uid(edge_id), uid(process_uid), uid(component_uid), real(weight)],
    )
}

/// Earliest-inserted `includes` edge from the process carrying `weight`.
/// Column: edge_id
pub fn find_includes_by_weight(process_uid: &Uid, weight: f64) -> Statement {
    Statement::new(
        "SELECT edge_id FROM includes WHERE process_uid = ?1 AND weight = ?2 ORDER BY rowid LIMIT 1",
        vec![uid(process_uid), real(weight)],
    )
}

pub fn set_includes_weight(edge_id: &Uid, weight: f64) -> Statement {
    Statement::new(
        "UPDATE includes SET weight = ?2 WHERE edge_id = ?1",
        vec![uid(edge_id), real(weight)],
    )
}

pub fn delete_includes(edge_id: &Uid) -> Statement {
    Statement::new("DELETE FROM includes WHERE edge_id = ?1", vec![uid(edge_id)])
}

// ---- targets{value} ----

pub fn connect_targets(edge_id: &Uid, process_uid: &Uid, metric_name: &str, value: f64) -> Statement {
    Statement::new(
        "INSERT INTO targets (edge_id, process_uid, metric_name, value) VALUES (?1, ?2, ?3, ?4)",
        vec![uid(edge_id), uid(process_uid), text(metric_name), real(value)],
    )
}

/// Earliest-inserted `targets` edge from the process carrying `value`.
/// Column: edge_id
pub fn find_targets_by_value(process_uid: &Uid, value: f64) -> Statement {
    Statement::new(
        "SELECT edge_id FROM targets WHERE process_uid = ?1 AND value = ?2 ORDER BY rowid LIMIT 1",
        vec![uid(process_uid), real(value)],
    )
}

/// Column: edge_id
pub fn find_targets_by_metric(process_uid: &Uid, metric_name: &str) -> Statement {
    Statement::new(
        "SELECT edge_id FROM targets WHERE process_uid = ?1 AND metric_name = ?2",
        vec![uid(process_uid), text(metric_name)],
    )
}

pub fn set_targets_value(edge_id: &Uid, value: f64) -> Statement {
    Statement::new(
        "UPDATE targets SET value = ?2 WHERE edge_id = ?1",
        vec![uid(edge_id), real(value)],
    )
}

pub fn delete_targets(edge_id: &Uid) -> Statement {
    Statement::new("DELETE FROM targets WHERE edge_id = ?1", vec![uid(edge_id)])
}

/// Columns: edge_id, metric_name, value
pub fn get_process_targets(process_uid: &Uid) -> Statement {
    Statement::new(
        "SELECT edge_id, metric_name, value FROM targets WHERE process_uid = ?1 ORDER BY rowid",
        vec![uid(process_uid)],
    )
}
