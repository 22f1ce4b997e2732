//! Edge lifecycle for `includes{weight}` (Process -> Component) and
//! `targets{value}` (Process -> Metric).
//!
//! Every edge has a generated `edge_id`, and the by-id operations address
//! exactly one edge. The value-keyed operations (`update_weight`,
//! `disconnect_component`, `update_value`, `disconnect_metric`) pick the
//! earliest-inserted edge whose attribute equals the given number and touch
//! only that one, even when several match.

use crate::db::{Db, Tx};
use crate::error::{GraphError, Result};
use super::model::{check_finite, metric_key, EdgeId, IncludedComponent, TargetMetrics, Uid};
use super::{queries, reformat};

pub(crate) fn require_process(tx: &Tx<'_>, process_uid: &Uid) -> Result<()> {
    if !tx.exists(&queries::process_exists(process_uid))? {
        return Err(GraphError::NotFound(format!("process {}", process_uid)));
    }
    Ok(())
}

pub(crate) fn require_metric(tx: &Tx<'_>, name: &str) -> Result<()> {
    if !tx.exists(&queries::metric_exists(name))? {
        return Err(GraphError::NotFound(format!("metric {:?}", name)));
    }
    Ok(())
}

fn first_edge(tx: &Tx<'_>, statement: &crate::db::Statement) -> Result<Option<EdgeId>> {
    match tx.query(statement)?.first() {
        Some(row) => reformat::edge_id(row).map(Some),
        None => Ok(None),
    }
}

/// Create a `targets` edge. The metric must exist and not already be targeted.
pub(crate) fn insert_target(tx: &Tx<'_>, process_uid: &Uid, metric_name: &str, value: f64) -> Result<EdgeId> {
    require_metric(tx, metric_name)?;
    if first_edge(tx, &queries::find_targets_by_metric(process_uid, metric_name))?.is_some() {
        return Err(GraphError::Conflict(format!(
            "process {} already targets metric {:?}",
            process_uid, metric_name
        )));
    }
    let edge_id = EdgeId::generate();
    tx.execute(&queries::connect_targets(&edge_id, process_uid, metric_name, value))?;
    Ok(edge_id)
}

/// Set the value of the process's edge to `metric_name`, creating it if absent.
pub(crate) fn upsert_target(tx: &Tx<'_>, process_uid: &Uid, metric_name: &str, value: f64) -> Result<EdgeId> {
    match first_edge(tx, &queries::find_targets_by_metric(process_uid, metric_name))? {
        Some(edge_id) => {
            tx.execute(&queries::set_targets_value(&edge_id, value))?;
            Ok(edge_id)
        }
        None => insert_target(tx, process_uid, metric_name, value),
    }
}

/// Relationship manager
#[derive(Debug, Clone)]
pub struct Relationships {
    db: Db,
}

impl Relationships {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    // ---- includes ----

    /// Add an `includes` edge. Duplicate (process, component) pairs are allowed.
    pub async fn connect_component(&self, process_uid: &Uid, component_uid: &Uid, weight: f64) -> Result<EdgeId> {
        let weight = check_finite("weight", weight)?;
        let process_uid = process_uid.clone();
        let component_uid = component_uid.clone();
        let edge_id = self
            .db
            .transaction(move |tx| {
                require_process(tx, &process_uid)?;
                if !tx.exists(&queries::component_exists(&component_uid))? {
                    return Err(GraphError::NotFound(format!("component {}", component_uid)));
                }
                let edge_id = EdgeId::generate();
                tx.execute(&queries::connect_includes(&edge_id, &process_uid, &component_uid, weight))?;
                log::info!("Process {} includes component {} (weight {}, edge {})", process_uid, component_uid, weight, edge_id);
                Ok(edge_id)
            })
            .await?;
        Ok(edge_id)
    }

    /// Rewrite the first edge from `process_uid` whose weight equals `old_weight`.
    pub async fn update_weight(&self, process_uid: &Uid, old_weight: f64, new_weight: f64) -> Result<EdgeId> {
        let old_weight = check_finite("old_weight", old_weight)?;
        let new_weight = check_finite("new_weight", new_weight)?;
        let process_uid = process_uid.clone();
        self.db
            .transaction(move |tx| {
                require_process(tx, &process_uid)?;
                let edge_id = first_edge(tx, &queries::find_includes_by_weight(&process_uid, old_weight))?
                    .ok_or_else(|| {
                        GraphError::NotFound(format!("no includes edge with weight {} from process {}", old_weight, process_uid))
                    })?;
                tx.execute(&queries::set_includes_weight(&edge_id, new_weight))?;
                log::debug!("Edge {} weight {} -> {}", edge_id, old_weight, new_weight);
                Ok(edge_id)
            })
            .await
    }

    /// Remove the first edge from `process_uid` whose weight equals `weight`.
    pub async fn disconnect_component(&self, process_uid: &Uid, weight: f64) -> Result<EdgeId> {
        let weight = check_finite("weight", weight)?;
        let process_uid = process_uid.clone();
        self.db
            .transaction(move |tx| {
                require_process(tx, &process_uid)?;
                let edge_id = first_edge(tx, &queries::find_includes_by_weight(&process_uid, weight))?
                    .ok_or_else(|| {
                        GraphError::NotFound(format!("no includes edge with weight {} from process {}", weight, process_uid))
                    })?;
                tx.execute(&queries::delete_includes(&edge_id))?;
                log::info!("Removed includes edge {} from process {}", edge_id, process_uid);
                Ok(edge_id)
            })
            .await
    }

    pub async fn set_weight(&self, edge_id: &EdgeId, weight: f64) -> Result<()> {
        let weight = check_finite("weight", weight)?;
        let edge_id = edge_id.clone();
        self.db
            .transaction(move |tx| match tx.execute(&queries::set_includes_weight(&edge_id, weight))? {
                0 => Err(GraphError::NotFound(format!("includes edge {}", edge_id))),
                _ => Ok(()),
            })
            .await
    }

    pub async fn remove_include(&self, edge_id: &EdgeId) -> Result<()> {
        let edge_id = edge_id.clone();
        self.db
            .transaction(move |tx| match tx.execute(&queries::delete_includes(&edge_id))? {
                0 => Err(GraphError::NotFound(format!("includes edge {}", edge_id))),
                _ => Ok(()),
            })
            .await
    }

    /// Outgoing `includes` edges, ordered by weight then insertion
    pub async fn includes_of(&self, process_uid: &Uid) -> Result<Vec<IncludedComponent>> {
        let process_uid = process_uid.clone();
        self.db
            .transaction(move |tx| {
                require_process(tx, &process_uid)?;
                let rows = tx.query(&queries::get_process_components(&process_uid))?;
                rows.iter().map(reformat::included_component).collect()
            })
            .await
    }

    // ---- targets ----

    /// Add a `targets` edge. Fails with Conflict if the process already targets the metric.
    pub async fn connect_metric(&self, process_uid: &Uid, metric_name: &str, value: f64) -> Result<EdgeId> {
        let value = check_finite("value", value)?;
        let metric_name = metric_key(metric_name)?;
        let process_uid = process_uid.clone();
        self.db
            .transaction(move |tx| {
                require_process(tx, &process_uid)?;
                let edge_id = insert_target(tx, &process_uid, &metric_name, value)?;
                log::info!("Process {} targets metric {:?} (value {}, edge {})", process_uid, metric_name, value, edge_id);
                Ok(edge_id)
            })
            .await
    }

    /// Rewrite the first `targets` edge from `process_uid` whose value equals `old_value`.
    pub async fn update_value(&self, process_uid: &Uid, old_value: f64, new_value: f64) -> Result<EdgeId> {
        let old_value = check_finite("old_value", old_value)?;
        let new_value = check_finite("new_value", new_value)?;
        let process_uid = process_uid.clone();
        self.db
            .transaction(move |tx| {
                require_process(tx, &process_uid)?;
                let edge_id = first_edge(tx, &queries::find_targets_by_value(&process_uid, old_value))?
                    .ok_or_else(|| {
                        GraphError::NotFound(format!("no targets edge with value {} from process {}", old_value, process_uid))
                    })?;
                tx.execute(&queries::set_targets_value(&edge_id, new_value))?;
                Ok(edge_id)
            })
            .await
    }

    /// Remove the first `targets` edge from `process_uid` whose value equals `value`.
    pub async fn disconnect_metric(&self, process_uid: &Uid, value: f64) -> Result<EdgeId> {
        let value = check_finite("value", value)?;
        let process_uid = process_uid.clone();
        self.db
            .transaction(move |tx| {
                require_process(tx, &process_uid)?;
                let edge_id = first_edge(tx, &queries::find_targets_by_value(&process_uid, value))?
                    .ok_or_else(|| {
                        GraphError::NotFound(format!("no targets edge with value {} from process {}", value, process_uid))
                    })?;
                tx.execute(&queries::delete_targets(&edge_id))?;
                log::info!("Removed targets edge {} from process {}", edge_id, process_uid);
                Ok(edge_id)
            })
            .await
    }

    pub async fn set_value(&self, edge_id: &EdgeId, value: f64) -> Result<()> {
        let value = check_finite("value", value)?;
        let edge_id = edge_id.clone();
        self.db
            .transaction(move |tx| match tx.execute(&queries::set_targets_value(&edge_id, value))? {
                0 => Err(GraphError::NotFound(format!("targets edge {}", edge_id))),
                _ => Ok(()),
            })
            .await
    }

    pub async fn remove_target(&self, edge_id: &EdgeId) -> Result<()> {
        let edge_id = edge_id.clone();
        self.db
            .transaction(move |tx| match tx.execute(&queries::delete_targets(&edge_id))? {
                0 => Err(GraphError::NotFound(format!("targets edge {}", edge_id))),
                _ => Ok(()),
            })
            .await
    }

    pub async fn targets_of(&self, process_uid: &Uid) -> Result<TargetMetrics> {
        let process_uid = process_uid.clone();
        self.db
            .transaction(move |tx| {
                require_process(tx, &process_uid)?;
                reformat::target_metrics(&tx.query(&queries::get_process_targets(&process_uid))?)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;
    use crate::graph::{ComponentFields, Components, Metric, Metrics, ProcessFields, Processes, TargetInput};

    struct Fixture {
        rel: Relationships,
        process: Uid,
        component: Uid,
        _temp: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let (db, temp) = setup_test_db().await;
        let process = Processes::new(db.clone())
            .add(
                ProcessFields {
                    name: "Kunden anlegen".to_string(),
                    responsible_person: "Peter Rossbach".to_string(),
                    description: "....".to_string(),
                },
                TargetInput::new(),
            )
            .await
            .unwrap();
        let component = Components::new(db.clone())
            .add(ComponentFields {
                name: "CRM".to_string(),
                category: "software".to_string(),
                description: String::new(),
            })
            .await
            .unwrap();
        Metrics::new(db.clone())
            .add(Metric { name: "loc".to_string(), description: "lines of code".to_string() })
            .await
            .unwrap();
        Fixture { rel: Relationships::new(db), process, component, _temp: temp }
    }

    #[tokio::test]
    async fn test_connect_then_query_shows_weight() {
        let f = fixture().await;
        let edge = f.rel.connect_component(&f.process, &f.component, 3.0).await.unwrap();

        let included = f.rel.includes_of(&f.process).await.unwrap();
        assert_eq!(included.len(), 1);
        assert_eq!(included[0].edge_id, edge);
        assert_eq!(included[0].uid, f.component);
        assert_eq!(included[0].weight, 3.0);
    }

    #[tokio::test]
    async fn test_connect_missing_endpoint_is_not_found() {
        let f = fixture().await;
        let ghost = Uid::generate();
        assert!(matches!(
            f.rel.connect_component(&ghost, &f.component, 1.0).await,
            Err(GraphError::NotFound(_))
        ));
        assert!(matches!(
            f.rel.connect_component(&f.process, &ghost, 1.0).await,
            Err(GraphError::NotFound(_))
        ));
        assert!(matches!(
            f.rel.connect_metric(&f.process, "unknown", 1.0).await,
            Err(GraphError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_weight_replaces_old_value() {
        let f = fixture().await;
        f.rel.connect_component(&f.process, &f.component, 3.0).await.unwrap();

        f.rel.update_weight(&f.process, 3.0, 2.5).await.unwrap();

        let weights: Vec<f64> = f.rel.includes_of(&f.process).await.unwrap().iter().map(|c| c.weight).collect();
        assert_eq!(weights, vec![2.5]);
    }

    #[tokio::test]
    async fn test_update_weight_without_match_is_not_found() {
        let f = fixture().await;
        f.rel.connect_component(&f.process, &f.component, 1.0).await.unwrap();
        assert!(matches!(
            f.rel.update_weight(&f.process, 3.0, 2.5).await,
            Err(GraphError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_weights_touch_earliest_edge_only() {
        let f = fixture().await;
        let first = f.rel.connect_component(&f.process, &f.component, 3.0).await.unwrap();
        let second = f.rel.connect_component(&f.process, &f.component, 3.0).await.unwrap();

        let changed = f.rel.update_weight(&f.process, 3.0, 4.0).await.unwrap();
        assert_eq!(changed, first);

        let removed = f.rel.disconnect_component(&f.process, 3.0).await.unwrap();
        assert_eq!(removed, second);

        let included = f.rel.includes_of(&f.process).await.unwrap();
        assert_eq!(included.len(), 1);
        assert_eq!(included[0].edge_id, first);
        assert_eq!(included[0].weight, 4.0);
    }

    #[tokio::test]
    async fn test_duplicate_values_touch_earliest_target_only() {
        let f = fixture().await;
        Metrics::new(f.rel.db.clone())
            .add(Metric { name: "admins".to_string(), description: "admin count".to_string() })
            .await
            .unwrap();
        let first = f.rel.connect_metric(&f.process, "loc", 5.0).await.unwrap();
        let second = f.rel.connect_metric(&f.process, "admins", 5.0).await.unwrap();

        let changed = f.rel.update_value(&f.process, 5.0, 6.0).await.unwrap();
        assert_eq!(changed, first);

        let removed = f.rel.disconnect_metric(&f.process, 5.0).await.unwrap();
        assert_eq!(removed, second);

        let targets = f.rel.targets_of(&f.process).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets["loc"], 6.0);
    }

    #[tokio::test]
    async fn test_disconnect_missing_weight_is_not_found() {
        let f = fixture().await;
        f.rel.connect_component(&f.process, &f.component, 1.0).await.unwrap();
        assert!(matches!(
            f.rel.disconnect_component(&f.process, 2.0).await,
            Err(GraphError::NotFound(_))
        ));
        assert_eq!(f.rel.includes_of(&f.process).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_edge_id_operations() {
        let f = fixture().await;
        let edge = f.rel.connect_component(&f.process, &f.component, 1.0).await.unwrap();

        f.rel.set_weight(&edge, 7.0).await.unwrap();
        assert_eq!(f.rel.includes_of(&f.process).await.unwrap()[0].weight, 7.0);

        f.rel.remove_include(&edge).await.unwrap();
        assert!(f.rel.includes_of(&f.process).await.unwrap().is_empty());
        assert!(matches!(f.rel.remove_include(&edge).await, Err(GraphError::NotFound(_))));
        assert!(matches!(f.rel.set_weight(&edge, 1.0).await, Err(GraphError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_targets_lifecycle() {
        let f = fixture().await;
        let edge = f.rel.connect_metric(&f.process, "loc", 50.0).await.unwrap();
        assert_eq!(f.rel.targets_of(&f.process).await.unwrap()["loc"], 50.0);

        assert!(matches!(
            f.rel.connect_metric(&f.process, "loc", 60.0).await,
            Err(GraphError::Conflict(_))
        ));

        assert_eq!(f.rel.update_value(&f.process, 50.0, 40.0).await.unwrap(), edge);
        assert_eq!(f.rel.targets_of(&f.process).await.unwrap()["loc"], 40.0);
        assert!(matches!(
            f.rel.update_value(&f.process, 50.0, 1.0).await,
            Err(GraphError::NotFound(_))
        ));

        f.rel.set_value(&edge, 45.0).await.unwrap();
        assert_eq!(f.rel.disconnect_metric(&f.process, 45.0).await.unwrap(), edge);
        assert!(f.rel.targets_of(&f.process).await.unwrap().is_empty());
        assert!(matches!(f.rel.remove_target(&edge).await, Err(GraphError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_non_finite_weight_rejected() {
        let f = fixture().await;
        assert!(matches!(
            f.rel.connect_component(&f.process, &f.component, f64::NAN).await,
            Err(GraphError::Validation(_))
        ));
    }
}
