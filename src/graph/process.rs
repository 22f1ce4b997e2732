//! Process repository.

use chrono::Utc;
use std::collections::HashSet;

use crate::db::Db;
use crate::error::{GraphError, Result};
use super::model::{check_finite, metric_key, Process, ProcessFields, ProcessRecord, TargetInput, Uid};
use super::relationships::{insert_target, require_process, upsert_target};
use super::{queries, reformat};

/// Validated `(metric name, value)` pairs from a client target map.
/// Keys that only differ by surrounding whitespace name the same metric and are rejected.
fn target_pairs(targets: &TargetInput) -> Result<Vec<(String, f64)>> {
    let mut seen = HashSet::new();
    let mut pairs = Vec::with_capacity(targets.len());
    for (name, target) in targets {
        let metric = metric_key(name)?;
        if !seen.insert(metric.clone()) {
            return Err(GraphError::Validation(format!(
                "target metric {:?} is listed more than once",
                metric
            )));
        }
        pairs.push((metric, check_finite("target value", target.value)?));
    }
    Ok(pairs)
}

#[derive(Debug, Clone)]
pub struct Processes {
    db: Db,
}

impl Processes {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Process>> {
        let rows = self.db.query(queries::get_process_list()).await?;
        reformat::process_list(&rows)
    }

    /// Process with its target metrics and included components
    pub async fn get(&self, uid: &Uid) -> Result<ProcessRecord> {
        let uid = uid.clone();
        self.db
            .transaction(move |tx| {
                let rows = tx.query(&queries::get_process(&uid))?;
                if rows.is_empty() {
                    return Err(GraphError::NotFound(format!("process {}", uid)));
                }
                let component_rows = tx.query(&queries::get_process_components(&uid))?;
                reformat::process_record(&rows, &component_rows)
            })
            .await
    }

    /// Create the node plus one `targets` edge per entry. Returns the new uid.
    pub async fn add(&self, fields: ProcessFields, targets: TargetInput) -> Result<Uid> {
        fields.validate()?;
        let pairs = target_pairs(&targets)?;
        let uid = Uid::generate();
        let now = Utc::now();

        let new_uid = uid.clone();
        self.db
            .transaction(move |tx| {
                tx.execute(&queries::add_process(&new_uid, &fields, &now))?;
                for (metric, value) in &pairs {
                    insert_target(tx, &new_uid, metric, *value)?;
                }
                Ok(())
            })
            .await?;

        log::info!("Created process {} with {} target metrics", uid, targets.len());
        Ok(uid)
    }

    /// Rewrite fields, refresh last_timestamp and upsert the listed targets.
    /// Targets not listed are kept.
    pub async fn update(&self, uid: &Uid, fields: ProcessFields, targets: TargetInput) -> Result<()> {
        fields.validate()?;
        let pairs = target_pairs(&targets)?;
        let now = Utc::now();

        let uid = uid.clone();
        self.db
            .transaction(move |tx| {
                require_process(tx, &uid)?;
                tx.execute(&queries::update_process(&uid, &fields, &now))?;
                for (metric, value) in &pairs {
                    upsert_target(tx, &uid, metric, *value)?;
                }
                log::debug!("Updated process {}", uid);
                Ok(())
            })
            .await
    }

    /// Drop the process's `includes` and `targets` edges, then the node.
    pub async fn delete(&self, uid: &Uid) -> Result<()> {
        let uid = uid.clone();
        self.db
            .transaction(move |tx| {
                require_process(tx, &uid)?;
                let edges = tx.execute(&queries::delete_process_includes(&uid))?
                    + tx.execute(&queries::delete_process_targets(&uid))?;
                tx.execute(&queries::delete_process(&uid))?;
                log::info!("Deleted process {} and {} edges", uid, edges);
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;
    use crate::graph::{ComponentFields, Components, Metric, Metrics, Relationships, TargetValue};

    fn onboarding() -> ProcessFields {
        ProcessFields {
            name: "Onboard customer".to_string(),
            responsible_person: "A. Rossi".to_string(),
            description: "...".to_string(),
        }
    }

    fn targets(entries: &[(&str, f64)]) -> TargetInput {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), TargetValue { value: *value }))
            .collect()
    }

    async fn seed_metric(db: &Db, name: &str) {
        Metrics::new(db.clone())
            .add(Metric { name: name.to_string(), description: String::new() })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_empty_graph() {
        let (db, _temp) = setup_test_db().await;
        assert!(Processes::new(db).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_then_get_scenario() {
        let (db, _temp) = setup_test_db().await;
        seed_metric(&db, "loc").await;
        let processes = Processes::new(db);

        let uid = processes.add(onboarding(), targets(&[("loc", 50.0)])).await.unwrap();
        let record = processes.get(&uid).await.unwrap();

        assert_eq!(record.process.uid, uid);
        assert_eq!(record.process.name, "Onboard customer");
        assert_eq!(record.process.responsible_person, "A. Rossi");
        assert_eq!(record.process.description, "...");
        assert_eq!(record.process.creation_timestamp, record.process.last_timestamp);
        assert_eq!(record.target_metrics.len(), 1);
        assert_eq!(record.target_metrics["loc"], 50.0);
        assert!(record.components.is_empty());
    }

    #[tokio::test]
    async fn test_add_generates_unique_ids() {
        let (db, _temp) = setup_test_db().await;
        let processes = Processes::new(db);

        let mut seen = HashSet::new();
        for _ in 0..5 {
            let uid = processes.add(onboarding(), TargetInput::new()).await.unwrap();
            assert!(seen.insert(uid));
        }
        assert_eq!(processes.list().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_add_with_unknown_metric_persists_nothing() {
        let (db, _temp) = setup_test_db().await;
        let processes = Processes::new(db);

        let err = processes.add(onboarding(), targets(&[("missing", 1.0)])).await.unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
        assert!(processes.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_rejects_missing_fields() {
        let (db, _temp) = setup_test_db().await;
        let processes = Processes::new(db);

        let mut fields = onboarding();
        fields.name = String::new();
        assert!(matches!(
            processes.add(fields, TargetInput::new()).await,
            Err(GraphError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let (db, _temp) = setup_test_db().await;
        let err = Processes::new(db).get(&Uid::generate()).await.unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_refreshes_last_timestamp_only() {
        let (db, _temp) = setup_test_db().await;
        seed_metric(&db, "loc").await;
        seed_metric(&db, "admins").await;
        let processes = Processes::new(db);
        let uid = processes.add(onboarding(), targets(&[("loc", 50.0)])).await.unwrap();
        let before = processes.get(&uid).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mut fields = onboarding();
        fields.description = "Create the customer in every system".to_string();
        processes
            .update(&uid, fields.clone(), targets(&[("loc", 30.5), ("admins", 2.0)]))
            .await
            .unwrap();

        let after = processes.get(&uid).await.unwrap();
        assert_eq!(after.process.description, fields.description);
        assert_eq!(after.process.creation_timestamp, before.process.creation_timestamp);
        assert!(after.process.last_timestamp > before.process.last_timestamp);
        assert_eq!(after.target_metrics["loc"], 30.5);
        assert_eq!(after.target_metrics["admins"], 2.0);
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let (db, _temp) = setup_test_db().await;
        seed_metric(&db, "loc").await;
        let processes = Processes::new(db);
        let uid = processes.add(onboarding(), TargetInput::new()).await.unwrap();

        processes.update(&uid, onboarding(), targets(&[("loc", 10.0)])).await.unwrap();
        processes.update(&uid, onboarding(), targets(&[("loc", 10.0)])).await.unwrap();

        let record = processes.get(&uid).await.unwrap();
        assert_eq!(record.process.name, "Onboard customer");
        assert_eq!(record.target_metrics.len(), 1);
        assert_eq!(record.target_metrics["loc"], 10.0);
    }

    #[tokio::test]
    async fn test_get_rows_match_reformatted_record() {
        let (db, _temp) = setup_test_db().await;
        seed_metric(&db, "loc").await;
        seed_metric(&db, "admins").await;
        let processes = Processes::new(db.clone());
        let uid = processes.add(onboarding(), targets(&[("loc", 50.0)])).await.unwrap();
        processes.update(&uid, onboarding(), targets(&[("admins", 2.0)])).await.unwrap();

        let query_uid = uid.clone();
        let (rows, component_rows) = db
            .transaction(move |tx| {
                Ok((
                    tx.query(&queries::get_process(&query_uid))?,
                    tx.query(&queries::get_process_components(&query_uid))?,
                ))
            })
            .await
            .unwrap();
        assert_eq!(rows[0].text(6).unwrap(), "admins");
        assert_eq!(rows[1].text(6).unwrap(), "loc");

        let record = reformat::process_record(&rows, &component_rows).unwrap();
        let (flat_rows, flat_components) = reformat::flatten_process(&record);
        assert_eq!(flat_rows, rows);
        assert_eq!(flat_components, component_rows);
    }

    #[tokio::test]
    async fn test_targets_differing_only_by_whitespace_are_rejected() {
        let (db, _temp) = setup_test_db().await;
        seed_metric(&db, "loc").await;
        let processes = Processes::new(db);
        let clashing = targets(&[("loc", 50.0), (" loc", 40.0)]);

        let err = processes.add(onboarding(), clashing.clone()).await.unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
        assert!(processes.list().await.unwrap().is_empty());

        let uid = processes.add(onboarding(), targets(&[("loc", 10.0)])).await.unwrap();
        let err = processes.update(&uid, onboarding(), clashing).await.unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
        assert_eq!(processes.get(&uid).await.unwrap().target_metrics["loc"], 10.0);
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let (db, _temp) = setup_test_db().await;
        let err = Processes::new(db)
            .update(&Uid::generate(), onboarding(), TargetInput::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_edges_and_does_not_resurrect() {
        let (db, _temp) = setup_test_db().await;
        seed_metric(&db, "loc").await;
        let processes = Processes::new(db.clone());
        let components = Components::new(db.clone());
        let rel = Relationships::new(db.clone());

        let uid = processes.add(onboarding(), targets(&[("loc", 50.0)])).await.unwrap();
        let component = components
            .add(ComponentFields {
                name: "CRM".to_string(),
                category: "software".to_string(),
                description: String::new(),
            })
            .await
            .unwrap();
        rel.connect_component(&uid, &component, 1.0).await.unwrap();

        processes.delete(&uid).await.unwrap();

        assert!(matches!(processes.get(&uid).await, Err(GraphError::NotFound(_))));
        assert!(matches!(processes.delete(&uid).await, Err(GraphError::NotFound(_))));
        assert!(components.get(&component).await.unwrap().used_by.is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_edges() {
        let (db, _temp) = setup_test_db().await;
        let processes = Processes::new(db);
        let uid = processes.add(onboarding(), TargetInput::new()).await.unwrap();
        processes.delete(&uid).await.unwrap();
        assert!(processes.list().await.unwrap().is_empty());
    }
}
