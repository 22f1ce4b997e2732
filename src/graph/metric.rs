//! Metric repository. Metrics are keyed by name.

use crate::db::Db;
use crate::error::{GraphError, Result};
use super::model::{metric_key, Metric, MetricRecord};
use super::relationships::require_metric;
use super::{queries, reformat};

fn normalized(metric: Metric) -> Result<Metric> {
    metric.validate()?;
    Ok(Metric { name: metric_key(&metric.name)?, description: metric.description })
}

#[derive(Debug, Clone)]
pub struct Metrics {
    db: Db,
}

impl Metrics {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Metric>> {
        let rows = self.db.query(queries::get_metric_list()).await?;
        reformat::metric_list(&rows)
    }

    /// Metric plus the processes that target it
    pub async fn get(&self, name: &str) -> Result<MetricRecord> {
        let name = metric_key(name)?;
        self.db
            .transaction(move |tx| {
                let rows = tx.query(&queries::get_metric(&name))?;
                let row = rows
                    .first()
                    .ok_or_else(|| GraphError::NotFound(format!("metric {:?}", name)))?;
                let target_rows = tx.query(&queries::get_metric_targets(&name))?;
                reformat::metric_record(row, &target_rows)
            })
            .await
    }

    /// Fails with Conflict when the name is taken
    pub async fn add(&self, metric: Metric) -> Result<String> {
        let metric = normalized(metric)?;
        let name = metric.name.clone();
        self.db
            .transaction(move |tx| {
                if tx.exists(&queries::metric_exists(&metric.name))? {
                    return Err(GraphError::Conflict(format!("metric {:?} already exists", metric.name)));
                }
                tx.execute(&queries::add_metric(&metric))?;
                Ok(())
            })
            .await?;
        log::info!("Created metric {:?}", name);
        Ok(name)
    }

    pub async fn update(&self, metric: Metric) -> Result<()> {
        let metric = normalized(metric)?;
        self.db
            .transaction(move |tx| {
                require_metric(tx, &metric.name)?;
                tx.execute(&queries::update_metric(&metric))?;
                Ok(())
            })
            .await
    }

    /// Removes every `targets` edge pointing at the metric, then the node.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let name = metric_key(name)?;
        self.db
            .transaction(move |tx| {
                require_metric(tx, &name)?;
                let edges = tx.execute(&queries::delete_metric_targets(&name))?;
                tx.execute(&queries::delete_metric(&name))?;
                log::info!("Deleted metric {:?} and {} targets edges", name, edges);
                Ok(())
            })
            .await
    }

    /// Upsert `(name, description)` pairs in one transaction. Existing names
    /// get the new description. Any invalid pair aborts the whole import.
    pub async fn import<I>(&self, pairs: I) -> Result<usize>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let metrics = pairs
            .into_iter()
            .map(|(name, description)| normalized(Metric { name, description }))
            .collect::<Result<Vec<_>>>()?;

        let count = self
            .db
            .transaction(move |tx| {
                for metric in &metrics {
                    tx.execute(&queries::upsert_metric(metric))?;
                }
                Ok(metrics.len())
            })
            .await?;
        log::info!("Imported {} metrics", count);
        Ok(count)
    }
}
