//! Component repository.

use chrono::Utc;

use crate::db::{Db, Tx};
use crate::error::{GraphError, Result};
use super::model::{Component, ComponentFields, ComponentRecord, Uid};
use super::{queries, reformat};

fn require_component(tx: &Tx<'_>, uid: &Uid) -> Result<()> {
    if !tx.exists(&queries::component_exists(uid))? {
        return Err(GraphError::NotFound(format!("component {}", uid)));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Components {
    db: Db,
}

impl Components {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Component>> {
        let rows = self.db.query(queries::get_component_list()).await?;
        reformat::component_list(&rows)
    }

    /// Component plus the processes that include it
    pub async fn get(&self, uid: &Uid) -> Result<ComponentRecord> {
        let uid = uid.clone();
        self.db
            .transaction(move |tx| {
                let rows = tx.query(&queries::get_component(&uid))?;
                let row = rows
                    .first()
                    .ok_or_else(|| GraphError::NotFound(format!("component {}", uid)))?;
                let usage_rows = tx.query(&queries::get_component_usages(&uid))?;
                reformat::component_record(row, &usage_rows)
            })
            .await
    }

    pub async fn add(&self, fields: ComponentFields) -> Result<Uid> {
        fields.validate()?;
        let uid = Uid::generate();
        let now = Utc::now();
        let insert = queries::add_component(&uid, &fields, &now);
        self.db.transaction(move |tx| tx.execute(&insert)).await?;
        log::info!("Created component {} ({})", uid, fields.name);
        Ok(uid)
    }

    pub async fn update(&self, uid: &Uid, fields: ComponentFields) -> Result<()> {
        fields.validate()?;
        let now = Utc::now();
        let uid = uid.clone();
        self.db
            .transaction(move |tx| {
                require_component(tx, &uid)?;
                tx.execute(&queries::update_component(&uid, &fields, &now))?;
                Ok(())
            })
            .await
    }

    /// Removes every `includes` edge pointing at the component, then the node.
    pub async fn delete(&self, uid: &Uid) -> Result<()> {
        let uid = uid.clone();
        self.db
            .transaction(move |tx| {
                require_component(tx, &uid)?;
                let edges = tx.execute(&queries::delete_component_includes(&uid))?;
                tx.execute(&queries::delete_component(&uid))?;
                if edges > 0 {
                    log::warn!("Deleted component {} was still included by {} process edges; edges removed", uid, edges);
                } else {
                    log::info!("Deleted component {}", uid);
                }
                Ok(())
            })
            .await
    }
}
