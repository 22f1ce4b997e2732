//! Use-case facade for the transport layer.
//!
//! One method per operation; each takes a decoded request object and returns
//! an [`Envelope`]. Request ids arrive as raw strings and are validated here.
//! The `"-1"` create sentinel of the create/edit requests is resolved in this
//! module and never reaches the repositories.

mod envelope;

pub use envelope::{
    ComponentList, ComponentSaved, ComponentView, Done, EdgeTouched, Envelope, MetricList,
    MetricSaved, MetricView, MetricsImported, ProcessList, ProcessSaved, ProcessView,
};

use serde::Deserialize;

use crate::db::Db;
use crate::error::Result;
use crate::graph::{
    ComponentFields, Components, Metric, Metrics, ProcessFields, Processes, Relationships,
    TargetInput, Uid,
};

/// Id value that turns a create/edit request into a create
pub const CREATE_SENTINEL: &str = "-1";

#[derive(Debug, Clone, Deserialize)]
pub struct UidRequest {
    pub uid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessInput {
    pub uid: String,
    #[serde(flatten)]
    pub fields: ProcessFields,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessRequest {
    pub process: ProcessInput,
    #[serde(default)]
    pub target_metrics: TargetInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentRequest {
    pub uid: String,
    #[serde(flatten)]
    pub fields: ComponentFields,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddReference {
    pub process_uid: String,
    pub component_uid: String,
    pub weight: f64,
}

/// `uid` is the process uid
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReference {
    pub uid: String,
    pub old_weight: f64,
    pub new_weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteReference {
    pub uid: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddTarget {
    pub process_uid: String,
    pub metric_name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricNameRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricImport {
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone)]
pub struct Api {
    processes: Processes,
    components: Components,
    metrics: Metrics,
    relationships: Relationships,
}

impl Api {
    pub fn new(db: Db) -> Self {
        Self {
            processes: Processes::new(db.clone()),
            components: Components::new(db.clone()),
            metrics: Metrics::new(db.clone()),
            relationships: Relationships::new(db),
        }
    }

    // ---- Process ----

    pub async fn get_process_list(&self) -> Result<Envelope<ProcessList>> {
        let process = self.processes.list().await?;
        Ok(Envelope::ok(ProcessList { process }))
    }

    pub async fn get_process(&self, req: UidRequest) -> Result<Envelope<ProcessView>> {
        let uid = Uid::parse(&req.uid)?;
        Ok(Envelope::ok(self.processes.get(&uid).await?))
    }

    pub async fn add_process(&self, fields: ProcessFields, targets: TargetInput) -> Result<Envelope<ProcessSaved>> {
        let process_uid = self.processes.add(fields, targets).await?;
        Ok(Envelope::ok(ProcessSaved { process_uid }))
    }

    pub async fn update_process(&self, uid: &str, fields: ProcessFields, targets: TargetInput) -> Result<Envelope<ProcessSaved>> {
        let process_uid = Uid::parse(uid)?;
        self.processes.update(&process_uid, fields, targets).await?;
        Ok(Envelope::ok(ProcessSaved { process_uid }))
    }

    /// Create when `process.uid` is the sentinel, update otherwise
    pub async fn create_edit_process(&self, req: ProcessRequest) -> Result<Envelope<ProcessSaved>> {
        let ProcessRequest { process, target_metrics } = req;
        if process.uid == CREATE_SENTINEL {
            self.add_process(process.fields, target_metrics).await
        } else {
            self.update_process(&process.uid, process.fields, target_metrics).await
        }
    }

    pub async fn delete_process(&self, req: UidRequest) -> Result<Envelope<Done>> {
        let uid = Uid::parse(&req.uid)?;
        self.processes.delete(&uid).await?;
        Ok(Envelope::ok(Done {}))
    }

    pub async fn add_process_reference(&self, req: AddReference) -> Result<Envelope<EdgeTouched>> {
        let process_uid = Uid::parse(&req.process_uid)?;
        let component_uid = Uid::parse(&req.component_uid)?;
        let edge_id = self
            .relationships
            .connect_component(&process_uid, &component_uid, req.weight)
            .await?;
        Ok(Envelope::ok(EdgeTouched { edge_id }))
    }

    pub async fn update_process_reference(&self, req: UpdateReference) -> Result<Envelope<EdgeTouched>> {
        let process_uid = Uid::parse(&req.uid)?;
        let edge_id = self
            .relationships
            .update_weight(&process_uid, req.old_weight, req.new_weight)
            .await?;
        Ok(Envelope::ok(EdgeTouched { edge_id }))
    }

    pub async fn delete_process_reference(&self, req: DeleteReference) -> Result<Envelope<EdgeTouched>> {
        let process_uid = Uid::parse(&req.uid)?;
        let edge_id = self.relationships.disconnect_component(&process_uid, req.weight).await?;
        Ok(Envelope::ok(EdgeTouched { edge_id }))
    }

    pub async fn add_process_target(&self, req: AddTarget) -> Result<Envelope<EdgeTouched>> {
        let process_uid = Uid::parse(&req.process_uid)?;
        let edge_id = self
            .relationships
            .connect_metric(&process_uid, &req.metric_name, req.value)
            .await?;
        Ok(Envelope::ok(EdgeTouched { edge_id }))
    }

    // ---- Component ----

    pub async fn get_component_list(&self) -> Result<Envelope<ComponentList>> {
        let components = self.components.list().await?;
        Ok(Envelope::ok(ComponentList { components }))
    }

    pub async fn get_component(&self, req: UidRequest) -> Result<Envelope<ComponentView>> {
        let uid = Uid::parse(&req.uid)?;
        Ok(Envelope::ok(self.components.get(&uid).await?))
    }

    /// Create when `uid` is the sentinel, update otherwise
    pub async fn create_edit_component(&self, req: ComponentRequest) -> Result<Envelope<ComponentSaved>> {
        let component_uid = if req.uid == CREATE_SENTINEL {
            self.components.add(req.fields).await?
        } else {
            let uid = Uid::parse(&req.uid)?;
            self.components.update(&uid, req.fields).await?;
            uid
        };
        Ok(Envelope::ok(ComponentSaved { component_uid }))
    }

    pub async fn delete_component(&self, req: UidRequest) -> Result<Envelope<Done>> {
        let uid = Uid::parse(&req.uid)?;
        self.components.delete(&uid).await?;
        Ok(Envelope::ok(Done {}))
    }

    // ---- Metric ----

    pub async fn get_metric_list(&self) -> Result<Envelope<MetricList>> {
        let metrics = self.metrics.list().await?;
        Ok(Envelope::ok(MetricList { metrics }))
    }

    pub async fn get_metric(&self, req: MetricNameRequest) -> Result<Envelope<MetricView>> {
        Ok(Envelope::ok(self.metrics.get(&req.name).await?))
    }

    pub async fn add_metric(&self, metric: Metric) -> Result<Envelope<MetricSaved>> {
        let metric_name = self.metrics.add(metric).await?;
        Ok(Envelope::ok(MetricSaved { metric_name }))
    }

    pub async fn update_metric(&self, metric: Metric) -> Result<Envelope<Done>> {
        self.metrics.update(metric).await?;
        Ok(Envelope::ok(Done {}))
    }

    pub async fn delete_metric(&self, req: MetricNameRequest) -> Result<Envelope<Done>> {
        self.metrics.delete(&req.name).await?;
        Ok(Envelope::ok(Done {}))
    }

    pub async fn import_metrics(&self, req: MetricImport) -> Result<Envelope<MetricsImported>> {
        let pairs = req.metrics.into_iter().map(|m| (m.name, m.description));
        let imported = self.metrics.import(pairs).await?;
        Ok(Envelope::ok(MetricsImported { imported }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;
    use crate::error::GraphError;
    use serde_json::json;

    async fn api_with_loc() -> (Api, tempfile::TempDir) {
        let (db, temp) = setup_test_db().await;
        let api = Api::new(db);
        api.add_metric(Metric { name: "loc".to_string(), description: "lines of code".to_string() })
            .await
            .unwrap();
        (api, temp)
    }

    fn process_request(uid: &str) -> ProcessRequest {
        serde_json::from_value(json!({
            "process": {
                "uid": uid,
                "name": "Onboard customer",
                "responsible_person": "A. Rossi",
                "description": "..."
            },
            "target_metrics": {"loc": {"value": 50}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_sentinel_creates_then_get_returns_targets() {
        let (api, _temp) = api_with_loc().await;

        let saved = api.create_edit_process(process_request(CREATE_SENTINEL)).await.unwrap();
        assert!(saved.success);
        let uid = saved.payload.process_uid.to_string();

        let view = api.get_process(UidRequest { uid }).await.unwrap();
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["process"]["name"], json!("Onboard customer"));
        assert_eq!(value["target_metrics"], json!({"loc": 50.0}));
        assert_eq!(value["components"], json!([]));
    }

    #[tokio::test]
    async fn test_non_sentinel_id_must_exist() {
        let (api, _temp) = api_with_loc().await;
        let err = api
            .create_edit_process(process_request("b141f94973a43cf8ee972e9dffc1b004"))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_ids_are_validation_errors() {
        let (api, _temp) = api_with_loc().await;
        for raw in ["1.5", "abc", "hahaha"] {
            assert!(matches!(
                api.get_process(UidRequest { uid: raw.to_string() }).await,
                Err(GraphError::Validation(_))
            ));
            assert!(matches!(
                api.create_edit_process(process_request(raw)).await,
                Err(GraphError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_reference_scenarios() {
        let (api, _temp) = api_with_loc().await;
        let process_uid = api
            .create_edit_process(process_request(CREATE_SENTINEL))
            .await
            .unwrap()
            .payload
            .process_uid
            .to_string();
        let component_uid = api
            .create_edit_component(ComponentRequest {
                uid: CREATE_SENTINEL.to_string(),
                fields: ComponentFields {
                    name: "CRM".to_string(),
                    category: "software".to_string(),
                    description: String::new(),
                },
            })
            .await
            .unwrap()
            .payload
            .component_uid
            .to_string();

        api.add_process_reference(AddReference {
            process_uid: process_uid.clone(),
            component_uid,
            weight: 3.0,
        })
        .await
        .unwrap();

        let updated = api
            .update_process_reference(UpdateReference { uid: process_uid.clone(), old_weight: 3.0, new_weight: 2.5 })
            .await
            .unwrap();
        assert!(updated.success);

        let view = api.get_process(UidRequest { uid: process_uid.clone() }).await.unwrap();
        let weights: Vec<f64> = view.payload.components.iter().map(|c| c.weight).collect();
        assert_eq!(weights, vec![2.5]);

        let err = api
            .delete_process_reference(DeleteReference { uid: process_uid, weight: 2.0 })
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_component_and_metric_round_trip() {
        let (api, _temp) = api_with_loc().await;

        let imported = api
            .import_metrics(MetricImport {
                metrics: vec![Metric { name: "admins".to_string(), description: String::new() }],
            })
            .await
            .unwrap();
        assert_eq!(imported.payload.imported, 1);
        assert_eq!(api.get_metric_list().await.unwrap().payload.metrics.len(), 2);

        let saved = api
            .create_edit_component(ComponentRequest {
                uid: CREATE_SENTINEL.to_string(),
                fields: ComponentFields {
                    name: "ERP".to_string(),
                    category: "software".to_string(),
                    description: String::new(),
                },
            })
            .await
            .unwrap();
        let uid = saved.payload.component_uid.to_string();
        assert_eq!(api.get_component_list().await.unwrap().payload.components.len(), 1);

        api.delete_component(UidRequest { uid: uid.clone() }).await.unwrap();
        assert!(matches!(
            api.get_component(UidRequest { uid }).await,
            Err(GraphError::NotFound(_))
        ));

        api.delete_metric(MetricNameRequest { name: "admins".to_string() }).await.unwrap();
        assert!(matches!(
            api.get_metric(MetricNameRequest { name: "admins".to_string() }).await,
            Err(GraphError::NotFound(_))
        ));
    }
}
