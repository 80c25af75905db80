use async_trait::async_trait;

use perfbench_domain::{DatasetId, EndpointId, OwnerId};

/// A model endpoint tasks can target.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    /// `None` marks a system entry visible to every owner.
    #[serde(default)]
    pub owner: Option<OwnerId>,
    /// Display name recorded on tasks.
    pub name: String,
    /// Model name sent to the endpoint.
    pub model_identifier: String,
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// A prompt dataset file the engine can read.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    #[serde(default)]
    pub owner: Option<OwnerId>,
    pub name: String,
    pub download_url: String,
}

fn visible_to(entry_owner: Option<OwnerId>, caller: OwnerId) -> bool {
    entry_owner.is_none_or(|owner| owner == caller)
}

/// Endpoint and dataset registry, filtered by what `owner` may use.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn endpoint(&self, owner: OwnerId, id: EndpointId) -> Option<Endpoint>;
    async fn dataset(&self, owner: OwnerId, id: DatasetId) -> Option<Dataset>;
}

/// Catalog loaded once from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    endpoints: Vec<Endpoint>,
    datasets: Vec<Dataset>,
}

impl StaticCatalog {
    pub fn new(endpoints: Vec<Endpoint>, datasets: Vec<Dataset>) -> Self {
        Self {
            endpoints,
            datasets,
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn endpoint(&self, owner: OwnerId, id: EndpointId) -> Option<Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.id == id && visible_to(e.owner, owner))
            .cloned()
    }

    async fn dataset(&self, owner: OwnerId, id: DatasetId) -> Option<Dataset> {
        self.datasets
            .iter()
            .find(|d| d.id == id && visible_to(d.owner, owner))
            .cloned()
    }
}
