use async_trait::async_trait;

use crate::errors::Error;

mod gce;

pub use gce::GceMetadataClient;

/// Instance self-description as served by the cloud metadata service.
///
/// Every lookup is independent and may fail on its own. Values are returned
/// raw (trimmed); validation is up to the caller.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Cheap check for whether a metadata service should be reachable. Must
    /// not touch the network.
    fn on_platform(&self) -> bool;
    async fn instance_name(&self) -> Result<String, Error>;
    async fn external_ipv4(&self) -> Result<String, Error>;
    async fn project_id(&self) -> Result<String, Error>;
    /// Short zone name such as `us-central1-c`
    async fn zone(&self) -> Result<String, Error>;
}
