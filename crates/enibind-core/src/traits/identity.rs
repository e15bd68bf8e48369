// # Instance Identity Trait
//
// The one source of "who am I" for the binder. Every code path reads the
// instance id and zone through this trait, once per pass, so metadata
// propagation delays heal on the next pass.
//
// ## Implementations
//
// - IMDSv2 over HTTP: `enibind-http::ImdsIdentityProvider`
// - Fixed values: `StaticIdentity` (tests, non-cloud embedding)

use async_trait::async_trait;

use crate::types::InstanceMetadata;

/// Provider of the running instance's id and availability zone
#[async_trait]
pub trait InstanceIdentityProvider: Send + Sync {
    /// Read the current instance metadata
    async fn metadata(&self) -> Result<InstanceMetadata, crate::Error>;
}

/// Identity provider returning fixed values
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    metadata: InstanceMetadata,
}

impl StaticIdentity {
    pub fn new(instance_id: impl Into<String>, availability_zone: impl Into<String>) -> Self {
        Self {
            metadata: InstanceMetadata::new(instance_id, availability_zone),
        }
    }
}

#[async_trait]
impl InstanceIdentityProvider for StaticIdentity {
    async fn metadata(&self) -> Result<InstanceMetadata, crate::Error> {
        Ok(self.metadata.clone())
    }
}
