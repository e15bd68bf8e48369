//! Instance inventory facade
//!
//! Thin query layer over [`Ec2Api`]: it shapes requests, maps provider
//! failures into the binder's error taxonomy, and does nothing else. Every call
//! goes to the provider; nothing is cached between passes.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::{Ec2Api, InterfaceFilter};
use crate::types::{
    CandidateAddressList, InstanceDescription, InstanceIdentity, InstanceMetadata,
    InterfaceStatus, NetworkInterfaceHandle,
};

/// Device slot used for the stable interface; slot 0 is the primary interface.
pub const SECONDARY_DEVICE_INDEX: u32 = 1;

/// Query facade over the cloud API
#[derive(Clone)]
pub struct InstanceInventory {
    api: Arc<dyn Ec2Api>,
}

impl InstanceInventory {
    pub fn new(api: Arc<dyn Ec2Api>) -> Self {
        Self { api }
    }

    pub fn backend_name(&self) -> &'static str {
        self.api.backend_name()
    }

    /// Describe the running instance: its subnet and attached interfaces
    ///
    /// # Errors
    ///
    /// - [`Error::ProviderQuery`] when the API call fails
    /// - [`Error::NotFound`] when the provider has no record for the instance
    pub async fn describe_self(&self, metadata: &InstanceMetadata) -> Result<InstanceIdentity> {
        let description = self.describe(&metadata.instance_id).await?;

        Ok(InstanceIdentity {
            instance_id: description.instance_id,
            availability_zone: metadata.availability_zone.clone(),
            subnet_id: description.subnet_id,
            attached_interfaces: description.network_interfaces,
        })
    }

    /// Available interfaces in `subnet_id` carrying a candidate address
    ///
    /// An empty result means no address is free this pass.
    pub async fn find_available_interfaces(
        &self,
        candidates: &CandidateAddressList,
        subnet_id: &str,
    ) -> Result<Vec<NetworkInterfaceHandle>> {
        let filter = InterfaceFilter::new()
            .with_private_ips(candidates.ips())
            .with_status(InterfaceStatus::Available)
            .with_subnet(subnet_id);

        let interfaces = self
            .api
            .describe_network_interfaces(&filter)
            .await
            .map_err(|e| self.query_error(e))?;

        debug!(
            subnet_id,
            count = interfaces.len(),
            "Found available candidate interfaces"
        );
        Ok(interfaces)
    }

    /// Attach an interface at the secondary device slot
    ///
    /// # Returns
    ///
    /// The attachment id assigned by the provider
    pub async fn attach(&self, interface_id: &str, instance_id: &str) -> Result<String> {
        self.api
            .attach_network_interface(interface_id, instance_id, SECONDARY_DEVICE_INDEX)
            .await
            .map_err(|e| match e {
                Error::Attach { .. } => e,
                other => Error::attach(interface_id, other.to_string()),
            })
    }

    /// Detach an interface by attachment id
    pub async fn detach(&self, attachment_id: &str) -> Result<()> {
        self.api
            .detach_network_interface(attachment_id)
            .await
            .map_err(|e| match e {
                Error::Detach { .. } => e,
                other => Error::detach(attachment_id, other.to_string()),
            })
    }

    async fn describe(&self, instance_id: &str) -> Result<InstanceDescription> {
        self.api
            .describe_instance(instance_id)
            .await
            .map_err(|e| self.query_error(e))?
            .ok_or_else(|| Error::not_found(format!("instance {}", instance_id)))
    }

    fn query_error(&self, err: Error) -> Error {
        match err {
            Error::ProviderQuery { .. } | Error::NotFound(_) => err,
            other => Error::provider_query(self.api.backend_name(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::InMemoryEc2;
    use std::net::Ipv4Addr;

    fn setup() -> (Arc<InMemoryEc2>, InstanceInventory) {
        let cloud = Arc::new(InMemoryEc2::new());
        cloud.add_instance("i-1", "subnet-a");
        cloud.add_interface(NetworkInterfaceHandle::available(
            "eni-4",
            Ipv4Addr::new(10, 0, 1, 4),
            "subnet-a",
        ));
        cloud.add_interface(NetworkInterfaceHandle::available(
            "eni-other-subnet",
            Ipv4Addr::new(10, 0, 1, 5),
            "subnet-b",
        ));
        let inventory = InstanceInventory::new(cloud.clone());
        (cloud, inventory)
    }

    #[tokio::test]
    async fn test_describe_self() {
        let (_cloud, inventory) = setup();
        let identity = inventory
            .describe_self(&InstanceMetadata::new("i-1", "us-east-1a"))
            .await
            .unwrap();

        assert_eq!(identity.instance_id, "i-1");
        assert_eq!(identity.subnet_id, "subnet-a");
        assert_eq!(identity.availability_zone, "us-east-1a");
        assert!(identity.attached_interfaces.is_empty());
    }

    #[tokio::test]
    async fn test_describe_missing_instance_is_not_found() {
        let (_cloud, inventory) = setup();
        let err = inventory
            .describe_self(&InstanceMetadata::new("i-missing", "us-east-1a"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_find_available_filters_subnet() {
        let (_cloud, inventory) = setup();
        let candidates: CandidateAddressList =
            [Ipv4Addr::new(10, 0, 1, 4), Ipv4Addr::new(10, 0, 1, 5)].into_iter().collect();

        let found = inventory
            .find_available_interfaces(&candidates, "subnet-a")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].interface_id, "eni-4");

        let none = inventory
            .find_available_interfaces(&candidates, "subnet-z")
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_attach_uses_secondary_slot() {
        let (cloud, inventory) = setup();
        inventory.attach("eni-4", "i-1").await.unwrap();

        assert_eq!(
            cloud.attach_calls(),
            vec![("eni-4".to_string(), "i-1".to_string(), SECONDARY_DEVICE_INDEX)]
        );
        let identity = inventory
            .describe_self(&InstanceMetadata::new("i-1", "us-east-1a"))
            .await
            .unwrap();
        assert!(identity.attached_interfaces.iter().any(|i| i.interface_id == "eni-4"));
    }

    #[tokio::test]
    async fn test_query_failures_map_to_provider_query() {
        let (cloud, inventory) = setup();
        cloud.fail_queries(true);

        let err = inventory
            .describe_self(&InstanceMetadata::new("i-1", "us-east-1a"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderQuery { .. }));
    }

    #[tokio::test]
    async fn test_detach_unknown_attachment() {
        let (_cloud, inventory) = setup();
        let err = inventory.detach("eni-attach-nope").await.unwrap_err();
        assert!(matches!(err, Error::Detach { .. }));
    }
}
