// # Cloud API Trait
//
// Defines the narrow slice of the EC2 API the binder needs: describe the
// instance, describe network interfaces by filter, attach and detach.
//
// ## Implementations
//
// - In-memory: `enibind_core::cloud::InMemoryEc2` (tests, embedding, dry runs)
// - Signed EC2 Query API clients live outside this crate; client construction
//   and credential resolution belong to the embedding application.
//
// ## Usage
//
// ```rust,ignore
// use enibind_core::traits::{Ec2Api, InterfaceFilter};
//
// let filter = InterfaceFilter::new()
//     .with_private_ips(candidates.ips())
//     .with_status(InterfaceStatus::Available)
//     .with_subnet("subnet-0abc");
// let free = api.describe_network_interfaces(&filter).await?;
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

use crate::types::{InstanceDescription, InterfaceStatus, NetworkInterfaceHandle};

/// Provider-side filter for describe-network-interfaces
///
/// Each populated field narrows the result; an empty `private_ips` list means
/// "any address", mirroring how an absent provider filter behaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceFilter {
    /// `private-ip-address` ∈ these values
    pub private_ips: Vec<Ipv4Addr>,
    /// `status` = this value
    pub status: Option<InterfaceStatus>,
    /// `subnet-id` = this value
    pub subnet_id: Option<String>,
}

impl InterfaceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_private_ips(mut self, ips: Vec<Ipv4Addr>) -> Self {
        self.private_ips = ips;
        self
    }

    pub fn with_status(mut self, status: InterfaceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_subnet(mut self, subnet_id: impl Into<String>) -> Self {
        self.subnet_id = Some(subnet_id.into());
        self
    }

    /// Evaluate the filter locally (used by in-process backends)
    pub fn matches(&self, interface: &NetworkInterfaceHandle) -> bool {
        if !self.private_ips.is_empty() {
            match interface.private_ip {
                Some(ip) if self.private_ips.contains(&ip) => {}
                _ => return false,
            }
        }

        if let Some(ref status) = self.status
            && &interface.status != status
        {
            return false;
        }

        if let Some(ref subnet_id) = self.subnet_id
            && &interface.subnet_id != subnet_id
        {
            return false;
        }

        true
    }
}

/// Trait for cloud API backends
///
/// # Trust Level: Untrusted
///
/// Backends execute one API call per method and report the result. They do
/// not retry, sleep, cache, or decide which interface to use: retries and
/// scheduling belong to the binder, selection belongs to the decision engine.
///
/// # Atomicity
///
/// `attach_network_interface` must be atomic on the provider side: attaching
/// an interface another instance already claimed has to fail (or no-op), never
/// silently steal it. The binder's convergence relies on the losing instance
/// seeing an error and retrying against a different interface next pass.
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// Describe one instance
    ///
    /// # Returns
    ///
    /// - `Ok(Some(InstanceDescription))`: the instance record
    /// - `Ok(None)`: the provider has no record for this id
    /// - `Err(Error)`: the API call failed
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDescription>, crate::Error>;

    /// Describe network interfaces matching a filter
    ///
    /// An empty result is a normal outcome, not an error.
    async fn describe_network_interfaces(
        &self,
        filter: &InterfaceFilter,
    ) -> Result<Vec<NetworkInterfaceHandle>, crate::Error>;

    /// Attach an interface to an instance at a device index
    ///
    /// # Returns
    ///
    /// The provider's attachment id
    async fn attach_network_interface(
        &self,
        interface_id: &str,
        instance_id: &str,
        device_index: u32,
    ) -> Result<String, crate::Error>;

    /// Detach an interface by attachment id
    async fn detach_network_interface(&self, attachment_id: &str) -> Result<(), crate::Error>;

    /// Backend name (for logging and error context)
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(ip: [u8; 4], status: InterfaceStatus, subnet: &str) -> NetworkInterfaceHandle {
        NetworkInterfaceHandle {
            interface_id: "eni-1".to_string(),
            private_ip: Some(Ipv4Addr::from(ip)),
            status,
            attachment: None,
            subnet_id: subnet.to_string(),
        }
    }

    #[test]
    fn test_filter_matches_all_fields() {
        let filter = InterfaceFilter::new()
            .with_private_ips(vec![Ipv4Addr::new(10, 0, 1, 4)])
            .with_status(InterfaceStatus::Available)
            .with_subnet("subnet-a");

        assert!(filter.matches(&iface([10, 0, 1, 4], InterfaceStatus::Available, "subnet-a")));
        assert!(!filter.matches(&iface([10, 0, 1, 5], InterfaceStatus::Available, "subnet-a")));
        assert!(!filter.matches(&iface([10, 0, 1, 4], InterfaceStatus::InUse, "subnet-a")));
        assert!(!filter.matches(&iface([10, 0, 1, 4], InterfaceStatus::Available, "subnet-b")));
    }

    #[test]
    fn test_filter_requires_ip_when_ips_given() {
        let filter = InterfaceFilter::new().with_private_ips(vec![Ipv4Addr::new(10, 0, 1, 4)]);
        let mut no_ip = iface([10, 0, 1, 4], InterfaceStatus::Available, "subnet-a");
        no_ip.private_ip = None;

        assert!(!filter.matches(&no_ip));
        assert!(InterfaceFilter::new().matches(&no_ip));
    }
}
