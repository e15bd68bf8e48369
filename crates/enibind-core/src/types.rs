//! Data model shared by the binder components
//!
//! Everything here is transient: values are rebuilt on every reconciliation
//! pass and none of them are persisted. The cloud provider owns the truth.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// A single address from the zone's stable identity pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateAddress(Ipv4Addr);

impl CandidateAddress {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self(ip)
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.0
    }
}

impl From<Ipv4Addr> for CandidateAddress {
    fn from(ip: Ipv4Addr) -> Self {
        Self(ip)
    }
}

impl fmt::Display for CandidateAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ordered candidate addresses for one zone
///
/// Position encodes priority: index 0 is the address every instance tries
/// first, which keeps selection identical across competing instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAddressList {
    addresses: Vec<CandidateAddress>,
}

impl CandidateAddressList {
    pub fn new(addresses: Vec<CandidateAddress>) -> Self {
        Self { addresses }
    }

    /// Priority index of an address, if it is a candidate
    pub fn position(&self, ip: Ipv4Addr) -> Option<usize> {
        self.addresses.iter().position(|c| c.ip() == ip)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.position(ip).is_some()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateAddress> {
        self.addresses.iter()
    }

    /// Addresses as plain IPs, in priority order (used for provider filters)
    pub fn ips(&self) -> Vec<Ipv4Addr> {
        self.addresses.iter().map(CandidateAddress::ip).collect()
    }
}

impl FromIterator<Ipv4Addr> for CandidateAddressList {
    fn from_iter<I: IntoIterator<Item = Ipv4Addr>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(CandidateAddress::new).collect())
    }
}

impl fmt::Display for CandidateAddressList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.addresses.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", joined.join(", "))
    }
}

/// Provider-reported lifecycle status of a network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceStatus {
    Available,
    InUse,
    Attaching,
    Detaching,
    /// Any status this crate does not model explicitly
    Other(String),
}

impl InterfaceStatus {
    /// Provider filter value for this status
    pub fn as_filter_value(&self) -> &str {
        match self {
            InterfaceStatus::Available => "available",
            InterfaceStatus::InUse => "in-use",
            InterfaceStatus::Attaching => "attaching",
            InterfaceStatus::Detaching => "detaching",
            InterfaceStatus::Other(value) => value,
        }
    }
}

/// Relation between an instance and an interface it is using
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Identifier used to detach
    pub attachment_id: String,
    pub instance_id: String,
    pub device_index: u32,
}

/// A cloud network interface as seen by the binder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceHandle {
    pub interface_id: String,
    /// Primary private IP; providers may omit it for interfaces mid-creation
    pub private_ip: Option<Ipv4Addr>,
    pub status: InterfaceStatus,
    pub attachment: Option<Attachment>,
    pub subnet_id: String,
}

impl NetworkInterfaceHandle {
    /// Create an unattached, available interface
    pub fn available(
        interface_id: impl Into<String>,
        private_ip: Ipv4Addr,
        subnet_id: impl Into<String>,
    ) -> Self {
        Self {
            interface_id: interface_id.into(),
            private_ip: Some(private_ip),
            status: InterfaceStatus::Available,
            attachment: None,
            subnet_id: subnet_id.into(),
        }
    }

    pub fn attachment_id(&self) -> Option<&str> {
        self.attachment.as_ref().map(|a| a.attachment_id.as_str())
    }
}

/// What the local metadata source knows about this instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    pub instance_id: String,
    pub availability_zone: String,
}

impl InstanceMetadata {
    pub fn new(instance_id: impl Into<String>, availability_zone: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            availability_zone: availability_zone.into(),
        }
    }
}

/// The running instance, resolved for one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceIdentity {
    pub instance_id: String,
    pub availability_zone: String,
    pub subnet_id: String,
    /// Interfaces attached when the instance was described, primary included
    pub attached_interfaces: Vec<NetworkInterfaceHandle>,
}

/// Provider description of an instance (describe-instance result)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub instance_id: String,
    pub subnet_id: String,
    /// Interfaces currently attached, primary included
    pub network_interfaces: Vec<NetworkInterfaceHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_list_priority() {
        let list: CandidateAddressList = [
            Ipv4Addr::new(10, 0, 0, 3),
            Ipv4Addr::new(10, 0, 0, 1),
        ]
        .into_iter()
        .collect();

        assert_eq!(list.position(Ipv4Addr::new(10, 0, 0, 3)), Some(0));
        assert_eq!(list.position(Ipv4Addr::new(10, 0, 0, 1)), Some(1));
        assert!(!list.contains(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(list.to_string(), "[10.0.0.3, 10.0.0.1]");
    }

    #[test]
    fn test_status_filter_values() {
        assert_eq!(InterfaceStatus::Available.as_filter_value(), "available");
        assert_eq!(InterfaceStatus::InUse.as_filter_value(), "in-use");
        assert_eq!(
            InterfaceStatus::Other("associated".to_string()).as_filter_value(),
            "associated"
        );
    }
}
