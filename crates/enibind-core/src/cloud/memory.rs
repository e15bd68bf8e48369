// # In-Memory Cloud
//
// In-process implementation of `Ec2Api`.
//
// ## Purpose
//
// Models the slice of provider behaviour the binder depends on:
// - interfaces are `available` until attached, then `in-use`
// - attach is atomic: an interface already attached, or a device slot already
//   occupied, makes the call fail instead of stealing it
// - detach returns the interface to `available`
//
// Every call is journaled so tests can assert exactly what the binder asked
// the provider to do, and failures can be injected per call class.
//
// ## When to Use
//
// - Tests (including several binders racing over one shared cloud)
// - Embedding the binder outside a real cloud
// - Dry runs of discovery and selection logic

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::Error;
use crate::traits::{Ec2Api, InterfaceFilter};
use crate::types::{Attachment, InstanceDescription, InterfaceStatus, NetworkInterfaceHandle};

const BACKEND: &str = "memory";

/// One recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudCall {
    DescribeInstance {
        instance_id: String,
    },
    DescribeNetworkInterfaces,
    Attach {
        interface_id: String,
        instance_id: String,
        device_index: u32,
    },
    Detach {
        attachment_id: String,
    },
}

#[derive(Debug, Default)]
struct CloudState {
    /// instance id → subnet id
    instances: BTreeMap<String, String>,
    interfaces: BTreeMap<String, NetworkInterfaceHandle>,
    next_attachment: u64,
    fail_queries: bool,
    fail_attaches: bool,
    fail_detaches: bool,
    journal: Vec<CloudCall>,
}

/// In-memory cloud implementation
///
/// Clones share state, so one cloud can back several binders.
///
/// # Example
///
/// ```rust
/// use enibind_core::cloud::InMemoryEc2;
/// use enibind_core::types::NetworkInterfaceHandle;
/// use std::net::Ipv4Addr;
///
/// let cloud = InMemoryEc2::new();
/// cloud.add_instance("i-0abc", "subnet-1");
/// cloud.add_interface(NetworkInterfaceHandle::available(
///     "eni-1",
///     Ipv4Addr::new(10, 0, 1, 4),
///     "subnet-1",
/// ));
/// assert_eq!(cloud.holder_of(Ipv4Addr::new(10, 0, 1, 4)), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryEc2 {
    inner: Arc<Mutex<CloudState>>,
}

impl InMemoryEc2 {
    /// Create an empty cloud
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CloudState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an instance in a subnet
    pub fn add_instance(&self, instance_id: impl Into<String>, subnet_id: impl Into<String>) {
        self.state()
            .instances
            .insert(instance_id.into(), subnet_id.into());
    }

    /// Register an interface (attached or not)
    pub fn add_interface(&self, interface: NetworkInterfaceHandle) {
        self.state()
            .interfaces
            .insert(interface.interface_id.clone(), interface);
    }

    /// Make describe calls fail
    pub fn fail_queries(&self, fail: bool) {
        self.state().fail_queries = fail;
    }

    /// Make attach calls fail
    pub fn fail_attaches(&self, fail: bool) {
        self.state().fail_attaches = fail;
    }

    /// Make detach calls fail
    pub fn fail_detaches(&self, fail: bool) {
        self.state().fail_detaches = fail;
    }

    /// Current state of an interface
    pub fn interface(&self, interface_id: &str) -> Option<NetworkInterfaceHandle> {
        self.state().interfaces.get(interface_id).cloned()
    }

    /// Instance currently holding the interface with `ip`
    pub fn holder_of(&self, ip: std::net::Ipv4Addr) -> Option<String> {
        self.state()
            .interfaces
            .values()
            .find(|iface| iface.private_ip == Some(ip))
            .and_then(|iface| iface.attachment.as_ref())
            .map(|attachment| attachment.instance_id.clone())
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<CloudCall> {
        self.state().journal.clone()
    }

    /// Attach calls as (interface, instance, device index)
    pub fn attach_calls(&self) -> Vec<(String, String, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CloudCall::Attach {
                    interface_id,
                    instance_id,
                    device_index,
                } => Some((interface_id, instance_id, device_index)),
                _ => None,
            })
            .collect()
    }

    /// Detach calls by attachment id
    pub fn detach_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CloudCall::Detach { attachment_id } => Some(attachment_id),
                _ => None,
            })
            .collect()
    }

    /// Forget the journal (state is kept)
    pub fn clear_calls(&self) {
        self.state().journal.clear();
    }
}

#[async_trait]
impl Ec2Api for InMemoryEc2 {
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDescription>, Error> {
        let mut state = self.state();
        state.journal.push(CloudCall::DescribeInstance {
            instance_id: instance_id.to_string(),
        });

        if state.fail_queries {
            return Err(Error::provider_query(BACKEND, "describe-instances unavailable"));
        }

        let Some(subnet_id) = state.instances.get(instance_id).cloned() else {
            return Ok(None);
        };

        let mut network_interfaces: Vec<NetworkInterfaceHandle> = state
            .interfaces
            .values()
            .filter(|iface| {
                iface
                    .attachment
                    .as_ref()
                    .is_some_and(|a| a.instance_id == instance_id)
            })
            .cloned()
            .collect();
        network_interfaces.sort_by_key(|iface| {
            iface.attachment.as_ref().map(|a| a.device_index).unwrap_or_default()
        });

        Ok(Some(InstanceDescription {
            instance_id: instance_id.to_string(),
            subnet_id,
            network_interfaces,
        }))
    }

    async fn describe_network_interfaces(
        &self,
        filter: &InterfaceFilter,
    ) -> Result<Vec<NetworkInterfaceHandle>, Error> {
        let mut state = self.state();
        state.journal.push(CloudCall::DescribeNetworkInterfaces);

        if state.fail_queries {
            return Err(Error::provider_query(
                BACKEND,
                "describe-network-interfaces unavailable",
            ));
        }

        Ok(state
            .interfaces
            .values()
            .filter(|iface| filter.matches(iface))
            .cloned()
            .collect())
    }

    async fn attach_network_interface(
        &self,
        interface_id: &str,
        instance_id: &str,
        device_index: u32,
    ) -> Result<String, Error> {
        let mut state = self.state();
        state.journal.push(CloudCall::Attach {
            interface_id: interface_id.to_string(),
            instance_id: instance_id.to_string(),
            device_index,
        });

        if state.fail_attaches {
            return Err(Error::attach(interface_id, "attach-network-interface unavailable"));
        }

        if !state.instances.contains_key(instance_id) {
            return Err(Error::attach(
                interface_id,
                format!("InvalidInstanceID.NotFound: {}", instance_id),
            ));
        }

        let slot_taken = state.interfaces.values().any(|iface| {
            iface
                .attachment
                .as_ref()
                .is_some_and(|a| a.instance_id == instance_id && a.device_index == device_index)
        });
        if slot_taken {
            return Err(Error::attach(
                interface_id,
                format!("device index {} already in use on {}", device_index, instance_id),
            ));
        }

        state.next_attachment += 1;
        let attachment_id = format!("eni-attach-{:08x}", state.next_attachment);

        let iface = state.interfaces.get_mut(interface_id).ok_or_else(|| {
            Error::attach(
                interface_id,
                format!("InvalidNetworkInterfaceID.NotFound: {}", interface_id),
            )
        })?;

        if iface.status != InterfaceStatus::Available || iface.attachment.is_some() {
            return Err(Error::attach(
                interface_id,
                "InvalidNetworkInterface.InUse: interface is already attached",
            ));
        }

        iface.status = InterfaceStatus::InUse;
        iface.attachment = Some(Attachment {
            attachment_id: attachment_id.clone(),
            instance_id: instance_id.to_string(),
            device_index,
        });

        Ok(attachment_id)
    }

    async fn detach_network_interface(&self, attachment_id: &str) -> Result<(), Error> {
        let mut state = self.state();
        state.journal.push(CloudCall::Detach {
            attachment_id: attachment_id.to_string(),
        });

        if state.fail_detaches {
            return Err(Error::detach(attachment_id, "detach-network-interface unavailable"));
        }

        let iface = state
            .interfaces
            .values_mut()
            .find(|iface| iface.attachment_id() == Some(attachment_id))
            .ok_or_else(|| {
                Error::detach(
                    attachment_id,
                    format!("InvalidAttachmentID.NotFound: {}", attachment_id),
                )
            })?;

        iface.attachment = None;
        iface.status = InterfaceStatus::Available;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
