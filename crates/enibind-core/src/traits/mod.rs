//! Collaborator traits for the ENI binder
//!
//! This module defines the seams between the reconciliation core and the
//! outside world.
//!
//! - [`Ec2Api`]: describe, attach and detach network interfaces
//! - [`ServiceUrlSource`] / [`TxtResolver`]: per-zone service URL discovery
//! - [`InstanceIdentityProvider`]: the running instance's id and zone
//! - [`PeerRegistry`]: membership registry recovery on unbound passes

pub mod cloud_api;
pub mod identity;
pub mod peer_registry;
pub mod service_urls;

pub use cloud_api::{Ec2Api, InterfaceFilter};
pub use identity::{InstanceIdentityProvider, StaticIdentity};
pub use peer_registry::{NoopPeerRegistry, PeerRegistry};
pub use service_urls::{ServiceUrlSource, TxtResolver};
