// # enibind-core
//
// Core library for binding an instance to a stable secondary network
// interface.
//
// ## Architecture Overview
//
// - **ServiceUrlSource**: Trait for discovering a zone's service URLs
// - **CandidateResolver**: Turns those URLs into an ordered address pool
// - **Ec2Api**: Trait for the cloud calls (describe, attach, detach)
// - **InstanceIdentityProvider**: Trait for "which instance, which zone"
// - **PeerRegistry**: Trait for the registry resync run before rebinding
// - **EniBinder**: Engine that keeps the binding reconciled over time
//
// ## Design Principles
//
// 1. **Provider as Truth**: Binding state is re-derived every pass, never cached
// 2. **Deterministic Choice**: Every instance ranks the pool the same way
// 3. **Provider Atomicity**: Races are settled by attach, not by local locks
// 4. **Library-First**: The daemon is a thin shell around this crate

pub mod candidates;
pub mod cloud;
pub mod config;
pub mod decision;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod retry;
pub mod traits;
pub mod types;

// Re-export core types for convenience
pub use candidates::CandidateResolver;
pub use cloud::InMemoryEc2;
pub use config::{BinderConfig, DiscoveryConfig, DnsDiscoveryConfig};
pub use engine::{BindOutcome, BinderEvent, BinderPhase, BinderStatus, EniBinder, UnbindOutcome};
pub use error::{Error, Result};
pub use inventory::{InstanceInventory, SECONDARY_DEVICE_INDEX};
pub use retry::{Attempt, RetryOutcome, RetryPolicy};
pub use traits::{Ec2Api, InstanceIdentityProvider, PeerRegistry, ServiceUrlSource, TxtResolver};
