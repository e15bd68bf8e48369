// # Cloud Backends
//
// Implementations of the `Ec2Api` trait shipped with the core.

pub mod memory;

pub use memory::{CloudCall, InMemoryEc2};
