// # HTTP Collaborators
//
// reqwest-backed implementations of the binder's outward-facing traits:
//
// - `ImdsIdentityProvider`: instance id and zone from the metadata service
// - `DohTxtResolver`: TXT lookups for DNS-based service URL discovery
//
// Neither retries on its own. A failed call surfaces as an error and the
// binder's pass or retry loop decides what happens next.

pub mod doh;
pub mod imds;

pub use doh::DohTxtResolver;
pub use imds::{DEFAULT_IMDS_BASE_URL, ImdsIdentityProvider};
