// # Service URL Traits
//
// Discovery of the per-zone service URLs whose hosts name the stable
// interfaces. Two operator-facing styles exist (static per-zone URL lists and
// DNS TXT chains); both end up behind `ServiceUrlSource`.
//
// `TxtResolver` is the DNS seam used by the TXT chain. The binder never builds
// a resolver itself.

use async_trait::async_trait;

/// Source of service URLs for an availability zone
///
/// Each returned string is a URL (or bare host) whose host is either a literal
/// IPv4 address or a cloud-internal hostname such as
/// `ip-10-0-1-4.ec2.internal`. Order is significant: the first URL names the
/// highest-priority address.
#[async_trait]
pub trait ServiceUrlSource: Send + Sync {
    /// Service URLs configured or discoverable for `zone`
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: URLs in priority order (possibly empty)
    /// - `Err(Error)`: discovery itself failed (e.g. DNS lookup error)
    async fn service_urls_for_zone(&self, zone: &str) -> Result<Vec<String>, crate::Error>;

    /// Source name (for logging)
    fn source_name(&self) -> &'static str;
}

/// Resolver for DNS TXT records
#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// Look up the TXT records of `name`
    ///
    /// Returns the character-strings of every record, in the order the
    /// resolver produced them. A name without TXT records yields an empty
    /// vector.
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, crate::Error>;
}
