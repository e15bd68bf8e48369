//! Candidate address resolution
//!
//! Turns the discovery source's URLs for a zone into the ordered list of
//! IPv4 addresses the binder may hold.
//!
//! Hosts are accepted in two shapes:
//! - a literal IPv4 address, used verbatim
//! - a cloud-internal hostname `ip-A-B-C-D.<domain>`, decoded to `A.B.C.D`
//!
//! Resolution is all-or-nothing: one undecodable entry fails the whole list,
//! so a typo in the pool never silently shrinks it.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::ServiceUrlSource;
use crate::types::{CandidateAddress, CandidateAddressList};

/// Resolves the candidate address list for a zone
#[derive(Clone)]
pub struct CandidateResolver {
    source: Arc<dyn ServiceUrlSource>,
}

impl CandidateResolver {
    pub fn new(source: Arc<dyn ServiceUrlSource>) -> Self {
        Self { source }
    }

    /// Resolve the candidates for `zone`
    ///
    /// # Errors
    ///
    /// - [`Error::NoCandidates`] when discovery returns nothing for the zone
    /// - [`Error::MalformedCandidate`] when any entry can't be reduced to IPv4
    /// - discovery errors are passed through unchanged
    pub async fn resolve_candidates(&self, zone: &str) -> Result<CandidateAddressList> {
        let urls = self.source.service_urls_for_zone(zone).await?;
        debug!(
            zone,
            source = self.source.source_name(),
            count = urls.len(),
            "Discovered service URLs"
        );
        candidates_from_urls(zone, &urls)
    }
}

/// Decode every URL of a zone, preserving order
pub fn candidates_from_urls(zone: &str, urls: &[String]) -> Result<CandidateAddressList> {
    if urls.is_empty() {
        return Err(Error::no_candidates(zone));
    }

    let addresses = urls
        .iter()
        .map(|url| decode_candidate(url))
        .collect::<Result<Vec<_>>>()?;

    Ok(CandidateAddressList::new(addresses))
}

/// Decode a single URL or host into a candidate address
pub fn decode_candidate(candidate: &str) -> Result<CandidateAddress> {
    let host = extract_host(candidate)
        .ok_or_else(|| Error::malformed_candidate(candidate, "no host in URL"))?;

    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => return Ok(CandidateAddress::new(ip)),
        Ok(IpAddr::V6(_)) => {
            return Err(Error::malformed_candidate(
                candidate,
                "IPv6 hosts are not valid interface addresses",
            ));
        }
        Err(_) => {}
    }

    decode_internal_hostname(host)
        .map(CandidateAddress::new)
        .map_err(|reason| Error::malformed_candidate(candidate, reason))
}

/// `ip-172-31-55-172.ec2.internal` → `172.31.55.172`
///
/// The first hyphen token of the first label is a fixed prefix and is
/// dropped; the next four tokens are the octets. Anything after the fourth
/// octet is ignored.
fn decode_internal_hostname(host: &str) -> std::result::Result<Ipv4Addr, String> {
    let first_label = host.split('.').next().unwrap_or_default();
    let tokens: Vec<&str> = first_label.split('-').collect();

    if tokens.len() < 5 {
        return Err(format!(
            "Illegal internal hostname {}: expected ip-A-B-C-D",
            host
        ));
    }

    let dotted = tokens[1..5].join(".");
    dotted.parse::<Ipv4Addr>().map_err(|_| {
        format!(
            "Illegal internal hostname {} translated to '{}'",
            host, dotted
        )
    })
}

/// Host portion of a URL (`scheme://user@host:port/path`) or bare host
///
/// Bracketed IPv6 literals come back without brackets.
pub fn extract_host(candidate: &str) -> Option<&str> {
    let candidate = candidate.trim();
    let rest = match candidate.find("://") {
        Some(idx) => &candidate[idx + 3..],
        None => candidate,
    };

    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    let host_port = match authority.rfind('@') {
        Some(idx) => &authority[idx + 1..],
        None => authority,
    };

    let host = if let Some(bracketed) = host_port.strip_prefix('[') {
        let end = bracketed.find(']')?;
        &bracketed[..end]
    } else {
        match host_port.find(':') {
            Some(idx) => &host_port[..idx],
            None => host_port,
        }
    };

    if host.is_empty() { None } else { Some(host) }
}
