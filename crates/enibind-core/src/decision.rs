//! Binding decisions
//!
//! Pure functions over provider snapshots. Nothing here performs I/O, so the
//! same inputs always produce the same answer, on every instance racing for
//! the same pool.

use crate::types::{CandidateAddressList, NetworkInterfaceHandle};

/// Whether any attached interface carries a candidate address
pub fn is_already_bound(
    attached: &[NetworkInterfaceHandle],
    candidates: &CandidateAddressList,
) -> bool {
    bound_interface(attached, candidates).is_some()
}

/// The attached interface holding a candidate address, if any
///
/// When several match, the one with the highest-priority candidate wins.
pub fn bound_interface<'a>(
    attached: &'a [NetworkInterfaceHandle],
    candidates: &CandidateAddressList,
) -> Option<&'a NetworkInterfaceHandle> {
    best_by_priority(attached, candidates)
}

/// Pick the interface to attach
///
/// `available` is expected to be pre-filtered by the provider (candidate IPs,
/// local subnet, `available` status). The interface whose address comes first
/// in the candidate order wins. Interfaces outside the candidate set are never
/// chosen. Returns `None` when nothing qualifies, which is the normal "no free
/// address yet" outcome.
pub fn select_interface_to_bind<'a>(
    available: &'a [NetworkInterfaceHandle],
    candidates: &CandidateAddressList,
) -> Option<&'a NetworkInterfaceHandle> {
    best_by_priority(available, candidates)
}

fn best_by_priority<'a>(
    interfaces: &'a [NetworkInterfaceHandle],
    candidates: &CandidateAddressList,
) -> Option<&'a NetworkInterfaceHandle> {
    interfaces
        .iter()
        .filter_map(|iface| {
            let rank = candidates.position(iface.private_ip?)?;
            Some((rank, iface))
        })
        // min_by_key keeps the first of equal keys, so duplicates of one
        // address resolve to the earliest listed interface
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, iface)| iface)
}
