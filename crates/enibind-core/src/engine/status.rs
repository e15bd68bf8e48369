//! Binder health snapshot
//!
//! Observations only. Binding decisions always go back to the provider and
//! never read this.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::Ipv4Addr;

/// Lifecycle phase as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinderPhase {
    Unbound,
    Bound,
    ShuttingDown,
    Stopped,
}

impl BinderPhase {
    /// Shutdown has begun; passes may no longer change the phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, BinderPhase::ShuttingDown | BinderPhase::Stopped)
    }
}

/// Point-in-time view of the binder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinderStatus {
    pub phase: BinderPhase,

    /// Completion time of the last periodic pass
    pub last_pass_at: Option<DateTime<Utc>>,

    /// Candidate address held at the last observation
    pub bound_address: Option<Ipv4Addr>,

    /// Error of the last failed pass, cleared by a successful one
    pub last_error: Option<String>,

    pub consecutive_failures: u32,
}

impl Default for BinderStatus {
    fn default() -> Self {
        Self {
            phase: BinderPhase::Unbound,
            last_pass_at: None,
            bound_address: None,
            last_error: None,
            consecutive_failures: 0,
        }
    }
}

impl BinderStatus {
    pub(crate) fn observe_bound(&mut self, address: Ipv4Addr) {
        self.bound_address = Some(address);
        self.set_phase(BinderPhase::Bound);
    }

    pub(crate) fn observe_unbound(&mut self) {
        self.bound_address = None;
        self.set_phase(BinderPhase::Unbound);
    }

    pub(crate) fn record_pass(&mut self, error: Option<String>) {
        self.last_pass_at = Some(Utc::now());
        match error {
            Some(e) => {
                self.last_error = Some(e);
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            }
            None => {
                self.last_error = None;
                self.consecutive_failures = 0;
            }
        }
    }

    pub(crate) fn set_phase(&mut self, phase: BinderPhase) {
        // Once shutting down, only the shutdown path moves the phase
        if self.phase.is_terminal() && !phase.is_terminal() {
            return;
        }
        self.phase = phase;
    }
}
