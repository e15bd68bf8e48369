//! Address-binding reconciliation engine
//!
//! The `EniBinder` keeps the local instance attached to one interface from
//! its zone's candidate pool:
//! - at startup it binds, retrying a bounded number of times
//! - a periodic pass re-checks the binding and binds again when it was lost
//! - at shutdown it stops the periodic pass, then detaches
//!
//! ## Architecture
//!
//! ```text
//!                      ┌──────────────┐
//!                      │  EniBinder   │──── BinderEvent ───▶ (monitoring)
//!                      └──────────────┘
//!                             │
//!      ┌──────────────┬───────┴───────┬───────────────┬───────────────┐
//!      ▼              ▼               ▼               ▼               ▼
//! ┌──────────┐ ┌─────────────┐ ┌────────────┐ ┌──────────────┐ ┌────────────┐
//! │ Identity │ │ Candidates  │ │ Inventory  │ │  Decision    │ │  Registry  │
//! │ (who)    │ │ (which IPs) │ │ (Ec2Api)   │ │  (pure)      │ │  (resync)  │
//! └──────────┘ └─────────────┘ └────────────┘ └──────────────┘ └────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Read instance metadata, resolve the zone's candidates
//! 2. Bound already → next pass after the bound interval
//! 3. Unbound → resync the peer registry, then bind
//! 4. Next pass after the unbound interval (also after any error)
//!
//! Nothing is cached between passes. The provider is the source of truth and
//! every pass starts from a fresh view of it.

mod schedule;
mod status;

pub use schedule::PeriodicSchedule;
pub use status::{BinderPhase, BinderStatus};

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::candidates::CandidateResolver;
use crate::config::BinderConfig;
use crate::decision;
use crate::error::{Error, Result};
use crate::inventory::InstanceInventory;
use crate::retry::{Attempt, RetryOutcome, RetryPolicy};
use crate::traits::{Ec2Api, InstanceIdentityProvider, PeerRegistry, ServiceUrlSource};
use crate::types::{CandidateAddressList, InstanceIdentity, NetworkInterfaceHandle};

/// Events emitted by the EniBinder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinderEvent {
    /// Startup retry loop finished
    StartupCompleted { bound: bool, attempts: usize },

    /// Periodic passes armed
    ScheduleArmed { first_delay: Duration },

    /// Interface attached to this instance
    Attached {
        interface_id: String,
        ip: Ipv4Addr,
        attachment_id: String,
    },

    /// No candidate interface was free in the local subnet
    NoInterfaceAvailable { zone: String },

    /// Peer registry cleared and resynced before a bind attempt
    RegistryResynced { count: usize },

    /// Periodic pass finished
    PassCompleted { bound: bool, next_delay: Duration },

    /// Periodic pass failed; the next one is still scheduled
    PassFailed { error: String, next_delay: Duration },

    /// Periodic passes stopped; no pass is running
    ScheduleCancelled,

    /// Interface detached from this instance
    Detached {
        interface_id: String,
        attachment_id: String,
    },

    /// Shutdown finished
    Stopped,
}

/// Result of a bind attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    Attached {
        interface_id: String,
        ip: Ipv4Addr,
        attachment_id: String,
    },
    /// Every candidate is taken (or absent from the local subnet)
    NoneAvailable,
}

/// Result of an unbind attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnbindOutcome {
    Detached {
        interface_id: String,
        attachment_id: String,
    },
    NotBound,
}

/// Reconciliation engine for one instance
///
/// ## Lifecycle
///
/// 1. Create with [`EniBinder::new()`]
/// 2. [`EniBinder::start()`] binds (best effort) and arms periodic passes
/// 3. [`EniBinder::shutdown()`] stops the passes and detaches
///
/// No error escapes `start()` or `shutdown()`: failures are logged, reported
/// as events, and recorded in [`EniBinder::status()`].
pub struct EniBinder {
    inner: Arc<BinderInner>,
    schedule: tokio::sync::Mutex<Option<PeriodicSchedule>>,
    started: AtomicBool,

    // Held by start() for its whole run and by shutdown() before it unbinds
    lifecycle: tokio::sync::Mutex<()>,
}

struct BinderInner {
    identity: Arc<dyn InstanceIdentityProvider>,
    candidates: CandidateResolver,
    inventory: InstanceInventory,
    registry: Arc<dyn PeerRegistry>,

    retry: RetryPolicy,
    bound_interval: Duration,
    unbound_interval: Duration,

    status: Mutex<BinderStatus>,
    event_tx: mpsc::Sender<BinderEvent>,
}

impl EniBinder {
    /// Create a new binder
    ///
    /// # Parameters
    ///
    /// - `config`: binder configuration (validated here)
    /// - `discovery`: source of the zone's service URLs
    /// - `identity`: source of the instance id and zone
    /// - `ec2`: cloud API
    /// - `registry`: peer registry recovery hooks
    ///
    /// # Returns
    ///
    /// A tuple of (binder, event_receiver)
    pub fn new(
        config: BinderConfig,
        discovery: Arc<dyn ServiceUrlSource>,
        identity: Arc<dyn InstanceIdentityProvider>,
        ec2: Arc<dyn Ec2Api>,
        registry: Arc<dyn PeerRegistry>,
    ) -> Result<(Self, mpsc::Receiver<BinderEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let inner = BinderInner {
            identity,
            candidates: CandidateResolver::new(discovery),
            inventory: InstanceInventory::new(ec2),
            registry,
            retry: RetryPolicy::new(config.bind_rebind_retries, config.retry_sleep()),
            bound_interval: config.bound_interval(),
            unbound_interval: config.unbound_interval(),
            status: Mutex::new(BinderStatus::default()),
            event_tx: tx,
        };

        let binder = Self {
            inner: Arc::new(inner),
            schedule: tokio::sync::Mutex::new(None),
            started: AtomicBool::new(false),
            lifecycle: tokio::sync::Mutex::new(()),
        };

        Ok((binder, rx))
    }

    /// Bind with retries, then arm the periodic passes
    ///
    /// Returns once the startup attempts are done, bound or not. The first
    /// periodic pass runs after the unbound interval whatever the startup
    /// result was. Calling `start()` again is a no-op.
    ///
    /// A `shutdown()` issued meanwhile ends the attempts early and waits for
    /// this call to return before it unbinds.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Binder already started");
            return;
        }

        let _lifecycle = self.lifecycle.lock().await;
        if self.inner.status().phase.is_terminal() {
            warn!("Binder is shut down, not starting");
            return;
        }

        info!(
            backend = self.inner.inventory.backend_name(),
            attempts = self.inner.retry.attempts,
            "Starting binder"
        );

        let inner = &self.inner;
        let outcome = inner
            .retry
            .run("startup bind", |_| async move { inner.bind_attempt().await })
            .await;

        let attempts = outcome.attempts();
        let bound = outcome.value().unwrap_or(false);
        if bound {
            info!(attempts, "Startup bind complete");
        } else if inner.status().phase.is_terminal() {
            info!(attempts, "Startup bind abandoned for shutdown");
        } else {
            error!(
                attempts,
                "Could not bind at startup, periodic passes will keep trying"
            );
        }
        inner.emit_event(BinderEvent::StartupCompleted { bound, attempts });

        self.arm_schedule().await;
    }

    async fn arm_schedule(&self) {
        let mut slot = self.schedule.lock().await;
        // shutdown() may have run while startup was retrying
        if slot.is_some() || self.inner.status().phase.is_terminal() {
            return;
        }

        let first_delay = self.inner.unbound_interval;
        let inner = self.inner.clone();
        *slot = Some(PeriodicSchedule::spawn(first_delay, move || {
            let inner = inner.clone();
            async move { inner.run_pass().await }
        }));

        info!(first_delay_ms = first_delay.as_millis() as u64, "Periodic passes armed");
        self.inner.emit_event(BinderEvent::ScheduleArmed { first_delay });
    }

    /// Stop the periodic passes, then detach with retries
    ///
    /// A pass running when this is called completes first; no new pass starts
    /// afterwards. Calling `shutdown()` again is a no-op.
    pub async fn shutdown(&self) {
        {
            let mut status = self.inner.status();
            if status.phase.is_terminal() {
                debug!("Shutdown already in progress or done");
                return;
            }
            status.set_phase(BinderPhase::ShuttingDown);
        }
        info!("Shutting down binder");

        // Waits out a start() still retrying; it stops at its next attempt
        let _lifecycle = self.lifecycle.lock().await;

        let schedule = self.schedule.lock().await.take();
        if let Some(schedule) = schedule {
            schedule.cancel().await;
            self.inner.emit_event(BinderEvent::ScheduleCancelled);
        }

        let inner = &self.inner;
        let outcome = inner
            .retry
            .run("shutdown unbind", |_| async move {
                inner.unbind().await.map(Attempt::Done)
            })
            .await;

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                info!(attempts, outcome = ?value, "Unbind complete");
            }
            RetryOutcome::Exhausted { attempts, .. } => {
                error!(attempts, "Could not unbind at shutdown");
            }
        }

        {
            let mut status = inner.status();
            status.bound_address = None;
            status.set_phase(BinderPhase::Stopped);
        }
        inner.emit_event(BinderEvent::Stopped);
        info!("Binder stopped");
    }

    /// Run one periodic pass now
    ///
    /// # Returns
    ///
    /// The delay the schedule would wait before the next pass
    pub async fn run_pass(&self) -> Duration {
        self.inner.run_pass().await
    }

    /// Whether an interface with a candidate address is attached to this
    /// instance
    pub async fn already_bound(&self) -> Result<bool> {
        Ok(self.inner.bound_interface().await?.is_some())
    }

    /// Attach the best free candidate interface to this instance
    pub async fn bind(&self) -> Result<BindOutcome> {
        self.inner.bind().await
    }

    /// Detach the candidate interface attached to this instance, if any
    pub async fn unbind(&self) -> Result<UnbindOutcome> {
        self.inner.unbind().await
    }

    /// Current health snapshot
    pub fn status(&self) -> BinderStatus {
        self.inner.status().clone()
    }
}

/// Per-pass view of this instance and its zone's pool
///
/// Built once per pass or startup attempt: one identity read, one candidate
/// resolution, one instance description.
struct PassContext {
    me: InstanceIdentity,
    candidates: CandidateAddressList,
}

impl PassContext {
    fn bound_interface(&self) -> Option<&NetworkInterfaceHandle> {
        decision::bound_interface(&self.me.attached_interfaces, &self.candidates)
    }
}

impl BinderInner {
    fn status(&self) -> MutexGuard<'_, BinderStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn context(&self) -> Result<PassContext> {
        let metadata = self.identity.metadata().await?;
        let candidates = self
            .candidates
            .resolve_candidates(&metadata.availability_zone)
            .await?;
        let me = self.inventory.describe_self(&metadata).await?;
        Ok(PassContext { me, candidates })
    }

    async fn bound_interface(&self) -> Result<Option<NetworkInterfaceHandle>> {
        let ctx = self.context().await?;
        Ok(ctx.bound_interface().cloned())
    }

    /// One startup attempt, `Done(true)` once bound
    ///
    /// Finishes with `Done(false)` when shutdown has begun, so no attach
    /// follows the shutdown unbind.
    async fn bind_attempt(&self) -> Result<Attempt<bool>> {
        if self.status().phase.is_terminal() {
            debug!("Shutdown started, no further startup bind attempts");
            return Ok(Attempt::Done(false));
        }

        let ctx = self.context().await?;
        if let Some(iface) = ctx.bound_interface() {
            if let Some(ip) = iface.private_ip {
                self.status().observe_bound(ip);
            }
            return Ok(Attempt::Done(true));
        }

        match self.bind_in(&ctx).await? {
            BindOutcome::Attached { .. } => Ok(Attempt::Done(true)),
            BindOutcome::NoneAvailable => Ok(Attempt::Again),
        }
    }

    async fn bind(&self) -> Result<BindOutcome> {
        let ctx = self.context().await?;
        self.bind_in(&ctx).await
    }

    async fn bind_in(&self, ctx: &PassContext) -> Result<BindOutcome> {
        let me = &ctx.me;
        let zone = me.availability_zone.as_str();

        let available = self
            .inventory
            .find_available_interfaces(&ctx.candidates, &me.subnet_id)
            .await?;

        let Some(selected) = decision::select_interface_to_bind(&available, &ctx.candidates) else {
            warn!(
                instance_id = %me.instance_id,
                zone,
                candidates = %ctx.candidates,
                "No candidate interface available to bind"
            );
            self.emit_event(BinderEvent::NoInterfaceAvailable {
                zone: zone.to_string(),
            });
            return Ok(BindOutcome::NoneAvailable);
        };

        let ip = selected.private_ip.ok_or_else(|| {
            Error::not_found(format!("private address of {}", selected.interface_id))
        })?;

        info!(
            instance_id = %me.instance_id,
            interface_id = %selected.interface_id,
            %ip,
            "Attaching interface"
        );
        let attachment_id = self
            .inventory
            .attach(&selected.interface_id, &me.instance_id)
            .await?;

        info!(
            interface_id = %selected.interface_id,
            attachment_id = %attachment_id,
            %ip,
            "Interface attached"
        );
        self.status().observe_bound(ip);
        self.emit_event(BinderEvent::Attached {
            interface_id: selected.interface_id.clone(),
            ip,
            attachment_id: attachment_id.clone(),
        });

        Ok(BindOutcome::Attached {
            interface_id: selected.interface_id.clone(),
            ip,
            attachment_id,
        })
    }

    async fn unbind(&self) -> Result<UnbindOutcome> {
        let ctx = self.context().await?;

        let Some(iface) = ctx.bound_interface() else {
            info!(
                instance_id = %ctx.me.instance_id,
                "No candidate interface attached, nothing to unbind"
            );
            return Ok(UnbindOutcome::NotBound);
        };

        let attachment_id = iface
            .attachment_id()
            .ok_or_else(|| Error::not_found(format!("attachment of {}", iface.interface_id)))?
            .to_string();

        info!(
            instance_id = %ctx.me.instance_id,
            interface_id = %iface.interface_id,
            attachment_id = %attachment_id,
            "Detaching interface"
        );
        self.inventory.detach(&attachment_id).await?;

        self.emit_event(BinderEvent::Detached {
            interface_id: iface.interface_id.clone(),
            attachment_id: attachment_id.clone(),
        });

        Ok(UnbindOutcome::Detached {
            interface_id: iface.interface_id.clone(),
            attachment_id,
        })
    }

    /// Periodic pass; returns the delay before the next one
    async fn run_pass(&self) -> Duration {
        debug!("Periodic pass started");

        match self.reconcile().await {
            Ok(bound) => {
                let next_delay = if bound {
                    self.bound_interval
                } else {
                    self.unbound_interval
                };
                self.status().record_pass(None);
                debug!(bound, next_delay_ms = next_delay.as_millis() as u64, "Periodic pass finished");
                self.emit_event(BinderEvent::PassCompleted { bound, next_delay });
                next_delay
            }
            Err(e) => {
                let next_delay = self.unbound_interval;
                let next_delay_ms = next_delay.as_millis() as u64;
                if e.is_candidate_error() {
                    error!(error = %e, next_delay_ms, "Candidate pool unusable, nothing to bind this pass");
                } else {
                    error!(error = %e, next_delay_ms, "Periodic pass failed");
                }
                self.status().record_pass(Some(e.to_string()));
                self.emit_event(BinderEvent::PassFailed {
                    error: e.to_string(),
                    next_delay,
                });
                next_delay
            }
        }
    }

    /// Returns whether the instance was bound when the pass started
    async fn reconcile(&self) -> Result<bool> {
        let ctx = self.context().await?;

        if let Some(iface) = ctx.bound_interface() {
            debug!(
                instance_id = %ctx.me.instance_id,
                interface_id = %iface.interface_id,
                "Already bound"
            );
            if let Some(ip) = iface.private_ip {
                self.status().observe_bound(ip);
            }
            return Ok(true);
        }

        warn!(
            instance_id = %ctx.me.instance_id,
            zone = %ctx.me.availability_zone,
            "Not bound to a candidate interface, resyncing registry and binding"
        );
        self.status().observe_unbound();

        self.registry.clear_registry().await?;
        let count = self.registry.sync_up().await?;
        self.registry.open_for_traffic(count).await?;
        self.emit_event(BinderEvent::RegistryResynced { count });

        self.bind_in(&ctx).await?;
        Ok(false)
    }

    fn emit_event(&self, event: BinderEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
