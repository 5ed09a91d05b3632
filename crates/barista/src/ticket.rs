//! Shared, lockable cell around one [`Order`].
//!
//! A [`Ticket`] is the unit of mutual exclusion for an Order. Dispatcher
//! commands, scheduler batches and the reassignment policy all mutate the
//! Order only while holding the ticket lock, so any two of them are totally
//! ordered against each other.
//!
//! Besides the Order itself the ticket carries the scheduling bookkeeping
//! that must change atomically with it:
//!
//! - which kinds currently have a preparation pipeline running
//! - whether the client has been told the whole order is ready
//! - whether the ticket is retired (collected, abandoned, or torn down)

use std::sync::{Arc, Mutex, MutexGuard};

use crate::kind::{Kind, PerKind};
use crate::order::{Order, OrderSnapshot};

/// State guarded by a [`Ticket`] lock.
#[derive(Debug, Default)]
pub struct TicketState {
    order: Order,
    pipelines: PerKind<bool>,
    ready_notified: bool,
    retired: bool,
}

impl TicketState {
    pub fn order(&self) -> &Order {
        &self.order
    }

    pub(crate) fn order_mut(&mut self) -> &mut Order {
        &mut self.order
    }

    /// Add stock to the waiting area.
    ///
    /// Any non-empty addition re-arms the whole-order-ready notification.
    pub fn add_to_waiting(&mut self, items: PerKind<u32>) {
        self.order.add_to_waiting(items);
        if !items.is_empty() {
            self.ready_notified = false;
        }
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        self.order.snapshot()
    }

    /// Mark the ticket as no longer owned by any registry entry.
    ///
    /// Batches already preparing still complete; no new batch starts.
    pub fn retire(&mut self) {
        self.retired = true;
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Claim the preparation pipeline for `kind`.
    ///
    /// Returns false if the ticket is retired, a pipeline is already running
    /// for that kind, or nothing of that kind is waiting.
    pub(crate) fn claim_pipeline(&mut self, kind: Kind) -> bool {
        if self.retired || self.pipelines[kind] || self.order.snapshot().waiting[kind] == 0 {
            return false;
        }
        self.pipelines[kind] = true;
        true
    }

    pub(crate) fn release_pipeline(&mut self, kind: Kind) {
        self.pipelines[kind] = false;
    }

    pub fn has_pipeline(&self, kind: Kind) -> bool {
        self.pipelines[kind]
    }

    /// Edge-triggered readiness check.
    ///
    /// Returns true exactly once per transition into the ready-for-collection
    /// state. Re-checking an order that is still ready returns false.
    pub fn take_ready_edge(&mut self) -> bool {
        if !self.order.is_ready_for_collection() {
            self.ready_notified = false;
            return false;
        }
        if self.ready_notified {
            return false;
        }
        self.ready_notified = true;
        true
    }
}

/// Cloneable handle to one Order's state.
#[derive(Debug, Clone, Default)]
pub struct Ticket {
    inner: Arc<Mutex<TicketState>>,
}

impl Ticket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the ticket lock, recovering from poison if necessary.
    ///
    /// Every Order transition checks its own preconditions, so the counters
    /// are consistent even if a holder panicked mid-way.
    pub fn lock(&self) -> MutexGuard<'_, TicketState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        self.lock().snapshot()
    }

    pub fn is_retired(&self) -> bool {
        self.lock().is_retired()
    }

    /// True when both handles refer to the same Order.
    pub fn ptr_eq(&self, other: &Ticket) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
