//! Disconnection reassignment policy.
//!
//! When a session ends without an explicit `exit`, its unfinished stock is
//! donated to another connected client:
//!
//! 1. Remove the disconnected identity's entry, taking its Order.
//! 2. Retire that Order and read its counts under the same ticket lock, so an
//!    in-flight batch lands either entirely before or entirely after the
//!    donation.
//! 3. Empty orders stop here.
//! 4. With no other client connected the stock is dropped and journaled.
//! 5. Otherwise the **waiting-area** counts are merged into a target's Order
//!    under the target's entry lock, the target is told, and the scheduler
//!    is kicked for the target.
//!
//! Stock already preparing or on the tray is not migrated; it leaves with the
//! disconnected client. Target choice is whichever candidate the registry
//! enumerates first, which is arbitrary and not a fairness guarantee.

use std::sync::Arc;

use tracing::{info, warn};

use crate::journal::Journal;
use crate::kind::PerKind;
use crate::notice::Notice;
use crate::registry::SessionRegistry;
use crate::scheduler::{PreparationScheduler, Recipient};
use crate::ticket::Ticket;

/// What happened to an abandoned Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassignmentOutcome {
    /// The client never ordered (or had already collected).
    NoOrder,
    /// The Order held no stock in any stage.
    Empty,
    /// Nobody else was connected; the waiting stock is gone.
    Dropped { waiting: PerKind<u32> },
    /// Waiting stock now belongs to `target`.
    Merged { target: String, waiting: PerKind<u32> },
}

/// Applies the reassignment policy on abrupt disconnects.
#[derive(Debug, Clone)]
pub struct Reassigner {
    registry: Arc<SessionRegistry>,
    scheduler: PreparationScheduler,
    journal: Journal,
}

impl Reassigner {
    pub fn new(registry: Arc<SessionRegistry>, scheduler: PreparationScheduler, journal: Journal) -> Self {
        Self {
            registry,
            scheduler,
            journal,
        }
    }

    /// Handle the abrupt end of `identity`'s session.
    pub fn on_disconnect(&self, identity: &str) -> ReassignmentOutcome {
        let Some(abandoned) = self.registry.unregister(identity) else {
            info!(%identity, "client disconnected without an order");
            return ReassignmentOutcome::NoOrder;
        };

        let snapshot = {
            let mut state = abandoned.lock();
            state.retire();
            state.snapshot()
        };

        if snapshot.total() == 0 {
            info!(%identity, "client disconnected with an empty order");
            return ReassignmentOutcome::Empty;
        }

        self.journal
            .record(format!("Reassigning order from disconnected client {identity}"));

        let waiting = snapshot.waiting;
        let candidates = self
            .registry
            .connected_identities()
            .into_iter()
            .filter(|candidate| candidate != identity);

        for target in candidates {
            let Some((ticket, recipient)) = self.merge_into(&target, identity, waiting) else {
                // Left between enumeration and merge; try the next one.
                continue;
            };

            self.scheduler.kick(&ticket, &recipient);
            info!(from = %identity, to = %target, %waiting, "order reassigned");
            self.journal
                .record(format!("Order reassigned from {identity} to {target}"));
            return ReassignmentOutcome::Merged { target, waiting };
        }

        warn!(%identity, %waiting, "no client available for reassignment, stock dropped");
        self.journal.record(format!(
            "No clients available to reassign the order from {identity}"
        ));
        ReassignmentOutcome::Dropped { waiting }
    }

    fn merge_into(&self, target: &str, from: &str, waiting: PerKind<u32>) -> Option<(Ticket, Recipient)> {
        self.registry.with_session(target, |session| {
            let ticket = session.ticket_or_create().clone();
            ticket.lock().add_to_waiting(waiting);

            session.connection().send(Notice::Reassigned {
                from: from.to_string(),
                items: waiting,
            });
            (ticket, Recipient::new(target, session.connection().clone()))
        })
    }
}
