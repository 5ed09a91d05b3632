//! The per-client order state machine.
//!
//! An [`Order`] is six counters: {waiting, preparing, ready} × {tea, coffee}.
//! It is pure data plus transition logic. It does no locking of its own; the
//! [`Ticket`](crate::Ticket) that wraps it is the unit of mutual exclusion.
//!
//! # Invariants
//!
//! - Counters never underflow: a move larger than its source stage is
//!   rejected with [`OrderError::InvalidTransition`] and changes nothing.
//! - Per kind, `waiting + preparing + ready` only grows through
//!   [`Order::add_to_waiting`] and only shrinks through
//!   [`Order::remove_from_ready`]. Stage moves preserve it.
//! - [`Order::is_ready_for_collection`] holds exactly when nothing is waiting
//!   or preparing. Ready counts do not matter.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::kind::{Kind, PerKind};

/// A stage an item occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Waiting,
    Preparing,
    Ready,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Waiting, Stage::Preparing, Stage::Ready];

    /// Heading used in status reports.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Waiting => "Waiting area",
            Stage::Preparing => "Brewing area",
            Stage::Ready => "Tray area",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label().to_ascii_lowercase())
    }
}

/// Counts of each kind in each stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Order {
    waiting: PerKind<u32>,
    preparing: PerKind<u32>,
    ready: PerKind<u32>,
}

impl Order {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add newly ordered stock to the waiting area.
    pub fn add_to_waiting(&mut self, items: PerKind<u32>) {
        for kind in Kind::ALL {
            self.waiting[kind] = self.waiting[kind].saturating_add(items[kind]);
        }
    }

    /// Start preparing `qty` units of `kind`.
    pub fn move_to_preparing(&mut self, kind: Kind, qty: u32) -> Result<(), OrderError> {
        self.transfer(kind, Stage::Waiting, Some(Stage::Preparing), qty)
    }

    /// Finish preparing `qty` units of `kind`, placing them on the tray.
    pub fn move_to_ready(&mut self, kind: Kind, qty: u32) -> Result<(), OrderError> {
        self.transfer(kind, Stage::Preparing, Some(Stage::Ready), qty)
    }

    /// Hand `qty` ready units of `kind` to the client.
    pub fn remove_from_ready(&mut self, kind: Kind, qty: u32) -> Result<(), OrderError> {
        self.transfer(kind, Stage::Ready, None, qty)
    }

    /// Remove everything on the tray, returning what was collected.
    pub fn collect_ready(&mut self) -> PerKind<u32> {
        let collected = self.ready;
        self.ready = PerKind::default();
        collected
    }

    /// True when nothing is waiting or preparing.
    pub fn is_ready_for_collection(&self) -> bool {
        self.waiting.is_empty() && self.preparing.is_empty()
    }

    pub fn count(&self, stage: Stage, kind: Kind) -> u32 {
        self.stage(stage)[kind]
    }

    /// Value copy of every counter.
    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            waiting: self.waiting,
            preparing: self.preparing,
            ready: self.ready,
        }
    }

    fn stage(&self, stage: Stage) -> &PerKind<u32> {
        match stage {
            Stage::Waiting => &self.waiting,
            Stage::Preparing => &self.preparing,
            Stage::Ready => &self.ready,
        }
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut PerKind<u32> {
        match stage {
            Stage::Waiting => &mut self.waiting,
            Stage::Preparing => &mut self.preparing,
            Stage::Ready => &mut self.ready,
        }
    }

    // Check first, then mutate: a rejected move must leave every counter as it was.
    fn transfer(
        &mut self,
        kind: Kind,
        from: Stage,
        to: Option<Stage>,
        qty: u32,
    ) -> Result<(), OrderError> {
        let available = self.stage(from)[kind];
        if qty > available {
            return Err(OrderError::InvalidTransition {
                kind,
                stage: from,
                requested: qty,
                available,
            });
        }

        self.stage_mut(from)[kind] = available - qty;
        if let Some(to) = to {
            let dest = &mut self.stage_mut(to)[kind];
            *dest = dest.saturating_add(qty);
        }
        Ok(())
    }
}

/// Immutable view of an [`Order`] for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub waiting: PerKind<u32>,
    pub preparing: PerKind<u32>,
    pub ready: PerKind<u32>,
}

impl OrderSnapshot {
    pub fn stage(&self, stage: Stage) -> PerKind<u32> {
        match stage {
            Stage::Waiting => self.waiting,
            Stage::Preparing => self.preparing,
            Stage::Ready => self.ready,
        }
    }

    /// Units of `kind` across all stages.
    pub fn total_of(&self, kind: Kind) -> u32 {
        Stage::ALL
            .into_iter()
            .fold(0u32, |acc, stage| acc.saturating_add(self.stage(stage)[kind]))
    }

    /// Units across all kinds and stages.
    pub fn total(&self) -> u32 {
        self.total_of(Kind::Tea).saturating_add(self.total_of(Kind::Coffee))
    }

    pub fn is_ready_for_collection(&self) -> bool {
        self.waiting.is_empty() && self.preparing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_with(tea: u32, coffee: u32) -> Order {
        let mut order = Order::new();
        order.add_to_waiting(PerKind::new(tea, coffee));
        order
    }

    #[test]
    fn test_new_order_is_empty_and_ready() {
        let order = Order::new();
        assert_eq!(order.snapshot().total(), 0);
        // Nothing waiting or preparing: vacuously collectible.
        assert!(order.is_ready_for_collection());
    }

    #[test]
    fn test_add_to_waiting_accumulates() {
        let mut order = order_with(2, 1);
        order.add_to_waiting(PerKind::new(1, 0));

        let snap = order.snapshot();
        assert_eq!(snap.waiting, PerKind::new(3, 1));
        assert_eq!(snap.preparing, PerKind::default());
        assert_eq!(snap.ready, PerKind::default());
        assert!(!order.is_ready_for_collection());
    }

    #[test]
    fn test_full_lifecycle_of_one_kind() {
        let mut order = order_with(2, 0);

        order.move_to_preparing(Kind::Tea, 2).unwrap();
        assert_eq!(order.count(Stage::Waiting, Kind::Tea), 0);
        assert_eq!(order.count(Stage::Preparing, Kind::Tea), 2);
        assert!(!order.is_ready_for_collection());

        order.move_to_ready(Kind::Tea, 2).unwrap();
        assert_eq!(order.count(Stage::Ready, Kind::Tea), 2);
        assert!(order.is_ready_for_collection());

        order.remove_from_ready(Kind::Tea, 2).unwrap();
        assert_eq!(order.snapshot().total(), 0);
    }

    #[test]
    fn test_move_to_preparing_rejects_overdraw_without_mutation() {
        let mut order = order_with(1, 1);
        let before = order.snapshot();

        let err = order.move_to_preparing(Kind::Tea, 2).unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidTransition {
                kind: Kind::Tea,
                stage: Stage::Waiting,
                requested: 2,
                available: 1,
            }
        );
        assert_eq!(order.snapshot(), before);
    }

    #[test]
    fn test_move_to_ready_rejects_overdraw_without_mutation() {
        let mut order = order_with(3, 0);
        order.move_to_preparing(Kind::Tea, 1).unwrap();
        let before = order.snapshot();

        let err = order.move_to_ready(Kind::Tea, 2).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                stage: Stage::Preparing,
                requested: 2,
                available: 1,
                ..
            }
        ));
        assert_eq!(order.snapshot(), before);

        // Coffee has nothing preparing at all.
        assert!(order.move_to_ready(Kind::Coffee, 1).is_err());
        assert_eq!(order.snapshot(), before);
    }

    #[test]
    fn test_ready_ignores_tray_counts() {
        let mut order = order_with(1, 1);
        order.move_to_preparing(Kind::Tea, 1).unwrap();
        order.move_to_ready(Kind::Tea, 1).unwrap();
        // Tea is on the tray but coffee still waits.
        assert!(!order.is_ready_for_collection());

        order.move_to_preparing(Kind::Coffee, 1).unwrap();
        assert!(!order.is_ready_for_collection());
        order.move_to_ready(Kind::Coffee, 1).unwrap();
        assert!(order.is_ready_for_collection());
    }

    #[test]
    fn test_collect_ready_empties_tray_only() {
        let mut order = order_with(2, 1);
        order.move_to_preparing(Kind::Tea, 2).unwrap();
        order.move_to_ready(Kind::Tea, 2).unwrap();

        let collected = order.collect_ready();
        assert_eq!(collected, PerKind::new(2, 0));
        assert_eq!(order.snapshot().waiting, PerKind::new(0, 1));
        assert_eq!(order.snapshot().ready, PerKind::default());
    }

    #[test]
    fn test_snapshot_is_detached_from_order() {
        let mut order = order_with(2, 0);
        let snap = order.snapshot();
        order.move_to_preparing(Kind::Tea, 2).unwrap();

        assert_eq!(snap.waiting.tea, 2);
        assert_eq!(order.snapshot().waiting.tea, 0);
    }

    #[test]
    fn test_snapshot_totals() {
        let mut order = order_with(3, 2);
        order.move_to_preparing(Kind::Tea, 2).unwrap();
        order.move_to_ready(Kind::Tea, 1).unwrap();
        order.move_to_preparing(Kind::Coffee, 1).unwrap();

        let snap = order.snapshot();
        assert_eq!(snap.total_of(Kind::Tea), 3);
        assert_eq!(snap.total_of(Kind::Coffee), 2);
        assert_eq!(snap.total(), 5);
        assert_eq!(snap.stage(Stage::Preparing), PerKind::new(1, 1));
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(Stage::Waiting.label(), "Waiting area");
        assert_eq!(Stage::Preparing.label(), "Brewing area");
        assert_eq!(Stage::Ready.label(), "Tray area");
    }

    #[test]
    fn test_stage_display_follows_label() {
        for stage in Stage::ALL {
            assert_eq!(stage.to_string(), stage.label().to_ascii_lowercase());
        }
        assert_eq!(Stage::Preparing.to_string(), "brewing area");
    }

    /// Drive random operation sequences and check the per-kind conservation
    /// and readiness invariants after every step.
    #[test]
    fn test_random_sequences_preserve_invariants() {
        let mut rng = fastrand::Rng::with_seed(0x5eed_cafe);

        for _ in 0..200 {
            let mut order = Order::new();
            let mut added = PerKind::<u32>::default();
            let mut removed = PerKind::<u32>::default();

            for _ in 0..100 {
                let kind = if rng.bool() { Kind::Tea } else { Kind::Coffee };
                let qty = rng.u32(0..4);
                let before = order.snapshot();

                let result = match rng.u8(0..4) {
                    0 => {
                        let mut items = PerKind::default();
                        items[kind] = qty;
                        order.add_to_waiting(items);
                        added[kind] += qty;
                        Ok(())
                    }
                    1 => order.move_to_preparing(kind, qty),
                    2 => order.move_to_ready(kind, qty),
                    _ => {
                        let r = order.remove_from_ready(kind, qty);
                        if r.is_ok() {
                            removed[kind] += qty;
                        }
                        r
                    }
                };

                if result.is_err() {
                    assert_eq!(order.snapshot(), before, "rejected move mutated the order");
                }

                let snap = order.snapshot();
                for kind in Kind::ALL {
                    assert_eq!(snap.total_of(kind), added[kind] - removed[kind]);
                }
                assert_eq!(
                    order.is_ready_for_collection(),
                    snap.waiting.is_empty() && snap.preparing.is_empty()
                );
            }
        }
    }
}
