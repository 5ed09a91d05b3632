//! Preparation scheduler: delayed, batched stage advancement.
//!
//! Once stock enters the waiting area the scheduler moves it through
//! preparation in bounded batches:
//!
//! ```text
//! kick(ticket) ──► claim pipeline (kind) ──► spawn task
//!                                              │
//!        ┌─────────────────────────────────────┘
//!        ▼
//!   lock: waiting → preparing (≤ batch_size)      no stock / retired ──► release, stop
//!        │
//!        ▼
//!   sleep(preparation[kind])                      timer, no worker thread held
//!        │
//!        ▼
//!   lock: preparing → ready, notify batch, completion edge check
//!        │
//!        └──► loop
//! ```
//!
//! # Guarantees
//!
//! - **One pipeline per (order, kind)**: stock ordered while a batch is
//!   preparing is picked up by the next iteration, never by a second pipeline
//! - **Kinds are independent**: tea and coffee pipelines run concurrently and
//!   only meet on the ticket lock
//! - **No cancellation**: a batch that entered preparation always reaches the
//!   tray, even if its order was retired meanwhile
//! - **Fire-and-forget notices**: a closed connection simply drops them

use std::sync::Arc;

use tracing::{debug, error, info_span, Instrument};

use crate::config::CafeConfig;
use crate::connection::Connection;
use crate::error::{ConfigError, OrderError};
use crate::kind::Kind;
use crate::notice::Notice;
use crate::order::Stage;
use crate::ticket::{Ticket, TicketState};

/// Who hears about a ticket's progress.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub identity: String,
    pub connection: Connection,
}

impl Recipient {
    pub fn new(identity: impl Into<String>, connection: Connection) -> Self {
        Self {
            identity: identity.into(),
            connection,
        }
    }
}

/// Issues preparation pipelines against tickets.
#[derive(Debug, Clone)]
pub struct PreparationScheduler {
    config: Arc<CafeConfig>,
}

impl PreparationScheduler {
    /// Rejects configurations that would stall or spin a pipeline.
    pub fn new(config: CafeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &CafeConfig {
        &self.config
    }

    /// Start a pipeline for each kind that has waiting stock and none running.
    ///
    /// Never blocks; the first batch is taken by the spawned task. Returns how
    /// many pipelines were started. Must be called inside a tokio runtime.
    pub fn kick(&self, ticket: &Ticket, recipient: &Recipient) -> usize {
        let claimed: Vec<Kind> = {
            let mut state = ticket.lock();
            Kind::ALL
                .into_iter()
                .filter(|kind| state.claim_pipeline(*kind))
                .collect()
        };

        for &kind in &claimed {
            let span = info_span!("pipeline", identity = %recipient.identity, %kind);
            tokio::spawn(
                self.clone()
                    .run_pipeline(ticket.clone(), recipient.clone(), kind)
                    .instrument(span),
            );
        }

        claimed.len()
    }

    async fn run_pipeline(self, ticket: Ticket, recipient: Recipient, kind: Kind) {
        let duration = self.config.preparation_for(kind);

        while let Some(qty) = self.start_batch(&ticket, kind) {
            debug!(qty, ?duration, "batch preparing");
            tokio::time::sleep(duration).await;

            if !finish_batch(&ticket, &recipient, kind, qty) {
                return;
            }
        }

        debug!("pipeline idle");
    }

    /// Move the next batch into preparation, or release the pipeline.
    fn start_batch(&self, ticket: &Ticket, kind: Kind) -> Option<u32> {
        let mut state = ticket.lock();
        let waiting = state.order().count(Stage::Waiting, kind);

        if state.is_retired() || waiting == 0 {
            state.release_pipeline(kind);
            return None;
        }

        let qty = waiting.min(self.config.batch_size);
        match state.order_mut().move_to_preparing(kind, qty) {
            Ok(()) => Some(qty),
            Err(e) => {
                tear_down(&mut state, kind, &e);
                None
            }
        }
    }
}

/// Move a finished batch to the tray and notify. Returns false if the
/// pipeline must stop.
fn finish_batch(ticket: &Ticket, recipient: &Recipient, kind: Kind, qty: u32) -> bool {
    let mut state = ticket.lock();

    if let Err(e) = state.order_mut().move_to_ready(kind, qty) {
        tear_down(&mut state, kind, &e);
        return false;
    }

    recipient.connection.send(Notice::BatchReady {
        name: recipient.identity.clone(),
        kind,
        qty,
    });
    if state.take_ready_edge() {
        debug!("order ready for collection");
        recipient.connection.send(Notice::OrderReady);
    }
    true
}

// An invalid transition here means the ticket was mutated outside its lock
// discipline. Retire the order so nothing else touches it.
fn tear_down(state: &mut TicketState, kind: Kind, err: &OrderError) {
    error!(error = %err, %kind, "order invariant violated, retiring order");
    state.retire();
    state.release_pipeline(kind);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Outbound;
    use crate::kind::PerKind;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::sleep;

    fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(Outbound::Notice(notice)) = rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    fn setup(tea: u32, coffee: u32) -> (PreparationScheduler, Ticket, Recipient, UnboundedReceiver<Outbound>) {
        let scheduler = PreparationScheduler::new(CafeConfig::default()).unwrap();
        let ticket = Ticket::new();
        ticket.lock().add_to_waiting(PerKind::new(tea, coffee));
        let (connection, rx) = Connection::channel();
        (scheduler, ticket, Recipient::new("ada", connection), rx)
    }

    fn batch(kind: Kind, qty: u32) -> Notice {
        Notice::BatchReady {
            name: "ada".into(),
            kind,
            qty,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_units_move_in_batches_of_two_two_one() {
        let (scheduler, ticket, recipient, mut rx) = setup(5, 0);
        assert_eq!(scheduler.kick(&ticket, &recipient), 1);

        sleep(Duration::from_secs(10)).await;
        let snap = ticket.snapshot();
        assert_eq!((snap.waiting.tea, snap.preparing.tea, snap.ready.tea), (3, 2, 0));

        sleep(Duration::from_secs(30)).await; // t = 40
        let snap = ticket.snapshot();
        assert_eq!((snap.waiting.tea, snap.preparing.tea, snap.ready.tea), (1, 2, 2));

        sleep(Duration::from_secs(30)).await; // t = 70
        let snap = ticket.snapshot();
        assert_eq!((snap.waiting.tea, snap.preparing.tea, snap.ready.tea), (0, 1, 4));

        sleep(Duration::from_secs(30)).await; // t = 100
        let snap = ticket.snapshot();
        assert_eq!((snap.waiting.tea, snap.preparing.tea, snap.ready.tea), (0, 0, 5));

        assert_eq!(
            drain(&mut rx),
            vec![
                batch(Kind::Tea, 2),
                batch(Kind::Tea, 2),
                batch(Kind::Tea, 1),
                Notice::OrderReady,
            ]
        );
        assert!(!ticket.lock().has_pipeline(Kind::Tea));
    }

    #[tokio::test(start_paused = true)]
    async fn test_kinds_run_on_independent_timers() {
        let (scheduler, ticket, recipient, mut rx) = setup(2, 1);
        assert_eq!(scheduler.kick(&ticket, &recipient), 2);

        sleep(Duration::from_secs(31)).await;
        let snap = ticket.snapshot();
        assert_eq!(snap.ready, PerKind::new(2, 0));
        assert_eq!(snap.preparing, PerKind::new(0, 1));
        assert_eq!(drain(&mut rx), vec![batch(Kind::Tea, 2)]);

        sleep(Duration::from_secs(15)).await; // t = 46
        assert!(ticket.snapshot().is_ready_for_collection());
        assert_eq!(
            drain(&mut rx),
            vec![batch(Kind::Coffee, 1), Notice::OrderReady]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_kick_does_not_start_duplicate_pipeline() {
        let (scheduler, ticket, recipient, mut rx) = setup(1, 0);
        assert_eq!(scheduler.kick(&ticket, &recipient), 1);

        sleep(Duration::from_secs(5)).await;
        ticket.lock().add_to_waiting(PerKind::new(3, 0));
        assert_eq!(scheduler.kick(&ticket, &recipient), 0);

        // 1 ready at t=30, 2 ready at t=60, 1 ready at t=90
        sleep(Duration::from_secs(90)).await;
        assert_eq!(ticket.snapshot().ready.tea, 4);
        assert_eq!(
            drain(&mut rx),
            vec![
                batch(Kind::Tea, 1),
                batch(Kind::Tea, 2),
                batch(Kind::Tea, 1),
                Notice::OrderReady,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_ready_not_repeated_without_new_stock() {
        let (scheduler, ticket, recipient, mut rx) = setup(1, 0);
        scheduler.kick(&ticket, &recipient);
        sleep(Duration::from_secs(31)).await;
        assert_eq!(drain(&mut rx), vec![batch(Kind::Tea, 1), Notice::OrderReady]);

        // Nothing waiting: kicking again is a no-op and says nothing.
        assert_eq!(scheduler.kick(&ticket, &recipient), 0);
        sleep(Duration::from_secs(60)).await;
        assert!(drain(&mut rx).is_empty());

        ticket.lock().add_to_waiting(PerKind::new(0, 1));
        scheduler.kick(&ticket, &recipient);
        sleep(Duration::from_secs(46)).await;
        assert_eq!(drain(&mut rx), vec![batch(Kind::Coffee, 1), Notice::OrderReady]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retired_ticket_finishes_in_flight_batch_only() {
        let (scheduler, ticket, recipient, mut rx) = setup(4, 0);
        scheduler.kick(&ticket, &recipient);

        sleep(Duration::from_secs(10)).await;
        ticket.lock().retire();

        sleep(Duration::from_secs(100)).await;
        let snap = ticket.snapshot();
        assert_eq!(snap.ready.tea, 2, "in-flight batch still completes");
        assert_eq!(snap.waiting.tea, 2, "no new batch after retirement");
        assert_eq!(snap.preparing.tea, 0);
        assert_eq!(drain(&mut rx), vec![batch(Kind::Tea, 2)]);
        assert!(!ticket.lock().has_pipeline(Kind::Tea));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_connection_does_not_stop_preparation() {
        let (scheduler, ticket, recipient, rx) = setup(3, 0);
        drop(rx);
        scheduler.kick(&ticket, &recipient);

        sleep(Duration::from_secs(61)).await;
        assert_eq!(ticket.snapshot().ready.tea, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_size_is_configurable() {
        let scheduler = PreparationScheduler::new(CafeConfig::default().with_batch_size(3)).unwrap();
        let ticket = Ticket::new();
        ticket.lock().add_to_waiting(PerKind::new(0, 4));
        let (connection, mut rx) = Connection::channel();
        scheduler.kick(&ticket, &Recipient::new("ada", connection));

        sleep(Duration::from_secs(91)).await;
        let notices = drain(&mut rx);
        assert_eq!(notices[0], batch(Kind::Coffee, 3));
        assert_eq!(notices[1], batch(Kind::Coffee, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stock_removed_behind_pipeline_tears_down_order() {
        let (scheduler, ticket, recipient, mut rx) = setup(2, 0);
        scheduler.kick(&ticket, &recipient);
        sleep(Duration::from_secs(1)).await;

        // Bypass the ticket discipline: empty the brewing area under the pipeline.
        {
            let mut state = ticket.lock();
            state.order_mut().move_to_ready(Kind::Tea, 2).unwrap();
        }

        sleep(Duration::from_secs(60)).await;
        assert!(ticket.is_retired());
        assert!(!ticket.lock().has_pipeline(Kind::Tea));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        assert_eq!(
            PreparationScheduler::new(CafeConfig::default().with_batch_size(0)).unwrap_err(),
            ConfigError::ZeroBatchSize
        );
        assert!(matches!(
            PreparationScheduler::new(CafeConfig::default().with_preparation(Kind::Tea, Duration::ZERO)),
            Err(ConfigError::ZeroPreparation { kind: Kind::Tea, .. })
        ));
    }
}
