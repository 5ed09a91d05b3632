//! Command dispatcher for client input lines.
//!
//! The `Dispatcher` is responsible for:
//! 1. Parsing a raw line into a [`Command`]
//! 2. Applying it to the issuing client's Order through the registry
//! 3. Kicking the scheduler when stock enters the waiting area
//! 4. Replying with exactly the notices the command produces
//!
//! Client-facing failures never leave this module: a bad line becomes an
//! error notice and the session continues.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::CommandError;
use crate::journal::Journal;
use crate::kind::{Kind, PerKind};
use crate::notice::Notice;
use crate::registry::SessionRegistry;
use crate::scheduler::{PreparationScheduler, Recipient};

/// A parsed client command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `order <qty> <kind> [and <qty> <kind> ...]`
    Order(PerKind<u32>),
    /// `order status`
    Status,
    Collect,
    Exit,
}

impl Command {
    /// Parse one input line.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let normalized = line.trim().to_lowercase();
        let words: Vec<&str> = normalized.split_whitespace().collect();

        match words.as_slice() {
            ["order", "status"] => Ok(Command::Status),
            ["order", items @ ..] => parse_items(items).map(Command::Order),
            ["collect"] => Ok(Command::Collect),
            ["exit"] => Ok(Command::Exit),
            _ => Err(CommandError::Unknown { input: normalized }),
        }
    }
}

/// Accumulate per-kind quantities from `<qty> <kind> and <qty> <kind> ...`.
///
/// Within each clause the first word naming a kind counts; its quantity is
/// the word before it, or 1 if that is missing or not a number.
fn parse_items(words: &[&str]) -> Result<PerKind<u32>, CommandError> {
    let mut items = PerKind::<u32>::default();

    for clause in words.split(|word| *word == "and") {
        for kind in Kind::ALL {
            let Some(pos) = clause.iter().position(|word| Kind::from_word(word) == Some(kind)) else {
                continue;
            };
            let qty = pos
                .checked_sub(1)
                .and_then(|prev| clause[prev].parse::<u32>().ok())
                .unwrap_or(1);
            items[kind] = items[kind].saturating_add(qty);
        }
    }

    if items.is_empty() {
        return Err(CommandError::NoItems);
    }
    Ok(items)
}

/// Whether the session should keep reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The client asked to leave; close the session without reassignment.
    Exit,
}

/// Routes commands to the registry, scheduler and journal.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    scheduler: PreparationScheduler,
    journal: Journal,
}

impl Dispatcher {
    pub fn new(registry: Arc<SessionRegistry>, scheduler: PreparationScheduler, journal: Journal) -> Self {
        Self {
            registry,
            scheduler,
            journal,
        }
    }

    /// Handle one line from `identity`. Replies go to `connection`.
    pub fn dispatch(&self, identity: &str, connection: &Connection, line: &str) -> Flow {
        match Command::parse(line) {
            Ok(command) => self.execute(identity, connection, command),
            Err(e) => {
                debug!(%identity, error = ?e, "rejected command");
                connection.send(Notice::Error(e.to_string()));
                Flow::Continue
            }
        }
    }

    /// Apply an already parsed command.
    pub fn execute(&self, identity: &str, connection: &Connection, command: Command) -> Flow {
        match command {
            Command::Order(items) => self.place_order(identity, connection, items),
            Command::Status => {
                self.report_status(identity, connection);
                Flow::Continue
            }
            Command::Collect => {
                self.collect(identity, connection);
                Flow::Continue
            }
            Command::Exit => self.exit(identity, connection),
        }
    }

    fn place_order(&self, identity: &str, connection: &Connection, items: PerKind<u32>) -> Flow {
        let ticket = match self.registry.lookup_order(identity) {
            Ok(ticket) => ticket,
            Err(e) => {
                // The entry is gone, so this session is already over.
                warn!(%identity, error = %e, "order from unregistered session");
                return Flow::Exit;
            }
        };

        ticket.lock().add_to_waiting(items);
        info!(%identity, %items, "order received");

        connection.send(Notice::OrderReceived {
            name: identity.to_string(),
            items,
        });
        self.journal.record(format!(
            "New order from {identity}: {} tea(s) and {} coffee(s).",
            items.tea, items.coffee
        ));

        self.scheduler
            .kick(&ticket, &Recipient::new(identity, connection.clone()));
        Flow::Continue
    }

    fn report_status(&self, identity: &str, connection: &Connection) {
        let notice = match self
            .registry
            .current_order(identity)
            .filter(|ticket| !ticket.is_retired())
        {
            Some(ticket) => Notice::Status {
                name: identity.to_string(),
                snapshot: ticket.snapshot(),
            },
            None => Notice::NoOrder {
                name: identity.to_string(),
            },
        };
        connection.send(notice);
    }

    fn collect(&self, identity: &str, connection: &Connection) {
        let collected = self
            .registry
            .with_session(identity, |session| {
                let ticket = session.ticket()?.clone();
                let mut state = ticket.lock();
                if state.is_retired() || !state.order().is_ready_for_collection() {
                    return None;
                }

                let items = state.order_mut().collect_ready();
                state.retire();
                drop(state);
                session.take_ticket();
                Some(items)
            })
            .flatten();

        match collected {
            Some(items) => {
                info!(%identity, %items, "order collected");
                connection.send(Notice::Collected);
                self.journal.record(format!(
                    "Order collected by {identity}. All items removed from tray."
                ));
            }
            None => {
                connection.send(Notice::NotReady);
            }
        }
    }

    fn exit(&self, identity: &str, connection: &Connection) -> Flow {
        if let Some(ticket) = self.registry.unregister(identity) {
            ticket.lock().retire();
        }
        info!(%identity, "client left");

        connection.send(Notice::Goodbye {
            name: identity.to_string(),
        });
        Flow::Exit
    }
}
