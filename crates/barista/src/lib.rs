//! # Barista
//!
//! A multi-client order-fulfillment service: clients connect over a
//! line-oriented text stream, order tea and coffee, and each order moves
//! through three stages with kind-specific preparation times, bounded
//! batching, and asynchronous completion notices.
//!
//! ## Architecture
//!
//! ```text
//! TCP accept loop (server)
//!     │
//!     ▼ one task per client
//! Session ──► handshake ──► SessionRegistry.register()
//!     │
//!     ▼ each line
//! Dispatcher ──► Command::parse()
//!     │
//!     ├─► order ────► Ticket.add_to_waiting() ──► PreparationScheduler.kick()
//!     │                                                 │
//!     │                         pipeline task per kind ◄┘
//!     │                         waiting → preparing → sleep → ready → notify
//!     │
//!     ├─► order status / collect / exit
//!     │
//!     ▼ EOF or read error
//! Reassigner ──► unregister, retire, donate waiting stock to another client
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Stock is conserved** - per kind, waiting + preparing + ready equals
//!    everything added minus everything collected
//! 2. **Rejected moves change nothing** - an oversized transition returns
//!    [`OrderError::InvalidTransition`] and leaves every counter intact
//! 3. **One lock per Order** - commands, batches and reassignment all mutate
//!    an Order under its [`Ticket`] lock
//! 4. **One pipeline per (Order, kind)** - new stock joins the running
//!    pipeline instead of starting a second one
//! 5. **Completion is edge-triggered** - "order ready" is sent once per
//!    transition into the ready state
//!
//! ## Guarantees
//!
//! - **No cancellation**: a batch that entered preparation always completes
//! - **Explicit exit never donates**: only abrupt disconnects reassign stock
//! - **Best-effort journal**: the event log never blocks or fails the core
//!
//! ## Example
//!
//! ```ignore
//! use barista_core::{CafeBuilder, CafeConfig, FileSink, Journal};
//!
//! let (journal, worker) = Journal::spawn(FileSink::new("barista_log.json"));
//! let cafe = CafeBuilder::new()
//!     .with_config(CafeConfig::default())
//!     .with_journal(journal)
//!     .build()?;
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:50000").await?;
//! barista_core::serve(listener, cafe, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await?;
//! ```

// Core modules
mod cafe;
mod config;
mod connection;
mod dispatch;
mod error;
mod journal;
mod kind;
mod notice;
mod order;
mod reassign;
mod registry;
mod scheduler;
mod server;
mod session;
mod ticket;


// Re-export domain types
pub use kind::{Kind, PerKind};
pub use order::{Order, OrderSnapshot, Stage};
pub use ticket::{Ticket, TicketState};

// Re-export error types
pub use error::{CommandError, ConfigError, OrderError, RegistryError, SessionError};

// Re-export configuration
pub use config::{
    CafeConfig, DEFAULT_BATCH_SIZE, DEFAULT_COFFEE_PREPARATION, DEFAULT_TEA_PREPARATION,
};

// Re-export service components
pub use cafe::{Cafe, CafeBuilder};
pub use connection::{Connection, Outbound};
pub use dispatch::{Command, Dispatcher, Flow};
pub use notice::Notice;
pub use reassign::{ReassignmentOutcome, Reassigner};
pub use registry::{Session, SessionRegistry};
pub use scheduler::{PreparationScheduler, Recipient};
pub use session::{SessionEnd, MAX_LINE_BYTES};

// Re-export journal types
pub use journal::{FileSink, Journal, JournalEntry, JournalSink, MemorySink, TIMESTAMP_FORMAT};

// Re-export the accept loop
pub use server::serve;

// Re-export commonly used external types
pub use async_trait::async_trait;
