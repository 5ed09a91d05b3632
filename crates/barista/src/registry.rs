//! Session registry: who is connected and which Order they own.
//!
//! The registry is the single source of truth for membership. Each entry maps
//! a client identity to its [`Connection`] and, once the client has ordered,
//! its [`Ticket`].
//!
//! # Atomicity
//!
//! Entries live in a `DashMap`; every operation on one identity runs under
//! that entry's lock:
//!
//! - `register` is insert-if-absent
//! - `lookup_order` is get-or-create, so two concurrent calls for the same
//!   identity always see the same Ticket
//! - `unregister` removes and returns the Ticket in one step
//!
//! Lock order is always entry lock, then ticket lock. Scheduler tasks only
//! take ticket locks, so they cannot deadlock against the registry.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::connection::Connection;
use crate::error::RegistryError;
use crate::scheduler::Recipient;
use crate::ticket::Ticket;

/// One connected client.
#[derive(Debug, Clone)]
pub struct Session {
    connection: Connection,
    ticket: Option<Ticket>,
}

impl Session {
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn ticket(&self) -> Option<&Ticket> {
        self.ticket.as_ref()
    }

    /// The live ticket, creating one if absent or retired.
    pub fn ticket_or_create(&mut self) -> &Ticket {
        if self.ticket.as_ref().is_some_and(Ticket::is_retired) {
            self.ticket = None;
        }
        self.ticket.get_or_insert_with(Ticket::new)
    }

    /// Detach the ticket from this session.
    pub fn take_ticket(&mut self) -> Option<Ticket> {
        self.ticket.take()
    }
}

/// Concurrent map from identity to [`Session`].
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. Duplicate identities are rejected, never merged.
    pub fn register(&self, identity: &str, connection: Connection) -> Result<(), RegistryError> {
        match self.sessions.entry(identity.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateIdentity {
                identity: identity.to_string(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(Session {
                    connection,
                    ticket: None,
                });
                debug!(%identity, "session registered");
                Ok(())
            }
        }
    }

    /// The identity's Order, created if it has none yet.
    pub fn lookup_order(&self, identity: &str) -> Result<Ticket, RegistryError> {
        self.with_session(identity, |session| session.ticket_or_create().clone())
            .ok_or_else(|| RegistryError::NotConnected {
                identity: identity.to_string(),
            })
    }

    /// The identity's Order, if it has one.
    pub fn current_order(&self, identity: &str) -> Option<Ticket> {
        self.sessions
            .get(identity)
            .and_then(|session| session.ticket.clone())
    }

    /// Detach and return the identity's Order, keeping the session.
    pub fn clear_order(&self, identity: &str) -> Option<Ticket> {
        self.with_session(identity, Session::take_ticket).flatten()
    }

    /// Remove the session, returning whatever Order it held.
    pub fn unregister(&self, identity: &str) -> Option<Ticket> {
        let (_, session) = self.sessions.remove(identity)?;
        debug!(%identity, had_order = session.ticket.is_some(), "session unregistered");
        session.ticket
    }

    pub fn connection(&self, identity: &str) -> Option<Connection> {
        self.sessions
            .get(identity)
            .map(|session| session.connection.clone())
    }

    /// Identity plus connection, for scheduling against this session.
    pub fn recipient(&self, identity: &str) -> Option<Recipient> {
        self.connection(identity)
            .map(|connection| Recipient::new(identity, connection))
    }

    /// Run `f` with exclusive access to the identity's session.
    ///
    /// `f` must not call back into the registry.
    pub fn with_session<R>(&self, identity: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions
            .get_mut(identity)
            .map(|mut session| f(session.value_mut()))
    }

    /// Point-in-time list of connected identities, in arbitrary order.
    pub fn connected_identities(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.sessions.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
