//! The assembled café: registry, scheduler, dispatcher and reassignment
//! policy sharing one configuration and one journal.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::CafeConfig;
use crate::dispatch::Dispatcher;
use crate::error::{ConfigError, SessionError};
use crate::journal::Journal;
use crate::reassign::Reassigner;
use crate::registry::SessionRegistry;
use crate::scheduler::PreparationScheduler;
use crate::session::{self, SessionEnd};

/// Builder for [`Cafe`].
///
/// # Example
///
/// ```ignore
/// let (journal, worker) = Journal::spawn(FileSink::new("barista_log.json"));
/// let cafe = CafeBuilder::new()
///     .with_config(CafeConfig::default().with_batch_size(3))
///     .with_journal(journal)
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct CafeBuilder {
    config: CafeConfig,
    journal: Option<Journal>,
}

impl CafeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: CafeConfig) -> Self {
        self.config = config;
        self
    }

    /// Journal to record events into. Without one, events only reach `tracing`.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn build(self) -> Result<Cafe, ConfigError> {
        let scheduler = PreparationScheduler::new(self.config)?;
        let journal = self.journal.unwrap_or_else(Journal::disabled);
        let registry = Arc::new(SessionRegistry::new());

        Ok(Cafe {
            dispatcher: Dispatcher::new(Arc::clone(&registry), scheduler.clone(), journal.clone()),
            reassigner: Reassigner::new(Arc::clone(&registry), scheduler.clone(), journal.clone()),
            registry,
            scheduler,
            journal,
        })
    }
}

/// Shared service state. Cheap to clone; clones see the same sessions.
#[derive(Debug, Clone)]
pub struct Cafe {
    registry: Arc<SessionRegistry>,
    scheduler: PreparationScheduler,
    dispatcher: Dispatcher,
    reassigner: Reassigner,
    journal: Journal,
}

impl Cafe {
    pub fn builder() -> CafeBuilder {
        CafeBuilder::new()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CafeConfig {
        self.scheduler.config()
    }

    pub fn scheduler(&self) -> &PreparationScheduler {
        &self.scheduler
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn reassigner(&self) -> &Reassigner {
        &self.reassigner
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Serve one client over `stream` until it exits or disconnects.
    pub async fn serve_connection<S>(&self, stream: S) -> Result<SessionEnd, SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        session::run(self, stream).await
    }
}
