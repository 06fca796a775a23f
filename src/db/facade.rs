use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::config::Config;
use super::session::{Session, SessionId};
use crate::inter::sqlite::SqliteConnector;
use crate::inter::InterConnector;
use crate::types::Result;

pub(crate) struct FacadeCore {
    connector: Box<dyn InterConnector>,
    config: Config,
    next_session: AtomicU64,
    sessions: Mutex<BTreeSet<SessionId>>,
}

impl FacadeCore {
    pub(crate) fn session_closed(&self, id: SessionId) {
        if self.sessions.lock().remove(&id) {
            debug!(session = id, driver = self.connector.name(), "session released");
        }
    }
}

/// Entry point owning a driver connector and handing out sessions.
///
/// Cloning a facade is cheap; clones share the connector and the set of
/// active sessions.
#[derive(Clone)]
pub struct Facade {
    core: Arc<FacadeCore>,
}

impl Facade {
    /// Creates a facade over `connector`.
    pub fn new(connector: impl InterConnector + 'static, config: Config) -> Self {
        info!(
            driver = connector.name(),
            portion_size = config.default_portion_size,
            "facade created"
        );
        Self {
            core: Arc::new(FacadeCore {
                connector: Box::new(connector),
                config,
                next_session: AtomicU64::new(0),
                sessions: Mutex::new(BTreeSet::new()),
            }),
        }
    }

    /// Creates a facade over SQLite as described by the `[sqlite]` section.
    pub fn sqlite(config: Config) -> Self {
        let connector = SqliteConnector::from_config(&config.sqlite);
        Self::new(connector, config)
    }

    /// Configuration shared by every session.
    pub fn config(&self) -> &Config {
        &self.core.config
    }

    /// Name of the backing driver.
    pub fn driver_name(&self) -> &str {
        self.core.connector.name()
    }

    /// Opens a driver session and wraps it.
    pub fn open_session(&self) -> Result<Session> {
        let driver = self.core.connector.open_session()?;
        let id = self.core.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        self.core.sessions.lock().insert(id);
        debug!(session = id, driver = self.core.connector.name(), "session opened");
        Ok(Session::new(
            id,
            driver,
            self.core.config.default_portion_size,
            Arc::downgrade(&self.core),
        ))
    }

    /// Opens a session, runs `operation` with it and closes it.
    ///
    /// The operation's error wins over a failure to close.
    pub fn in_session<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&Session) -> Result<T>,
    {
        let session = self.open_session()?;
        let outcome = operation(&session);
        let closed = session.close();
        let value = outcome?;
        closed?;
        Ok(value)
    }

    /// Number of sessions opened by this facade and not yet closed.
    pub fn active_sessions(&self) -> usize {
        self.core.sessions.lock().len()
    }
}

impl fmt::Debug for Facade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facade")
            .field("driver", &self.core.connector.name())
            .field("config", &self.core.config)
            .field("active_sessions", &self.active_sessions())
            .finish()
    }
}
