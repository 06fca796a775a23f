use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use super::command_runner::CommandRunner;
use super::facade::FacadeCore;
use super::query_runner::QueryRunner;
use super::registry::{RunnerEntry, RunnerId, RunnerKind, RunnerRegistry};
use super::script::{ScriptRunner, SqlScript};
use crate::inter::{InterSeance, InterSession};
use crate::layout::ResultLayout;
use crate::types::{DbError, Result};

/// Identifier of a session within its facade.
pub type SessionId = u64;

/// State shared by a session handle and the runners it created.
pub(crate) struct SessionCore {
    id: SessionId,
    driver: Mutex<Box<dyn InterSession>>,
    registry: RunnerRegistry,
    closed: AtomicBool,
    inside_tran: AtomicBool,
    portion_size: usize,
    facade: Weak<FacadeCore>,
}

impl SessionCore {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::SessionClosed);
        }
        Ok(())
    }

    pub(crate) fn portion_size(&self) -> usize {
        self.portion_size
    }

    pub(crate) fn open_seance(&self) -> Result<Box<dyn InterSeance>> {
        self.ensure_open()?;
        self.driver.lock().open_seance()
    }

    pub(crate) fn runner_closed(&self, id: RunnerId) {
        if self.registry.unregister(id) {
            trace!(session = self.id, runner = %id, "runner closed");
        }
    }
}

/// One connection-bound conversation with the database.
///
/// A session creates runners, owns the transaction state of its driver
/// session and keeps track of the runners that are still open. It is closed
/// explicitly with [`close`](Session::close) or implicitly when dropped.
///
/// Runners keep working only while their session is open: once it is closed,
/// their next operation fails with [`DbError::SessionClosed`].
pub struct Session {
    core: Arc<SessionCore>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        driver: Box<dyn InterSession>,
        portion_size: usize,
        facade: Weak<FacadeCore>,
    ) -> Self {
        Self {
            core: Arc::new(SessionCore {
                id,
                driver: Mutex::new(driver),
                registry: RunnerRegistry::new(),
                closed: AtomicBool::new(false),
                inside_tran: AtomicBool::new(false),
                portion_size,
                facade,
            }),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.core.id
    }

    /// Opens a query runner for `text` shaped by `layout`.
    pub fn query<L: ResultLayout>(
        &self,
        text: impl Into<String>,
        layout: L,
    ) -> Result<QueryRunner<L>> {
        let text = text.into();
        let seance = self.core.open_seance()?;
        let id = self.core.registry.register(RunnerKind::Query, &text);
        debug!(session = self.core.id, runner = %id, "query runner opened");
        Ok(QueryRunner::new(
            id,
            Arc::clone(&self.core),
            seance,
            text,
            layout,
        ))
    }

    /// Opens a command runner for `text`.
    pub fn command(&self, text: impl Into<String>) -> Result<CommandRunner> {
        let text = text.into();
        let seance = self.core.open_seance()?;
        let id = self.core.registry.register(RunnerKind::Command, &text);
        debug!(session = self.core.id, runner = %id, "command runner opened");
        Ok(CommandRunner::new(id, Arc::clone(&self.core), seance, text))
    }

    /// Opens a runner executing the statements of `script` in order.
    ///
    /// Seances are opened per statement when the script runs.
    pub fn script(&self, script: SqlScript) -> Result<ScriptRunner> {
        self.core.ensure_open()?;
        let first = script.statements().first().map_or("", String::as_str);
        let id = self.core.registry.register(RunnerKind::Script, first);
        debug!(
            session = self.core.id,
            runner = %id,
            statements = script.len(),
            "script runner opened"
        );
        Ok(ScriptRunner::new(id, Arc::clone(&self.core), script))
    }

    /// Begins a transaction on the driver session.
    pub fn begin_transaction(&self) -> Result<()> {
        self.core.ensure_open()?;
        self.core.driver.lock().begin()?;
        self.core.inside_tran.store(true, Ordering::Release);
        debug!(session = self.core.id, "transaction started");
        Ok(())
    }

    /// Commits the current transaction.
    pub fn commit(&self) -> Result<()> {
        self.core.ensure_open()?;
        self.core.driver.lock().commit()?;
        self.core.inside_tran.store(false, Ordering::Release);
        debug!(session = self.core.id, "transaction committed");
        Ok(())
    }

    /// Rolls back the current transaction.
    pub fn rollback(&self) -> Result<()> {
        self.core.ensure_open()?;
        self.core.driver.lock().rollback()?;
        self.core.inside_tran.store(false, Ordering::Release);
        debug!(session = self.core.id, "transaction rolled back");
        Ok(())
    }

    /// Returns true between a begin and the matching commit or rollback.
    pub fn is_in_transaction(&self) -> bool {
        self.core.inside_tran.load(Ordering::Acquire)
    }

    /// Runs `operation` inside a transaction and returns its value.
    ///
    /// Commits when the operation succeeds; a failed commit is rolled back and
    /// its error returned. When the operation fails the transaction is
    /// rolled back and the error returned; when it panics the transaction is
    /// rolled back and the panic resumed. A failing rollback replaces the
    /// operation's error.
    pub fn in_transaction<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&Session) -> Result<T>,
    {
        self.begin_transaction()?;
        match panic::catch_unwind(AssertUnwindSafe(|| operation(self))) {
            Ok(Ok(value)) => match self.commit() {
                Ok(()) => Ok(value),
                Err(err) => {
                    warn!(session = self.core.id, error = %err, "commit failed, rolling back");
                    self.rollback()?;
                    Err(err)
                }
            },
            Ok(Err(err)) => {
                warn!(session = self.core.id, error = %err, "transaction failed, rolling back");
                self.rollback()?;
                Err(err)
            }
            Err(payload) => {
                warn!(session = self.core.id, "transaction panicked, rolling back");
                if let Err(err) = self.rollback() {
                    error!(session = self.core.id, error = %err, "rollback after panic failed");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Runs `operation` inside a transaction for its side effects only.
    pub fn in_transaction_do<F>(&self, operation: F) -> Result<()>
    where
        F: FnOnce(&Session) -> Result<()>,
    {
        self.in_transaction(operation)
    }

    /// Round-trips to the database.
    pub fn ping(&self) -> Result<i32> {
        self.core.ensure_open()?;
        self.core.driver.lock().ping()
    }

    /// Number of runners created by this session and not yet closed.
    pub fn open_runner_count(&self) -> usize {
        self.core.registry.len()
    }

    /// Snapshot of the open runners.
    pub fn open_runners(&self) -> Vec<(RunnerId, RunnerEntry)> {
        self.core.registry.snapshot()
    }

    /// Returns true once the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.core.closed.load(Ordering::Acquire)
    }

    /// Closes the driver session and notifies the facade. Repeated calls do
    /// nothing.
    pub fn close(&self) -> Result<()> {
        if self.core.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let abandoned = self.core.registry.clear();
        if self.is_in_transaction() {
            warn!(session = self.core.id, "session closed inside a transaction");
        }
        let closed = self.core.driver.lock().close();
        if let Some(facade) = self.core.facade.upgrade() {
            facade.session_closed(self.core.id);
        }
        info!(session = self.core.id, abandoned, "session closed");
        closed
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(session = self.core.id, error = %err, "failed to close dropped session");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.core.id)
            .field("closed", &self.is_closed())
            .field("in_transaction", &self.is_in_transaction())
            .field("runners", &self.core.registry)
            .finish()
    }
}
