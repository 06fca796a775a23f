use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::registry::RunnerId;
use super::session::SessionCore;
use crate::inter::{InterSeance, InterTask, TaskKind};
use crate::types::{DbError, Result, Value};

/// Runs a statement executed for its side effects.
pub struct CommandRunner {
    id: RunnerId,
    session: Arc<SessionCore>,
    seance: Box<dyn InterSeance>,
    text: String,
    prepared: bool,
    closed: bool,
}

impl CommandRunner {
    pub(crate) fn new(
        id: RunnerId,
        session: Arc<SessionCore>,
        seance: Box<dyn InterSeance>,
        text: String,
    ) -> Self {
        Self {
            id,
            session,
            seance,
            text,
            prepared: false,
            closed: false,
        }
    }

    /// Runner identifier within its session.
    pub fn id(&self) -> RunnerId {
        self.id
    }

    /// Statement text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns true once the runner has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.closed {
            return Err(DbError::RunnerClosed);
        }
        self.session.ensure_open()
    }

    /// Sends the statement text to the driver. Repeated calls do nothing.
    pub fn prepare(&mut self) -> Result<()> {
        self.ensure_usable()?;
        if self.prepared {
            return Ok(());
        }
        self.seance
            .prepare(InterTask::new(TaskKind::Command, self.text.clone()))?;
        self.prepared = true;
        trace!(runner = %self.id, text = %self.text, "command prepared");
        Ok(())
    }

    /// Binds parameter values for the next run.
    pub fn with_params<I>(&mut self, params: I) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.ensure_usable()?;
        self.seance
            .set_params(params.into_iter().map(Into::into).collect())?;
        Ok(self)
    }

    /// Executes the statement and returns the number of affected rows.
    pub fn run(&mut self) -> Result<u64> {
        self.prepare()?;
        self.seance.execute()?;
        let affected = self.seance.affected_rows();
        debug!(runner = %self.id, affected, "command executed");
        Ok(affected)
    }

    /// Closes the seance and leaves the session's registry.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.seance.close();
        self.closed = true;
        self.session.runner_closed(self.id);
    }
}

impl Drop for CommandRunner {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRunner")
            .field("id", &self.id)
            .field("text", &self.text)
            .field("prepared", &self.prepared)
            .field("closed", &self.closed)
            .finish()
    }
}
