//! Scripted in-memory driver.
//!
//! Statements are matched by exact text against registered handlers. Each
//! handler receives the bound parameters and answers with rows or an affected
//! row count. Every boundary call is counted so callers can observe how the
//! runner drove the driver.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::shape::BufferedCursor;
use super::{
    InterConnector, InterCursor, InterLayout, InterSeance, InterSession, InterTask, Portion,
    TaskKind,
};
use crate::types::{DbError, Result, Value};

/// Answer produced by a scripted statement.
#[derive(Clone, Debug, PartialEq)]
pub enum MemoryResponse {
    /// A result set.
    Rows(Vec<Vec<Value>>),
    /// No result set; the number of affected rows.
    Affected(u64),
}

/// Handler invoked with the bound parameters on every execution.
pub type MemoryHandler = Arc<dyn Fn(&[Value]) -> Result<MemoryResponse> + Send + Sync>;

/// Counters of boundary calls.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Sessions opened.
    pub sessions_opened: u64,
    /// Sessions closed.
    pub sessions_closed: u64,
    /// Seances opened.
    pub seances_opened: u64,
    /// Seances closed.
    pub seances_closed: u64,
    /// Prepare calls.
    pub prepares: u64,
    /// Execute calls.
    pub executions: u64,
    /// Cursors opened.
    pub cursors_opened: u64,
    /// Cursors closed.
    pub cursors_closed: u64,
    /// Portions handed out.
    pub portions: u64,
    /// Transactions begun.
    pub begins: u64,
    /// Commits.
    pub commits: u64,
    /// Rollbacks.
    pub rollbacks: u64,
}

#[derive(Default)]
struct MemoryState {
    handlers: HashMap<String, MemoryHandler>,
    stats: MemoryStats,
    journal: Vec<(String, Vec<Value>)>,
    fail_commit: bool,
    fail_rollback: bool,
}

/// In-memory driver connector.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    state: Arc<Mutex<MemoryState>>,
}

impl fmt::Debug for MemoryDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryDriver")
            .field("statements", &state.handlers.len())
            .field("stats", &state.stats)
            .finish()
    }
}

impl MemoryDriver {
    /// Creates a driver with no scripted statements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `text`.
    pub fn with_handler<F>(self, text: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[Value]) -> Result<MemoryResponse> + Send + Sync + 'static,
    {
        self.state.lock().handlers.insert(text.into(), Arc::new(handler));
        self
    }

    /// Registers fixed rows for `text`, ignoring parameters.
    pub fn with_rows(self, text: impl Into<String>, rows: Vec<Vec<Value>>) -> Self {
        self.with_handler(text, move |_| Ok(MemoryResponse::Rows(rows.clone())))
    }

    /// Registers a command affecting `affected` rows.
    pub fn with_command(self, text: impl Into<String>, affected: u64) -> Self {
        self.with_handler(text, move |_| Ok(MemoryResponse::Affected(affected)))
    }

    /// Makes every subsequent commit fail.
    pub fn set_fail_commit(&self, fail: bool) {
        self.state.lock().fail_commit = fail;
    }

    /// Makes every subsequent rollback fail.
    pub fn set_fail_rollback(&self, fail: bool) {
        self.state.lock().fail_rollback = fail;
    }

    /// Snapshot of the boundary call counters.
    pub fn stats(&self) -> MemoryStats {
        self.state.lock().stats.clone()
    }

    /// Statement texts executed so far with the parameters bound at the time.
    pub fn journal(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().journal.clone()
    }
}

impl InterConnector for MemoryDriver {
    fn open_session(&self) -> Result<Box<dyn InterSession>> {
        self.state.lock().stats.sessions_opened += 1;
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
    closed: bool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DbError::Driver("memory session is closed".into()));
        }
        Ok(())
    }
}

impl InterSession for MemorySession {
    fn open_seance(&mut self) -> Result<Box<dyn InterSeance>> {
        self.ensure_open()?;
        self.state.lock().stats.seances_opened += 1;
        Ok(Box::new(MemorySeance {
            state: Arc::clone(&self.state),
            task: None,
            params: Vec::new(),
            response: None,
            affected: 0,
            closed: false,
        }))
    }

    fn begin(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state.lock().stats.begins += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        if state.fail_commit {
            return Err(DbError::Driver("commit failed".into()));
        }
        state.stats.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        state.stats.rollbacks += 1;
        if state.fail_rollback {
            return Err(DbError::Driver("rollback failed".into()));
        }
        Ok(())
    }

    fn ping(&mut self) -> Result<i32> {
        self.ensure_open()?;
        Ok(1)
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.state.lock().stats.sessions_closed += 1;
        }
        Ok(())
    }
}

struct MemorySeance {
    state: Arc<Mutex<MemoryState>>,
    task: Option<InterTask>,
    params: Vec<Value>,
    response: Option<MemoryResponse>,
    affected: u64,
    closed: bool,
}

impl InterSeance for MemorySeance {
    fn prepare(&mut self, task: InterTask) -> Result<()> {
        let mut state = self.state.lock();
        if !state.handlers.contains_key(&task.text) {
            return Err(DbError::Driver(format!("unknown statement: {}", task.text)));
        }
        state.stats.prepares += 1;
        self.task = Some(task);
        Ok(())
    }

    fn set_params(&mut self, params: Vec<Value>) -> Result<()> {
        self.params = params;
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let task = self
            .task
            .as_ref()
            .ok_or_else(|| DbError::Driver("seance executed before prepare".into()))?;
        let handler = {
            let mut state = self.state.lock();
            state.stats.executions += 1;
            state.journal.push((task.text.clone(), self.params.clone()));
            state.handlers.get(&task.text).cloned()
        };
        let handler = handler
            .ok_or_else(|| DbError::Driver(format!("unknown statement: {}", task.text)))?;
        let response = handler(&self.params)?;
        debug!(text = %task.text, kind = ?task.kind, "memory statement executed");
        self.affected = match &response {
            MemoryResponse::Affected(n) => *n,
            MemoryResponse::Rows(_) if task.kind == TaskKind::Command => 0,
            MemoryResponse::Rows(rows) => rows.len() as u64,
        };
        self.response = Some(response);
        Ok(())
    }

    fn affected_rows(&self) -> u64 {
        self.affected
    }

    fn open_cursor(
        &mut self,
        _flags: u8,
        layout: &InterLayout,
    ) -> Result<Option<Box<dyn InterCursor>>> {
        match self.response.take() {
            Some(MemoryResponse::Rows(rows)) => {
                self.state.lock().stats.cursors_opened += 1;
                Ok(Some(Box::new(MemoryCursor {
                    inner: BufferedCursor::new(rows, layout.clone()),
                    state: Arc::clone(&self.state),
                })))
            }
            _ => Ok(None),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.response = None;
            self.state.lock().stats.seances_closed += 1;
        }
    }
}

struct MemoryCursor {
    inner: BufferedCursor,
    state: Arc<Mutex<MemoryState>>,
}

impl InterCursor for MemoryCursor {
    fn set_portion_size(&mut self, size: usize) {
        self.inner.set_portion_size(size);
    }

    fn retrieve_portion(&mut self) -> Result<Option<Portion>> {
        let portion = self.inner.retrieve_portion()?;
        if portion.is_some() {
            self.state.lock().stats.portions += 1;
        }
        Ok(portion)
    }

    fn close(&mut self) {
        if !self.inner.is_closed() {
            self.inner.close();
            self.state.lock().stats.cursors_closed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inter::{InterResultKind, InterRowKind};

    fn table() -> InterLayout {
        InterLayout {
            result_kind: InterResultKind::Table,
            row_kind: InterRowKind::OneValue,
            primitive_kind: None,
            base_component: None,
            column_names: None,
            component_kinds: None,
        }
    }

    #[test]
    fn handler_sees_bound_parameters() {
        let driver = MemoryDriver::new().with_handler("select ?", |params| {
            Ok(MemoryResponse::Rows(vec![params.to_vec()]))
        });
        let mut session = driver.open_session().unwrap();
        let mut seance = session.open_seance().unwrap();
        seance
            .prepare(InterTask::new(TaskKind::Query, "select ?"))
            .unwrap();
        seance.set_params(vec![Value::Int(5)]).unwrap();
        seance.execute().unwrap();
        let mut cursor = seance.open_cursor(0, &table()).unwrap().unwrap();
        assert_eq!(
            cursor.retrieve_portion().unwrap(),
            Some(Portion::Rows(vec![crate::inter::RawRow::Value(Value::Int(5))]))
        );
        cursor.close();
        cursor.close();
        let stats = driver.stats();
        assert_eq!(stats.cursors_opened, 1);
        assert_eq!(stats.cursors_closed, 1);
        assert_eq!(driver.journal(), vec![("select ?".to_string(), vec![Value::Int(5)])]);
    }

    #[test]
    fn commands_open_no_cursor() {
        let driver = MemoryDriver::new().with_command("delete", 3);
        let mut session = driver.open_session().unwrap();
        let mut seance = session.open_seance().unwrap();
        seance
            .prepare(InterTask::new(TaskKind::Command, "delete"))
            .unwrap();
        seance.execute().unwrap();
        assert_eq!(seance.affected_rows(), 3);
        assert!(seance.open_cursor(0, &table()).unwrap().is_none());
    }

    #[test]
    fn unknown_statements_fail_to_prepare() {
        let driver = MemoryDriver::new();
        let mut session = driver.open_session().unwrap();
        let mut seance = session.open_seance().unwrap();
        let err = seance
            .prepare(InterTask::new(TaskKind::Query, "select nothing"))
            .unwrap_err();
        assert!(matches!(err, DbError::Driver(_)));
    }
}
