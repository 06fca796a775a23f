//! SQLite driver built on `rusqlite`.
//!
//! Result sets are materialised when the statement executes and then handed
//! out in portions by a [`BufferedCursor`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use tracing::debug;

use super::shape::BufferedCursor;
use super::{InterConnector, InterCursor, InterLayout, InterSeance, InterSession, InterTask};
use crate::db::config::SqliteSection;
use crate::types::{DbError, Result, Value};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Bool(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

/// Connector opening SQLite connections.
#[derive(Clone, Debug)]
pub struct SqliteConnector {
    path: Option<PathBuf>,
    busy_timeout: Duration,
}

impl SqliteConnector {
    /// Connector for a database file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            busy_timeout: Duration::from_millis(5_000),
        }
    }

    /// Connector for private in-memory databases, one per session.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            busy_timeout: Duration::from_millis(5_000),
        }
    }

    /// Connector described by a configuration section.
    pub fn from_config(section: &SqliteSection) -> Self {
        Self {
            path: section.path.clone(),
            busy_timeout: Duration::from_millis(section.busy_timeout_ms),
        }
    }
}

impl InterConnector for SqliteConnector {
    fn open_session(&self) -> Result<Box<dyn InterSession>> {
        let conn = match &self.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(self.busy_timeout)?;
        debug!(path = ?self.path, "sqlite session opened");
        Ok(Box::new(SqliteSession {
            conn: Arc::new(Mutex::new(conn)),
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

struct SqliteSession {
    conn: Arc<Mutex<Connection>>,
    closed: bool,
}

impl SqliteSession {
    fn batch(&self, sql: &str) -> Result<()> {
        if self.closed {
            return Err(DbError::Driver("sqlite session is closed".into()));
        }
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

impl InterSession for SqliteSession {
    fn open_seance(&mut self) -> Result<Box<dyn InterSeance>> {
        if self.closed {
            return Err(DbError::Driver("sqlite session is closed".into()));
        }
        Ok(Box::new(SqliteSeance {
            conn: Arc::clone(&self.conn),
            task: None,
            params: Vec::new(),
            rows: None,
            affected: 0,
        }))
    }

    fn begin(&mut self) -> Result<()> {
        self.batch("BEGIN")
    }

    fn commit(&mut self) -> Result<()> {
        self.batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.batch("ROLLBACK")
    }

    fn ping(&mut self) -> Result<i32> {
        if self.closed {
            return Err(DbError::Driver("sqlite session is closed".into()));
        }
        let answer = self
            .conn
            .lock()
            .query_row("SELECT 1", [], |row| row.get::<_, i32>(0))?;
        Ok(answer)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

struct SqliteSeance {
    conn: Arc<Mutex<Connection>>,
    task: Option<InterTask>,
    params: Vec<Value>,
    rows: Option<Vec<Vec<Value>>>,
    affected: u64,
}

impl InterSeance for SqliteSeance {
    fn prepare(&mut self, task: InterTask) -> Result<()> {
        self.conn.lock().prepare_cached(&task.text)?;
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
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&task.text)?;
        let expected = stmt.parameter_count();
        if expected != self.params.len() {
            return Err(DbError::Parameter(format!(
                "statement expects {expected} parameters, got {}",
                self.params.len()
            )));
        }
        let width = stmt.column_count();
        if width == 0 {
            let affected = stmt.execute(params_from_iter(self.params.iter()))?;
            self.affected = affected as u64;
            self.rows = None;
        } else {
            let mut collected = Vec::new();
            let mut rows = stmt.query(params_from_iter(self.params.iter()))?;
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for idx in 0..width {
                    values.push(value_from_ref(row.get_ref(idx)?));
                }
                collected.push(values);
            }
            self.affected = 0;
            self.rows = Some(collected);
        }
        debug!(text = %task.text, params = self.params.len(), "sqlite statement executed");
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
        Ok(self
            .rows
            .take()
            .map(|rows| Box::new(BufferedCursor::new(rows, layout.clone())) as Box<dyn InterCursor>))
    }

    fn close(&mut self) {
        self.rows = None;
        self.task = None;
    }
}
