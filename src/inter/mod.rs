#![forbid(unsafe_code)]

//! Driver boundary ("inter" layer).
//!
//! Everything below this module boundary talks to a concrete database; everything
//! above it only sees seances, cursors and raw [`Portion`]s shaped according to
//! an [`InterLayout`] descriptor.

/// In-memory scripted driver.
///
/// Serves canned rows per statement text; used for embedding and tests.
pub mod memory;

/// Shaping of driver rows into portions.
///
/// Shared by the bundled drivers so both cut portions the same way.
pub mod shape;

/// SQLite driver built on `rusqlite`.
pub mod sqlite;

use serde::{Deserialize, Serialize};

use crate::types::{PrimitiveKind, Result, Value, ValueKind};

/// Kind of statement prepared on a seance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// Statement producing a result set.
    Query,
    /// Statement executed for its side effects.
    Command,
}

/// Statement text plus its kind, handed to [`InterSeance::prepare`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterTask {
    /// Statement kind.
    pub kind: TaskKind,
    /// Statement text.
    pub text: String,
}

impl InterTask {
    /// Creates a task.
    pub fn new(kind: TaskKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Overall shape of a query result.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterResultKind {
    /// Only whether any row exists.
    Existence,
    /// At most one row.
    OneRow,
    /// One flat primitive array built from the first column.
    PrimitiveArray,
    /// Any number of rows.
    Table,
}

/// Shape of one row of a query result.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterRowKind {
    /// Nothing; used with [`InterResultKind::Existence`].
    None,
    /// A row is just one value.
    OneValue,
    /// A row is an array of values.
    Objects,
    /// A row is a key/value pair.
    MapEntry,
}

/// Layout descriptor: the only data crossing from layouts into the driver
/// before execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterLayout {
    /// Result shape.
    pub result_kind: InterResultKind,
    /// Row shape.
    pub row_kind: InterRowKind,
    /// Element kind for primitive array results.
    pub primitive_kind: Option<PrimitiveKind>,
    /// Common kind of every column, when there is one.
    pub base_component: Option<ValueKind>,
    /// Column names expected by a struct row.
    pub column_names: Option<Vec<String>>,
    /// Per-column kinds.
    pub component_kinds: Option<Vec<ValueKind>>,
}

/// One raw row in driver-native representation.
#[derive(Clone, Debug, PartialEq)]
pub enum RawRow {
    /// A single scalar.
    Value(Value),
    /// An array of column values.
    Columns(Vec<Value>),
    /// A key/value pair.
    Entry(Value, Value),
}

impl RawRow {
    /// Short shape name used in error messages.
    pub fn shape_name(&self) -> &'static str {
        match self {
            RawRow::Value(_) => "scalar",
            RawRow::Columns(_) => "columns",
            RawRow::Entry(..) => "map entry",
        }
    }
}

/// One batch delivered by a cursor fetch.
#[derive(Clone, Debug, PartialEq)]
pub enum Portion {
    /// A single row (existence and one-row results).
    Row(RawRow),
    /// A batch of rows (table results).
    Rows(Vec<RawRow>),
    /// A batch of 16-bit integers.
    Shorts(Vec<i16>),
    /// A batch of 32-bit integers.
    Ints(Vec<i32>),
    /// A batch of 64-bit integers.
    Longs(Vec<i64>),
}

impl Portion {
    /// Short shape name used in error messages.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Portion::Row(row) => row.shape_name(),
            Portion::Rows(_) => "rows",
            Portion::Shorts(_) => "short array",
            Portion::Ints(_) => "int array",
            Portion::Longs(_) => "long array",
        }
    }

    /// Number of rows or elements carried by this portion.
    pub fn len(&self) -> usize {
        match self {
            Portion::Row(_) => 1,
            Portion::Rows(rows) => rows.len(),
            Portion::Shorts(values) => values.len(),
            Portion::Ints(values) => values.len(),
            Portion::Longs(values) => values.len(),
        }
    }

    /// Returns true when the portion carries no rows or elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Value> for Portion {
    fn from(value: Value) -> Self {
        Portion::Row(RawRow::Value(value))
    }
}

impl From<bool> for Portion {
    fn from(value: bool) -> Self {
        Portion::from(Value::Bool(value))
    }
}

impl From<i64> for Portion {
    fn from(value: i64) -> Self {
        Portion::from(Value::Int(value))
    }
}

impl From<RawRow> for Portion {
    fn from(row: RawRow) -> Self {
        Portion::Row(row)
    }
}

impl From<Vec<RawRow>> for Portion {
    fn from(rows: Vec<RawRow>) -> Self {
        Portion::Rows(rows)
    }
}

impl From<Vec<i16>> for Portion {
    fn from(values: Vec<i16>) -> Self {
        Portion::Shorts(values)
    }
}

impl From<Vec<i32>> for Portion {
    fn from(values: Vec<i32>) -> Self {
        Portion::Ints(values)
    }
}

impl From<Vec<i64>> for Portion {
    fn from(values: Vec<i64>) -> Self {
        Portion::Longs(values)
    }
}

/// Factory of driver sessions.
pub trait InterConnector: Send + Sync {
    /// Opens a new driver session.
    fn open_session(&self) -> Result<Box<dyn InterSession>>;

    /// Human readable name of the backing database.
    fn name(&self) -> &str;
}

/// One driver session (one physical connection).
pub trait InterSession: Send {
    /// Opens an execution context for one statement.
    fn open_seance(&mut self) -> Result<Box<dyn InterSeance>>;
    /// Begins a transaction.
    fn begin(&mut self) -> Result<()>;
    /// Commits the current transaction.
    fn commit(&mut self) -> Result<()>;
    /// Rolls back the current transaction.
    fn rollback(&mut self) -> Result<()>;
    /// Round-trips to the server; returns the driver-specific answer.
    fn ping(&mut self) -> Result<i32>;
    /// Releases the session.
    fn close(&mut self) -> Result<()>;
}

/// Execution context for a single prepared statement.
pub trait InterSeance: Send {
    /// Prepares the statement.
    fn prepare(&mut self, task: InterTask) -> Result<()>;
    /// Binds parameter values for the next execution.
    fn set_params(&mut self, params: Vec<Value>) -> Result<()>;
    /// Executes the prepared statement.
    fn execute(&mut self) -> Result<()>;
    /// Rows affected by the last execution of a command.
    fn affected_rows(&self) -> u64;
    /// Opens a cursor over the last execution's result set, or `None` when the
    /// statement produced no result set.
    fn open_cursor(&mut self, flags: u8, layout: &InterLayout)
        -> Result<Option<Box<dyn InterCursor>>>;
    /// Releases the seance.
    fn close(&mut self);
}

/// Paginated handle over a result set.
pub trait InterCursor: Send {
    /// Sets the number of rows per portion for subsequent fetches.
    fn set_portion_size(&mut self, size: usize);
    /// Fetches the next portion; `None` signals exhaustion.
    fn retrieve_portion(&mut self) -> Result<Option<Portion>>;
    /// Releases the cursor.
    fn close(&mut self);
}
