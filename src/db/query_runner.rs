use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::registry::RunnerId;
use super::session::SessionCore;
use crate::inter::{InterCursor, InterLayout, InterSeance, InterTask, TaskKind};
use crate::layout::{ResultBuilder, ResultLayout};
use crate::types::{DbError, Result, Value};

/// Runs one query text against one seance and shapes its results with a
/// [`ResultLayout`].
///
/// # Lifecycle
///
/// 1. Optionally bind parameters with [`with_params`](Self::with_params) and
///    choose a portion size with [`pack_by`](Self::pack_by).
/// 2. [`run`](Self::run) executes and drains everything into one result, or
///    [`next_pack`](Self::next_pack) streams one partial result per portion.
/// 3. Rebinding parameters or executing again closes the previous cursor; a
///    runner never holds more than one open cursor.
///
/// Dropping the runner closes its cursor and seance and removes it from the
/// session.
///
/// # Example
///
/// ```rust
/// use rowshape::db::{Config, Facade};
/// use rowshape::inter::memory::MemoryDriver;
/// use rowshape::layout::{layout_list_of, row_value_of};
/// use rowshape::types::Value;
///
/// let driver = MemoryDriver::new()
///     .with_rows("select id from t", vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
/// let facade = Facade::new(driver, Config::default());
/// let session = facade.open_session()?;
/// let mut runner = session.query("select id from t", layout_list_of(row_value_of::<i64>()))?;
/// assert_eq!(runner.run()?, Some(vec![1, 2]));
/// # Ok::<(), rowshape::types::DbError>(())
/// ```
pub struct QueryRunner<L: ResultLayout> {
    id: RunnerId,
    session: Arc<SessionCore>,
    seance: Box<dyn InterSeance>,
    text: String,
    layout: L,
    inter_layout: InterLayout,
    portion_size: usize,
    cursor: Option<Box<dyn InterCursor>>,
    prepared: bool,
    executed: bool,
    closed: bool,
}

impl<L: ResultLayout> QueryRunner<L> {
    pub(crate) fn new(
        id: RunnerId,
        session: Arc<SessionCore>,
        seance: Box<dyn InterSeance>,
        text: String,
        layout: L,
    ) -> Self {
        let inter_layout = layout.make_inter_layout();
        let portion_size = session.portion_size();
        Self {
            id,
            session,
            seance,
            text,
            layout,
            inter_layout,
            portion_size,
            cursor: None,
            prepared: false,
            executed: false,
            closed: false,
        }
    }

    /// Runner identifier within its session.
    pub fn id(&self) -> RunnerId {
        self.id
    }

    /// Query text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Result layout.
    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// Descriptor handed to the driver when a cursor is opened.
    pub fn inter_layout(&self) -> &InterLayout {
        &self.inter_layout
    }

    /// Rows per portion requested from the cursor.
    pub fn portion_size(&self) -> usize {
        self.portion_size
    }

    /// Returns true once the query text has been sent to the driver.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Returns true after an execution and until parameters are rebound.
    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Returns true while a cursor is open.
    pub fn has_cursor(&self) -> bool {
        self.cursor.is_some()
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

    fn close_cursor(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
            trace!(runner = %self.id, "cursor closed");
        }
    }

    /// Sends the query text to the driver. Repeated calls do nothing.
    pub fn prepare(&mut self) -> Result<()> {
        self.ensure_usable()?;
        if self.prepared {
            return Ok(());
        }
        self.seance
            .prepare(InterTask::new(TaskKind::Query, self.text.clone()))?;
        self.prepared = true;
        trace!(runner = %self.id, text = %self.text, "query prepared");
        Ok(())
    }

    /// Binds parameter values for the next execution.
    ///
    /// Closes any open cursor and clears the executed state; the statement
    /// stays prepared.
    pub fn with_params<I>(&mut self, params: I) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.ensure_usable()?;
        self.close_cursor();
        self.executed = false;
        let params: Vec<Value> = params.into_iter().map(Into::into).collect();
        trace!(runner = %self.id, count = params.len(), "parameters bound");
        self.seance.set_params(params)?;
        Ok(self)
    }

    /// Sets the portion size; an open cursor uses it from its next fetch.
    pub fn pack_by(&mut self, size: usize) -> Result<&mut Self> {
        if size == 0 {
            return Err(DbError::Invalid("portion size must be positive"));
        }
        self.ensure_usable()?;
        self.portion_size = size;
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.set_portion_size(size);
        }
        Ok(self)
    }

    /// Executes the query and opens a fresh cursor.
    ///
    /// When the statement produces no result set, no cursor is kept and later
    /// fetches observe nothing.
    pub fn execute(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.close_cursor();
        if !self.prepared {
            self.prepare()?;
        }
        self.seance.execute()?;
        self.cursor = self.seance.open_cursor(0, &self.inter_layout)?;
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.set_portion_size(self.portion_size);
        }
        self.executed = true;
        debug!(
            runner = %self.id,
            has_cursor = self.cursor.is_some(),
            portion_size = self.portion_size,
            "query executed"
        );
        Ok(())
    }

    /// Fetches one portion and returns the partial result built from it alone.
    ///
    /// Executes first when needed. Returns `None` once the cursor is exhausted
    /// (closing it) or when the statement produced no result set.
    pub fn next_pack(&mut self) -> Result<Option<L::Output>> {
        self.ensure_usable()?;
        if !self.executed {
            self.execute()?;
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        match cursor.retrieve_portion()? {
            Some(portion) => {
                let mut builder = self.layout.make_builder();
                builder.add(portion)?;
                Ok(builder.build())
            }
            None => {
                self.close_cursor();
                trace!(runner = %self.id, "cursor exhausted");
                Ok(None)
            }
        }
    }

    /// Executes the query and drains every portion into one result.
    ///
    /// Returns `None` only when the statement produced no result set or a
    /// one-row result saw no row.
    pub fn run(&mut self) -> Result<Option<L::Output>> {
        self.execute()?;
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        let mut builder = self.layout.make_builder();
        let drained = drain(cursor.as_mut(), &mut builder);
        self.close_cursor();
        let portions = drained?;
        if portions > 1 && self.layout.just_one_portion() {
            warn!(
                runner = %self.id,
                portions,
                "single-portion result received several portions; keeping the last"
            );
        }
        debug!(runner = %self.id, portions, "query drained");
        Ok(builder.build())
    }

    /// Closes the cursor and the seance and leaves the session's registry.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.close_cursor();
        self.seance.close();
        self.closed = true;
        self.session.runner_closed(self.id);
    }
}

fn drain<B: ResultBuilder>(cursor: &mut dyn InterCursor, builder: &mut B) -> Result<usize> {
    let mut portions = 0;
    while let Some(portion) = cursor.retrieve_portion()? {
        portions += 1;
        builder.add(portion)?;
    }
    Ok(portions)
}

impl<L: ResultLayout> Drop for QueryRunner<L> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<L: ResultLayout> fmt::Debug for QueryRunner<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRunner")
            .field("id", &self.id)
            .field("text", &self.text)
            .field("layout", &self.inter_layout)
            .field("portion_size", &self.portion_size)
            .field("prepared", &self.prepared)
            .field("executed", &self.executed)
            .field("has_cursor", &self.cursor.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}
