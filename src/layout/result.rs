//! Result layouts: the shape of a whole query result and the builders that
//! fold portions into it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use super::row::{ExistenceRow, MapEntryRow, PrimitiveRow, RowLayout, RowShape};
use super::sealed::Sealed;
use crate::inter::{InterLayout, InterResultKind, Portion, RawRow};
use crate::primitives::{ArrayBuilder, Primitive, PrimitiveArrayBuilder};
use crate::types::{DbError, FromValue, Result, Value};

/// Per-execution accumulator folding portions into a typed result.
pub trait ResultBuilder: Send {
    /// Final result type.
    type Output;

    /// Resets to the empty state.
    fn clear(&mut self);

    /// Ingests one portion in arrival order.
    fn add(&mut self, portion: Portion) -> Result<()>;

    /// Produces the result accumulated so far without consuming it.
    ///
    /// Returns the layout's empty value when nothing was added; `None` only for
    /// layouts whose empty value is absence.
    fn build(&self) -> Option<Self::Output>;
}

/// Declared shape of a query result.
pub trait ResultLayout: Send + Sync + Sealed {
    /// Final result type.
    type Output: Send + 'static;
    /// Builder type created per execution.
    type Builder: ResultBuilder<Output = Self::Output>;

    /// Overall result shape.
    fn result_kind(&self) -> InterResultKind;

    /// Row layout describing each element.
    fn row(&self) -> &dyn RowShape;

    /// True when at most one portion is ever expected.
    fn just_one_portion(&self) -> bool {
        false
    }

    /// Creates a fresh builder; builders are never reused across executions.
    fn make_builder(&self) -> Self::Builder;

    /// Compiles the descriptor handed to the driver boundary.
    fn make_inter_layout(&self) -> InterLayout {
        let row = self.row();
        InterLayout {
            result_kind: self.result_kind(),
            row_kind: row.row_kind(),
            primitive_kind: row.primitive_kind(),
            base_component: row.base_component(),
            column_names: row.column_names(),
            component_kinds: row.component_kinds(),
        }
    }
}

fn shape_error(expected: &'static str, portion: &Portion) -> DbError {
    DbError::PortionShape {
        expected,
        found: portion.shape_name(),
    }
}

// ------------------------------------------------------------------ existence

/// Result answering whether any row exists.
#[derive(Debug, Clone, Default)]
pub struct ExistenceLayout {
    row: ExistenceRow,
}

impl ExistenceLayout {
    /// Creates the layout.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Builder of [`ExistenceLayout`].
#[derive(Debug, Clone, Default)]
pub struct ExistenceBuilder {
    existence: bool,
}

impl ResultBuilder for ExistenceBuilder {
    type Output = bool;

    fn clear(&mut self) {
        self.existence = false;
    }

    fn add(&mut self, portion: Portion) -> Result<()> {
        // Unrecognised portions leave the flag as it was.
        match portion {
            Portion::Row(RawRow::Value(Value::Bool(flag))) => self.existence = flag,
            Portion::Row(RawRow::Value(Value::Int(n))) => self.existence = n > 0,
            Portion::Row(RawRow::Value(Value::Float(f))) => self.existence = (f as i64) > 0,
            Portion::Row(RawRow::Columns(values)) => self.existence = !values.is_empty(),
            Portion::Rows(rows) => self.existence = !rows.is_empty(),
            Portion::Shorts(values) => self.existence = !values.is_empty(),
            Portion::Ints(values) => self.existence = !values.is_empty(),
            Portion::Longs(values) => self.existence = !values.is_empty(),
            Portion::Row(RawRow::Value(_)) | Portion::Row(RawRow::Entry(..)) => {}
        }
        Ok(())
    }

    fn build(&self) -> Option<bool> {
        Some(self.existence)
    }
}

impl Sealed for ExistenceLayout {}

impl ResultLayout for ExistenceLayout {
    type Output = bool;
    type Builder = ExistenceBuilder;

    fn result_kind(&self) -> InterResultKind {
        InterResultKind::Existence
    }

    fn row(&self) -> &dyn RowShape {
        &self.row
    }

    fn just_one_portion(&self) -> bool {
        true
    }

    fn make_builder(&self) -> ExistenceBuilder {
        ExistenceBuilder::default()
    }
}

// -------------------------------------------------------------------- one row

/// Result holding at most one row.
pub struct OneRowLayout<R> {
    row: Arc<R>,
}

impl<R: RowLayout> OneRowLayout<R> {
    /// Wraps a row layout.
    pub fn new(row: R) -> Self {
        Self { row: Arc::new(row) }
    }
}

impl<R> Clone for OneRowLayout<R> {
    fn clone(&self) -> Self {
        Self {
            row: Arc::clone(&self.row),
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for OneRowLayout<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneRowLayout").field("row", &self.row).finish()
    }
}

/// Builder of [`OneRowLayout`]; the last added row wins.
pub struct OneRowBuilder<R: RowLayout> {
    row: Arc<R>,
    value: Option<R::Row>,
}

impl<R> ResultBuilder for OneRowBuilder<R>
where
    R: RowLayout,
    R::Row: Clone,
{
    type Output = R::Row;

    fn clear(&mut self) {
        self.value = None;
    }

    fn add(&mut self, portion: Portion) -> Result<()> {
        match portion {
            Portion::Row(raw) => {
                self.value = Some(self.row.transform(raw)?);
            }
            Portion::Rows(rows) => {
                if let Some(raw) = rows.into_iter().last() {
                    self.value = Some(self.row.transform(raw)?);
                }
            }
            other => return Err(shape_error("row", &other)),
        }
        Ok(())
    }

    fn build(&self) -> Option<R::Row> {
        self.value.clone()
    }
}

impl<R> Sealed for OneRowLayout<R> {}

impl<R> ResultLayout for OneRowLayout<R>
where
    R: RowLayout,
    R::Row: Clone,
{
    type Output = R::Row;
    type Builder = OneRowBuilder<R>;

    fn result_kind(&self) -> InterResultKind {
        InterResultKind::OneRow
    }

    fn row(&self) -> &dyn RowShape {
        &*self.row
    }

    fn just_one_portion(&self) -> bool {
        true
    }

    fn make_builder(&self) -> OneRowBuilder<R> {
        OneRowBuilder {
            row: Arc::clone(&self.row),
            value: None,
        }
    }
}

// ----------------------------------------------------------- primitive arrays

/// Result that is one flat array of primitive integers.
pub struct PrimitiveArrayLayout<P> {
    row: PrimitiveRow,
    _marker: PhantomData<fn() -> P>,
}

/// Result layout producing `Vec<i16>`.
pub type ShortArrayLayout = PrimitiveArrayLayout<i16>;
/// Result layout producing `Vec<i32>`.
pub type IntArrayLayout = PrimitiveArrayLayout<i32>;
/// Result layout producing `Vec<i64>`.
pub type LongArrayLayout = PrimitiveArrayLayout<i64>;

impl<P: Primitive> PrimitiveArrayLayout<P> {
    /// Creates the layout.
    pub fn new() -> Self {
        Self {
            row: PrimitiveRow::new(P::KIND),
            _marker: PhantomData,
        }
    }
}

impl<P: Primitive> Default for PrimitiveArrayLayout<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for PrimitiveArrayLayout<P> {
    fn clone(&self) -> Self {
        Self {
            row: self.row,
            _marker: PhantomData,
        }
    }
}

impl<P> fmt::Debug for PrimitiveArrayLayout<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveArrayLayout")
            .field("kind", &self.row.kind())
            .finish()
    }
}

/// Builder of [`PrimitiveArrayLayout`]; portions are appended in bulk.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveBuilder<P: Primitive> {
    values: PrimitiveArrayBuilder<P>,
}

impl<P: Primitive> ResultBuilder for PrimitiveBuilder<P> {
    type Output = Vec<P>;

    fn clear(&mut self) {
        self.values.clear();
    }

    fn add(&mut self, portion: Portion) -> Result<()> {
        match P::take_batch(portion) {
            Ok(batch) => {
                self.values.add_vec(batch);
                Ok(())
            }
            Err(other) => Err(shape_error("primitive array of the declared kind", &other)),
        }
    }

    fn build(&self) -> Option<Vec<P>> {
        Some(self.values.build_array())
    }
}

impl<P> Sealed for PrimitiveArrayLayout<P> {}

impl<P: Primitive> ResultLayout for PrimitiveArrayLayout<P> {
    type Output = Vec<P>;
    type Builder = PrimitiveBuilder<P>;

    fn result_kind(&self) -> InterResultKind {
        InterResultKind::PrimitiveArray
    }

    fn row(&self) -> &dyn RowShape {
        &self.row
    }

    fn make_builder(&self) -> PrimitiveBuilder<P> {
        PrimitiveBuilder::default()
    }
}

// ------------------------------------------------------------ table results

/// Builder shared by the table-shaped layouts: every portion is a batch of raw
/// rows transformed through the row layout and appended in order; `finish`
/// turns the accumulation into the final container.
pub struct RowsBuilder<R: RowLayout, T> {
    row: Arc<R>,
    rows: ArrayBuilder<R::Row>,
    finish: fn(&ArrayBuilder<R::Row>) -> T,
}

impl<R: RowLayout, T> RowsBuilder<R, T> {
    fn new(row: Arc<R>, finish: fn(&ArrayBuilder<R::Row>) -> T) -> Self {
        Self {
            row,
            rows: ArrayBuilder::new(),
            finish,
        }
    }

    /// Number of rows accumulated so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when no row has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<R: RowLayout, T> ResultBuilder for RowsBuilder<R, T> {
    type Output = T;

    fn clear(&mut self) {
        self.rows.clear();
    }

    fn add(&mut self, portion: Portion) -> Result<()> {
        let batch = match portion {
            Portion::Rows(rows) => rows,
            Portion::Row(raw) => vec![raw],
            other => return Err(shape_error("rows", &other)),
        };
        let row = &self.row;
        self.rows.add_array_with(batch, |raw| row.transform(raw))
    }

    fn build(&self) -> Option<T> {
        Some((self.finish)(&self.rows))
    }
}

macro_rules! table_layout {
    (
        $(#[$meta:meta])*
        $name:ident, $output:ty, [$($bound:tt)+], $finish:expr
    ) => {
        $(#[$meta])*
        pub struct $name<R> {
            row: Arc<R>,
        }

        impl<R: RowLayout> $name<R> {
            /// Wraps a row layout.
            pub fn new(row: R) -> Self {
                Self { row: Arc::new(row) }
            }
        }

        impl<R> Clone for $name<R> {
            fn clone(&self) -> Self {
                Self {
                    row: Arc::clone(&self.row),
                }
            }
        }

        impl<R: fmt::Debug> fmt::Debug for $name<R> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name)).field("row", &self.row).finish()
            }
        }

        impl<R> Sealed for $name<R> {}

        impl<R> ResultLayout for $name<R>
        where
            R: RowLayout,
            R::Row: $($bound)+,
        {
            type Output = $output;
            type Builder = RowsBuilder<R, $output>;

            fn result_kind(&self) -> InterResultKind {
                InterResultKind::Table
            }

            fn row(&self) -> &dyn RowShape {
                &*self.row
            }

            fn make_builder(&self) -> Self::Builder {
                RowsBuilder::new(Arc::clone(&self.row), $finish)
            }
        }
    };
}

table_layout!(
    /// Result collected into a fixed-size array.
    ArrayLayout,
    Box<[R::Row]>,
    [Clone],
    |rows| rows.build_boxed()
);

table_layout!(
    /// Result collected into a list, preserving arrival order.
    ListLayout,
    Vec<R::Row>,
    [Clone],
    |rows| rows.build_vec()
);

table_layout!(
    /// Result collected into a set; duplicates are removed when building.
    SetLayout,
    HashSet<R::Row>,
    [Clone + Eq + Hash],
    |rows| rows.build_set()
);

// ------------------------------------------------------------------------ map

/// Result folded into a key/value map; for duplicate keys the last pair wins.
pub struct MapLayout<K, V> {
    row: Arc<MapEntryRow<K, V>>,
}

impl<K, V> MapLayout<K, V> {
    /// Creates the layout.
    pub fn new() -> Self {
        Self {
            row: Arc::new(MapEntryRow::new()),
        }
    }
}

impl<K, V> Default for MapLayout<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for MapLayout<K, V> {
    fn clone(&self) -> Self {
        Self {
            row: Arc::clone(&self.row),
        }
    }
}

impl<K: FromValue, V: FromValue> fmt::Debug for MapLayout<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapLayout").field("row", &self.row).finish()
    }
}

fn fold_entries<K, V>(entries: &ArrayBuilder<(K, V)>) -> HashMap<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    let mut map = HashMap::with_capacity(entries.len());
    for (key, value) in entries.iter() {
        map.insert(key.clone(), value.clone());
    }
    map
}

impl<K, V> Sealed for MapLayout<K, V> {}

impl<K, V> ResultLayout for MapLayout<K, V>
where
    K: FromValue + Clone + Eq + Hash + Send + 'static,
    V: FromValue + Clone + Send + 'static,
{
    type Output = HashMap<K, V>;
    type Builder = RowsBuilder<MapEntryRow<K, V>, HashMap<K, V>>;

    fn result_kind(&self) -> InterResultKind {
        InterResultKind::Table
    }

    fn row(&self) -> &dyn RowShape {
        &*self.row
    }

    fn make_builder(&self) -> Self::Builder {
        RowsBuilder::new(Arc::clone(&self.row), fold_entries::<K, V>)
    }
}
