//! Cutting materialised driver rows into portions according to an
//! [`InterLayout`].

use std::collections::VecDeque;

use tracing::trace;

use super::{InterCursor, InterLayout, InterResultKind, InterRowKind, Portion, RawRow};
use crate::primitives::chop_by;
use crate::types::{DbError, FromValue, PrimitiveKind, Result, Value};

/// Shapes one driver row according to the declared row kind.
pub fn shape_row(row_kind: InterRowKind, mut columns: Vec<Value>) -> Result<RawRow> {
    match row_kind {
        InterRowKind::None => Ok(RawRow::Value(Value::Bool(true))),
        InterRowKind::OneValue => Ok(RawRow::Value(if columns.is_empty() {
            Value::Null
        } else {
            columns.swap_remove(0)
        })),
        InterRowKind::Objects => Ok(RawRow::Columns(columns)),
        InterRowKind::MapEntry => {
            if columns.len() < 2 {
                return Err(DbError::Driver(format!(
                    "map entry rows need two columns, got {}",
                    columns.len()
                )));
            }
            columns.truncate(2);
            let value = columns.pop().unwrap_or(Value::Null);
            let key = columns.pop().unwrap_or(Value::Null);
            Ok(RawRow::Entry(key, value))
        }
    }
}

fn first_column<P: FromValue>(rows: Vec<Vec<Value>>) -> Result<Vec<P>> {
    rows.into_iter()
        .map(|row| P::from_value(row.into_iter().next().unwrap_or(Value::Null)))
        .collect()
}

/// Builds the primitive portion for a batch of rows.
pub fn primitive_portion(kind: PrimitiveKind, rows: Vec<Vec<Value>>) -> Result<Portion> {
    Ok(match kind {
        PrimitiveKind::Short => Portion::Shorts(first_column::<i16>(rows)?),
        PrimitiveKind::Int => Portion::Ints(first_column::<i32>(rows)?),
        PrimitiveKind::Long => Portion::Longs(first_column::<i64>(rows)?),
    })
}

/// Cursor over a fully materialised result set.
///
/// Rows are handed out in portions of the configured size; existence and
/// one-row results produce exactly one portion.
#[derive(Debug)]
pub struct BufferedCursor {
    rows: Vec<Vec<Value>>,
    batches: VecDeque<Vec<Vec<Value>>>,
    layout: InterLayout,
    portion_size: usize,
    delivered_single: bool,
    closed: bool,
}

impl BufferedCursor {
    /// Wraps materialised rows.
    pub fn new(rows: Vec<Vec<Value>>, layout: InterLayout) -> Self {
        Self {
            rows,
            batches: VecDeque::new(),
            layout,
            portion_size: 100,
            delivered_single: false,
            closed: false,
        }
    }

    /// Returns true once the cursor has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // Rows not yet cut stay in `rows`; a new portion size re-cuts whatever
    // has not been delivered.
    fn take_batch(&mut self) -> Result<Vec<Vec<Value>>> {
        if !self.rows.is_empty() {
            let rows = std::mem::take(&mut self.rows);
            self.batches.extend(chop_by(&rows, self.portion_size)?);
        }
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

impl InterCursor for BufferedCursor {
    fn set_portion_size(&mut self, size: usize) {
        self.portion_size = size.max(1);
        if !self.batches.is_empty() {
            let mut rest: Vec<Vec<Value>> = self.batches.drain(..).flatten().collect();
            rest.append(&mut self.rows);
            self.rows = rest;
        }
    }

    fn retrieve_portion(&mut self) -> Result<Option<Portion>> {
        if self.closed {
            return Ok(None);
        }
        let portion = match self.layout.result_kind {
            InterResultKind::Existence => {
                if self.delivered_single {
                    None
                } else {
                    self.delivered_single = true;
                    Some(Portion::from(!self.rows.is_empty()))
                }
            }
            InterResultKind::OneRow => {
                if self.delivered_single {
                    None
                } else {
                    self.delivered_single = true;
                    if self.rows.is_empty() {
                        None
                    } else {
                        let row = self.rows.swap_remove(0);
                        Some(Portion::Row(shape_row(self.layout.row_kind, row)?))
                    }
                }
            }
            InterResultKind::PrimitiveArray => {
                let batch = self.take_batch()?;
                if batch.is_empty() {
                    None
                } else {
                    let kind = self.layout.primitive_kind.ok_or_else(|| {
                        DbError::Driver("primitive array layout without primitive kind".into())
                    })?;
                    Some(primitive_portion(kind, batch)?)
                }
            }
            InterResultKind::Table => {
                let batch = self.take_batch()?;
                if batch.is_empty() {
                    None
                } else {
                    let row_kind = self.layout.row_kind;
                    let rows = batch
                        .into_iter()
                        .map(|row| shape_row(row_kind, row))
                        .collect::<Result<Vec<_>>>()?;
                    Some(Portion::Rows(rows))
                }
            }
        };
        trace!(
            rows = portion.as_ref().map_or(0, Portion::len),
            exhausted = portion.is_none(),
            "buffered cursor portion"
        );
        Ok(portion)
    }

    fn close(&mut self) {
        self.closed = true;
        self.rows.clear();
        self.batches.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_layout(row_kind: InterRowKind) -> InterLayout {
        InterLayout {
            result_kind: InterResultKind::Table,
            row_kind,
            primitive_kind: None,
            base_component: None,
            column_names: None,
            component_kinds: None,
        }
    }

    fn rows(n: i64) -> Vec<Vec<Value>> {
        (1..=n).map(|i| vec![Value::Int(i), Value::from(format!("r{i}"))]).collect()
    }

    #[test]
    fn table_rows_are_cut_by_portion_size() {
        let mut cursor = BufferedCursor::new(rows(5), table_layout(InterRowKind::OneValue));
        cursor.set_portion_size(2);
        let sizes: Vec<usize> = std::iter::from_fn(|| cursor.retrieve_portion().unwrap())
            .map(|p| p.len())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn resizing_recuts_undelivered_rows() {
        let mut cursor = BufferedCursor::new(rows(5), table_layout(InterRowKind::OneValue));
        cursor.set_portion_size(2);
        assert_eq!(cursor.retrieve_portion().unwrap().map(|p| p.len()), Some(2));
        cursor.set_portion_size(10);
        assert_eq!(
            cursor.retrieve_portion().unwrap(),
            Some(Portion::Rows(vec![
                RawRow::Value(Value::Int(3)),
                RawRow::Value(Value::Int(4)),
                RawRow::Value(Value::Int(5)),
            ]))
        );
        assert_eq!(cursor.retrieve_portion().unwrap(), None);
    }

    #[test]
    fn map_entry_rows_take_first_two_columns() {
        let row = shape_row(
            InterRowKind::MapEntry,
            vec![Value::from("k"), Value::Int(1), Value::Int(9)],
        )
        .unwrap();
        assert_eq!(row, RawRow::Entry(Value::from("k"), Value::Int(1)));
        assert!(shape_row(InterRowKind::MapEntry, vec![Value::Int(1)]).is_err());
    }

    #[test]
    fn existence_delivers_a_single_flag() {
        let mut layout = table_layout(InterRowKind::None);
        layout.result_kind = InterResultKind::Existence;
        let mut cursor = BufferedCursor::new(Vec::new(), layout);
        assert_eq!(cursor.retrieve_portion().unwrap(), Some(Portion::from(false)));
        assert_eq!(cursor.retrieve_portion().unwrap(), None);
    }

    #[test]
    fn primitive_portions_read_first_column() {
        let mut layout = table_layout(InterRowKind::OneValue);
        layout.result_kind = InterResultKind::PrimitiveArray;
        layout.primitive_kind = Some(PrimitiveKind::Short);
        let mut cursor = BufferedCursor::new(rows(3), layout);
        assert_eq!(
            cursor.retrieve_portion().unwrap(),
            Some(Portion::Shorts(vec![1, 2, 3]))
        );
        cursor.close();
        assert!(cursor.is_closed());
        assert_eq!(cursor.retrieve_portion().unwrap(), None);
    }
}
