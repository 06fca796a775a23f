#![forbid(unsafe_code)]

//! Typed layouts of query results.
//!
//! A result layout ([`ResultLayout`]) pairs an overall shape (existence, one
//! row, primitive array, collection, map) with a row layout ([`RowLayout`])
//! describing each element. Layouts are immutable and shared; every execution
//! gets a fresh [`ResultBuilder`] that folds the cursor's portions into the
//! final value.
//!
//! ```
//! use rowshape::layout::{layout_list_of, row_value_of, ResultBuilder, ResultLayout};
//! use rowshape::inter::{Portion, RawRow};
//! use rowshape::types::Value;
//!
//! let layout = layout_list_of(row_value_of::<i64>());
//! let mut builder = layout.make_builder();
//! builder.add(Portion::Rows(vec![RawRow::Value(Value::Int(1))])).unwrap();
//! assert_eq!(builder.build(), Some(vec![1]));
//! ```

pub mod result;
pub mod row;

pub(crate) mod sealed {
    /// Closes the layout trait families to this crate.
    pub trait Sealed {}
}

pub use result::{
    ArrayLayout, ExistenceBuilder, ExistenceLayout, IntArrayLayout, ListLayout, LongArrayLayout,
    MapLayout, OneRowBuilder, OneRowLayout, PrimitiveArrayLayout, PrimitiveBuilder,
    ResultBuilder, ResultLayout, RowsBuilder, SetLayout, ShortArrayLayout,
};
pub use row::{
    ArrayRow, ExistenceRow, FieldDescriptor, MapEntryRow, PrimitiveRow, RowLayout, RowShape,
    RowStruct, StructRow, ValueRow,
};

use crate::types::FromValue;

/// Implements [`RowStruct`] for a struct that already derives [`Default`].
///
/// Only the listed fields are mapped, in the listed order; column *i* of each
/// row is assigned to the *i*-th listed field.
///
/// ```
/// use rowshape::row_struct;
///
/// #[derive(Debug, Default, Clone, PartialEq)]
/// struct Account {
///     id: i64,
///     name: Option<String>,
///     cached: bool,
/// }
///
/// row_struct!(Account { id: i64, name: Option<String> });
/// ```
#[macro_export]
macro_rules! row_struct {
    ($name:ident { $($field:ident : $fty:ty),+ $(,)? }) => {
        impl $crate::layout::RowStruct for $name {
            fn fields() -> &'static [$crate::layout::FieldDescriptor] {
                const FIELDS: &[$crate::layout::FieldDescriptor] = &[
                    $($crate::layout::FieldDescriptor {
                        name: stringify!($field),
                        kind: <$fty as $crate::types::FromValue>::KIND,
                    }),+
                ];
                FIELDS
            }

            fn set_field(
                &mut self,
                index: usize,
                value: $crate::types::Value,
            ) -> $crate::types::Result<()> {
                let mut slot = 0usize;
                $(
                    if index == slot {
                        self.$field = <$fty as $crate::types::FromValue>::from_value(value)?;
                        return Ok(());
                    }
                    slot += 1;
                )+
                Err($crate::types::DbError::Layout(format!(
                    "{} has {} mapped fields, no field at index {}",
                    stringify!($name),
                    slot,
                    index
                )))
            }
        }
    };
}

/// Result telling whether the query produced any row.
pub fn layout_existence() -> ExistenceLayout {
    ExistenceLayout::new()
}

/// Result holding the single scalar of a one-row, one-column query.
pub fn layout_single_value_of<V>() -> OneRowLayout<ValueRow<V>>
where
    V: FromValue + Clone + Send + 'static,
{
    OneRowLayout::new(ValueRow::new())
}

/// Result that is the first column read as 16-bit integers.
pub fn layout_array_of_short() -> ShortArrayLayout {
    ShortArrayLayout::new()
}

/// Result that is the first column read as 32-bit integers.
pub fn layout_array_of_int() -> IntArrayLayout {
    IntArrayLayout::new()
}

/// Result that is the first column read as 64-bit integers.
pub fn layout_array_of_long() -> LongArrayLayout {
    LongArrayLayout::new()
}

/// Result holding at most one row of the given layout.
pub fn layout_one_row_of<R: RowLayout>(row: R) -> OneRowLayout<R> {
    OneRowLayout::new(row)
}

/// Result collected into a boxed slice.
pub fn layout_array_of<R: RowLayout>(row: R) -> ArrayLayout<R> {
    ArrayLayout::new(row)
}

/// Result collected into a list.
pub fn layout_list_of<R: RowLayout>(row: R) -> ListLayout<R> {
    ListLayout::new(row)
}

/// Result collected into a set.
pub fn layout_set_of<R: RowLayout>(row: R) -> SetLayout<R> {
    SetLayout::new(row)
}

/// Result folded into a map from the first two columns.
pub fn layout_map_of<K, V>() -> MapLayout<K, V>
where
    K: FromValue,
    V: FromValue,
{
    MapLayout::new()
}

/// Row that is one scalar.
pub fn row_value_of<V: FromValue>() -> ValueRow<V> {
    ValueRow::new()
}

/// Row mapped onto a struct.
pub fn row_struct_of<S: RowStruct>() -> StructRow<S> {
    StructRow::new()
}

/// Row that is an array of values of one kind.
pub fn row_array_of<E: FromValue>() -> ArrayRow<E> {
    ArrayRow::new()
}
