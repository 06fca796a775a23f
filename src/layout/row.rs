//! Row layouts: the shape of one logical row and how a raw row becomes a typed
//! value.

use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;

use super::sealed::Sealed;
use crate::inter::{InterRowKind, RawRow};
use crate::types::{DbError, FromValue, PrimitiveKind, Result, Value, ValueKind};

/// Shape metadata a row layout announces to the driver boundary before any row
/// is transformed.
pub trait RowShape: Send + Sync + Sealed {
    /// Physical row shape.
    fn row_kind(&self) -> InterRowKind {
        InterRowKind::Objects
    }

    /// Primitive element kind, for flat primitive array results.
    fn primitive_kind(&self) -> Option<PrimitiveKind> {
        None
    }

    /// Common kind of every column, when there is one.
    fn base_component(&self) -> Option<ValueKind> {
        None
    }

    /// Column names, for struct rows.
    fn column_names(&self) -> Option<Vec<String>> {
        None
    }

    /// Per-column kinds.
    fn component_kinds(&self) -> Option<Vec<ValueKind>> {
        None
    }
}

/// A row shape that can turn a raw row into a typed value.
pub trait RowLayout: RowShape {
    /// Typed row produced by [`RowLayout::transform`].
    type Row: Send + 'static;

    /// Converts one raw row. Must not mutate shared state.
    fn transform(&self, raw: RawRow) -> Result<Self::Row>;
}

/// Row used only to learn that a row existed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExistenceRow;

impl Sealed for ExistenceRow {}

impl RowShape for ExistenceRow {
    fn row_kind(&self) -> InterRowKind {
        InterRowKind::None
    }
}

impl RowLayout for ExistenceRow {
    type Row = bool;

    fn transform(&self, _raw: RawRow) -> Result<bool> {
        Ok(true)
    }
}

/// Row of a flat primitive array result.
///
/// Primitive arrays are appended in bulk by their builders, so this layout
/// never transforms individual elements.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveRow {
    kind: PrimitiveKind,
}

impl PrimitiveRow {
    /// Declares the primitive element kind.
    pub const fn new(kind: PrimitiveKind) -> Self {
        Self { kind }
    }

    /// Declared element kind.
    pub const fn kind(&self) -> PrimitiveKind {
        self.kind
    }
}

impl Sealed for PrimitiveRow {}

impl RowShape for PrimitiveRow {
    fn row_kind(&self) -> InterRowKind {
        InterRowKind::OneValue
    }

    fn primitive_kind(&self) -> Option<PrimitiveKind> {
        Some(self.kind)
    }

    fn base_component(&self) -> Option<ValueKind> {
        Some(self.kind.value_kind())
    }
}

impl RowLayout for PrimitiveRow {
    type Row = Infallible;

    fn transform(&self, _raw: RawRow) -> Result<Infallible> {
        Err(DbError::layout(
            "primitive row layout must never transform single elements",
        ))
    }
}

/// Row consisting of one scalar column.
pub struct ValueRow<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> ValueRow<V> {
    /// Creates the layout.
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<V> Default for ValueRow<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for ValueRow<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V: FromValue> fmt::Debug for ValueRow<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueRow").field("kind", &V::KIND).finish()
    }
}

impl<V> Sealed for ValueRow<V> {}

impl<V: FromValue> RowShape for ValueRow<V> {
    fn row_kind(&self) -> InterRowKind {
        InterRowKind::OneValue
    }

    fn base_component(&self) -> Option<ValueKind> {
        Some(V::KIND)
    }
}

impl<V: FromValue + Send + 'static> RowLayout for ValueRow<V> {
    type Row = V;

    fn transform(&self, raw: RawRow) -> Result<V> {
        match raw {
            RawRow::Value(value) => V::from_value(value),
            other => Err(DbError::PortionShape {
                expected: "scalar",
                found: other.shape_name(),
            }),
        }
    }
}

/// Row that is an array of homogeneous values; null slots become `None`.
pub struct ArrayRow<E> {
    _marker: PhantomData<fn() -> E>,
}

impl<E> ArrayRow<E> {
    /// Creates the layout.
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E> Default for ArrayRow<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for ArrayRow<E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E: FromValue> fmt::Debug for ArrayRow<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRow").field("component", &E::KIND).finish()
    }
}

impl<E> Sealed for ArrayRow<E> {}

impl<E: FromValue> RowShape for ArrayRow<E> {
    fn base_component(&self) -> Option<ValueKind> {
        Some(E::KIND)
    }
}

impl<E: FromValue + Send + 'static> RowLayout for ArrayRow<E> {
    type Row = Vec<Option<E>>;

    fn transform(&self, raw: RawRow) -> Result<Vec<Option<E>>> {
        match raw {
            RawRow::Columns(values) => values
                .into_iter()
                .map(|value| match value {
                    Value::Null => Ok(None),
                    other => E::from_value(other).map(Some),
                })
                .collect(),
            other => Err(DbError::PortionShape {
                expected: "columns",
                found: other.shape_name(),
            }),
        }
    }
}

/// One mutable field of a struct row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name, matched against the column position.
    pub name: &'static str,
    /// Declared field kind.
    pub kind: ValueKind,
}

/// Row descriptor capability of a struct type: ordered field descriptors, a
/// zero-argument constructor ([`Default`]) and positional field assignment.
///
/// Usually implemented with [`row_struct!`](crate::row_struct).
pub trait RowStruct: Default + Send + 'static {
    /// Ordered fields; column *i* maps to field *i*.
    fn fields() -> &'static [FieldDescriptor];

    /// Assigns field `index` from a non-null raw value.
    fn set_field(&mut self, index: usize, value: Value) -> Result<()>;
}

/// Row mapped positionally onto a struct.
pub struct StructRow<S> {
    names: Vec<String>,
    kinds: Vec<ValueKind>,
    _marker: PhantomData<fn() -> S>,
}

impl<S: RowStruct> StructRow<S> {
    /// Resolves and caches the struct's field descriptors.
    pub fn new() -> Self {
        let fields = S::fields();
        Self {
            names: fields.iter().map(|f| f.name.to_string()).collect(),
            kinds: fields.iter().map(|f| f.kind).collect(),
            _marker: PhantomData,
        }
    }
}

impl<S: RowStruct> Default for StructRow<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for StructRow<S> {
    fn clone(&self) -> Self {
        Self {
            names: self.names.clone(),
            kinds: self.kinds.clone(),
            _marker: PhantomData,
        }
    }
}

impl<S> fmt::Debug for StructRow<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructRow")
            .field("type", &std::any::type_name::<S>())
            .field("fields", &self.names)
            .finish()
    }
}

impl<S> Sealed for StructRow<S> {}

impl<S: RowStruct> RowShape for StructRow<S> {
    fn column_names(&self) -> Option<Vec<String>> {
        Some(self.names.clone())
    }

    fn component_kinds(&self) -> Option<Vec<ValueKind>> {
        Some(self.kinds.clone())
    }
}

impl<S: RowStruct> RowLayout for StructRow<S> {
    type Row = S;

    fn transform(&self, raw: RawRow) -> Result<S> {
        let values = match raw {
            RawRow::Columns(values) => values,
            other => {
                return Err(DbError::PortionShape {
                    expected: "columns",
                    found: other.shape_name(),
                })
            }
        };
        if values.len() != self.names.len() {
            return Err(DbError::layout(format!(
                "{} declares {} fields but the row has {} columns",
                std::any::type_name::<S>(),
                self.names.len(),
                values.len()
            )));
        }
        let mut row = S::default();
        for (index, value) in values.into_iter().enumerate() {
            if !value.is_null() {
                row.set_field(index, value)?;
            }
        }
        Ok(row)
    }
}

/// Row that is a key/value pair.
///
/// The driver boundary is trusted to deliver entries of the declared kinds; an
/// entry that breaks that promise is reported as a portion shape violation.
pub struct MapEntryRow<K, V> {
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> MapEntryRow<K, V> {
    /// Creates the layout.
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K, V> Default for MapEntryRow<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for MapEntryRow<K, V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<K: FromValue, V: FromValue> fmt::Debug for MapEntryRow<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapEntryRow")
            .field("key", &K::KIND)
            .field("value", &V::KIND)
            .finish()
    }
}

impl<K, V> Sealed for MapEntryRow<K, V> {}

impl<K: FromValue, V: FromValue> RowShape for MapEntryRow<K, V> {
    fn row_kind(&self) -> InterRowKind {
        InterRowKind::MapEntry
    }

    fn component_kinds(&self) -> Option<Vec<ValueKind>> {
        Some(vec![K::KIND, V::KIND])
    }
}

impl<K, V> RowLayout for MapEntryRow<K, V>
where
    K: FromValue + Send + 'static,
    V: FromValue + Send + 'static,
{
    type Row = (K, V);

    fn transform(&self, raw: RawRow) -> Result<(K, V)> {
        match raw {
            RawRow::Entry(key, value) => {
                let key_kind = key.kind_name();
                let value_kind = value.kind_name();
                let key = K::from_value(key).map_err(|_| DbError::PortionShape {
                    expected: "map entry key of the declared kind",
                    found: key_kind,
                })?;
                let value = V::from_value(value).map_err(|_| DbError::PortionShape {
                    expected: "map entry value of the declared kind",
                    found: value_kind,
                })?;
                Ok((key, value))
            }
            other => Err(DbError::PortionShape {
                expected: "map entry",
                found: other.shape_name(),
            }),
        }
    }
}
