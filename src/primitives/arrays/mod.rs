#![forbid(unsafe_code)]
//! Chunked array builders.
//!
//! [`ArrayBuilder`] keeps every appended batch as its own chunk so that adding a
//! portion never reallocates what was accumulated before; the flat view is only
//! materialised when a result is built. Primitive builders copy whole slices and
//! never box individual elements.

use std::collections::HashSet;
use std::hash::Hash;

use crate::inter::Portion;
use crate::types::{PrimitiveKind, Result};

/// Accumulates typed elements across repeated batch appends.
#[derive(Debug, Clone)]
pub struct ArrayBuilder<E> {
    chunks: Vec<Vec<E>>,
    count: usize,
}

impl<E> Default for ArrayBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ArrayBuilder<E> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            count: 0,
        }
    }

    /// Drops everything accumulated so far.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.count = 0;
    }

    /// Number of accumulated elements.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true when nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Appends one batch as-is.
    pub fn add_array(&mut self, batch: Vec<E>) {
        if batch.is_empty() {
            return;
        }
        self.count += batch.len();
        self.chunks.push(batch);
    }

    /// Appends one batch of raw elements, converting each through `transform`.
    ///
    /// The batch is appended only when every element converts, so a failure
    /// leaves the accumulation untouched.
    pub fn add_array_with<T, F>(&mut self, batch: Vec<T>, transform: F) -> Result<()>
    where
        F: FnMut(T) -> Result<E>,
    {
        let converted = batch.into_iter().map(transform).collect::<Result<Vec<E>>>()?;
        self.add_array(converted);
        Ok(())
    }

    /// Iterates over the accumulated elements in append order.
    pub fn iter(&self) -> impl Iterator<Item = &E> + '_ {
        self.chunks.iter().flatten()
    }
}

impl<E: Clone> ArrayBuilder<E> {
    /// Snapshot of the accumulated elements as a list.
    pub fn build_vec(&self) -> Vec<E> {
        let mut out = Vec::with_capacity(self.count);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Snapshot of the accumulated elements as a fixed-size array.
    pub fn build_boxed(&self) -> Box<[E]> {
        self.build_vec().into_boxed_slice()
    }
}

impl<E: Clone + Eq + Hash> ArrayBuilder<E> {
    /// Snapshot of the accumulated elements with duplicates removed.
    pub fn build_set(&self) -> HashSet<E> {
        let mut out = HashSet::with_capacity(self.count);
        out.extend(self.iter().cloned());
        out
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i16 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
}

/// Integer element type that the driver boundary may deliver as a flat array.
pub trait Primitive: Copy + Default + Send + Sync + 'static + sealed::Sealed {
    /// Matching primitive kind tag.
    const KIND: PrimitiveKind;

    /// Extracts the batch from a portion of this element kind; any other
    /// portion is handed back unchanged.
    fn take_batch(portion: Portion) -> std::result::Result<Vec<Self>, Portion>;
}

impl Primitive for i16 {
    const KIND: PrimitiveKind = PrimitiveKind::Short;

    fn take_batch(portion: Portion) -> std::result::Result<Vec<Self>, Portion> {
        match portion {
            Portion::Shorts(values) => Ok(values),
            other => Err(other),
        }
    }
}

impl Primitive for i32 {
    const KIND: PrimitiveKind = PrimitiveKind::Int;

    fn take_batch(portion: Portion) -> std::result::Result<Vec<Self>, Portion> {
        match portion {
            Portion::Ints(values) => Ok(values),
            other => Err(other),
        }
    }
}

impl Primitive for i64 {
    const KIND: PrimitiveKind = PrimitiveKind::Long;

    fn take_batch(portion: Portion) -> std::result::Result<Vec<Self>, Portion> {
        match portion {
            Portion::Longs(values) => Ok(values),
            other => Err(other),
        }
    }
}

/// Accumulates primitive values by bulk slice copies.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveArrayBuilder<P: Primitive> {
    values: Vec<P>,
}

/// Builder for arrays of 16-bit integers.
pub type ShortArrayBuilder = PrimitiveArrayBuilder<i16>;
/// Builder for arrays of 32-bit integers.
pub type IntArrayBuilder = PrimitiveArrayBuilder<i32>;
/// Builder for arrays of 64-bit integers.
pub type LongArrayBuilder = PrimitiveArrayBuilder<i64>;

impl<P: Primitive> PrimitiveArrayBuilder<P> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Drops everything accumulated so far.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Number of accumulated elements.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Appends a batch by copying the slice.
    pub fn add_array(&mut self, batch: &[P]) {
        self.values.extend_from_slice(batch);
    }

    /// Appends an owned batch; the first batch is adopted without copying.
    pub fn add_vec(&mut self, batch: Vec<P>) {
        if self.values.is_empty() {
            self.values = batch;
        } else {
            self.values.extend_from_slice(&batch);
        }
    }

    /// Snapshot of the accumulated values.
    pub fn build_array(&self) -> Vec<P> {
        self.values.clone()
    }
}
