//! Low-level accumulators used by result builders and drivers.
//!
//! Includes the chunked array builders that grow typed collections from
//! repeated portions, and slice chopping helpers used to cut portions.

/// Array, list and set accumulation.
///
/// Generic chunked builders plus bulk-copying primitive builders.
pub mod arrays;

/// Slice chopping helpers.
///
/// Splits flat row sequences into fixed-size portions.
pub mod chop;

pub use arrays::{
    ArrayBuilder, IntArrayBuilder, LongArrayBuilder, Primitive, PrimitiveArrayBuilder,
    ShortArrayBuilder,
};
pub use chop::{chop_and_pad_by, chop_by};
