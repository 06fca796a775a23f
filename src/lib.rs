//! Typed result shaping for database queries.
//!
//! `rowshape` sits between application code and a database driver. A
//! [`layout`] declares what a query result should look like (a flag, one row,
//! a primitive array, a list, set or map of typed rows); a
//! [`db::QueryRunner`] executes the query through the driver boundary
//! ([`inter`]) and folds the portions it fetches into that typed value.
//!
//! ```rust
//! use rowshape::db::{Config, Facade};
//! use rowshape::inter::memory::MemoryDriver;
//! use rowshape::layout::layout_map_of;
//! use rowshape::types::Value;
//!
//! let driver = MemoryDriver::new().with_rows(
//!     "select code, qty from stock",
//!     vec![
//!         vec![Value::from("a"), Value::Int(1)],
//!         vec![Value::from("b"), Value::Int(2)],
//!     ],
//! );
//! let facade = Facade::new(driver, Config::default());
//! let stock = facade.in_session(|session| {
//!     session
//!         .query("select code, qty from stock", layout_map_of::<String, i64>())?
//!         .run()
//! })?;
//! assert_eq!(stock.map(|m| m["b"]), Some(2));
//! # Ok::<(), rowshape::types::DbError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod db;
pub mod inter;
pub mod layout;
pub mod logging;
pub mod primitives;
pub mod types;

pub use db::{CommandRunner, Config, Facade, QueryRunner, ScriptRunner, Session, SqlScript};
pub use layout::{ResultBuilder, ResultLayout, RowLayout};
pub use types::{DbError, Result, Value};
