//! Sessions, runners and the facade that opens them.

mod command_runner;
pub mod config;
mod facade;
mod query_runner;
mod registry;
mod script;
mod session;


pub use command_runner::CommandRunner;
pub use config::{Config, ConfigError, SqliteSection, DEFAULT_PORTION_SIZE};
pub use facade::Facade;
pub use query_runner::QueryRunner;
pub use registry::{RunnerEntry, RunnerId, RunnerKind};
pub use script::{ScriptRunner, SqlScript};
pub use session::{Session, SessionId};
