use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::registry::RunnerId;
use super::session::SessionCore;
use crate::inter::{InterSeance, InterTask, TaskKind};
use crate::types::{DbError, Result};

/// Ordered list of statements executed one after another.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SqlScript {
    statements: Vec<String>,
}

impl SqlScript {
    /// Script made of the given statements; blank ones are skipped.
    pub fn new<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut script = Self::default();
        for statement in statements {
            script.push(statement);
        }
        script
    }

    /// Splits script text into statements.
    ///
    /// Statements are separated by `;` outside single-quoted literals. Lines
    /// that are `--` comments are dropped, except optimizer hints (`--+`).
    pub fn parse(text: &str) -> Self {
        let mut body = String::with_capacity(text.len());
        for line in text.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("--") && !trimmed.starts_with("--+") {
                continue;
            }
            body.push_str(line);
            body.push('\n');
        }

        let mut script = Self::default();
        let mut current = String::new();
        let mut quoted = false;
        for ch in body.chars() {
            match ch {
                '\'' => {
                    quoted = !quoted;
                    current.push(ch);
                }
                ';' if !quoted => script.push(std::mem::take(&mut current)),
                _ => current.push(ch),
            }
        }
        script.push(current);
        script
    }

    /// Appends a statement unless it is blank.
    pub fn push(&mut self, statement: impl Into<String>) {
        let statement = statement.into();
        let trimmed = statement.trim();
        if !trimmed.is_empty() {
            self.statements.push(trimmed.to_string());
        }
    }

    /// Statements in execution order.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Number of statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Returns true when the script has no statement.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Runs the statements of a [`SqlScript`] in order, each through a fresh
/// seance, stopping at the first failure.
pub struct ScriptRunner {
    id: RunnerId,
    session: Arc<SessionCore>,
    script: SqlScript,
    closed: bool,
}

impl ScriptRunner {
    pub(crate) fn new(id: RunnerId, session: Arc<SessionCore>, script: SqlScript) -> Self {
        Self {
            id,
            session,
            script,
            closed: false,
        }
    }

    /// Runner identifier within its session.
    pub fn id(&self) -> RunnerId {
        self.id
    }

    /// The script being run.
    pub fn script(&self) -> &SqlScript {
        &self.script
    }

    /// Returns true once the runner has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Executes every statement and returns the total of affected rows.
    pub fn run(&mut self) -> Result<u64> {
        if self.closed {
            return Err(DbError::RunnerClosed);
        }
        self.session.ensure_open()?;
        let mut total = 0;
        for (index, text) in self.script.statements().iter().enumerate() {
            let mut seance = self.session.open_seance()?;
            let outcome = run_statement(seance.as_mut(), text);
            seance.close();
            match outcome {
                Ok(affected) => total += affected,
                Err(err) => {
                    warn!(runner = %self.id, statement = index, error = %err, "script stopped");
                    return Err(err);
                }
            }
        }
        debug!(
            runner = %self.id,
            statements = self.script.len(),
            affected = total,
            "script executed"
        );
        Ok(total)
    }

    /// Leaves the session's registry.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.session.runner_closed(self.id);
    }
}

fn run_statement(seance: &mut dyn InterSeance, text: &str) -> Result<u64> {
    seance.prepare(InterTask::new(TaskKind::Command, text))?;
    seance.execute()?;
    Ok(seance.affected_rows())
}

impl Drop for ScriptRunner {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ScriptRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("id", &self.id)
            .field("statements", &self.script.len())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_semicolons() {
        let script = SqlScript::parse("create table X;\n drop table X");
        assert_eq!(script.statements(), ["create table X", "drop table X"]);
    }

    #[test]
    fn parse_drops_comment_lines_but_keeps_hints() {
        let script = SqlScript::parse("-- a single line comment \ndo something");
        assert_eq!(script.statements(), ["do something"]);

        let script = SqlScript::parse("select --+index(i) \n      all fields   \nfrom my_table\n");
        assert_eq!(script.len(), 1);
        assert!(script.statements()[0].contains("--+index(i)"));
    }

    #[test]
    fn parse_ignores_semicolons_inside_literals() {
        let script = SqlScript::parse("insert into t values ('a;b');;\n;select 1");
        assert_eq!(script.statements(), ["insert into t values ('a;b')", "select 1"]);
    }

    #[test]
    fn blank_statements_are_skipped() {
        let script = SqlScript::new(["  ", "select 1", ""]);
        assert_eq!(script.len(), 1);
        assert!(SqlScript::parse(" ;\n ; ").is_empty());
    }
}
