use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Identifier of a runner within its session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunnerId(u64);

impl RunnerId {
    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runner#{}", self.0)
    }
}

/// Kind of an open runner.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunnerKind {
    /// Query runner.
    Query,
    /// Command runner.
    Command,
    /// Script runner.
    Script,
}

/// What the session remembers about an open runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerEntry {
    /// Runner kind.
    pub kind: RunnerKind,
    /// Statement text, or the first statement of a script.
    pub text: String,
}

/// Open-runner set shared by a session and its runners.
///
/// Runners register when created and unregister when closed or dropped, from
/// whatever thread they live on.
#[derive(Clone, Default)]
pub(crate) struct RunnerRegistry {
    next_id: Arc<AtomicU64>,
    entries: Arc<Mutex<BTreeMap<RunnerId, RunnerEntry>>>,
}

impl RunnerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, kind: RunnerKind, text: &str) -> RunnerId {
        let id = RunnerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.entries.lock().insert(
            id,
            RunnerEntry {
                kind,
                text: text.to_string(),
            },
        );
        id
    }

    /// Returns true when the runner was still registered.
    pub(crate) fn unregister(&self, id: RunnerId) -> bool {
        self.entries.lock().remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn snapshot(&self) -> Vec<(RunnerId, RunnerEntry)> {
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect()
    }

    /// Forgets every runner, returning how many were still open.
    pub(crate) fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        count
    }
}

impl fmt::Debug for RunnerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerRegistry")
            .field("open", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn concurrent_registration_keeps_ids_unique() {
        let registry = RunnerRegistry::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let registry = registry.clone();
                thread::spawn(move || {
                    (0..50)
                        .map(|i| registry.register(RunnerKind::Query, &format!("q{t}-{i}")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids: Vec<RunnerId> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 200);
        assert_eq!(registry.len(), 200);

        assert!(registry.unregister(ids[0]));
        assert!(!registry.unregister(ids[0]));
        assert_eq!(registry.clear(), 199);
        assert_eq!(registry.len(), 0);
    }
}
