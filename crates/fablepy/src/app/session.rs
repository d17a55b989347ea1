//! Session-scoped import cache.

use std::collections::HashSet;

/// Import statements already sent to the execution backend during this session.
///
/// Lives as long as the host session (one `fablepy` process) and is only cleared
/// by [`ImportSession::reset`]. Nothing here is written to disk.
#[derive(Debug, Default, Clone)]
pub struct ImportSession {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl ImportSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, import: &str) -> bool {
        self.seen.contains(import)
    }

    /// Cached imports in the order they were first sent.
    pub fn imports(&self) -> &[String] {
        &self.order
    }

    /// Keep the lines that are real imports and have not been sent yet.
    ///
    /// Comment lines are dropped, and a line repeated inside `candidates` is kept
    /// once.
    pub fn novel<'a, I>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut picked: Vec<String> = Vec::new();
        for line in candidates {
            if line.starts_with('#') || self.contains(line) {
                continue;
            }
            if picked.iter().any(|existing| existing == line) {
                continue;
            }
            picked.push(line.to_owned());
        }
        picked
    }

    /// Record imports that reached the backend. Returns how many were new.
    pub fn record<I, S>(&mut self, imports: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.order.len();
        for import in imports {
            let import = import.into();
            if self.seen.insert(import.clone()) {
                self.order.push(import);
            }
        }
        self.order.len() - before
    }

    /// Forget every cached import. Returns how many were dropped.
    pub fn reset(&mut self) -> usize {
        let dropped = self.order.len();
        self.order.clear();
        self.seen.clear();
        dropped
    }
}
