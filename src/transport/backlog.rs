//! Deferred command lines.
//!
//! While a topic is inspected, restricted commands are queued here instead
//! of executed. Replay order is a stable partition: every entry whose
//! command token starts with `list` goes after every other entry, and each
//! group keeps its submission order. A queued `send` is therefore visible
//! to a queued `listall` from the same connection.

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Backlog {
    entries: Vec<String>,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    /// Take every entry in replay order, leaving the backlog empty.
    pub fn drain_ordered(&mut self) -> Vec<String> {
        let (mut ordered, listings): (Vec<String>, Vec<String>) =
            self.entries.drain(..).partition(|line| !is_list_class(line));
        ordered.extend(listings);
        ordered
    }
}

/// `list`, `listall` and anything else whose command token starts with `list`.
pub fn is_list_class(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|token| token.to_lowercase().starts_with("list"))
}
