use log::debug;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleKind {
    Output,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleEntry {
    pub kind: ConsoleKind,
    pub text: String,
}

impl fmt::Display for ConsoleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConsoleKind::Output => write!(f, "{}", self.text),
            ConsoleKind::Error => write!(f, "error: {}", self.text),
        }
    }
}

/// Captured output of the most recent run. Oldest entries fall off once
/// `capacity` is reached.
#[derive(Debug, Clone)]
pub struct Console {
    entries: VecDeque<ConsoleEntry>,
    capacity: usize,
    dropped: usize,
}

impl Console {
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::new(), capacity: capacity.max(1), dropped: 0 }
    }

    pub(crate) fn push(&mut self, kind: ConsoleKind, text: impl Into<String>) {
        self.entries.push_back(ConsoleEntry { kind, text: text.into() });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            if self.dropped == 0 {
                debug!("[console] over {} entries, dropping oldest output", self.capacity);
            }
            self.dropped += 1;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }

    /// Entries trimmed from the front since the last clear.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl ExactSizeIterator<Item = &ConsoleEntry> {
        self.entries.iter()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.text.as_str()).collect()
    }

    pub fn last(&self) -> Option<&ConsoleEntry> {
        self.entries.back()
    }
}
