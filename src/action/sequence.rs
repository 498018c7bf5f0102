//! Ordered action queue with a persistent index and bounded history
//!
//! Executed entries stay in the vector before `index` so recent history can
//! be inspected; anything past [`HISTORY_MAX`] executed entries is dropped.

use super::Action;
use crate::graph::TransitionId;

/// Executed entries kept for inspection
pub const HISTORY_MAX: usize = 20;

/// Why an entry was queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Part of a transition's action list
    Transition(TransitionId),
    /// Work handed out by the manor's behaviour
    Task,
    /// Recovery queued by interception or a restart
    Correction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub action: Action,
    pub origin: Origin,
}

impl Entry {
    pub fn new(action: Action, origin: Origin) -> Self {
        Self { action, origin }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionSequence {
    entries: Vec<Entry>,
    index: usize,
}

impl ActionSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the end
    pub fn push(&mut self, action: Action, origin: Origin) {
        self.entries.push(Entry::new(action, origin));
    }

    pub fn push_all(&mut self, actions: Vec<Action>, origin: Origin) {
        self.entries
            .extend(actions.into_iter().map(|a| Entry::new(a, origin)));
    }

    /// Insert right before the next entry, keeping the given order
    pub fn push_front(&mut self, entries: Vec<Entry>) {
        let at = self.index;
        self.entries.splice(at..at, entries);
    }

    pub fn push_front_actions(&mut self, actions: Vec<Action>, origin: Origin) {
        self.push_front(actions.into_iter().map(|a| Entry::new(a, origin)).collect());
    }

    /// Take the next entry and advance
    pub fn next(&mut self) -> Option<Entry> {
        let entry = self.entries.get(self.index)?.clone();
        self.index += 1;
        self.trim_history();
        Some(entry)
    }

    pub fn peek(&self) -> Option<&Entry> {
        self.entries.get(self.index)
    }

    pub fn is_end(&self) -> bool {
        self.index >= self.entries.len()
    }

    /// Step the index back by `n`
    pub fn rewind(&mut self, n: usize) {
        self.index = self.index.saturating_sub(n);
    }

    /// Step over `n` entries without executing them
    pub fn skip(&mut self, n: usize) {
        self.index = (self.index + n).min(self.entries.len());
        self.trim_history();
    }

    /// Drop pending entries, keep history
    pub fn clear(&mut self) {
        self.entries.truncate(self.index);
    }

    /// Drop pending entries queued with `origin`
    ///
    /// Returns how many were removed.
    pub fn discard_origin(&mut self, origin: Origin) -> usize {
        let before = self.entries.len();
        let mut position = 0;
        let index = self.index;
        self.entries.retain(|e| {
            let keep = position < index || e.origin != origin;
            position += 1;
            keep
        });
        before - self.entries.len()
    }

    pub fn remaining(&self) -> usize {
        self.entries.len().saturating_sub(self.index)
    }

    /// Pending entries, next first
    pub fn pending(&self) -> &[Entry] {
        &self.entries[self.index.min(self.entries.len())..]
    }

    /// Executed entries, oldest first
    pub fn history(&self) -> &[Entry] {
        let start = self.index.saturating_sub(HISTORY_MAX);
        &self.entries[start..self.index]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn trim_history(&mut self) {
        if self.index > HISTORY_MAX {
            let surplus = self.index - HISTORY_MAX;
            self.entries.drain(..surplus);
            self.index = HISTORY_MAX;
        }
    }
}
