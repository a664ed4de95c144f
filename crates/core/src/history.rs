//! Undo/redo over whole-surface snapshots
//!
//! The manager tracks the state after the most recent commit (`current`).
//! Recording a new post-commit state pushes the previous one, i.e. the
//! pre-mutation state, onto the undo stack and clears redo.

use std::collections::VecDeque;

/// Opaque serialized capture of the live surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(String);

impl Snapshot {
    pub fn new(encoded: String) -> Self {
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Bounded undo/redo stacks
#[derive(Debug)]
pub struct HistoryManager {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    current: Option<Snapshot>,
    limit: usize,
    restoring: bool,
}

impl HistoryManager {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            current: None,
            limit: limit.max(1),
            restoring: false,
        }
    }

    /// Start over from `baseline`, dropping both stacks
    pub fn reset(&mut self, baseline: Snapshot) {
        self.undo.clear();
        self.redo.clear();
        self.current = Some(baseline);
        self.restoring = false;
    }

    /// Drop all history until the next [`reset`](Self::reset)
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.current = None;
    }

    /// Record the state after a commit
    ///
    /// Ignored while a restore is in progress or when nothing changed.
    /// Returns whether an undo entry was pushed.
    pub fn record(&mut self, state: Snapshot) -> bool {
        if self.restoring {
            tracing::debug!("history capture suppressed during restore");
            return false;
        }
        if self.current.as_ref() == Some(&state) {
            return false;
        }

        let pushed = match self.current.replace(state) {
            Some(previous) => {
                self.undo.push_back(previous);
                if self.undo.len() > self.limit {
                    self.undo.pop_front();
                }
                true
            }
            None => false,
        };
        self.redo.clear();
        tracing::debug!(undo = self.undo.len(), "history recorded");
        pushed
    }

    /// Pop the undo stack; the caller restores the returned state
    pub fn undo(&mut self) -> Option<Snapshot> {
        let target = self.undo.pop_back()?;
        if let Some(current) = self.current.replace(target.clone()) {
            self.redo.push(current);
        }
        Some(target)
    }

    /// Pop the redo stack; the caller restores the returned state
    pub fn redo(&mut self) -> Option<Snapshot> {
        let target = self.redo.pop()?;
        if let Some(current) = self.current.replace(target.clone()) {
            self.undo.push_back(current);
            if self.undo.len() > self.limit {
                self.undo.pop_front();
            }
        }
        Some(target)
    }

    /// Suppress [`record`](Self::record) until [`end_restore`](Self::end_restore)
    pub fn begin_restore(&mut self) {
        self.restoring = true;
    }

    pub fn end_restore(&mut self) {
        self.restoring = false;
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(n: usize) -> Snapshot {
        Snapshot::new(format!("state-{n}"))
    }

    fn seeded() -> HistoryManager {
        let mut history = HistoryManager::new(50);
        history.reset(snap(0));
        history
    }

    #[test]
    fn record_pushes_pre_mutation_state() {
        let mut history = seeded();
        assert!(history.record(snap(1)));
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.undo(), Some(snap(0)));
        assert_eq!(history.current(), Some(&snap(0)));
    }

    #[test]
    fn undo_then_redo_is_inverse() {
        let mut history = seeded();
        history.record(snap(1));

        assert_eq!(history.undo(), Some(snap(0)));
        assert_eq!(history.redo(), Some(snap(1)));
        assert_eq!(history.current(), Some(&snap(1)));
        assert!(history.redo().is_none());
    }

    #[test]
    fn new_record_clears_redo() {
        let mut history = seeded();
        history.record(snap(1));
        history.undo();
        assert!(history.can_redo());

        history.record(snap(2));
        assert!(!history.can_redo());
    }

    #[test]
    fn bound_evicts_oldest() {
        let mut history = seeded();
        for n in 1..=60 {
            history.record(snap(n));
        }
        assert_eq!(history.undo_len(), 50);

        let mut last = None;
        while let Some(state) = history.undo() {
            last = Some(state);
        }
        assert_eq!(last, Some(snap(10)));
    }

    #[test]
    fn restore_suppresses_recording() {
        let mut history = seeded();
        history.begin_restore();
        assert!(!history.record(snap(1)));
        history.end_restore();
        assert!(history.record(snap(1)));
    }

    #[test]
    fn identical_state_is_not_recorded() {
        let mut history = seeded();
        assert!(!history.record(snap(0)));
        assert_eq!(history.undo_len(), 0);
    }

    #[test]
    fn empty_stacks_are_noops() {
        let mut history = HistoryManager::default();
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
    }
}
