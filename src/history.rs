//! A bounded undo/redo record of [`PeakSet`](crate::peak_set::PeakSet) states.
use std::collections::VecDeque;

use crate::peak_set::PeakSetSnapshot;

/// The number of states kept by default
pub const DEFAULT_HISTORY_DEPTH: usize = 15;

/// A linear history of snapshots with a cursor marking the current state.
///
/// Recording a new state after undoing discards the states that could have been
/// redone. When full, the oldest state is forgotten.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<PeakSetSnapshot>,
    cursor: usize,
    depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH, PeakSetSnapshot::default())
    }
}

impl History {
    /// Create a history starting from `initial`, holding at most `depth` states
    pub fn new(depth: usize, initial: PeakSetSnapshot) -> Self {
        let depth = depth.max(1);
        let mut entries = VecDeque::with_capacity(depth);
        entries.push_back(initial);
        Self {
            entries,
            cursor: 0,
            depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current(&self) -> &PeakSetSnapshot {
        &self.entries[self.cursor]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Record `snapshot` as the new current state. Returns `false` without
    /// recording anything if it equals the current state.
    pub fn record(&mut self, snapshot: PeakSetSnapshot) -> bool {
        if *self.current() == snapshot {
            return false;
        }
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(snapshot);
        if self.entries.len() > self.depth {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
        true
    }

    /// Step back one state, returning the state to restore
    pub fn undo(&mut self) -> Option<&PeakSetSnapshot> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    /// Step forward one state, returning the state to restore
    pub fn redo(&mut self) -> Option<&PeakSetSnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peak_set::PeakSet;

    fn states(n: usize) -> (PeakSet, Vec<PeakSetSnapshot>) {
        let mut peaks = PeakSet::new();
        let mut snapshots = vec![peaks.snapshot()];
        for i in 0..n {
            peaks.add_seeded(i as f64, 1.0, 1.0).unwrap();
            snapshots.push(peaks.snapshot());
        }
        (peaks, snapshots)
    }

    #[test]
    fn test_undo_redo() {
        let (_, snapshots) = states(3);
        let mut history = History::new(15, snapshots[0].clone());
        for s in snapshots[1..].iter() {
            assert!(history.record(s.clone()));
        }
        assert!(!history.record(snapshots[3].clone()));
        assert_eq!(history.undo(), Some(&snapshots[2]));
        assert_eq!(history.undo(), Some(&snapshots[1]));
        assert_eq!(history.redo(), Some(&snapshots[2]));
        assert_eq!(history.undo(), Some(&snapshots[1]));
        assert_eq!(history.undo(), Some(&snapshots[0]));
        assert_eq!(history.undo(), None);

        // a new state discards the redo branch
        history.record(snapshots[3].clone());
        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_bounded() {
        let (_, snapshots) = states(10);
        let mut history = History::new(4, snapshots[0].clone());
        for s in snapshots[1..].iter() {
            history.record(s.clone());
        }
        assert_eq!(history.len(), 4);
        let mut undone = 0;
        while history.undo().is_some() {
            undone += 1;
        }
        assert_eq!(undone, 3);
        assert_eq!(history.current(), &snapshots[7]);
    }
}
