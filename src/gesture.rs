use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{CellAssignment, CellKey, GridData};

/// Provisional marking of a visited cell while a gesture is in flight.
/// Marks drive the preview rendering only; the commit re-resolves every
/// cell against the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Fill,
    Clear,
}

/// A pointer-down-drag-pointer-up gesture that bulk-fills or bulk-clears
/// cells with the anchor cell's task. `None` at the call site is the idle
/// state; an owned `FillGesture` is the gesturing state.
#[derive(Debug, Clone)]
pub struct FillGesture {
    anchor: CellKey,
    anchor_assignment: CellAssignment,
    visited: BTreeSet<CellKey>,
    marks: BTreeMap<CellKey, Mark>,
}

impl FillGesture {
    /// Arms a gesture. Only a cell that already holds an assignment can
    /// anchor one; pressing on an empty cell stays idle.
    pub fn begin(grid: &GridData, anchor: CellKey) -> Option<Self> {
        let anchor_assignment = grid.lookup(&anchor)?.clone();
        let mut visited = BTreeSet::new();
        visited.insert(anchor.clone());
        Some(Self {
            anchor,
            anchor_assignment,
            visited,
            marks: BTreeMap::new(),
        })
    }

    pub fn anchor(&self) -> &CellKey {
        &self.anchor
    }

    pub fn task_name(&self) -> &str {
        &self.anchor_assignment.task_name
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// A gesture that never left its anchor is a click, not a drag; the
    /// commit skips it and the caller opens the cell detail instead.
    pub fn is_click(&self) -> bool {
        self.visited.len() <= 1
    }

    /// Records the pointer entering `key`. The anchor and already-visited
    /// cells are no-ops; anything else is classified once: same task as the
    /// anchor marks for clearing, empty or different task marks for filling.
    pub fn enter(&mut self, grid: &GridData, key: CellKey) -> Option<Mark> {
        if key == self.anchor || self.visited.contains(&key) {
            return None;
        }

        let mark = match grid.lookup(&key) {
            Some(existing) if existing.task_id == self.anchor_assignment.task_id => Mark::Clear,
            _ => Mark::Fill,
        };
        self.visited.insert(key.clone());
        self.marks.insert(key, mark);
        Some(mark)
    }

    pub fn mark(&self, key: &CellKey) -> Option<Mark> {
        self.marks.get(key).copied()
    }

    /// Commits the gesture. Every visited cell except the anchor is
    /// re-resolved against the grid's current state, not the state cached at
    /// enter time: same task clears (toggle-undo), empty fills, a different
    /// task is overwritten. The filled copy never carries the anchor's note.
    /// Returns whether the grid changed.
    pub fn finish(self, grid: &mut GridData) -> bool {
        if self.is_click() {
            return false;
        }

        let mut modified = false;
        for key in self.visited {
            if key == self.anchor {
                continue;
            }

            match grid.lookup(&key) {
                Some(existing) if existing.task_id == self.anchor_assignment.task_id => {
                    grid.clear(&key);
                }
                _ => {
                    grid.assign(key, self.anchor_assignment.copy_without_note());
                }
            }
            modified = true;
        }
        modified
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::{CellAssignment, CellKey, GridData};

    use super::{FillGesture, Mark};

    fn key(hour: u32) -> CellKey {
        let date = NaiveDate::from_ymd_opt(2025, 10, 23).expect("date should be valid");
        CellKey::new(date, hour)
    }

    fn assignment(task_id: i64, task_name: &str) -> CellAssignment {
        CellAssignment {
            task_id,
            task_name: task_name.to_string(),
            note: String::new(),
        }
    }

    #[test]
    fn does_not_start_on_an_empty_cell() {
        let grid = GridData::new();
        assert!(FillGesture::begin(&grid, key(9)).is_none());
    }

    #[test]
    fn fills_empty_cells_and_overwrites_different_tasks() {
        let mut grid = GridData::new();
        grid.assign(key(9), assignment(1, "Read"));
        grid.assign(key(11), assignment(2, "Chores"));

        let mut gesture = FillGesture::begin(&grid, key(9)).expect("anchor is assigned");
        assert_eq!(gesture.enter(&grid, key(10)), Some(Mark::Fill));
        assert_eq!(gesture.enter(&grid, key(11)), Some(Mark::Fill));
        assert!(gesture.finish(&mut grid));

        assert_eq!(grid.lookup(&key(10)), Some(&assignment(1, "Read")));
        assert_eq!(grid.lookup(&key(11)), Some(&assignment(1, "Read")));
    }

    #[test]
    fn clears_cells_already_holding_the_anchor_task() {
        let mut grid = GridData::new();
        grid.assign(key(9), assignment(1, "Read"));
        grid.assign(key(10), assignment(1, "Read"));

        let mut gesture = FillGesture::begin(&grid, key(9)).expect("anchor is assigned");
        assert_eq!(gesture.enter(&grid, key(10)), Some(Mark::Clear));
        assert!(gesture.finish(&mut grid));

        assert!(grid.lookup(&key(10)).is_none());
        assert_eq!(grid.lookup(&key(9)), Some(&assignment(1, "Read")));
    }

    #[test]
    fn click_without_drag_never_mutates_the_grid() {
        let mut grid = GridData::new();
        grid.assign(key(9), assignment(1, "Read"));
        let before = grid.clone();

        let gesture = FillGesture::begin(&grid, key(9)).expect("anchor is assigned");
        assert!(gesture.is_click());
        assert!(!gesture.finish(&mut grid));
        assert_eq!(grid.len(), before.len());
        assert_eq!(grid.lookup(&key(9)), before.lookup(&key(9)));
    }

    #[test]
    fn commit_never_alters_the_anchor() {
        let mut grid = GridData::new();
        let mut anchor = assignment(1, "Read");
        anchor.note = "keep me".to_string();
        grid.assign(key(9), anchor.clone());

        let mut gesture = FillGesture::begin(&grid, key(9)).expect("anchor is assigned");
        gesture.enter(&grid, key(10));
        gesture.enter(&grid, key(11));
        assert!(gesture.finish(&mut grid));

        assert_eq!(grid.lookup(&key(9)), Some(&anchor));
    }

    #[test]
    fn filled_copies_never_carry_the_anchor_note() {
        let mut grid = GridData::new();
        let mut anchor = assignment(1, "Read");
        anchor.note = "chapter 4".to_string();
        grid.assign(key(9), anchor);

        let mut gesture = FillGesture::begin(&grid, key(9)).expect("anchor is assigned");
        gesture.enter(&grid, key(10));
        assert!(gesture.finish(&mut grid));

        assert_eq!(grid.lookup(&key(10)), Some(&assignment(1, "Read")));
    }

    #[test]
    fn revisiting_a_cell_keeps_the_first_classification() {
        let mut grid = GridData::new();
        grid.assign(key(9), assignment(1, "Read"));

        let mut gesture = FillGesture::begin(&grid, key(9)).expect("anchor is assigned");
        assert_eq!(gesture.enter(&grid, key(10)), Some(Mark::Fill));
        assert_eq!(gesture.enter(&grid, key(10)), None);
        assert_eq!(gesture.enter(&grid, key(9)), None);
        assert_eq!(gesture.visited_count(), 2);
    }

    #[test]
    fn fill_then_fill_again_round_trips_to_empty() {
        let mut grid = GridData::new();
        grid.assign(key(9), assignment(1, "Read"));

        let mut first = FillGesture::begin(&grid, key(9)).expect("anchor is assigned");
        first.enter(&grid, key(10));
        first.enter(&grid, key(11));
        assert!(first.finish(&mut grid));
        assert_eq!(grid.len(), 3);

        let mut second = FillGesture::begin(&grid, key(9)).expect("anchor is assigned");
        assert_eq!(second.enter(&grid, key(10)), Some(Mark::Clear));
        assert_eq!(second.enter(&grid, key(11)), Some(Mark::Clear));
        assert!(second.finish(&mut grid));

        assert_eq!(grid.len(), 1);
        assert!(grid.lookup(&key(10)).is_none());
        assert!(grid.lookup(&key(11)).is_none());
    }

    #[test]
    fn commit_resolves_against_current_state_not_enter_time() {
        let mut grid = GridData::new();
        grid.assign(key(9), assignment(1, "Read"));

        let mut gesture = FillGesture::begin(&grid, key(9)).expect("anchor is assigned");
        assert_eq!(gesture.enter(&grid, key(10)), Some(Mark::Fill));

        // The cell gains the anchor task between enter and commit; the
        // commit must see the fresh state and clear it.
        grid.assign(key(10), assignment(1, "Read"));
        assert!(gesture.finish(&mut grid));
        assert!(grid.lookup(&key(10)).is_none());
    }
}
