//! Match finder - line-run detection
//!
//! One primitive drives both entry points: [`run_through`] walks outward from
//! a pivot along one axis and measures the contiguous run of a token.
//!
//! - [`find_matches`] scans every row and column once and keeps every run of
//!   at least [`MIN_RUN`] cells. It runs after every structural change.
//! - [`find_matches_through`] only looks at the two lines crossing one cell.
//!   It is the cheap check on the swap path and must agree with the full scan
//!   for that cell.

use std::collections::{BTreeMap, BTreeSet};

use arrayvec::ArrayVec;

use crate::error::Result;
use crate::grid::Grid;
use crate::types::{Coord, TokenId, MIN_RUN};

/// Scan direction of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Along a row (x varies)
    Horizontal,
    /// Along a column (y varies)
    Vertical,
}

impl Axis {
    fn step(self, at: Coord, forward: bool, grid: &Grid) -> Option<Coord> {
        match (self, forward) {
            (Axis::Horizontal, true) if at.x + 1 < grid.width() => Some(Coord::new(at.x + 1, at.y)),
            (Axis::Horizontal, false) if at.x > 0 => Some(Coord::new(at.x - 1, at.y)),
            (Axis::Vertical, true) if at.y + 1 < grid.height() => Some(Coord::new(at.x, at.y + 1)),
            (Axis::Vertical, false) if at.y > 0 => Some(Coord::new(at.x, at.y - 1)),
            _ => None,
        }
    }
}

/// A maximal run of equal tokens along one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Run {
    pub axis: Axis,
    /// Left-most (horizontal) or top-most (vertical) cell
    pub start: Coord,
    pub len: u8,
    pub token: TokenId,
}

impl Run {
    pub fn cells(&self) -> impl Iterator<Item = Coord> {
        let Run { axis, start, .. } = *self;
        (0..self.len).map(move |i| match axis {
            Axis::Horizontal => Coord::new(start.x + i, start.y),
            Axis::Vertical => Coord::new(start.x, start.y + i),
        })
    }

    pub fn contains(&self, at: Coord) -> bool {
        match self.axis {
            Axis::Horizontal => {
                at.y == self.start.y && at.x >= self.start.x && at.x < self.start.x + self.len
            }
            Axis::Vertical => {
                at.x == self.start.x && at.y >= self.start.y && at.y < self.start.y + self.len
            }
        }
    }

    pub fn is_match(&self) -> bool {
        self.len as usize >= MIN_RUN
    }
}

/// Deduplicated set of matched cells from one scan
///
/// Iteration is row-major (top row first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSet {
    cells: BTreeSet<Coord>,
}

impl MatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, at: Coord) -> bool {
        self.cells.contains(&at)
    }

    pub fn insert(&mut self, at: Coord) -> bool {
        self.cells.insert(at)
    }

    pub fn add_run(&mut self, run: &Run) {
        self.cells.extend(run.cells());
    }

    pub fn union(&mut self, other: &MatchSet) {
        self.cells.extend(other.cells.iter().copied());
    }

    pub fn iter(&self) -> impl Iterator<Item = Coord> + '_ {
        self.cells.iter().copied()
    }

    /// Matched cells grouped by column, each column top to bottom
    pub fn by_column(&self) -> BTreeMap<u8, Vec<Coord>> {
        let mut columns: BTreeMap<u8, Vec<Coord>> = BTreeMap::new();
        for at in &self.cells {
            columns.entry(at.x).or_default().push(*at);
        }
        columns
    }
}

impl FromIterator<Coord> for MatchSet {
    fn from_iter<I: IntoIterator<Item = Coord>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MatchSet {
    type Item = Coord;
    type IntoIter = std::iter::Copied<std::collections::btree_set::Iter<'a, Coord>>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter().copied()
    }
}

/// Measure the run of `token` through `pivot` along `axis`.
///
/// The pivot is treated as holding `token` whatever the grid stores there,
/// which lets the swap path ask "what if" without mutating. Walking stops at
/// the first mismatch or the grid edge in each direction.
pub fn run_through(grid: &Grid, pivot: Coord, token: TokenId, axis: Axis) -> Run {
    let mut start = pivot;
    let mut len: u8 = 1;

    let mut cursor = pivot;
    while let Some(next) = axis.step(cursor, false, grid) {
        if grid.at(next.x, next.y) != token {
            break;
        }
        start = next;
        len += 1;
        cursor = next;
    }

    let mut cursor = pivot;
    while let Some(next) = axis.step(cursor, true, grid) {
        if grid.at(next.x, next.y) != token {
            break;
        }
        len += 1;
        cursor = next;
    }

    Run {
        axis,
        start,
        len,
        token,
    }
}

/// Every maximal run of at least `MIN_RUN` cells, rows first then columns.
pub fn find_runs(grid: &Grid) -> Vec<Run> {
    let mut runs = Vec::new();

    for y in 0..grid.height() {
        let mut x = 0;
        while x < grid.width() {
            let at = Coord::new(x, y);
            let run = run_through(grid, at, grid.at(x, y), Axis::Horizontal);
            if run.is_match() {
                runs.push(run);
            }
            x += run.len;
        }
    }

    for x in 0..grid.width() {
        let mut y = 0;
        while y < grid.height() {
            let at = Coord::new(x, y);
            let run = run_through(grid, at, grid.at(x, y), Axis::Vertical);
            if run.is_match() {
                runs.push(run);
            }
            y += run.len;
        }
    }

    runs
}

/// Full-board scan: union of all cells in runs of at least `MIN_RUN`.
pub fn find_matches(grid: &Grid) -> MatchSet {
    let mut set = MatchSet::new();
    for run in find_runs(grid) {
        set.add_run(&run);
    }
    set
}

/// Localized scan of the row and column crossing `cell`, as if it held `token`.
///
/// Each axis counts only when the cells beyond the pivot number at least
/// `MIN_RUN - 1`. The pivot is included when at least one axis counts, so the
/// result is either empty or holds at least `MIN_RUN` cells.
pub fn find_matches_through(grid: &Grid, cell: Coord, token: TokenId) -> Result<MatchSet> {
    grid.ensure_contains(cell)?;

    let runs: ArrayVec<Run, 2> = [Axis::Horizontal, Axis::Vertical]
        .into_iter()
        .map(|axis| run_through(grid, cell, token, axis))
        .filter(|run| {
            let beyond_pivot = run.len as usize - 1;
            beyond_pivot >= MIN_RUN - 1
        })
        .collect();

    let mut set = MatchSet::new();
    for run in &runs {
        set.add_run(run);
    }
    Ok(set)
}
