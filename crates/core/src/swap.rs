//! Swap validator - try, detect, commit or roll back
//!
//! A swap is applied to the grid tentatively, checked with the localized
//! matcher around both cells, and undone with a second `Grid::swap` when no
//! run formed. Callers only ever observe the grid before the swap or after a
//! committed swap.

use tracing::debug;

use crate::error::{GridError, Result};
use crate::grid::Grid;
use crate::matcher::{find_matches_through, MatchSet};
use crate::types::Coord;

/// Result of a swap attempt between two adjacent cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The swap formed at least one run; the grid keeps the exchange
    Accepted(MatchSet),
    /// No run formed; the grid was restored
    Rejected,
}

impl SwapOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SwapOutcome::Accepted(_))
    }

    pub fn matches(&self) -> Option<&MatchSet> {
        match self {
            SwapOutcome::Accepted(set) => Some(set),
            SwapOutcome::Rejected => None,
        }
    }
}

/// Whether a swap between `from` and `to` may be attempted on a `width` x
/// `height` grid.
///
/// Pure function of the coordinates; it never inspects tokens.
pub fn can_swap(width: u8, height: u8, from: Coord, to: Coord) -> bool {
    from.x < width && from.y < height && to.x < width && to.y < height && from.is_adjacent(to)
}

/// Exchange `from` (the dragged cell) with `to` and keep the exchange only if
/// it forms a run through either cell.
pub fn try_swap(grid: &mut Grid, from: Coord, to: Coord) -> Result<SwapOutcome> {
    let dragged = grid.get(from)?;
    let other = grid.get(to)?;
    if !from.is_adjacent(to) {
        return Err(GridError::NotAdjacent { from, to });
    }

    grid.swap(from, to)?;

    // The dragged token now sits at `to`, the other one at `from`.
    let mut matches = find_matches_through(grid, to, dragged)?;
    matches.union(&find_matches_through(grid, from, other)?);

    if matches.len() < crate::types::MIN_RUN {
        grid.swap(from, to)?;
        debug!(%from, %to, "swap rejected");
        return Ok(SwapOutcome::Rejected);
    }

    debug!(%from, %to, matched = matches.len(), "swap accepted");
    Ok(SwapOutcome::Accepted(matches))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_swap_bounds_and_adjacency() {
        assert!(can_swap(8, 8, Coord::new(0, 0), Coord::new(1, 0)));
        assert!(can_swap(8, 8, Coord::new(7, 7), Coord::new(7, 6)));
        assert!(!can_swap(8, 8, Coord::new(7, 7), Coord::new(8, 7)));
        assert!(!can_swap(8, 8, Coord::new(0, 0), Coord::new(1, 1)));
        assert!(!can_swap(8, 8, Coord::new(3, 3), Coord::new(3, 3)));
    }

    #[test]
    fn test_rejected_swap_restores_grid() {
        let mut grid = Grid::from_letters(&["ABCD", "BCDA", "CDAB"]).unwrap();
        let before = grid.clone();
        let outcome = try_swap(&mut grid, Coord::new(0, 0), Coord::new(1, 0)).unwrap();
        assert_eq!(outcome, SwapOutcome::Rejected);
        assert_eq!(grid, before);
    }

    #[test]
    fn test_accepted_swap_keeps_exchange() {
        // Moving the A at (2, 1) up to (2, 0) completes AAA on row 0.
        let mut grid = Grid::from_letters(&["AABC", "BCAD", "CDBA"]).unwrap();
        let outcome = try_swap(&mut grid, Coord::new(2, 1), Coord::new(2, 0)).unwrap();
        let matches = outcome.matches().unwrap();
        assert_eq!(matches.len(), 3);
        assert!(matches.contains(Coord::new(2, 0)));
        assert_eq!(grid.to_string(), "AAAC\nBCBD\nCDBA\n");
    }

    #[test]
    fn test_other_cell_can_complete_the_run() {
        // Dragging the B at (0, 0) right moves the A from (1, 0) into column 0,
        // which completes the vertical AAA there.
        let mut grid = Grid::from_letters(&["BAC", "ACB", "ABC"]).unwrap();
        let outcome = try_swap(&mut grid, Coord::new(0, 0), Coord::new(1, 0)).unwrap();
        let matches = outcome.matches().unwrap();
        let cells: Vec<_> = matches.iter().collect();
        assert_eq!(
            cells,
            vec![Coord::new(0, 0), Coord::new(0, 1), Coord::new(0, 2)]
        );
    }

    #[test]
    fn test_not_adjacent_is_an_error() {
        let mut grid = Grid::from_letters(&["ABC", "BCA", "CAB"]).unwrap();
        let before = grid.clone();
        let err = try_swap(&mut grid, Coord::new(0, 0), Coord::new(1, 1)).unwrap_err();
        assert!(matches!(err, GridError::NotAdjacent { .. }));
        assert_eq!(grid, before);
    }

    #[test]
    fn test_out_of_bounds_is_an_error() {
        let mut grid = Grid::from_letters(&["ABC", "BCA", "CAB"]).unwrap();
        let err = try_swap(&mut grid, Coord::new(2, 2), Coord::new(3, 2)).unwrap_err();
        assert!(matches!(err, GridError::OutOfBounds { .. }));
    }
}
