//! Matcher tests - full scan and through-cell scan, plus their agreement
//! on arbitrary grids.

use proptest::prelude::*;

use tile_swap::core::{find_matches, find_matches_through, find_runs, Grid, MatchSet};
use tile_swap::types::{Coord, TokenId};

fn coords(cells: &[(u8, u8)]) -> MatchSet {
    cells.iter().map(|&(x, y)| Coord::new(x, y)).collect()
}

#[test]
fn test_horizontal_and_vertical_runs() {
    let grid = Grid::from_letters(&[
        "AAAB", //
        "BCDB", //
        "CDEB", //
        "DEAC",
    ])
    .unwrap();

    let found = find_matches(&grid);
    assert_eq!(
        found,
        coords(&[(0, 0), (1, 0), (2, 0), (3, 0), (3, 1), (3, 2)])
    );
    assert_eq!(find_runs(&grid).len(), 2);
}

#[test]
fn test_run_longer_than_three_is_one_run() {
    let grid = Grid::from_letters(&["BBBBB", "ACACA"]).unwrap();
    let runs = find_runs(&grid);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].len, 5);
    assert_eq!(runs[0].token, TokenId(1));
}

#[test]
fn test_cross_shape_through_pivot() {
    // The pivot (2, 2) completes both a row and a column of C.
    let grid = Grid::from_letters(&[
        "ABCDE", //
        "BDCEA", //
        "CCACC", //
        "DECAB", //
        "EACBD",
    ])
    .unwrap();

    let through = find_matches_through(&grid, Coord::new(2, 2), TokenId(2)).unwrap();
    assert_eq!(through.len(), 9);
    assert!(through.contains(Coord::new(0, 2)));
    assert!(through.contains(Coord::new(2, 0)));
    assert!(through.contains(Coord::new(2, 4)));
}

#[test]
fn test_through_cell_requires_pivot_in_run() {
    let grid = Grid::from_letters(&["AAAB", "CDBD"]).unwrap();
    // (3, 0) is next to the run but not part of it with its own token.
    let through = find_matches_through(&grid, Coord::new(3, 0), TokenId(1)).unwrap();
    assert!(through.is_empty());
    assert!(find_matches_through(&grid, Coord::new(4, 0), TokenId(0)).is_err());
}

fn grid_strategy() -> impl Strategy<Value = Grid> {
    (3usize..=8, 3usize..=8, 2u8..=5).prop_flat_map(|(w, h, kinds)| {
        proptest::collection::vec(proptest::collection::vec(0..kinds, w), h)
            .prop_map(|rows| Grid::from_rows(&rows).unwrap())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn through_scan_agrees_with_full_scan(grid in grid_strategy()) {
        let full = find_matches(&grid);
        for at in grid.coords() {
            let token = grid.get(at).unwrap();
            let through = find_matches_through(&grid, at, token).unwrap();

            prop_assert_eq!(full.contains(at), !through.is_empty());
            if !through.is_empty() {
                prop_assert!(through.contains(at));
            }
            for cell in &through {
                prop_assert!(full.contains(cell), "{} missing from full scan", cell);
            }
        }
    }

    #[test]
    fn full_scan_is_union_of_match_runs(grid in grid_strategy()) {
        let mut expected = MatchSet::new();
        for run in find_runs(&grid) {
            prop_assert!(run.is_match());
            expected.add_run(&run);
        }
        prop_assert_eq!(find_matches(&grid), expected);
    }
}
