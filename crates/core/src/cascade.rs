//! Cascade resolver - remove, compact, refill, rescan
//!
//! One pass removes a match set, lets the surviving tokens of each affected
//! column fall (stable, bottom-up two-pointer compaction), and refills the
//! vacated top cells with independent random draws. [`resolve`] repeats
//! passes until the full-board scan comes back empty.
//!
//! Refills use no exclusion rule, unlike the initial fill. A refill may form
//! new runs, which the next pass picks up.

use tracing::debug;

use crate::error::Result;
use crate::grid::Grid;
use crate::matcher::{find_matches, MatchSet};
use crate::rng::SimpleRng;
use crate::types::{Coord, FallId, GridEvent, TokenId};

/// Monotonic source of fall animation ids
#[derive(Debug, Clone, Default)]
pub struct FallIds {
    next: u64,
}

impl FallIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> FallId {
        self.next += 1;
        FallId(self.next)
    }
}

/// Reward fact for one column of one pass
///
/// Every affected column reports the whole pass: `count` is the number of
/// cells the pass removed, not just the ones from this column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reward {
    pub column: u8,
    /// Token of the column's top-most matched cell
    pub token: TokenId,
    /// Cells removed by the whole pass
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMove {
    pub from: Coord,
    pub to: Coord,
    pub token: TokenId,
    pub fall: FallId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpawn {
    pub at: Coord,
    pub token: TokenId,
    pub fall: FallId,
}

/// Everything one pass did to the grid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadePass {
    pub removed: MatchSet,
    pub rewards: Vec<Reward>,
    pub moves: Vec<TokenMove>,
    pub spawns: Vec<TokenSpawn>,
}

impl CascadePass {
    /// Fall animations started by this pass
    pub fn falls(&self) -> impl Iterator<Item = FallId> + '_ {
        self.moves
            .iter()
            .map(|m| m.fall)
            .chain(self.spawns.iter().map(|s| s.fall))
    }

    /// Events in emission order: rewards, moves, spawns, then one
    /// `CellChanged` per rewritten cell.
    pub fn events(&self) -> Vec<GridEvent> {
        let mut events =
            Vec::with_capacity(self.rewards.len() + 2 * (self.moves.len() + self.spawns.len()));

        events.extend(self.rewards.iter().map(|r| GridEvent::TokensMatched {
            token: r.token,
            count: r.count,
        }));
        events.extend(self.moves.iter().map(|m| GridEvent::TokenMoved {
            from: m.from,
            to: m.to,
            token: m.token,
            fall: m.fall,
        }));
        events.extend(self.spawns.iter().map(|s| GridEvent::TokenSpawned {
            at: s.at,
            token: s.token,
            fall: s.fall,
        }));
        events.extend(
            self.moves
                .iter()
                .map(|m| GridEvent::CellChanged {
                    at: m.to,
                    token: m.token,
                })
                .chain(self.spawns.iter().map(|s| GridEvent::CellChanged {
                    at: s.at,
                    token: s.token,
                })),
        );
        events
    }
}

/// Outcome of a full resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    pub passes: Vec<CascadePass>,
    /// Set once the final rescan found nothing
    pub settled: bool,
}

impl ResolutionReport {
    pub fn rewards(&self) -> impl Iterator<Item = &Reward> + '_ {
        self.passes.iter().flat_map(|p| p.rewards.iter())
    }

    /// Total cells removed across all passes
    pub fn cleared(&self) -> usize {
        self.passes.iter().map(|p| p.removed.len()).sum()
    }
}

/// Apply one atomic pass for `matches`.
///
/// All coordinates are validated before the first write, so an error leaves
/// the grid untouched.
pub fn resolve_pass(
    grid: &mut Grid,
    matches: &MatchSet,
    palette_len: usize,
    rng: &mut SimpleRng,
    falls: &mut FallIds,
) -> Result<CascadePass> {
    for at in matches {
        grid.ensure_contains(at)?;
    }

    let height = grid.height();
    let mut pass = CascadePass {
        removed: matches.clone(),
        ..CascadePass::default()
    };
    let mut removed = vec![false; height as usize];
    let total = matches.len() as u32;

    for (x, cells) in matches.by_column() {
        pass.rewards.push(Reward {
            column: x,
            token: grid.at(x, cells[0].y),
            count: total,
        });

        removed.iter_mut().for_each(|r| *r = false);
        for at in &cells {
            removed[at.y as usize] = true;
        }

        // Scan bottom to top, writing survivors down to the next free slot.
        let mut write_y = height;
        for read_y in (0..height).rev() {
            if removed[read_y as usize] {
                continue;
            }
            write_y -= 1;
            if write_y != read_y {
                let token = grid.at(x, read_y);
                grid.put(x, write_y, token);
                pass.moves.push(TokenMove {
                    from: Coord::new(x, read_y),
                    to: Coord::new(x, write_y),
                    token,
                    fall: falls.next_id(),
                });
            }
        }

        for y in (0..write_y).rev() {
            let token = rng.next_token(palette_len);
            grid.put(x, y, token);
            pass.spawns.push(TokenSpawn {
                at: Coord::new(x, y),
                token,
                fall: falls.next_id(),
            });
        }
    }

    debug!(
        removed = pass.removed.len(),
        columns = pass.rewards.len(),
        moved = pass.moves.len(),
        spawned = pass.spawns.len(),
        "cascade pass"
    );
    Ok(pass)
}

/// Resolve `initial` and every run the refills create until the grid is quiet.
pub fn resolve(
    grid: &mut Grid,
    initial: MatchSet,
    palette_len: usize,
    rng: &mut SimpleRng,
    falls: &mut FallIds,
) -> Result<ResolutionReport> {
    let mut report = ResolutionReport::default();
    let mut current = initial;

    while !current.is_empty() {
        let pass = resolve_pass(grid, &current, palette_len, rng, falls)?;
        report.passes.push(pass);
        current = find_matches(grid);
    }

    report.settled = true;
    debug!(passes = report.passes.len(), cleared = report.cleared(), "grid settled");
    Ok(report)
}
