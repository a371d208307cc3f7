//! Session module - one game's complete rule state
//!
//! Ties together the grid, palettes, RNG and event buffer. A session is
//! constructed once per game and owned by whoever drives it; nothing here is
//! global. Every public method leaves the grid fully populated.
//!
//! Lifecycle of a swap:
//!
//! 1. [`Session::request_swap`] validates and commits or rolls back.
//! 2. An accepted swap leaves the session unsettled with pending matches.
//! 3. [`Session::resolve_next_pass`] applies one cascade pass at a time (an
//!    async driver waits for animations in between), or
//!    [`Session::resolve_all`] runs the whole cascade at once.
//! 4. The last call emits `GridSettled` and new swaps are accepted again.

use tracing::{debug, info};

use crate::cascade::{self, CascadePass, FallIds, ResolutionReport};
use crate::error::{GridError, Result};
use crate::grid::Grid;
use crate::matcher::{find_matches, MatchSet};
use crate::palette::Palettes;
use crate::rng::SimpleRng;
use crate::snapshot::GridSnapshot;
use crate::swap::{can_swap, try_swap, SwapOutcome};
use crate::types::{Coord, GridEvent, PaletteMode, TokenId};

#[derive(Debug, Clone)]
pub struct Session<K = String> {
    grid: Grid,
    palettes: Palettes<K>,
    rng: SimpleRng,
    falls: FallIds,
    /// Matches waiting for the next cascade pass
    pending: MatchSet,
    settled: bool,
    events: Vec<GridEvent>,
    seed: u32,
    swap_count: u32,
    pass_count: u32,
}

impl<K> Session<K> {
    /// Start a session on a freshly populated grid.
    pub fn new(width: u8, height: u8, palettes: Palettes<K>, seed: u32) -> Result<Self> {
        let mut rng = SimpleRng::new(seed);
        let grid = Grid::populate(width, height, palettes.len(), &mut rng)?;
        info!(width, height, seed, kinds = palettes.len(), "session started");
        Ok(Self::assemble(grid, palettes, rng, seed))
    }

    /// Start a session on a given grid (the grid may contain runs; they are
    /// left for the caller to resolve).
    pub fn with_grid(grid: Grid, palettes: Palettes<K>, seed: u32) -> Result<Self> {
        if let Some(token) = grid
            .cells()
            .iter()
            .copied()
            .find(|t| t.index() >= palettes.len())
        {
            return Err(GridError::UnknownToken {
                token,
                len: palettes.len(),
            });
        }
        Ok(Self::assemble(grid, palettes, SimpleRng::new(seed), seed))
    }

    fn assemble(grid: Grid, palettes: Palettes<K>, rng: SimpleRng, seed: u32) -> Self {
        let events = grid
            .coords()
            .map(|at| GridEvent::CellChanged {
                at,
                token: grid.at(at.x, at.y),
            })
            .collect();

        Self {
            grid,
            palettes,
            rng,
            falls: FallIds::new(),
            pending: MatchSet::new(),
            settled: true,
            events,
            seed,
            swap_count: 0,
            pass_count: 0,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn palettes(&self) -> &Palettes<K> {
        &self.palettes
    }

    pub fn mode(&self) -> PaletteMode {
        self.palettes.mode()
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// True when no cascade is in progress
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn swap_count(&self) -> u32 {
        self.swap_count
    }

    pub fn pass_count(&self) -> u32 {
        self.pass_count
    }

    /// Matches the next cascade pass will remove
    pub fn pending(&self) -> &MatchSet {
        &self.pending
    }

    /// Adjacency and bounds pre-check; never touches the grid
    pub fn can_swap(&self, from: Coord, to: Coord) -> bool {
        let (w, h) = self.grid.dimensions();
        can_swap(w, h, from, to)
    }

    /// Attempt a swap of `from` (dragged) with `to`.
    ///
    /// Fails with `Unsettled` while a cascade is still resolving.
    pub fn request_swap(&mut self, from: Coord, to: Coord) -> Result<SwapOutcome> {
        if !self.settled {
            return Err(GridError::Unsettled);
        }

        let outcome = try_swap(&mut self.grid, from, to)?;
        match &outcome {
            SwapOutcome::Accepted(matches) => {
                self.swap_count = self.swap_count.wrapping_add(1);
                self.events.push(GridEvent::SwapAccepted { from, to });
                for at in [from, to] {
                    self.events.push(GridEvent::CellChanged {
                        at,
                        token: self.grid.at(at.x, at.y),
                    });
                }
                self.pending = matches.clone();
                self.settled = false;
            }
            SwapOutcome::Rejected => {
                self.events.push(GridEvent::SwapRejected { from, to });
            }
        }
        Ok(outcome)
    }

    /// Apply one cascade pass for the pending matches.
    ///
    /// Returns `None` once nothing is pending; the first such call after a
    /// cascade marks the session settled and emits `GridSettled`.
    pub fn resolve_next_pass(&mut self) -> Result<Option<CascadePass>> {
        if self.pending.is_empty() {
            if !self.settled {
                self.settled = true;
                self.events.push(GridEvent::GridSettled);
                debug!(passes = self.pass_count, "grid settled");
            }
            return Ok(None);
        }

        let pass = cascade::resolve_pass(
            &mut self.grid,
            &self.pending,
            self.palettes.len(),
            &mut self.rng,
            &mut self.falls,
        )?;
        self.pass_count = self.pass_count.wrapping_add(1);
        self.events.extend(pass.events());
        self.pending = find_matches(&self.grid);
        Ok(Some(pass))
    }

    /// Run the pending cascade to completion in one call.
    pub fn resolve_all(&mut self) -> Result<ResolutionReport> {
        let initial = std::mem::take(&mut self.pending);
        let was_settled = self.settled;

        let report = cascade::resolve(
            &mut self.grid,
            initial,
            self.palettes.len(),
            &mut self.rng,
            &mut self.falls,
        )?;

        for pass in &report.passes {
            self.events.extend(pass.events());
        }
        self.pass_count = self
            .pass_count
            .wrapping_add(report.passes.len() as u32);
        self.settled = true;
        if !was_settled {
            self.events.push(GridEvent::GridSettled);
        }
        Ok(report)
    }

    /// Rescan the whole board and queue whatever runs it holds.
    ///
    /// Useful after [`Session::with_grid`] on an arbitrary board. Returns
    /// true if a cascade is now pending.
    pub fn queue_existing_matches(&mut self) -> bool {
        let found = find_matches(&self.grid);
        if found.is_empty() {
            return false;
        }
        self.pending = found;
        self.settled = false;
        true
    }

    /// Flip the palette mode. The grid is untouched; every cell's display
    /// changes, so every cell is reported.
    pub fn toggle_mode(&mut self) -> PaletteMode {
        let mode = self.palettes.toggle_mode();
        self.events.push(GridEvent::ModeToggled { mode });
        let grid = &self.grid;
        self.events.extend(grid.coords().map(|at| GridEvent::CellChanged {
            at,
            token: grid.at(at.x, at.y),
        }));
        debug!(mode = mode.as_str(), "palette mode toggled");
        mode
    }

    /// Kind rendered for `token` in the current mode
    pub fn kind_of(&self, token: TokenId) -> Option<&K> {
        self.palettes.display(token).ok()
    }

    /// The whole grid rendered through the current palette, `rows[y][x]`
    pub fn display_rows(&self) -> Vec<Vec<&K>> {
        let palette = self.palettes.current_palette();
        (0..self.grid.height())
            .map(|y| {
                (0..self.grid.width())
                    .map(|x| &palette[self.grid.at(x, y).index()])
                    .collect()
            })
            .collect()
    }

    /// Take all buffered events in emission order
    pub fn drain_events(&mut self) -> Vec<GridEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            width: self.grid.width(),
            height: self.grid.height(),
            cells: self.grid.to_rows(),
            mode: self.palettes.mode(),
            settled: self.settled,
            seed: self.seed,
            swap_count: self.swap_count,
            pass_count: self.pass_count,
        }
    }
}
