//! Grid module - the authoritative token grid
//!
//! The grid is a W x H array of [`TokenId`]s stored flat in row-major order
//! for cache locality. Every cell always holds a token; the cascade resolver
//! is the only code that vacates cells, and only inside one atomic pass.
//!
//! Coordinates: (x, y) where x is the column (left to right) and y is the row
//! (top to bottom).

use std::fmt;

use crate::error::{GridError, Result};
use crate::rng::SimpleRng;
use crate::types::{Coord, TokenId, MIN_PALETTE_SIZE, MIN_RUN};

/// The token grid
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grid {
    width: u8,
    height: u8,
    /// Flat array of tokens, row-major order (y * width + x)
    cells: Vec<TokenId>,
}

impl Grid {
    /// Fill a new grid with random tokens that form no initial run.
    ///
    /// Cells are filled in row-major order. A candidate is excluded when the
    /// two cells directly to its left already match each other, or the two
    /// cells directly above do. Every run has a last cell in scan order whose
    /// two predecessors along the run were placed before it, so the result
    /// holds no run at all.
    pub fn populate(width: u8, height: u8, palette_len: usize, rng: &mut SimpleRng) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GridError::invalid_shape("grid must have at least one row and column"));
        }
        if palette_len < MIN_PALETTE_SIZE {
            return Err(GridError::PaletteTooSmall {
                len: palette_len,
                min: MIN_PALETTE_SIZE,
            });
        }
        if palette_len >= u8::MAX as usize {
            return Err(GridError::invalid_shape("palette is limited to 254 kinds"));
        }

        let mut cells = Vec::with_capacity(width as usize * height as usize);
        let w = width as usize;

        for y in 0..height as usize {
            for x in 0..w {
                let mut excluded = [TokenId(u8::MAX); 2];

                if x >= 2 {
                    let left = cells[y * w + x - 1];
                    if cells[y * w + x - 2] == left {
                        excluded[0] = left;
                    }
                }
                if y >= 2 {
                    let above = cells[(y - 1) * w + x];
                    if cells[(y - 2) * w + x] == above {
                        excluded[1] = above;
                    }
                }

                // Two exclusions out of at least three kinds always leave a choice.
                let token = rng
                    .next_token_excluding(palette_len, &excluded)
                    .unwrap_or(TokenId(0));
                cells.push(token);
            }
        }

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Build a grid from explicit rows of token indices.
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(GridError::invalid_shape("grid must have at least one row and column"));
        }
        if width > u8::MAX as usize || height > u8::MAX as usize {
            return Err(GridError::invalid_shape("grid is larger than 255 cells per side"));
        }

        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != width {
                return Err(GridError::invalid_shape(format!(
                    "row {} has {} cells, expected {}",
                    y,
                    row.len(),
                    width
                )));
            }
            cells.extend(row.iter().copied().map(TokenId));
        }

        Ok(Self {
            width: width as u8,
            height: height as u8,
            cells,
        })
    }

    /// Build a grid from rows of letters, `A` being token 0.
    ///
    /// ```
    /// use tile_swap_core::Grid;
    /// use tile_swap_core::types::{Coord, TokenId};
    ///
    /// let grid = Grid::from_letters(&["ABC", "CAB"]).unwrap();
    /// assert_eq!(grid.get(Coord::new(1, 1)).unwrap(), TokenId(0));
    /// assert_eq!(grid.to_string(), "ABC\nCAB\n");
    /// ```
    pub fn from_letters(rows: &[&str]) -> Result<Self> {
        let mut parsed = Vec::with_capacity(rows.len());
        for row in rows {
            let mut out = Vec::with_capacity(row.len());
            for ch in row.chars() {
                if !ch.is_ascii_uppercase() {
                    return Err(GridError::invalid_shape(format!(
                        "'{}' is not a token letter",
                        ch
                    )));
                }
                out.push(ch as u8 - b'A');
            }
            parsed.push(out);
        }
        Self::from_rows(&parsed)
    }

    /// Calculate flat index from a coordinate
    #[inline(always)]
    fn index(&self, at: Coord) -> Option<usize> {
        if at.x >= self.width || at.y >= self.height {
            return None;
        }
        Some(at.y as usize * self.width as usize + at.x as usize)
    }

    fn checked_index(&self, at: Coord) -> Result<usize> {
        self.index(at).ok_or(GridError::OutOfBounds {
            at,
            width: self.width,
            height: self.height,
        })
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn dimensions(&self) -> (u8, u8) {
        (self.width, self.height)
    }

    pub fn contains(&self, at: Coord) -> bool {
        self.index(at).is_some()
    }

    /// Fail with `OutOfBounds` unless `at` is on the grid
    pub fn ensure_contains(&self, at: Coord) -> Result<()> {
        self.checked_index(at).map(|_| ())
    }

    pub fn get(&self, at: Coord) -> Result<TokenId> {
        self.checked_index(at).map(|idx| self.cells[idx])
    }

    pub fn set(&mut self, at: Coord, token: TokenId) -> Result<()> {
        let idx = self.checked_index(at)?;
        self.cells[idx] = token;
        Ok(())
    }

    /// Exchange the tokens of two cells in place.
    ///
    /// Calling it twice with the same arguments restores the grid, which is
    /// what swap rollback relies on. Adjacency is the caller's concern.
    pub fn swap(&mut self, a: Coord, b: Coord) -> Result<()> {
        let ia = self.checked_index(a)?;
        let ib = self.checked_index(b)?;
        self.cells.swap(ia, ib);
        Ok(())
    }

    /// Token at an in-bounds coordinate produced by internal iteration
    #[inline]
    pub(crate) fn at(&self, x: u8, y: u8) -> TokenId {
        self.cells[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub(crate) fn put(&mut self, x: u8, y: u8, token: TokenId) {
        let idx = y as usize * self.width as usize + x as usize;
        self.cells[idx] = token;
    }

    /// Flat cell slice, row-major
    pub fn cells(&self) -> &[TokenId] {
        &self.cells
    }

    pub fn row(&self, y: u8) -> Option<&[TokenId]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.width as usize;
        Some(&self.cells[start..start + self.width as usize])
    }

    /// All coordinates in row-major order
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Coord::new(x, y)))
    }

    /// Copy out as nested rows of raw token indices
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.cells
            .chunks(self.width as usize)
            .map(|row| row.iter().map(|t| t.0).collect())
            .collect()
    }

    /// True if any row or column holds a run of `MIN_RUN` equal tokens.
    pub fn has_run(&self) -> bool {
        let run = MIN_RUN as u8;
        for y in 0..self.height {
            for x in 0..self.width {
                let t = self.at(x, y);
                if x + run <= self.width && (1..run).all(|d| self.at(x + d, y) == t) {
                    return true;
                }
                if y + run <= self.height && (1..run).all(|d| self.at(x, y + d) == t) {
                    return true;
                }
            }
        }
        false
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.width as usize) {
            for t in row {
                let ch = if t.0 < 26 { (b'A' + t.0) as char } else { '?' };
                write!(f, "{}", ch)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
