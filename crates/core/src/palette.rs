//! Palette mode controller - day/night token rendering
//!
//! The grid stores palette indices. Two palettes of equal length pair kinds
//! index-for-index; the mode decides which one renders. Toggling never
//! touches the grid, so it never creates or breaks a run.

use crate::error::{GridError, Result};
use crate::grid::Grid;
use crate::types::{Coord, PaletteMode, TokenId, MIN_PALETTE_SIZE};

/// The visible/hidden palette pair plus the current mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palettes<K> {
    visible: Vec<K>,
    hidden: Vec<K>,
    mode: PaletteMode,
}

impl<K> Palettes<K> {
    pub fn new(visible: Vec<K>, hidden: Vec<K>) -> Result<Self> {
        if visible.len() != hidden.len() {
            return Err(GridError::PaletteMismatch {
                visible: visible.len(),
                hidden: hidden.len(),
            });
        }
        if visible.len() < MIN_PALETTE_SIZE {
            return Err(GridError::PaletteTooSmall {
                len: visible.len(),
                min: MIN_PALETTE_SIZE,
            });
        }
        if visible.len() >= u8::MAX as usize {
            return Err(GridError::invalid_shape("palette is limited to 254 kinds"));
        }

        Ok(Self {
            visible,
            hidden,
            mode: PaletteMode::Visible,
        })
    }

    /// Number of token kinds (same for both palettes)
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn mode(&self) -> PaletteMode {
        self.mode
    }

    /// Flip the mode and return the new one
    pub fn toggle_mode(&mut self) -> PaletteMode {
        self.mode = self.mode.toggled();
        self.mode
    }

    pub fn current_palette(&self) -> &[K] {
        match self.mode {
            PaletteMode::Visible => &self.visible,
            PaletteMode::Hidden => &self.hidden,
        }
    }

    /// The palette that is not rendered right now
    pub fn other_palette(&self) -> &[K] {
        match self.mode {
            PaletteMode::Visible => &self.hidden,
            PaletteMode::Hidden => &self.visible,
        }
    }

    /// Kind rendered for `token` in the current mode
    pub fn display(&self, token: TokenId) -> Result<&K> {
        self.current_palette()
            .get(token.index())
            .ok_or(GridError::UnknownToken {
                token,
                len: self.len(),
            })
    }

    /// Kind rendered for the cell at `at` in the current mode.
    ///
    /// After a toggle this is the counterpart, at the same index, of what the
    /// cell showed before.
    pub fn remap_cell_display(&self, grid: &Grid, at: Coord) -> Result<&K> {
        self.display(grid.get(at)?)
    }
}

impl<K: PartialEq> Palettes<K> {
    /// Index of a kind in the current palette
    pub fn token_of(&self, kind: &K) -> Option<TokenId> {
        self.current_palette()
            .iter()
            .position(|k| k == kind)
            .map(|i| TokenId(i as u8))
    }
}

impl Palettes<String> {
    /// Default day/night pair used by the binary
    pub fn default_names() -> Self {
        let visible = ["sun", "leaf", "sky", "rose", "amber"];
        let hidden = ["moon", "ember", "void", "frost", "shade"];
        Self {
            visible: visible.iter().map(|s| s.to_string()).collect(),
            hidden: hidden.iter().map(|s| s.to_string()).collect(),
            mode: PaletteMode::Visible,
        }
    }
}
