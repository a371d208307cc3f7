use std::hash::{Hash, Hasher};

use crate::types::PaletteMode;

/// Stable 64-bit FNV-1a hasher for a deterministic `state_hash`.
///
/// `DefaultHasher` output is not guaranteed stable across Rust versions, so
/// clients comparing hashes between runs need this one.
#[derive(Debug, Clone)]
pub struct Fnv1aHasher {
    state: u64,
}

impl Fnv1aHasher {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }
}

impl Default for Fnv1aHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for Fnv1aHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state ^= b as u64;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }
}

/// Point-in-time copy of a session for observers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridSnapshot {
    pub width: u8,
    pub height: u8,
    /// Raw token indices, `cells[y][x]`
    pub cells: Vec<Vec<u8>>,
    pub mode: PaletteMode,
    pub settled: bool,
    pub seed: u32,
    pub swap_count: u32,
    pub pass_count: u32,
}

impl GridSnapshot {
    /// Hash of the board and mode only; counters are excluded so two sessions
    /// showing the same board hash equal.
    pub fn state_hash(&self) -> u64 {
        let mut h = Fnv1aHasher::new();
        self.width.hash(&mut h);
        self.height.hash(&mut h);
        self.cells.hash(&mut h);
        self.mode.hash(&mut h);
        h.finish()
    }
}
