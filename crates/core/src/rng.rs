//! RNG module - deterministic token draws
//!
//! Every random choice in the engine (initial fill and cascade refill) goes
//! through [`SimpleRng`], so one seed reproduces a whole session.

use crate::types::TokenId;

/// Simple LCG (Linear Congruential Generator) RNG
/// Uses constants from Numerical Recipes
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u32,
}

impl SimpleRng {
    /// Create a new RNG with the given seed
    pub fn new(seed: u32) -> Self {
        // Avoid 0 seed which would produce all zeros
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u32
    pub fn next_u32(&mut self) -> u32 {
        // LCG formula: (a * state + c) mod m
        // Using Numerical Recipes constants: a=1664525, c=1013904223, m=2^32
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state
    }

    /// Generate random value in range [0, max)
    ///
    /// Takes the high bits of the state; the low bits of an LCG cycle with a
    /// short period.
    pub fn next_range(&mut self, max: u32) -> u32 {
        debug_assert!(max > 0);
        ((self.next_u32() as u64 * max as u64) >> 32) as u32
    }

    /// Uniform token from a palette of `palette_len` kinds
    pub fn next_token(&mut self, palette_len: usize) -> TokenId {
        TokenId(self.next_range(palette_len as u32) as u8)
    }

    /// Uniform token from the palette minus `excluded`
    ///
    /// Returns `None` only when every kind is excluded.
    pub fn next_token_excluding(
        &mut self,
        palette_len: usize,
        excluded: &[TokenId],
    ) -> Option<TokenId> {
        let allowed = (0..palette_len as u8)
            .map(TokenId)
            .filter(|t| !excluded.contains(t))
            .count();
        if allowed == 0 {
            return None;
        }

        let pick = self.next_range(allowed as u32) as usize;
        (0..palette_len as u8)
            .map(TokenId)
            .filter(|t| !excluded.contains(t))
            .nth(pick)
    }

    /// Current state (for restarting with the same sequence)
    pub fn state(&self) -> u32 {
        self.state
    }
}

impl Default for SimpleRng {
    fn default() -> Self {
        Self::new(1)
    }
}
