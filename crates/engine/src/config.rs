use std::env;
use std::time::Duration;

use tile_swap_core::{GridError, Palettes};

use crate::types::{
    CASCADE_START_DELAY_MS, GRID_HEIGHT, GRID_WIDTH, SNAP_BACK_MS, SWAP_ANIMATION_MS,
};

const DEFAULT_VISIBLE: &str = "sun,leaf,sky,rose,amber";
const DEFAULT_HIDDEN: &str = "moon,ember,void,frost,shade";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub width: u8,
    pub height: u8,
    pub seed: u32,
    pub visible_palette: Vec<String>,
    pub hidden_palette: Vec<String>,
    /// Wait after an accepted swap before resolving
    pub swap_animation: Duration,
    /// Wait after a rejected swap before the next command
    pub snap_back: Duration,
    /// Wait before the first cascade pass
    pub cascade_delay: Duration,
    /// Headless mode: never wait for fall completions
    pub auto_falls: bool,
    /// Depth of the bounded command queue
    pub max_pending_commands: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: GRID_WIDTH,
            height: GRID_HEIGHT,
            seed: 1,
            visible_palette: split_palette(DEFAULT_VISIBLE),
            hidden_palette: split_palette(DEFAULT_HIDDEN),
            swap_animation: Duration::from_millis(SWAP_ANIMATION_MS as u64),
            snap_back: Duration::from_millis(SNAP_BACK_MS as u64),
            cascade_delay: Duration::from_millis(CASCADE_START_DELAY_MS as u64),
            auto_falls: false,
            max_pending_commands: 16,
        }
    }
}

impl EngineConfig {
    /// Create from `TILE_SWAP_*` environment variables.
    ///
    /// Missing or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let width = parse_var("TILE_SWAP_WIDTH")
            .filter(|w: &u8| *w >= 3)
            .unwrap_or(defaults.width);
        let height = parse_var("TILE_SWAP_HEIGHT")
            .filter(|h: &u8| *h >= 3)
            .unwrap_or(defaults.height);
        let seed = parse_var("TILE_SWAP_SEED").unwrap_or(defaults.seed);

        let visible_palette = env::var("TILE_SWAP_PALETTE")
            .ok()
            .map(|s| split_palette(&s))
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.visible_palette);
        let hidden_palette = env::var("TILE_SWAP_HIDDEN_PALETTE")
            .ok()
            .map(|s| split_palette(&s))
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.hidden_palette);

        let swap_animation = parse_var("TILE_SWAP_SWAP_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.swap_animation);
        let snap_back = parse_var("TILE_SWAP_SNAP_BACK_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.snap_back);
        let cascade_delay = parse_var("TILE_SWAP_CASCADE_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.cascade_delay);

        let auto_falls = env::var("TILE_SWAP_AUTO_FALLS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(defaults.auto_falls);

        let max_pending_commands = parse_var("TILE_SWAP_MAX_PENDING")
            .unwrap_or(defaults.max_pending_commands);

        Self {
            width,
            height,
            seed,
            visible_palette,
            hidden_palette,
            swap_animation,
            snap_back,
            cascade_delay,
            auto_falls,
            max_pending_commands,
        }
    }

    /// No waits and no fall tracking; for tests and batch runs
    pub fn instant() -> Self {
        Self {
            swap_animation: Duration::ZERO,
            snap_back: Duration::ZERO,
            cascade_delay: Duration::ZERO,
            auto_falls: true,
            ..Self::default()
        }
    }

    pub fn palettes(&self) -> Result<Palettes<String>, GridError> {
        Palettes::new(self.visible_palette.clone(), self.hidden_palette.clone())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn split_palette(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
