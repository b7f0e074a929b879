//! Default configuration values for edit-provenance.

use super::settings::{ArcSettings, CombinerSettings, EngineSettings, WindowSettings};

pub const DEFAULT_BURST_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_DIFF_BUDGET_MS: u64 = 500;

/// 0s, 30s, 2min, 5min, 10min, 15min
pub const DEFAULT_ARC_DELAYS_MS: [u64; 6] = [0, 30_000, 120_000, 300_000, 600_000, 900_000];

/// Long-term trackers are flushed every 10 hours.
pub const DEFAULT_LONG_TERM_SECS: u64 = 10 * 60 * 60;
/// Windowed trackers are flushed every 5 minutes.
pub const DEFAULT_WINDOW_SECS: u64 = 5 * 60;

pub const DEFAULT_LONG_TERM_TOP_KEYS: usize = 30;
pub const DEFAULT_WINDOW_TOP_KEYS: usize = 10;

/// Returns the fully populated default settings.
///
/// User settings are merged over these, so every field here is `Some`.
pub fn default_settings() -> EngineSettings {
    EngineSettings {
        enabled: Some(true),
        combiner: CombinerSettings {
            burst_timeout_ms: Some(DEFAULT_BURST_TIMEOUT_MS),
            diff_budget_ms: Some(DEFAULT_DIFF_BUDGET_MS),
        },
        arc: ArcSettings {
            delays_ms: Some(DEFAULT_ARC_DELAYS_MS.to_vec()),
        },
        windows: WindowSettings {
            long_term_secs: Some(DEFAULT_LONG_TERM_SECS),
            window_secs: Some(DEFAULT_WINDOW_SECS),
            long_term_top_keys: Some(DEFAULT_LONG_TERM_TOP_KEYS),
            window_top_keys: Some(DEFAULT_WINDOW_TOP_KEYS),
        },
    }
}
