pub mod defaults;
pub mod settings;
pub mod user;

use std::path::Path;
use std::time::Duration;

pub use defaults::default_settings;
pub use settings::{ArcSettings, CombinerSettings, EngineSettings, WindowSettings};
pub use user::user_config_path;

use crate::error::{ProvenanceError, ProvenanceResult};

/// Merge two EngineSettings, preferring values from `primary` over `fallback`
pub fn merge_settings(
    fallback: Option<EngineSettings>,
    primary: Option<EngineSettings>,
) -> Option<EngineSettings> {
    match (fallback, primary) {
        (None, None) => None,
        (Some(settings), None) => Some(settings),
        (None, Some(settings)) => Some(settings),
        (Some(fallback), Some(primary)) => Some(EngineSettings {
            enabled: primary.enabled.or(fallback.enabled),
            combiner: CombinerSettings {
                burst_timeout_ms: primary
                    .combiner
                    .burst_timeout_ms
                    .or(fallback.combiner.burst_timeout_ms),
                diff_budget_ms: primary
                    .combiner
                    .diff_budget_ms
                    .or(fallback.combiner.diff_budget_ms),
            },
            arc: ArcSettings {
                // Delay lists are replaced as a whole, never merged element-wise
                delays_ms: primary.arc.delays_ms.or(fallback.arc.delays_ms),
            },
            windows: WindowSettings {
                long_term_secs: primary
                    .windows
                    .long_term_secs
                    .or(fallback.windows.long_term_secs),
                window_secs: primary.windows.window_secs.or(fallback.windows.window_secs),
                long_term_top_keys: primary
                    .windows
                    .long_term_top_keys
                    .or(fallback.windows.long_term_top_keys),
                window_top_keys: primary
                    .windows
                    .window_top_keys
                    .or(fallback.windows.window_top_keys),
            },
        }),
    }
}

/// Timing of the streaming combiner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinerConfig {
    pub burst_timeout: Duration,
    pub diff_budget: Duration,
}

/// When retention samples are taken after an accepted suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcConfig {
    pub delays: Vec<Duration>,
}

/// Lifetimes and reporting limits of the long-term and windowed trackers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub long_term: Duration,
    pub window: Duration,
    pub long_term_top_keys: usize,
    pub window_top_keys: usize,
}

/// Fully resolved engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub enabled: bool,
    pub combiner: CombinerConfig,
    pub arc: ArcConfig,
    pub windows: WindowConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let defaults = default_settings();
        Self {
            enabled: true,
            combiner: CombinerConfig {
                burst_timeout: Duration::from_millis(defaults::DEFAULT_BURST_TIMEOUT_MS),
                diff_budget: Duration::from_millis(defaults::DEFAULT_DIFF_BUDGET_MS),
            },
            arc: ArcConfig {
                delays: defaults
                    .arc
                    .delays_ms
                    .unwrap_or_default()
                    .into_iter()
                    .map(Duration::from_millis)
                    .collect(),
            },
            windows: WindowConfig {
                long_term: Duration::from_secs(defaults::DEFAULT_LONG_TERM_SECS),
                window: Duration::from_secs(defaults::DEFAULT_WINDOW_SECS),
                long_term_top_keys: defaults::DEFAULT_LONG_TERM_TOP_KEYS,
                window_top_keys: defaults::DEFAULT_WINDOW_TOP_KEYS,
            },
        }
    }
}

impl EngineConfig {
    /// Resolve `settings` merged over the defaults.
    pub fn from_settings(settings: EngineSettings) -> ProvenanceResult<Self> {
        let base = Self::default();
        let merged = merge_settings(Some(default_settings()), Some(settings)).unwrap_or_default();

        let millis = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_millis).unwrap_or(fallback)
        };
        let secs = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_secs).unwrap_or(fallback)
        };

        let config = Self {
            enabled: merged.enabled.unwrap_or(base.enabled),
            combiner: CombinerConfig {
                burst_timeout: millis(
                    merged.combiner.burst_timeout_ms,
                    base.combiner.burst_timeout,
                ),
                diff_budget: millis(merged.combiner.diff_budget_ms, base.combiner.diff_budget),
            },
            arc: ArcConfig {
                delays: match merged.arc.delays_ms {
                    Some(delays) => delays.into_iter().map(Duration::from_millis).collect(),
                    None => base.arc.delays,
                },
            },
            windows: WindowConfig {
                long_term: secs(merged.windows.long_term_secs, base.windows.long_term),
                window: secs(merged.windows.window_secs, base.windows.window),
                long_term_top_keys: merged
                    .windows
                    .long_term_top_keys
                    .unwrap_or(base.windows.long_term_top_keys),
                window_top_keys: merged
                    .windows
                    .window_top_keys
                    .unwrap_or(base.windows.window_top_keys),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ProvenanceResult<Self> {
        let settings: EngineSettings = toml::from_str(content)
            .map_err(|e| ProvenanceError::config(format!("failed to parse TOML: {}", e)))?;
        Self::from_settings(settings)
    }

    pub fn load(path: &Path) -> ProvenanceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load the user config file if it exists, the defaults otherwise.
    pub fn load_user() -> ProvenanceResult<Self> {
        match user_config_path() {
            Some(path) if path.exists() => {
                log::info!(
                    target: "edit_provenance::config",
                    "Loading user config from {}",
                    path.display()
                );
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> ProvenanceResult<()> {
        if self.arc.delays.is_empty() {
            return Err(ProvenanceError::config("arc.delays_ms must not be empty"));
        }
        if self.arc.delays.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(ProvenanceError::config("arc.delays_ms must be ascending"));
        }
        if self.windows.long_term.is_zero() || self.windows.window.is_zero() {
            return Err(ProvenanceError::config(
                "tracker windows must be longer than zero",
            ));
        }
        Ok(())
    }
}
