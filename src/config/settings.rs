use serde::Deserialize;

/// Settings as read from a TOML file. Every field is optional so partial
/// files can be merged over the defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, serde::Serialize)]
pub struct EngineSettings {
    pub enabled: Option<bool>,
    #[serde(default)]
    pub combiner: CombinerSettings,
    #[serde(default)]
    pub arc: ArcSettings,
    #[serde(default)]
    pub windows: WindowSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, serde::Serialize)]
pub struct CombinerSettings {
    /// How long a chat burst waits for its next edit
    pub burst_timeout_ms: Option<u64>,
    /// Time budget of the diff reconciling a burst
    pub diff_budget_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, serde::Serialize)]
pub struct ArcSettings {
    /// Ascending sample delays after an accepted suggestion
    pub delays_ms: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, serde::Serialize)]
pub struct WindowSettings {
    pub long_term_secs: Option<u64>,
    pub window_secs: Option<u64>,
    pub long_term_top_keys: Option<usize>,
    pub window_top_keys: Option<usize>,
}
