//! Dialog engine configuration.

use std::env;

/// Default age after which a suspended dialog stack is discarded.
pub const DEFAULT_DIALOG_TTL_SECS: i64 = 86_400;

/// Default maximum number of stacked dialog frames.
pub const DEFAULT_MAX_DIALOG_DEPTH: usize = 8;

/// Limits applied by the dialog engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Suspended stacks older than this are dropped on the next turn.
    pub dialog_ttl_secs: i64,
    /// Frames allowed on the stack at once.
    pub max_dialog_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dialog_ttl_secs: DEFAULT_DIALOG_TTL_SECS,
            max_dialog_depth: DEFAULT_MAX_DIALOG_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `DIALOG_TTL_SECS` | Age at which a suspended dialog is discarded | `86400` |
    /// | `MAX_DIALOG_DEPTH` | Maximum stacked dialogs | `8` |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let dialog_ttl_secs = env::var("DIALOG_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v: &i64| *v > 0)
            .unwrap_or(defaults.dialog_ttl_secs);

        let max_dialog_depth = env::var("MAX_DIALOG_DEPTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v: &usize| *v > 0)
            .unwrap_or(defaults.max_dialog_depth);

        Self {
            dialog_ttl_secs,
            max_dialog_depth,
        }
    }
}
