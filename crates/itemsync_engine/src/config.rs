//! Configuration for the sync engine.

use std::time::Duration;

/// Default name of the dataset holding item counts.
pub const DEFAULT_DATASET_NAME: &str = "gameItems";

/// Default delay between a finished sync cycle and the next automatic one.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Configuration for an [`ItemSyncEngine`](crate::ItemSyncEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Name of the remote dataset opened after identity resolution.
    pub dataset_name: String,
    /// Cooldown between completed sync cycles.
    pub cooldown: Duration,
}

impl EngineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dataset name.
    #[must_use]
    pub fn with_dataset_name(mut self, name: impl Into<String>) -> Self {
        self.dataset_name = name.into();
        self
    }

    /// Sets the cooldown between sync cycles.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dataset_name: DEFAULT_DATASET_NAME.to_string(),
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}
