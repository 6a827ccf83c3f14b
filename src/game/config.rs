use serde::{Deserialize, Serialize};

pub const DEFAULT_STORAGE_KEY: &str = "rpg_battle_state_v1";
pub const HISTORY_KEY_SUFFIX: &str = "_history_v1";

const DEFAULT_HISTORY_LIMIT: usize = 200;
const DEFAULT_PERSIST_HISTORY_LIMIT: usize = 5;
const DEFAULT_HAND_SIZE: usize = 5;
const DEFAULT_DRAFT_PICKS: usize = 3;
const DEFAULT_AUTO_END_DELAY_MS: u32 = 600;
const DEFAULT_STEAL_REVEAL_DELAY_MS: u32 = 500;

/// Session-wide tunables. Every field has a default so a partial JSON
/// object from the page is enough to build one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    pub history_limit: usize,
    pub persist_history_limit: usize,
    pub storage_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_storage_key: Option<String>,
    pub hand_size: usize,
    pub draft_picks_per_player: usize,
    pub auto_end_delay_ms: u32,
    pub steal_reveal_delay_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Key under which the bounded `{history, redo}` payload is stored.
    /// Derived from `storage_key` unless set explicitly.
    pub fn history_key(&self) -> String {
        self.history_storage_key
            .clone()
            .unwrap_or_else(|| format!("{}{}", self.storage_key, HISTORY_KEY_SUFFIX))
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            persist_history_limit: DEFAULT_PERSIST_HISTORY_LIMIT,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            history_storage_key: None,
            hand_size: DEFAULT_HAND_SIZE,
            draft_picks_per_player: DEFAULT_DRAFT_PICKS,
            auto_end_delay_ms: DEFAULT_AUTO_END_DELAY_MS,
            steal_reveal_delay_ms: DEFAULT_STEAL_REVEAL_DELAY_MS,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = GameConfig::from_json(r#"{"historyLimit": 10, "seed": 7}"#)
            .expect("partial config should parse");
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.persist_history_limit, 5);
        assert_eq!(config.hand_size, 5);
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn history_key_derives_from_storage_key() {
        let config = GameConfig::default().with_storage_key("slot_a");
        assert_eq!(config.history_key(), "slot_a_history_v1");

        let explicit = GameConfig {
            history_storage_key: Some("custom".into()),
            ..GameConfig::default()
        };
        assert_eq!(explicit.history_key(), "custom");
    }
}
