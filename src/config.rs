use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};
use crate::game::records::DEFAULT_HISTORY_LIMIT;
use crate::game::{Difficulty, ECO_SYMBOLS};

pub const DEFAULT_MISMATCH_DELAY_MS: u32 = 800;
pub const DEFAULT_HINT_DURATION_MS: u32 = 1000;
pub const DEFAULT_TICK_INTERVAL_MS: u32 = 1000;

/// 引擎配置，可由前端以 JSON 传入，缺省字段取默认值。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub difficulty: Difficulty,
    pub mismatch_delay_ms: u32,
    pub hint_duration_ms: u32,
    pub tick_interval_ms: u32,
    pub history_limit: usize,
    pub sound_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            mismatch_delay_ms: DEFAULT_MISMATCH_DELAY_MS,
            hint_duration_ms: DEFAULT_HINT_DURATION_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            sound_enabled: true,
            seed: None,
            symbols: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn symbols(&self) -> &[String] {
        self.symbols.as_deref().unwrap_or(ECO_SYMBOLS.as_slice())
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        let positive = [
            ("mismatch_delay_ms", self.mismatch_delay_ms as usize),
            ("hint_duration_ms", self.hint_duration_ms as usize),
            ("tick_interval_ms", self.tick_interval_ms as usize),
            ("history_limit", self.history_limit),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            log::warn!("rejecting engine config: {field} is zero");
            return Err(ConfigurationError::ZeroSetting {
                field: field.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn empty_json_yields_defaults() {
        let config = EngineConfig::from_json("{}").expect("defaults");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.mismatch_delay_ms, 800);
        assert_eq!(config.symbols().len(), 16);
    }

    #[test]
    fn partial_json_overrides_selected_fields() {
        let config =
            EngineConfig::from_json(r#"{"difficulty":"expert","seed":9,"sound_enabled":false}"#)
                .expect("valid config");
        assert_eq!(config.difficulty, Difficulty::Expert);
        assert_eq!(config.seed, Some(9));
        assert!(!config.sound_enabled);
        assert_eq!(config.hint_duration_ms, 1000);
    }

    #[test]
    fn zero_delays_are_rejected() {
        let err = EngineConfig::from_json(r#"{"tick_interval_ms":0}"#).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Configuration(ConfigurationError::ZeroSetting { ref field }) if field == "tick_interval_ms"
        ));
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(EngineError::Json(_))
        ));
    }
}
