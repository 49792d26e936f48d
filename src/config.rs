use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Full engine configuration. Every table defaults to the production
/// scoring policy, so a config file only needs the values it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub risk: RiskConfig,
    pub history: HistoryConfig,
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.risk.validate()?;
        self.history.validate()
    }
}

/// A keyword searched for inside a lower-cased reason, and the weight it adds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordWeight {
    pub keyword: String,
    pub weight: u32,
}

/// Three-step weight table: `high` at or above `high_at`, `medium` at or
/// above `medium_at`, `base` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightBands {
    pub high_at: usize,
    pub high: u32,
    pub medium_at: usize,
    pub medium: u32,
    pub base: u32,
}

impl WeightBands {
    pub fn weight(&self, count: usize) -> u32 {
        if count >= self.high_at {
            self.high
        } else if count >= self.medium_at {
            self.medium
        } else {
            self.base
        }
    }
}

/// Inclusive lower bounds of the medium and high tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub high: u32,
    pub medium: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Scanned in order; the first keyword found in a reason wins.
    pub reason_weights: Vec<KeywordWeight>,
    pub frequency: WeightBands,
    pub absences: WeightBands,
    pub low_grades: WeightBands,
    pub tiers: TierThresholds,
    pub top_reasons: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let reason_weights = [
            ("baja calificación", 3),
            ("inasistencias", 3),
            ("problemas de conducta", 2),
            ("reforzamiento de materia", 1),
            ("asesoría general", 1),
            ("bajo desempeño", 3),
            ("falta de motivación", 2),
            ("dificultades académicas", 2),
        ]
        .into_iter()
        .map(|(keyword, weight)| KeywordWeight {
            keyword: keyword.to_string(),
            weight,
        })
        .collect();

        Self {
            reason_weights,
            // Zero sessions still lands on the base weight of 1.
            frequency: WeightBands {
                high_at: 5,
                high: 8,
                medium_at: 3,
                medium: 4,
                base: 1,
            },
            absences: WeightBands {
                high_at: 3,
                high: 6,
                medium_at: 1,
                medium: 3,
                base: 0,
            },
            low_grades: WeightBands {
                high_at: 3,
                high: 6,
                medium_at: 1,
                medium: 3,
                base: 0,
            },
            tiers: TierThresholds { high: 15, medium: 8 },
            top_reasons: 3,
        }
    }
}

impl RiskConfig {
    fn validate(&self) -> Result<()> {
        if self.tiers.high <= self.tiers.medium {
            return Err(EngineError::InvalidConfig(format!(
                "high tier threshold ({}) must exceed medium tier threshold ({})",
                self.tiers.high, self.tiers.medium
            )));
        }
        for (name, bands) in [
            ("frequency", &self.frequency),
            ("absences", &self.absences),
            ("low_grades", &self.low_grades),
        ] {
            if bands.high_at < bands.medium_at {
                return Err(EngineError::InvalidConfig(format!(
                    "{name}: high_at ({}) is below medium_at ({})",
                    bands.high_at, bands.medium_at
                )));
            }
        }
        if self.reason_weights.iter().any(|w| w.keyword.trim().is_empty()) {
            return Err(EngineError::InvalidConfig(
                "reason_weights contains an empty keyword".to_string(),
            ));
        }
        Ok(())
    }
}

/// Maps a reason keyword to the canonical category it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub keyword: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Scanned in order; the first keyword found in a reason wins.
    pub categories: Vec<CategoryRule>,
    pub recurrence_threshold: usize,
    pub high_severity_at: usize,
    pub high_volume_at: usize,
    pub chart_reason_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        let categories = [
            ("baja calificación", "Low Grade"),
            ("bajo desempeño", "Low Grade"),
            ("inasistencia", "Absences"),
            ("falta de motivación", "Behavioral Issues"),
            ("problemas de conducta", "Behavioral Issues"),
            ("reforzamiento", "Academic Reinforcement"),
            ("asesoría general", "General Advising"),
        ]
        .into_iter()
        .map(|(keyword, category)| CategoryRule {
            keyword: keyword.to_string(),
            category: category.to_string(),
        })
        .collect();

        Self {
            categories,
            recurrence_threshold: 3,
            high_severity_at: 5,
            high_volume_at: 5,
            chart_reason_limit: 5,
        }
    }
}

impl HistoryConfig {
    fn validate(&self) -> Result<()> {
        if self.recurrence_threshold == 0 {
            return Err(EngineError::InvalidConfig(
                "recurrence_threshold must be at least 1".to_string(),
            ));
        }
        if self.categories.iter().any(|c| c.keyword.trim().is_empty()) {
            return Err(EngineError::InvalidConfig(
                "categories contains an empty keyword".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn frequency_bands_keep_base_weight_for_zero_sessions() {
        let bands = RiskConfig::default().frequency;
        assert_eq!(bands.weight(0), 1);
        assert_eq!(bands.weight(2), 1);
        assert_eq!(bands.weight(3), 4);
        assert_eq!(bands.weight(4), 4);
        assert_eq!(bands.weight(5), 8);
    }

    #[test]
    fn partial_toml_overrides_only_named_values() {
        let config = EngineConfig::from_toml_str(
            r#"
            [risk.tiers]
            high = 20
            medium = 10

            [history]
            recurrence_threshold = 2
            "#,
        )
        .expect("valid config");

        assert_eq!(config.risk.tiers, TierThresholds { high: 20, medium: 10 });
        assert_eq!(config.risk.frequency, RiskConfig::default().frequency);
        assert_eq!(config.history.recurrence_threshold, 2);
        assert_eq!(config.history.categories, HistoryConfig::default().categories);
    }

    #[test]
    fn rejects_inverted_tier_thresholds() {
        let err = EngineConfig::from_toml_str(
            r#"
            [risk.tiers]
            high = 8
            medium = 8
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_recurrence_threshold() {
        let err = EngineConfig::from_toml_str("[history]\nrecurrence_threshold = 0\n").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn reports_parse_errors() {
        let err = EngineConfig::from_toml_str("[risk\n").unwrap_err();
        assert!(matches!(err, EngineError::ConfigParse(_)));
    }
}
