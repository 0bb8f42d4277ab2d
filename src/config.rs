//! Application configuration loaded from an optional JSON file.
//!
//! Every field has a default; a missing file yields `AppConfig::default()`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::{DomainError, DomainResult};
use crate::rank::MIN_GAP;

/// When a failed gap forecast gets its normalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    /// Before the request returns
    #[default]
    Inline,
    /// On the background queue
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Smallest neighbor gap that still counts as room for future inserts
    pub min_gap: f64,
    /// Automatic retries after a concurrent writer took the chosen rank
    pub collision_retries: u32,
    pub normalization: NormalizationMode,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_gap: MIN_GAP,
            collision_retries: 1,
            normalization: NormalizationMode::Inline,
        }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if !self.min_gap.is_finite() || self.min_gap <= 0.0 {
            return Err(DomainError::InvalidInput(format!(
                "min_gap must be a positive number, got {}",
                self.min_gap
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// Rolling log directory; `./logs` when unset
    pub log_dir: Option<PathBuf>,
    pub ranking: RankingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("list_rank.db"),
            log_dir: None,
            ranking: RankingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> DomainResult<Self> {
        if !path.exists() {
            log::debug!("config not found at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| DomainError::Internal(format!("Failed to read config: {}", e)))?;
        let config: AppConfig = serde_json::from_str(&content).map_err(|e| {
            DomainError::InvalidInput(format!("Malformed config {}: {}", path.display(), e))
        })?;
        config.ranking.validate()?;

        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> DomainResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DomainError::Internal(format!("Failed to create config dir: {}", e)))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| DomainError::Internal(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| DomainError::Internal(format!("Failed to write config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.ranking.collision_retries, 1);
        assert_eq!(config.ranking.normalization, NormalizationMode::Inline);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "ranking": { "normalization": "deferred" } }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.ranking.normalization, NormalizationMode::Deferred);
        assert_eq!(config.ranking.min_gap, MIN_GAP);
        assert_eq!(config.db_path, PathBuf::from("list_rank.db"));
    }

    #[test]
    fn test_malformed_file_is_invalid_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(AppConfig::load(&path), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_non_positive_min_gap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "ranking": { "min_gap": 0.0 } }"#).unwrap();

        assert!(matches!(AppConfig::load(&path), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            db_path: dir.path().join("ranks.db"),
            log_dir: Some(dir.path().join("logs")),
            ranking: RankingConfig {
                min_gap: 0.5,
                collision_retries: 3,
                normalization: NormalizationMode::Deferred,
            },
        };

        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }
}
