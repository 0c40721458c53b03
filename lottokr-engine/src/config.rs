use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sampler::date_seed;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Nombre minimal de tirages pour toute analyse.
    pub min_history: usize,
    /// Fenêtre (en tirages) du taux de réussite récent.
    pub recent_window: usize,
    /// Nombre de numéros communs pour compter un succès en backtest.
    pub hit_threshold: usize,
    pub max_cdm_sets: usize,
    pub sampled_sets: usize,
    pub backtest_sets: usize,
    /// En dessous, pas de grilles issues du backtest ni de consensus.
    pub backtest_min_history: usize,
    pub seed: Option<u64>,
    pub cache_ttl_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_history: 10,
            recent_window: 30,
            hit_threshold: 2,
            max_cdm_sets: 15,
            sampled_sets: 5,
            backtest_sets: 10,
            backtest_min_history: 50,
            seed: None,
            cache_ttl_secs: 3600,
        }
    }
}

impl AnalysisConfig {
    /// Seed configuré, ou seed du jour (YYYYMMDD).
    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or_else(date_seed)
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        if seed.is_some() {
            self.seed = seed;
        }
        self
    }
}

pub fn save_config(config: &AnalysisConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)
        .with_context(|| format!("Impossible d'écrire la configuration {:?}", path))?;
    Ok(())
}

/// Charge la configuration JSON. Un fichier absent donne la configuration par défaut.
pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    if !path.exists() {
        log::debug!("Pas de configuration dans {:?}, valeurs par défaut", path);
        return Ok(AnalysisConfig::default());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire la configuration {:?}", path))?;
    let config: AnalysisConfig =
        serde_json::from_str(&json).with_context(|| format!("Configuration invalide : {:?}", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.min_history, 10);
        assert_eq!(config.recent_window, 30);
        assert_eq!(config.hit_threshold, 2);
        assert_eq!(config.backtest_min_history, 50);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        let config = AnalysisConfig {
            hit_threshold: 3,
            seed: Some(7),
            ..AnalysisConfig::default()
        };
        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, AnalysisConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"recent_window": 12}"#).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.recent_window, 12);
        assert_eq!(loaded.min_history, 10);
    }

    #[test]
    fn test_effective_seed() {
        let config = AnalysisConfig::default().with_seed(Some(99));
        assert_eq!(config.effective_seed(), 99);
        let config = config.with_seed(None);
        assert_eq!(config.effective_seed(), 99);
    }
}
