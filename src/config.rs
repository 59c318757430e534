//! Run configuration: file locations, loader options and trainer settings.

use crate::data::LoadOptions;
use crate::features::UnknownCategory;
use crate::model::TrainerConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub model_path: PathBuf,
    pub has_header: bool,
    pub delimiter: u8,
    pub unknown_category: UnknownCategory,
    pub trainer: TrainerConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data = PathBuf::from("data");
        Config {
            train_path: data.join("final_fitted_purchase_again_data.csv"),
            test_path: data.join("final_fitted_purchase_again_data_eval.csv"),
            model_path: data.join("PurchaseModel.msgpack"),
            has_header: true,
            delimiter: b',',
            unknown_category: UnknownCategory::default(),
            trainer: TrainerConfig::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by `PURCHASE_TRAIN_PATH`, `PURCHASE_TEST_PATH`,
    /// `PURCHASE_MODEL_PATH` and `PURCHASE_SEED` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();
        if let Some(path) = lookup("PURCHASE_TRAIN_PATH") {
            config.train_path = path.into();
        }
        if let Some(path) = lookup("PURCHASE_TEST_PATH") {
            config.test_path = path.into();
        }
        if let Some(path) = lookup("PURCHASE_MODEL_PATH") {
            config.model_path = path.into();
        }
        if let Some(seed) = lookup("PURCHASE_SEED") {
            config.trainer.seed = seed.trim().parse().with_context(|| {
                format!("PURCHASE_SEED must be an unsigned integer, got {:?}", seed)
            })?;
        }
        Ok(config)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            has_header: self.has_header,
            delimiter: self.delimiter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.trainer.seed, 0);
        assert!(config.train_path.ends_with("final_fitted_purchase_again_data.csv"));
        assert_eq!(config.load_options(), LoadOptions::default());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> =
            [("PURCHASE_TEST_PATH", "/tmp/eval.csv"), ("PURCHASE_SEED", "17")]
                .into_iter()
                .collect();
        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.test_path, PathBuf::from("/tmp/eval.csv"));
        assert_eq!(config.trainer.seed, 17);

        let bad = Config::from_lookup(|k| (k == "PURCHASE_SEED").then(|| "abc".to_string()));
        assert!(bad.is_err());
    }
}
