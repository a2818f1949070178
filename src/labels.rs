//! Class index → label table taken from the model's own `config.json`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::inference::ModelError;

/// The part of a pretrained model's `config.json` this service reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub id2label: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    labels: BTreeMap<usize, String>,
}

impl LabelTable {
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ModelConfig =
            serde_json::from_str(&raw).map_err(|source| ModelError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_model_config(config)
    }

    pub fn from_model_config(config: ModelConfig) -> Result<Self, ModelError> {
        if config.id2label.is_empty() {
            return Err(ModelError::NoLabels);
        }

        let mut labels = BTreeMap::new();
        for (key, label) in config.id2label {
            let index = key
                .trim()
                .parse::<usize>()
                .map_err(|_| ModelError::InvalidLabelIndex(key.clone()))?;
            labels.insert(index, label);
        }

        Ok(Self { labels })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Labels in class-index order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.values().map(String::as_str)
    }
}
