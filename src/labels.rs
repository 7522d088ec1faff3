use crate::config::{LabelsConfig, Validatable};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};
use thiserror::Error;

/// Label order the shipped classifier was trained with.
pub const DEFAULT_LABELS: [&str; 5] = ["AX", "BX", "CX", "DX", "K3"];

#[derive(Error, Debug)]
pub enum LabelsError {
    #[error("Failed to read label manifest: {0}")]
    Read(#[from] config::ConfigError),
    #[error("Label manifest contains no labels")]
    Empty,
    #[error("Label manifest version must be at least 1, got {0}")]
    InvalidVersion(u32),
    #[error("Label at index {0} is blank")]
    BlankLabel(usize),
    #[error("Duplicate label `{0}`")]
    DuplicateLabel(String),
}

/// Versioned mapping from classifier output index to label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassLabels {
    version: u32,
    labels: Vec<String>,
}

impl ClassLabels {
    pub fn new(version: u32, labels: Vec<String>) -> Result<Self, LabelsError> {
        let class_labels = Self { version, labels };
        class_labels.check()?;
        Ok(class_labels)
    }

    pub fn load(labels_cfg: &LabelsConfig) -> Result<Self, LabelsError> {
        Self::from_file(&labels_cfg.get_path())
    }

    pub fn from_file(path: &Path) -> Result<Self, LabelsError> {
        let manifest = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize::<ClassLabels>()?;
        manifest.check()?;

        tracing::info!(
            "Loaded label manifest v{} with {} labels from {:?}",
            manifest.version,
            manifest.labels.len(),
            path
        );

        Ok(manifest)
    }

    fn check(&self) -> Result<(), LabelsError> {
        if self.version == 0 {
            return Err(LabelsError::InvalidVersion(self.version));
        }
        if self.labels.is_empty() {
            return Err(LabelsError::Empty);
        }

        let mut seen = HashSet::new();
        for (index, label) in self.labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(LabelsError::BlankLabel(index));
            }
            if !seen.insert(label.as_str()) {
                return Err(LabelsError::DuplicateLabel(label.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self {
            version: 1,
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}
