//! Training / validation split registry
//!
//! The manifest lists one session reference per line. References are rewritten
//! into label log paths, and those tagged as validation sessions are held out.
//! The registry is only a membership filter.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// How manifest lines map onto label log paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRules {
    /// Textual `(from, to)` replacements applied in order to every line
    #[serde(default)]
    pub rewrites: Vec<(String, String)>,
    /// Substring marking a validation session; removed from the reference
    pub validation_tag: String,
}

impl Default for ManifestRules {
    fn default() -> Self {
        Self {
            rewrites: vec![
                (
                    "../../../ITBN_tfrecords".to_string(),
                    "../labels".to_string(),
                ),
                (".tfrecord".to_string(), ".txt".to_string()),
            ],
            validation_tag: "_validation".to_string(),
        }
    }
}

impl ManifestRules {
    /// Rules that keep references verbatim
    pub fn verbatim() -> Self {
        Self {
            rewrites: Vec::new(),
            validation_tag: "_validation".to_string(),
        }
    }
}

/// Which side of the split a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Training,
    Validation,
}

/// Partition of session references into training and validation sets
#[derive(Debug, Clone, Default)]
pub struct SplitRegistry {
    training: BTreeSet<String>,
    validation: BTreeSet<String>,
}

impl SplitRegistry {
    /// Parse manifest text
    pub fn parse(manifest: &str, rules: &ManifestRules) -> Result<Self, ComputeError> {
        if rules.validation_tag.is_empty() {
            return Err(ComputeError::Manifest(
                "validation tag must not be empty".to_string(),
            ));
        }

        let mut registry = Self::default();
        for line in manifest.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut reference = line.to_string();
            for (from, to) in &rules.rewrites {
                reference = reference.replace(from.as_str(), to);
            }

            if reference.contains(rules.validation_tag.as_str()) {
                registry
                    .validation
                    .insert(reference.replace(rules.validation_tag.as_str(), ""));
            } else {
                registry.training.insert(reference);
            }
        }

        tracing::debug!(
            training = registry.training.len(),
            validation = registry.validation.len(),
            "parsed session manifest"
        );
        Ok(registry)
    }

    /// Read and parse a manifest file
    pub fn from_path(path: &Path, rules: &ManifestRules) -> Result<Self, ComputeError> {
        let manifest = std::fs::read_to_string(path).map_err(|e| {
            ComputeError::Manifest(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&manifest, rules)
    }

    /// Which split a reference is listed under, if any
    pub fn split_of(&self, reference: &str) -> Option<Split> {
        if self.training.contains(reference) {
            Some(Split::Training)
        } else if self.validation.contains(reference) {
            Some(Split::Validation)
        } else {
            None
        }
    }

    pub fn is_training(&self, reference: &str) -> bool {
        self.training.contains(reference)
    }

    pub fn is_validation(&self, reference: &str) -> bool {
        self.validation.contains(reference)
    }

    pub fn training(&self) -> impl Iterator<Item = &str> {
        self.training.iter().map(String::as_str)
    }

    pub fn validation(&self) -> impl Iterator<Item = &str> {
        self.validation.iter().map(String::as_str)
    }

    pub fn training_count(&self) -> usize {
        self.training.len()
    }

    pub fn validation_count(&self) -> usize {
        self.validation.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "\
../../../ITBN_tfrecords/subject_01/a0.tfrecord
../../../ITBN_tfrecords/subject_01/a1_validation.tfrecord

../../../ITBN_tfrecords/subject_02/zg0.tfrecord
";

    #[test]
    fn test_partition_with_reference_rules() {
        let registry = SplitRegistry::parse(MANIFEST, &ManifestRules::default()).unwrap();

        assert_eq!(registry.training_count(), 2);
        assert_eq!(registry.validation_count(), 1);
        assert!(registry.is_training("../labels/subject_01/a0.txt"));
        assert!(registry.is_training("../labels/subject_02/zg0.txt"));
        assert!(registry.is_validation("../labels/subject_01/a1.txt"));
        assert!(!registry.is_training("../labels/subject_01/a1.txt"));
        assert_eq!(registry.split_of("../labels/subject_03/a0.txt"), None);
    }

    #[test]
    fn test_verbatim_rules() {
        let registry =
            SplitRegistry::parse("s/a0.txt\ns/a1_validation.txt\n", &ManifestRules::verbatim())
                .unwrap();
        assert_eq!(registry.split_of("s/a0.txt"), Some(Split::Training));
        assert_eq!(registry.split_of("s/a1.txt"), Some(Split::Validation));
    }

    #[test]
    fn test_empty_tag_rejected() {
        let rules = ManifestRules {
            rewrites: Vec::new(),
            validation_tag: String::new(),
        };
        assert!(matches!(
            SplitRegistry::parse("x", &rules),
            Err(ComputeError::Manifest(_))
        ));
    }

    #[test]
    fn test_missing_manifest_file() {
        let path = std::env::temp_dir().join("itbn-features-no-such-manifest.txt");
        assert!(matches!(
            SplitRegistry::from_path(&path, &ManifestRules::default()),
            Err(ComputeError::Manifest(_))
        ));
    }
}
