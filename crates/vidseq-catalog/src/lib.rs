#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod frames;
pub mod manifest;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use vidseq_core::encode::one_hot;
use vidseq_core::types::{Sample, Split};

use crate::manifest::ManifestError;

/// Clips with more extracted frames than this are skipped.
pub const DEFAULT_MAX_FRAMES: u64 = 300;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unknown class {0:?}")]
    UnknownClass(String),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Frames per generated sequence; also the minimum clip length kept.
    pub seq_length: usize,
    /// Keep only the first N classes in sorted order. `None` keeps all.
    pub class_limit: Option<usize>,
    /// Per-frame tensor shape, `[height, width, channels]` for image decoders.
    pub image_shape: Vec<usize>,
    pub max_frames: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            seq_length: 40,
            class_limit: None,
            image_shape: vec![80, 80, 3],
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

impl CatalogConfig {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.seq_length == 0 {
            return Err(CatalogError::InvalidConfig(
                "seq_length must be > 0".to_string(),
            ));
        }
        if self.class_limit == Some(0) {
            return Err(CatalogError::InvalidConfig(
                "class_limit must be > 0 when set".to_string(),
            ));
        }
        if self.image_shape.is_empty() {
            return Err(CatalogError::InvalidConfig(
                "image_shape must be non-empty".to_string(),
            ));
        }
        if self.image_shape.contains(&0) {
            return Err(CatalogError::InvalidConfig(format!(
                "image_shape dims must be > 0 (got {:?})",
                self.image_shape
            )));
        }
        Ok(())
    }

    fn length_in_bounds(&self, frame_count: u64) -> bool {
        let min = u64::try_from(self.seq_length).unwrap_or(u64::MAX);
        min <= frame_count && frame_count <= self.max_frames
    }
}

/// Sorted, deduplicated class labels, truncated to `limit` when set.
pub fn class_vocabulary(samples: &[Sample], limit: Option<usize>) -> Vec<String> {
    let mut classes: Vec<String> = samples.iter().map(|s| s.class_label.clone()).collect();
    classes.sort();
    classes.dedup();
    if let Some(limit) = limit {
        classes.truncate(limit);
    }
    classes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub raw_samples: usize,
    pub kept_samples: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    pub classes: usize,
}

impl CatalogSummary {
    pub fn dropped_samples(&self) -> usize {
        self.raw_samples.saturating_sub(self.kept_samples)
    }
}

/// The labeled clips usable for training, plus the class index they are encoded against.
///
/// Built once and read-only afterwards, so it can be shared across threads without
/// locking.
#[derive(Debug, Clone)]
pub struct Catalog {
    config: CatalogConfig,
    classes: Vec<String>,
    samples: Vec<Sample>,
    raw_len: usize,
}

impl Catalog {
    /// The vocabulary comes from all of `raw`; filtering happens after, so class
    /// indices do not depend on which clips survive the length bounds.
    pub fn new(config: CatalogConfig, raw: Vec<Sample>) -> Result<Self, CatalogError> {
        config.validate()?;

        let raw_len = raw.len();
        let classes = class_vocabulary(&raw, config.class_limit);
        let samples: Vec<Sample> = raw
            .into_iter()
            .filter(|s| {
                config.length_in_bounds(s.frame_count)
                    && classes.binary_search(&s.class_label).is_ok()
            })
            .collect();

        let catalog = Self {
            config,
            classes,
            samples,
            raw_len,
        };
        let summary = catalog.summary();
        info!(
            target: "vidseq_proof",
            event = "catalog_built",
            raw_samples = summary.raw_samples,
            kept_samples = summary.kept_samples,
            train_samples = summary.train_samples,
            test_samples = summary.test_samples,
            classes = summary.classes,
            seq_length = catalog.config.seq_length,
            max_frames = catalog.config.max_frames,
            "built catalog"
        );
        if summary.kept_samples == 0 {
            warn!(
                raw_samples = summary.raw_samples,
                "no samples passed the length and class filters"
            );
        }
        Ok(catalog)
    }

    pub fn open(
        config: CatalogConfig,
        manifest_path: impl AsRef<Path>,
    ) -> Result<Self, CatalogError> {
        let raw = manifest::read_manifest_file(manifest_path)?;
        Self::new(config, raw)
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn seq_length(&self) -> usize {
        self.config.seq_length
    }

    pub fn image_shape(&self) -> &[usize] {
        &self.config.image_shape
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Samples that passed the filters, in manifest order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn raw_len(&self) -> usize {
        self.raw_len
    }

    pub fn class_index(&self, class_label: &str) -> Result<usize, CatalogError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(class_label))
            .map_err(|_| CatalogError::UnknownClass(class_label.to_string()))
    }

    pub fn one_hot(&self, class_label: &str) -> Result<Vec<f32>, CatalogError> {
        let idx = self.class_index(class_label)?;
        Ok(one_hot(idx, self.classes.len()))
    }

    /// Kept samples belonging to `split`. Recomputed on every call.
    pub fn partition(&self, split: Split) -> Vec<Sample> {
        self.samples
            .iter()
            .filter(|s| s.split == split)
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> CatalogSummary {
        let train_samples = self
            .samples
            .iter()
            .filter(|s| s.split == Split::Train)
            .count();
        CatalogSummary {
            raw_samples: self.raw_len,
            kept_samples: self.samples.len(),
            train_samples,
            test_samples: self.samples.len() - train_samples,
            classes: self.classes.len(),
        }
    }
}
