use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use vidseq_catalog::frames::FrameLister;
use vidseq_catalog::{Catalog, CatalogError};
use vidseq_core::rescale::{rescale, RescaleError};
use vidseq_core::types::{Sample, Split};
use vidseq_observe::metrics::{Counter, DurationAgg, Gauge, ScopedTimer};

use crate::decode::{DecodeError, FrameDecoder};
use crate::types::{Batch, ShapeError, Tensor};

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("partition {0} has no samples")]
    EmptyPartition(Split),
    #[error("batch of {requested} needs more samples than partition {split} has ({available})")]
    InsufficientData {
        split: Split,
        requested: usize,
        available: usize,
    },
    #[error("no frames found for clip {clip_id} ({split}/{class_label})")]
    NoFramesFound {
        split: Split,
        class_label: String,
        clip_id: String,
    },
    #[error("clip {clip_id}: {source}")]
    Invariant {
        clip_id: String,
        #[source]
        source: RescaleError,
    },
    #[error("listing frames for clip {clip_id} failed: {source}")]
    Io {
        clip_id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("clip {clip_id}: {source}")]
    Decode {
        clip_id: String,
        #[source]
        source: DecodeError,
    },
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("batch assembly failed: {0}")]
    Shape(#[from] ShapeError),
    #[error("decode pool: {0}")]
    DecodePool(String),
    #[error("generator lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub batch_size: usize,
    pub partition: Split,
    /// Fixed seed for reproducible draws; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Frames of one clip are decoded on a dedicated rayon pool when > 1.
    pub decode_threads: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            partition: Split::Train,
            seed: None,
            decode_threads: 1,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), GeneratorError> {
        if self.batch_size == 0 {
            return Err(GeneratorError::InvalidConfig(
                "batch_size must be > 0".to_string(),
            ));
        }
        if self.decode_threads == 0 {
            return Err(GeneratorError::InvalidConfig(
                "decode_threads must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct GeneratorMetrics {
    pub batches_total: Counter,
    pub samples_total: Counter,
    pub frames_decoded_total: Counter,
    pub failed_batches_total: Counter,
    /// Largest frame listing seen for a single clip, before rescaling.
    pub max_listed_frames: Gauge,
    pub batch_build: DurationAgg,
}

/// Endless source of random batches drawn from one catalog partition.
///
/// `next_batch` holds a single lock from the random draw through decoding and
/// assembly, so concurrent callers are served one whole batch at a time. Each
/// call draws independently: samples are distinct within a batch but may repeat
/// across batches.
pub struct BatchGenerator {
    catalog: Arc<Catalog>,
    lister: Arc<dyn FrameLister>,
    decoder: Arc<dyn FrameDecoder>,
    config: GeneratorConfig,
    data: Vec<Sample>,
    decode_pool: Option<rayon::ThreadPool>,
    rng: Mutex<StdRng>,
    metrics: Arc<GeneratorMetrics>,
}

impl BatchGenerator {
    pub fn new(
        catalog: Arc<Catalog>,
        lister: Arc<dyn FrameLister>,
        decoder: Arc<dyn FrameDecoder>,
        config: GeneratorConfig,
    ) -> Result<Self, GeneratorError> {
        config.validate()?;

        let data = catalog.partition(config.partition);
        if data.is_empty() {
            return Err(GeneratorError::EmptyPartition(config.partition));
        }

        let decode_pool = if config.decode_threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.decode_threads)
                    .thread_name(|i| format!("vidseq-decode-{i}"))
                    .build()
                    .map_err(|e| GeneratorError::DecodePool(e.to_string()))?,
            )
        } else {
            None
        };

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            target: "vidseq_proof",
            event = "generator_created",
            partition = %config.partition,
            samples = data.len() as u64,
            batch_size = config.batch_size as u64,
            seq_length = catalog.seq_length() as u64,
            decode_threads = config.decode_threads as u64,
            "creating generator"
        );

        Ok(Self {
            catalog,
            lister,
            decoder,
            config,
            data,
            decode_pool,
            rng: Mutex::new(rng),
            metrics: Arc::new(GeneratorMetrics::default()),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Number of samples in the partition this generator draws from.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn metrics(&self) -> Arc<GeneratorMetrics> {
        self.metrics.clone()
    }

    /// Builds the next batch. Blocks while another caller is building one.
    ///
    /// Any per-sample failure aborts the whole batch; a short batch is never
    /// returned.
    pub fn next_batch(&self) -> Result<Batch, GeneratorError> {
        let mut rng = self.rng.lock().map_err(|_| GeneratorError::LockPoisoned)?;
        let result = {
            let _timer = ScopedTimer::new(&self.metrics.batch_build);
            self.build_batch(&mut rng)
        };
        drop(rng);

        match &result {
            Ok(batch) => {
                self.metrics.batches_total.inc();
                self.metrics
                    .samples_total
                    .inc_by(batch.batch_size() as u64);
            }
            Err(e) => {
                self.metrics.failed_batches_total.inc();
                warn!(
                    partition = %self.config.partition,
                    error = %e,
                    "batch failed"
                );
            }
        }
        result
    }

    /// Unbounded iterator over [`next_batch`](Self::next_batch) results.
    pub fn iter(&self) -> Batches<'_> {
        Batches { generator: self }
    }

    fn build_batch(&self, rng: &mut StdRng) -> Result<Batch, GeneratorError> {
        let batch_size = self.config.batch_size;
        if batch_size > self.data.len() {
            return Err(GeneratorError::InsufficientData {
                split: self.config.partition,
                requested: batch_size,
                available: self.data.len(),
            });
        }

        let seq_length = self.catalog.seq_length();
        let image_shape = self.catalog.image_shape();
        let num_classes = self.catalog.num_classes();
        let frame_len: usize = image_shape.iter().product();

        let mut x: Vec<f32> = Vec::with_capacity(batch_size * seq_length * frame_len);
        let mut y: Vec<f32> = Vec::with_capacity(batch_size * num_classes);
        let mut clips: Vec<String> = Vec::with_capacity(batch_size);

        let picks = rand::seq::index::sample(rng, self.data.len(), batch_size);
        for idx in picks.iter() {
            let sample = &self.data[idx];
            let frames = self.resolve_frames(sample, seq_length)?;
            for frame in self.decode_sequence(sample, &frames, image_shape)? {
                x.extend_from_slice(frame.data());
            }
            self.metrics
                .frames_decoded_total
                .inc_by(frames.len() as u64);

            y.extend(self.catalog.one_hot(&sample.class_label)?);
            clips.push(sample.clip_id.clone());
        }

        let mut x_shape = vec![batch_size, seq_length];
        x_shape.extend_from_slice(image_shape);

        debug!(
            partition = %self.config.partition,
            clips = ?clips,
            "assembled batch"
        );

        Ok(Batch {
            x: Tensor::from_vec(x_shape, x)?,
            y: Tensor::from_vec(vec![batch_size, num_classes], y)?,
            clips,
        })
    }

    /// Sorted frame paths for `sample`, evenly subsampled to `seq_length`.
    fn resolve_frames(
        &self,
        sample: &Sample,
        seq_length: usize,
    ) -> Result<Vec<PathBuf>, GeneratorError> {
        let frames = self
            .lister
            .list_frames(sample)
            .map_err(|source| GeneratorError::Io {
                clip_id: sample.clip_id.clone(),
                source,
            })?;
        self.metrics.max_listed_frames.max(frames.len() as u64);
        if frames.is_empty() {
            return Err(GeneratorError::NoFramesFound {
                split: sample.split,
                class_label: sample.class_label.clone(),
                clip_id: sample.clip_id.clone(),
            });
        }
        rescale(&frames, seq_length).map_err(|source| GeneratorError::Invariant {
            clip_id: sample.clip_id.clone(),
            source,
        })
    }

    fn decode_sequence(
        &self,
        sample: &Sample,
        frames: &[PathBuf],
        image_shape: &[usize],
    ) -> Result<Vec<Tensor>, GeneratorError> {
        let decode_one = |path: &PathBuf| -> Result<Tensor, DecodeError> {
            let t = self.decoder.decode(path, image_shape)?;
            if t.shape() != image_shape {
                return Err(DecodeError::ShapeMismatch {
                    path: path.clone(),
                    expected: image_shape.to_vec(),
                    got: t.shape().to_vec(),
                });
            }
            Ok(t)
        };

        let decoded: Result<Vec<Tensor>, DecodeError> = match &self.decode_pool {
            Some(pool) => pool.install(|| frames.par_iter().map(decode_one).collect()),
            None => frames.iter().map(decode_one).collect(),
        };
        decoded.map_err(|source| GeneratorError::Decode {
            clip_id: sample.clip_id.clone(),
            source,
        })
    }
}

/// Infinite iterator returned by [`BatchGenerator::iter`].
pub struct Batches<'a> {
    generator: &'a BatchGenerator,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch, GeneratorError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.generator.next_batch())
    }
}
