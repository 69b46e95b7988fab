#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::{info, info_span, warn, Instrument};

use vidseq_catalog::frames::FsFrameLister;
use vidseq_catalog::{Catalog, CatalogConfig};
use vidseq_core::ranking::{format_predictions, top_predictions};
use vidseq_core::types::Split;
use vidseq_runtime::decode::{ImageFrameDecoder, JpegCodec, ResizeBackend};
use vidseq_runtime::generator::{BatchGenerator, GeneratorConfig, GeneratorMetrics};

#[derive(Debug, Parser)]
#[command(name = "vidseq-demo")]
struct Args {
    /// Root of the extracted frames: `<data_root>/<split>/<class>/<clip_id>*.<ext>`.
    #[arg(long, env = "VIDSEQ_DATA_ROOT")]
    data_root: PathBuf,

    /// CSV manifest; defaults to `<data_root>/data_file.csv`.
    #[arg(long, env = "VIDSEQ_MANIFEST")]
    manifest: Option<PathBuf>,

    #[arg(long, env = "VIDSEQ_FRAME_EXT", default_value = "jpg")]
    frame_ext: String,

    #[arg(long, env = "VIDSEQ_SEQ_LENGTH", default_value_t = 40)]
    seq_length: usize,

    #[arg(long, env = "VIDSEQ_CLASS_LIMIT")]
    class_limit: Option<usize>,

    #[arg(long, env = "VIDSEQ_MAX_FRAMES", default_value_t = vidseq_catalog::DEFAULT_MAX_FRAMES)]
    max_frames: u64,

    #[arg(long, env = "VIDSEQ_IMAGE_HEIGHT", default_value_t = 80)]
    image_height: usize,

    #[arg(long, env = "VIDSEQ_IMAGE_WIDTH", default_value_t = 80)]
    image_width: usize,

    #[arg(long, env = "VIDSEQ_IMAGE_CHANNELS", default_value_t = 3)]
    image_channels: usize,

    #[arg(long, env = "VIDSEQ_BATCH_SIZE", default_value_t = 32)]
    batch_size: usize,

    #[arg(long, env = "VIDSEQ_PARTITION", default_value = "train")]
    partition: Split,

    /// Threads pulling batches from the shared generator.
    #[arg(long, env = "VIDSEQ_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Total batches to pull across all workers (0 runs until ctrl-c).
    #[arg(long, env = "VIDSEQ_BATCHES", default_value_t = 100)]
    batches: u64,

    #[arg(long, env = "VIDSEQ_SEED")]
    seed: Option<u64>,

    #[arg(long, env = "VIDSEQ_DECODE_THREADS", default_value_t = 1)]
    decode_threads: usize,

    /// zune|image
    #[arg(long, env = "VIDSEQ_JPEG_CODEC", default_value = "zune")]
    jpeg_codec: String,

    /// fast|image
    #[arg(long, env = "VIDSEQ_RESIZE_BACKEND", default_value = "fast")]
    resize_backend: String,

    /// Periodically emit a metrics snapshot (0 disables).
    #[arg(long, env = "VIDSEQ_METRICS_SNAPSHOT_INTERVAL_MS", default_value_t = 1000)]
    metrics_snapshot_interval_ms: u64,
}

fn jpeg_codec_from_arg(raw: &str) -> Result<JpegCodec> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "zune" => Ok(JpegCodec::Zune),
        "image" => Ok(JpegCodec::Image),
        _ => anyhow::bail!("invalid jpeg codec {raw:?} (expected: zune|image)"),
    }
}

fn resize_backend_from_arg(raw: &str) -> Result<ResizeBackend> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "fast" | "fir" | "fast_image_resize" => Ok(ResizeBackend::FastImageResize),
        "image" => Ok(ResizeBackend::Image),
        _ => anyhow::bail!("invalid resize backend {raw:?} (expected: fast|image)"),
    }
}

fn emit_metrics_snapshot(metrics: &GeneratorMetrics, partition: Split) {
    let build = metrics.batch_build.snapshot();
    tracing::info!(
        target: "vidseq_metrics",
        partition = %partition,
        batches_total = metrics.batches_total.get(),
        samples_total = metrics.samples_total.get(),
        frames_decoded_total = metrics.frames_decoded_total.get(),
        failed_batches_total = metrics.failed_batches_total.get(),
        max_listed_frames = metrics.max_listed_frames.get(),
        batch_build_avg_us = build.avg_us(),
        batch_build_max_us = build.max_us,
        "metrics"
    );
}

/// Pulls batches until the shared budget runs out or `stop` is set, returning
/// how many times each class appeared. A failed batch sets `stop` so the other
/// workers wind down too.
fn run_worker(
    worker_id: usize,
    generator: &BatchGenerator,
    remaining: &AtomicU64,
    unbounded: bool,
    stop: &AtomicBool,
) -> Result<Vec<f64>> {
    let mut label_counts = vec![0.0f64; generator.catalog().num_classes()];
    while !stop.load(Ordering::Relaxed) {
        if !unbounded
            && remaining
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |r| r.checked_sub(1))
                .is_err()
        {
            break;
        }

        let started = Instant::now();
        let batch = match generator.next_batch() {
            Ok(batch) => batch,
            Err(e) => {
                stop.store(true, Ordering::Relaxed);
                return Err(e.into());
            }
        };
        for i in 0..batch.batch_size() {
            let Some(row) = batch.y.row(i) else {
                continue;
            };
            for (count, &v) in label_counts.iter_mut().zip(row) {
                *count += f64::from(v);
            }
        }
        tracing::debug!(
            worker_id = worker_id as u64,
            x_shape = ?batch.x.shape(),
            y_shape = ?batch.y.shape(),
            elapsed_us = vidseq_observe::time::elapsed_us(started),
            "batch delivered"
        );
    }
    Ok(label_counts)
}

#[tokio::main]
async fn main() -> Result<()> {
    vidseq_observe::logging::init_tracing();
    let args = Args::parse();

    let span = info_span!(
        "vidseq-demo",
        partition = %args.partition,
        seq_length = args.seq_length as u64,
        batch_size = args.batch_size as u64,
        workers = args.workers as u64,
        batches = args.batches,
    );

    async move {
        anyhow::ensure!(args.workers > 0, "workers must be > 0");
        let manifest = args
            .manifest
            .clone()
            .unwrap_or_else(|| args.data_root.join("data_file.csv"));

        let catalog = Arc::new(Catalog::open(
            CatalogConfig {
                seq_length: args.seq_length,
                class_limit: args.class_limit,
                image_shape: vec![args.image_height, args.image_width, args.image_channels],
                max_frames: args.max_frames,
            },
            &manifest,
        )?);

        let decoder = ImageFrameDecoder::new(
            jpeg_codec_from_arg(&args.jpeg_codec)?,
            resize_backend_from_arg(&args.resize_backend)?,
        );
        let lister = FsFrameLister::new(&args.data_root).with_extension(args.frame_ext.clone());
        let generator = Arc::new(BatchGenerator::new(
            catalog.clone(),
            Arc::new(lister),
            Arc::new(decoder),
            GeneratorConfig {
                batch_size: args.batch_size,
                partition: args.partition,
                seed: args.seed,
                decode_threads: args.decode_threads,
            },
        )?);
        let metrics = generator.metrics();

        let metrics_task = if args.metrics_snapshot_interval_ms > 0 {
            let interval_ms = std::cmp::max(1, args.metrics_snapshot_interval_ms);
            let metrics = metrics.clone();
            let partition = args.partition;
            Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
                loop {
                    ticker.tick().await;
                    emit_metrics_snapshot(&metrics, partition);
                }
            }))
        } else {
            None
        };

        let stop = Arc::new(AtomicBool::new(false));
        let ctrl_c_task = {
            let stop = stop.clone();
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    warn!("ctrl-c received; finishing in-flight batches");
                    stop.store(true, Ordering::Relaxed);
                }
            })
        };

        let start = Instant::now();
        info!("starting batch workers");

        let remaining = Arc::new(AtomicU64::new(args.batches));
        let unbounded = args.batches == 0;
        let mut workers = Vec::with_capacity(args.workers);
        for worker_id in 0..args.workers {
            let generator = generator.clone();
            let remaining = remaining.clone();
            let stop = stop.clone();
            workers.push(tokio::task::spawn_blocking(move || {
                run_worker(worker_id, &generator, &remaining, unbounded, &stop)
            }));
        }

        let mut label_counts = vec![0.0f64; catalog.num_classes()];
        let mut first_err: Option<anyhow::Error> = None;
        for worker in workers {
            match worker.await? {
                Ok(counts) => {
                    for (total, c) in label_counts.iter_mut().zip(counts) {
                        *total += c;
                    }
                }
                Err(e) => {
                    stop.store(true, Ordering::Relaxed);
                    first_err.get_or_insert(e);
                }
            }
        }

        ctrl_c_task.abort();
        if let Some(task) = metrics_task {
            task.abort();
        }
        emit_metrics_snapshot(&metrics, args.partition);
        if let Some(e) = first_err {
            return Err(e);
        }

        let drawn: f64 = label_counts.iter().sum();
        if drawn > 0.0 {
            let shares: Vec<f32> = label_counts.iter().map(|&c| (c / drawn) as f32).collect();
            let top = top_predictions(&shares, catalog.classes(), 5);
            for line in format_predictions(&top).lines() {
                info!(class_share = %line, "most drawn classes");
            }
        }

        let elapsed = start.elapsed();
        let samples = metrics.samples_total.get();
        let throughput = if elapsed.as_secs_f64() > 0.0 {
            samples as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            batches = metrics.batches_total.get(),
            samples = samples,
            samples_per_sec = throughput,
            "demo complete"
        );

        Ok(())
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidseq_core::types::Sample;

    fn generator_without_frames() -> anyhow::Result<BatchGenerator> {
        let mut root = std::env::temp_dir();
        root.push(format!(
            "vidseq-demo-no-frames-{}-{}",
            std::process::id(),
            vidseq_observe::time::unix_time_ms()
        ));
        let catalog = Catalog::new(
            CatalogConfig {
                seq_length: 2,
                image_shape: vec![2, 2, 3],
                ..CatalogConfig::default()
            },
            vec![Sample::new(Split::Train, "Archery", "v_Archery_g01_c01", 10)],
        )?;
        Ok(BatchGenerator::new(
            Arc::new(catalog),
            Arc::new(FsFrameLister::new(root)),
            Arc::new(ImageFrameDecoder::default()),
            GeneratorConfig {
                batch_size: 1,
                seed: Some(0),
                ..GeneratorConfig::default()
            },
        )?)
    }

    #[test]
    fn failing_worker_stops_the_others() -> anyhow::Result<()> {
        let generator = generator_without_frames()?;
        let remaining = AtomicU64::new(0);
        let stop = AtomicBool::new(false);

        assert!(run_worker(0, &generator, &remaining, true, &stop).is_err());
        assert!(stop.load(Ordering::Relaxed));

        // A worker started after the failure exits without pulling a batch.
        let counts = run_worker(1, &generator, &remaining, true, &stop)?;
        assert_eq!(counts, vec![0.0]);
        assert_eq!(generator.metrics().failed_batches_total.get(), 1);
        Ok(())
    }

    #[test]
    fn codec_flags_parse() {
        assert_eq!(jpeg_codec_from_arg(" Zune ").ok(), Some(JpegCodec::Zune));
        assert_eq!(
            resize_backend_from_arg("image").ok(),
            Some(ResizeBackend::Image)
        );
        assert!(jpeg_codec_from_arg("turbo").is_err());
    }
}
