use std::sync::Arc;

use anyhow::Result;

use vidseq_catalog::frames::FsFrameLister;
use vidseq_catalog::{Catalog, CatalogConfig};
use vidseq_core::types::{Sample, Split};
use vidseq_runtime::decode::{
    DecodeError, FrameDecoder, ImageFrameDecoder, JpegCodec, ResizeBackend,
};
use vidseq_runtime::generator::{BatchGenerator, GeneratorConfig};

fn temp_dir(test_name: &str) -> Result<std::path::PathBuf> {
    let mut root = std::env::temp_dir();
    root.push(format!(
        "vidseq-runtime-{test_name}-{}-{}",
        std::process::id(),
        vidseq_observe::time::unix_time_ms()
    ));
    std::fs::create_dir_all(&root)?;
    Ok(root)
}

fn close(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() <= tol
}

#[test]
fn png_decodes_exactly_without_resize() -> Result<()> {
    let root = temp_dir("png-exact")?;
    let path = root.join("frame.png");
    image::RgbImage::from_pixel(6, 4, image::Rgb([0, 51, 255])).save(&path)?;

    let t = ImageFrameDecoder::default().decode(&path, &[4, 6, 3])?;
    assert_eq!(t.shape(), &[4, 6, 3]);
    for px in t.data().chunks(3) {
        assert_eq!(px, &[0.0, 0.2, 1.0]);
    }
    Ok(())
}

#[test]
fn jpeg_decodes_and_resizes_with_every_backend() -> Result<()> {
    let root = temp_dir("jpeg-resize")?;
    let path = root.join("frame.jpg");
    image::RgbImage::from_pixel(32, 16, image::Rgb([250, 10, 10])).save(&path)?;

    for codec in [JpegCodec::Zune, JpegCodec::Image] {
        for resize in [ResizeBackend::FastImageResize, ResizeBackend::Image] {
            let t = ImageFrameDecoder::new(codec, resize).decode(&path, &[8, 4, 3])?;
            assert_eq!(t.shape(), &[8, 4, 3]);
            for px in t.data().chunks(3) {
                assert!(close(px[0], 250.0 / 255.0, 0.08), "{codec:?}/{resize:?}: {px:?}");
                assert!(close(px[1], 10.0 / 255.0, 0.08), "{codec:?}/{resize:?}: {px:?}");
                assert!(close(px[2], 10.0 / 255.0, 0.08), "{codec:?}/{resize:?}: {px:?}");
            }
        }
    }
    Ok(())
}

#[test]
fn single_channel_is_luma() -> Result<()> {
    let root = temp_dir("luma")?;
    let path = root.join("frame.png");
    image::RgbImage::from_pixel(3, 3, image::Rgb([255, 255, 255])).save(&path)?;

    let t = ImageFrameDecoder::default().decode(&path, &[3, 3, 1])?;
    assert_eq!(t.shape(), &[3, 3, 1]);
    assert!(t.data().iter().all(|&v| close(v, 1.0, 1e-4)));
    Ok(())
}

#[test]
fn unsupported_shapes_are_rejected() {
    let decoder = ImageFrameDecoder::default();
    let path = std::path::Path::new("/does/not/matter.jpg");
    for shape in [vec![4, 4], vec![4, 4, 2], vec![0, 4, 3], vec![4, 4, 3, 1]] {
        assert!(matches!(
            decoder.decode(path, &shape),
            Err(DecodeError::UnsupportedShape(_))
        ));
    }
}

#[test]
fn missing_file_is_an_io_error() -> Result<()> {
    let root = temp_dir("missing")?;
    let err = ImageFrameDecoder::default()
        .decode(&root.join("nope.jpg"), &[2, 2, 3])
        .unwrap_err();
    assert!(matches!(err, DecodeError::Io { .. }));
    Ok(())
}

#[test]
fn garbage_bytes_fail_to_decode() -> Result<()> {
    let root = temp_dir("garbage")?;
    let path = root.join("frame.jpg");
    std::fs::write(&path, [0xFF, 0xD8, 0x00, 0x01, 0x02])?;
    let err = ImageFrameDecoder::default()
        .decode(&path, &[2, 2, 3])
        .unwrap_err();
    assert!(matches!(err, DecodeError::Decode { .. }));
    Ok(())
}

#[test]
fn generator_reads_frames_from_disk() -> Result<()> {
    let root = temp_dir("end-to-end")?;
    let clips = [
        ("Archery", "v_Archery_g01_c01", [200u8, 0, 0]),
        ("Bowling", "v_Bowling_g01_c01", [0u8, 200, 0]),
    ];
    let mut raw = Vec::new();
    for (class, clip, color) in clips {
        let dir = root.join("train").join(class);
        std::fs::create_dir_all(&dir)?;
        for i in 1..=6 {
            let path = dir.join(format!("{clip}-{i:04}.png"));
            image::RgbImage::from_pixel(10, 10, image::Rgb(color)).save(&path)?;
        }
        raw.push(Sample::new(Split::Train, class, clip, 6));
    }

    let catalog = Arc::new(Catalog::new(
        CatalogConfig {
            seq_length: 3,
            class_limit: None,
            image_shape: vec![5, 5, 3],
            ..CatalogConfig::default()
        },
        raw,
    )?);
    let gen = BatchGenerator::new(
        catalog.clone(),
        Arc::new(FsFrameLister::new(&root).with_extension("png")),
        Arc::new(ImageFrameDecoder::default()),
        GeneratorConfig {
            batch_size: 2,
            partition: Split::Train,
            seed: Some(1),
            decode_threads: 2,
        },
    )?;

    let batch = gen.next_batch()?;
    assert_eq!(batch.x.shape(), &[2, 3, 5, 5, 3]);
    assert_eq!(batch.y.shape(), &[2, 2]);
    for (i, clip) in batch.clips.iter().enumerate() {
        let row = batch.x.row(i).expect("row");
        let red = row[0];
        let label = batch.y.row(i).expect("label");
        if clip.starts_with("v_Archery") {
            assert!(close(red, 200.0 / 255.0, 0.02));
            assert_eq!(label, &[1.0, 0.0]);
        } else {
            assert!(close(red, 0.0, 0.02));
            assert_eq!(label, &[0.0, 1.0]);
        }
    }
    Ok(())
}
