use std::path::{Path, PathBuf};

use ::image::imageops::FilterType as ImageFilterType;
use fast_image_resize::images::Image as FirImage;
use fast_image_resize::{
    FilterType as FirFilterType, PixelType as FirPixelType, ResizeAlg as FirResizeAlg,
    ResizeOptions as FirResizeOptions, Resizer as FirResizer,
};
use thiserror::Error;
use zune_jpeg::zune_core::bytestream::ZCursor;
use zune_jpeg::JpegDecoder;

use crate::types::Tensor;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported frame shape {0:?} (expected [height, width, 1|3])")]
    UnsupportedShape(Vec<usize>),
    #[error("read {} failed: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decode {} failed: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("resize {} failed: {reason}", path.display())]
    Resize { path: PathBuf, reason: String },
    #[error("decoded {} has shape {got:?}, expected {expected:?}", path.display())]
    ShapeMismatch {
        path: PathBuf,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
}

/// Turns one frame file into a tensor of exactly `shape`.
///
/// Implementations are called while the generator lock is held, possibly from
/// several rayon workers at once.
pub trait FrameDecoder: Send + Sync + 'static {
    fn decode(&self, path: &Path, shape: &[usize]) -> Result<Tensor, DecodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JpegCodec {
    #[default]
    Zune,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeBackend {
    #[default]
    FastImageResize,
    Image,
}

/// Decodes JPEG/PNG frames to HWC `f32` in `[0, 1]`, resized to the requested
/// height and width. One channel requests luma, three request RGB.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFrameDecoder {
    jpeg_codec: JpegCodec,
    resize_backend: ResizeBackend,
}

impl ImageFrameDecoder {
    pub fn new(jpeg_codec: JpegCodec, resize_backend: ResizeBackend) -> Self {
        Self {
            jpeg_codec,
            resize_backend,
        }
    }
}

struct Rgb {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

fn looks_like_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xD8
}

fn decode_rgb_with_image(bytes: &[u8], path: &Path) -> Result<Rgb, DecodeError> {
    let decoded = ::image::load_from_memory(bytes).map_err(|e| DecodeError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let rgb = decoded.to_rgb8();
    let (width, height) = (rgb.width(), rgb.height());
    Ok(Rgb {
        pixels: rgb.into_raw(),
        width,
        height,
    })
}

/// `None` when zune hands back something other than 3-channel output (e.g. a
/// grayscale or CMYK JPEG); the caller falls back to the `image` crate.
fn decode_jpeg_rgb_with_zune(bytes: &[u8], path: &Path) -> Result<Option<Rgb>, DecodeError> {
    let mut decoder = JpegDecoder::new(ZCursor::new(bytes));
    let pixels = decoder.decode().map_err(|e| DecodeError::Decode {
        path: path.to_path_buf(),
        reason: format!("zune: {e}"),
    })?;
    let info = decoder.info().ok_or_else(|| DecodeError::Decode {
        path: path.to_path_buf(),
        reason: "zune: missing image info".to_string(),
    })?;
    let width = u32::from(info.width);
    let height = u32::from(info.height);
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(3));
    if expected_len != Some(pixels.len()) {
        return Ok(None);
    }
    Ok(Some(Rgb {
        pixels,
        width,
        height,
    }))
}

fn dim_u32(v: usize, shape: &[usize]) -> Result<u32, DecodeError> {
    u32::try_from(v)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| DecodeError::UnsupportedShape(shape.to_vec()))
}

impl ImageFrameDecoder {
    fn decode_rgb(&self, bytes: &[u8], path: &Path) -> Result<Rgb, DecodeError> {
        if self.jpeg_codec == JpegCodec::Zune && looks_like_jpeg(bytes) {
            if let Some(rgb) = decode_jpeg_rgb_with_zune(bytes, path)? {
                return Ok(rgb);
            }
        }
        decode_rgb_with_image(bytes, path)
    }

    fn resize(
        &self,
        src: Rgb,
        width: u32,
        height: u32,
        path: &Path,
    ) -> Result<Vec<u8>, DecodeError> {
        if src.width == width && src.height == height {
            return Ok(src.pixels);
        }
        match self.resize_backend {
            ResizeBackend::FastImageResize => {
                let src_image =
                    FirImage::from_vec_u8(src.width, src.height, src.pixels, FirPixelType::U8x3)
                        .map_err(|e| DecodeError::Resize {
                            path: path.to_path_buf(),
                            reason: e.to_string(),
                        })?;
                let mut dst_image = FirImage::new(width, height, FirPixelType::U8x3);
                let options = FirResizeOptions::new()
                    .resize_alg(FirResizeAlg::Convolution(FirFilterType::Bilinear));
                FirResizer::new()
                    .resize(&src_image, &mut dst_image, &options)
                    .map_err(|e| DecodeError::Resize {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    })?;
                Ok(dst_image.into_vec())
            }
            ResizeBackend::Image => {
                let rgb = ::image::RgbImage::from_raw(src.width, src.height, src.pixels)
                    .ok_or_else(|| DecodeError::Resize {
                        path: path.to_path_buf(),
                        reason: "decoded buffer does not match its dimensions".to_string(),
                    })?;
                let resized =
                    ::image::imageops::resize(&rgb, width, height, ImageFilterType::Triangle);
                Ok(resized.into_raw())
            }
        }
    }
}

impl FrameDecoder for ImageFrameDecoder {
    fn decode(&self, path: &Path, shape: &[usize]) -> Result<Tensor, DecodeError> {
        let &[h, w, c] = shape else {
            return Err(DecodeError::UnsupportedShape(shape.to_vec()));
        };
        if c != 1 && c != 3 {
            return Err(DecodeError::UnsupportedShape(shape.to_vec()));
        }
        let height = dim_u32(h, shape)?;
        let width = dim_u32(w, shape)?;

        let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rgb = self.decode_rgb(&bytes, path)?;
        let pixels = self.resize(rgb, width, height, path)?;

        let data: Vec<f32> = if c == 3 {
            pixels.iter().map(|&v| f32::from(v) / 255.0).collect()
        } else {
            pixels
                .chunks_exact(3)
                .map(|px| {
                    let luma = 0.299 * f32::from(px[0])
                        + 0.587 * f32::from(px[1])
                        + 0.114 * f32::from(px[2]);
                    luma / 255.0
                })
                .collect()
        };

        Tensor::from_vec(shape.to_vec(), data).map_err(|e| DecodeError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
