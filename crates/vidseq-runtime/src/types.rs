use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("shape {shape:?} requires {expected} elements, got {got}")]
pub struct ShapeError {
    pub shape: Vec<usize>,
    pub expected: usize,
    pub got: usize,
}

/// Dense row-major `f32` tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn from_vec(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, ShapeError> {
        let expected = shape.iter().product();
        if data.len() != expected {
            return Err(ShapeError {
                shape,
                expected,
                got: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// The `i`-th slice along the leading dimension, flattened.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        let rows = *self.shape.first()?;
        if i >= rows {
            return None;
        }
        let stride = self.data.len() / rows;
        self.data.get(i * stride..(i + 1) * stride)
    }
}

/// One training step's worth of data.
///
/// `x` is `(batch_size, seq_length, *image_shape)` and `y` is
/// `(batch_size, num_classes)`; row `i` of both belongs to `clips[i]`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub x: Tensor,
    pub y: Tensor,
    pub clips: Vec<String>,
}

impl Batch {
    pub fn batch_size(&self) -> usize {
        self.clips.len()
    }
}
