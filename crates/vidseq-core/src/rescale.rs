use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RescaleError {
    #[error("target size must be > 0")]
    ZeroSize,
    #[error("cannot rescale {len} items down to {size}: list is shorter than the target")]
    TooShort { len: usize, size: usize },
}

/// Evenly spaced subsample of `input` with exactly `size` entries.
///
/// Takes every `len / size`-th element starting at index 0, then keeps the first
/// `size` of those, so earlier frames win when the stride does not divide evenly.
pub fn rescale<T: Clone>(input: &[T], size: usize) -> Result<Vec<T>, RescaleError> {
    if size == 0 {
        return Err(RescaleError::ZeroSize);
    }
    let len = input.len();
    if len < size {
        return Err(RescaleError::TooShort { len, size });
    }

    let skip = len / size;
    Ok(input.iter().step_by(skip).take(size).cloned().collect())
}
