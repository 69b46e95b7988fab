/// Binary indicator vector of length `cardinality` with a single 1 at `index`.
///
/// An out-of-range `index` yields an all-zero vector; callers resolve the index
/// against a vocabulary first, so that case is never reached through the catalog.
pub fn one_hot(index: usize, cardinality: usize) -> Vec<f32> {
    let mut out = vec![0.0; cardinality];
    if let Some(slot) = out.get_mut(index) {
        *slot = 1.0;
    }
    out
}
