//! Index searches over strictly increasing coordinate arrays.
use num_traits::Float;

/// Binary search for `q`, returning the insertion index when it is absent.
pub fn binsearch<T: Float>(array: &[T], q: T) -> usize {
    match array.binary_search_by(|x| x.partial_cmp(&q).unwrap_or(std::cmp::Ordering::Less)) {
        Ok(i) => i,
        Err(i) => i,
    }
}

/// Find the index `i` such that `vec[i] <= target_val <= vec[i + 1]`, clamped
/// so that `i + 1` is always a valid index.
///
/// `vec` must contain at least two values.
pub fn bracket<T: Float>(vec: &[T], target_val: T) -> usize {
    let n = vec.len();
    debug_assert!(n >= 2);
    let i = binsearch(vec, target_val);
    i.saturating_sub(1).min(n - 2)
}
