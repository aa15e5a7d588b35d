//! Sample decimation
//!
//! Keeps the sample buffer bounded for arbitrarily long freezes while
//! preserving an even spread over time: index `i` of the result is source
//! index `round(i * (from - 1) / (to - 1))`, so the first and the last
//! retained source sample always survive.

/// Reduce `samples` to `to` evenly spaced elements, in place.
///
/// With `trim_tail` the newest element is dropped before selection; used when
/// it lies beyond the end of the event it is attributed to.
pub fn decimate<T>(samples: &mut Vec<T>, to: usize, trim_tail: bool) {
    if trim_tail {
        samples.pop();
    }
    let from = samples.len();
    if to >= from {
        return;
    }
    if to <= 1 {
        samples.truncate(to);
        return;
    }

    // Source indices are strictly increasing and never below their target
    // index, so swapping front to back never reads an overwritten slot.
    for i in 1..to {
        let src = (2 * i * (from - 1) + (to - 1)) / (2 * (to - 1));
        samples.swap(i, src);
    }
    samples.truncate(to);
}
