//! Miscellaneous numerical helpers.

/// Smallest length `>= n` whose only prime factors are 2, 3 and 5.
///
/// FFT planners handle these sizes with their fastest radix kernels, so
/// zero-padding a transform up to this length costs less than running it at an
/// awkward prime size. Returns 1 for `n == 0`.
///
/// # Examples
///
/// ```rust
/// use shared::algo::misc::next_fast_len;
///
/// assert_eq!(next_fast_len(7), 8);
/// assert_eq!(next_fast_len(11), 12);
/// assert_eq!(next_fast_len(2048), 2048);
/// ```
pub fn next_fast_len(n: usize) -> usize {
    let mut candidate = n.max(1);
    loop {
        let mut rest = candidate;
        for factor in [2, 3, 5] {
            while rest % factor == 0 {
                rest /= factor;
            }
        }
        if rest == 1 {
            return candidate;
        }
        candidate += 1;
    }
}
