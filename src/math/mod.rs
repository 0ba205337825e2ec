// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.


use rayon::prelude::*;

/// The smallest 5-smooth ("regular") number greater than or equal to
/// `target`. FFT backends are fastest on lengths whose prime factors are
/// all in {2, 3, 5}.
pub(crate) fn next_regular(target: usize) -> usize {
    if target < 2 {
        return 1;
    }
    let mut best = usize::MAX;
    let mut p5: usize = 1;
    while p5 < best {
        let mut p35 = p5;
        while p35 < best {
            // Smallest power of two lifting p35 to or above the target.
            let quotient = (target + p35 - 1) / p35;
            let n = quotient.next_power_of_two().saturating_mul(p35);
            if n == target {
                return n;
            }
            if n < best {
                best = n;
            }
            p35 = match p35.checked_mul(3) {
                Some(v) => v,
                None => break,
            };
        }
        p5 = match p5.checked_mul(5) {
            Some(v) => v,
            None => break,
        };
    }
    best
}

/// The largest 5-smooth number less than or equal to `target` (which must be
/// at least 1).
pub(crate) fn previous_regular(target: usize) -> usize {
    debug_assert!(target >= 1);
    let mut best: usize = 1;
    let mut p5: usize = 1;
    while p5 <= target {
        let mut p35 = p5;
        while p35 <= target {
            let shift = (target / p35).ilog2();
            let n = p35 << shift;
            if n > best {
                best = n;
            }
            p35 = match p35.checked_mul(3) {
                Some(v) => v,
                None => break,
            };
        }
        p5 = match p5.checked_mul(5) {
            Some(v) => v,
            None => break,
        };
    }
    best
}

/// `n` evenly-spaced values covering `[start, stop]` inclusive.
pub(crate) fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + i as f64 * step).collect()
        }
    }
}

/// One-dimensional linear interpolation with the same semantics as numpy's
/// `interp`: `xp` must be sorted, values outside the table evaluate to
/// `left`/`right`.
pub(crate) fn lin_interp(x: &[f64], xp: &[f64], yp: &[f64], left: f64, right: f64) -> Vec<f64> {
    debug_assert_eq!(xp.len(), yp.len());
    debug_assert!(!xp.is_empty());

    x.iter()
        .map(|&xi| {
            if xi < xp[0] {
                left
            } else if xi > xp[xp.len() - 1] {
                right
            } else {
                // First knot strictly greater than xi.
                let j = xp.partition_point(|&p| p <= xi);
                if j == xp.len() {
                    yp[j - 1]
                } else {
                    let x0 = xp[j - 1];
                    let x1 = xp[j];
                    let t = (xi - x0) / (x1 - x0);
                    yp[j - 1] + t * (yp[j] - yp[j - 1])
                }
            }
        })
        .collect()
}

/// Full linear convolution; the result has `signal.len() + kernel.len() - 1`
/// samples. The output samples are independent, so they are computed in
/// parallel.
pub(crate) fn convolution(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    if signal.is_empty() || kernel.is_empty() {
        return vec![];
    }
    let size = signal.len() + kernel.len() - 1;
    (0..size)
        .into_par_iter()
        .map(|n| {
            let kmin = n.saturating_sub(kernel.len() - 1);
            let kmax = n.min(signal.len() - 1);
            (kmin..=kmax).map(|k| signal[k] * kernel[n - k]).sum()
        })
        .collect()
}

/// Trapezoidal integration of uniformly-sampled values.
pub(crate) fn trapezoid(y: &[f64], dx: f64) -> f64 {
    match y.len() {
        0 | 1 => 0.0,
        _ => dx * (y.iter().sum::<f64>() - 0.5 * (y[0] + y[y.len() - 1])),
    }
}

pub(crate) fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        0.0
    } else {
        v.iter().sum::<f64>() / v.len() as f64
    }
}

/// Population standard deviation about a precomputed mean.
pub(crate) fn standard_deviation(v: &[f64], mean: f64) -> f64 {
    if v.is_empty() {
        0.0
    } else {
        (v.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / v.len() as f64).sqrt()
    }
}
