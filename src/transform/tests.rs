// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use num_complex::Complex64;

use super::*;
use crate::math;

fn test_signal(n: usize) -> Vec<f64> {
    // Deterministic, aperiodic, sign-varying.
    (0..n)
        .map(|i| {
            let x = i as f64;
            (0.3 * x).sin() + 0.25 * (1.7 * x).cos() - 0.1 * (x / 7.0)
        })
        .collect()
}

#[test]
fn test_zero_length_is_an_error() {
    let engine = TransformEngine::new();
    assert!(matches!(
        engine.rfft(&[1.0, 2.0], 0),
        Err(TransformError::ZeroLength)
    ));
    assert!(matches!(
        engine.fft(&[], 0),
        Err(TransformError::ZeroLength)
    ));
}

#[test]
fn test_rfft_irfft_round_trip() {
    let engine = TransformEngine::new();
    for n in [1, 2, 3, 8, 15, 64, 100, 243] {
        let signal = test_signal(n);
        let spectrum = engine.rfft(&signal, n).unwrap();
        assert_eq!(spectrum.len(), n / 2 + 1);
        let back = engine.irfft(&spectrum, n).unwrap();
        assert_eq!(back.len(), n);
        for (a, b) in signal.iter().zip(back.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }
}

#[test]
fn test_fft_ifft_round_trip() {
    let engine = TransformEngine::new();
    let signal: Vec<Complex64> = test_signal(50)
        .into_iter()
        .zip(test_signal(50).into_iter().rev())
        .map(|(re, im)| Complex64::new(re, im))
        .collect();
    let spectrum = engine.fft(&signal, 50).unwrap();
    let back = engine.ifft(&spectrum, 50).unwrap();
    for (a, b) in signal.iter().zip(back.iter()) {
        assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-10);
        assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-10);
    }
}

#[test]
fn test_rfft_dc_bin_is_the_sum() {
    let engine = TransformEngine::new();
    let signal = test_signal(37);
    let spectrum = engine.rfft(&signal, 37).unwrap();
    assert_abs_diff_eq!(spectrum[0].re, signal.iter().sum::<f64>(), epsilon = 1e-10);
    assert_abs_diff_eq!(spectrum[0].im, 0.0, epsilon = 1e-12);
}

#[test]
fn test_zero_padding() {
    let engine = TransformEngine::new();
    let signal = test_signal(10);
    let mut padded = signal.clone();
    padded.resize(32, 0.0);
    let a = engine.rfft(&signal, 32).unwrap();
    let b = engine.rfft(&padded, 32).unwrap();
    for (x, y) in a.iter().zip(b.iter()) {
        assert_abs_diff_eq!(x.re, y.re, epsilon = 1e-12);
        assert_abs_diff_eq!(x.im, y.im, epsilon = 1e-12);
    }
}

#[test]
fn test_plan_cache_reuse_and_determinism() {
    let engine = TransformEngine::new();
    let signal = test_signal(96);

    let first = engine.rfft(&signal, 96).unwrap();
    let plans_after_first = engine.plan_count();
    // Interleave other sizes to shuffle the cache.
    engine.rfft(&signal, 128).unwrap();
    engine.irfft(&first, 96).unwrap();
    for _ in 0..5 {
        let again = engine.rfft(&signal, 96).unwrap();
        assert_eq!(first, again);
    }
    // Repeats of the same (kind, length) must not grow the cache.
    engine.rfft(&signal, 96).unwrap();
    let plans_final = engine.plan_count();
    assert!(plans_final >= plans_after_first);
    engine.rfft(&signal, 96).unwrap();
    assert_eq!(engine.plan_count(), plans_final);

    engine.clear_plans();
    assert_eq!(engine.plan_count(), 0);
    // Transforms still work after teardown.
    let after = engine.rfft(&signal, 96).unwrap();
    assert_eq!(first, after);
}

#[test]
fn test_concurrent_plan_insertion() {
    use std::sync::Arc;
    let engine = Arc::new(TransformEngine::new());
    let signal = Arc::new(test_signal(240));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || engine.rfft(&signal, 240).unwrap())
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for r in &results[1..] {
        assert_eq!(r, &results[0]);
    }
    // All eight threads raced on one key; only one plan may exist for it.
    assert_eq!(engine.plan_count(), 1);
}

#[test]
fn test_pack_unpack_round_trip() {
    let engine = TransformEngine::new();
    for n in [8, 9, 16, 27] {
        let signal = test_signal(n);
        let packed = engine.rfft(&signal, n).unwrap();
        let full = unpack_spectrum(&packed, n);
        assert_eq!(full.len(), n);
        let repacked = pack_spectrum(&full);
        assert_eq!(packed, repacked);
        // The unpacked spectrum matches a plain complex transform.
        let complex_in: Vec<Complex64> =
            signal.iter().map(|&x| Complex64::new(x, 0.0)).collect();
        let reference = engine.fft(&complex_in, n).unwrap();
        for (a, b) in full.iter().zip(reference.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-10);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-10);
        }
    }
}

#[test]
fn test_pack_unpack_empty_input() {
    assert!(pack_spectrum(&[]).is_empty());
    assert!(unpack_spectrum(&[], 0).is_empty());
}

#[test]
fn test_rfftfreq() {
    let freqs = rfftfreq(8, 0.5);
    assert_eq!(freqs.len(), 5);
    assert_abs_diff_eq!(freqs[0], 0.0);
    assert_abs_diff_eq!(freqs[1], 0.25);
    assert_abs_diff_eq!(freqs[4], 1.0);

    let freqs = rfftfreq(9, 0.5);
    assert_eq!(freqs.len(), 5);
    assert_abs_diff_eq!(freqs[4], 4.0 / 4.5);
}

#[test]
fn test_convolve_matches_direct_convolution() {
    let engine = TransformEngine::new();
    let signal = test_signal(40);
    let kernel = test_signal(17);
    let direct = math::convolution(&signal, &kernel);
    let via_fft = engine.convolve(&signal, &kernel).unwrap();
    assert_eq!(direct.len(), via_fft.len());
    for (a, b) in direct.iter().zip(via_fft.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-9);
    }
}
