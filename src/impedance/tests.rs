// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};

use super::*;
use crate::constants::PI;

#[test]
fn test_resonator_impedance_closed_form() {
    let r = Resonators::new(vec![1000.0], vec![1e9], vec![1.0]).unwrap();

    // On resonance the impedance is purely resistive and equals R_s.
    let z = r.impedance(&[0.0, 0.5e9, 1e9, 2e9]);
    assert_abs_diff_eq!(z[0].re, 0.0);
    assert_abs_diff_eq!(z[0].im, 0.0);
    assert_relative_eq!(z[2].re, 1000.0, max_relative = 1e-12);
    assert_abs_diff_eq!(z[2].im, 0.0, epsilon = 1e-9);

    // Off resonance: R / (1 + iQ(f/fr - fr/f)), checked by hand at f =
    // fr/2 where Q(f/fr - fr/f) = -1.5.
    let expected = num_complex::Complex64::new(1000.0, 0.0)
        / num_complex::Complex64::new(1.0, -1.5);
    assert_relative_eq!(z[1].re, expected.re, max_relative = 1e-12);
    assert_relative_eq!(z[1].im, expected.im, max_relative = 1e-12);

    // Inductive below resonance, capacitive above.
    assert!(z[1].im > 0.0);
    assert!(z[3].im < 0.0);
}

#[test]
fn test_resonator_wake_closed_form() {
    let rs = 1000.0;
    let fr = 1e9;
    let q = 1.0;
    let r = Resonators::new(vec![rs], vec![fr], vec![q]).unwrap();

    let omega_r = 2.0 * PI * fr;
    let alpha = omega_r / (2.0 * q);
    let omega_bar = (omega_r * omega_r - alpha * alpha).sqrt();

    // Half amplitude exactly at t = 0; zero before the exciting charge.
    let w = r.wake(&[-1e-9, 0.0, 0.1e-9, 1e-9]);
    assert_abs_diff_eq!(w[0], 0.0);
    assert_relative_eq!(w[1], rs * alpha, max_relative = 1e-12);

    for (&t, &got) in [0.1e-9, 1e-9].iter().zip(&w[2..]) {
        let expected = 2.0
            * rs
            * alpha
            * (-alpha * t).exp()
            * ((omega_bar * t).cos() - alpha / omega_bar * (omega_bar * t).sin());
        assert_relative_eq!(got, expected, max_relative = 1e-12);
    }
}

#[test]
fn test_resonator_validation() {
    assert!(matches!(
        Resonators::new(vec![1.0, 2.0], vec![1e9], vec![1.0]),
        Err(ImpedanceError::ResonatorLengths { .. })
    ));
    assert!(matches!(
        Resonators::new(vec![1.0], vec![-1e9], vec![1.0]),
        Err(ImpedanceError::NonPositiveResonator)
    ));
    assert!(matches!(
        Resonators::new(vec![1.0], vec![1e9], vec![0.4]),
        Err(ImpedanceError::OverdampedResonator(_))
    ));
}

#[test]
fn test_input_table_impedance_interpolation() {
    let table = InputTable::from_impedance(
        vec![1e9, 2e9, 3e9],
        vec![10.0, 20.0, 30.0],
        vec![-1.0, -2.0, -3.0],
    )
    .unwrap();

    // Exact at the nodes, linear between them, anchored at zero below the
    // first tabulated frequency, zero above the table.
    let z = table.impedance(&[0.0, 0.5e9, 1e9, 1.5e9, 3e9, 4e9]);
    assert_abs_diff_eq!(z[0].re, 0.0);
    assert_abs_diff_eq!(z[1].re, 5.0, epsilon = 1e-12);
    assert_abs_diff_eq!(z[1].im, -0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(z[2].re, 10.0, epsilon = 1e-12);
    assert_abs_diff_eq!(z[3].re, 15.0, epsilon = 1e-12);
    assert_abs_diff_eq!(z[4].re, 30.0, epsilon = 1e-12);
    assert_abs_diff_eq!(z[5].re, 0.0);
    assert_abs_diff_eq!(z[5].im, 0.0);

    // A wake-only table reports zero impedance.
    let wake_table = InputTable::from_wake(vec![0.0, 1e-9], vec![5.0, 2.0]).unwrap();
    assert!(wake_table
        .impedance(&[0.0, 1e9])
        .iter()
        .all(|z| z.norm() == 0.0));
}

#[test]
fn test_input_table_wake_interpolation() {
    let table = InputTable::from_wake(vec![0.0, 1e-9, 2e-9], vec![4.0, 2.0, 0.0]).unwrap();
    let w = table.wake(&[-1e-9, 0.0, 0.5e-9, 2e-9, 3e-9]);
    assert_abs_diff_eq!(w[0], 0.0);
    assert_abs_diff_eq!(w[1], 4.0);
    assert_abs_diff_eq!(w[2], 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(w[3], 0.0);
    assert_abs_diff_eq!(w[4], 0.0);
}

#[test]
fn test_input_table_validation() {
    assert!(matches!(
        InputTable::from_wake(vec![0.0], vec![1.0]),
        Err(ImpedanceError::TableTooShort(1))
    ));
    assert!(matches!(
        InputTable::from_impedance(vec![0.0, 1.0], vec![1.0], vec![1.0, 2.0]),
        Err(ImpedanceError::TableLengths { .. })
    ));
    assert!(matches!(
        InputTable::from_wake(vec![1.0, 1.0], vec![1.0, 2.0]),
        Err(ImpedanceError::TableNotSorted)
    ));
}

#[test]
fn test_traveling_wave_cavity() {
    // SPS-like 4-section cavity: 200 MHz, ~460 ns filling time.
    let rs = 1e6;
    let fr = 200.222e6;
    let a = 2.0 * PI * 4.62e-7;
    let twc = TravelingWaveCavity::new(vec![rs], vec![fr], vec![a]).unwrap();

    // At resonance the `f - fr` branch hits its removable singularity and
    // contributes exactly R_s; the mirror branch at 2 f_r is negligible
    // because a*fr >> 1.
    let z = twc.impedance(&[fr]);
    assert_relative_eq!(z[0].re, rs, max_relative = 1e-3);
    assert_abs_diff_eq!(z[0].im / rs, 0.0, epsilon = 5e-3);
    assert!(z.iter().all(|z| z.re.is_finite() && z.im.is_finite()));

    // Triangular-envelope wake: R_s/filling_time at t = 0 (half of the
    // 2R_s/filling_time interior amplitude), zero past the filling time.
    let filling_time = a / (2.0 * PI);
    let w = twc.wake(&[-1e-9, 0.0, filling_time * 1.01]);
    assert_abs_diff_eq!(w[0], 0.0);
    assert_relative_eq!(w[1], rs / filling_time, max_relative = 1e-12);
    assert_abs_diff_eq!(w[2], 0.0);

    assert!(matches!(
        TravelingWaveCavity::new(vec![1.0], vec![1e9, 2e9], vec![1.0]),
        Err(ImpedanceError::CavityLengths { .. })
    ));
}

#[test]
fn test_sum_impedances_and_wakes() {
    let r1: Arc<dyn ImpedanceSource> =
        Arc::new(Resonators::new(vec![1000.0], vec![1e9], vec![1.0]).unwrap());
    let r2: Arc<dyn ImpedanceSource> =
        Arc::new(Resonators::new(vec![500.0], vec![2e9], vec![3.0]).unwrap());
    let sources = vec![Arc::clone(&r1), Arc::clone(&r2)];

    let freqs: Vec<f64> = (0..64).map(|i| i as f64 * 5e7).collect();
    let total = sum_impedances(&sources, &freqs);
    let za = r1.impedance(&freqs);
    let zb = r2.impedance(&freqs);
    for ((t, a), b) in total.iter().zip(&za).zip(&zb) {
        assert_abs_diff_eq!(t.re, a.re + b.re, epsilon = 1e-9);
        assert_abs_diff_eq!(t.im, a.im + b.im, epsilon = 1e-9);
    }

    let times: Vec<f64> = (0..64).map(|i| i as f64 * 1e-11).collect();
    let total = sum_wakes(&sources, &times);
    let wa = r1.wake(&times);
    let wb = r2.wake(&times);
    for ((t, a), b) in total.iter().zip(&wa).zip(&wb) {
        assert_relative_eq!(*t, a + b, max_relative = 1e-12);
    }

    // No sources: identity of the reduction, all zero.
    assert!(sum_impedances(&[], &freqs).iter().all(|z| z.norm() == 0.0));
}
