// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Impedance and wake-function sources.

Every source is a pure lookup: given a frequency grid it yields complex
impedance samples, given a time grid it yields the corresponding wake
function. Sources carry no per-turn state, so a fixed set can be shared
freely between calculators and evaluated in parallel.
 */

mod error;
#[cfg(test)]
mod tests;

pub use error::ImpedanceError;

use num_complex::Complex64;
use num_traits::Zero;
use rayon::prelude::*;

use crate::constants::TAU;
use crate::math;

/// A provider of impedance (frequency domain) and wake (time domain)
/// samples.
pub trait ImpedanceSource: Send + Sync {
    /// Complex impedance at each frequency \[Ohm\].
    fn impedance(&self, freqs: &[f64]) -> Vec<Complex64>;

    /// Wake function at each time \[Ohm/s\]. Times are relative to the
    /// exciting charge; the wake is causal (zero for negative times).
    fn wake(&self, times: &[f64]) -> Vec<f64>;
}

/// Sum the impedance of several sources on a shared frequency grid.
/// Sources are independent, so they are evaluated in parallel.
pub fn sum_impedances(sources: &[std::sync::Arc<dyn ImpedanceSource>], freqs: &[f64]) -> Vec<Complex64> {
    sources
        .par_iter()
        .map(|source| source.impedance(freqs))
        .reduce(
            || vec![Complex64::zero(); freqs.len()],
            |mut acc, z| {
                for (a, b) in acc.iter_mut().zip(z) {
                    *a += b;
                }
                acc
            },
        )
}

/// Sum the wake functions of several sources on a shared time grid.
pub fn sum_wakes(sources: &[std::sync::Arc<dyn ImpedanceSource>], times: &[f64]) -> Vec<f64> {
    sources
        .par_iter()
        .map(|source| source.wake(times))
        .reduce(
            || vec![0.0; times.len()],
            |mut acc, w| {
                for (a, b) in acc.iter_mut().zip(w) {
                    *a += b;
                }
                acc
            },
        )
}

/// A sum of narrowband resonator modes, each described by a shunt impedance
/// `R_s` \[Ohm\], a resonant frequency `f_r` \[Hz\] and a quality factor
/// `Q`.
#[derive(Debug, Clone)]
pub struct Resonators {
    rs: Vec<f64>,
    freq_r: Vec<f64>,
    q: Vec<f64>,
    omega_r: Vec<f64>,
}

impl Resonators {
    pub fn new(rs: Vec<f64>, freq_r: Vec<f64>, q: Vec<f64>) -> Result<Resonators, ImpedanceError> {
        if rs.len() != freq_r.len() || rs.len() != q.len() {
            return Err(ImpedanceError::ResonatorLengths {
                rs: rs.len(),
                freq: freq_r.len(),
                q: q.len(),
            });
        }
        if freq_r.iter().any(|&f| f <= 0.0) || q.iter().any(|&q| q <= 0.0) {
            return Err(ImpedanceError::NonPositiveResonator);
        }
        // The wake formula assumes an underdamped mode.
        if let Some(&q) = q.iter().find(|&&q| q <= 0.5) {
            return Err(ImpedanceError::OverdampedResonator(q));
        }
        let omega_r = freq_r.iter().map(|f| TAU * f).collect();
        Ok(Resonators {
            rs,
            freq_r,
            q,
            omega_r,
        })
    }

    pub fn n_modes(&self) -> usize {
        self.rs.len()
    }
}

impl ImpedanceSource for Resonators {
    fn impedance(&self, freqs: &[f64]) -> Vec<Complex64> {
        freqs
            .iter()
            .map(|&f| {
                if f == 0.0 {
                    return Complex64::zero();
                }
                let mut z = Complex64::zero();
                for ((&rs, &fr), &q) in self.rs.iter().zip(&self.freq_r).zip(&self.q) {
                    z += Complex64::new(rs, 0.0) / Complex64::new(1.0, q * (f / fr - fr / f));
                }
                z
            })
            .collect()
    }

    fn wake(&self, times: &[f64]) -> Vec<f64> {
        let mut wake = vec![0.0; times.len()];
        for ((&rs, &omega_r), &q) in self.rs.iter().zip(&self.omega_r).zip(&self.q) {
            let alpha = omega_r / (2.0 * q);
            let omega_bar = (omega_r * omega_r - alpha * alpha).sqrt();
            for (w, &t) in wake.iter_mut().zip(times) {
                if t < 0.0 {
                    continue;
                }
                // Causal wake; exactly half amplitude at t = 0 (the
                // fundamental theorem of beam loading).
                let step = if t > 0.0 { 2.0 } else { 1.0 };
                *w += step
                    * rs
                    * alpha
                    * (-alpha * t).exp()
                    * ((omega_bar * t).cos() - alpha / omega_bar * (omega_bar * t).sin());
            }
        }
        wake
    }
}

#[derive(Debug, Clone)]
enum Table {
    Wake { times: Vec<f64>, wake: Vec<f64> },
    Impedance { freqs: Vec<f64>, re: Vec<f64>, im: Vec<f64> },
}

/// A tabulated source: either a measured wake function of time or a
/// measured impedance of frequency. Evaluation linearly interpolates inside
/// the table and is zero outside it.
#[derive(Debug, Clone)]
pub struct InputTable {
    table: Table,
}

fn check_table(x: &[f64], y_lens: &[usize]) -> Result<(), ImpedanceError> {
    if x.len() < 2 {
        return Err(ImpedanceError::TableTooShort(x.len()));
    }
    for &y_len in y_lens {
        if y_len != x.len() {
            return Err(ImpedanceError::TableLengths {
                x: x.len(),
                y: y_len,
            });
        }
    }
    if x.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ImpedanceError::TableNotSorted);
    }
    Ok(())
}

impl InputTable {
    /// A source defined by `(time, wake)` pairs.
    pub fn from_wake(times: Vec<f64>, wake: Vec<f64>) -> Result<InputTable, ImpedanceError> {
        check_table(&times, &[wake.len()])?;
        Ok(InputTable {
            table: Table::Wake { times, wake },
        })
    }

    /// A source defined by `(frequency, Re Z, Im Z)` triples. A table not
    /// anchored at f = 0 gets a zero row prepended so interpolation below
    /// the first tabulated frequency is well defined.
    pub fn from_impedance(
        mut freqs: Vec<f64>,
        mut re: Vec<f64>,
        mut im: Vec<f64>,
    ) -> Result<InputTable, ImpedanceError> {
        check_table(&freqs, &[re.len(), im.len()])?;
        if freqs[0] > 0.0 {
            freqs.insert(0, 0.0);
            re.insert(0, 0.0);
            im.insert(0, 0.0);
        }
        Ok(InputTable {
            table: Table::Impedance { freqs, re, im },
        })
    }
}

impl ImpedanceSource for InputTable {
    fn impedance(&self, eval_freqs: &[f64]) -> Vec<Complex64> {
        match &self.table {
            Table::Impedance { freqs, re, im } => {
                let re = math::lin_interp(eval_freqs, freqs, re, 0.0, 0.0);
                let im = math::lin_interp(eval_freqs, freqs, im, 0.0, 0.0);
                re.into_iter()
                    .zip(im)
                    .map(|(re, im)| Complex64::new(re, im))
                    .collect()
            }
            // A wake-only table contributes nothing in the frequency
            // domain.
            Table::Wake { .. } => vec![Complex64::zero(); eval_freqs.len()],
        }
    }

    fn wake(&self, eval_times: &[f64]) -> Vec<f64> {
        match &self.table {
            Table::Wake { times, wake } => math::lin_interp(eval_times, times, wake, 0.0, 0.0),
            Table::Impedance { .. } => vec![0.0; eval_times.len()],
        }
    }
}

/// Traveling-wave cavity modes, each described by a shunt impedance `R_s`
/// \[Ohm\], a resonant frequency `f_r` \[Hz\] and a time factor
/// `a = 2 pi * filling time` \[s\].
#[derive(Debug, Clone)]
pub struct TravelingWaveCavity {
    rs: Vec<f64>,
    freq_r: Vec<f64>,
    a_factor: Vec<f64>,
}

impl TravelingWaveCavity {
    pub fn new(
        rs: Vec<f64>,
        freq_r: Vec<f64>,
        a_factor: Vec<f64>,
    ) -> Result<TravelingWaveCavity, ImpedanceError> {
        if rs.len() != freq_r.len() || rs.len() != a_factor.len() {
            return Err(ImpedanceError::CavityLengths {
                rs: rs.len(),
                freq: freq_r.len(),
                a: a_factor.len(),
            });
        }
        if freq_r.iter().any(|&f| f <= 0.0) || a_factor.iter().any(|&a| a <= 0.0) {
            return Err(ImpedanceError::NonPositiveCavity);
        }
        Ok(TravelingWaveCavity {
            rs,
            freq_r,
            a_factor,
        })
    }
}

/// One side of the traveling-wave response at frequency offset `df` from
/// the resonance; `x -> 0` is a removable singularity.
fn twc_response(rs: f64, a: f64, df: f64) -> Complex64 {
    let x = a * df;
    if x.abs() < 1e-12 {
        return Complex64::new(rs, 0.0);
    }
    let sinc_half = (x / 2.0).sin() / (x / 2.0);
    let re = sinc_half * sinc_half;
    let im = -2.0 * (x - x.sin()) / (x * x);
    Complex64::new(rs * re, rs * im)
}

impl ImpedanceSource for TravelingWaveCavity {
    fn impedance(&self, freqs: &[f64]) -> Vec<Complex64> {
        freqs
            .iter()
            .map(|&f| {
                let mut z = Complex64::zero();
                for ((&rs, &fr), &a) in self.rs.iter().zip(&self.freq_r).zip(&self.a_factor) {
                    z += twc_response(rs, a, f - fr);
                    z += twc_response(rs, a, f + fr).conj();
                }
                z
            })
            .collect()
    }

    fn wake(&self, times: &[f64]) -> Vec<f64> {
        let mut wake = vec![0.0; times.len()];
        for ((&rs, &fr), &a) in self.rs.iter().zip(&self.freq_r).zip(&self.a_factor) {
            let filling_time = a / TAU;
            for (w, &t) in wake.iter_mut().zip(times) {
                if t < 0.0 || t > filling_time {
                    continue;
                }
                let step = if t > 0.0 { 2.0 } else { 1.0 };
                *w += step * rs / filling_time * (1.0 - t / filling_time) * (TAU * fr * t).cos();
            }
        }
        wake
    }
}
