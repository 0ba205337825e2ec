// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Slicing the beam into a longitudinal line-density profile.

The slicer bins macroparticle arrival times into a histogram once per turn.
A fresh [`Profile`] is produced every call rather than mutated in place, so
calculators holding onto a previous turn's profile (multi-turn wake memory)
stay valid.
 */

mod error;

pub use error::ProfileError;

use log::warn;
use num_complex::Complex64;
use rayon::prelude::*;

use crate::beam::Beam;
use crate::constants::CFWHM;
use crate::math;
use crate::transform::{self, TransformEngine, TransformError};

/// How bin edges are placed across the cut window.
#[derive(Debug, Clone)]
pub enum BinningPolicy {
    /// Equal-width bins in time.
    Uniform,

    /// Quantile edges, so every bin holds (approximately) the same number of
    /// particles. Costs a sort of the in-window coordinates.
    EqualCharge,

    /// User-provided edges; must be strictly increasing. Overrides the cut
    /// window and the configured bin count.
    Explicit(Vec<f64>),
}

/// How the cut window (the time span covered by the histogram) is chosen.
#[derive(Debug, Clone, Copy)]
pub enum CutWindow {
    /// Fixed `[left, right]` interval in seconds.
    Explicit { left: f64, right: f64 },

    /// `mean +/- n*sigma/2` of the live coordinates.
    NSigma(f64),

    /// The live min/max extent, padded by 5% of the span on each side.
    FullExtent,
}

/// Optional smoothing applied to the raw histogram.
#[derive(Debug, Clone, Copy)]
pub enum SmoothingKernel {
    /// Moving average over `width` bins.
    Box { width: usize },

    /// Normalized Gaussian with the given RMS width in bins, truncated at
    /// four sigma.
    Gaussian { sigma_bins: f64 },
}

#[derive(Debug, Clone)]
pub struct SlicerConfig {
    pub n_bins: usize,
    pub policy: BinningPolicy,
    pub window: CutWindow,
    pub smoothing: Option<SmoothingKernel>,
}

impl SlicerConfig {
    /// Uniform binning over an adaptive full-extent window; the common case.
    pub fn uniform(n_bins: usize) -> SlicerConfig {
        SlicerConfig {
            n_bins,
            policy: BinningPolicy::Uniform,
            window: CutWindow::FullExtent,
            smoothing: None,
        }
    }
}

/// The longitudinal line density of one turn.
#[derive(Debug, Clone)]
pub struct Profile {
    /// Macroparticles per bin (fractional after smoothing).
    pub counts: Vec<f64>,

    /// Bin edges; `counts.len() + 1` values.
    pub edges: Vec<f64>,

    /// Bin centres \[s\].
    pub bin_centers: Vec<f64>,

    /// The turn this profile was produced on.
    pub turn: u64,
}

impl Profile {
    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    /// Width of the first bin. Bins are uniform except under explicit or
    /// equal-charge edges; the frequency-domain calculator rejects profiles
    /// whose first bin is degenerate.
    pub fn bin_width(&self) -> f64 {
        self.edges[1] - self.edges[0]
    }

    pub fn cut_left(&self) -> f64 {
        self.edges[0]
    }

    pub fn cut_right(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    pub fn total_count(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// The beam spectrum: packed real transform of the counts at `n`
    /// points.
    pub fn spectrum(
        &self,
        engine: &TransformEngine,
        n: usize,
    ) -> Result<Vec<Complex64>, TransformError> {
        engine.rfft(&self.counts, n)
    }

    /// Frequencies matching [`Profile::spectrum`].
    pub fn spectrum_freqs(&self, n: usize) -> Vec<f64> {
        transform::rfftfreq(n, self.bin_width())
    }

    /// RMS bunch position and length (4 sigma) from the line density, or
    /// `None` for an unpopulated profile.
    pub fn rms(&self) -> Option<(f64, f64)> {
        let dx = self.bin_width();
        let integral = math::trapezoid(&self.counts, dx);
        if integral <= 0.0 {
            return None;
        }
        let density: Vec<f64> = self.counts.iter().map(|c| c / integral).collect();

        let weighted: Vec<f64> = self
            .bin_centers
            .iter()
            .zip(density.iter())
            .map(|(t, d)| t * d)
            .collect();
        let position = math::trapezoid(&weighted, dx);

        let spread: Vec<f64> = self
            .bin_centers
            .iter()
            .zip(density.iter())
            .map(|(t, d)| (t - position) * (t - position) * d)
            .collect();
        let length = 4.0 * math::trapezoid(&spread, dx).sqrt();
        Some((position, length))
    }

    /// Bunch position and length (4 sigma, assuming a Gaussian density)
    /// from the full width at half maximum, or `None` if the half-maximum
    /// level is never crossed on both sides of the peak.
    pub fn fwhm(&self) -> Option<(f64, f64)> {
        let (max_i, &max) = self
            .counts
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        if max <= 0.0 {
            return None;
        }
        let half = 0.5 * max;

        // Walk outwards from the peak to the first half-maximum crossings,
        // interpolating between bin centres.
        let mut left = None;
        for i in (0..max_i).rev() {
            if self.counts[i] < half {
                let t = (half - self.counts[i]) / (self.counts[i + 1] - self.counts[i]);
                left = Some(self.bin_centers[i] + t * (self.bin_centers[i + 1] - self.bin_centers[i]));
                break;
            }
        }
        let mut right = None;
        for i in max_i + 1..self.counts.len() {
            if self.counts[i] < half {
                let t = (half - self.counts[i]) / (self.counts[i - 1] - self.counts[i]);
                right =
                    Some(self.bin_centers[i] + t * (self.bin_centers[i - 1] - self.bin_centers[i]));
                break;
            }
        }

        let (t1, t2) = (left?, right?);
        Some(((t1 + t2) / 2.0, 4.0 * (t2 - t1) / CFWHM))
    }
}

/// Bins particle arrival times into per-turn profiles.
#[derive(Debug, Clone)]
pub struct Slicer {
    config: SlicerConfig,
    /// The last window actually used, kept so a momentarily empty beam
    /// still gets valid (all-zero) output under an adaptive window.
    last_window: Option<(f64, f64)>,
}

impl Slicer {
    pub fn new(config: SlicerConfig) -> Result<Slicer, ProfileError> {
        match &config.policy {
            BinningPolicy::Explicit(edges) => {
                if edges.len() < 2 || edges.windows(2).any(|w| w[1] <= w[0]) {
                    return Err(ProfileError::BadEdges);
                }
            }
            BinningPolicy::Uniform | BinningPolicy::EqualCharge => {
                if config.n_bins == 0 {
                    return Err(ProfileError::NoBins);
                }
            }
        }
        match config.window {
            CutWindow::Explicit { left, right } if right <= left => {
                return Err(ProfileError::EmptyWindow { left, right });
            }
            CutWindow::NSigma(n) if n <= 0.0 => {
                return Err(ProfileError::NonPositiveSigmaFactor(n));
            }
            _ => (),
        }
        match config.smoothing {
            Some(SmoothingKernel::Box { width: 0 }) => {
                return Err(ProfileError::EmptySmoothingKernel);
            }
            Some(SmoothingKernel::Gaussian { sigma_bins }) if sigma_bins <= 0.0 => {
                return Err(ProfileError::NonPositiveSmoothingSigma(sigma_bins));
            }
            _ => (),
        }

        Ok(Slicer {
            config,
            last_window: None,
        })
    }

    /// Histogram the beam's arrival times for this turn.
    ///
    /// An empty beam (or one entirely outside the window) is a valid
    /// physical state: the result is an all-zero profile, never an error.
    pub fn slice(&mut self, beam: &Beam, turn: u64) -> Result<Profile, ProfileError> {
        let edges = match &self.config.policy {
            BinningPolicy::Explicit(edges) => edges.clone(),
            BinningPolicy::Uniform => {
                let (left, right) = self.resolve_window(beam)?;
                math::linspace(left, right, self.config.n_bins + 1)
            }
            BinningPolicy::EqualCharge => {
                let (left, right) = self.resolve_window(beam)?;
                self.equal_charge_edges(beam, left, right)
            }
        };

        let n_bins = edges.len() - 1;
        let bin_centers: Vec<f64> = edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();

        let mut counts = if uniform_edges(&edges) {
            histogram_uniform(&beam.dt, edges[0], edges[n_bins], n_bins)
        } else {
            histogram_irregular(&beam.dt, &edges)
        };

        if counts.iter().all(|&c| c == 0.0) && !beam.dt.is_empty() {
            warn!("no particles fell inside the slicing window; profile is all zero");
        }

        if let Some(kernel) = self.config.smoothing {
            counts = smooth(&counts, kernel);
        }

        Ok(Profile {
            counts,
            edges,
            bin_centers,
            turn,
        })
    }

    fn resolve_window(&mut self, beam: &Beam) -> Result<(f64, f64), ProfileError> {
        let window = match self.config.window {
            CutWindow::Explicit { left, right } => (left, right),
            CutWindow::NSigma(n) => match self.adaptive_fallback(beam) {
                Some(fallback) => fallback,
                None => {
                    let mean = math::mean(&beam.dt);
                    let sigma = math::standard_deviation(&beam.dt, mean);
                    widen_if_degenerate(mean - n * sigma / 2.0, mean + n * sigma / 2.0)
                }
            },
            CutWindow::FullExtent => match self.adaptive_fallback(beam) {
                Some(fallback) => fallback,
                None => {
                    let (min, max) = beam
                        .dt
                        .iter()
                        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| {
                            (lo.min(t), hi.max(t))
                        });
                    let margin = 0.05 * (max - min);
                    widen_if_degenerate(min - margin, max + margin)
                }
            },
        };
        self.last_window = Some(window);
        Ok(window)
    }

    /// For adaptive windows only: an empty beam falls back to the last
    /// resolved window (or the unit window before any particle has ever
    /// been seen).
    fn adaptive_fallback(&self, beam: &Beam) -> Option<(f64, f64)> {
        if beam.dt.is_empty() {
            warn!("slicing an empty beam; reusing the previous cut window");
            Some(self.last_window.unwrap_or((0.0, 1.0)))
        } else {
            None
        }
    }

    fn equal_charge_edges(&self, beam: &Beam, left: f64, right: f64) -> Vec<f64> {
        let mut inside: Vec<f64> = beam
            .dt
            .iter()
            .copied()
            .filter(|&t| t >= left && t <= right)
            .collect();
        if inside.is_empty() {
            return math::linspace(left, right, self.config.n_bins + 1);
        }
        inside.sort_by(f64::total_cmp);

        let n_bins = self.config.n_bins;
        let mut edges = Vec::with_capacity(n_bins + 1);
        edges.push(left);
        for k in 1..n_bins {
            let idx = k * inside.len() / n_bins;
            let edge = if idx == 0 {
                inside[0]
            } else {
                0.5 * (inside[idx - 1] + inside[idx])
            };
            edges.push(edge);
        }
        edges.push(right);
        edges
    }
}

fn widen_if_degenerate(left: f64, right: f64) -> (f64, f64) {
    if right > left {
        (left, right)
    } else {
        // All particles coincide; give the histogram a finite span.
        let pad = 0.5 * left.abs().max(1e-12);
        (left - pad, right + pad)
    }
}

fn uniform_edges(edges: &[f64]) -> bool {
    let width = edges[1] - edges[0];
    edges
        .windows(2)
        .all(|w| ((w[1] - w[0]) - width).abs() <= 1e-9 * width.abs())
}

/// One-pass histogram over uniform bins, accumulated per rayon worker and
/// merged at the join. Values exactly on the right edge land in the last
/// bin.
fn histogram_uniform(dt: &[f64], left: f64, right: f64, n_bins: usize) -> Vec<f64> {
    let inv_bin_width = n_bins as f64 / (right - left);
    dt.par_chunks(16 * 1024)
        .fold(
            || vec![0.0; n_bins],
            |mut hist, chunk| {
                for &t in chunk {
                    if t < left || t > right {
                        continue;
                    }
                    let mut bin = ((t - left) * inv_bin_width) as usize;
                    if bin >= n_bins {
                        bin = n_bins - 1;
                    }
                    hist[bin] += 1.0;
                }
                hist
            },
        )
        .reduce(
            || vec![0.0; n_bins],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        )
}

/// Histogram over arbitrary sorted edges; bin lookup by binary search.
fn histogram_irregular(dt: &[f64], edges: &[f64]) -> Vec<f64> {
    let n_bins = edges.len() - 1;
    let right = edges[n_bins];
    dt.par_chunks(16 * 1024)
        .fold(
            || vec![0.0; n_bins],
            |mut hist, chunk| {
                for &t in chunk {
                    let idx = edges.partition_point(|&e| e <= t);
                    if idx == 0 {
                        continue;
                    }
                    if idx > n_bins {
                        if t == right {
                            hist[n_bins - 1] += 1.0;
                        }
                        continue;
                    }
                    hist[idx - 1] += 1.0;
                }
                hist
            },
        )
        .reduce(
            || vec![0.0; n_bins],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        )
}

/// Same-length convolution of the histogram with a normalized kernel.
fn smooth(counts: &[f64], kernel: SmoothingKernel) -> Vec<f64> {
    let weights = match kernel {
        SmoothingKernel::Box { width } => vec![1.0 / width as f64; width],
        SmoothingKernel::Gaussian { sigma_bins } => {
            let radius = (4.0 * sigma_bins).ceil() as i64;
            let mut w: Vec<f64> = (-radius..=radius)
                .map(|i| (-0.5 * (i as f64 / sigma_bins).powi(2)).exp())
                .collect();
            let sum: f64 = w.iter().sum();
            for v in &mut w {
                *v /= sum;
            }
            w
        }
    };

    let full = math::convolution(counts, &weights);
    let offset = (weights.len() - 1) / 2;
    full[offset..offset + counts.len()].to_vec()
}
