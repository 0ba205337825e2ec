// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The beam state consumed from the external tracking loop.
//!
//! The tracker owns the macroparticle coordinates and applies the voltage
//! kick; this crate only reads the arrival times when slicing and the
//! charge/intensity when scaling induced voltages.

/// Longitudinal state of a macroparticle beam for one turn.
#[derive(Debug, Clone)]
pub struct Beam {
    /// Arrival time of each macroparticle relative to the synchronous
    /// particle \[s\].
    pub dt: Vec<f64>,

    /// Energy offset of each macroparticle \[eV\]. Not used by this crate
    /// directly; carried so the kick applied by the tracker and the slicing
    /// done here see one consistent state.
    pub de: Vec<f64>,

    /// Particle charge in units of the elementary charge.
    pub charge: f64,

    /// Number of real particles represented by the macroparticles.
    pub intensity: f64,
}

impl Beam {
    pub fn new(dt: Vec<f64>, de: Vec<f64>, charge: f64, intensity: f64) -> Beam {
        Beam {
            dt,
            de,
            charge,
            intensity,
        }
    }

    pub fn n_macroparticles(&self) -> usize {
        self.dt.len()
    }

    /// Real particles per macroparticle. Zero for an empty beam so that
    /// degenerate turns scale to an all-zero voltage instead of NaN.
    pub fn ratio(&self) -> f64 {
        if self.dt.is_empty() {
            0.0
        } else {
            self.intensity / self.dt.len() as f64
        }
    }
}
