// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Longitudinal intensity effects for synchrotron beam-dynamics simulations.

A bunch of macroparticles drives wake fields in the accelerator's impedance;
those fields act back on the bunch as an induced voltage. This crate slices
the bunch into a longitudinal profile, evaluates impedance and wake sources
on the matching grids, and computes the per-turn induced voltage either by
direct convolution in time or through the beam spectrum in frequency.
 */

pub mod beam;
pub mod constants;
pub mod error;
pub mod impedance;
pub(crate) mod math;
pub mod profile;
pub mod transform;
pub mod voltage;

// Re-exports.
pub use beam::Beam;
pub use error::BeamwakeError;
pub use impedance::{
    sum_impedances, sum_wakes, ImpedanceSource, InputTable, Resonators, TravelingWaveCavity,
};
pub use profile::{
    BinningPolicy, CutWindow, Profile, Slicer, SlicerConfig, SmoothingKernel,
};
pub use transform::{rfftfreq, TransformEngine, TransformKind};
pub use voltage::{
    CadencePolicy, FreqConfig, InducedVoltage, InducedVoltageFreq, InducedVoltageTime,
    ResolutionRounding, TotalInducedVoltage,
};
