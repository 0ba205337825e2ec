// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImpedanceError {
    #[error(
        "Resonator mode arrays have mismatched lengths: {rs} shunt impedances, \
         {freq} resonant frequencies, {q} quality factors"
    )]
    ResonatorLengths { rs: usize, freq: usize, q: usize },

    #[error("Resonant frequencies and quality factors must be positive")]
    NonPositiveResonator,

    #[error("A quality factor of {0} has no oscillatory wake; Q must exceed 0.5")]
    OverdampedResonator(f64),

    #[error("A tabulated source needs at least 2 points; got {0}")]
    TableTooShort(usize),

    #[error("Table columns have mismatched lengths: {x} abscissae, {y} values")]
    TableLengths { x: usize, y: usize },

    #[error("Table abscissae must be strictly increasing")]
    TableNotSorted,

    #[error(
        "Traveling-wave cavity arrays have mismatched lengths: {rs} shunt \
         impedances, {freq} resonant frequencies, {a} time factors"
    )]
    CavityLengths { rs: usize, freq: usize, a: usize },

    #[error("Traveling-wave cavity frequencies and time factors must be positive")]
    NonPositiveCavity,
}
