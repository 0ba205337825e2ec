// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("The number of bins must be at least 1")]
    NoBins,

    #[error("The cut window is empty or reversed: left {left:e} s, right {right:e} s")]
    EmptyWindow { left: f64, right: f64 },

    #[error("Explicit bin edges need at least 2 strictly-increasing values")]
    BadEdges,

    #[error("The n-sigma window factor must be positive; got {0}")]
    NonPositiveSigmaFactor(f64),

    #[error("A box smoothing kernel must have a non-zero width")]
    EmptySmoothingKernel,

    #[error("A Gaussian smoothing kernel needs a positive sigma; got {0} bins")]
    NonPositiveSmoothingSigma(f64),
}
