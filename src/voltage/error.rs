// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoltageError {
    #[error("The requested frequency resolution must be positive; got {0:e} Hz")]
    NonPositiveResolution(f64),

    #[error("The beam profile has a zero bin width; the frequency grid would be undefined")]
    ZeroBinWidth,

    #[error("The FFT oversampling factor must be at least 1")]
    ZeroOversampling,

    #[error("Multi-turn wake memory needs a positive revolution period")]
    NonPositiveRevolutionPeriod,

    #[error("Induced-voltage contributions disagree on bin count: expected {expected}, got {got}")]
    BinCountMismatch { expected: usize, got: usize },

    #[error("{0}")]
    Transform(#[from] crate::transform::TransformError),
}
