// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all beamwake-related errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BeamwakeError {
    #[error("{0}")]
    Transform(#[from] crate::transform::TransformError),

    #[error("{0}")]
    Profile(#[from] crate::profile::ProfileError),

    #[error("{0}")]
    Impedance(#[from] crate::impedance::ImpedanceError),

    #[error("{0}")]
    Voltage(#[from] crate::voltage::VoltageError),
}
