// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision; induced-voltage factors combine
quantities spanning ~30 orders of magnitude and single precision loses the
wake structure entirely.
 */

pub use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Elementary charge \[C\].
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19;

/// Speed of light in a vacuum \[m/s\].
pub const SPEED_OF_LIGHT: f64 = 299792458.0;

/// Conversion between a Gaussian RMS width and its full width at half
/// maximum: FWHM = `CFWHM` * sigma.
pub const CFWHM: f64 = 2.3548200450309493; // 2 sqrt(2 ln 2)
