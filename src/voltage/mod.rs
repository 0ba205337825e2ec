// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Induced-voltage calculators.

Two concrete strategies share one contract: a direct time-domain
convolution of the profile with a tabulated wake, and a frequency-domain
multiplication of the beam spectrum with a summed impedance. A
[`TotalInducedVoltage`] aggregates any mix of the two into the single
voltage array handed to the tracking loop.

The frequency-domain calculator is the numerically delicate part: the FFT
length is chosen from a requested frequency resolution under a configurable
rounding policy, the summed impedance is cached and only re-evaluated on a
configurable cadence, and contributions from previous turns can be folded
in from a bounded history aligned by absolute time.
 */

mod error;

pub use error::VoltageError;

use std::collections::VecDeque;
use std::num::NonZeroU64;
use std::sync::Arc;

use itertools::izip;
use log::{debug, warn};
use ndarray::Array2;
use num_complex::Complex64;

use crate::beam::Beam;
use crate::constants::ELEMENTARY_CHARGE;
use crate::impedance::{sum_impedances, sum_wakes, ImpedanceSource};
use crate::math;
use crate::profile::Profile;
use crate::transform::{self, TransformEngine};

/// The common contract of every induced-voltage contribution.
pub trait InducedVoltage {
    /// Compute this contribution's induced voltage \[V\] on the profile's
    /// bins for the current turn.
    fn induced_voltage_generation(
        &mut self,
        beam: &Beam,
        profile: &Profile,
    ) -> Result<Vec<f64>, VoltageError>;

    /// Advance the turn counter. Called once per turn by the tracking loop,
    /// after the voltage has been consumed.
    fn track(&mut self);

    /// Force a full rebuild of internal grids and cached spectra against a
    /// new slicing; called after ring or RF parameters change outside the
    /// normal per-turn cadence.
    fn reprocess(&mut self, profile: &Profile) -> Result<(), VoltageError>;

    /// The most recently computed voltage, aligned with the bins of the
    /// profile that produced it.
    fn last_voltage(&self) -> &[f64];
}

/// Scale factor turning a (counts x wake) convolution into volts.
fn wake_factor(beam: &Beam) -> f64 {
    -beam.charge * ELEMENTARY_CHARGE * beam.ratio()
}

// ---------------------------------------------------------------------------
// Time domain
// ---------------------------------------------------------------------------

/// Induced voltage from the direct causal convolution of the profile with a
/// summed wake function. O(bins x wake length); no FFT, no plan cache, no
/// resolution policy. Preferred when the wake is short compared to the
/// profile span or when frequency-domain aliasing must be ruled out by
/// construction.
pub struct InducedVoltageTime {
    wake_sources: Vec<Arc<dyn ImpedanceSource>>,
    time_array: Vec<f64>,
    total_wake: Vec<f64>,
    voltage: Vec<f64>,
    turn: u64,
}

impl InducedVoltageTime {
    pub fn new(wake_sources: Vec<Arc<dyn ImpedanceSource>>, profile: &Profile) -> InducedVoltageTime {
        let mut calc = InducedVoltageTime {
            wake_sources,
            time_array: vec![],
            total_wake: vec![],
            voltage: vec![],
            turn: 0,
        };
        calc.rebuild(profile);
        calc
    }

    /// The summed wake table on the profile's relative time axis.
    pub fn total_wake(&self) -> &[f64] {
        &self.total_wake
    }

    /// Whether the profile's relative time axis still matches the sampled
    /// wake table. An adaptive cut window moves with the beam, so the bin
    /// width can change even while the bin count stays fixed.
    fn grid_changed(&self, profile: &Profile) -> bool {
        profile.n_bins() != self.time_array.len()
            || profile
                .bin_centers
                .iter()
                .zip(&self.time_array)
                .any(|(t, rel)| t - profile.bin_centers[0] != *rel)
    }

    fn rebuild(&mut self, profile: &Profile) {
        self.time_array = profile
            .bin_centers
            .iter()
            .map(|t| t - profile.bin_centers[0])
            .collect();
        self.total_wake = sum_wakes(&self.wake_sources, &self.time_array);
    }
}

impl InducedVoltage for InducedVoltageTime {
    fn induced_voltage_generation(
        &mut self,
        beam: &Beam,
        profile: &Profile,
    ) -> Result<Vec<f64>, VoltageError> {
        if self.grid_changed(profile) {
            debug!("profile time grid changed; rebuilding the wake table");
            self.rebuild(profile);
        }

        let n_bins = profile.n_bins();
        if beam.n_macroparticles() == 0 || profile.total_count() == 0.0 {
            warn!("zero beam population; time-domain induced voltage is all zero");
            self.voltage = vec![0.0; n_bins];
            return Ok(self.voltage.clone());
        }

        let factor = wake_factor(beam);
        let mut voltage = math::convolution(&profile.counts, &self.total_wake);
        voltage.truncate(n_bins);
        for v in &mut voltage {
            *v *= factor;
        }

        self.voltage = voltage.clone();
        Ok(voltage)
    }

    fn track(&mut self) {
        self.turn += 1;
    }

    fn reprocess(&mut self, profile: &Profile) -> Result<(), VoltageError> {
        self.rebuild(profile);
        Ok(())
    }

    fn last_voltage(&self) -> &[f64] {
        &self.voltage
    }
}

// ---------------------------------------------------------------------------
// Frequency domain
// ---------------------------------------------------------------------------

/// How the FFT length is chosen relative to the requested frequency
/// resolution. The achieved resolution is `1 / (n * bin_width)`, so a
/// larger `n` means a finer grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionRounding {
    /// The length whose achieved resolution is nearest the request; ties
    /// resolve to the larger length (finer grid) for reproducibility.
    Round,

    /// The smallest length achieving a resolution finer than or equal to
    /// the request.
    Ceil,

    /// The largest length achieving a resolution coarser than or equal to
    /// the request (cheapest).
    Floor,
}

/// Whether the impedance recalculation interval counts every turn or only
/// turns on which the frequency grid was unchanged (a grid rebuild always
/// re-evaluates the impedance and restarts the count).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadencePolicy {
    AllTurns,
    UnchangedGrid,
}

#[derive(Debug, Clone)]
pub struct FreqConfig {
    /// Requested frequency resolution \[Hz\]. `None` matches the FFT length
    /// to the profile's bin count.
    pub frequency_resolution: Option<f64>,

    pub rounding: ResolutionRounding,

    /// Re-evaluate the summed impedance every this many turns even when the
    /// grid is unchanged. `None` re-evaluates only on grid changes and
    /// `reprocess`.
    pub recalc_interval: Option<NonZeroU64>,

    pub cadence: CadencePolicy,

    /// Number of previous turns whose wake contributions are remembered and
    /// folded into the current voltage. Zero disables the memory.
    pub turn_memory: usize,

    /// Ring revolution period \[s\]; required when `turn_memory > 0` so past
    /// contributions can be aligned by absolute time.
    pub revolution_period: Option<f64>,

    /// Additionally keep per-source impedance and voltage matrices
    /// (diagnostic).
    pub save_individual_voltages: bool,

    /// Multiplies the chosen FFT length; 1 means no oversampling.
    pub oversampling: usize,
}

impl Default for FreqConfig {
    fn default() -> FreqConfig {
        FreqConfig {
            frequency_resolution: None,
            rounding: ResolutionRounding::Round,
            recalc_interval: None,
            cadence: CadencePolicy::AllTurns,
            turn_memory: 0,
            revolution_period: None,
            save_individual_voltages: false,
            oversampling: 1,
        }
    }
}

/// One remembered turn of wake contribution. The time axis is absolute
/// (within the entry's own turn), so later turns can sample it regardless
/// of how the slicing has changed since.
#[derive(Debug, Clone)]
struct WakeMemoryEntry {
    turn: u64,
    times: Vec<f64>,
    voltage: Vec<f64>,
}

/// Induced voltage from the inverse FFT of the beam spectrum times the
/// summed impedance (Fourier convolution).
pub struct InducedVoltageFreq {
    engine: Arc<TransformEngine>,
    sources: Vec<Arc<dyn ImpedanceSource>>,
    config: FreqConfig,

    // Frequency grid state.
    n_fft: usize,
    bin_width: f64,
    n_bins: usize,
    freq_array: Vec<f64>,
    achieved_resolution: f64,

    // Cached impedance. Shared so callers can observe reuse vs
    // recomputation by object identity.
    total_impedance: Arc<Vec<Complex64>>,
    individual_impedances: Option<Array2<Complex64>>,
    individual_voltages: Option<Array2<f64>>,

    // Multi-turn wake memory, oldest first.
    memory: VecDeque<WakeMemoryEntry>,

    voltage: Vec<f64>,
    turn: u64,
    last_recalc_turn: u64,
    unchanged_turns: u64,
}

impl InducedVoltageFreq {
    pub fn new(
        engine: Arc<TransformEngine>,
        sources: Vec<Arc<dyn ImpedanceSource>>,
        profile: &Profile,
        config: FreqConfig,
    ) -> Result<InducedVoltageFreq, VoltageError> {
        if let Some(res) = config.frequency_resolution {
            if res <= 0.0 {
                return Err(VoltageError::NonPositiveResolution(res));
            }
        }
        if config.oversampling == 0 {
            return Err(VoltageError::ZeroOversampling);
        }
        if config.turn_memory > 0 && !config.revolution_period.map_or(false, |t| t > 0.0) {
            return Err(VoltageError::NonPositiveRevolutionPeriod);
        }

        let mut calc = InducedVoltageFreq {
            engine,
            sources,
            config,
            n_fft: 0,
            bin_width: 0.0,
            n_bins: 0,
            freq_array: vec![],
            achieved_resolution: 0.0,
            total_impedance: Arc::new(vec![]),
            individual_impedances: None,
            individual_voltages: None,
            memory: VecDeque::new(),
            voltage: vec![],
            turn: 0,
            last_recalc_turn: 0,
            unchanged_turns: 0,
        };
        calc.rebuild_grid(profile)?;
        Ok(calc)
    }

    /// The frequency grid the impedance is evaluated on \[Hz\].
    pub fn frequency_grid(&self) -> &[f64] {
        &self.freq_array
    }

    /// The resolution actually achieved by the chosen FFT length \[Hz\].
    pub fn achieved_resolution(&self) -> f64 {
        self.achieved_resolution
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    /// The cached summed impedance. The same allocation is returned until
    /// the recalculation cadence elapses or the grid changes, so callers
    /// can distinguish reuse from recomputation with [`Arc::ptr_eq`].
    pub fn impedance_spectrum(&self) -> Arc<Vec<Complex64>> {
        Arc::clone(&self.total_impedance)
    }

    /// Per-source voltages of the last computation, one row per configured
    /// source; present only under `save_individual_voltages`.
    pub fn individual_voltages(&self) -> Option<&Array2<f64>> {
        self.individual_voltages.as_ref()
    }

    /// Sum the configured impedance sources on an arbitrary grid without
    /// touching the cached spectrum; for plotting/diagnostic collaborators.
    pub fn sum_impedances_on(&self, freqs: &[f64]) -> Vec<Complex64> {
        sum_impedances(&self.sources, freqs)
    }

    /// Pick the FFT length for the current profile under the configured
    /// rounding policy.
    fn choose_n_fft(&self, profile: &Profile) -> Result<usize, VoltageError> {
        let bin_width = profile.bin_width();
        if !(bin_width > 0.0) {
            return Err(VoltageError::ZeroBinWidth);
        }

        let mut n = match self.config.frequency_resolution {
            None => profile.n_bins(),
            Some(res) => {
                let target = 1.0 / (res * bin_width);
                match self.config.rounding {
                    ResolutionRounding::Ceil => math::next_regular(target.ceil() as usize),
                    ResolutionRounding::Floor => {
                        math::previous_regular((target.floor() as usize).max(1))
                    }
                    ResolutionRounding::Round => {
                        let hi = math::next_regular(target.ceil() as usize);
                        let lo = math::previous_regular((target.floor() as usize).max(1));
                        let deviation =
                            |n: usize| (1.0 / (n as f64 * bin_width) - res).abs();
                        // Ties prefer the larger length (finer grid).
                        if deviation(hi) <= deviation(lo) {
                            hi
                        } else {
                            lo
                        }
                    }
                }
            }
        };

        if n < profile.n_bins() {
            warn!(
                "the requested frequency resolution is too coarse to sample the whole \
                 bunch; correcting the FFT length from {n} to cover all {} bins",
                profile.n_bins()
            );
            n = math::next_regular(profile.n_bins());
        }
        if self.config.oversampling > 1 {
            n = math::next_regular(n * self.config.oversampling);
        }
        Ok(n)
    }

    fn rebuild_grid(&mut self, profile: &Profile) -> Result<(), VoltageError> {
        self.n_fft = self.choose_n_fft(profile)?;
        self.bin_width = profile.bin_width();
        self.n_bins = profile.n_bins();
        self.freq_array = transform::rfftfreq(self.n_fft, self.bin_width);
        self.achieved_resolution = 1.0 / (self.n_fft as f64 * self.bin_width);
        debug!(
            "frequency grid rebuilt: {} FFT points, achieved resolution {:.6e} Hz",
            self.n_fft, self.achieved_resolution
        );
        self.recompute_impedance();
        Ok(())
    }

    fn recompute_impedance(&mut self) {
        self.total_impedance = Arc::new(sum_impedances(&self.sources, &self.freq_array));
        self.last_recalc_turn = self.turn;
        self.unchanged_turns = 0;

        self.individual_impedances = if self.config.save_individual_voltages {
            let mut matrix = Array2::zeros((self.sources.len(), self.freq_array.len()));
            for (source, mut row) in self.sources.iter().zip(matrix.outer_iter_mut()) {
                let z = source.impedance(&self.freq_array);
                for (dst, v) in row.iter_mut().zip(z) {
                    *dst = v;
                }
            }
            Some(matrix)
        } else {
            None
        };
    }

    /// Fold remembered contributions of previous turns into `voltage`, then
    /// remember the current turn's full-length contribution.
    fn apply_turn_memory(&mut self, profile: &Profile, full_voltage: Vec<f64>, voltage: &mut [f64]) {
        // Validated at construction.
        let t_rev = self.config.revolution_period.unwrap_or(0.0);

        // A repeated call within the same turn replaces its own entry
        // rather than folding it back in and double counting the wake.
        if self.memory.back().map_or(false, |e| e.turn == self.turn) {
            self.memory.pop_back();
        }

        for entry in &self.memory {
            let delta_turns = self.turn.saturating_sub(entry.turn) as f64;
            let eval_times: Vec<f64> = profile
                .bin_centers
                .iter()
                .map(|t| t + delta_turns * t_rev)
                .collect();
            let contribution =
                math::lin_interp(&eval_times, &entry.times, &entry.voltage, 0.0, 0.0);
            for (v, c) in voltage.iter_mut().zip(contribution) {
                *v += c;
            }
        }

        let times: Vec<f64> = (0..self.n_fft)
            .map(|i| profile.cut_left() + (i as f64 + 0.5) * self.bin_width)
            .collect();
        self.memory.push_back(WakeMemoryEntry {
            turn: self.turn,
            times,
            voltage: full_voltage,
        });
        while self.memory.len() > self.config.turn_memory {
            // Evict, not overwrite: the oldest contribution leaves the
            // window entirely.
            self.memory.pop_front();
        }
    }
}

impl InducedVoltage for InducedVoltageFreq {
    fn induced_voltage_generation(
        &mut self,
        beam: &Beam,
        profile: &Profile,
    ) -> Result<Vec<f64>, VoltageError> {
        let bin_width = profile.bin_width();
        if !(bin_width > 0.0) {
            return Err(VoltageError::ZeroBinWidth);
        }

        let grid_changed = bin_width != self.bin_width || profile.n_bins() != self.n_bins;
        if grid_changed {
            self.rebuild_grid(profile)?;
        } else if let Some(interval) = self.config.recalc_interval {
            let elapsed = match self.config.cadence {
                CadencePolicy::AllTurns => self.turn.saturating_sub(self.last_recalc_turn),
                CadencePolicy::UnchangedGrid => {
                    self.unchanged_turns += 1;
                    self.unchanged_turns
                }
            };
            if elapsed >= interval.get() {
                debug!("impedance recalculation cadence elapsed on turn {}", self.turn);
                self.recompute_impedance();
            }
        }

        let n_bins = profile.n_bins();
        if beam.n_macroparticles() == 0 || profile.total_count() == 0.0 {
            warn!("zero beam population; frequency-domain induced voltage is all zero");
            self.voltage = vec![0.0; n_bins];
            return Ok(self.voltage.clone());
        }

        let spectrum = profile.spectrum(&self.engine, self.n_fft)?;
        let factor = wake_factor(beam)
            * self.achieved_resolution
            * 2.0
            * (spectrum.len() - 1) as f64;

        let product: Vec<Complex64> = izip!(&spectrum, self.total_impedance.iter())
            .map(|(s, z)| s * z)
            .collect();
        let mut full_voltage = self.engine.irfft(&product, self.n_fft)?;
        for v in &mut full_voltage {
            *v *= factor;
        }

        if let Some(z_matrix) = &self.individual_impedances {
            let mut volts = Array2::zeros((self.sources.len(), n_bins));
            for (z_row, mut v_row) in z_matrix.outer_iter().zip(volts.outer_iter_mut()) {
                let product: Vec<Complex64> = izip!(&spectrum, z_row.iter())
                    .map(|(s, z)| s * z)
                    .collect();
                let res = self.engine.irfft(&product, self.n_fft)?;
                for (dst, v) in v_row.iter_mut().zip(res) {
                    *dst = v * factor;
                }
            }
            self.individual_voltages = Some(volts);
        }

        let mut voltage: Vec<f64> = full_voltage[..n_bins].to_vec();
        if self.config.turn_memory > 0 {
            self.apply_turn_memory(profile, full_voltage, &mut voltage);
        }

        self.voltage = voltage.clone();
        Ok(voltage)
    }

    fn track(&mut self) {
        self.turn += 1;
    }

    fn reprocess(&mut self, profile: &Profile) -> Result<(), VoltageError> {
        self.rebuild_grid(profile)
    }

    fn last_voltage(&self) -> &[f64] {
        &self.voltage
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// The sum of all configured induced-voltage contributions; what the
/// tracking loop consumes.
pub struct TotalInducedVoltage {
    calculators: Vec<Box<dyn InducedVoltage>>,
    voltage: Vec<f64>,
    turn: u64,
}

impl TotalInducedVoltage {
    pub fn new(calculators: Vec<Box<dyn InducedVoltage>>) -> TotalInducedVoltage {
        TotalInducedVoltage {
            calculators,
            voltage: vec![],
            turn: 0,
        }
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Sum every contribution onto the current profile's bin grid. Each
    /// member voltage is copied into the sum, never aliased.
    pub fn induced_voltage_sum(
        &mut self,
        beam: &Beam,
        profile: &Profile,
    ) -> Result<Vec<f64>, VoltageError> {
        let mut total = vec![0.0; profile.n_bins()];
        for calc in &mut self.calculators {
            let contribution = calc.induced_voltage_generation(beam, profile)?;
            if contribution.len() != total.len() {
                return Err(VoltageError::BinCountMismatch {
                    expected: total.len(),
                    got: contribution.len(),
                });
            }
            for (t, c) in total.iter_mut().zip(contribution) {
                *t += c;
            }
        }
        self.voltage = total.clone();
        Ok(total)
    }
}

impl InducedVoltage for TotalInducedVoltage {
    fn induced_voltage_generation(
        &mut self,
        beam: &Beam,
        profile: &Profile,
    ) -> Result<Vec<f64>, VoltageError> {
        self.induced_voltage_sum(beam, profile)
    }

    fn track(&mut self) {
        self.turn += 1;
        for calc in &mut self.calculators {
            calc.track();
        }
    }

    fn reprocess(&mut self, profile: &Profile) -> Result<(), VoltageError> {
        for calc in &mut self.calculators {
            calc.reprocess(profile)?;
        }
        Ok(())
    }

    fn last_voltage(&self) -> &[f64] {
        &self.voltage
    }
}
