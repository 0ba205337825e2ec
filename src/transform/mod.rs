// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
FFT execution with transform-plan caching.

Planning an FFT is far more expensive than executing one, and the induced
voltage loop runs the same handful of transform sizes every turn, so the
engine keeps every plan it has ever built in a process-lifetime cache keyed
by `(kind, length)`. Plans are immutable once built; lookups take a read
lock, insertions a write lock with a double-check so no key is planned
twice.

Real transforms use the packed half-spectrum layout: only the first
`n/2 + 1` complex bins are returned/consumed, the rest being fixed by
conjugate symmetry. [`pack_spectrum`] and [`unpack_spectrum`] convert
between the two layouts.
 */

mod error;
#[cfg(test)]
mod tests;

pub use error::TransformError;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use num_complex::Complex64;
use num_traits::Zero;
use rustfft::{Fft, FftPlanner};

/// The four transform flavours the engine can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    Forward,
    Inverse,
    ForwardReal,
    InverseReal,
}

/// An FFT executor owning a plan cache.
///
/// One engine instance is shared (by reference) between all induced-voltage
/// calculators; it is safe to call from multiple threads.
pub struct TransformEngine {
    planner: Mutex<FftPlanner<f64>>,
    plans: RwLock<HashMap<(TransformKind, usize), Arc<dyn Fft<f64>>>>,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TransformEngine")
            .field("cached_plans", &self.plan_count())
            .finish()
    }
}

impl TransformEngine {
    pub fn new() -> TransformEngine {
        TransformEngine {
            planner: Mutex::new(FftPlanner::new()),
            plans: RwLock::new(HashMap::new()),
        }
    }

    /// Get the cached plan for `(kind, n)`, building and inserting it on the
    /// first request.
    fn plan(&self, kind: TransformKind, n: usize) -> Result<Arc<dyn Fft<f64>>, TransformError> {
        if n == 0 {
            return Err(TransformError::ZeroLength);
        }

        {
            let plans = self.plans.read().expect("plan cache lock poisoned");
            if let Some(plan) = plans.get(&(kind, n)) {
                return Ok(Arc::clone(plan));
            }
        }

        let mut plans = self.plans.write().expect("plan cache lock poisoned");
        // Another thread may have planned this size while we waited for the
        // write lock.
        if let Some(plan) = plans.get(&(kind, n)) {
            return Ok(Arc::clone(plan));
        }

        let mut planner = self.planner.lock().expect("planner lock poisoned");
        let plan = match kind {
            TransformKind::Forward | TransformKind::ForwardReal => planner.plan_fft_forward(n),
            TransformKind::Inverse | TransformKind::InverseReal => planner.plan_fft_inverse(n),
        };
        plans.insert((kind, n), Arc::clone(&plan));
        log::debug!("planned {kind:?} transform of length {n}");
        Ok(plan)
    }

    /// Forward complex DFT of logical length `n`; the input is zero-padded
    /// or truncated to fit.
    pub fn fft(&self, input: &[Complex64], n: usize) -> Result<Vec<Complex64>, TransformError> {
        let plan = self.plan(TransformKind::Forward, n)?;
        let mut buf = vec![Complex64::zero(); n];
        let m = input.len().min(n);
        buf[..m].copy_from_slice(&input[..m]);
        plan.process(&mut buf);
        Ok(buf)
    }

    /// Inverse complex DFT of logical length `n`, normalized by `1/n`.
    pub fn ifft(&self, input: &[Complex64], n: usize) -> Result<Vec<Complex64>, TransformError> {
        let plan = self.plan(TransformKind::Inverse, n)?;
        let mut buf = vec![Complex64::zero(); n];
        let m = input.len().min(n);
        buf[..m].copy_from_slice(&input[..m]);
        plan.process(&mut buf);
        let scale = 1.0 / n as f64;
        for v in &mut buf {
            *v *= scale;
        }
        Ok(buf)
    }

    /// Forward transform of a real signal at logical length `n`, returning
    /// the packed half-spectrum of `n/2 + 1` bins.
    pub fn rfft(&self, input: &[f64], n: usize) -> Result<Vec<Complex64>, TransformError> {
        let plan = self.plan(TransformKind::ForwardReal, n)?;
        let mut buf = vec![Complex64::zero(); n];
        for (dst, &src) in buf.iter_mut().zip(input.iter()) {
            *dst = Complex64::new(src, 0.0);
        }
        plan.process(&mut buf);
        buf.truncate(n / 2 + 1);
        Ok(buf)
    }

    /// Inverse of [`TransformEngine::rfft`]: expand a packed half-spectrum
    /// to length `n` by conjugate symmetry, inverse transform, and return
    /// the `1/n`-normalized real samples.
    pub fn irfft(&self, packed: &[Complex64], n: usize) -> Result<Vec<f64>, TransformError> {
        let plan = self.plan(TransformKind::InverseReal, n)?;
        let mut buf = unpack_spectrum(packed, n);
        plan.process(&mut buf);
        let scale = 1.0 / n as f64;
        Ok(buf.into_iter().map(|v| v.re * scale).collect())
    }

    /// Linear convolution of two real sequences through padded forward and
    /// inverse real transforms. The result has
    /// `signal.len() + kernel.len() - 1` samples.
    pub fn convolve(&self, signal: &[f64], kernel: &[f64]) -> Result<Vec<f64>, TransformError> {
        if signal.is_empty() || kernel.is_empty() {
            return Ok(vec![]);
        }
        let size = signal.len() + kernel.len() - 1;
        let a = self.rfft(signal, size)?;
        let b = self.rfft(kernel, size)?;
        let product: Vec<Complex64> = a.iter().zip(b.iter()).map(|(x, y)| x * y).collect();
        self.irfft(&product, size)
    }

    /// The number of cached plans.
    pub fn plan_count(&self) -> usize {
        self.plans.read().expect("plan cache lock poisoned").len()
    }

    /// Release every cached plan. Subsequent transforms re-plan on demand.
    pub fn clear_plans(&self) {
        self.plans
            .write()
            .expect("plan cache lock poisoned")
            .clear();
    }
}

/// Sample frequencies of the packed real-transform layout for `n` points
/// spaced `d` seconds apart (numpy `rfftfreq` semantics).
pub fn rfftfreq(n: usize, d: f64) -> Vec<f64> {
    (0..=n / 2).map(|i| i as f64 / (n as f64 * d)).collect()
}

/// Keep only the non-redundant half of a full complex spectrum of a real
/// signal.
pub fn pack_spectrum(full: &[Complex64]) -> Vec<Complex64> {
    if full.is_empty() {
        return vec![];
    }
    full[..full.len() / 2 + 1].to_vec()
}

/// Expand a packed half-spectrum back to the full `n`-bin complex spectrum
/// using conjugate symmetry.
pub fn unpack_spectrum(packed: &[Complex64], n: usize) -> Vec<Complex64> {
    if n == 0 {
        return vec![];
    }
    let mut full = vec![Complex64::zero(); n];
    let m = packed.len().min(n / 2 + 1);
    full[..m].copy_from_slice(&packed[..m]);
    // Negative-frequency bins mirror the positive ones; for even n the
    // Nyquist bin n/2 is its own mirror.
    let max_k = (n.saturating_sub(1)) / 2;
    for k in 1..=max_k {
        full[n - k] = full[k].conj();
    }
    full
}
