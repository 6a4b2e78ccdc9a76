//! Superconducting pairing field and its self-consistent update.
//!
//! Energies and gaps are measured in units of the bulk zero-temperature gap,
//! so a bulk BCS superconductor with the default coupling `1/acosh(cutoff)`
//! reproduces `Δ = 1` at `T = 0`.
use super::errors::{QResult, QuasiclassicsError};
use super::propagator::Propagator;
use super::spin_matrix::C64;
use log::debug;
use nalgebra::DMatrix;

/// Complex gap sampled on normalized positions, linearly interpolated in between.
#[derive(Debug, Clone, PartialEq)]
pub struct GapProfile {
    pub positions: Vec<f64>,
    pub values: Vec<C64>,
}

impl GapProfile {
    pub fn new(positions: Vec<f64>, values: Vec<C64>) -> Self {
        GapProfile { positions, values }
    }

    pub fn uniform(positions: &[f64], gap: C64) -> Self {
        GapProfile::new(positions.to_vec(), vec![gap; positions.len()])
    }

    /// gap at `z`, clamped to the end values outside the sampled range
    pub fn at(&self, z: f64) -> C64 {
        let n = self.positions.len();
        match n {
            0 => C64::new(0.0, 0.0),
            1 => self.values[0],
            _ => {
                if z <= self.positions[0] {
                    return self.values[0];
                }
                if z >= self.positions[n - 1] {
                    return self.values[n - 1];
                }
                let i = self.positions.partition_point(|&p| p <= z).saturating_sub(1).min(n - 2);
                let (z0, z1) = (self.positions[i], self.positions[i + 1]);
                let t = (z - z0) / (z1 - z0);
                self.values[i] * (1.0 - t) + self.values[i + 1] * t
            }
        }
    }

    pub fn scaled(&self, factor: f64) -> GapProfile {
        GapProfile::new(self.positions.clone(), self.values.iter().map(|v| v * factor).collect())
    }

    /// largest |Δ| along the profile
    pub fn max_abs(&self) -> f64 {
        self.values.iter().fold(0.0_f64, |acc, v| acc.max(v.norm()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Superconductor {
    pub gap: GapProfile,
    /// BCS coupling; `None` derives it from the cutoff
    pub coupling: Option<f64>,
    pub temperature: f64,
    /// Debye cutoff of the gap-equation integral
    pub cutoff: f64,
}

impl Superconductor {
    pub fn new(positions: &[f64], gap: C64, temperature: f64, cutoff: f64) -> Self {
        Superconductor {
            gap: GapProfile::uniform(positions, gap),
            coupling: None,
            temperature,
            cutoff,
        }
    }

    pub fn validate(&self) -> QResult<()> {
        if !(self.cutoff > 1.0) {
            return Err(QuasiclassicsError::config(format!(
                "superconductor cutoff must exceed the bulk gap, got {}",
                self.cutoff
            )));
        }
        if !(self.temperature >= 0.0) {
            return Err(QuasiclassicsError::config(format!(
                "temperature must be non-negative, got {}",
                self.temperature
            )));
        }
        if let Some(c) = self.coupling {
            if !(c > 0.0) {
                return Err(QuasiclassicsError::config(format!("coupling must be positive, got {}", c)));
            }
        }
        Ok(())
    }

    /// λ of the gap equation
    pub fn coupling_constant(&self) -> f64 {
        self.coupling.unwrap_or_else(|| 1.0 / self.cutoff.acosh())
    }

    /// bulk BCS state with the local gap at `z`
    pub fn initial_state(&self, e: C64, z: f64) -> Propagator {
        Propagator::bcs(e, self.gap.at(z))
    }

    /// Recompute the gap from the solved states (energy × position, energies ascending and
    /// non-negative). Returns the largest change of |Δ - Δ_old|.
    pub fn update_gap(&mut self, energies: &[f64], states: &DMatrix<Propagator>) -> QResult<f64> {
        let lambda = self.coupling_constant();
        let weights = self.thermal_weights(energies);
        let mut change: f64 = 0.0;
        for (j, old) in self.gap.values.iter_mut().enumerate() {
            let mut integrand = Vec::with_capacity(energies.len());
            for i in 0..energies.len() {
                let state = &states[(i, j)];
                let fs = state.correlation()?;
                let fst = state.anomalous_tilde()?[0];
                integrand.push((fs + fst.conj()) * 0.5 * weights[i]);
            }
            let gap = trapezoid(energies, &integrand) * lambda;
            change = change.max((gap - *old).norm());
            *old = gap;
        }
        debug!(
            "gap update: max |Δ| = {:.6}, change {:.3e}",
            self.gap.max_abs(),
            change
        );
        Ok(change)
    }

    /// tanh(ε/2T) below the cutoff, zero above it
    fn thermal_weights(&self, energies: &[f64]) -> Vec<f64> {
        energies
            .iter()
            .map(|&e| {
                if e > self.cutoff {
                    0.0
                } else if self.temperature > 0.0 {
                    (e / (2.0 * self.temperature)).tanh()
                } else if e > 0.0 {
                    1.0
                } else {
                    0.0
                }
            })
            .collect()
    }
}

fn trapezoid(x: &[f64], y: &[C64]) -> C64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| (yw[0] + yw[1]) * (0.5 * (xw[1] - xw[0])))
        .sum()
}
