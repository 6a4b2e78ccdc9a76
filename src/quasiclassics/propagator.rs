//! Riccati-parametrized retarded propagator at one (energy, position) point.
//!
//! The state consists of the Riccati matrices `g, gt` and their spatial
//! derivatives `dg, dgt`. Everything observable is derived through the
//! 4×4 Nambu matrix
//! ```text
//! G = [ +N(σ₀ + g·gt)    +2N·g          ]
//!     [ −2Nt·gt          −Nt(σ₀ + gt·g) ]
//! ```
//! with `N = (σ₀ − g·gt)⁻¹` and `Nt = (σ₀ − gt·g)⁻¹`.
//!
//! The flat real layout used by the BVP driver is 32 reals per point:
//! g, gt, dg, dgt in that order, 8 reals each (see `SpinMatrix::write_reals`).
use super::errors::QResult;
use super::nambu::{self, NambuMatrix};
use super::spin_matrix::{C64, I, PAULI, PAULI0, PAULI2, SpinMatrix};
use super::spin_orbit::SpinOrbit;

/// reals per packed propagator
pub const PACKED_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Propagator {
    pub g: SpinMatrix,
    pub gt: SpinMatrix,
    pub dg: SpinMatrix,
    pub dgt: SpinMatrix,
}

impl Propagator {
    pub fn new(g: SpinMatrix, gt: SpinMatrix, dg: SpinMatrix, dgt: SpinMatrix) -> Self {
        Propagator { g, gt, dg, dgt }
    }

    /// normal-metal equilibrium: all Riccati matrices vanish
    pub fn normal() -> Self {
        Propagator::default()
    }

    /// homogeneous BCS state for the (complex, normalized) energy `e` and gap `gap`
    pub fn bcs(e: C64, gap: C64) -> Self {
        if gap.norm() < 1e-300 {
            return Propagator::normal();
        }
        let abs_gap = gap.norm();
        let s = (e - abs_gap).sqrt() * (e + abs_gap).sqrt();
        let a = I * (e - s) / gap.conj();
        let b = -I * (e - s) / gap;
        let zero = SpinMatrix::zeros();
        Propagator::new(PAULI2 * a, PAULI2 * b, zero, zero)
    }

    pub fn normalization(&self) -> QResult<SpinMatrix> {
        (PAULI0 - self.g * self.gt).inv()
    }

    pub fn normalization_tilde(&self) -> QResult<SpinMatrix> {
        (PAULI0 - self.gt * self.g).inv()
    }

    /// 4×4 retarded propagator
    pub fn matrix(&self) -> QResult<NambuMatrix> {
        let n = self.normalization()?;
        let nt = self.normalization_tilde()?;
        let (g, gt) = (self.g, self.gt);
        Ok(nambu::from_blocks(
            &(n * (PAULI0 + g * gt)),
            &(n * g * 2.0),
            &(nt * gt * (-2.0)),
            &(-(nt * (PAULI0 + gt * g))),
        ))
    }

    /// spatial derivative of `matrix()`
    pub fn matrix_gradient(&self) -> QResult<NambuMatrix> {
        let n = self.normalization()?;
        let nt = self.normalization_tilde()?;
        let (g, gt, dg, dgt) = (self.g, self.gt, self.dg, self.dgt);
        Ok(nambu::from_blocks(
            &(n * (dg * gt + g * dgt) * n * 2.0),
            &(n * (dg + g * dgt * g) * nt * 2.0),
            &(nt * (dgt + gt * dg * gt) * n * (-2.0)),
            &(nt * (dgt * g + gt * dg) * nt * (-2.0)),
        ))
    }

    /// density of states normalized to the normal state
    pub fn density(&self) -> QResult<f64> {
        let g = self.matrix()?;
        Ok(nambu::block(&g, 0, 0).trace().re / 2.0)
    }

    /// spin-up and spin-down density of states along z
    pub fn density_spin(&self) -> QResult<[f64; 2]> {
        let g = self.matrix()?;
        Ok([g[(0, 0)].re, g[(1, 1)].re])
    }

    /// (f_s, f_x, f_y, f_z) from F = (f_s + f·σ) iσ₂, F the electron-hole block
    pub fn anomalous(&self) -> QResult<[C64; 4]> {
        let g = self.matrix()?;
        Ok(decompose_anomalous(&nambu::block(&g, 0, 2)))
    }

    /// same decomposition for the hole-electron block
    pub fn anomalous_tilde(&self) -> QResult<[C64; 4]> {
        let g = self.matrix()?;
        Ok(decompose_anomalous(&nambu::block(&g, 2, 0)))
    }

    /// singlet pair amplitude
    pub fn correlation(&self) -> QResult<C64> {
        Ok(self.anomalous()?[0])
    }

    /// triplet d-vector
    pub fn triplet(&self) -> QResult<[C64; 3]> {
        let f = self.anomalous()?;
        Ok([f[1], f[2], f[3]])
    }

    /// retarded matrix current G·∂̃G
    pub fn matrix_current(&self, spin_orbit: Option<&SpinOrbit>) -> QResult<NambuMatrix> {
        let g = self.matrix()?;
        let dg = self.matrix_gradient()?;
        let mut current = g * dg;
        if let Some(so) = spin_orbit {
            current += so.gauge_correction(&g);
        }
        Ok(current)
    }

    /// spectral currents (charge, spin x/y/z, heat, spin-heat x/y/z)
    pub fn current(&self, spin_orbit: Option<&SpinOrbit>) -> QResult<[f64; 8]> {
        let retarded = self.matrix_current(spin_orbit)?;
        let keldysh_like = retarded - nambu::advanced(&retarded);
        Ok(project_vertices(&keldysh_like))
    }

    /// spectral accumulations with the same component layout as `current`
    pub fn accumulation(&self) -> QResult<[f64; 8]> {
        let g = self.matrix()?;
        let spectral = g - nambu::advanced(&g);
        Ok(project_vertices(&spectral))
    }

    pub fn is_finite(&self) -> bool {
        self.g.is_finite() && self.gt.is_finite() && self.dg.is_finite() && self.dgt.is_finite()
    }

    /// write the 32-real representation into `out`
    pub fn pack(&self, out: &mut [f64]) {
        self.g.write_reals(&mut out[0..8]);
        self.gt.write_reals(&mut out[8..16]);
        self.dg.write_reals(&mut out[16..24]);
        self.dgt.write_reals(&mut out[24..32]);
    }

    pub fn unpack(data: &[f64]) -> Self {
        Propagator {
            g: SpinMatrix::read_reals(&data[0..8]),
            gt: SpinMatrix::read_reals(&data[8..16]),
            dg: SpinMatrix::read_reals(&data[16..24]),
            dgt: SpinMatrix::read_reals(&data[24..32]),
        }
    }
}

fn decompose_anomalous(f: &SpinMatrix) -> [C64; 4] {
    // (iσ₂)⁻¹ = −iσ₂
    let unwound = *f * (PAULI2 * (-I));
    unwound.pauli_components()
}

/// Nambu vertices: charge τ₃, spin diag(σ, −σ*), heat 1, spin-heat diag(σ, σ*)
fn vertex(k: usize) -> NambuMatrix {
    match k {
        0 => nambu::tau3(),
        1..=3 => nambu::conjugate_pair(&PAULI[k], -1.0),
        4 => NambuMatrix::identity(),
        _ => nambu::conjugate_pair(&PAULI[k - 4], 1.0),
    }
}

fn project_vertices(m: &NambuMatrix) -> [f64; 8] {
    std::array::from_fn(|k| (vertex(k) * m).trace().re / 8.0)
}

#[cfg(test)]
#[path = "propagator_tests.rs"]
mod propagator_tests;
