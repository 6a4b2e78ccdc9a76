//! Usadel diffusion equation in Riccati form.
//!
//! For a fixed complex energy the equation gives the second derivatives
//! `(d2g, d2gt)` from the local state. The plain-conductor part is always
//! present; pairing, spin-orbit coupling, exchange field, spin-dependent
//! scattering and orbital depairing are added on top when configured.
//! Every term is a pure function of its inputs, so the solver may evaluate
//! it at arbitrary trial states.
use super::errors::QResult;
use super::nambu::{self, NambuMatrix};
use super::propagator::Propagator;
use super::spin_matrix::{C64, I, PAULI0, PAULI2, SpinMatrix};
use super::spin_orbit::SpinOrbit;
use super::superconductor::GapProfile;

/// Optional terms of the diffusion equation, all normalized to the Thouless energy.
#[derive(Debug, Clone, Default)]
pub struct DiffusionTerms {
    pub gap: Option<GapProfile>,
    pub spin_orbit: Option<SpinOrbit>,
    /// h·σ of a ferromagnet
    pub exchange: Option<SpinMatrix>,
    pub spinflip: f64,
    pub spinorbit_scattering: f64,
    pub depairing: f64,
}

impl DiffusionTerms {
    /// (d2g, d2gt) at normalized energy `e` and position `z`
    pub fn evaluate(&self, e: C64, z: f64, state: &Propagator) -> QResult<(SpinMatrix, SpinMatrix)> {
        let n = state.normalization()?;
        let nt = state.normalization_tilde()?;
        let Propagator { g, gt, dg, dgt } = *state;

        let mut d2g = dg * nt * gt * dg * (-2.0) - g * (2.0 * I * e);
        let mut d2gt = dgt * n * g * dgt * (-2.0) - gt * (2.0 * I * e);

        if let Some(profile) = &self.gap {
            let gap = profile.at(z);
            d2g -= PAULI2 * gap - g * PAULI2 * g * gap.conj();
            d2gt += PAULI2 * gap.conj() - gt * PAULI2 * gt * gap;
        }

        if let Some(so) = &self.spin_orbit {
            let (sg, sgt) = so.diffusion_terms(&g, &gt, &dg, &dgt, &n, &nt);
            d2g += sg;
            d2gt += sgt;
        }

        if let Some(h) = &self.exchange {
            let ht = h.conj();
            d2g -= (*h * g - g * ht) * I;
            d2gt += (ht * gt - gt * *h) * I;
        }

        if self.spinflip != 0.0 || self.spinorbit_scattering != 0.0 {
            let gm = nambu::from_blocks(
                &(n * (PAULI0 + g * gt)),
                &(n * g * 2.0),
                &(nt * gt * (-2.0)),
                &(-(nt * (PAULI0 + gt * g))),
            );
            let h = self.scattering_self_energy(&gm);
            let (sg, sgt) = project_commutator(&h, &g, &gt);
            d2g += sg;
            d2gt += sgt;
        }

        if self.depairing > 0.0 {
            d2g += (n * 2.0 - PAULI0) * g * self.depairing;
            d2gt += (nt * 2.0 - PAULI0) * gt * self.depairing;
        }

        Ok((d2g, d2gt))
    }

    /// (i/8)(Γsf Σⱼ σ̂ⱼ G σ̂ⱼ + Γso Σⱼ σ̂ⱼ τ₃ G τ₃ σ̂ⱼ)
    fn scattering_self_energy(&self, gm: &NambuMatrix) -> NambuMatrix {
        let tau3 = nambu::tau3();
        let flipped = tau3 * gm * tau3;
        let mut h = NambuMatrix::zeros();
        for j in 1..4 {
            let s = nambu::spin_vertex(j);
            if self.spinflip != 0.0 {
                h += s * gm * s * C64::new(self.spinflip, 0.0);
            }
            if self.spinorbit_scattering != 0.0 {
                h += s * flipped * s * C64::new(self.spinorbit_scattering, 0.0);
            }
        }
        h * C64::new(0.0, 1.0 / 8.0)
    }
}

/// Riccati projection of a source term `−i[H, G]` in `∂(G∂G) = −i[H, G]`
pub fn project_commutator(h: &NambuMatrix, g: &SpinMatrix, gt: &SpinMatrix) -> (SpinMatrix, SpinMatrix) {
    let h11 = nambu::block(h, 0, 0);
    let h12 = nambu::block(h, 0, 2);
    let h21 = nambu::block(h, 2, 0);
    let h22 = nambu::block(h, 2, 2);
    let (g, gt) = (*g, *gt);
    let d2g = (h11 * g - g * h22 - h12 + g * h21 * g) * (-I);
    let d2gt = (h22 * gt - gt * h11 - h21 + gt * h12 * gt) * I;
    (d2g, d2gt)
}

#[cfg(test)]
#[path = "diffusion_tests.rs"]
mod diffusion_tests;
