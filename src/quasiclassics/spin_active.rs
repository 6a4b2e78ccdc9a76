//! Spin-active tunneling interface: spin-dependent transmission (polarization)
//! and spin-mixing phase shifts encoded in a magnetization matrix.
//!
//! The matrix current through the interface is
//! ```text
//! I = [G0, T(G1) − iQ·M0 + c2·(T2 + R2 + C2)]
//! T(X) = t0²·X + t1²·M X M + t0t1·{M, X}
//! ```
//! where `G0` is the local propagator, `G1` the neighbor's, `M` is built from
//! the magnetization and `M0`/`M1` from the misalignment vectors of the two
//! sides. The second-order terms (`c2 ≠ 0`) assume identical interface
//! parameters on both sides and a narrow distribution of channel
//! transmissions; they have not been validated against reference results.
use super::errors::QResult;
use super::nambu::{self, NambuMatrix};
use super::propagator::Propagator;
use super::spin_matrix::{C64, PAULI0, SpinMatrix};

#[derive(Debug, Clone, PartialEq)]
pub struct SpinActiveInterface {
    pub conductance: f64,
    /// spin polarization P in [−1, 1]
    pub polarization: f64,
    /// first-order spin-mixing Q
    pub spinmixing: f64,
    /// second-order coefficient c2, zero disables the second-order terms.
    /// Untested physics: assumes equal interface parameters on both sides.
    pub second_order: f64,
    pub magnetization: [f64; 3],
    /// axis of the spin-mixing term, defaults to the magnetization
    pub misalignment: Option<[f64; 3]>,
}

impl SpinActiveInterface {
    pub fn new(conductance: f64, polarization: f64, spinmixing: f64, magnetization: [f64; 3]) -> Self {
        SpinActiveInterface {
            conductance,
            polarization,
            spinmixing,
            second_order: 0.0,
            magnetization,
            misalignment: None,
        }
    }

    pub fn mixing_axis(&self) -> [f64; 3] {
        self.misalignment.unwrap_or(self.magnetization)
    }

    /// (t0², t1², t0·t1)
    fn transmission_weights(&self) -> (f64, f64, f64) {
        let root = (1.0 - self.polarization * self.polarization).sqrt();
        ((1.0 + root) / 2.0, (1.0 - root) / 2.0, self.polarization / 2.0)
    }

    /// T(X) = t0²·X + t1²·M X M + t0t1·{M, X}
    fn transmit(&self, x: &NambuMatrix, m: &NambuMatrix) -> NambuMatrix {
        let (t00, t11, t01) = self.transmission_weights();
        x * C64::new(t00, 0.0) + m * x * m * C64::new(t11, 0.0) + nambu::anticommutator(m, x) * C64::new(t01, 0.0)
    }

    /// matrix current from the local `g0` into the neighbor `g1`;
    /// `neighbor_axis` is the spin-mixing axis on the neighbor side
    pub fn matrix_current(&self, g0: &NambuMatrix, g1: &NambuMatrix, neighbor_axis: [f64; 3]) -> NambuMatrix {
        let m = magnetization_matrix(self.magnetization);
        let m0 = magnetization_matrix(self.mixing_axis());
        let mixing = C64::new(0.0, -self.spinmixing);

        let x = self.transmit(g1, &m);
        let w0 = m0 * mixing;
        let mut source = x + w0;

        if self.second_order != 0.0 {
            let w1 = magnetization_matrix(neighbor_axis) * mixing;
            let t2 = x * g0 * x;
            let r2 = w0 * g0 * w0;
            let c2 = w0 * g0 * x + x * g0 * w0 + self.transmit(&nambu::anticommutator(&w1, g1), &m);
            source += (t2 + r2 + c2) * C64::new(self.second_order, 0.0);
        }
        nambu::commutator(g0, &source)
    }

    /// boundary residual; `sign` is +1 on the left edge and −1 on the right
    pub fn residual(
        &self,
        sign: f64,
        state: &Propagator,
        neighbor: &Propagator,
        neighbor_axis: [f64; 3],
    ) -> QResult<(SpinMatrix, SpinMatrix)> {
        let g0 = state.matrix()?;
        let g1 = neighbor.matrix()?;
        let current = self.matrix_current(&g0, &g1, neighbor_axis);
        Ok(project_current(
            &current,
            state,
            sign * self.conductance / 4.0,
        ))
    }
}

/// diag(m·σ, (m·σ)*)
pub fn magnetization_matrix(m: [f64; 3]) -> NambuMatrix {
    nambu::conjugate_pair(&SpinMatrix::pauli_vector(m), 1.0)
}

/// (dg + c·(σ₀ − g·gt)(I12 − I11·g), dgt + c·(σ₀ − gt·g)(I21 − I22·gt))
pub fn project_current(current: &NambuMatrix, state: &Propagator, c: f64) -> (SpinMatrix, SpinMatrix) {
    let Propagator { g, gt, dg, dgt } = *state;
    let i11 = nambu::block(current, 0, 0);
    let i12 = nambu::block(current, 0, 2);
    let i21 = nambu::block(current, 2, 0);
    let i22 = nambu::block(current, 2, 2);
    let r = dg + (PAULI0 - g * gt) * (i12 - i11 * g) * c;
    let rt = dgt + (PAULI0 - gt * g) * (i21 - i22 * gt) * c;
    (r, rt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quasiclassics::boundary::tunneling_residual;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_matrix(rng: &mut StdRng, scale: f64) -> SpinMatrix {
        SpinMatrix(std::array::from_fn(|_| {
            C64::new(rng.random_range(-scale..scale), rng.random_range(-scale..scale))
        }))
    }

    fn random_state(rng: &mut StdRng) -> Propagator {
        Propagator::new(
            random_matrix(rng, 0.4),
            random_matrix(rng, 0.4),
            random_matrix(rng, 1.0),
            random_matrix(rng, 1.0),
        )
    }

    #[test]
    fn unpolarized_current_is_plain_commutator() {
        let mut rng = StdRng::seed_from_u64(41);
        let interface = SpinActiveInterface::new(0.3, 0.0, 0.0, [0.0, 0.0, 1.0]);
        for _ in 0..20 {
            let g0 = random_state(&mut rng).matrix().unwrap();
            let g1 = random_state(&mut rng).matrix().unwrap();
            let current = interface.matrix_current(&g0, &g1, [1.0, 0.0, 0.0]);
            // t0² = 1 and t1² = t0t1 = 0 exactly at P = 0
            assert_eq!(current, nambu::commutator(&g0, &g1));
        }
    }

    #[test]
    fn unpolarized_residual_equals_kupriyanov_lukichev() {
        let mut rng = StdRng::seed_from_u64(42);
        let interface = SpinActiveInterface::new(0.7, 0.0, 0.0, [0.0, 1.0, 0.0]);
        for _ in 0..20 {
            let state = random_state(&mut rng);
            let neighbor = random_state(&mut rng);
            for sign in [1.0, -1.0] {
                let (r, rt) = interface.residual(sign, &state, &neighbor, [0.0, 1.0, 0.0]).unwrap();
                let (kl, klt) = tunneling_residual(0.7, sign, &state, &neighbor).unwrap();
                assert!(r.approx_eq(&kl, 1e-11), "{:?} vs {:?}", r, kl);
                assert!(rt.approx_eq(&klt, 1e-11));
            }
        }
    }

    #[test]
    fn transmission_weights_are_normalized() {
        let interface = SpinActiveInterface::new(1.0, 0.6, 0.0, [0.0, 0.0, 1.0]);
        let (t00, t11, t01) = interface.transmission_weights();
        assert!((t00 + t11 - 1.0).abs() < 1e-15);
        // t0t1 squared equals t0²·t1²
        assert!((t01 * t01 - t00 * t11).abs() < 1e-15);
    }

    #[test]
    fn normal_metals_carry_no_matrix_current() {
        // G0 = G1 = τ3 commutes with every block-diagonal term
        let interface = SpinActiveInterface::new(1.0, 0.5, 0.3, [0.0, 0.0, 1.0]);
        let tau3 = nambu::tau3();
        let current = interface.matrix_current(&tau3, &tau3, [0.0, 0.0, 1.0]);
        assert!(current.norm() < 1e-15);
    }

    #[test]
    fn second_order_terms_change_the_current() {
        let mut rng = StdRng::seed_from_u64(43);
        let g0 = random_state(&mut rng).matrix().unwrap();
        let g1 = random_state(&mut rng).matrix().unwrap();
        let mut interface = SpinActiveInterface::new(1.0, 0.4, 0.2, [0.0, 0.0, 1.0]);
        let first = interface.matrix_current(&g0, &g1, [1.0, 0.0, 0.0]);
        interface.second_order = 0.1;
        let second = interface.matrix_current(&g0, &g1, [1.0, 0.0, 0.0]);
        assert!((second - first).norm() > 1e-6);
    }

    #[test]
    fn magnetization_matrix_squares_to_identity() {
        let m = magnetization_matrix([0.6, 0.0, 0.8]);
        assert!((m * m - NambuMatrix::identity()).norm() < 1e-15);
        let my = magnetization_matrix([0.0, 1.0, 0.0]);
        // σ₂* = −σ₂ in the hole block
        assert_eq!(nambu::block(&my, 2, 2), SpinMatrix::pauli_vector([0.0, -1.0, 0.0]));
    }
}
