//! Boundary residuals at the two edges of a material.
//!
//! A residual pair `(r, rt)` vanishes at a physically valid boundary. The
//! interface kind decides the physics; a missing neighbor always reduces to
//! the vacuum condition. Materials with a spin-orbit field get the covariant
//! correction added to whichever residual is active.
use super::errors::QResult;
use super::propagator::Propagator;
use super::spin_active::SpinActiveInterface;
use super::spin_matrix::{PAULI0, SpinMatrix};
use super::spin_orbit::SpinOrbit;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// +1 for the left edge (z = 0), −1 for the right edge (z = 1)
    pub fn sign(&self) -> f64 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Interface {
    #[default]
    Vacuum,
    Transparent,
    /// Kupriyanov-Lukichev with the given interface conductance
    Tunneling { conductance: f64 },
    SpinActive(SpinActiveInterface),
}

impl Interface {
    pub fn name(&self) -> &'static str {
        match self {
            Interface::Vacuum => "vacuum",
            Interface::Transparent => "transparent",
            Interface::Tunneling { .. } => "tunneling",
            Interface::SpinActive(_) => "spinactive",
        }
    }

    /// spin-mixing axis presented to the material on the other side
    pub fn mixing_axis(&self) -> Option<[f64; 3]> {
        match self {
            Interface::SpinActive(sa) => Some(sa.mixing_axis()),
            _ => None,
        }
    }
}

/// What a material sees of its neighbor at one energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborEdge {
    /// neighbor state at the shared edge
    pub state: Propagator,
    /// neighbor's spin-mixing axis, if its side of the interface is spin-active
    pub mixing_axis: Option<[f64; 3]>,
}

/// residual for `interface` on `side` of a material in `state`
pub fn residual(
    interface: &Interface,
    side: Side,
    state: &Propagator,
    neighbor: Option<&NeighborEdge>,
    spin_orbit: Option<&SpinOrbit>,
) -> QResult<(SpinMatrix, SpinMatrix)> {
    let (mut r, mut rt) = match (interface, neighbor) {
        (Interface::Vacuum, _) | (_, None) => vacuum_residual(state),
        (Interface::Transparent, Some(n)) => transparent_residual(state, &n.state),
        (Interface::Tunneling { conductance }, Some(n)) => {
            tunneling_residual(*conductance, side.sign(), state, &n.state)?
        }
        (Interface::SpinActive(sa), Some(n)) => {
            let axis = n.mixing_axis.unwrap_or_else(|| sa.mixing_axis());
            sa.residual(side.sign(), state, &n.state, axis)?
        }
    };
    if let Some(so) = spin_orbit {
        let (cr, crt) = so.interface_terms(&state.g, &state.gt);
        r += cr;
        rt += crt;
    }
    Ok((r, rt))
}

pub fn vacuum_residual(state: &Propagator) -> (SpinMatrix, SpinMatrix) {
    (state.dg, state.dgt)
}

pub fn transparent_residual(state: &Propagator, neighbor: &Propagator) -> (SpinMatrix, SpinMatrix) {
    (state.g - neighbor.g, state.gt - neighbor.gt)
}

/// Kupriyanov-Lukichev residual; `sign` is +1 on the left edge and −1 on the right
pub fn tunneling_residual(
    conductance: f64,
    sign: f64,
    state: &Propagator,
    neighbor: &Propagator,
) -> QResult<(SpinMatrix, SpinMatrix)> {
    let n = neighbor.normalization()?;
    let nt = neighbor.normalization_tilde()?;
    let k = sign * conductance;
    let r = state.dg - (PAULI0 - state.g * neighbor.gt) * n * (state.g - neighbor.g) * k;
    let rt = state.dgt - (PAULI0 - state.gt * neighbor.g) * nt * (state.gt - neighbor.gt) * k;
    Ok((r, rt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quasiclassics::spin_matrix::{C64, PAULI2};
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

    fn edge(state: Propagator) -> NeighborEdge {
        NeighborEdge {
            state,
            mixing_axis: None,
        }
    }

    #[test]
    fn vacuum_ignores_the_neighbor() {
        let mut rng = StdRng::seed_from_u64(51);
        let state = random_state(&mut rng);
        let a = edge(random_state(&mut rng));
        let b = edge(random_state(&mut rng));
        for side in [Side::Left, Side::Right] {
            let r0 = residual(&Interface::Vacuum, side, &state, None, None).unwrap();
            let ra = residual(&Interface::Vacuum, side, &state, Some(&a), None).unwrap();
            let rb = residual(&Interface::Vacuum, side, &state, Some(&b), None).unwrap();
            assert_eq!(r0, ra);
            assert_eq!(ra, rb);
            assert_eq!(r0, (state.dg, state.dgt));
        }
    }

    #[test]
    fn missing_neighbor_falls_back_to_vacuum() {
        let mut rng = StdRng::seed_from_u64(52);
        let state = random_state(&mut rng);
        for interface in [
            Interface::Transparent,
            Interface::Tunneling { conductance: 0.3 },
            Interface::SpinActive(SpinActiveInterface::new(0.3, 0.2, 0.1, [0.0, 0.0, 1.0])),
        ] {
            let r = residual(&interface, Side::Right, &state, None, None).unwrap();
            assert_eq!(r, vacuum_residual(&state));
        }
    }

    #[test]
    fn transparent_is_continuity() {
        let mut rng = StdRng::seed_from_u64(53);
        let state = random_state(&mut rng);
        let (r, rt) = residual(&Interface::Transparent, Side::Left, &state, Some(&edge(state)), None).unwrap();
        assert_eq!(r, SpinMatrix::zeros());
        assert_eq!(rt, SpinMatrix::zeros());
    }

    #[test]
    fn tunneling_tends_to_continuity_for_large_conductance() {
        let mut rng = StdRng::seed_from_u64(54);
        let neighbor = Propagator::bcs(C64::new(0.5, 0.01), C64::new(1.0, 0.0));
        let n = neighbor.normalization().unwrap();
        let dg = random_matrix(&mut rng, 1.0);
        let mut previous = f64::INFINITY;
        for conductance in [1e2, 1e4, 1e6] {
            // root of r(g) = 0 at fixed dg by fixed-point iteration
            let mut g = neighbor.g;
            for _ in 0..50 {
                let a = (PAULI0 - g * neighbor.gt) * n;
                g = neighbor.g + a.inv().unwrap() * dg * (1.0 / conductance);
            }
            let state = Propagator::new(g, neighbor.gt, dg, SpinMatrix::zeros());
            let (r, _) = tunneling_residual(conductance, 1.0, &state, &neighbor).unwrap();
            assert!(r.norm_max() < 1e-8);
            let distance = (g - neighbor.g).norm_max();
            assert!(distance < 10.0 / conductance);
            assert!(distance < previous);
            previous = distance;
        }
    }

    #[test]
    fn tunneling_vanishes_between_identical_states() {
        let state = Propagator::bcs(C64::new(0.5, 0.01), C64::new(1.0, 0.0));
        for sign in [1.0, -1.0] {
            let (r, rt) = tunneling_residual(5.0, sign, &state, &state).unwrap();
            assert!(r.norm_max() < 1e-15 && rt.norm_max() < 1e-15);
        }
    }

    #[test]
    fn tunneling_sign_flips_between_sides() {
        let zero = SpinMatrix::zeros();
        let state = Propagator::new(zero, zero, zero, zero);
        let neighbor = Propagator::new(PAULI2 * 0.3, PAULI2 * (-0.3), zero, zero);
        let (left, _) = tunneling_residual(1.0, Side::Left.sign(), &state, &neighbor).unwrap();
        let (right, _) = tunneling_residual(1.0, Side::Right.sign(), &state, &neighbor).unwrap();
        assert!((left + right).norm_max() < 1e-15);
        assert!(left.norm_max() > 0.1);
    }

    #[test]
    fn spin_orbit_correction_applies_to_every_kind() {
        let mut rng = StdRng::seed_from_u64(55);
        let state = random_state(&mut rng);
        let neighbor = edge(random_state(&mut rng));
        let so = SpinOrbit::rashba_wire(0.5, 0.2);
        let (cr, crt) = so.interface_terms(&state.g, &state.gt);
        for interface in [
            Interface::Vacuum,
            Interface::Transparent,
            Interface::Tunneling { conductance: 0.3 },
        ] {
            let (r0, rt0) = residual(&interface, Side::Left, &state, Some(&neighbor), None).unwrap();
            let (r1, rt1) = residual(&interface, Side::Left, &state, Some(&neighbor), Some(&so)).unwrap();
            assert!((r1 - r0).approx_eq(&cr, 1e-14));
            assert!((rt1 - rt0).approx_eq(&crt, 1e-14));
        }
    }

    #[test]
    fn singular_neighbor_is_an_error() {
        let state = Propagator::normal();
        let bad = edge(Propagator::new(PAULI0, PAULI0, PAULI0, PAULI0));
        let result = residual(&Interface::Tunneling { conductance: 1.0 }, Side::Left, &state, Some(&bad), None);
        assert!(result.is_err());
    }
}
