use super::*;
use crate::quasiclassics::errors::QuasiclassicsError;
use crate::quasiclassics::spin_matrix::{PAULI1, PAULI3};
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

fn uniform_gap(value: C64) -> GapProfile {
    GapProfile::new(vec![0.0, 1.0], vec![value, value])
}

#[test]
fn normal_metal_is_a_fixed_point() {
    let zero = SpinMatrix::zeros();
    let plain = DiffusionTerms::default();
    let all = DiffusionTerms {
        gap: None,
        spin_orbit: Some(SpinOrbit::from_vectors([0.2, 0.0, 0.1], [0.0, 0.3, 0.0], [0.5, 0.1, 0.0])),
        exchange: Some(SpinMatrix::pauli_vector([0.0, 0.0, 3.0])),
        spinflip: 0.4,
        spinorbit_scattering: 0.2,
        depairing: 0.1,
    };
    for terms in [plain, all] {
        for e in [C64::new(1e-6, 0.01), C64::new(2.5, 0.01)] {
            let (d2g, d2gt) = terms.evaluate(e, 0.3, &Propagator::normal()).unwrap();
            assert!(d2g.approx_eq(&zero, 1e-15));
            assert!(d2gt.approx_eq(&zero, 1e-15));
        }
    }
}

#[test]
fn bulk_bcs_state_solves_the_equation() {
    let gap = C64::from_polar(1.0, 0.4);
    let terms = DiffusionTerms {
        gap: Some(uniform_gap(gap)),
        ..Default::default()
    };
    for e in [C64::new(0.2, 0.01), C64::new(0.99, 0.01), C64::new(2.0, 0.01)] {
        let state = Propagator::bcs(e, gap);
        let (d2g, d2gt) = terms.evaluate(e, 0.5, &state).unwrap();
        assert!(d2g.norm_max() < 1e-12, "{:?}", d2g);
        assert!(d2gt.norm_max() < 1e-12, "{:?}", d2gt);
    }
}

#[test]
fn spin_orbit_scattering_preserves_singlets() {
    let gap = C64::new(1.0, 0.0);
    let e = C64::new(0.5, 0.01);
    let state = Propagator::bcs(e, gap);
    let base = DiffusionTerms {
        gap: Some(uniform_gap(gap)),
        ..Default::default()
    };
    let with_so = DiffusionTerms {
        spinorbit_scattering: 0.7,
        ..base.clone()
    };
    let with_sf = DiffusionTerms {
        spinflip: 0.7,
        ..base.clone()
    };
    let (g0, _) = base.evaluate(e, 0.5, &state).unwrap();
    let (g_so, gt_so) = with_so.evaluate(e, 0.5, &state).unwrap();
    let (g_sf, _) = with_sf.evaluate(e, 0.5, &state).unwrap();
    assert!((g_so - g0).norm_max() < 1e-12);
    assert!(gt_so.norm_max() < 1e-12);
    assert!((g_sf - g0).norm_max() > 1e-3);
}

#[test]
fn exchange_term_matches_generic_projection() {
    let mut rng = StdRng::seed_from_u64(31);
    let h = SpinMatrix::pauli_vector([0.3, -0.7, 1.1]);
    let exchange = DiffusionTerms {
        exchange: Some(h),
        ..Default::default()
    };
    let plain = DiffusionTerms::default();
    let e = C64::new(0.8, 0.02);
    for _ in 0..10 {
        let state = random_state(&mut rng);
        let (a, at) = exchange.evaluate(e, 0.1, &state).unwrap();
        let (b, bt) = plain.evaluate(e, 0.1, &state).unwrap();
        let hm = nambu::diagonal(&h, &h.conj());
        let (p, pt) = project_commutator(&hm, &state.g, &state.gt);
        assert!((a - b).approx_eq(&p, 1e-12));
        assert!((at - bt).approx_eq(&pt, 1e-12));
    }
}

#[test]
fn exchange_field_turns_singlets_into_triplets() {
    let e = C64::new(0.5, 0.01);
    let state = Propagator::bcs(e, C64::new(1.0, 0.0));
    let hz = 0.7;
    let with_h = DiffusionTerms {
        exchange: Some(SpinMatrix::pauli_vector([0.0, 0.0, hz])),
        ..Default::default()
    };
    let (a, at) = with_h.evaluate(e, 0.5, &state).unwrap();
    let (b, bt) = DiffusionTerms::default().evaluate(e, 0.5, &state).unwrap();
    // g = aσ₂ and [σ₃, σ₂] = −2iσ₁
    let amplitude = state.g.get(0, 1) * I;
    let expected = PAULI1 * (amplitude * (-2.0 * hz));
    assert!((a - b).approx_eq(&expected, 1e-12));
    assert!((a - b).norm_max() > 0.1);
    let amplitude_t = state.gt.get(0, 1) * I;
    // tilde side: i h b [σ₃, σ₂] = 2 h b σ₁
    assert!((at - bt).approx_eq(&(PAULI1 * (amplitude_t * (2.0 * hz))), 1e-12));
}

#[test]
fn all_terms_respect_tilde_conjugation() {
    let mut rng = StdRng::seed_from_u64(34);
    let terms = DiffusionTerms {
        gap: Some(uniform_gap(C64::from_polar(0.8, 0.3))),
        spin_orbit: Some(SpinOrbit::from_vectors([0.2, 0.1, 0.0], [0.0, 0.3, 0.1], [0.5, -0.2, 0.4])),
        exchange: Some(SpinMatrix::pauli_vector([0.3, -0.2, 0.6])),
        spinflip: 0.3,
        spinorbit_scattering: 0.2,
        depairing: 0.1,
    };
    let e = C64::new(0.7, 0.03);
    for _ in 0..10 {
        let state = random_state(&mut rng);
        let tilde = Propagator::new(state.gt.conj(), state.g.conj(), state.dgt.conj(), state.dg.conj());
        let (_, d2gt) = terms.evaluate(e, 0.4, &state).unwrap();
        let (d2g_of_tilde, _) = terms.evaluate(-e.conj(), 0.4, &tilde).unwrap();
        assert!(d2gt.approx_eq(&d2g_of_tilde.conj(), 1e-12), "{:?} vs {:?}", d2gt, d2g_of_tilde.conj());
    }
}

#[test]
fn only_az_couples_to_the_gradient() {
    let mut rng = StdRng::seed_from_u64(35);
    let state = random_state(&mut rng);
    let flipped = Propagator::new(state.g, state.gt, -state.dg, -state.dgt);
    let e = C64::new(0.4, 0.02);
    let odd_part = |so: SpinOrbit| {
        let terms = DiffusionTerms {
            spin_orbit: Some(so),
            ..Default::default()
        };
        let (a, at) = terms.evaluate(e, 0.5, &state).unwrap();
        let (b, bt) = terms.evaluate(e, 0.5, &flipped).unwrap();
        ((a - b) * 0.5, (at - bt) * 0.5)
    };

    let (in_plane, in_plane_t) = odd_part(SpinOrbit::from_vectors([0.4, 0.1, 0.0], [0.0, 0.5, 0.2], [0.0; 3]));
    assert!(in_plane.norm_max() < 1e-12);
    assert!(in_plane_t.norm_max() < 1e-12);

    let az = SpinMatrix::pauli_vector([0.3, 0.0, 0.6]);
    let (odd, odd_t) = odd_part(SpinOrbit::new(SpinMatrix::zeros(), SpinMatrix::zeros(), az));
    let azt = az.conj();
    let (g, gt, dg, dgt) = (state.g, state.gt, state.dg, state.dgt);
    let n = state.normalization().unwrap();
    let nt = state.normalization_tilde().unwrap();
    let two_i = C64::new(0.0, 2.0);
    let expected = ((az + g * azt * gt) * n * dg + dg * nt * (azt + gt * az * g)) * two_i;
    let expected_t = ((azt + gt * az * g) * nt * dgt + dgt * n * (az + g * azt * gt)) * (-two_i);
    assert!(odd.approx_eq(&expected, 1e-12));
    assert!(odd_t.approx_eq(&expected_t, 1e-12));
    assert!(odd.norm_max() > 1e-3);
}

#[test]
fn energy_term_matches_generic_projection() {
    let mut rng = StdRng::seed_from_u64(32);
    let state = random_state(&mut rng);
    let e = C64::new(1.3, 0.05);
    let h = nambu::tau3() * e;
    let (p, pt) = project_commutator(&h, &state.g, &state.gt);
    assert!(p.approx_eq(&(state.g * (-2.0 * I * e)), 1e-12));
    assert!(pt.approx_eq(&(state.gt * (-2.0 * I * e)), 1e-12));
}

#[test]
fn depairing_vanishes_when_disabled() {
    let mut rng = StdRng::seed_from_u64(33);
    let state = random_state(&mut rng);
    let e = C64::new(0.4, 0.01);
    let off = DiffusionTerms::default();
    let on = DiffusionTerms {
        depairing: 0.25,
        ..Default::default()
    };
    let (a, _) = off.evaluate(e, 0.0, &state).unwrap();
    let (b, _) = on.evaluate(e, 0.0, &state).unwrap();
    let n = state.normalization().unwrap();
    let expected = (n * 2.0 - PAULI0) * state.g * 0.25;
    assert!((b - a).approx_eq(&expected, 1e-12));
}

#[test]
fn pairing_term_reads_interpolated_gap() {
    let profile = GapProfile::new(vec![0.0, 1.0], vec![C64::new(0.0, 0.0), C64::new(2.0, 0.0)]);
    let terms = DiffusionTerms {
        gap: Some(profile),
        ..Default::default()
    };
    let (d2g, d2gt) = terms
        .evaluate(C64::new(0.5, 0.0), 0.25, &Propagator::normal())
        .unwrap();
    // normal state: d2g = −Δσ₂, d2gt = Δ*σ₂ with Δ(0.25) = 0.5
    assert!(d2g.approx_eq(&(PAULI2 * (-0.5)), 1e-15));
    assert!(d2gt.approx_eq(&(PAULI2 * 0.5), 1e-15));
}

#[test]
fn singular_state_is_an_error() {
    let state = Propagator::new(PAULI1, PAULI1, PAULI3, PAULI3);
    let result = DiffusionTerms::default().evaluate(C64::new(0.1, 0.0), 0.5, &state);
    assert!(matches!(result, Err(QuasiclassicsError::SingularMatrix { .. })));
}
