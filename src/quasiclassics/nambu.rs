//! 4×4 Nambu⊗spin matrices built from and projected onto 2×2 spin blocks.
use super::spin_matrix::{C64, PAULI, PAULI0, SpinMatrix};
use nalgebra::Matrix4;

pub type NambuMatrix = Matrix4<C64>;

/// assemble `[[a, b], [c, d]]` from spin blocks
pub fn from_blocks(a: &SpinMatrix, b: &SpinMatrix, c: &SpinMatrix, d: &SpinMatrix) -> NambuMatrix {
    let mut m = NambuMatrix::zeros();
    for i in 0..2 {
        for j in 0..2 {
            m[(i, j)] = a.get(i, j);
            m[(i, j + 2)] = b.get(i, j);
            m[(i + 2, j)] = c.get(i, j);
            m[(i + 2, j + 2)] = d.get(i, j);
        }
    }
    m
}

/// 2×2 block starting at (row, col), with row/col in {0, 2}
pub fn block(m: &NambuMatrix, row: usize, col: usize) -> SpinMatrix {
    SpinMatrix::new(
        m[(row, col)],
        m[(row, col + 1)],
        m[(row + 1, col)],
        m[(row + 1, col + 1)],
    )
}

pub fn diagonal(a: &SpinMatrix, d: &SpinMatrix) -> NambuMatrix {
    let zero = SpinMatrix::zeros();
    from_blocks(a, &zero, &zero, d)
}

/// τ₃ = diag(σ₀, −σ₀)
pub fn tau3() -> NambuMatrix {
    diagonal(&PAULI0, &(-PAULI0))
}

/// diag(σ_j, σ_j*), j = 1..3, the spin vertex entering the scattering self-energies
pub fn spin_vertex(j: usize) -> NambuMatrix {
    diagonal(&PAULI[j], &PAULI[j].conj())
}

/// diag(S, s·S*); `s = +1` for heat-like, `−1` for charge-like vertices
pub fn conjugate_pair(s: &SpinMatrix, sign: f64) -> NambuMatrix {
    diagonal(s, &(s.conj() * sign))
}

pub fn commutator(a: &NambuMatrix, b: &NambuMatrix) -> NambuMatrix {
    a * b - b * a
}

pub fn anticommutator(a: &NambuMatrix, b: &NambuMatrix) -> NambuMatrix {
    a * b + b * a
}

/// advanced counterpart −τ₃ X† τ₃ of a retarded Nambu matrix
pub fn advanced(m: &NambuMatrix) -> NambuMatrix {
    let t3 = tau3();
    -(t3 * m.adjoint() * t3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quasiclassics::spin_matrix::{I, PAULI1, PAULI2, PAULI3};

    #[test]
    fn blocks_roundtrip() {
        let a = PAULI1 * 2.0;
        let b = PAULI2 * I;
        let c = PAULI3;
        let d = PAULI0 * 0.5;
        let m = from_blocks(&a, &b, &c, &d);
        assert!(block(&m, 0, 0).approx_eq(&a, 0.0));
        assert!(block(&m, 0, 2).approx_eq(&b, 0.0));
        assert!(block(&m, 2, 0).approx_eq(&c, 0.0));
        assert!(block(&m, 2, 2).approx_eq(&d, 0.0));
    }

    #[test]
    fn tau3_squares_to_identity() {
        let t3 = tau3();
        assert!((t3 * t3 - NambuMatrix::identity()).norm() < 1e-15);
        assert!(commutator(&t3, &t3).norm() < 1e-15);
        assert!((anticommutator(&t3, &t3) - NambuMatrix::identity() * C64::new(2.0, 0.0)).norm() < 1e-15);
    }
}
