//! 2×2 complex matrices in spin space.
//!
//! `SpinMatrix` is a small `Copy` value type used for every piece of Riccati
//! algebra. Entries are stored row-major, so `m.0 = [a11, a12, a21, a22]`.
//! The Pauli basis is available as compile-time constants.
use super::errors::{QResult, QuasiclassicsError};
use nalgebra::Matrix2;
use num_complex::Complex64;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

pub type C64 = Complex64;

/// imaginary unit
pub const I: C64 = C64::new(0.0, 1.0);
const ZERO: C64 = C64::new(0.0, 0.0);
const ONE: C64 = C64::new(1.0, 0.0);

/// determinants below this magnitude are treated as singular by `inv`
pub const DET_FLOOR: f64 = 1e-14;

#[derive(Clone, Copy, PartialEq)]
pub struct SpinMatrix(pub [C64; 4]);

/// σ₀
pub const PAULI0: SpinMatrix = SpinMatrix([ONE, ZERO, ZERO, ONE]);
/// σ₁
pub const PAULI1: SpinMatrix = SpinMatrix([ZERO, ONE, ONE, ZERO]);
/// σ₂
pub const PAULI2: SpinMatrix = SpinMatrix([ZERO, C64::new(0.0, -1.0), I, ZERO]);
/// σ₃
pub const PAULI3: SpinMatrix = SpinMatrix([ONE, ZERO, ZERO, C64::new(-1.0, 0.0)]);

pub const PAULI: [SpinMatrix; 4] = [PAULI0, PAULI1, PAULI2, PAULI3];

impl SpinMatrix {
    pub const fn new(a11: C64, a12: C64, a21: C64, a22: C64) -> Self {
        SpinMatrix([a11, a12, a21, a22])
    }

    pub const fn zeros() -> Self {
        SpinMatrix([ZERO; 4])
    }

    pub fn identity() -> Self {
        PAULI0
    }

    /// `v₁σ₁ + v₂σ₂ + v₃σ₃` for a real vector
    pub fn pauli_vector(v: [f64; 3]) -> Self {
        PAULI1 * v[0] + PAULI2 * v[1] + PAULI3 * v[2]
    }

    /// same as `pauli_vector` with complex coefficients
    pub fn pauli_vector_complex(v: [C64; 3]) -> Self {
        PAULI1 * v[0] + PAULI2 * v[1] + PAULI3 * v[2]
    }

    pub fn get(&self, row: usize, col: usize) -> C64 {
        self.0[2 * row + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: C64) {
        self.0[2 * row + col] = value;
    }

    pub fn trace(&self) -> C64 {
        self.0[0] + self.0[3]
    }

    pub fn det(&self) -> C64 {
        self.0[0] * self.0[3] - self.0[1] * self.0[2]
    }

    /// matrix inverse; fails when |det| < DET_FLOOR
    pub fn inv(&self) -> QResult<SpinMatrix> {
        let det = self.det();
        if !(det.norm() >= DET_FLOOR) {
            return Err(QuasiclassicsError::singular(&format!(
                "2x2 inverse with |det| = {:.3e}",
                det.norm()
            )));
        }
        let [a, b, c, d] = self.0;
        Ok(SpinMatrix([d / det, -b / det, -c / det, a / det]))
    }

    /// elementwise complex conjugate (the "tilde" conjugation of Nambu space)
    pub fn conj(&self) -> SpinMatrix {
        SpinMatrix(self.0.map(|z| z.conj()))
    }

    pub fn transpose(&self) -> SpinMatrix {
        let [a, b, c, d] = self.0;
        SpinMatrix([a, c, b, d])
    }

    /// conjugate transpose
    pub fn adjoint(&self) -> SpinMatrix {
        self.transpose().conj()
    }

    pub fn commutator(a: &SpinMatrix, b: &SpinMatrix) -> SpinMatrix {
        *a * *b - *b * *a
    }

    pub fn anticommutator(a: &SpinMatrix, b: &SpinMatrix) -> SpinMatrix {
        *a * *b + *b * *a
    }

    /// largest entry modulus
    pub fn norm_max(&self) -> f64 {
        self.0.iter().map(|z| z.norm()).fold(0.0, f64::max)
    }

    pub fn approx_eq(&self, other: &SpinMatrix, tol: f64) -> bool {
        (*self - *other).norm_max() <= tol
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|z| z.re.is_finite() && z.im.is_finite())
    }

    /// decompose into Pauli coefficients: self = Σ c_k σ_k
    pub fn pauli_components(&self) -> [C64; 4] {
        let mut out = [ZERO; 4];
        for (k, sigma) in PAULI.iter().enumerate() {
            out[k] = (*sigma * *self).trace() * 0.5;
        }
        out
    }

    pub fn to_matrix2(&self) -> Matrix2<C64> {
        Matrix2::new(self.0[0], self.0[1], self.0[2], self.0[3])
    }

    pub fn from_matrix2(m: &Matrix2<C64>) -> Self {
        SpinMatrix([m[(0, 0)], m[(0, 1)], m[(1, 0)], m[(1, 1)]])
    }

    /// 8 reals: entries row-major, each as (re, im)
    pub fn write_reals(&self, out: &mut [f64]) {
        for (k, z) in self.0.iter().enumerate() {
            out[2 * k] = z.re;
            out[2 * k + 1] = z.im;
        }
    }

    pub fn read_reals(data: &[f64]) -> Self {
        SpinMatrix(std::array::from_fn(|k| C64::new(data[2 * k], data[2 * k + 1])))
    }
}

impl Default for SpinMatrix {
    fn default() -> Self {
        SpinMatrix::zeros()
    }
}

impl fmt::Debug for SpinMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[[{:.6}, {:.6}], [{:.6}, {:.6}]]",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl Add for SpinMatrix {
    type Output = SpinMatrix;
    fn add(self, rhs: SpinMatrix) -> SpinMatrix {
        SpinMatrix(std::array::from_fn(|k| self.0[k] + rhs.0[k]))
    }
}

impl Sub for SpinMatrix {
    type Output = SpinMatrix;
    fn sub(self, rhs: SpinMatrix) -> SpinMatrix {
        SpinMatrix(std::array::from_fn(|k| self.0[k] - rhs.0[k]))
    }
}

impl Neg for SpinMatrix {
    type Output = SpinMatrix;
    fn neg(self) -> SpinMatrix {
        SpinMatrix(self.0.map(|z| -z))
    }
}

impl AddAssign for SpinMatrix {
    fn add_assign(&mut self, rhs: SpinMatrix) {
        *self = *self + rhs;
    }
}

impl SubAssign for SpinMatrix {
    fn sub_assign(&mut self, rhs: SpinMatrix) {
        *self = *self - rhs;
    }
}

impl Mul for SpinMatrix {
    type Output = SpinMatrix;
    fn mul(self, rhs: SpinMatrix) -> SpinMatrix {
        let [a, b, c, d] = self.0;
        let [e, f, g, h] = rhs.0;
        SpinMatrix([a * e + b * g, a * f + b * h, c * e + d * g, c * f + d * h])
    }
}

impl Mul<C64> for SpinMatrix {
    type Output = SpinMatrix;
    fn mul(self, rhs: C64) -> SpinMatrix {
        SpinMatrix(self.0.map(|z| z * rhs))
    }
}

impl Mul<f64> for SpinMatrix {
    type Output = SpinMatrix;
    fn mul(self, rhs: f64) -> SpinMatrix {
        SpinMatrix(self.0.map(|z| z * rhs))
    }
}

impl Mul<SpinMatrix> for C64 {
    type Output = SpinMatrix;
    fn mul(self, rhs: SpinMatrix) -> SpinMatrix {
        rhs * self
    }
}

impl Mul<SpinMatrix> for f64 {
    type Output = SpinMatrix;
    fn mul(self, rhs: SpinMatrix) -> SpinMatrix {
        rhs * self
    }
}
