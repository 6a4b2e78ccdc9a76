//! SU(2) spin-orbit field entering the Usadel equation as a gauge field.
//!
//! The field is given by three spin matrices `Ax, Ay, Az` (dimensionless,
//! already multiplied by the material length). Derivatives along the
//! transport direction z become covariant, `∂̃X = ∂X − i[Â, X]` with
//! `Â = diag(A, −A*)` in Nambu space, which produces:
//! - extra terms in the diffusion equation (`diffusion_terms`),
//! - a correction to every boundary residual (`interface_terms`),
//! - a gauge correction to the matrix current (`gauge_correction`).
use super::nambu::{self, NambuMatrix};
use super::spin_matrix::{C64, I, SpinMatrix};

#[derive(Debug, Clone, PartialEq)]
pub struct SpinOrbit {
    pub ax: SpinMatrix,
    pub ay: SpinMatrix,
    pub az: SpinMatrix,
    pub axt: SpinMatrix,
    pub ayt: SpinMatrix,
    pub azt: SpinMatrix,
    pub a2: SpinMatrix,
    pub a2t: SpinMatrix,
}

impl SpinOrbit {
    pub fn new(ax: SpinMatrix, ay: SpinMatrix, az: SpinMatrix) -> Self {
        let a2 = ax * ax + ay * ay + az * az;
        SpinOrbit {
            ax,
            ay,
            az,
            axt: ax.conj(),
            ayt: ay.conj(),
            azt: az.conj(),
            a2,
            a2t: a2.conj(),
        }
    }

    /// each component given by its Pauli-vector coefficients, A_k = v_k·σ
    pub fn from_vectors(x: [f64; 3], y: [f64; 3], z: [f64; 3]) -> Self {
        SpinOrbit::new(
            SpinMatrix::pauli_vector(x),
            SpinMatrix::pauli_vector(y),
            SpinMatrix::pauli_vector(z),
        )
    }

    /// Rashba-like field for a wire along z; only the z component survives,
    /// Az = α(cos θ σ₁ + sin θ σ₂) with θ the in-plane angle
    pub fn rashba_wire(alpha: f64, angle: f64) -> Self {
        let zero = SpinMatrix::zeros();
        SpinOrbit::new(
            zero,
            zero,
            SpinMatrix::pauli_vector([alpha * angle.cos(), alpha * angle.sin(), 0.0]),
        )
    }

    pub fn is_zero(&self) -> bool {
        self.ax.norm_max() == 0.0 && self.ay.norm_max() == 0.0 && self.az.norm_max() == 0.0
    }

    /// additive contributions to (d2g, d2gt); `n`, `nt` are the normalization matrices
    pub fn diffusion_terms(
        &self,
        g: &SpinMatrix,
        gt: &SpinMatrix,
        dg: &SpinMatrix,
        dgt: &SpinMatrix,
        n: &SpinMatrix,
        nt: &SpinMatrix,
    ) -> (SpinMatrix, SpinMatrix) {
        let (g, gt, dg, dgt, n, nt) = (*g, *gt, *dg, *dgt, *n, *nt);
        let two = C64::new(2.0, 0.0);
        let two_i = C64::new(0.0, 2.0);

        let mut d2g = self.a2 * g - g * self.a2t;
        let mut d2gt = self.a2t * gt - gt * self.a2;
        for (a, at) in [(self.ax, self.axt), (self.ay, self.ayt), (self.az, self.azt)] {
            d2g += two * (a * g + g * at) * nt * (at + gt * a * g);
            d2gt += two * (at * gt + gt * a) * n * (a + g * at * gt);
        }

        // first-derivative cross terms, only along the transport direction
        let (az, azt) = (self.az, self.azt);
        d2g += two_i * ((az + g * azt * gt) * n * dg + dg * nt * (azt + gt * az * g));
        d2gt -= two_i * ((azt + gt * az * g) * nt * dgt + dgt * n * (az + g * azt * gt));
        (d2g, d2gt)
    }

    /// covariant replacement of dg/dgt in boundary residuals
    pub fn interface_terms(&self, g: &SpinMatrix, gt: &SpinMatrix) -> (SpinMatrix, SpinMatrix) {
        let r = -(I * (self.az * *g + *g * self.azt));
        let rt = I * (self.azt * *gt + *gt * self.az);
        (r, rt)
    }

    /// Âz = diag(Az, −Az*)
    pub fn nambu_az(&self) -> NambuMatrix {
        nambu::diagonal(&self.az, &(-self.azt))
    }

    /// −i G[Âz, G] = −i(G Âz G − Âz), to be added to G·∂G
    pub fn gauge_correction(&self, g_matrix: &NambuMatrix) -> NambuMatrix {
        let az = self.nambu_az();
        (g_matrix * az * g_matrix - az) * C64::new(0.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quasiclassics::spin_matrix::{PAULI1, PAULI2, PAULI3};

    #[test]
    fn tilde_fields_are_conjugates() {
        let so = SpinOrbit::from_vectors([0.1, 0.2, 0.0], [0.0, 0.3, 0.0], [0.4, 0.0, 0.5]);
        assert!(so.axt.approx_eq(&so.ax.conj(), 0.0));
        let a2 = so.ax * so.ax + so.ay * so.ay + so.az * so.az;
        assert!(so.a2.approx_eq(&a2, 1e-15));
        assert!(so.a2t.approx_eq(&a2.conj(), 1e-15));
    }

    #[test]
    fn normal_state_is_untouched() {
        let so = SpinOrbit::new(PAULI1 * 0.3, PAULI2 * 0.2, PAULI3 * 0.7);
        let zero = SpinMatrix::zeros();
        let one = SpinMatrix::identity();
        let (d2g, d2gt) = so.diffusion_terms(&zero, &zero, &zero, &zero, &one, &one);
        assert!(d2g.approx_eq(&zero, 0.0));
        assert!(d2gt.approx_eq(&zero, 0.0));
        let (r, rt) = so.interface_terms(&zero, &zero);
        assert!(r.approx_eq(&zero, 0.0) && rt.approx_eq(&zero, 0.0));
    }

    #[test]
    fn gauge_correction_vanishes_in_normal_state() {
        let so = SpinOrbit::rashba_wire(0.8, 0.3);
        let tau3 = nambu::tau3();
        // G = τ₃ commutes with the block-diagonal Âz
        assert!(so.gauge_correction(&tau3).norm() < 1e-14);
    }
}
