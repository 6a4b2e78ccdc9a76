//! Mono-implicit Runge-Kutta tableaus.
//!
//! On an interval [x_i, x_i + h] the stages are
//! ```text
//! Y_r = (1 − v_r)·y_i + v_r·y_{i+1} + h·Σ_{j<r} X_rj·K_j
//! K_r = f(x_i + c_r·h, Y_r)
//! ```
//! and the collocation residual is `Φ_i = y_{i+1} − y_i − h·Σ_r b_r·K_r`.
//! The stage abscissae `c` are distinct and `b` are the integrals of the
//! Lagrange basis on `c`, so the derivative interpolant of the stages
//! integrates to the continuous extension of the discrete solution.
use super::BVP_mirk_api::CollocationOrder;

#[derive(Debug, Clone, PartialEq)]
pub struct Tableau {
    pub order: CollocationOrder,
    pub c: Vec<f64>,
    pub v: Vec<f64>,
    pub b: Vec<f64>,
    /// strictly lower triangular coupling, x[r] has r entries
    pub x: Vec<Vec<f64>>,
    /// monomial coefficients of the Lagrange basis polynomial on `c`, lowest degree first
    lagrange: Vec<Vec<f64>>,
}

impl Tableau {
    pub fn new(order: CollocationOrder) -> Tableau {
        let (c, v, b, x): (Vec<f64>, Vec<f64>, Vec<f64>, Vec<Vec<f64>>) = match order {
            CollocationOrder::Second => (vec![0.0, 1.0], vec![0.0, 1.0], vec![0.5, 0.5], vec![vec![], vec![]]),
            CollocationOrder::Fourth => (
                vec![0.0, 1.0, 0.5],
                vec![0.0, 1.0, 0.5],
                vec![1.0 / 6.0, 1.0 / 6.0, 2.0 / 3.0],
                vec![vec![], vec![], vec![1.0 / 8.0, -1.0 / 8.0]],
            ),
            CollocationOrder::Sixth => (
                vec![0.0, 1.0, 0.25, 0.75, 0.5],
                vec![0.0, 1.0, 5.0 / 32.0, 27.0 / 32.0, 0.5],
                vec![7.0 / 90.0, 7.0 / 90.0, 16.0 / 45.0, 16.0 / 45.0, 2.0 / 15.0],
                vec![
                    vec![],
                    vec![],
                    vec![9.0 / 64.0, -3.0 / 64.0],
                    vec![3.0 / 64.0, -9.0 / 64.0],
                    vec![-5.0 / 24.0, 5.0 / 24.0, 2.0 / 3.0, -2.0 / 3.0],
                ],
            ),
        };
        let lagrange = lagrange_basis(&c);
        Tableau {
            order,
            c,
            v,
            b,
            x,
            lagrange,
        }
    }

    pub fn stages(&self) -> usize {
        self.c.len()
    }

    /// ∫₀ˢ L_r(τ) dτ for every stage r, s ∈ [0, 1]
    pub fn integrated_weights(&self, s: f64) -> Vec<f64> {
        self.lagrange
            .iter()
            .map(|coeffs| {
                let mut power = s;
                let mut acc = 0.0;
                for (k, a) in coeffs.iter().enumerate() {
                    acc += a * power / (k as f64 + 1.0);
                    power *= s;
                }
                acc
            })
            .collect()
    }

    /// L_r(s) for every stage r
    pub fn basis_values(&self, s: f64) -> Vec<f64> {
        self.lagrange
            .iter()
            .map(|coeffs| coeffs.iter().rev().fold(0.0_f64, |acc, a| acc * s + a))
            .collect()
    }
}

/// monomial coefficients of the Lagrange basis polynomials on `nodes`
fn lagrange_basis(nodes: &[f64]) -> Vec<Vec<f64>> {
    let s = nodes.len();
    (0..s)
        .map(|r| {
            let mut poly = vec![1.0];
            let mut denom = 1.0;
            for (j, &cj) in nodes.iter().enumerate() {
                if j == r {
                    continue;
                }
                // poly *= (t − cj)
                let mut next = vec![0.0; poly.len() + 1];
                for (k, a) in poly.iter().enumerate() {
                    next[k + 1] += a;
                    next[k] -= a * cj;
                }
                poly = next;
                denom *= nodes[r] - cj;
            }
            poly.iter().map(|a| a / denom).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn weights_integrate_to_b() {
        for order in CollocationOrder::iter() {
            let t = Tableau::new(order);
            let w = t.integrated_weights(1.0);
            for (wr, br) in w.iter().zip(t.b.iter()) {
                assert_relative_eq!(*wr, *br, epsilon = 1e-14);
            }
            assert_relative_eq!(t.b.iter().sum::<f64>(), 1.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn basis_is_cardinal() {
        for order in CollocationOrder::iter() {
            let t = Tableau::new(order);
            for (r, &cr) in t.c.iter().enumerate() {
                let values = t.basis_values(cr);
                for (j, value) in values.iter().enumerate() {
                    let expected = if j == r { 1.0 } else { 0.0 };
                    assert_relative_eq!(*value, expected, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn stage_rows_are_consistent() {
        // Y_r must be exact for y = x: (1 − v_r)·0 + v_r·1 + Σ X_rj = c_r with K = 1, h = 1
        for order in CollocationOrder::iter() {
            let t = Tableau::new(order);
            for r in 0..t.stages() {
                let row_sum: f64 = t.x[r].iter().sum();
                assert_relative_eq!(t.v[r] + row_sum, t.c[r], epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn zero_weights_at_left_end() {
        let t = Tableau::new(CollocationOrder::Sixth);
        assert!(t.integrated_weights(0.0).iter().all(|w| *w == 0.0));
    }
}
