//! Per-energy boundary value problem for one material.
//!
//! The Riccati state of every position is packed into 32 reals, the
//! diffusion equation becomes the first-order system
//! `y' = (dg, dgt, d2g, d2gt)` and the interface residuals form the 32
//! boundary conditions (16 at z = 0, then 16 at z = 1). Energies are
//! independent, so a material is solved as a rayon parallel sweep over an
//! immutable snapshot of its parameters and its neighbors' edge states.
use super::boundary::{self, Interface, NeighborEdge, Side};
use super::diffusion::DiffusionTerms;
use super::errors::{QResult, QuasiclassicsError};
use super::material::Material;
use super::propagator::{PACKED_LEN, Propagator};
use super::spin_matrix::C64;
use super::spin_orbit::SpinOrbit;
use crate::numerical::BVP_collocation::BVP_mirk_api::{BvpFailure, BvpProblem, BvpSolver, SolverSettings};
use log::{debug, info, warn};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::cell::RefCell;

/// Edge states of the neighbors, one entry per energy, captured before a sweep.
#[derive(Debug, Clone, Default)]
pub struct NeighborSnapshot {
    pub left: Option<Vec<NeighborEdge>>,
    pub right: Option<Vec<NeighborEdge>>,
}

impl NeighborSnapshot {
    pub fn vacuum() -> Self {
        NeighborSnapshot::default()
    }

    /// right edge of `left_neighbor` and left edge of `right_neighbor`
    pub fn from_neighbors(left_neighbor: Option<&Material>, right_neighbor: Option<&Material>) -> Self {
        let left = left_neighbor.map(|m| {
            (0..m.energies.len())
                .map(|i| NeighborEdge {
                    state: m.right_edge(i),
                    mixing_axis: m.interface_right.mixing_axis(),
                })
                .collect()
        });
        let right = right_neighbor.map(|m| {
            (0..m.energies.len())
                .map(|i| NeighborEdge {
                    state: m.left_edge(i),
                    mixing_axis: m.interface_left.mixing_axis(),
                })
                .collect()
        });
        NeighborSnapshot { left, right }
    }
}

/// Everything the ODE and BC callbacks read for one energy.
#[derive(Debug, Clone)]
pub struct SolveContext<'a> {
    /// energy as given on the material mesh, used in error reports
    pub energy: f64,
    /// (ε + i·scattering) / thouless
    pub normalized_energy: C64,
    pub terms: &'a DiffusionTerms,
    pub spin_orbit: Option<&'a SpinOrbit>,
    pub interface_left: &'a Interface,
    pub interface_right: &'a Interface,
    pub left: Option<NeighborEdge>,
    pub right: Option<NeighborEdge>,
}

impl SolveContext<'_> {
    /// y' for the packed state `y` at position `z`
    pub fn derivative(&self, z: f64, y: &[f64], out: &mut [f64]) -> QResult<()> {
        let state = Propagator::unpack(y);
        let (d2g, d2gt) = self.terms.evaluate(self.normalized_energy, z, &state)?;
        state.dg.write_reals(&mut out[0..8]);
        state.dgt.write_reals(&mut out[8..16]);
        d2g.write_reals(&mut out[16..24]);
        d2gt.write_reals(&mut out[24..32]);
        Ok(())
    }

    /// 32 boundary residuals: left edge first, then right edge
    pub fn boundary_residuals(&self, ya: &[f64], yb: &[f64], out: &mut [f64]) -> QResult<()> {
        let edges = [
            (Side::Left, self.interface_left, self.left.as_ref(), ya),
            (Side::Right, self.interface_right, self.right.as_ref(), yb),
        ];
        for (k, (side, interface, neighbor, y)) in edges.into_iter().enumerate() {
            let state = Propagator::unpack(y);
            let (r, rt) = boundary::residual(interface, side, &state, neighbor, self.spin_orbit)?;
            r.write_reals(&mut out[16 * k..16 * k + 8]);
            rt.write_reals(&mut out[16 * k + 8..16 * k + 16]);
        }
        Ok(())
    }
}

/// n × m matrix of packed states, one column per position
pub fn pack_row(row: &[Propagator]) -> DMatrix<f64> {
    let mut y = DMatrix::zeros(PACKED_LEN, row.len());
    for (j, state) in row.iter().enumerate() {
        state.pack(y.column_mut(j).as_mut_slice());
    }
    y
}

pub fn unpack_row(y: &DMatrix<f64>) -> Vec<Propagator> {
    (0..y.ncols()).map(|j| Propagator::unpack(y.column(j).as_slice())).collect()
}

/// Solve one energy starting from `initial`; returns the states at `positions`.
pub fn solve_energy<S: BvpSolver + ?Sized>(
    solver: &S,
    ctx: &SolveContext,
    positions: &[f64],
    initial: &[Propagator],
    settings: &SolverSettings,
) -> QResult<Vec<Propagator>> {
    // first algebraic failure inside a callback; the solver only sees NaN
    let failure: RefCell<Option<QuasiclassicsError>> = RefCell::new(None);
    let record = |e: QuasiclassicsError, out: &mut [f64]| {
        out.fill(f64::NAN);
        failure.borrow_mut().get_or_insert(e);
    };
    let ode = |z: f64, y: &[f64], out: &mut [f64]| {
        if let Err(e) = ctx.derivative(z, y, out) {
            record(e, out);
        }
    };
    let bc = |ya: &[f64], yb: &[f64], out: &mut [f64]| {
        if let Err(e) = ctx.boundary_residuals(ya, yb, out) {
            record(e, out);
        }
    };
    let problem = BvpProblem {
        mesh: positions.to_vec(),
        initial: pack_row(initial),
        ode: &ode,
        bc: &bc,
    };

    match solver.solve(&problem, settings) {
        Ok(solution) => {
            let row = unpack_row(&solution.evaluate_many(positions));
            if row.iter().all(|p| p.is_finite()) {
                debug!(
                    "energy {:.6e}: converged with {} nodes in {} iterations",
                    ctx.energy,
                    solution.x.len(),
                    solution.niter
                );
                Ok(row)
            } else {
                Err(QuasiclassicsError::BvpNonConvergence {
                    energy: ctx.energy,
                    reason: "solution contains non-finite values".to_string(),
                })
            }
        }
        Err(reason) => {
            // a recorded error may stem from a rejected trial point; it only
            // explains the failure when Newton itself broke down
            let recorded = failure.borrow_mut().take();
            match (recorded, &reason) {
                (Some(QuasiclassicsError::SingularMatrix { context }), BvpFailure::SingularJacobian { .. }) => {
                    Err(QuasiclassicsError::SingularMatrix {
                        context: format!("{}; {}", context, reason),
                    }
                    .at_energy(ctx.energy))
                }
                (Some(e), _) => Err(QuasiclassicsError::BvpNonConvergence {
                    energy: ctx.energy,
                    reason: format!("{} (a trial evaluation failed: {})", reason, e),
                }),
                (None, _) => Err(QuasiclassicsError::BvpNonConvergence {
                    energy: ctx.energy,
                    reason: reason.to_string(),
                }),
            }
        }
    }
}

/// Solve every energy of `material` against `snapshot` and store the rows.
/// Nothing is written when any energy fails.
pub fn solve_material<S: BvpSolver + Sync + ?Sized>(
    solver: &S,
    material: &mut Material,
    snapshot: &NeighborSnapshot,
    settings: &SolverSettings,
) -> QResult<()> {
    let ne = material.energies.len();
    for (label, edges) in [("left", &snapshot.left), ("right", &snapshot.right)] {
        if let Some(edges) = edges {
            if edges.len() != ne {
                return Err(QuasiclassicsError::config(format!(
                    "{} neighbor of '{}' has {} energies, expected {}",
                    label,
                    material.name,
                    edges.len(),
                    ne
                )));
            }
        }
    }
    info!(
        "solving '{}' ({}) over {} energies, {} positions",
        material.name,
        material.kind,
        ne,
        material.positions.len()
    );

    let terms = material.diffusion_terms();
    let shared: &Material = material;
    let rows = (0..ne)
        .into_par_iter()
        .map(|i| {
            let ctx = SolveContext {
                energy: shared.energies[i],
                normalized_energy: shared.complex_energy(i),
                terms: &terms,
                spin_orbit: shared.spin_orbit.as_ref(),
                interface_left: &shared.interface_left,
                interface_right: &shared.interface_right,
                left: snapshot.left.as_ref().map(|edges| edges[i]),
                right: snapshot.right.as_ref().map(|edges| edges[i]),
            };
            let initial: Vec<Propagator> = shared.states.row(i).iter().copied().collect();
            solve_energy(solver, &ctx, &shared.positions, &initial, settings)
        })
        .collect::<QResult<Vec<Vec<Propagator>>>>()
        .inspect_err(|e| warn!("sweep over '{}' aborted: {}", shared.name, e))?;

    for (i, row) in rows.into_iter().enumerate() {
        for (j, state) in row.into_iter().enumerate() {
            material.states[(i, j)] = state;
        }
    }
    Ok(())
}
