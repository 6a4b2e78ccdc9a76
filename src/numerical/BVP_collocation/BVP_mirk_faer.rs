//! MIRK collocation BVP solver with residual control.
//!
//! Generalizes the 4th order SciPy-style collocation algorithm to the MIRK
//! family of orders 2, 4 and 6. The nonlinear collocation system is solved
//! by a damped Newton method whose Jacobian is assembled as a sparse matrix
//! and factorized with faer's sparse LU. The mesh is refined where the error
//! measure selected by `ErrorControl` exceeds the tolerance.
use super::BVP_mirk_api::{
    BCFunction, BvpFailure, BvpProblem, BvpSolution, BvpSolver, ErrorControl, ODEFunction,
    SolverSettings,
};
use super::BVP_mirk_tableau::Tableau;
use faer::col::{Col, ColRef};
use faer::linalg::solvers::Solve;
use faer::mat::Mat;
use faer::sparse::linalg::solvers::Lu;
use faer::sparse::{SparseColMat, Triplet};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use std::panic::{self, AssertUnwindSafe};

type faer_mat = SparseColMat<usize, f64>;
type faer_col = Col<f64>;

/// Machine epsilon for floating point arithmetic
const EPS: f64 = f64::EPSILON;

// Newton iteration parameters
const MAX_ITER: usize = 8;
const MAX_NJEV: usize = 4;
/// Armijo constant
const SIGMA: f64 = 0.2;
/// step size decrease factor
const TAU: f64 = 0.5;
/// max backtracking steps
const N_TRIAL: usize = 4;

/// The MIRK collocation solver; stateless, all knobs live in `SolverSettings`
#[derive(Debug, Clone, Copy, Default)]
pub struct CollocationSolver;

impl BvpSolver for CollocationSolver {
    fn solve(&self, problem: &BvpProblem, settings: &SolverSettings) -> Result<BvpSolution, BvpFailure> {
        solve_bvp(problem.ode, problem.bc, problem.mesh.clone(), problem.initial.clone(), settings)
    }
}

/// Collocation residuals of one iterate
#[derive(Debug, Clone)]
pub struct CollocationResidual {
    /// stage derivatives K, n × s per interval
    pub stages: Vec<DMatrix<f64>>,
    /// stage values Y, n × s per interval
    pub stage_values: Vec<DMatrix<f64>>,
    /// Φ, n × (m − 1)
    pub col_res: DMatrix<f64>,
    /// Σ b_r K_r, the mean slope of each interval, n × (m − 1)
    pub f_mean: DMatrix<f64>,
    pub bc_res: DVector<f64>,
}

impl CollocationResidual {
    /// collocation residuals interval by interval, then the boundary residuals
    pub fn stacked(&self) -> Vec<f64> {
        let mut res = Vec::with_capacity(self.col_res.len() + self.bc_res.len());
        res.extend_from_slice(self.col_res.as_slice());
        res.extend_from_slice(self.bc_res.as_slice());
        res
    }

    /// largest boundary residual; NaN if any residual is NaN
    pub fn max_bc(&self) -> f64 {
        max_abs(self.bc_res.as_slice())
    }
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc: f64, v| {
        if v.is_nan() || v.abs() > acc { v.abs() } else { acc }
    })
}

fn squared_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

/// Stage derivatives and stage values of one interval
pub fn interval_stages(
    tableau: &Tableau,
    fun: &ODEFunction,
    x0: f64,
    h: f64,
    y0: &[f64],
    y1: &[f64],
) -> (DMatrix<f64>, DMatrix<f64>) {
    let n = y0.len();
    let s = tableau.stages();
    let mut k = DMatrix::zeros(n, s);
    let mut values = DMatrix::zeros(n, s);
    let mut stage = vec![0.0; n];
    let mut out = vec![0.0; n];
    for r in 0..s {
        let v = tableau.v[r];
        for i in 0..n {
            let mut value = (1.0 - v) * y0[i] + v * y1[i];
            for (j, xrj) in tableau.x[r].iter().enumerate() {
                value += h * xrj * k[(i, j)];
            }
            stage[i] = value;
        }
        fun(x0 + tableau.c[r] * h, &stage, &mut out);
        for i in 0..n {
            k[(i, r)] = out[i];
            values[(i, r)] = stage[i];
        }
    }
    (k, values)
}

/// Evaluate collocation and boundary residuals on the mesh `x`
pub fn collocation_fun(
    tableau: &Tableau,
    fun: &ODEFunction,
    bc: &BCFunction,
    x: &[f64],
    y: &DMatrix<f64>,
) -> CollocationResidual {
    let (n, m) = y.shape();
    let data = y.as_slice();
    let mut stages = Vec::with_capacity(m - 1);
    let mut stage_values = Vec::with_capacity(m - 1);
    let mut col_res = DMatrix::zeros(n, m - 1);
    let mut f_mean = DMatrix::zeros(n, m - 1);

    for j in 0..(m - 1) {
        let h = x[j + 1] - x[j];
        let y0 = &data[j * n..(j + 1) * n];
        let y1 = &data[(j + 1) * n..(j + 2) * n];
        let (k, values) = interval_stages(tableau, fun, x[j], h, y0, y1);
        for i in 0..n {
            let mean: f64 = (0..tableau.stages()).map(|r| tableau.b[r] * k[(i, r)]).sum();
            f_mean[(i, j)] = mean;
            col_res[(i, j)] = y1[i] - y0[i] - h * mean;
        }
        stages.push(k);
        stage_values.push(values);
    }

    let mut bc_res = DVector::zeros(n);
    bc(&data[0..n], &data[(m - 1) * n..m * n], bc_res.as_mut_slice());

    CollocationResidual {
        stages,
        stage_values,
        col_res,
        f_mean,
        bc_res,
    }
}

/// Forward-difference Jacobian df/dy at one point
pub fn estimate_fun_jac(fun: &ODEFunction, x: f64, y: &[f64], f0: &[f64]) -> DMatrix<f64> {
    let n = y.len();
    let mut jac = DMatrix::zeros(n, n);
    let mut y_perturbed = y.to_vec();
    let mut f_new = vec![0.0; n];
    for i in 0..n {
        let h = EPS.sqrt() * (1.0 + y[i].abs());
        y_perturbed[i] = y[i] + h;
        fun(x, &y_perturbed, &mut f_new);
        for row in 0..n {
            jac[(row, i)] = (f_new[row] - f0[row]) / h;
        }
        y_perturbed[i] = y[i];
    }
    jac
}

/// Forward-difference Jacobians of the boundary residuals with respect to ya and yb
pub fn estimate_bc_jac(bc: &BCFunction, ya: &[f64], yb: &[f64], bc0: &[f64]) -> (DMatrix<f64>, DMatrix<f64>) {
    let n = ya.len();
    let mut dbc_dya = DMatrix::zeros(n, n);
    let mut dbc_dyb = DMatrix::zeros(n, n);
    let mut bc_new = vec![0.0; n];

    let mut ya_perturbed = ya.to_vec();
    for i in 0..n {
        let h = EPS.sqrt() * (1.0 + ya[i].abs());
        ya_perturbed[i] = ya[i] + h;
        bc(&ya_perturbed, yb, &mut bc_new);
        for row in 0..n {
            dbc_dya[(row, i)] = (bc_new[row] - bc0[row]) / h;
        }
        ya_perturbed[i] = ya[i];
    }

    let mut yb_perturbed = yb.to_vec();
    for i in 0..n {
        let h = EPS.sqrt() * (1.0 + yb[i].abs());
        yb_perturbed[i] = yb[i] + h;
        bc(ya, &yb_perturbed, &mut bc_new);
        for row in 0..n {
            dbc_dyb[(row, i)] = (bc_new[row] - bc0[row]) / h;
        }
        yb_perturbed[i] = yb[i];
    }
    (dbc_dya, dbc_dyb)
}

/// dΦ/dy_i and dΦ/dy_{i+1} of one interval by the chain rule through the stages
pub fn interval_jacobian(
    tableau: &Tableau,
    fun: &ODEFunction,
    x0: f64,
    h: f64,
    stages: &DMatrix<f64>,
    stage_values: &DMatrix<f64>,
) -> (DMatrix<f64>, DMatrix<f64>) {
    let n = stages.nrows();
    let s = tableau.stages();
    let identity = DMatrix::<f64>::identity(n, n);
    let mut dk_left: Vec<DMatrix<f64>> = Vec::with_capacity(s);
    let mut dk_right: Vec<DMatrix<f64>> = Vec::with_capacity(s);

    for r in 0..s {
        let y_stage: Vec<f64> = stage_values.column(r).iter().copied().collect();
        let f_stage: Vec<f64> = stages.column(r).iter().copied().collect();
        let jac = estimate_fun_jac(fun, x0 + tableau.c[r] * h, &y_stage, &f_stage);
        let mut a_left = &identity * (1.0 - tableau.v[r]);
        let mut a_right = &identity * tableau.v[r];
        for (j, xrj) in tableau.x[r].iter().enumerate() {
            a_left += &dk_left[j] * (h * xrj);
            a_right += &dk_right[j] * (h * xrj);
        }
        dk_left.push(&jac * a_left);
        dk_right.push(&jac * a_right);
    }

    let mut left = -&identity;
    let mut right = identity.clone();
    for r in 0..s {
        left -= &dk_left[r] * (h * tableau.b[r]);
        right -= &dk_right[r] * (h * tableau.b[r]);
    }
    (left, right)
}

fn push_block(triplets: &mut Vec<Triplet<usize, usize, f64>>, row0: usize, col0: usize, block: &DMatrix<f64>) {
    for col in 0..block.ncols() {
        for row in 0..block.nrows() {
            let val = block[(row, col)];
            if val != 0.0 {
                triplets.push(Triplet::new(row0 + row, col0 + col, val));
            }
        }
    }
}

/// Construct the sparse Jacobian of the collocation system
pub fn construct_global_jac(
    tableau: &Tableau,
    fun: &ODEFunction,
    bc: &BCFunction,
    x: &[f64],
    y: &DMatrix<f64>,
    residual: &CollocationResidual,
) -> Option<faer_mat> {
    let (n, m) = y.shape();
    let total_size = (m - 1) * n + n;
    let mut triplets = Vec::new();

    for i in 0..(m - 1) {
        let h = x[i + 1] - x[i];
        let (left, right) = interval_jacobian(
            tableau,
            fun,
            x[i],
            h,
            &residual.stages[i],
            &residual.stage_values[i],
        );
        push_block(&mut triplets, i * n, i * n, &left);
        push_block(&mut triplets, i * n, (i + 1) * n, &right);
    }

    let data = y.as_slice();
    let (dbc_dya, dbc_dyb) = estimate_bc_jac(
        bc,
        &data[0..n],
        &data[(m - 1) * n..m * n],
        residual.bc_res.as_slice(),
    );
    let bc_row_start = (m - 1) * n;
    push_block(&mut triplets, bc_row_start, 0, &dbc_dya);
    push_block(&mut triplets, bc_row_start, (m - 1) * n, &dbc_dyb);

    SparseColMat::try_new_from_triplets(total_size, total_size, &triplets).ok()
}

/// Sparse LU of the collocation Jacobian, `None` when it is singular.
///
/// faer panics on an exactly zero pivot instead of returning an error, so empty
/// rows and columns are rejected up front and any remaining panic is caught.
pub fn factorize(jac: &faer_mat) -> Option<Lu<usize, f64>> {
    let size = jac.nrows();
    let mut row_used = vec![false; size];
    let mut col_used = vec![false; size];
    for j in 0..jac.ncols() {
        for (&i, &v) in jac.row_idx_of_col_raw(j).iter().zip(jac.val_of_col(j)) {
            if v != 0.0 {
                row_used[i] = true;
                col_used[j] = true;
            }
        }
    }
    if !(row_used.iter().all(|&u| u) && col_used.iter().all(|&u| u)) {
        debug!("collocation Jacobian has an empty row or column");
        return None;
    }
    match panic::catch_unwind(AssertUnwindSafe(|| jac.sp_lu())) {
        Ok(Ok(factor)) => Some(factor),
        Ok(Err(e)) => {
            debug!("sparse LU failed: {:?}", e);
            None
        }
        Err(_) => {
            debug!("sparse LU hit a zero pivot");
            None
        }
    }
}

fn lu_solve(lu: &Lu<usize, f64>, res: &[f64]) -> Vec<f64> {
    let rhs: faer_col = ColRef::from_slice(res).to_owned();
    let step: Mat<f64> = lu.solve(rhs.as_mat());
    (0..step.nrows()).map(|i| *step.get(i, 0)).collect()
}

fn is_converged(residual: &CollocationResidual, tol_r: &[f64], bc_tol: f64) -> bool {
    let (n, m1) = residual.col_res.shape();
    for j in 0..m1 {
        for i in 0..n {
            // negated comparison so NaN never counts as converged
            if !(residual.col_res[(i, j)].abs() < tol_r[j] * (1.0 + residual.f_mean[(i, j)].abs())) {
                return false;
            }
        }
    }
    residual.bc_res.iter().all(|r| r.abs() < bc_tol)
}

/// Solve the nonlinear collocation system by Newton's method with sparse matrices
///
/// Returns the final iterate and whether the Jacobian was singular.
pub fn solve_newton(
    tableau: &Tableau,
    fun: &ODEFunction,
    bc: &BCFunction,
    x: &[f64],
    y: DMatrix<f64>,
    bvp_tol: f64,
    bc_tol: f64,
) -> (DMatrix<f64>, bool) {
    let (n, m) = y.shape();
    let mut y = y;
    // Tolerance for collocation residuals
    let tol_r: Vec<f64> = x.windows(2).map(|w| 2.0 / 3.0 * (w[1] - w[0]) * 5e-2 * bvp_tol).collect();

    let mut njev = 0;
    let mut recompute_jac = true;
    let mut lu: Option<Lu<usize, f64>> = None;

    for _iteration in 0..MAX_ITER {
        let residual = collocation_fun(tableau, fun, bc, x, &y);
        if is_converged(&residual, &tol_r, bc_tol) {
            break;
        }
        let res = residual.stacked();

        if recompute_jac || lu.is_none() {
            let Some(jac_matrix) = construct_global_jac(tableau, fun, bc, x, &y, &residual) else {
                return (y, true);
            };
            match factorize(&jac_matrix) {
                Some(factor) => lu = Some(factor),
                None => return (y, true),
            }
            njev += 1;
        }
        let Some(factor) = lu.as_ref() else {
            return (y, true);
        };

        let step = lu_solve(factor, &res);
        if !step.iter().all(|v| v.is_finite()) {
            return (y, true);
        }
        let cost = squared_norm(&step);
        let y_step = DMatrix::from_column_slice(n, m, &step[..n * m]);

        // Backtracking line search, non-finite trial points are rejected
        let mut alpha = 1.0;
        let mut accepted: Option<DMatrix<f64>> = None;
        for trial in 0..=N_TRIAL {
            let y_new = &y - &y_step * alpha;
            let res_new = collocation_fun(tableau, fun, bc, x, &y_new).stacked();
            if res_new.iter().all(|v| v.is_finite()) {
                let cost_new = squared_norm(&lu_solve(factor, &res_new));
                let sufficient = cost_new < (1.0 - 2.0 * alpha * SIGMA) * cost;
                if sufficient || trial == N_TRIAL {
                    accepted = Some(y_new);
                }
                if sufficient {
                    break;
                }
            }
            if trial < N_TRIAL {
                alpha *= TAU;
            }
        }
        if let Some(y_new) = accepted {
            y = y_new;
        }

        if njev >= MAX_NJEV && alpha < 1.0 {
            break;
        }
        recompute_jac = alpha < 1.0;
    }
    (y, false)
}

/// Package the iterate `y` on mesh `x` as a solution with its continuous extension
pub fn build_solution(
    tableau: &Tableau,
    x: &[f64],
    y: &DMatrix<f64>,
    residual: &CollocationResidual,
    niter: usize,
) -> BvpSolution {
    let closure = (0..residual.col_res.ncols())
        .map(|j| residual.col_res.column(j).into_owned())
        .collect();
    BvpSolution {
        x: x.to_vec(),
        y: y.clone(),
        stages: residual.stages.clone(),
        closure,
        rms_residuals: Vec::new(),
        niter,
        tableau: tableau.clone(),
    }
}

/// RMS of the relative residual u' − f(x, u) on every interval by 5-point
/// Lobatto quadrature; the end points carry no residual and are skipped
pub fn estimate_rms_residuals(fun: &ODEFunction, sol: &BvpSolution) -> Vec<f64> {
    let n = sol.n_equations();
    let m1 = sol.x.len() - 1;
    let offset = 0.5 * (3.0_f64 / 7.0).sqrt();
    let mut f = vec![0.0; n];
    let mut rms_res = Vec::with_capacity(m1);
    for j in 0..m1 {
        let h = sol.x[j + 1] - sol.x[j];
        let mut sums = [0.0; 3];
        for (q, s) in [0.5, 0.5 + offset, 0.5 - offset].iter().enumerate() {
            let u = sol.interval_value(j, *s);
            let du = sol.interval_slope(j, *s);
            fun(sol.x[j] + s * h, u.as_slice(), &mut f);
            for i in 0..n {
                let r = (du[i] - f[i]) / (1.0 + f[i].abs());
                sums[q] += r * r;
            }
        }
        let integral = 0.5 * (32.0 / 45.0 * sums[0] + 49.0 / 90.0 * (sums[1] + sums[2]));
        rms_res.push(integral.sqrt());
    }
    rms_res
}

/// Mesh with every interval of `x` halved
pub fn halve_mesh(x: &[f64]) -> Vec<f64> {
    let mut fine = Vec::with_capacity(2 * x.len() - 1);
    for w in x.windows(2) {
        fine.push(w[0]);
        fine.push(0.5 * (w[0] + w[1]));
    }
    if let Some(last) = x.last() {
        fine.push(*last);
    }
    fine
}

/// Richardson estimate of the global error per interval from a re-solve on the halved mesh
pub fn estimate_global_error(
    tableau: &Tableau,
    fun: &ODEFunction,
    bc: &BCFunction,
    sol: &BvpSolution,
    tol: f64,
    bc_tol: f64,
) -> Option<Vec<f64>> {
    let fine_x = halve_mesh(&sol.x);
    let guess = sol.evaluate_many(&fine_x);
    let (y_fine, singular) = solve_newton(tableau, fun, bc, &fine_x, guess, tol, bc_tol);
    if singular {
        return None;
    }
    let p = tableau.order.order() as i32;
    let richardson = 2f64.powi(p) / (2f64.powi(p) - 1.0);
    let n = sol.n_equations();
    let m1 = sol.x.len() - 1;
    let mut errors = Vec::with_capacity(m1);
    for j in 0..m1 {
        let coarse = [
            sol.y.column(j).into_owned(),
            sol.interval_value(j, 0.5),
            sol.y.column(j + 1).into_owned(),
        ];
        let mut err: f64 = 0.0;
        for (q, yc) in coarse.iter().enumerate() {
            let col = 2 * j + q;
            for i in 0..n {
                let yf = y_fine[(i, col)];
                let e = (yf - yc[i]).abs() / (1.0 + yf.abs());
                if e.is_nan() || e > err {
                    err = e;
                }
            }
        }
        errors.push(richardson * err);
    }
    Some(errors)
}

/// Modify mesh by inserting nodes: one in the middle of the `insert_1`
/// intervals, two at the thirds of the `insert_2` intervals
pub fn modify_mesh(x: &[f64], insert_1: &[usize], insert_2: &[usize]) -> Vec<f64> {
    let mut new_points = x.to_vec();
    for &i in insert_1 {
        new_points.push(0.5 * (x[i] + x[i + 1]));
    }
    for &i in insert_2 {
        new_points.push((2.0 * x[i] + x[i + 1]) / 3.0);
        new_points.push((x[i] + 2.0 * x[i + 1]) / 3.0);
    }
    new_points.sort_by(|a, b| a.total_cmp(b));
    new_points
}

fn validate(x: &[f64], y: &DMatrix<f64>, settings: &SolverSettings) -> Result<(), BvpFailure> {
    if x.len() < 2 {
        return Err(BvpFailure::InvalidProblem("mesh needs at least two nodes".to_string()));
    }
    if !x.windows(2).all(|w| w[1] > w[0]) {
        return Err(BvpFailure::InvalidProblem("mesh must be strictly increasing".to_string()));
    }
    if y.ncols() != x.len() || y.nrows() == 0 {
        return Err(BvpFailure::InvalidProblem(format!(
            "initial guess has shape ({}, {}), mesh has {} nodes",
            y.nrows(),
            y.ncols(),
            x.len()
        )));
    }
    if !(settings.tolerance > 0.0) {
        return Err(BvpFailure::InvalidProblem(format!(
            "tolerance must be positive, got {}",
            settings.tolerance
        )));
    }
    Ok(())
}

/// BVP solver with mesh refinement
pub fn solve_bvp(
    fun: &ODEFunction,
    bc: &BCFunction,
    mut x: Vec<f64>,
    mut y: DMatrix<f64>,
    settings: &SolverSettings,
) -> Result<BvpSolution, BvpFailure> {
    validate(&x, &y, settings)?;
    let tableau = Tableau::new(settings.order);
    let tol = settings.tolerance;
    let bc_tol = settings.bc_tolerance.unwrap_or(tol);
    let max_nodes = settings.max_nodes(x.len());
    let use_defect = matches!(
        settings.error_control,
        ErrorControl::Defect | ErrorControl::DefectAndGlobal
    );
    let use_global = matches!(
        settings.error_control,
        ErrorControl::GlobalError | ErrorControl::DefectAndGlobal
    );
    let mut iteration = 0;

    debug!(
        "{:^15}{:^15}{:^15}{:^15}{:^15}",
        "Iteration", "Max residual", "Max BC residual", "Total nodes", "Nodes added"
    );
    loop {
        let m = x.len();
        let (y_new, singular) = solve_newton(&tableau, fun, bc, &x, y, tol, bc_tol);
        y = y_new;
        iteration += 1;
        if singular {
            warn!("Singular Jacobian encountered on iteration {}.", iteration);
            return Err(BvpFailure::SingularJacobian { iteration });
        }

        let residual = collocation_fun(&tableau, fun, bc, &x, &y);
        let max_bc_res = residual.max_bc();
        let mut sol = build_solution(&tableau, &x, &y, &residual, iteration);

        let mut measure = vec![0.0; m - 1];
        if use_defect {
            for (e, r) in measure.iter_mut().zip(estimate_rms_residuals(fun, &sol)) {
                *e = r;
            }
        }
        if use_global {
            let Some(global) = estimate_global_error(&tableau, fun, bc, &sol, tol, bc_tol) else {
                warn!("Singular Jacobian on the halved mesh, iteration {}.", iteration);
                return Err(BvpFailure::SingularJacobian { iteration });
            };
            for (e, g) in measure.iter_mut().zip(global) {
                if g.is_nan() || g > *e {
                    *e = g;
                }
            }
        }
        let max_res = max_abs(&measure);

        // Determine which intervals need refinement
        let mut insert_1 = Vec::new();
        let mut insert_2 = Vec::new();
        for (j, e) in measure.iter().enumerate() {
            if e.is_nan() || *e >= 100.0 * tol {
                insert_2.push(j);
            } else if *e > tol {
                insert_1.push(j);
            }
        }
        let nodes_added = insert_1.len() + 2 * insert_2.len();

        debug!(
            "{:^15}{:^15.2e}{:^15.2e}{:^15}{:^15}",
            iteration, max_res, max_bc_res, m, nodes_added
        );

        if m + nodes_added > max_nodes {
            warn!("Number of nodes exceeded after iteration {}.", iteration);
            return Err(BvpFailure::MaxNodesExceeded {
                nodes: m + nodes_added,
                max_nodes,
            });
        }

        if nodes_added > 0 {
            x = modify_mesh(&x, &insert_1, &insert_2);
            y = sol.evaluate_many(&x);
        } else if max_bc_res <= bc_tol {
            debug!("Solved in {} iterations, number of nodes {}.", iteration, m);
            sol.rms_residuals = measure;
            return Ok(sol);
        } else if iteration >= settings.max_iterations {
            warn!(
                "Unable to satisfy boundary conditions tolerance on iteration {}.",
                iteration
            );
            return Err(BvpFailure::BoundaryTolerance {
                residual: max_bc_res,
                iterations: iteration,
            });
        }
    }
}
