//! Problem, settings, solution and failure types of the MIRK collocation solver.
use super::BVP_mirk_tableau::Tableau;
use nalgebra::{DMatrix, DVector};
use std::fmt;
use strum_macros::{Display, EnumIter};

/// Right-hand side of `y' = f(x, y)`: (x, y, out)
pub type ODEFunction<'a> = dyn Fn(f64, &[f64], &mut [f64]) + 'a;
/// Two-point boundary residuals: (ya, yb, out), `out.len() == y.len()`
pub type BCFunction<'a> = dyn Fn(&[f64], &[f64], &mut [f64]) + 'a;

/// Collocation order of the mono-implicit Runge-Kutta scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum CollocationOrder {
    /// trapezoid rule
    Second,
    /// Simpson / Lobatto IIIA, the classical 4th order collocation
    Fourth,
    /// Cash-Singhal MIRK6
    Sixth,
}

impl CollocationOrder {
    pub fn from_order(order: usize) -> Option<CollocationOrder> {
        match order {
            2 => Some(CollocationOrder::Second),
            4 => Some(CollocationOrder::Fourth),
            6 => Some(CollocationOrder::Sixth),
            _ => None,
        }
    }

    pub fn order(&self) -> usize {
        match self {
            CollocationOrder::Second => 2,
            CollocationOrder::Fourth => 4,
            CollocationOrder::Sixth => 6,
        }
    }
}

/// What the mesh refinement tries to drive below the tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum ErrorControl {
    /// RMS of the relative ODE residual of the continuous solution
    Defect,
    /// difference against the solution on a mesh with every interval halved
    GlobalError,
    /// both of the above
    DefectAndGlobal,
}

impl ErrorControl {
    pub fn from_name(name: &str) -> Option<ErrorControl> {
        match name.to_lowercase().as_str() {
            "defect" => Some(ErrorControl::Defect),
            "global" | "globalerror" | "global_error" => Some(ErrorControl::GlobalError),
            "both" | "defectandglobal" | "defect_and_global" => Some(ErrorControl::DefectAndGlobal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    pub order: CollocationOrder,
    pub error_control: ErrorControl,
    pub tolerance: f64,
    /// boundary residual tolerance, defaults to `tolerance`
    pub bc_tolerance: Option<f64>,
    /// the mesh may grow up to `max_refinement` times its initial node count
    pub max_refinement: usize,
    /// Newton solve + refinement sweeps
    pub max_iterations: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            order: CollocationOrder::Fourth,
            error_control: ErrorControl::Defect,
            tolerance: 1e-6,
            bc_tolerance: None,
            max_refinement: 8,
            max_iterations: 10,
        }
    }
}

impl SolverSettings {
    pub fn max_nodes(&self, initial_nodes: usize) -> usize {
        self.max_refinement.max(1) * initial_nodes
    }
}

/// A two-point boundary value problem on the mesh `mesh`
pub struct BvpProblem<'a> {
    /// strictly increasing initial mesh, at least two nodes
    pub mesh: Vec<f64>,
    /// initial guess, n rows by `mesh.len()` columns
    pub initial: DMatrix<f64>,
    pub ode: &'a ODEFunction<'a>,
    pub bc: &'a BCFunction<'a>,
}

/// Converged collocation solution with its continuous extension
#[derive(Debug, Clone)]
pub struct BvpSolution {
    pub x: Vec<f64>,
    /// node values, n × m
    pub y: DMatrix<f64>,
    /// stage derivatives of every interval, n × stages
    pub stages: Vec<DMatrix<f64>>,
    /// interval residuals y[i+1] − y[i] − hΣbK, used to close the interpolant
    pub closure: Vec<DVector<f64>>,
    pub rms_residuals: Vec<f64>,
    pub niter: usize,
    pub tableau: Tableau,
}

impl BvpSolution {
    pub fn n_equations(&self) -> usize {
        self.y.nrows()
    }

    /// continuous solution at `t`, clamped to the mesh range
    pub fn evaluate(&self, t: f64) -> DVector<f64> {
        let m = self.x.len();
        let t = t.clamp(self.x[0], self.x[m - 1]);
        // interval index with x[i] <= t, last interval for t == x[m-1]
        let i = self.x.partition_point(|&xi| xi <= t).saturating_sub(1).min(m - 2);
        let s = (t - self.x[i]) / (self.x[i + 1] - self.x[i]);
        self.interval_value(i, s)
    }

    /// u(x_i + s·h) = y_i + h·Σ_r ∫₀ˢ L_r·K_r + s·Φ_i
    pub fn interval_value(&self, i: usize, s: f64) -> DVector<f64> {
        let h = self.x[i + 1] - self.x[i];
        let weights = self.tableau.integrated_weights(s);
        let mut out = self.y.column(i).into_owned();
        for (r, w) in weights.iter().enumerate() {
            out += self.stages[i].column(r) * (h * w);
        }
        out += &self.closure[i] * s;
        out
    }

    /// du/dx at x_i + s·h
    pub fn interval_slope(&self, i: usize, s: f64) -> DVector<f64> {
        let h = self.x[i + 1] - self.x[i];
        let basis = self.tableau.basis_values(s);
        let mut out = &self.closure[i] / h;
        for (r, l) in basis.iter().enumerate() {
            out += self.stages[i].column(r) * *l;
        }
        out
    }

    /// solution at many points, n × points.len()
    pub fn evaluate_many(&self, points: &[f64]) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(self.n_equations(), points.len());
        for (j, &t) in points.iter().enumerate() {
            out.set_column(j, &self.evaluate(t));
        }
        out
    }
}

/// Reasons the collocation solver gives up
#[derive(Debug, Clone, PartialEq)]
pub enum BvpFailure {
    /// refinement would exceed the node budget
    MaxNodesExceeded { nodes: usize, max_nodes: usize },
    /// the collocation Jacobian could not be factorized or gave a non-finite step
    SingularJacobian { iteration: usize },
    /// boundary residuals stayed above tolerance after all sweeps
    BoundaryTolerance { residual: f64, iterations: usize },
    InvalidProblem(String),
}

impl BvpFailure {
    /// status code of the SciPy-style solver this one descends from
    pub fn status(&self) -> i32 {
        match self {
            BvpFailure::MaxNodesExceeded { .. } => 1,
            BvpFailure::SingularJacobian { .. } => 2,
            BvpFailure::BoundaryTolerance { .. } => 3,
            BvpFailure::InvalidProblem(_) => -1,
        }
    }
}

impl fmt::Display for BvpFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BvpFailure::MaxNodesExceeded { nodes, max_nodes } => write!(
                f,
                "The maximum number of mesh nodes is exceeded ({} > {}).",
                nodes, max_nodes
            ),
            BvpFailure::SingularJacobian { iteration } => write!(
                f,
                "A singular Jacobian encountered when solving the collocation system (iteration {}).",
                iteration
            ),
            BvpFailure::BoundaryTolerance {
                residual,
                iterations,
            } => write!(
                f,
                "Unable to satisfy boundary conditions tolerance (residual {:.3e} after {} iterations).",
                residual, iterations
            ),
            BvpFailure::InvalidProblem(msg) => write!(f, "Invalid problem: {}", msg),
        }
    }
}

impl std::error::Error for BvpFailure {}

/// Anything able to solve a two-point BVP
pub trait BvpSolver {
    fn solve(&self, problem: &BvpProblem, settings: &SolverSettings) -> Result<BvpSolution, BvpFailure>;
}
