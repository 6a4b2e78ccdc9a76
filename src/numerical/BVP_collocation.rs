//!
//! # BVP_collocation - two-point boundary value problems by MIRK collocation
//!
//! Mono-implicit Runge-Kutta collocation of order 2, 4 or 6 on an adaptive mesh.
//! The collocation system is solved by damped Newton iterations on a sparse
//! `faer` Jacobian; the mesh is refined until the RMS defect (and optionally the
//! estimated global error) of every interval is below tolerance.
//!
//! ## Module Structure
//! - `BVP_mirk_api`: problem, settings, solution and failure types, `BvpSolver` trait
//! - `BVP_mirk_faer`: the solver itself
//! - `BVP_mirk_tableau`: Butcher data and continuous extensions
//!
//! ## Example
//! ```
//! use RustedUsadel::numerical::BVP_collocation::BVP_mirk_api::{BvpProblem, BvpSolver, SolverSettings};
//! use RustedUsadel::numerical::BVP_collocation::BVP_mirk_faer::CollocationSolver;
//! use nalgebra::DMatrix;
//!
//! // y'' = -y, y(0) = 0, y(π/2) = 1
//! let ode = |_x: f64, y: &[f64], out: &mut [f64]| {
//!     out[0] = y[1];
//!     out[1] = -y[0];
//! };
//! let bc = |ya: &[f64], yb: &[f64], out: &mut [f64]| {
//!     out[0] = ya[0];
//!     out[1] = yb[0] - 1.0;
//! };
//! let mesh: Vec<f64> = (0..11).map(|i| std::f64::consts::FRAC_PI_2 * i as f64 / 10.0).collect();
//! let problem = BvpProblem {
//!     initial: DMatrix::zeros(2, mesh.len()),
//!     mesh,
//!     ode: &ode,
//!     bc: &bc,
//! };
//! let sol = CollocationSolver.solve(&problem, &SolverSettings::default()).unwrap();
//! assert!((sol.evaluate(0.5)[0] - 0.5f64.sin()).abs() < 1e-5);
//! ```
pub mod BVP_mirk_api;
pub mod BVP_mirk_faer;
pub mod BVP_mirk_tableau;
