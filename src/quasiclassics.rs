//!
//! # quasiclassics - diffusive Usadel theory in the Riccati parametrization
//!
//! Computes energy- and position-resolved retarded Green's functions of
//! stacks of diffusive conductors, superconductors and ferromagnets.
//!
//! ## Module Structure
//! - `spin_matrix`, `nambu`: 2×2 spin and 4×4 Nambu⊗spin algebra
//! - `propagator`: Riccati state and the observables derived from it
//! - `diffusion`: the Usadel equation with pairing, spin-orbit coupling,
//!   exchange field, spin-dependent scattering and orbital depairing
//! - `boundary`, `spin_active`: interface boundary conditions
//! - `spin_orbit`: SU(2) gauge field
//! - `superconductor`: gap profile and the gap equation
//! - `material`, `stack`: material layers and their chain
//! - `bvp_driver`: per-energy boundary value problems solved in parallel
pub mod errors;
pub mod spin_matrix;
pub mod nambu;
pub mod propagator;
pub mod spin_orbit;
pub mod diffusion;
pub mod spin_active;
pub mod boundary;
pub mod superconductor;
pub mod material;
pub mod bvp_driver;
pub mod stack;
