//! Jacobi iteration on a compute device for dense linear systems and for the
//! coefficient system of natural cubic splines.
//!
//! The heavy per-row work runs in compute kernels behind the
//! [`solver::JacobiBackend`] trait; this crate drives the ping-pong iteration,
//! the convergence test and the reconstruction of the spline interpolant.

pub mod dense;
pub mod error;
pub mod interpolant;
pub mod output;
pub mod parser;
pub mod solver;
pub mod stats;

pub use dense::DenseMatrix;
pub use error::{JacobiError, Result};
pub use interpolant::Interpolator;
pub use solver::Solver;
