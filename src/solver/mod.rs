//! Jacobi solvers for dense linear systems and natural cubic splines.

pub mod backend;
pub mod convergence;
pub mod cpu;
pub mod gpu_shaders;
pub mod jacobi;
pub mod spline;
pub mod workgroup;

use crate::dense::DenseMatrix;
use crate::error::Result;

pub use backend::{JacobiBackend, WgpuBackend};
pub use convergence::{ConvergenceReport, IterationParams, SolveStatus};
pub use cpu::CpuBackend;
pub use jacobi::LinearSolution;
pub use spline::SplineSolution;

/// Both host-facing entry points bound to one device session.
pub struct Solver<B: JacobiBackend> {
    backend: B,
    pub linear_params: IterationParams,
    pub spline_params: IterationParams,
}

impl<B: JacobiBackend> Solver<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            linear_params: IterationParams::linear(),
            spline_params: IterationParams::spline(),
        }
    }

    pub fn with_linear_params(mut self, params: IterationParams) -> Self {
        self.linear_params = params;
        self
    }

    pub fn with_spline_params(mut self, params: IterationParams) -> Self {
        self.spline_params = params;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Tear down the session and hand the backend back.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Solve `A x = b`.
    pub fn solve(&self, a: &DenseMatrix, b: &[f64]) -> Result<LinearSolution> {
        jacobi::solve_linear(&self.backend, a, b, &self.linear_params)
    }

    /// Natural cubic spline through `knots` at uniform `spacing`.
    pub fn solve_spline(&self, knots: &[f64], spacing: f64) -> Result<SplineSolution> {
        spline::solve_spline(&self.backend, knots, spacing, &self.spline_params)
    }
}
