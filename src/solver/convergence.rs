//! Bounded ping-pong Jacobi driver and its convergence test.
//!
//! Both orchestrators run the same loop: two half-sweeps that swap the roles
//! of the iterate buffers, a device-side difference reduction, and a host-side
//! sum of the per-group partials compared against a tolerance.

use crate::error::{JacobiError, Result};

use super::backend::JacobiBackend;
use super::workgroup::WorkSize;

/// Iteration cap and residual threshold for one solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationParams {
    /// Loop bodies, each performing two sweeps.
    pub max_iterations: usize,
    /// Converged when the summed squared difference is `<=` this.
    pub tolerance: f64,
}

impl IterationParams {
    /// Dense linear systems.
    pub fn linear() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-20,
        }
    }

    /// Natural cubic spline coefficient systems.
    pub fn spline() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-10,
        }
    }
}

impl Default for IterationParams {
    fn default() -> Self {
        Self::linear()
    }
}

/// How the iteration loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Residual fell to or below the tolerance.
    Converged,
    /// Iteration cap reached first. The result is a best-effort approximation.
    ReachedCap,
    /// Residual became NaN or infinite; iteration stopped early.
    Diverged,
}

/// Outcome of the iteration loop, returned alongside every result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceReport {
    pub status: SolveStatus,
    /// Loop bodies executed.
    pub iterations: usize,
    /// Device-side sweeps executed (two per iteration).
    pub sweeps: usize,
    /// Last reduced residual, `f64::INFINITY` if none was measured.
    pub residual: f64,
}

impl ConvergenceReport {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Sum of per-work-group partial sums.
pub fn reduce_partials(partials: &[f64]) -> f64 {
    partials.iter().sum()
}

/// Run the bounded Jacobi iteration.
///
/// `sweep(src, dst)` must read only `src` and write only `dst`. Each iteration
/// sweeps `current -> next` then `next -> current`, so on return `current`
/// always holds the latest iterate. `partials` needs `work.groups()` slots.
#[allow(clippy::too_many_arguments)]
pub fn ping_pong<B, F>(
    backend: &B,
    current: &B::Buffer,
    next: &B::Buffer,
    partials: &B::Buffer,
    n: usize,
    work: WorkSize,
    params: &IterationParams,
    mut sweep: F,
) -> Result<ConvergenceReport>
where
    B: JacobiBackend,
    F: FnMut(&B::Buffer, &B::Buffer) -> Result<()>,
{
    if std::ptr::eq(current, next) {
        return Err(JacobiError::InvalidState(
            "ping-pong iterates alias the same buffer".into(),
        ));
    }

    let mut residual = f64::INFINITY;
    for iter in 0..params.max_iterations {
        sweep(current, next)?;
        sweep(next, current)?;

        backend.difference(current, next, partials, n, work)?;
        let sums = backend.download(partials, work.groups())?;
        residual = reduce_partials(&sums);
        tracing::debug!(iteration = iter + 1, residual, "jacobi iteration");

        let report = |status| ConvergenceReport {
            status,
            iterations: iter + 1,
            sweeps: 2 * (iter + 1),
            residual,
        };
        if !residual.is_finite() {
            tracing::warn!(iterations = iter + 1, "jacobi iteration diverged");
            return Ok(report(SolveStatus::Diverged));
        }
        if residual <= params.tolerance {
            tracing::debug!(iterations = iter + 1, residual, "jacobi converged");
            return Ok(report(SolveStatus::Converged));
        }
    }

    tracing::warn!(
        iterations = params.max_iterations,
        residual,
        tolerance = params.tolerance,
        "jacobi iteration cap reached without convergence"
    );
    Ok(ConvergenceReport {
        status: SolveStatus::ReachedCap,
        iterations: params.max_iterations,
        sweeps: 2 * params.max_iterations,
        residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::cpu::{CpuBackend, CpuBuffer};
    use std::cell::RefCell;

    #[test]
    fn reduce_sums_partials() {
        assert_eq!(reduce_partials(&[]), 0.0);
        assert_eq!(reduce_partials(&[1.5]), 1.5);
        assert_eq!(reduce_partials(&[1.0, 2.0, 0.25]), 3.25);
    }

    #[test]
    fn reduce_is_order_independent_for_exact_values() {
        let a = [0.5, 0.25, 4.0, 8.0];
        let mut b = a;
        b.reverse();
        assert_eq!(reduce_partials(&a), reduce_partials(&b));
    }

    #[test]
    fn default_params_are_linear() {
        assert_eq!(IterationParams::default(), IterationParams::linear());
        assert_eq!(IterationParams::linear().tolerance, 1e-20);
        assert_eq!(IterationParams::spline().tolerance, 1e-10);
        assert_eq!(IterationParams::spline().max_iterations, 100);
    }

    #[test]
    fn sweeps_alternate_buffer_roles() {
        let backend = CpuBackend::new();
        let work = WorkSize::plan(1, 64);
        let x0 = backend.alloc(1, "x0").unwrap();
        let x1 = backend.alloc(1, "x1").unwrap();
        let partials = backend.alloc(1, "diff").unwrap();
        let order = RefCell::new(Vec::new());
        let params = IterationParams {
            max_iterations: 2,
            tolerance: -1.0,
        };

        let report = ping_pong(&backend, &x0, &x1, &partials, 1, work, &params, |src, dst| {
            let tag = |b: &CpuBuffer| if std::ptr::eq(b, &x0) { 0 } else { 1 };
            order.borrow_mut().push((tag(src), tag(dst)));
            Ok(())
        })
        .unwrap();

        assert_eq!(report.status, SolveStatus::ReachedCap);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.sweeps, 4);
        assert_eq!(order.into_inner(), vec![(0, 1), (1, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn aliased_iterates_are_rejected() {
        let backend = CpuBackend::new();
        let work = WorkSize::plan(1, 64);
        let x = backend.alloc(1, "x").unwrap();
        let partials = backend.alloc(1, "diff").unwrap();
        let err = ping_pong(
            &backend,
            &x,
            &x,
            &partials,
            1,
            work,
            &IterationParams::linear(),
            |_, _| Ok(()),
        )
        .unwrap_err();
        assert!(matches!(err, JacobiError::InvalidState(_)), "got {err:?}");
    }

    #[test]
    fn zero_iteration_cap_reports_no_work() {
        let backend = CpuBackend::new();
        let work = WorkSize::plan(1, 64);
        let x0 = backend.alloc(1, "x0").unwrap();
        let x1 = backend.alloc(1, "x1").unwrap();
        let partials = backend.alloc(1, "diff").unwrap();
        let params = IterationParams {
            max_iterations: 0,
            tolerance: 1.0,
        };
        let report =
            ping_pong(&backend, &x0, &x1, &partials, 1, work, &params, |_, _| Ok(())).unwrap();
        assert_eq!(report.status, SolveStatus::ReachedCap);
        assert_eq!(report.sweeps, 0);
        assert!(report.residual.is_infinite());
        assert_eq!(backend.dispatch_count(), 0);
    }

    #[test]
    fn sweep_errors_propagate() {
        let backend = CpuBackend::new();
        let work = WorkSize::plan(1, 64);
        let x0 = backend.alloc(1, "x0").unwrap();
        let x1 = backend.alloc(1, "x1").unwrap();
        let partials = backend.alloc(1, "diff").unwrap();
        let err = ping_pong(
            &backend,
            &x0,
            &x1,
            &partials,
            1,
            work,
            &IterationParams::linear(),
            |_, _| Err(JacobiError::InvalidState("device lost".into())),
        )
        .unwrap_err();
        assert!(err.to_string().contains("device lost"));
    }
}
