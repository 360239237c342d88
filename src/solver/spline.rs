//! Natural cubic spline coefficients by Jacobi iteration.
//!
//! Solves the tridiagonal system `c[i-1] + 4 c[i] + c[i+1] = 6 (y[i+1] - 2 y[i] + y[i-1]) / h^2`
//! for the knot second derivatives with `c[0] = c[n-1] = 0`, then derives the
//! per-segment coefficients and returns a host-side `Interpolator`.

use crate::error::{JacobiError, Result};
use crate::interpolant::Interpolator;

use super::backend::JacobiBackend;
use super::convergence::{ping_pong, ConvergenceReport, IterationParams};
use super::workgroup::WorkSize;

/// Interpolator plus how the coefficient iteration ended.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineSolution {
    pub interpolator: Interpolator,
    pub report: ConvergenceReport,
}

/// Build the natural cubic spline through `y` sampled at spacing `h`.
///
/// All device buffers for this call are released before it returns.
pub fn solve_spline<B: JacobiBackend>(
    backend: &B,
    y: &[f64],
    h: f64,
    params: &IterationParams,
) -> Result<SplineSolution> {
    let n = y.len();
    if n < 2 {
        return Err(JacobiError::InvalidInput(format!(
            "spline needs at least 2 knots, got {n}"
        )));
    }
    if !(h.is_finite() && h > 0.0) {
        return Err(JacobiError::InvalidInput(format!(
            "knot spacing must be positive and finite, got {h}"
        )));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(JacobiError::InvalidInput("non-finite knot value".into()));
    }

    let _span = tracing::debug_span!("spline_solve", n, h).entered();
    let work = WorkSize::plan(n, backend.preferred_group_size());

    let y_buf = backend.alloc(work.global, "knots")?;
    let rhs = backend.alloc(work.global, "spline_rhs")?;
    let c1 = backend.alloc(work.global, "c1")?;
    let c2 = backend.alloc(work.global, "c2")?;
    let a_buf = backend.alloc(work.global, "coeff_a")?;
    let b_buf = backend.alloc(work.global, "coeff_b")?;
    let partials = backend.alloc(work.groups(), "diff_partials")?;

    let mut y_padded = y.to_vec();
    y_padded.resize(work.global, 0.0);
    backend.upload(&y_padded, &y_buf)?;
    backend.init(&c1, n, work)?;
    backend.init_rhs(&y_buf, &rhs, h, n, work)?;

    let report = ping_pong(
        backend,
        &c1,
        &c2,
        &partials,
        n,
        work,
        params,
        |src, dst| backend.spline_step(&rhs, src, dst, n, work),
    )?;

    backend.compute_ab(&y_buf, &c1, &a_buf, &b_buf, h, n, work)?;

    let a = backend.download(&a_buf, n)?;
    let b = backend.download(&b_buf, n)?;
    let c = backend.download(&c1, n)?;

    tracing::info!(
        status = ?report.status,
        iterations = report.iterations,
        residual = report.residual,
        "spline solve finished"
    );
    let interpolator = Interpolator::new(a, b, c, h)?;
    Ok(SplineSolution {
        interpolator,
        report,
    })
}
