//! Jacobi iteration for dense linear systems.
//!
//! Written against the `JacobiBackend` trait so the same orchestration runs on
//! the GPU or on the host backend.

use crate::dense::DenseMatrix;
use crate::error::{JacobiError, Result};

use super::backend::JacobiBackend;
use super::convergence::{ping_pong, ConvergenceReport, IterationParams};
use super::workgroup::WorkSize;

/// Solution vector plus how the iteration ended.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSolution {
    pub x: Vec<f64>,
    pub report: ConvergenceReport,
}

fn validate(a: &DenseMatrix, b: &[f64]) -> Result<usize> {
    let n = a.nrows;
    if !a.is_square() || b.len() != n {
        return Err(JacobiError::InvalidInput(format!(
            "dimension mismatch: matrix is {}x{}, rhs length is {}",
            a.nrows,
            a.ncols,
            b.len()
        )));
    }
    if a.nrows.checked_mul(a.ncols) != Some(a.values.len()) {
        return Err(JacobiError::InvalidInput(format!(
            "matrix storage holds {} values, expected {}x{}",
            a.values.len(),
            a.nrows,
            a.ncols
        )));
    }
    if n == 0 {
        return Err(JacobiError::InvalidInput("empty system".into()));
    }
    if let Some(row) = a.zero_diagonal() {
        return Err(JacobiError::InvalidInput(format!(
            "zero diagonal entry in row {row}"
        )));
    }
    if a.values.iter().chain(b).any(|v| !v.is_finite()) {
        return Err(JacobiError::InvalidInput("non-finite entry in system".into()));
    }
    Ok(n)
}

/// Solve `A x = b` by Jacobi iteration starting from `x = 0`.
///
/// Non-convergence is not an error: check `report.status`. All device buffers
/// for this call are released before it returns, on success or failure.
pub fn solve_linear<B: JacobiBackend>(
    backend: &B,
    a: &DenseMatrix,
    b: &[f64],
    params: &IterationParams,
) -> Result<LinearSolution> {
    let n = validate(a, b)?;
    let _span = tracing::debug_span!("jacobi_solve", n).entered();
    if !a.is_diagonally_dominant() {
        tracing::warn!(n, "matrix is not diagonally dominant; Jacobi may not converge");
    }

    let work = WorkSize::plan(n, backend.preferred_group_size());
    tracing::debug!(
        local = work.local,
        global = work.global,
        padding = work.padding(n),
        "dispatch geometry"
    );

    let x_old = backend.alloc(work.global, "x_old")?;
    let x_new = backend.alloc(work.global, "x_new")?;
    let a_buf = backend.alloc(work.global * work.global, "matrix")?;
    let b_buf = backend.alloc(work.global, "rhs")?;
    let partials = backend.alloc(work.groups(), "diff_partials")?;

    backend.init(&x_old, n, work)?;
    backend.upload(&a.to_padded(work.global), &a_buf)?;
    let mut b_padded = b.to_vec();
    b_padded.resize(work.global, 0.0);
    backend.upload(&b_padded, &b_buf)?;

    let report = ping_pong(
        backend,
        &x_old,
        &x_new,
        &partials,
        n,
        work,
        params,
        |src, dst| backend.jacobi_step(&a_buf, &b_buf, src, dst, n, work),
    )?;

    let mut x = backend.download(&x_old, work.global)?;
    x.truncate(n);

    tracing::info!(
        status = ?report.status,
        iterations = report.iterations,
        residual = report.residual,
        "linear solve finished"
    );
    Ok(LinearSolution { x, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::convergence::SolveStatus;
    use crate::solver::cpu::CpuBackend;
    use approx::assert_abs_diff_eq;

    fn solve(a: &DenseMatrix, b: &[f64]) -> LinearSolution {
        solve_linear(&CpuBackend::new(), a, b, &IterationParams::linear()).unwrap()
    }

    #[test]
    fn known_2x2() {
        // 2x + 3y = 6, 4x + 9y = 15 => x = 1.5, y = 1.0
        let a = DenseMatrix::from_rows(&[[2.0, 3.0], [4.0, 9.0]]).unwrap();
        let sol = solve(&a, &[6.0, 15.0]);
        assert_eq!(sol.report.status, SolveStatus::Converged);
        assert_abs_diff_eq!(sol.x[0], 1.5, epsilon = 1e-8);
        assert_abs_diff_eq!(sol.x[1], 1.0, epsilon = 1e-8);
    }

    #[test]
    fn one_by_one_is_exact_after_first_iteration() {
        let a = DenseMatrix::from_rows(&[[5.0]]).unwrap();
        let sol = solve(&a, &[15.0]);
        assert_eq!(sol.x, vec![3.0]);
        assert_eq!(sol.report.status, SolveStatus::Converged);
        assert_eq!(sol.report.iterations, 1);
        assert_eq!(sol.report.residual, 0.0);
    }

    #[test]
    fn padding_is_discarded() {
        // n = 5 with group size 4 pads to 8 elements.
        let backend = CpuBackend::new().with_group_size(4);
        let mut rows = vec![vec![0.0; 5]; 5];
        for (i, row) in rows.iter_mut().enumerate() {
            row[i] = 4.0;
            if i > 0 {
                row[i - 1] = -1.0;
            }
            if i < 4 {
                row[i + 1] = -1.0;
            }
        }
        let a = DenseMatrix::from_rows(&rows).unwrap();
        let expected = [1.0, -2.0, 3.0, 0.5, 2.0];
        let b = a.matvec(&expected);
        let sol = solve_linear(&backend, &a, &b, &IterationParams::linear()).unwrap();
        assert_eq!(sol.x.len(), 5);
        assert!(sol.report.converged());
        for i in 0..5 {
            assert_abs_diff_eq!(sol.x[i], expected[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn rejects_bad_input() {
        let backend = CpuBackend::new();
        let params = IterationParams::linear();
        let a = DenseMatrix::from_rows(&[[1.0, 0.0], [0.0, 1.0]]).unwrap();
        let err = solve_linear(&backend, &a, &[1.0], &params).unwrap_err();
        assert!(err.to_string().contains("dimension"), "got: {err}");

        let zero_diag = DenseMatrix::from_rows(&[[0.0, 1.0], [1.0, 1.0]]).unwrap();
        let err = solve_linear(&backend, &zero_diag, &[1.0, 1.0], &params).unwrap_err();
        assert!(err.to_string().contains("zero diagonal"), "got: {err}");

        let empty = DenseMatrix::zeros(0, 0);
        assert!(solve_linear(&backend, &empty, &[], &params).is_err());

        let rect = DenseMatrix::zeros(2, 3);
        assert!(solve_linear(&backend, &rect, &[1.0, 1.0], &params).is_err());

        let err = solve_linear(&backend, &a, &[f64::NAN, 1.0], &params).unwrap_err();
        assert!(matches!(err, JacobiError::InvalidInput(_)));
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn rejects_inconsistent_matrix_storage() {
        let backend = CpuBackend::new();
        let short = DenseMatrix {
            nrows: 2,
            ncols: 2,
            values: vec![4.0, 1.0, 1.0],
        };
        let err = solve_linear(&backend, &short, &[1.0, 1.0], &IterationParams::linear())
            .unwrap_err();
        assert!(matches!(err, JacobiError::InvalidInput(_)), "got {err:?}");
        assert!(err.to_string().contains("storage"), "got: {err}");

        let long = DenseMatrix {
            nrows: 1,
            ncols: 1,
            values: vec![2.0, 3.0],
        };
        assert!(solve_linear(&backend, &long, &[1.0], &IterationParams::linear()).is_err());
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn non_dominant_system_reaches_cap() {
        // Spectral radius of the iteration matrix is sqrt(6) > 1.
        let a = DenseMatrix::from_rows(&[[1.0, 2.0], [3.0, 1.0]]).unwrap();
        let sol = solve(&a, &[1.0, 1.0]);
        assert_eq!(sol.report.status, SolveStatus::ReachedCap);
        assert_eq!(sol.report.iterations, 100);
        assert_eq!(sol.report.sweeps, 200);
        assert!(!sol.report.converged());
    }

    #[test]
    fn overflowing_system_is_diverged() {
        let a = DenseMatrix::from_rows(&[[1.0, 100.0], [100.0, 1.0]]).unwrap();
        let sol = solve(&a, &[1.0, 1.0]);
        assert_eq!(sol.report.status, SolveStatus::Diverged);
        assert!(sol.report.iterations < 100);
    }

    #[test]
    fn allocation_failure_releases_earlier_buffers() {
        // The 4x4 matrix buffer (16 elements) exceeds the limit after both
        // iterate buffers have been allocated.
        let backend = CpuBackend::new().with_max_buffer_len(10);
        let a = DenseMatrix::identity(4);
        let err = solve_linear(&backend, &a, &[1.0; 4], &IterationParams::linear()).unwrap_err();
        assert!(matches!(err, JacobiError::Allocation(_)), "got {err:?}");
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn buffers_released_after_success() {
        let backend = CpuBackend::new();
        let a = DenseMatrix::identity(3);
        let sol = solve_linear(&backend, &a, &[1.0, 2.0, 3.0], &IterationParams::linear()).unwrap();
        assert_eq!(sol.x, vec![1.0, 2.0, 3.0]);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn custom_params_are_honored() {
        let a = DenseMatrix::from_rows(&[[2.0, 3.0], [4.0, 9.0]]).unwrap();
        let params = IterationParams {
            max_iterations: 3,
            tolerance: 1e-30,
        };
        let sol = solve_linear(&CpuBackend::new(), &a, &[6.0, 15.0], &params).unwrap();
        assert_eq!(sol.report.status, SolveStatus::ReachedCap);
        assert_eq!(sol.report.sweeps, 6);
        assert!(sol.report.residual > 0.0);
    }
}
