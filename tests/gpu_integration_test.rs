//! Integration tests comparing the GPU and host backends on the same problems.
//!
//! Note: the GPU kernels run in f32, so comparisons use loose tolerances and
//! linear solves are not required to reach the 1e-20 residual threshold.

use approx::assert_abs_diff_eq;
use jacobi_spline::solver::{CpuBackend, JacobiBackend, SolveStatus, Solver, WgpuBackend};
use jacobi_spline::DenseMatrix;

fn gpu_available() -> bool {
    WgpuBackend::new().is_ok()
}

macro_rules! skip_if_no_gpu {
    () => {
        if !gpu_available() {
            eprintln!("Skipping: no GPU available");
            return;
        }
    };
}

fn gpu_solver() -> Solver<WgpuBackend> {
    Solver::new(WgpuBackend::new().expect("GPU backend init failed"))
}

fn cpu_solver() -> Solver<CpuBackend> {
    Solver::new(CpuBackend::new())
}

fn tridiagonal(n: usize) -> DenseMatrix {
    let mut a = DenseMatrix::zeros(n, n);
    for i in 0..n {
        a.values[i * n + i] = 4.0;
        if i > 0 {
            a.values[i * n + i - 1] = -1.0;
        }
        if i + 1 < n {
            a.values[i * n + i + 1] = -1.0;
        }
    }
    a
}

#[test]
fn test_gpu_2x2() {
    skip_if_no_gpu!();
    let a = DenseMatrix::from_rows(&[[2.0, 3.0], [4.0, 9.0]]).unwrap();
    let sol = gpu_solver().solve(&a, &[6.0, 15.0]).unwrap();
    assert_ne!(sol.report.status, SolveStatus::Diverged);
    assert_abs_diff_eq!(sol.x[0], 1.5, epsilon = 1e-4);
    assert_abs_diff_eq!(sol.x[1], 1.0, epsilon = 1e-4);
}

#[test]
fn test_gpu_matches_cpu_4x4() {
    skip_if_no_gpu!();
    let a = DenseMatrix::from_rows(&[
        [10.0, -1.0, 2.0, 0.0],
        [-1.0, 11.0, -1.0, 3.0],
        [2.0, -1.0, 10.0, -1.0],
        [0.0, 3.0, -1.0, 8.0],
    ])
    .unwrap();
    let b = [6.0, 25.0, -11.0, 15.0];
    let gpu = gpu_solver().solve(&a, &b).unwrap();
    let cpu = cpu_solver().solve(&a, &b).unwrap();
    for (g, c) in gpu.x.iter().zip(&cpu.x) {
        assert_abs_diff_eq!(*g, *c, epsilon = 1e-4);
    }
}

#[test]
fn test_gpu_single_unknown() {
    skip_if_no_gpu!();
    let a = DenseMatrix::from_rows(&[[4.0]]).unwrap();
    let sol = gpu_solver().solve(&a, &[2.0]).unwrap();
    assert_eq!(sol.x.len(), 1);
    assert_abs_diff_eq!(sol.x[0], 0.5, epsilon = 1e-6);
    assert_eq!(sol.report.iterations, 1);
}

#[test]
fn test_gpu_padded_multi_group() {
    skip_if_no_gpu!();
    // 100 unknowns span two work groups of 64.
    let a = tridiagonal(100);
    let expected: Vec<f64> = (0..100).map(|i| (i as f64 * 0.1).cos()).collect();
    let b = a.matvec(&expected);
    let sol = gpu_solver().solve(&a, &b).unwrap();
    assert_eq!(sol.x.len(), 100);
    for (xi, ei) in sol.x.iter().zip(&expected) {
        assert_abs_diff_eq!(*xi, *ei, epsilon = 1e-4);
    }
}

#[test]
fn test_gpu_spline_matches_cpu() {
    skip_if_no_gpu!();
    let y: Vec<f64> = (0..80).map(|k| (k as f64 * 0.2).sin()).collect();
    let gpu = gpu_solver().solve_spline(&y, 0.2).unwrap();
    let cpu = cpu_solver().solve_spline(&y, 0.2).unwrap();
    assert!(gpu.report.converged());
    let gc = gpu.interpolator.second_derivatives();
    let cc = cpu.interpolator.second_derivatives();
    assert_eq!(gc[0], 0.0);
    assert_eq!(gc[79], 0.0);
    for (g, c) in gc.iter().zip(cc) {
        assert_abs_diff_eq!(*g, *c, epsilon = 1e-3);
    }
    for x in [0.0, 1.3, 7.77, 15.8] {
        assert_abs_diff_eq!(
            gpu.interpolator.evaluate(x).unwrap(),
            cpu.interpolator.evaluate(x).unwrap(),
            epsilon = 1e-3
        );
    }
}

#[test]
fn test_gpu_counts_dispatches_and_readbacks() {
    skip_if_no_gpu!();
    let solver = gpu_solver();
    let a = DenseMatrix::identity(3);
    let sol = solver.solve(&a, &[1.0, 2.0, 3.0]).unwrap();
    let backend = solver.backend();
    // init, then two sweeps and one difference per iteration.
    assert_eq!(backend.dispatch_count() as usize, 1 + 3 * sol.report.iterations);
    assert_eq!(backend.readback_count() as usize, sol.report.iterations + 1);
}

#[test]
fn test_gpu_backend_is_reusable() {
    skip_if_no_gpu!();
    let solver = gpu_solver();
    for n in [1, 5, 64, 65] {
        let a = tridiagonal(n);
        let b = vec![2.0; n];
        let sol = solver.solve(&a, &b).unwrap();
        assert_eq!(sol.x.len(), n);
        assert!(sol.x.iter().all(|v| v.is_finite()));
    }
}
