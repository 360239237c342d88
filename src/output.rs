//! Results output formatting (CSV).

use crate::error::Result;
use crate::interpolant::Interpolator;
use crate::solver::convergence::{ConvergenceReport, SolveStatus};
use std::io::Write;

/// Write a solution vector as CSV.
///
/// Format:
/// ```csv
/// Index,Value
/// 0,1.5
/// 1,1
/// ```
pub fn write_solution_csv<W: Write>(x: &[f64], writer: &mut W) -> Result<()> {
    writeln!(writer, "Index,Value")?;
    for (i, value) in x.iter().enumerate() {
        writeln!(writer, "{},{}", i, value)?;
    }
    Ok(())
}

/// Write `samples` evenly spaced evaluations of the spline as CSV.
///
/// Format:
/// ```csv
/// x,value
/// 0,0
/// 0.5,0.6875
/// ```
pub fn write_spline_csv<W: Write>(
    spline: &Interpolator,
    samples: usize,
    writer: &mut W,
) -> Result<()> {
    writeln!(writer, "x,value")?;
    for (x, value) in spline.sample(samples) {
        writeln!(writer, "{},{}", x, value)?;
    }
    Ok(())
}

/// One-line summary of how an iteration ended.
pub fn write_convergence_summary<W: Write>(report: &ConvergenceReport, writer: &mut W) -> Result<()> {
    let status = match report.status {
        SolveStatus::Converged => "converged",
        SolveStatus::ReachedCap => "reached iteration cap",
        SolveStatus::Diverged => "diverged",
    };
    writeln!(
        writer,
        "{} after {} iterations ({} sweeps), residual {:e}",
        status, report.iterations, report.sweeps, report.residual
    )?;
    Ok(())
}
