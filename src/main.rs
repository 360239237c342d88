use clap::{Parser, Subcommand};
use jacobi_spline::error::Result;
use jacobi_spline::output;
use jacobi_spline::parser;
use jacobi_spline::solver::{CpuBackend, IterationParams, JacobiBackend, Solver, WgpuBackend};
use jacobi_spline::stats::Stats;
use std::io;

/// GPU Jacobi solver for dense linear systems and natural cubic splines
#[derive(Parser)]
#[command(name = "jacobi-spline", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Use the host backend instead of the GPU
    #[arg(long, global = true)]
    cpu: bool,

    /// Print performance stats to stderr
    #[arg(long, global = true)]
    stats: bool,

    /// Override the iteration cap
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    /// Override the convergence tolerance (summed squared difference).
    ///
    /// The GPU backend iterates in f32, where successive iterates can keep
    /// differing by one ulp; the default linear tolerance of 1e-20 is then
    /// only reachable with --cpu, and GPU solves report the iteration cap.
    /// Use a tolerance around 1e-10 for GPU linear solves.
    #[arg(long, global = true)]
    tolerance: Option<f64>,
}

#[derive(Subcommand)]
enum Command {
    /// Solve a dense system `A x = b` read from FILE
    Solve {
        /// System file, one `a_1 ... a_n | b` row per line
        file: String,
    },
    /// Fit a natural cubic spline through uniformly spaced knots read from FILE
    Spline {
        /// Knot values separated by whitespace or commas
        file: String,

        /// Distance between consecutive knots
        #[arg(long, default_value_t = 1.0)]
        spacing: f64,

        /// Number of evenly spaced output samples
        #[arg(long, default_value_t = 101)]
        samples: usize,
    },
}

impl Cli {
    fn params(&self, defaults: IterationParams) -> IterationParams {
        IterationParams {
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            tolerance: self.tolerance.unwrap_or(defaults.tolerance),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut stats = if cli.stats { Some(Stats::new()) } else { None };

    let outcome = if cli.cpu {
        if let Some(s) = stats.as_mut() {
            s.backend_name = "cpu".into();
        }
        run(&cli, CpuBackend::new(), stats.as_mut())
    } else {
        let backend = WgpuBackend::new().unwrap_or_else(|e| {
            eprintln!("GPU backend error: {}", e);
            std::process::exit(1);
        });
        if let Some(s) = stats.as_mut() {
            s.backend_name = backend.adapter_name().to_string();
        }
        run(&cli, backend, stats.as_mut())
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Some(ref stats) = stats {
        stats.display();
    }
}

fn run<B: JacobiBackend>(cli: &Cli, backend: B, mut stats: Option<&mut Stats>) -> Result<()> {
    let solver = Solver::new(backend)
        .with_linear_params(cli.params(IterationParams::linear()))
        .with_spline_params(cli.params(IterationParams::spline()));
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();

    match &cli.command {
        Command::Solve { file } => {
            let input = std::fs::read_to_string(file)?;
            let (a, b) = timed(&mut stats, "Parse", || parser::parse_system(&input))?;
            let solution = timed(&mut stats, "Linear solve", || solver.solve(&a, &b))?;
            output::write_solution_csv(&solution.x, &mut stdout)?;
            output::write_convergence_summary(&solution.report, &mut stderr)?;
            if let Some(s) = stats.as_deref_mut() {
                s.record_report(&solution.report);
            }
        }
        Command::Spline {
            file,
            spacing,
            samples,
        } => {
            let input = std::fs::read_to_string(file)?;
            let knots = timed(&mut stats, "Parse", || parser::parse_knots(&input))?;
            let solution =
                timed(&mut stats, "Spline solve", || solver.solve_spline(&knots, *spacing))?;
            output::write_spline_csv(&solution.interpolator, *samples, &mut stdout)?;
            output::write_convergence_summary(&solution.report, &mut stderr)?;
            if let Some(s) = stats.as_deref_mut() {
                s.record_report(&solution.report);
            }
        }
    }

    if let Some(s) = stats {
        s.record_backend(solver.backend());
    }
    Ok(())
}

fn timed<T>(stats: &mut Option<&mut Stats>, name: &'static str, f: impl FnOnce() -> T) -> T {
    match stats.as_deref_mut() {
        Some(s) => s.time(name, f),
        None => f(),
    }
}
