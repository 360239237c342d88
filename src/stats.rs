//! Performance statistics collection for `--stats` output.

use std::time::{Duration, Instant};

use crate::solver::convergence::ConvergenceReport;
use crate::solver::JacobiBackend;

/// Collects phase timings and solver counters.
///
/// Created when `--stats` is passed, threaded as `Option<&mut Stats>`.
pub struct Stats {
    total_start: Instant,
    phases: Vec<(&'static str, Duration)>,
    pub backend_name: String,
    pub iterations: usize,
    pub sweeps: usize,
    pub residual: Option<f64>,
    pub dispatches: u32,
    pub readbacks: u32,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_start: Instant::now(),
            phases: Vec::new(),
            backend_name: String::new(),
            iterations: 0,
            sweeps: 0,
            residual: None,
            dispatches: 0,
            readbacks: 0,
        }
    }

    /// Record a completed phase with its duration.
    pub fn add_phase(&mut self, name: &'static str, duration: Duration) {
        self.phases.push((name, duration));
    }

    /// Time `f` as a named phase.
    pub fn time<T>(&mut self, name: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.add_phase(name, start.elapsed());
        out
    }

    pub fn record_report(&mut self, report: &ConvergenceReport) {
        self.iterations += report.iterations;
        self.sweeps += report.sweeps;
        self.residual = Some(report.residual);
    }

    /// Snapshot the backend's dispatch and readback counters.
    pub fn record_backend<B: JacobiBackend>(&mut self, backend: &B) {
        self.dispatches = backend.dispatch_count();
        self.readbacks = backend.readback_count();
    }

    pub fn phases(&self) -> &[(&'static str, Duration)] {
        &self.phases
    }

    /// Print the stats table to stderr.
    pub fn display(&self) {
        let total = self.total_start.elapsed();
        eprintln!();
        eprintln!("=== Jacobi Solver Stats ===");
        if !self.backend_name.is_empty() {
            eprintln!("  Backend:                {}", self.backend_name);
        }

        for (name, dur) in &self.phases {
            eprintln!("  {:<24} {:>8.3}s", name, dur.as_secs_f64());
        }

        eprintln!("  Iterations:             {}", self.iterations);
        eprintln!("  Sweeps:                 {}", self.sweeps);
        if let Some(residual) = self.residual {
            eprintln!("  Final residual:         {:e}", residual);
        }

        eprintln!("  ─────────────────────────────────");
        eprintln!("  Total:                  {:>8.3}s", total.as_secs_f64());
        eprintln!("  Dispatches:             {}", self.dispatches);
        eprintln!("  Readbacks:              {}", self.readbacks);
    }
}
