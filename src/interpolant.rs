//! Closed-form natural cubic spline evaluated from converged coefficients.
//!
//! Knots sit at `x_k = k * h` for `k` in `0..n`. Segment `i` (for `i` in
//! `1..n`) spans `[(i - 1) h, i h]` and is evaluated as
//!
//! ```text
//! S(x) = c[i] / (6h) (x - lo)^3 + c[i-1] / (6h) (hi - x)^3 + b[i] (x - (lo + hi) / 2) + a[i]
//! ```
//!
//! where `c` are the second derivatives at the knots.

use crate::error::{JacobiError, Result};

/// Host-side spline built from `(a, b, c, h)`. Holds no device resources.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolator {
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    h: f64,
}

impl Interpolator {
    pub fn new(a: Vec<f64>, b: Vec<f64>, c: Vec<f64>, h: f64) -> Result<Self> {
        let n = c.len();
        if a.len() != n || b.len() != n {
            return Err(JacobiError::InvalidState(format!(
                "coefficient length mismatch: a={}, b={}, c={}",
                a.len(),
                b.len(),
                n
            )));
        }
        if n < 2 {
            return Err(JacobiError::InvalidState(format!(
                "spline needs at least 2 knots, got {n}"
            )));
        }
        if !(h.is_finite() && h > 0.0) {
            return Err(JacobiError::InvalidState(format!("invalid knot spacing {h}")));
        }
        if let Some(v) = a.iter().chain(&b).chain(&c).find(|v| !v.is_finite()) {
            return Err(JacobiError::InvalidState(format!(
                "non-finite spline coefficient {v}"
            )));
        }
        Ok(Self { a, b, c, h })
    }

    pub fn knot_count(&self) -> usize {
        self.c.len()
    }

    pub fn spacing(&self) -> f64 {
        self.h
    }

    /// Closed interval covered by the knots.
    pub fn domain(&self) -> (f64, f64) {
        (0.0, (self.knot_count() - 1) as f64 * self.spacing())
    }

    /// Second derivative at each knot.
    pub fn second_derivatives(&self) -> &[f64] {
        &self.c
    }

    /// Segment index and its `(lo, hi)` bounds for `x`.
    ///
    /// The right end of the domain belongs to the last segment.
    fn segment(&self, x: f64) -> Result<(usize, f64, f64)> {
        let (lower, upper) = self.domain();
        if !(lower..=upper).contains(&x) {
            return Err(JacobiError::OutOfRange { x, lower, upper });
        }
        let i = ((x / self.h).floor() as usize + 1).min(self.knot_count() - 1);
        let lo = (i - 1) as f64 * self.h;
        Ok((i, lo, lo + self.h))
    }

    /// Spline value at `x`.
    pub fn evaluate(&self, x: f64) -> Result<f64> {
        let (i, lo, hi) = self.segment(x)?;
        let h6 = 6.0 * self.h;
        Ok(self.c[i] / h6 * (x - lo).powi(3)
            + self.c[i - 1] / h6 * (hi - x).powi(3)
            + self.b[i] * (x - (lo + hi) / 2.0)
            + self.a[i])
    }

    /// First derivative at `x`.
    pub fn derivative(&self, x: f64) -> Result<f64> {
        let (i, lo, hi) = self.segment(x)?;
        let h2 = 2.0 * self.h;
        Ok(self.c[i] / h2 * (x - lo).powi(2) - self.c[i - 1] / h2 * (hi - x).powi(2) + self.b[i])
    }

    /// Second derivative at `x`, linear between knot values.
    pub fn second_derivative(&self, x: f64) -> Result<f64> {
        let (i, lo, hi) = self.segment(x)?;
        Ok((self.c[i] * (x - lo) + self.c[i - 1] * (hi - x)) / self.h)
    }

    /// `count` evenly spaced `(x, S(x))` pairs covering the whole domain.
    pub fn sample(&self, count: usize) -> Vec<(f64, f64)> {
        let (lower, upper) = self.domain();
        let step = if count > 1 {
            (upper - lower) / (count - 1) as f64
        } else {
            0.0
        };
        (0..count)
            .map(|k| {
                // Pin the last sample to the domain end against rounding.
                let x = if count > 1 && k == count - 1 {
                    upper
                } else {
                    lower + k as f64 * step
                };
                (x, self.evaluate(x).unwrap_or(f64::NAN))
            })
            .collect()
    }
}
