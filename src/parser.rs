//! Plain-text input parsers for the command-line tool.
//!
//! # Linear systems
//!
//! ```text
//! # comment
//! 10 -1  2 |  6
//! -1 11 -1 | 25
//!  2 -1 10 | -11
//! ```
//!
//! One row per line: the matrix coefficients, a `|`, then the right-hand side
//! entry. Every row must have the same number of coefficients as there are rows.
//!
//! # Knots
//!
//! Knot values separated by whitespace and/or commas, any number per line.
//!
//! Everything after a `#` is ignored in both formats.

use nom::branch::alt;
use nom::character::complete::{char, space0, space1};
use nom::combinator::{eof, recognize};
use nom::multi::separated_list1;
use nom::number::complete::double;
use nom::IResult;
use nom::Parser;

use crate::dense::DenseMatrix;
use crate::error::{JacobiError, Result};

/// Parse a dense system into its matrix and right-hand side.
pub fn parse_system(input: &str) -> Result<(DenseMatrix, Vec<f64>)> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut rhs = Vec::new();

    for (line_num, raw_line) in input.lines().enumerate() {
        let line = strip_comment(raw_line);
        if line.is_empty() {
            continue;
        }

        let (coeffs, b) = system_row(line).map_err(|e| parse_err(line_num, raw_line, &e))?;
        if let Some(first) = rows.first() {
            if coeffs.len() != first.len() {
                return Err(parse_err(
                    line_num,
                    raw_line,
                    &format!("expected {} coefficients, found {}", first.len(), coeffs.len()),
                ));
            }
        }
        rows.push(coeffs);
        rhs.push(b);
    }

    if rows.is_empty() {
        return Err(JacobiError::Parse("no equations found".into()));
    }
    if rows[0].len() != rows.len() {
        return Err(JacobiError::Parse(format!(
            "system is not square: {} equations with {} coefficients each",
            rows.len(),
            rows[0].len()
        )));
    }

    let matrix = DenseMatrix::from_rows(&rows)?;
    Ok((matrix, rhs))
}

/// Parse a list of knot values.
pub fn parse_knots(input: &str) -> Result<Vec<f64>> {
    let mut knots = Vec::new();
    for (line_num, raw_line) in input.lines().enumerate() {
        let line = strip_comment(raw_line);
        if line.is_empty() {
            continue;
        }
        let values = knot_line(line).map_err(|e| parse_err(line_num, raw_line, &e))?;
        knots.extend(values);
    }
    if knots.is_empty() {
        return Err(JacobiError::Parse("no knot values found".into()));
    }
    Ok(knots)
}

fn parse_err(line_num: usize, raw_line: &str, detail: &str) -> JacobiError {
    JacobiError::Parse(format!("line {}: {} in: {}", line_num + 1, detail, raw_line))
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => line[..pos].trim(),
        None => line.trim(),
    }
}

// ---------------------------------------------------------------------------
// Token parsers
// ---------------------------------------------------------------------------

/// Whitespace-separated coefficients.
fn coefficients(input: &str) -> IResult<&str, Vec<f64>> {
    separated_list1(space1, double).parse(input)
}

/// A comma with optional surrounding blanks, or plain blanks.
fn knot_separator(input: &str) -> IResult<&str, &str> {
    alt((recognize((space0, char(','), space0)), space1)).parse(input)
}

/// Parse a line like: a_1 a_2 ... a_n | b
fn system_row(line: &str) -> std::result::Result<(Vec<f64>, f64), String> {
    let (_, (coeffs, _, _, _, b, _, _)) = (
        coefficients,
        space0,
        char('|'),
        space0,
        double,
        space0,
        eof,
    )
        .parse(line)
        .map_err(|_| "expected 'a_1 ... a_n | b'".to_string())?;
    Ok((coeffs, b))
}

fn knot_line(line: &str) -> std::result::Result<Vec<f64>, String> {
    let (_, (values, _, _)) = (separated_list1(knot_separator, double), space0, eof)
        .parse(line)
        .map_err(|_| "expected numeric knot values".to_string())?;
    Ok(values)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
