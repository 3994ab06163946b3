//! Run-length encoding of value rows.
//!
//! Maximal runs of equal adjacent values are written as `<count>x<value>`
//! tokens separated by single spaces. A bare `<value>` token means a run of
//! one. Values are written in Rust's shortest round-trip float notation, so
//! decoding reproduces every value bit for bit:
//!
//! ```text
//! [3.0, 3.0, 4.2, 2.0, 2.0, 2.0]  <->  "2x3.0 1x4.2 3x2.0"
//! ```
//!
//! The empty row encodes as the empty string and back.

use crate::error::{GridError, Result};

/// Compress a row of values.
///
/// Runs are decided by bit equality, so `0.0` and `-0.0` are kept apart and
/// the round trip stays exact.
pub fn compress(values: &[f64]) -> String {
    let mut out = String::new();
    let Some((&first, rest)) = values.split_first() else {
        return out;
    };

    let mut current = first;
    let mut count = 1usize;

    for &value in rest {
        if value.to_bits() == current.to_bits() {
            count += 1;
        } else {
            push_run(&mut out, count, current);
            current = value;
            count = 1;
        }
    }
    push_run(&mut out, count, current);

    out
}

fn push_run(out: &mut String, count: usize, value: f64) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(&format!("{}x{:?}", count, value));
}

/// Decompress a run-length encoded row.
pub fn decompress(text: &str) -> Result<Vec<f64>> {
    let mut values = Vec::new();
    decompress_into(text, &mut values, usize::MAX)?;
    Ok(values)
}

/// Decompress a row, appending to `out`. Returns the number of values added.
///
/// Fails before expanding a run that would take the row past `max` values.
pub fn decompress_into(text: &str, out: &mut Vec<f64>, max: usize) -> Result<usize> {
    let mut added = 0usize;

    for token in text.split_ascii_whitespace() {
        let (count, value) = match token.split_once('x') {
            Some((count, value)) => {
                let count: usize = count.parse().map_err(|_| {
                    GridError::format(format!("invalid run count in '{}'", token))
                })?;
                (count, value)
            }
            None => (1, token),
        };

        if count == 0 {
            return Err(GridError::format(format!("zero-length run '{}'", token)));
        }

        let value: f64 = value
            .parse()
            .map_err(|_| GridError::format(format!("invalid run value in '{}'", token)))?;

        added = match added.checked_add(count) {
            Some(total) if total <= max => total,
            _ => {
                return Err(GridError::format(format!(
                    "run '{}' exceeds the row length of {} values",
                    token, max
                )))
            }
        };
        out.extend(std::iter::repeat(value).take(count));
    }

    Ok(added)
}
