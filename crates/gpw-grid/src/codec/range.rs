//! Range encoding of strictly increasing integer sequences.
//!
//! Runs of consecutive integers collapse to one half-open interval written as
//! `lower,upper` (lower inclusive, upper exclusive). Intervals are separated by
//! single spaces:
//!
//! ```text
//! [0, 1, 3, 4, 5, 8]  <->  "0,2 3,6 8,9"
//! ```

use crate::error::{GridError, Result};

/// Compress a strictly increasing, duplicate-free sequence.
///
/// # Panics
///
/// Panics if `values` is empty or not strictly increasing. Callers only ever
/// pass column lists collected in scan order.
pub fn compress(values: &[usize]) -> String {
    assert!(!values.is_empty(), "cannot range-compress an empty sequence");

    let mut out = String::new();
    let mut lower = values[0];
    let mut prev = values[0];

    for &value in &values[1..] {
        assert!(
            value > prev,
            "range compression needs strictly increasing input ({} after {})",
            value,
            prev
        );
        if value != prev + 1 {
            push_range(&mut out, lower, prev + 1);
            lower = value;
        }
        prev = value;
    }
    push_range(&mut out, lower, prev + 1);

    out
}

fn push_range(out: &mut String, lower: usize, upper: usize) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(&lower.to_string());
    out.push(',');
    out.push_str(&upper.to_string());
}

/// Decompress a space-separated range string.
pub fn decompress(text: &str) -> Result<Vec<usize>> {
    decompress_tokens(text.split_ascii_whitespace())
}

/// Decompress already-split `lower,upper` tokens.
///
/// Ranges must be non-empty and sorted without overlap, so the output is
/// always strictly increasing.
pub fn decompress_tokens<'a, I>(tokens: I) -> Result<Vec<usize>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut values = Vec::new();
    let mut floor = 0usize;

    for token in tokens {
        let (lower, upper) = parse_range(token)?;
        if lower < floor {
            return Err(GridError::format(format!(
                "range '{}' overlaps or precedes the previous range",
                token
            )));
        }
        values.extend(lower..upper);
        floor = upper;
    }

    Ok(values)
}

fn parse_range(token: &str) -> Result<(usize, usize)> {
    let (lower, upper) = token
        .split_once(',')
        .ok_or_else(|| GridError::format(format!("range token '{}' has no comma", token)))?;

    let lower: usize = lower
        .parse()
        .map_err(|_| GridError::format(format!("invalid range lower bound in '{}'", token)))?;
    let upper: usize = upper
        .parse()
        .map_err(|_| GridError::format(format!("invalid range upper bound in '{}'", token)))?;

    if upper <= lower {
        return Err(GridError::format(format!("empty range '{}'", token)));
    }

    Ok((lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_examples() {
        assert_eq!(compress(&[0, 1, 3, 4, 5, 8]), "0,2 3,6 8,9");
        assert_eq!(
            compress(&[0, 3, 4, 5, 8, 9, 13, 14, 15]),
            "0,1 3,6 8,10 13,16"
        );
        assert_eq!(compress(&[7]), "7,8");
    }

    #[test]
    fn test_decompress_examples() {
        assert_eq!(decompress("0,2 3,6 8,9").unwrap(), vec![0, 1, 3, 4, 5, 8]);
        assert_eq!(
            decompress_tokens(["0,1", "3,6", "8,10", "13,16"]).unwrap(),
            vec![0, 3, 4, 5, 8, 9, 13, 14, 15]
        );
        assert!(decompress("").unwrap().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let cases: Vec<Vec<usize>> = vec![
            vec![0],
            vec![10799],
            (0..100).collect(),
            vec![1, 3, 5, 7],
            vec![2, 3, 4, 100, 101, 5000],
        ];
        for case in cases {
            assert_eq!(decompress(&compress(&case)).unwrap(), case);
        }
    }

    #[test]
    fn test_decompress_rejects_malformed() {
        assert!(decompress("3").unwrap_err().is_format());
        assert!(decompress("a,4").unwrap_err().is_format());
        assert!(decompress("4,4").unwrap_err().is_format());
        assert!(decompress("5,3").unwrap_err().is_format());
        assert!(decompress("0,5 3,8").unwrap_err().is_format());
        assert!(decompress("6,8 0,2").unwrap_err().is_format());
    }

    #[test]
    #[should_panic(expected = "empty sequence")]
    fn test_compress_empty_panics() {
        compress(&[]);
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn test_compress_duplicates_panics() {
        compress(&[1, 2, 2, 3]);
    }
}
