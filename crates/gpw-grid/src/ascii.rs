//! Streaming reader for raw ESRI ASCII grid tiles.
//!
//! Each tile starts with a fixed six line header:
//!
//! ```text
//! ncols         10800
//! nrows         10800
//! xllcorner     -180
//! yllcorner     0
//! cellsize      0.0083333333333333
//! NODATA_value  -9999
//! ```
//!
//! followed by exactly `nrows` lines of exactly `ncols` tokens separated by
//! single spaces. The reader is strictly forward-only: rows are consumed in
//! order and any structural deviation is reported as a format error with the
//! tile label and row number attached.

use std::io::BufRead;

use crate::error::{GridError, Result};

/// Parsed six line tile header.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiHeader {
    pub ncols: usize,
    pub nrows: usize,
    pub xllcorner: f64,
    pub yllcorner: f64,
    pub cellsize: f64,
    pub nodata_value: f64,
}

impl AsciiHeader {
    /// Number of header lines preceding the data rows.
    pub const LINES: usize = 6;

    /// Parse the header from the first six lines of a tile.
    pub fn read<R: BufRead>(reader: &mut R, label: &str) -> Result<Self> {
        let mut line = String::new();
        let mut fields = [0.0f64; Self::LINES];
        let keys: [&[&str]; Self::LINES] = [
            &["ncols"],
            &["nrows"],
            &["xllcorner", "xllcenter"],
            &["yllcorner", "yllcenter"],
            &["cellsize"],
            &["nodata_value"],
        ];

        for (slot, accepted) in fields.iter_mut().zip(keys) {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(GridError::format(format!(
                    "{}: unexpected end of file in header",
                    label
                )));
            }

            let mut parts = line.split_ascii_whitespace();
            let (key, value) = match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => (key, value),
                _ => {
                    return Err(GridError::format(format!(
                        "{}: malformed header line '{}'",
                        label,
                        line.trim_end()
                    )))
                }
            };

            if !accepted.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                return Err(GridError::format(format!(
                    "{}: expected header key '{}', found '{}'",
                    label, accepted[0], key
                )));
            }

            *slot = value.parse().map_err(|_| {
                GridError::format(format!("{}: invalid value for '{}': '{}'", label, key, value))
            })?;
        }

        let dimension = |value: f64, name: &str| -> Result<usize> {
            if value < 1.0 || value.fract() != 0.0 {
                return Err(GridError::format(format!(
                    "{}: {} must be a positive integer, got {}",
                    label, name, value
                )));
            }
            Ok(value as usize)
        };

        Ok(Self {
            ncols: dimension(fields[0], "ncols")?,
            nrows: dimension(fields[1], "nrows")?,
            xllcorner: fields[2],
            yllcorner: fields[3],
            cellsize: fields[4],
            nodata_value: fields[5],
        })
    }
}

/// Forward-only row reader over one raw tile.
///
/// Dropping the reader closes the underlying file, including when a scan is
/// aborted by an error.
pub struct TileReader<R> {
    reader: R,
    header: AsciiHeader,
    label: String,
    line: String,
    rows_read: usize,
    trailing_separator: bool,
}

impl<R: BufRead> TileReader<R> {
    /// Read the header and position the reader at the first data row.
    pub fn new(mut reader: R, label: impl Into<String>, trailing_separator: bool) -> Result<Self> {
        let label = label.into();
        let header = AsciiHeader::read(&mut reader, &label)?;
        Ok(Self {
            reader,
            header,
            label,
            line: String::new(),
            rows_read: 0,
            trailing_separator,
        })
    }

    /// The parsed header.
    pub fn header(&self) -> &AsciiHeader {
        &self.header
    }

    /// Label used in error messages (usually the tile id and dataset).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of data rows consumed so far.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Fail unless the tile is `size × size` cells.
    pub fn expect_shape(&self, size: usize) -> Result<()> {
        if self.header.ncols != size || self.header.nrows != size {
            return Err(GridError::format(format!(
                "{}: expected {}x{} cells, header says {}x{}",
                self.label, size, size, self.header.ncols, self.header.nrows
            )));
        }
        Ok(())
    }

    /// Read and validate the next row, returning its tokens joined by single
    /// spaces (no newline, no trailing separator).
    pub fn read_row(&mut self) -> Result<&str> {
        self.next_line()?;
        let row = self.rows_read - 1;

        let body = self.line.strip_suffix('\n').ok_or_else(|| {
            GridError::format(format!("{}: row {} is not newline-terminated", self.label, row))
        })?;
        let body = if self.trailing_separator {
            body.strip_suffix(' ').ok_or_else(|| {
                GridError::format(format!(
                    "{}: row {} lacks the trailing separator",
                    self.label, row
                ))
            })?
        } else {
            body
        };

        let mut count = 0usize;
        for token in body.split(' ') {
            if token.is_empty() {
                return Err(GridError::format(format!(
                    "{}: row {} contains an empty token",
                    self.label, row
                )));
            }
            count += 1;
        }
        if count != self.header.ncols {
            return Err(GridError::format(format!(
                "{}: row {} has {} values, expected {}",
                self.label, row, count, self.header.ncols
            )));
        }

        Ok(body)
    }

    /// Consume the next row without tokenizing it.
    pub fn skip_row(&mut self) -> Result<()> {
        self.next_line()?;
        if !self.line.ends_with('\n') {
            return Err(GridError::format(format!(
                "{}: row {} is not newline-terminated",
                self.label,
                self.rows_read - 1
            )));
        }
        Ok(())
    }

    /// Verify that every row was consumed and nothing follows the last row.
    pub fn finish(mut self) -> Result<()> {
        if self.rows_read != self.header.nrows {
            return Err(GridError::format(format!(
                "{}: scan stopped after {} of {} rows",
                self.label, self.rows_read, self.header.nrows
            )));
        }
        self.line.clear();
        if self.reader.read_line(&mut self.line)? != 0 {
            return Err(GridError::format(format!(
                "{}: unexpected data after row {}",
                self.label, self.header.nrows
            )));
        }
        Ok(())
    }

    fn next_line(&mut self) -> Result<()> {
        if self.rows_read >= self.header.nrows {
            return Err(GridError::format(format!(
                "{}: attempted to read past the last row ({})",
                self.label, self.header.nrows
            )));
        }
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Err(GridError::format(format!(
                "{}: unexpected end of file at row {} of {}",
                self.label, self.rows_read, self.header.nrows
            )));
        }
        self.rows_read += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "ncols 3\nnrows 2\nxllcorner -180\nyllcorner 0\ncellsize 0.5\nNODATA_value -9999\n";

    fn reader(body: &str, trailing: bool) -> TileReader<Cursor<String>> {
        TileReader::new(Cursor::new(format!("{}{}", HEADER, body)), "test", trailing).unwrap()
    }

    #[test]
    fn test_header_parse() {
        let r = reader("1 2 3\n4 5 6\n", false);
        let header = r.header();
        assert_eq!(header.ncols, 3);
        assert_eq!(header.nrows, 2);
        assert_eq!(header.xllcorner, -180.0);
        assert_eq!(header.cellsize, 0.5);
        assert_eq!(header.nodata_value, -9999.0);
    }

    #[test]
    fn test_read_rows_and_finish() {
        let mut r = reader("1 2 3\n4 5 6\n", false);
        assert_eq!(r.read_row().unwrap(), "1 2 3");
        assert_eq!(r.read_row().unwrap(), "4 5 6");
        assert!(r.finish().is_ok());
    }

    #[test]
    fn test_trailing_separator_mode() {
        let mut r = reader("1 2 3 \n4 5 6 \n", true);
        assert_eq!(r.read_row().unwrap(), "1 2 3");
        assert_eq!(r.read_row().unwrap(), "4 5 6");

        let mut strict = reader("1 2 3 \n", false);
        assert!(strict.read_row().unwrap_err().is_format());

        let mut missing = reader("1 2 3\n", true);
        assert!(missing.read_row().unwrap_err().is_format());
    }

    #[test]
    fn test_wrong_token_count() {
        let mut r = reader("1 2\n", false);
        assert!(r.read_row().unwrap_err().is_format());

        let mut r = reader("1 2 3 4\n", false);
        assert!(r.read_row().unwrap_err().is_format());

        let mut r = reader("1  3\n", false);
        assert!(r.read_row().unwrap_err().is_format());
    }

    #[test]
    fn test_premature_eof() {
        let mut r = reader("1 2 3\n", false);
        r.read_row().unwrap();
        assert!(r.read_row().unwrap_err().is_format());
    }

    #[test]
    fn test_missing_final_newline() {
        let mut r = reader("1 2 3\n4 5 6", false);
        r.read_row().unwrap();
        assert!(r.read_row().unwrap_err().is_format());
    }

    #[test]
    fn test_finish_detects_trailing_data() {
        let mut r = reader("1 2 3\n4 5 6\nextra\n", false);
        r.skip_row().unwrap();
        r.skip_row().unwrap();
        assert!(r.finish().unwrap_err().is_format());
    }

    #[test]
    fn test_finish_detects_unread_rows() {
        let mut r = reader("1 2 3\n4 5 6\n", false);
        r.skip_row().unwrap();
        assert!(r.finish().unwrap_err().is_format());
    }

    #[test]
    fn test_bad_header() {
        let bad = "ncols 3\nrows 2\n";
        let err = TileReader::new(Cursor::new(bad), "bad", false).err().unwrap();
        assert!(err.is_format());

        let truncated = "ncols 3\n";
        let err = TileReader::new(Cursor::new(truncated), "short", false).err().unwrap();
        assert!(err.is_format());
    }

    #[test]
    fn test_expect_shape() {
        let r = reader("1 2 3\n4 5 6\n", false);
        assert!(r.expect_shape(3).unwrap_err().is_format());
    }
}
