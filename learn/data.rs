//! # Numeric Text Loading
//!
//! Reads kernel matrices, target vectors and coefficient vectors from plain
//! text and writes them back. Three layouts are recognized from the file
//! extension: `.csv` (comma), `.tsv` (tab) and anything else as
//! whitespace-delimited, the format `numpy.savetxt` produces by default.
//! Lines starting with `#` are comments in every layout.
//!
//! All values must be finite; the numerical core never sees NaN or infinity
//! coming from a file.

use crate::shared::files::create_output_file;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Could not parse '{value}' as a number in {path} at line {line}")]
    Parse {
        path: String,
        line: usize,
        value: String,
    },
    #[error("Row at line {line} of {path} has {found} columns, but earlier rows have {expected}")]
    Ragged {
        path: String,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Non-finite values (NaN or Infinity) were found in {path} at line {line}")]
    NonFinite { path: String, line: usize },
    #[error("{0} contains no numeric rows")]
    Empty(String),
    #[error("{path} holds a {rows}x{cols} table, expected a single row or column")]
    NotAVector {
        path: String,
        rows: usize,
        cols: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextLayout {
    Comma,
    Tab,
    Whitespace,
}

impl TextLayout {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => Self::Comma,
            Some("tsv") => Self::Tab,
            _ => Self::Whitespace,
        }
    }

    fn separator(self) -> &'static str {
        match self {
            Self::Comma => ",",
            Self::Tab => "\t",
            Self::Whitespace => " ",
        }
    }
}

struct NumericRow {
    line: usize,
    values: Vec<f64>,
}

fn parse_value(raw: &str, path: &Path, line: usize) -> Result<f64, DataError> {
    raw.parse::<f64>().map_err(|_| DataError::Parse {
        path: path.display().to_string(),
        line,
        value: raw.to_string(),
    })
}

fn read_whitespace_rows(path: &Path) -> Result<Vec<NumericRow>, DataError> {
    let content = fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values = line
            .split_whitespace()
            .map(|field| parse_value(field, path, idx + 1))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(NumericRow {
            line: idx + 1,
            values,
        });
    }
    Ok(rows)
}

fn read_delimited_rows(path: &Path, delimiter: u8) -> Result<Vec<NumericRow>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(rows.len() + 1);
        if record.iter().all(str::is_empty) {
            continue;
        }
        let values = record
            .iter()
            .map(|field| parse_value(field, path, line))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(NumericRow { line, values });
    }
    Ok(rows)
}

fn read_rows(path: &Path) -> Result<Vec<NumericRow>, DataError> {
    let rows = match TextLayout::from_path(path) {
        TextLayout::Comma => read_delimited_rows(path, b',')?,
        TextLayout::Tab => read_delimited_rows(path, b'\t')?,
        TextLayout::Whitespace => read_whitespace_rows(path)?,
    };
    if rows.is_empty() {
        return Err(DataError::Empty(path.display().to_string()));
    }
    Ok(rows)
}

/// Loads a rectangular numeric table, one matrix row per line.
pub fn load_matrix<P: AsRef<Path>>(path: P) -> Result<Array2<f64>, DataError> {
    let path = path.as_ref();
    let rows = read_rows(path)?;
    let ncols = rows[0].values.len();
    for row in &rows {
        if row.values.len() != ncols {
            return Err(DataError::Ragged {
                path: path.display().to_string(),
                line: row.line,
                expected: ncols,
                found: row.values.len(),
            });
        }
        if row.values.iter().any(|value| !value.is_finite()) {
            return Err(DataError::NonFinite {
                path: path.display().to_string(),
                line: row.line,
            });
        }
    }
    let matrix = Array2::from_shape_fn((rows.len(), ncols), |(i, j)| rows[i].values[j]);
    log::debug!(
        "Loaded {}x{} matrix from {}",
        matrix.nrows(),
        matrix.ncols(),
        path.display()
    );
    Ok(matrix)
}

/// Loads a vector stored either as a single column or as a single row.
pub fn load_vector<P: AsRef<Path>>(path: P) -> Result<Array1<f64>, DataError> {
    let path = path.as_ref();
    let matrix = load_matrix(path)?;
    let (rows, cols) = matrix.dim();
    if cols == 1 {
        Ok(matrix.column(0).to_owned())
    } else if rows == 1 {
        Ok(matrix.row(0).to_owned())
    } else {
        Err(DataError::NotAVector {
            path: path.display().to_string(),
            rows,
            cols,
        })
    }
}

/// Writes a matrix with one row per line, in the layout implied by `path`.
pub fn write_matrix<P: AsRef<Path>>(path: P, matrix: ArrayView2<f64>) -> Result<(), DataError> {
    let path = path.as_ref();
    let separator = TextLayout::from_path(path).separator();
    let mut writer = create_output_file(path)?;
    for row in matrix.rows() {
        let line = row
            .iter()
            .map(|value| format!("{value:.18e}"))
            .collect::<Vec<_>>()
            .join(separator);
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes a vector as a single column.
pub fn write_vector<P: AsRef<Path>>(path: P, vector: ArrayView1<f64>) -> Result<(), DataError> {
    let column = vector.insert_axis(ndarray::Axis(1));
    write_matrix(path, column)
}
