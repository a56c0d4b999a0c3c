//! Typed views over an option's raw value.
//!
//! Conversions are computed on demand from the captured string and never
//! cached on the descriptor.

use crate::table::OptionSpec;
use std::fmt;
use std::ops::Index;
use std::str::FromStr;
use thiserror::Error;

/// Separator between vector elements and between matrix columns.
pub const ELEMENT_DELIMITER: char = ',';
/// Separator between matrix rows.
pub const ROW_DELIMITER: char = ';';

/// Errors that can occur while converting a raw value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("option '{0}' has no value")]
    NoValueAvailable(String),

    #[error("option '{option}': cannot convert '{token}' to {target}")]
    Conversion {
        option: String,
        token: String,
        target: &'static str,
    },

    #[error("option '{option}': matrix row {row} has {found} columns, expected {expected}")]
    RaggedMatrix {
        option: String,
        row: usize,
        expected: usize,
        found: usize,
    },
}

impl ValueError {
    /// True for string-to-number or shape failures, as opposed to a missing value.
    pub fn is_conversion(&self) -> bool {
        matches!(
            self,
            ValueError::Conversion { .. } | ValueError::RaggedMatrix { .. }
        )
    }
}

/// A dense row-major matrix produced from a `;`/`,` delimited value.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T> Matrix<T> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// The elements of one row, or `None` when `row` is out of range.
    pub fn row(&self, row: usize) -> Option<&[T]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        self.data.get(start..start + self.cols)
    }

    /// Elements in row-major order.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_rows(self) -> Vec<Vec<T>> {
        let mut rows = Vec::with_capacity(self.rows);
        let mut data = self.data.into_iter();
        for _ in 0..self.rows {
            rows.push(data.by_ref().take(self.cols).collect());
        }
        rows
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(
            row < self.rows && col < self.cols,
            "matrix index ({}, {}) out of bounds for {}x{}",
            row,
            col,
            self.rows,
            self.cols
        );
        &self.data[row * self.cols + col]
    }
}

impl<T: fmt::Display> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..self.rows).filter_map(|r| self.row(r)) {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

impl OptionSpec {
    fn value_or_err(&self) -> Result<&str, ValueError> {
        self.raw_value()
            .ok_or_else(|| ValueError::NoValueAvailable(self.long_name().to_string()))
    }

    fn convert<T: FromStr>(&self, token: &str) -> Result<T, ValueError> {
        token.parse::<T>().map_err(|_| ValueError::Conversion {
            option: self.long_name().to_string(),
            token: token.to_string(),
            target: std::any::type_name::<T>(),
        })
    }

    /// Parse the whole value as a base-10 signed integer.
    pub fn as_integer(&self) -> Result<i64, ValueError> {
        let raw = self.value_or_err()?;
        self.convert(raw)
    }

    /// Parse the whole value as a decimal floating point number.
    pub fn as_float(&self) -> Result<f64, ValueError> {
        let raw = self.value_or_err()?;
        self.convert(raw)
    }

    /// Split the value on `,` and convert every element in order.
    ///
    /// An empty value yields an empty vector. Empty elements are not
    /// skipped, so `"1,,2"` fails on the empty token.
    pub fn as_vector<T: FromStr>(&self) -> Result<Vec<T>, ValueError> {
        let raw = self.value_or_err()?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        raw.split(ELEMENT_DELIMITER)
            .map(|token| self.convert(token))
            .collect()
    }

    /// Split the value into rows on `;` and columns on `,`.
    ///
    /// Every row must have as many columns as the first one.
    pub fn as_matrix<T: FromStr>(&self) -> Result<Matrix<T>, ValueError> {
        let raw = self.value_or_err()?;
        if raw.is_empty() {
            return Ok(Matrix {
                rows: 0,
                cols: 0,
                data: Vec::new(),
            });
        }

        let rows: Vec<Vec<&str>> = raw
            .split(ROW_DELIMITER)
            .map(|row| row.split(ELEMENT_DELIMITER).collect())
            .collect();
        let cols = rows[0].len();

        let mut data = Vec::with_capacity(rows.len() * cols);
        for (index, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(ValueError::RaggedMatrix {
                    option: self.long_name().to_string(),
                    row: index,
                    expected: cols,
                    found: row.len(),
                });
            }
            for token in row {
                data.push(self.convert(token)?);
            }
        }

        Ok(Matrix {
            rows: rows.len(),
            cols,
            data,
        })
    }
}
