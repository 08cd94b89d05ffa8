//! The slot × date matrix shared by every pipeline stage.
//!
//! Staffing counts, need baselines, upper ceilings, shortage and excess all
//! use [`SlotMatrix`]: rows are time-slot labels, columns are calendar dates
//! in ascending order, and every cell is a non-negative number.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// A dense (time-slot × date) matrix.
///
/// Serializes in columnar snapshot form: `{"index": [...], "columns": [...], "data": [[...]]}`
/// where `data[row][column]`.
///
/// # Example
///
/// ```
/// use shortage_engine::models::SlotMatrix;
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
/// let mut matrix = SlotMatrix::zeros(vec!["09:00".into(), "09:30".into()], vec![date]);
/// matrix.set(1, 0, 3.0);
/// assert_eq!(matrix.total(), 3.0);
/// assert_eq!(matrix.column_sum(0), 3.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotMatrix {
    index: Vec<String>,
    columns: Vec<NaiveDate>,
    data: Vec<Vec<f64>>,
}

impl SlotMatrix {
    /// Creates an all-zero matrix.
    pub fn zeros(index: Vec<String>, columns: Vec<NaiveDate>) -> Self {
        let data = vec![vec![0.0; columns.len()]; index.len()];
        Self {
            index,
            columns,
            data,
        }
    }

    /// Creates a matrix from row-major data, checking the shape.
    pub fn from_rows(
        index: Vec<String>,
        columns: Vec<NaiveDate>,
        data: Vec<Vec<f64>>,
    ) -> EngineResult<Self> {
        if data.len() != index.len() {
            return Err(EngineError::MatrixShapeMismatch {
                message: format!("{} rows of data for {} labels", data.len(), index.len()),
            });
        }
        if let Some(row) = data.iter().position(|r| r.len() != columns.len()) {
            return Err(EngineError::MatrixShapeMismatch {
                message: format!(
                    "row {} has {} cells for {} columns",
                    index[row],
                    data[row].len(),
                    columns.len()
                ),
            });
        }
        if columns.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EngineError::MatrixShapeMismatch {
                message: "date columns must be strictly ascending".to_string(),
            });
        }
        Ok(Self {
            index,
            columns,
            data,
        })
    }

    /// Row labels.
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Date columns, ascending.
    pub fn columns(&self) -> &[NaiveDate] {
        &self.columns
    }

    /// Row-major cell values.
    pub fn data(&self) -> &[Vec<f64>] {
        &self.data
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    /// Number of date columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the matrix has no date columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns a cell value.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row][col]
    }

    /// Overwrites a cell value.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row][col] = value;
    }

    /// Adds to a cell value.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row][col] += value;
    }

    /// One row's values across all columns.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row]
    }

    /// Position of a date column.
    pub fn column_position(&self, date: NaiveDate) -> Option<usize> {
        self.columns.binary_search(&date).ok()
    }

    /// Sum of one column.
    pub fn column_sum(&self, col: usize) -> f64 {
        self.data.iter().map(|r| r[col]).sum()
    }

    /// Sum of every column keyed by date.
    pub fn column_totals(&self) -> BTreeMap<NaiveDate, f64> {
        self.columns
            .iter()
            .enumerate()
            .map(|(c, date)| (*date, self.column_sum(c)))
            .collect()
    }

    /// Sum of every cell.
    pub fn total(&self) -> f64 {
        self.data.iter().flat_map(|r| r.iter()).sum()
    }

    /// Returns true if both matrices have identical row labels.
    pub fn same_index(&self, other: &SlotMatrix) -> bool {
        self.index == other.index
    }

    /// Returns a matrix restricted to the given dates, in the given order.
    ///
    /// Dates not present in this matrix are skipped.
    pub fn select_columns(&self, dates: &[NaiveDate]) -> SlotMatrix {
        let positions: Vec<(NaiveDate, usize)> = dates
            .iter()
            .filter_map(|d| self.column_position(*d).map(|c| (*d, c)))
            .collect();

        let columns = positions.iter().map(|(d, _)| *d).collect();
        let data = self
            .data
            .iter()
            .map(|row| positions.iter().map(|(_, c)| row[*c]).collect())
            .collect();

        SlotMatrix {
            index: self.index.clone(),
            columns,
            data,
        }
    }

    /// Returns a copy with every cell multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> SlotMatrix {
        self.map(|v| v * factor)
    }

    /// Returns a copy with `f` applied to every cell.
    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> SlotMatrix {
        SlotMatrix {
            index: self.index.clone(),
            columns: self.columns.clone(),
            data: self
                .data
                .iter()
                .map(|row| row.iter().map(|v| f(*v)).collect())
                .collect(),
        }
    }

    /// Concatenates matrices column-wise.
    ///
    /// All parts must share the row index and their columns must be in
    /// ascending order across parts.
    pub fn hconcat(index: Vec<String>, parts: Vec<SlotMatrix>) -> EngineResult<SlotMatrix> {
        let mut columns = Vec::new();
        let mut data = vec![Vec::new(); index.len()];

        for part in parts {
            if part.index != index {
                return Err(EngineError::MatrixShapeMismatch {
                    message: "cannot concatenate matrices with different row labels".to_string(),
                });
            }
            columns.extend(part.columns);
            for (row, cells) in data.iter_mut().zip(part.data) {
                row.extend(cells);
            }
        }

        SlotMatrix::from_rows(index, columns, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn labels() -> Vec<String> {
        vec!["09:00".to_string(), "09:30".to_string()]
    }

    fn sample() -> SlotMatrix {
        SlotMatrix::from_rows(
            labels(),
            vec![day(1), day(2), day(3)],
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_zeros_has_requested_shape() {
        let matrix = SlotMatrix::zeros(labels(), vec![day(1), day(2)]);
        assert_eq!(matrix.n_rows(), 2);
        assert_eq!(matrix.n_cols(), 2);
        assert_eq!(matrix.total(), 0.0);
    }

    #[test]
    fn test_empty_columns_is_empty() {
        let matrix = SlotMatrix::zeros(labels(), vec![]);
        assert!(matrix.is_empty());
        assert_eq!(matrix.n_rows(), 2);
    }

    #[test]
    fn test_from_rows_rejects_ragged_data() {
        let result = SlotMatrix::from_rows(labels(), vec![day(1)], vec![vec![1.0], vec![]]);
        assert!(matches!(result, Err(EngineError::MatrixShapeMismatch { .. })));
    }

    #[test]
    fn test_from_rows_rejects_unsorted_columns() {
        let result = SlotMatrix::from_rows(
            labels(),
            vec![day(2), day(1)],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_column_sums_and_totals() {
        let matrix = sample();
        assert_eq!(matrix.column_sum(0), 5.0);
        assert_eq!(matrix.column_sum(2), 9.0);
        assert_eq!(matrix.total(), 21.0);
        assert_eq!(matrix.column_totals()[&day(2)], 7.0);
    }

    #[test]
    fn test_select_columns_skips_unknown_dates() {
        let matrix = sample().select_columns(&[day(3), day(9), day(1)]);
        assert_eq!(matrix.columns(), &[day(3), day(1)]);
        assert_eq!(matrix.row(0), &[3.0, 1.0]);
    }

    #[test]
    fn test_hconcat_joins_parts() {
        let matrix = sample();
        let left = matrix.select_columns(&[day(1)]);
        let right = matrix.select_columns(&[day(2), day(3)]);

        let joined = SlotMatrix::hconcat(labels(), vec![left, right]).unwrap();
        assert_eq!(joined, matrix);
    }

    #[test]
    fn test_hconcat_rejects_mismatched_index() {
        let other = SlotMatrix::zeros(vec!["10:00".to_string()], vec![day(5)]);
        assert!(SlotMatrix::hconcat(labels(), vec![sample(), other]).is_err());
    }

    #[test]
    fn test_serializes_as_columnar_snapshot() {
        let matrix = sample().select_columns(&[day(1)]);
        let json = serde_json::to_value(&matrix).unwrap();
        assert_eq!(json["index"][1], "09:30");
        assert_eq!(json["columns"][0], "2025-04-01");
        assert_eq!(json["data"][1][0], 4.0);
    }
}
