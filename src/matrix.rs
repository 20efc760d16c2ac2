//! Activity matrix input
//!
//! The engine consumes a fully materialized user × day binary matrix produced by
//! upstream preprocessing. This module holds that matrix, parses it from JSON or
//! NDJSON, and enforces the per-row input contract (length equal to the window,
//! values restricted to 0/1, unique non-empty user ids).
//!
//! Row cells are kept as raw JSON values until a row is requested, so a single
//! malformed row (a `2`, `0.5`, `null` or `"1"` cell) is rejected for that user only
//! instead of failing the whole parse.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::error::ComputeError;
use crate::types::UserId;

/// One user's raw activity row as supplied by preprocessing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivity {
    pub user_id: UserId,
    /// One entry per calendar day; 1 = active, 0 = inactive
    pub activity: Vec<Value>,
}

impl UserActivity {
    pub fn new(user_id: impl Into<UserId>, activity: Vec<i64>) -> Self {
        Self::from_values(user_id, activity.into_iter().map(Value::from).collect())
    }

    /// Build a row from raw JSON cells, validated later by [`ActivityMatrix::binary_row`]
    pub fn from_values(user_id: impl Into<UserId>, activity: Vec<Value>) -> Self {
        Self {
            user_id: user_id.into(),
            activity,
        }
    }
}

/// JSON document form of the matrix
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatrixDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_days: Option<usize>,
    pub users: Vec<UserActivity>,
}

/// User × day binary activity matrix over a fixed observation window
#[derive(Debug, Clone)]
pub struct ActivityMatrix {
    window_days: usize,
    start_date: Option<NaiveDate>,
    rows: Vec<UserActivity>,
    /// First row index of every user id
    positions: HashMap<UserId, usize>,
    /// Rows repeating a user id already seen earlier
    duplicates: HashSet<usize>,
}

impl ActivityMatrix {
    /// Build a matrix with an explicit window length.
    pub fn new(window_days: usize, rows: Vec<UserActivity>) -> Result<Self, ComputeError> {
        if window_days == 0 {
            return Err(ComputeError::MatrixError(
                "observation window must cover at least one day".to_string(),
            ));
        }

        let mut positions = HashMap::with_capacity(rows.len());
        let mut duplicates = HashSet::new();
        for (index, row) in rows.iter().enumerate() {
            if positions.contains_key(&row.user_id) {
                duplicates.insert(index);
            } else {
                positions.insert(row.user_id.clone(), index);
            }
        }

        Ok(Self {
            window_days,
            start_date: None,
            rows,
            positions,
            duplicates,
        })
    }

    /// Build a matrix inferring the window length from the rows.
    ///
    /// The most common row length wins (earliest on ties), so one truncated row
    /// cannot redefine the window for everybody else.
    pub fn from_rows(rows: Vec<UserActivity>) -> Result<Self, ComputeError> {
        let window_days = infer_window_days(&rows).ok_or_else(|| {
            ComputeError::MatrixError("cannot infer window length from an empty matrix".to_string())
        })?;
        Self::new(window_days, rows)
    }

    /// Build a matrix from its JSON document form, checking declared dates.
    pub fn from_document(doc: MatrixDocument) -> Result<Self, ComputeError> {
        let span = match (doc.start_date, doc.end_date) {
            (Some(start), Some(end)) => {
                let days = (end - start).num_days() + 1;
                if days < 1 {
                    return Err(ComputeError::MatrixError(format!(
                        "end_date {end} precedes start_date {start}"
                    )));
                }
                Some(days as usize)
            }
            _ => None,
        };

        let window_days = match (doc.window_days, span) {
            (Some(declared), Some(span)) if declared != span => {
                return Err(ComputeError::MatrixError(format!(
                    "window_days {declared} disagrees with the {span}-day date range"
                )));
            }
            (Some(declared), _) => Some(declared),
            (None, span) => span,
        };

        let matrix = match window_days {
            Some(days) => Self::new(days, doc.users)?,
            None => Self::from_rows(doc.users)?,
        };

        let start_date = match (doc.start_date, doc.end_date) {
            (Some(start), _) => Some(start),
            (None, Some(end)) => end.checked_sub_days(Days::new(matrix.window_days as u64 - 1)),
            (None, None) => None,
        };

        Ok(match start_date {
            Some(date) => matrix.with_start_date(date),
            None => matrix,
        })
    }

    /// Attach the calendar date of the first day of the window
    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    /// Parse a JSON matrix document
    pub fn parse_json(json: &str) -> Result<Self, ComputeError> {
        let doc: MatrixDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    /// Parse NDJSON with one `{ "user_id", "activity" }` object per line
    pub fn parse_ndjson(ndjson: &str) -> Result<Self, ComputeError> {
        let mut rows = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<UserActivity>(trimmed) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Self::from_rows(rows)
    }

    /// Window length T in days
    pub fn window_days(&self) -> usize {
        self.window_days
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    /// Calendar date of the last day of the window
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.start_date?
            .checked_add_days(Days::new(self.window_days as u64 - 1))
    }

    /// Number of rows (including malformed ones)
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[UserActivity] {
        &self.rows
    }

    /// User ids in row order
    pub fn user_ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.user_id.as_str())
    }

    /// Row index of the first occurrence of `user_id`
    pub fn position(&self, user_id: &str) -> Option<usize> {
        self.positions.get(user_id).copied()
    }

    /// Return the validated 0/1 row at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn binary_row(&self, index: usize) -> Result<Vec<u8>, ComputeError> {
        let row = &self.rows[index];
        let user_id = row.user_id.as_str();

        if user_id.trim().is_empty() {
            return Err(ComputeError::input_shape(user_id, "empty user id"));
        }

        if self.duplicates.contains(&index) {
            let first = self.positions.get(user_id).copied().unwrap_or_default();
            return Err(ComputeError::input_shape(
                user_id,
                format!("duplicate user id (first seen at row {first})"),
            ));
        }

        if row.activity.len() != self.window_days {
            return Err(ComputeError::input_shape(
                user_id,
                format!(
                    "expected {} days, got {}",
                    self.window_days,
                    row.activity.len()
                ),
            ));
        }

        row.activity
            .iter()
            .enumerate()
            .map(|(day, value)| {
                binary_cell(value).ok_or_else(|| {
                    ComputeError::input_shape(
                        user_id,
                        format!("non-binary value {value} at day {day}"),
                    )
                })
            })
            .collect()
    }

    /// Check every row against the input contract, returning only the failures
    pub fn validate_rows(&self) -> Vec<RowValidation> {
        (0..self.rows.len())
            .filter_map(|index| {
                self.binary_row(index).err().map(|error| RowValidation {
                    index,
                    user_id: self.rows[index].user_id.clone(),
                    error,
                })
            })
            .collect()
    }
}

/// A row that failed the input contract
#[derive(Debug)]
pub struct RowValidation {
    pub index: usize,
    pub user_id: UserId,
    pub error: ComputeError,
}

/// Map a JSON cell to 0/1; integral numbers only, so `1.0` passes and `0.5` does not
fn binary_cell(value: &Value) -> Option<u8> {
    match value.as_u64() {
        Some(0) => Some(0),
        Some(1) => Some(1),
        Some(_) => None,
        None => match value.as_f64() {
            Some(f) if f == 0.0 => Some(0),
            Some(f) if f == 1.0 => Some(1),
            _ => None,
        },
    }
}

fn infer_window_days(rows: &[UserActivity]) -> Option<usize> {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for row in rows {
        let len = row.activity.len();
        match counts.iter_mut().find(|(l, _)| *l == len) {
            Some((_, count)) => *count += 1,
            None => counts.push((len, 1)),
        }
    }
    // `counts` is in first-seen order; keep the earliest among equal counts
    counts
        .iter()
        .fold(None, |best: Option<(usize, usize)>, &(len, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((len, count)),
        })
        .map(|(len, _)| len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(user_id: &str, activity: &[i64]) -> UserActivity {
        UserActivity::new(user_id, activity.to_vec())
    }

    #[test]
    fn test_binary_row_accepts_valid_row() {
        let matrix = ActivityMatrix::new(3, vec![row("u1", &[1, 0, 1])]).unwrap();
        assert_eq!(matrix.binary_row(0).unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let matrix = ActivityMatrix::new(3, vec![row("u1", &[1, 0])]).unwrap();
        let err = matrix.binary_row(0).unwrap_err();
        assert!(matches!(err, ComputeError::InputShape { ref user_id, .. } if user_id == "u1"));
        assert!(err.to_string().contains("expected 3 days, got 2"));
    }

    #[test]
    fn test_non_binary_value_rejected() {
        let matrix = ActivityMatrix::new(3, vec![row("u1", &[1, 2, 0])]).unwrap();
        let err = matrix.binary_row(0).unwrap_err();
        assert!(err.to_string().contains("non-binary value 2 at day 1"));
    }

    #[test]
    fn test_non_integer_cells_rejected_per_row() {
        let json = r#"{"users": [
            {"user_id": "half", "activity": [1, 0.5, 0]},
            {"user_id": "blank", "activity": [1, null, 0]},
            {"user_id": "text", "activity": ["1", 0, 0]},
            {"user_id": "flag", "activity": [true, 0, 0]},
            {"user_id": "float", "activity": [1.0, 0.0, 1]}
        ]}"#;
        let matrix = ActivityMatrix::parse_json(json).unwrap();
        assert_eq!(matrix.window_days(), 3);

        let failures: Vec<(String, String)> = matrix
            .validate_rows()
            .into_iter()
            .map(|v| (v.user_id, v.error.to_string()))
            .collect();
        assert_eq!(failures.len(), 4);
        assert!(failures[0].1.contains("non-binary value 0.5 at day 1"));
        assert!(failures[1].1.contains("non-binary value null at day 1"));
        assert!(failures[2].1.contains("at day 0"));
        assert_eq!(failures[3].0, "flag");
        assert_eq!(matrix.binary_row(4).unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn test_duplicate_user_rejected_after_first() {
        let matrix =
            ActivityMatrix::new(2, vec![row("u1", &[1, 0]), row("u1", &[0, 1])]).unwrap();
        assert!(matrix.binary_row(0).is_ok());
        assert!(matrix.binary_row(1).is_err());
        assert_eq!(matrix.position("u1"), Some(0));
    }

    #[test]
    fn test_empty_user_id_rejected() {
        let matrix = ActivityMatrix::new(2, vec![row("  ", &[1, 0])]).unwrap();
        assert!(matrix.binary_row(0).is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(
            ActivityMatrix::new(0, vec![]),
            Err(ComputeError::MatrixError(_))
        ));
    }

    #[test]
    fn test_window_inferred_from_most_common_length() {
        let matrix = ActivityMatrix::from_rows(vec![
            row("short", &[1, 0]),
            row("a", &[1, 0, 1]),
            row("b", &[0, 0, 1]),
        ])
        .unwrap();
        assert_eq!(matrix.window_days(), 3);
        assert_eq!(matrix.validate_rows().len(), 1);
        assert_eq!(matrix.validate_rows()[0].user_id, "short");
    }

    #[test]
    fn test_parse_json_document_with_dates() {
        let json = r#"{
            "start_date": "2024-01-01",
            "users": [
                {"user_id": "u1", "activity": [1, 0, 0, 1]},
                {"user_id": "u2", "activity": [0, 1, 1, 1]}
            ]
        }"#;
        let matrix = ActivityMatrix::parse_json(json).unwrap();
        assert_eq!(matrix.window_days(), 4);
        assert_eq!(matrix.len(), 2);
        assert_eq!(
            matrix.end_date(),
            NaiveDate::from_ymd_opt(2024, 1, 4)
        );
        assert_eq!(matrix.user_ids().collect::<Vec<_>>(), vec!["u1", "u2"]);
    }

    #[test]
    fn test_parse_json_date_range_mismatch() {
        let json = r#"{
            "start_date": "2024-01-01",
            "end_date": "2024-01-10",
            "window_days": 4,
            "users": []
        }"#;
        assert!(matches!(
            ActivityMatrix::parse_json(json),
            Err(ComputeError::MatrixError(_))
        ));
    }

    #[test]
    fn test_parse_json_end_date_only() {
        let json = r#"{
            "end_date": "2024-03-10",
            "users": [{"user_id": "u1", "activity": [1, 1, 1, 1, 1]}]
        }"#;
        let matrix = ActivityMatrix::parse_json(json).unwrap();
        assert_eq!(matrix.start_date(), NaiveDate::from_ymd_opt(2024, 3, 6));
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let ndjson = "{\"user_id\": \"u1\", \"activity\": [1, 0]}\n\n{\"user_id\": \"u2\", \"activity\": [0, 1]}\n";
        let matrix = ActivityMatrix::parse_ndjson(ndjson).unwrap();
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.window_days(), 2);
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = "{\"user_id\": \"u1\", \"activity\": [1, 0]}\nnot json\n";
        let err = ActivityMatrix::parse_ndjson(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_empty_ndjson_fails() {
        assert!(ActivityMatrix::parse_ndjson("\n\n").is_err());
    }
}
