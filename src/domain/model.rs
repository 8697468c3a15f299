use crate::fit::FieldValue;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Options controlling how records are turned into columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Rename vendor and enhanced fields to common names (`Power` -> `power`).
    pub opinionated: bool,
    /// Keep columns outside the opinionated set.
    pub include_unopinionated: bool,
    /// Let a translated column replace an existing column of the same name.
    pub allow_column_overwrites: bool,
    pub check_crc: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            opinionated: true,
            include_unopinionated: true,
            allow_column_overwrites: false,
            check_crc: true,
        }
    }
}

static NULL_CELL: Cell = Cell::Null;

/// One table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<FixedOffset>),
    List(Vec<Cell>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce to `Float`; values with no numeric reading become `Null`.
    pub fn into_float(self) -> Cell {
        match self {
            Cell::Int(v) => Cell::Float(v as f64),
            Cell::Float(v) => Cell::Float(v),
            Cell::Text(s) => s.trim().parse().map(Cell::Float).unwrap_or(Cell::Null),
            _ => Cell::Null,
        }
    }

    pub fn to_csv_field(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Timestamp(ts) => ts.to_rfc3339(),
            Cell::List(values) => values
                .iter()
                .map(Cell::to_csv_field)
                .collect::<Vec<_>>()
                .join("|"),
        }
    }
}

impl From<FieldValue> for Cell {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Int(v) => Cell::Int(v),
            FieldValue::Float(v) => Cell::Float(v),
            FieldValue::Text(s) => Cell::Text(s),
            FieldValue::Timestamp(ts) => Cell::Timestamp(ts.fixed_offset()),
            FieldValue::Array(values) => Cell::List(values.into_iter().map(Cell::from).collect()),
            FieldValue::Null => Cell::Null,
            other @ (FieldValue::LocalTimestamp(_) | FieldValue::Bytes(_)) => {
                Cell::Text(other.to_string())
            }
        }
    }
}

impl From<Option<FieldValue>> for Cell {
    fn from(value: Option<FieldValue>) -> Self {
        value.map(Cell::from).unwrap_or(Cell::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub values: HashMap<String, Cell>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.values.get(column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapInfo {
    pub index: usize,
    pub start_time: DateTime<FixedOffset>,
    pub trigger: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub start_time: Option<DateTime<FixedOffset>>,
    pub sport: Option<String>,
    pub sub_sport: Option<String>,
    pub total_elapsed_time: Option<f64>,
    pub total_timer_time: Option<f64>,
    pub total_distance: Option<f64>,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub avg_power: Option<f64>,
}

/// Metadata attached to a frame, next to the rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameAttrs {
    pub device: Option<String>,
    pub sport: Option<String>,
    pub sub_sport: Option<String>,
    pub utc_offset_seconds: Option<i32>,
    pub laps: Vec<LapInfo>,
    pub sessions: Vec<SessionSummary>,
}

/// Time-indexed table of `record` messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityFrame {
    /// Data columns in first-seen order; the timestamp index is not listed.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub attrs: FrameAttrs,
}

impl ActivityFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Cells of one column, `Null` where a row lacks it.
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Cell> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(name).unwrap_or(&NULL_CELL))
    }

    pub fn start_time(&self) -> Option<DateTime<FixedOffset>> {
        self.rows.iter().find_map(|row| row.timestamp)
    }

    pub fn end_time(&self) -> Option<DateTime<FixedOffset>> {
        self.rows.iter().rev().find_map(|row| row.timestamp)
    }

    pub fn start_time_utc(&self) -> Option<DateTime<Utc>> {
        self.start_time().map(|ts| ts.with_timezone(&Utc))
    }
}

/// A raw input file as read from storage.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Rendered outputs for one input file.
#[derive(Debug, Clone)]
pub struct ActivityOutput {
    /// File stem used for output names.
    pub name: String,
    pub frame: ActivityFrame,
    pub csv_output: Option<String>,
    pub json_output: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TransformResult {
    pub activities: Vec<ActivityOutput>,
}

impl TransformResult {
    pub fn total_rows(&self) -> usize {
        self.activities.iter().map(|a| a.frame.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cell_from_field_value() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        assert_eq!(
            Cell::from(FieldValue::Timestamp(ts)),
            Cell::Timestamp(ts.fixed_offset())
        );
        assert_eq!(Cell::from(None), Cell::Null);
        assert_eq!(
            Cell::from(FieldValue::Array(vec![FieldValue::Int(1), FieldValue::Int(2)])).to_csv_field(),
            "1|2"
        );
    }

    #[test]
    fn test_into_float() {
        assert_eq!(Cell::Int(250).into_float(), Cell::Float(250.0));
        assert_eq!(Cell::Text("3.5".into()).into_float(), Cell::Float(3.5));
        assert_eq!(Cell::Text("n/a".into()).into_float(), Cell::Null);
        assert_eq!(Cell::Null.into_float(), Cell::Null);
    }

    #[test]
    fn test_read_options_default() {
        let options = ReadOptions::default();
        assert!(options.opinionated);
        assert!(options.include_unopinionated);
        assert!(!options.allow_column_overwrites);
        assert!(options.check_crc);
    }
}
