//! Rendering of activity frames to CSV and JSON.

use crate::domain::model::{ActivityFrame, Cell, FrameAttrs};
use crate::utils::error::{EtlError, Result};
use serde::Serialize;
use serde_json::{Map, Value};

const INDEX_COLUMN: &str = "timestamp";

/// CSV with the timestamp index as the first column; nulls are empty.
pub fn to_csv(frame: &ActivityFrame) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = Vec::with_capacity(frame.columns.len() + 1);
    header.push(INDEX_COLUMN);
    header.extend(frame.columns.iter().map(String::as_str));
    writer.write_record(&header)?;

    for row in &frame.rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.timestamp.map(|ts| ts.to_rfc3339()).unwrap_or_default());
        for column in &frame.columns {
            record.push(row.get(column).map(Cell::to_csv_field).unwrap_or_default());
        }
        writer.write_record(&record)?;
    }

    let bytes = writer.into_inner().map_err(|e| EtlError::ProcessingError {
        message: format!("Failed to flush CSV output: {}", e),
    })?;
    String::from_utf8(bytes).map_err(|e| EtlError::ProcessingError {
        message: format!("CSV output is not valid UTF-8: {}", e),
    })
}

#[derive(Serialize)]
struct FrameDocument<'a> {
    attrs: &'a FrameAttrs,
    columns: Vec<&'a str>,
    rows: Vec<Map<String, Value>>,
}

/// Pretty JSON document with `attrs`, `columns` and one object per row.
pub fn to_json(frame: &ActivityFrame) -> Result<String> {
    let mut columns = Vec::with_capacity(frame.columns.len() + 1);
    columns.push(INDEX_COLUMN);
    columns.extend(frame.columns.iter().map(String::as_str));

    let mut rows = Vec::with_capacity(frame.rows.len());
    for row in &frame.rows {
        let mut object = Map::new();
        object.insert(
            INDEX_COLUMN.to_string(),
            row.timestamp
                .map(|ts| Value::String(ts.to_rfc3339()))
                .unwrap_or(Value::Null),
        );
        for column in &frame.columns {
            let value = match row.get(column) {
                Some(cell) => serde_json::to_value(cell)?,
                None => Value::Null,
            };
            object.insert(column.clone(), value);
        }
        rows.push(object);
    }

    let document = FrameDocument {
        attrs: &frame.attrs,
        columns,
        rows,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Row;
    use chrono::{FixedOffset, TimeZone};
    use std::collections::HashMap;

    fn sample_frame() -> ActivityFrame {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let ts = tz.with_ymd_and_hms(2024, 4, 2, 9, 15, 0).unwrap();
        let mut values = HashMap::new();
        values.insert("power".to_string(), Cell::Float(251.0));
        values.insert("sport".to_string(), Cell::Text("cycling".to_string()));
        values.insert("lap".to_string(), Cell::Null);

        ActivityFrame {
            columns: vec!["sport".into(), "power".into(), "lap".into()],
            rows: vec![Row {
                timestamp: Some(ts),
                values,
            }],
            attrs: FrameAttrs {
                device: Some("garmin 3843".to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_csv_layout() {
        let csv = to_csv(&sample_frame()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("timestamp,sport,power,lap"));
        assert_eq!(lines.next(), Some("2024-04-02T09:15:00+01:00,cycling,251,"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_json_document() {
        let json = to_json(&sample_frame()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["attrs"]["device"], "garmin 3843");
        assert_eq!(value["columns"][0], "timestamp");
        assert_eq!(value["rows"][0]["timestamp"], "2024-04-02T09:15:00+01:00");
        assert_eq!(value["rows"][0]["power"], 251.0);
        assert!(value["rows"][0]["lap"].is_null());
    }

    #[test]
    fn test_empty_frame() {
        let frame = ActivityFrame::default();
        assert_eq!(to_csv(&frame).unwrap().trim(), "timestamp");
        let value: Value = serde_json::from_str(&to_json(&frame).unwrap()).unwrap();
        assert_eq!(value["rows"].as_array().map(Vec::len), Some(0));
    }
}
