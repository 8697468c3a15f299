//! Builds an [`ActivityFrame`] from the messages of a FIT activity file.

use crate::core::translate::{self, DeviceInfo, COLUMN_TRANSLATIONS};
use crate::domain::model::{ActivityFrame, Cell, FrameAttrs, LapInfo, ReadOptions, Row, SessionSummary};
use crate::fit::{DecodeOptions, FieldValue, FitDataMessage, FitFrame, FitReader};
use crate::utils::error::Result;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const DURATION_COLUMN: &str = "duration";
const LAP_COLUMN: &str = "lap";
const LAP_TRIGGER_COLUMN: &str = "lap_trigger";

/// The final lap always ends with the user stopping the activity.
const FINAL_LAP_TRIGGER: &str = "manual";

struct PendingRow {
    timestamp: Option<DateTime<Utc>>,
    values: Vec<(String, Cell)>,
}

struct LapStart {
    start: DateTime<Utc>,
    trigger: Option<String>,
}

#[derive(Default)]
struct Collector {
    options: ReadOptions,
    rows: Vec<PendingRow>,
    present_columns: HashSet<String>,
    sport: Option<String>,
    sub_sport: Option<String>,
    device: Option<DeviceInfo>,
    laps: Vec<LapStart>,
    sessions: Vec<SessionSummary>,
    utc_offset: Option<FixedOffset>,
}

pub fn read_fit_file<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<ActivityFrame> {
    let bytes = std::fs::read(path.as_ref())?;
    tracing::debug!("Read {} bytes from {}", bytes.len(), path.as_ref().display());
    read_fit(&bytes, options)
}

/// Read a FIT activity into a time-indexed frame.
///
/// Every `record` message becomes a row, tagged with the sport in effect at
/// that point. Rows get `duration` (seconds since the previous row), `lap`
/// and `lap_trigger` columns; timestamps are shifted to the activity's local
/// UTC offset when the file records one.
pub fn read_fit(bytes: &[u8], options: &ReadOptions) -> Result<ActivityFrame> {
    let decode_options = DecodeOptions {
        check_crc: options.check_crc,
    };

    let mut collector = Collector {
        options: *options,
        ..Collector::default()
    };

    for frame in FitReader::with_options(bytes, decode_options) {
        if let FitFrame::Data(message) = frame? {
            collector.handle(message);
        }
    }

    Ok(collector.finish())
}

impl Collector {
    fn handle(&mut self, message: FitDataMessage) {
        let Some(name) = message.name else {
            return;
        };

        match name {
            "record" => self.add_record(message),
            "sport" => {
                self.sport = text_value(&message, "sport");
                self.sub_sport = text_value(&message, "sub_sport");
            }
            "lap" => self.add_lap(&message),
            "session" => self.sessions.push(session_summary(&message)),
            "device_info" => {
                let is_creator = matches!(
                    message.get_value("device_index"),
                    Some(FieldValue::Text(index)) if index == "creator"
                );
                if is_creator {
                    self.device = Some(DeviceInfo {
                        manufacturer: text_value(&message, "manufacturer"),
                        garmin_product: text_value(&message, "garmin_product"),
                        product_name: text_value(&message, "product_name"),
                        descriptor: text_value(&message, "descriptor"),
                        device_name: text_value(&message, "device_name"),
                        serial_number: text_value(&message, "serial_number"),
                    });
                }
            }
            "activity" => {
                self.utc_offset = activity_utc_offset(&message);
            }
            _ => {}
        }
    }

    fn add_record(&mut self, message: FitDataMessage) {
        let mut values: Vec<(String, Cell)> = vec![
            ("sport".to_string(), option_text(self.sport.clone())),
            ("sub_sport".to_string(), option_text(self.sub_sport.clone())),
        ];
        // Repeated field names keep the last value.
        for field in message.fields {
            translate::upsert(&mut values, field.name, Cell::from(field.value));
        }

        if self.options.opinionated {
            self.present_columns
                .extend(values.iter().map(|(key, _)| key.clone()));
            values = translate::translate_columns(
                values,
                &self.present_columns,
                self.options.allow_column_overwrites,
            );
        }

        if !self.options.include_unopinionated {
            values.retain(|(key, _)| translate::is_opinionated(key));
        }

        let mut timestamp = None;
        values.retain(|(key, cell)| {
            if key != "timestamp" {
                return true;
            }
            if let Cell::Timestamp(ts) = cell {
                timestamp = Some(ts.with_timezone(&Utc));
            }
            false
        });

        self.rows.push(PendingRow { timestamp, values });
    }

    fn add_lap(&mut self, message: &FitDataMessage) {
        let Some(start) = message
            .get_value("start_time")
            .and_then(FieldValue::as_timestamp)
        else {
            tracing::warn!("Skipping lap without a start_time");
            return;
        };
        self.laps.push(LapStart {
            start,
            trigger: text_value(message, "lap_trigger"),
        });
    }

    fn finish(self) -> ActivityFrame {
        let offset = self.utc_offset.unwrap_or_else(|| Utc.fix());

        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut rows: Vec<Row> = Vec::with_capacity(self.rows.len());
        let mut instants: Vec<Option<DateTime<Utc>>> = Vec::with_capacity(self.rows.len());

        for pending in self.rows {
            for (key, _) in &pending.values {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
            instants.push(pending.timestamp);
            rows.push(Row {
                timestamp: pending.timestamp.map(|ts| ts.with_timezone(&offset)),
                values: pending.values.into_iter().collect::<HashMap<_, _>>(),
            });
        }

        let mut previous: Option<DateTime<Utc>> = None;
        for (i, row) in rows.iter_mut().enumerate() {
            let duration = match (previous, instants[i]) {
                (Some(prev), Some(current)) if i > 0 => {
                    Cell::Float((current - prev).num_milliseconds() as f64 / 1000.0)
                }
                _ => Cell::Null,
            };
            row.values.insert(DURATION_COLUMN.to_string(), duration);
            previous = instants[i];
        }
        columns.push(DURATION_COLUMN.to_string());

        assign_laps(&mut rows, &instants, &self.laps);
        columns.push(LAP_COLUMN.to_string());
        columns.push(LAP_TRIGGER_COLUMN.to_string());

        if self.options.opinionated {
            rename_untranslated_columns(&mut columns, &mut rows);
        }

        for column in columns.iter().filter(|c| translate::is_float_column(c)) {
            for row in rows.iter_mut() {
                if let Some(cell) = row.values.remove(column) {
                    row.values.insert(column.clone(), cell.into_float());
                }
            }
        }

        let laps = self
            .laps
            .iter()
            .enumerate()
            .map(|(index, lap)| LapInfo {
                index,
                start_time: lap.start.with_timezone(&offset),
                trigger: lap.trigger.clone(),
            })
            .collect();

        let sessions = self
            .sessions
            .into_iter()
            .map(|mut session| {
                session.start_time = session.start_time.map(|ts| ts.with_timezone(&offset));
                session
            })
            .collect();

        let attrs = FrameAttrs {
            device: translate::parse_device_info(self.device.as_ref()),
            sport: self.sport,
            sub_sport: self.sub_sport,
            utc_offset_seconds: self.utc_offset.map(|o| o.local_minus_utc()),
            laps,
            sessions,
        };

        tracing::debug!(
            "Built frame with {} rows, {} columns, {} laps",
            rows.len(),
            columns.len(),
            attrs.laps.len()
        );

        ActivityFrame {
            columns,
            rows,
            attrs,
        }
    }
}

/// Lap `i` covers `[start_i, start_{i+1}]`, later laps winning on the shared
/// boundary; the last lap runs to the end of the activity. Laps are only
/// labelled once there are at least two lap starts to pair.
fn assign_laps(rows: &mut [Row], instants: &[Option<DateTime<Utc>>], laps: &[LapStart]) {
    for row in rows.iter_mut() {
        row.values.insert(LAP_COLUMN.to_string(), Cell::Null);
        row.values.insert(LAP_TRIGGER_COLUMN.to_string(), Cell::Null);
    }

    let Some(last) = laps.last().filter(|_| laps.len() >= 2) else {
        return;
    };

    for (index, pair) in laps.windows(2).enumerate() {
        let (start, end) = (pair[0].start, pair[1].start);
        label_rows(rows, instants, index, pair[0].trigger.as_deref(), |ts| {
            ts >= start && ts <= end
        });
    }

    let last_start = last.start;
    label_rows(rows, instants, laps.len() - 1, Some(FINAL_LAP_TRIGGER), |ts| {
        ts >= last_start
    });
}

fn label_rows(
    rows: &mut [Row],
    instants: &[Option<DateTime<Utc>>],
    index: usize,
    trigger: Option<&str>,
    in_lap: impl Fn(DateTime<Utc>) -> bool,
) {
    for (row, instant) in rows.iter_mut().zip(instants) {
        if instant.is_some_and(&in_lap) {
            row.values
                .insert(LAP_COLUMN.to_string(), Cell::Int(index as i64));
            row.values.insert(
                LAP_TRIGGER_COLUMN.to_string(),
                option_text(trigger.map(str::to_string)),
            );
        }
    }
}

fn rename_untranslated_columns(columns: &mut [String], rows: &mut [Row]) {
    for (source, target) in COLUMN_TRANSLATIONS {
        let has_source = columns.iter().any(|c| c == source);
        let has_target = columns.iter().any(|c| c == target);
        if !has_source || has_target {
            continue;
        }

        tracing::debug!("Renaming column {} -> {}", source, target);
        for column in columns.iter_mut().filter(|c| c.as_str() == *source) {
            *column = target.to_string();
        }
        for row in rows.iter_mut() {
            if let Some(cell) = row.values.remove(*source) {
                row.values.insert(target.to_string(), cell);
            }
        }
    }
}

fn activity_utc_offset(message: &FitDataMessage) -> Option<FixedOffset> {
    let local = message
        .get_value("local_timestamp")
        .and_then(FieldValue::as_local_timestamp)?;
    let utc = message
        .get_value("timestamp")
        .and_then(FieldValue::as_timestamp)?;
    let seconds = (local - utc.naive_utc()).num_seconds();
    let offset = i32::try_from(seconds).ok().and_then(FixedOffset::east_opt);
    if offset.is_none() {
        tracing::warn!("Ignoring out-of-range UTC offset of {}s", seconds);
    }
    offset
}

fn session_summary(message: &FitDataMessage) -> SessionSummary {
    let number = |name: &str| message.get_value(name).and_then(FieldValue::as_f64);
    SessionSummary {
        start_time: message
            .get_value("start_time")
            .and_then(FieldValue::as_timestamp)
            .map(|ts| ts.fixed_offset()),
        sport: text_value(message, "sport"),
        sub_sport: text_value(message, "sub_sport"),
        total_elapsed_time: number("total_elapsed_time"),
        total_timer_time: number("total_timer_time"),
        total_distance: number("total_distance"),
        avg_heart_rate: number("avg_heart_rate"),
        max_heart_rate: number("max_heart_rate"),
        avg_power: number("avg_power"),
    }
}

/// Field rendered as text; enum values without a profile name become numbers.
fn text_value(message: &FitDataMessage, name: &str) -> Option<String> {
    message.get_value(name).map(|v| v.to_string())
}

fn option_text(value: Option<String>) -> Cell {
    value.map(Cell::Text).unwrap_or(Cell::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::fixtures::{ActivityFixture, FixtureRecord};
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 5, 0, 0).unwrap()
    }

    fn records(count: u32) -> Vec<FixtureRecord> {
        (0..count)
            .map(|i| FixtureRecord {
                offset_secs: i,
                heart_rate: Some(120 + i as u8),
                enhanced_speed_mm_s: Some(3000 + i),
                stryd_power: Some(200 + i as u16),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_rows_and_opinionated_columns() {
        let bytes = ActivityFixture::new(start()).records(records(5)).build();
        let frame = read_fit(&bytes, &ReadOptions::default()).unwrap();

        assert_eq!(frame.len(), 5);
        assert!(frame.has_column("power"));
        assert!(frame.has_column("speed"));
        assert!(!frame.has_column("Power"));
        assert!(!frame.has_column("enhanced_speed"));
        assert!(!frame.has_column("timestamp"));
        assert_eq!(frame.rows[0].get("power"), Some(&Cell::Float(200.0)));
        assert_eq!(frame.rows[0].get("heart_rate"), Some(&Cell::Float(120.0)));
        assert_eq!(frame.rows[1].get("speed"), Some(&Cell::Float(3.001)));
        assert_eq!(frame.rows[0].get("sport"), Some(&Cell::Text("running".into())));
        assert_eq!(
            frame.rows[0].get("sub_sport"),
            Some(&Cell::Text("trail".into()))
        );
    }

    #[test]
    fn test_unopinionated_keeps_source_names() {
        let options = ReadOptions {
            opinionated: false,
            ..ReadOptions::default()
        };
        let bytes = ActivityFixture::new(start()).records(records(2)).build();
        let frame = read_fit(&bytes, &options).unwrap();

        assert!(frame.has_column("Power"));
        assert!(frame.has_column("enhanced_speed"));
        assert!(!frame.has_column("power"));
    }

    #[test]
    fn test_only_opinionated_columns() {
        let options = ReadOptions {
            include_unopinionated: false,
            ..ReadOptions::default()
        };
        let mut recs = records(2);
        recs[0].cadence = Some(85);
        recs[0].vertical_oscillation = Some(812);
        let bytes = ActivityFixture::new(start()).records(recs).build();
        let frame = read_fit(&bytes, &options).unwrap();

        assert!(frame.has_column("cadence"));
        assert!(!frame.has_column("vertical_oscillation"));
        for column in &frame.columns {
            assert!(
                translate::is_opinionated(column)
                    || [DURATION_COLUMN, LAP_COLUMN, LAP_TRIGGER_COLUMN].contains(&column.as_str()),
                "unexpected column {}",
                column
            );
        }
    }

    #[test]
    fn test_native_power_blocks_developer_rename() {
        let mut recs = records(3);
        for rec in recs.iter_mut() {
            rec.power = Some(300);
        }
        let bytes = ActivityFixture::new(start()).records(recs.clone()).build();

        let frame = read_fit(&bytes, &ReadOptions::default()).unwrap();
        assert!(frame.has_column("power"));
        assert!(frame.has_column("Power"));
        assert_eq!(frame.rows[0].get("power"), Some(&Cell::Float(300.0)));

        let overwrite = ReadOptions {
            allow_column_overwrites: true,
            ..ReadOptions::default()
        };
        let frame = read_fit(&bytes, &overwrite).unwrap();
        assert!(!frame.has_column("Power"));
        assert_eq!(frame.rows[0].get("power"), Some(&Cell::Float(200.0)));
    }

    #[test]
    fn test_duration_between_rows() {
        let mut recs = records(3);
        recs[2].offset_secs = 5;
        let bytes = ActivityFixture::new(start()).records(recs).build();
        let frame = read_fit(&bytes, &ReadOptions::default()).unwrap();

        let durations: Vec<&Cell> = frame.column("duration").collect();
        assert_eq!(
            durations,
            vec![&Cell::Null, &Cell::Float(1.0), &Cell::Float(4.0)]
        );
    }

    #[test]
    fn test_lap_assignment() {
        let bytes = ActivityFixture::new(start())
            .records(records(10))
            .lap(0, "manual")
            .lap(4, "distance")
            .lap(7, "time")
            .build();
        let frame = read_fit(&bytes, &ReadOptions::default()).unwrap();

        let laps: Vec<Option<f64>> = frame.column("lap").map(Cell::as_f64).collect();
        assert_eq!(
            laps,
            vec![
                Some(0.0),
                Some(0.0),
                Some(0.0),
                Some(0.0),
                Some(1.0),
                Some(1.0),
                Some(1.0),
                Some(2.0),
                Some(2.0),
                Some(2.0)
            ]
        );
        let triggers: Vec<Option<&str>> = frame.column("lap_trigger").map(Cell::as_str).collect();
        assert_eq!(triggers[0], Some("manual"));
        assert_eq!(triggers[4], Some("distance"));
        assert_eq!(triggers[6], Some("distance"));
        // last lap is always reported as manual
        assert_eq!(triggers[9], Some("manual"));
        assert_eq!(frame.attrs.laps.len(), 3);
        assert_eq!(frame.attrs.laps[2].trigger.as_deref(), Some("time"));
    }

    #[test]
    fn test_rows_before_first_lap_have_no_lap() {
        let bytes = ActivityFixture::new(start())
            .records(records(5))
            .lap(2, "manual")
            .lap(3, "distance")
            .build();
        let frame = read_fit(&bytes, &ReadOptions::default()).unwrap();

        let laps: Vec<&Cell> = frame.column("lap").collect();
        assert_eq!(
            laps,
            vec![&Cell::Null, &Cell::Null, &Cell::Int(0), &Cell::Int(1), &Cell::Int(1)]
        );
    }

    #[test]
    fn test_single_lap_leaves_columns_null() {
        let bytes = ActivityFixture::new(start())
            .records(records(3))
            .lap(0, "manual")
            .build();
        let frame = read_fit(&bytes, &ReadOptions::default()).unwrap();

        assert_eq!(frame.attrs.laps.len(), 1);
        assert!(frame.column("lap").all(Cell::is_null));
        assert!(frame.column("lap_trigger").all(Cell::is_null));
    }

    #[test]
    fn test_no_laps_leaves_columns_null() {
        let bytes = ActivityFixture::new(start()).records(records(2)).build();
        let frame = read_fit(&bytes, &ReadOptions::default()).unwrap();
        assert!(frame.has_column("lap"));
        assert!(frame.column("lap").all(Cell::is_null));
        assert!(frame.column("lap_trigger").all(Cell::is_null));
    }

    #[test]
    fn test_timezone_from_activity() {
        let bytes = ActivityFixture::new(start())
            .records(records(2))
            .utc_offset_hours(2)
            .build();
        let frame = read_fit(&bytes, &ReadOptions::default()).unwrap();

        assert_eq!(frame.attrs.utc_offset_seconds, Some(7200));
        let first = frame.start_time().unwrap();
        assert_eq!(first.offset().local_minus_utc(), 7200);
        assert_eq!(first.with_timezone(&Utc), start());
        assert_eq!(first.to_rfc3339(), "2024-06-01T07:00:00+02:00");
    }

    #[test]
    fn test_timestamps_stay_utc_without_activity() {
        let bytes = ActivityFixture::new(start()).records(records(1)).build();
        let frame = read_fit(&bytes, &ReadOptions::default()).unwrap();
        assert_eq!(frame.attrs.utc_offset_seconds, None);
        assert_eq!(frame.start_time().unwrap().offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_device_from_creator() {
        let bytes = ActivityFixture::new(start())
            .records(records(1))
            .garmin_creator(4315)
            .build();
        let frame = read_fit(&bytes, &ReadOptions::default()).unwrap();
        assert_eq!(frame.attrs.device.as_deref(), Some("garmin 4315"));
    }

    #[test]
    fn test_sessions_are_summarized() {
        let bytes = ActivityFixture::new(start())
            .records(records(3))
            .session(2, 123_456)
            .build();
        let frame = read_fit(&bytes, &ReadOptions::default()).unwrap();

        assert_eq!(frame.attrs.sessions.len(), 1);
        let session = &frame.attrs.sessions[0];
        assert_eq!(session.sport.as_deref(), Some("running"));
        assert_eq!(session.total_elapsed_time, Some(2.0));
        assert_eq!(session.total_distance, Some(1234.56));
    }

    #[test]
    fn test_empty_activity() {
        let bytes = ActivityFixture::new(start()).build();
        let frame = read_fit(&bytes, &ReadOptions::default()).unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.columns, vec!["duration", "lap", "lap_trigger"]);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let mut bytes = ActivityFixture::new(start()).records(records(2)).build();
        let len = bytes.len();
        bytes[len - 3] ^= 0x55;
        assert!(read_fit(&bytes, &ReadOptions::default()).is_err());
    }
}
