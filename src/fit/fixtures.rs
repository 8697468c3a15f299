//! Synthetic activity files for tests and demos.
//!
//! Produces a running activity laid out the way watches write them: file id,
//! creator device, developer field description, sport, records, then laps,
//! session and activity summaries.

use super::builder::{string_field, FitBuilder};
use super::profile::{enums, mesg_num};
use super::types::{utc_to_fit, BaseType};
use chrono::{DateTime, Duration, Utc};

const FILE_ID: u8 = 0;
const CREATOR: u8 = 1;
const FIELD_DESCRIPTION: u8 = 2;
const SPORT: u8 = 3;
const RECORD: u8 = 4;
const LAP: u8 = 5;
const SESSION: u8 = 6;
const ACTIVITY: u8 = 7;

/// One `record` message; `None` fields are written as invalid values.
#[derive(Debug, Clone, Default)]
pub struct FixtureRecord {
    pub offset_secs: u32,
    pub heart_rate: Option<u8>,
    pub enhanced_speed_mm_s: Option<u32>,
    pub power: Option<u16>,
    pub cadence: Option<u8>,
    pub vertical_oscillation: Option<u16>,
    /// Developer field named `Power`, as written by Stryd.
    pub stryd_power: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct ActivityFixture {
    start: DateTime<Utc>,
    records: Vec<FixtureRecord>,
    laps: Vec<(u32, &'static str)>,
    sessions: Vec<(u32, u32)>,
    utc_offset_hours: Option<i64>,
    garmin_product: Option<u16>,
}

impl ActivityFixture {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            records: Vec::new(),
            laps: Vec::new(),
            sessions: Vec::new(),
            utc_offset_hours: None,
            garmin_product: None,
        }
    }

    pub fn records(mut self, records: Vec<FixtureRecord>) -> Self {
        self.records = records;
        self
    }

    /// Lap starting `offset_secs` after the activity start.
    pub fn lap(mut self, offset_secs: u32, trigger: &'static str) -> Self {
        self.laps.push((offset_secs, trigger));
        self
    }

    /// Session lasting `elapsed_secs`, covering `distance_cm`.
    pub fn session(mut self, elapsed_secs: u32, distance_cm: u32) -> Self {
        self.sessions.push((elapsed_secs, distance_cm));
        self
    }

    /// Add an activity message whose local timestamp is this many hours ahead of UTC.
    pub fn utc_offset_hours(mut self, hours: i64) -> Self {
        self.utc_offset_hours = Some(hours);
        self
    }

    pub fn garmin_creator(mut self, product: u16) -> Self {
        self.garmin_product = Some(product);
        self
    }

    fn at(&self, offset_secs: u32) -> u32 {
        utc_to_fit(self.start + Duration::seconds(offset_secs as i64))
    }

    pub fn build(&self) -> Vec<u8> {
        let mut b = FitBuilder::new();
        let start = self.at(0);

        b.define(
            FILE_ID,
            mesg_num::FILE_ID,
            &[(0, BaseType::Enum), (1, BaseType::UInt16), (4, BaseType::UInt32)],
        );
        b.data(FILE_ID, &[&[4], &1u16.to_le_bytes(), &start.to_le_bytes()]);

        if let Some(product) = self.garmin_product {
            b.define(
                CREATOR,
                mesg_num::DEVICE_INFO,
                &[
                    (253, BaseType::UInt32),
                    (0, BaseType::UInt8),
                    (2, BaseType::UInt16),
                    (4, BaseType::UInt16),
                ],
            );
            b.data(
                CREATOR,
                &[&start.to_le_bytes(), &[0], &1u16.to_le_bytes(), &product.to_le_bytes()],
            );
        }

        b.define_sized(
            FIELD_DESCRIPTION,
            mesg_num::FIELD_DESCRIPTION,
            &[
                (0, 1, BaseType::UInt8),
                (1, 1, BaseType::UInt8),
                (2, 1, BaseType::UInt8),
                (3, 16, BaseType::String),
                (8, 16, BaseType::String),
            ],
        );
        b.data(
            FIELD_DESCRIPTION,
            &[
                &[0],
                &[0],
                &[BaseType::UInt16.as_u8()],
                &string_field("Power", 16),
                &string_field("Watts", 16),
            ],
        );

        b.define(SPORT, mesg_num::SPORT, &[(0, BaseType::Enum), (1, BaseType::Enum)]);
        b.data(SPORT, &[&[1], &[3]]);

        let columns = RecordColumns::of(&self.records);
        if !self.records.is_empty() {
            let mut fields: Vec<(u8, BaseType)> = vec![(253, BaseType::UInt32)];
            if columns.heart_rate {
                fields.push((3, BaseType::UInt8));
            }
            if columns.enhanced_speed {
                fields.push((73, BaseType::UInt32));
            }
            if columns.power {
                fields.push((7, BaseType::UInt16));
            }
            if columns.cadence {
                fields.push((4, BaseType::UInt8));
            }
            if columns.vertical_oscillation {
                fields.push((39, BaseType::UInt16));
            }
            let developer: &[(u8, u8, u8)] = if columns.stryd_power { &[(0, 2, 0)] } else { &[] };
            b.define_with_developer(RECORD, mesg_num::RECORD, &fields, developer);
        }
        for record in &self.records {
            let mut payload: Vec<u8> = self.at(record.offset_secs).to_le_bytes().to_vec();
            if columns.heart_rate {
                payload.push(record.heart_rate.unwrap_or(u8::MAX));
            }
            if columns.enhanced_speed {
                payload.extend(record.enhanced_speed_mm_s.unwrap_or(u32::MAX).to_le_bytes());
            }
            if columns.power {
                payload.extend(record.power.unwrap_or(u16::MAX).to_le_bytes());
            }
            if columns.cadence {
                payload.push(record.cadence.unwrap_or(u8::MAX));
            }
            if columns.vertical_oscillation {
                payload.extend(record.vertical_oscillation.unwrap_or(u16::MAX).to_le_bytes());
            }
            if columns.stryd_power {
                payload.extend(record.stryd_power.unwrap_or(u16::MAX).to_le_bytes());
            }
            b.data(RECORD, &[&payload]);
        }

        let end = self.at(self.records.last().map_or(0, |r| r.offset_secs));

        if !self.laps.is_empty() {
            b.define(
                LAP,
                mesg_num::LAP,
                &[(253, BaseType::UInt32), (2, BaseType::UInt32), (24, BaseType::Enum)],
            );
        }
        for (offset, trigger) in &self.laps {
            let trigger = enums::LAP_TRIGGER
                .iter()
                .find(|(_, name)| name == trigger)
                .map_or(u8::MAX, |(value, _)| *value as u8);
            b.data(
                LAP,
                &[&end.to_le_bytes(), &self.at(*offset).to_le_bytes(), &[trigger]],
            );
        }

        if !self.sessions.is_empty() {
            b.define(
                SESSION,
                mesg_num::SESSION,
                &[
                    (253, BaseType::UInt32),
                    (2, BaseType::UInt32),
                    (5, BaseType::Enum),
                    (7, BaseType::UInt32),
                    (9, BaseType::UInt32),
                ],
            );
        }
        for (elapsed_secs, distance_cm) in &self.sessions {
            b.data(
                SESSION,
                &[
                    &end.to_le_bytes(),
                    &start.to_le_bytes(),
                    &[1],
                    &(elapsed_secs * 1000).to_le_bytes(),
                    &distance_cm.to_le_bytes(),
                ],
            );
        }

        if let Some(hours) = self.utc_offset_hours {
            let local = (end as i64 + hours * 3600) as u32;
            b.define(
                ACTIVITY,
                mesg_num::ACTIVITY,
                &[(253, BaseType::UInt32), (5, BaseType::UInt32)],
            );
            b.data(ACTIVITY, &[&end.to_le_bytes(), &local.to_le_bytes()]);
        }

        b.finish()
    }
}

/// Which optional record fields appear in at least one record.
struct RecordColumns {
    heart_rate: bool,
    enhanced_speed: bool,
    power: bool,
    cadence: bool,
    vertical_oscillation: bool,
    stryd_power: bool,
}

impl RecordColumns {
    fn of(records: &[FixtureRecord]) -> Self {
        Self {
            heart_rate: records.iter().any(|r| r.heart_rate.is_some()),
            enhanced_speed: records.iter().any(|r| r.enhanced_speed_mm_s.is_some()),
            power: records.iter().any(|r| r.power.is_some()),
            cadence: records.iter().any(|r| r.cadence.is_some()),
            vertical_oscillation: records.iter().any(|r| r.vertical_oscillation.is_some()),
            stryd_power: records.iter().any(|r| r.stryd_power.is_some()),
        }
    }
}
