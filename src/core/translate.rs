//! Opinionated column naming for activity tables.

use std::collections::HashSet;

/// Source name -> common name. Order matters for the final rename pass.
pub const COLUMN_TRANSLATIONS: &[(&str, &str)] = &[
    ("enhanced_speed", "speed"),
    ("position_lat", "latitude"),
    ("position_long", "longitude"),
    ("enhanced_altitude", "altitude"),
    ("saturated_hemoglobin_percent", "smo2"),
    // developer fields, e.g. Stryd
    ("Power", "power"),
    ("Cadence", "cadence"),
];

pub const OPINIONATED_COLUMNS: &[&str] = &[
    "timestamp",
    "sport",
    "sub_sport",
    "power",
    "speed",
    "distance",
    "longitude",
    "latitude",
    "altitude",
    "heart_rate",
    "cadence",
    "temperature",
    "core_temperature",
    "smo2",
];

pub const FLOAT_COLUMNS: &[&str] = &[
    "power",
    "speed",
    "distance",
    "heart_rate",
    "cadence",
    "temperature",
    "core_temperature",
    "smo2",
];

pub fn translation(column: &str) -> Option<&'static str> {
    COLUMN_TRANSLATIONS
        .iter()
        .find(|(source, _)| *source == column)
        .map(|(_, target)| *target)
}

pub fn is_opinionated(column: &str) -> bool {
    OPINIONATED_COLUMNS.contains(&column)
}

pub fn is_float_column(column: &str) -> bool {
    FLOAT_COLUMNS.contains(&column)
}

/// Insert or replace, keeping the position of the first insertion.
pub fn upsert<V>(values: &mut Vec<(String, V)>, key: String, value: V) {
    match values.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => values.push((key, value)),
    }
}

/// Rename keys that have a translation, unless the translated name is
/// already a present column and overwrites are not allowed.
pub fn translate_columns<V>(
    values: Vec<(String, V)>,
    present_columns: &HashSet<String>,
    allow_column_overwrites: bool,
) -> Vec<(String, V)> {
    let mut translated = Vec::with_capacity(values.len());
    for (key, value) in values {
        let key = match translation(&key) {
            Some(target) if allow_column_overwrites || !present_columns.contains(target) => {
                target.to_string()
            }
            _ => key,
        };
        upsert(&mut translated, key, value);
    }
    translated
}

/// Creator device fields relevant for naming the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub manufacturer: Option<String>,
    pub garmin_product: Option<String>,
    pub product_name: Option<String>,
    pub descriptor: Option<String>,
    pub device_name: Option<String>,
    pub serial_number: Option<String>,
}

pub fn parse_device_info(info: Option<&DeviceInfo>) -> Option<String> {
    let info = info?;

    if info.manufacturer.as_deref() == Some("garmin") {
        if let Some(product) = &info.garmin_product {
            return Some(format!("garmin {}", product));
        }
    }

    info.product_name
        .clone()
        .or_else(|| info.descriptor.clone())
        .or_else(|| info.device_name.clone())
}
