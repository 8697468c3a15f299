use super::error::{FitError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;

/// `date_time` values below this are relative to device power-on, not the FIT epoch.
pub const MIN_ABSOLUTE_DATE_TIME: u32 = 0x1000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Enum,
    SInt8,
    UInt8,
    SInt16,
    UInt16,
    SInt32,
    UInt32,
    String,
    Float32,
    Float64,
    UInt8z,
    UInt16z,
    UInt32z,
    Byte,
    SInt64,
    UInt64,
    UInt64z,
}

impl BaseType {
    /// Decode a base type byte. The endian-ability bit (0x80) is ignored.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value & 0x1F {
            0 => Ok(BaseType::Enum),
            1 => Ok(BaseType::SInt8),
            2 => Ok(BaseType::UInt8),
            3 => Ok(BaseType::SInt16),
            4 => Ok(BaseType::UInt16),
            5 => Ok(BaseType::SInt32),
            6 => Ok(BaseType::UInt32),
            7 => Ok(BaseType::String),
            8 => Ok(BaseType::Float32),
            9 => Ok(BaseType::Float64),
            10 => Ok(BaseType::UInt8z),
            11 => Ok(BaseType::UInt16z),
            12 => Ok(BaseType::UInt32z),
            13 => Ok(BaseType::Byte),
            14 => Ok(BaseType::SInt64),
            15 => Ok(BaseType::UInt64),
            16 => Ok(BaseType::UInt64z),
            _ => Err(FitError::InvalidBaseType(value)),
        }
    }

    /// Base type byte as written in definition messages.
    pub fn as_u8(self) -> u8 {
        match self {
            BaseType::Enum => 0x00,
            BaseType::SInt8 => 0x01,
            BaseType::UInt8 => 0x02,
            BaseType::SInt16 => 0x83,
            BaseType::UInt16 => 0x84,
            BaseType::SInt32 => 0x85,
            BaseType::UInt32 => 0x86,
            BaseType::String => 0x07,
            BaseType::Float32 => 0x88,
            BaseType::Float64 => 0x89,
            BaseType::UInt8z => 0x0A,
            BaseType::UInt16z => 0x8B,
            BaseType::UInt32z => 0x8C,
            BaseType::Byte => 0x0D,
            BaseType::SInt64 => 0x8E,
            BaseType::UInt64 => 0x8F,
            BaseType::UInt64z => 0x90,
        }
    }

    pub fn size(self) -> usize {
        match self {
            BaseType::Enum
            | BaseType::SInt8
            | BaseType::UInt8
            | BaseType::String
            | BaseType::UInt8z
            | BaseType::Byte => 1,
            BaseType::SInt16 | BaseType::UInt16 | BaseType::UInt16z => 2,
            BaseType::SInt32
            | BaseType::UInt32
            | BaseType::Float32
            | BaseType::UInt32z => 4,
            BaseType::Float64 | BaseType::SInt64 | BaseType::UInt64 | BaseType::UInt64z => 8,
        }
    }
}

/// A single decoded element before profile conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl RawValue {
    pub fn as_f64(self) -> f64 {
        match self {
            RawValue::Signed(v) => v as f64,
            RawValue::Unsigned(v) => v as f64,
            RawValue::Float(v) => v,
        }
    }

    pub fn as_u64(self) -> Option<u64> {
        match self {
            RawValue::Signed(v) => u64::try_from(v).ok(),
            RawValue::Unsigned(v) => Some(v),
            RawValue::Float(_) => None,
        }
    }

    pub fn into_field_value(self) -> FieldValue {
        match self {
            RawValue::Signed(v) => FieldValue::Int(v),
            RawValue::Unsigned(v) => FieldValue::Int(v as i64),
            RawValue::Float(v) => FieldValue::Float(v),
        }
    }
}

/// A decoded field value after scale, offset and enum names have been applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    LocalTimestamp(NaiveDateTime),
    Array(Vec<FieldValue>),
    Bytes(Vec<u8>),
    /// Invalid element inside an array.
    Null,
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_local_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::LocalTimestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
            FieldValue::LocalTimestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S")),
            FieldValue::Array(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join("|"))
            }
            FieldValue::Bytes(bytes) => {
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            FieldValue::Null => Ok(()),
        }
    }
}

/// Convert a FIT `date_time` to UTC.
pub fn fit_to_utc(seconds: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(FIT_EPOCH_OFFSET + seconds as i64, 0)
}

/// Convert a FIT `local_date_time` to a naive wall-clock time.
pub fn fit_to_local(seconds: u32) -> Option<NaiveDateTime> {
    fit_to_utc(seconds).map(|ts| ts.naive_utc())
}

/// Convert a UTC instant to FIT `date_time` seconds.
pub fn utc_to_fit(ts: DateTime<Utc>) -> u32 {
    (ts.timestamp() - FIT_EPOCH_OFFSET).clamp(0, u32::MAX as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_base_type_byte_round_trip() {
        for byte in [0x00u8, 0x02, 0x84, 0x86, 0x07, 0x88, 0x8C, 0x0D, 0x90] {
            let base = BaseType::from_u8(byte).unwrap();
            assert_eq!(base.as_u8(), byte);
        }
        assert!(matches!(
            BaseType::from_u8(0x1F),
            Err(FitError::InvalidBaseType(0x1F))
        ));
    }

    #[test]
    fn test_fit_epoch() {
        assert_eq!(
            fit_to_utc(0).unwrap(),
            Utc.with_ymd_and_hms(1989, 12, 31, 0, 0, 0).unwrap()
        );
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 6, 30, 0).unwrap();
        assert_eq!(fit_to_utc(utc_to_fit(ts)).unwrap(), ts);
    }

    #[test]
    fn test_display_array_and_bytes() {
        let arr = FieldValue::Array(vec![FieldValue::Int(1), FieldValue::Float(2.5)]);
        assert_eq!(arr.to_string(), "1|2.5");
        assert_eq!(FieldValue::Bytes(vec![0xab, 0x01]).to_string(), "ab01");
    }
}
