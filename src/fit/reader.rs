use super::crc;
use super::error::{FitError, Result};
use super::profile::{self, enums, mesg_num, FieldDef, FieldKind, TIMESTAMP_FIELD};
use super::types::{fit_to_local, fit_to_utc, BaseType, FieldValue, RawValue, MIN_ABSOLUTE_DATE_TIME};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::collections::HashMap;
use std::rc::Rc;

const SIGNATURE: &[u8; 4] = b".FIT";
const CRC_SIZE: usize = 2;
const LOCAL_TYPES: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Verify header and file CRCs.
    pub check_crc: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { check_crc: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitHeader {
    pub header_size: u8,
    pub protocol_version: u8,
    pub profile_version: u16,
    pub data_size: u32,
    pub crc: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub number: u8,
    pub size: u8,
    pub base_type: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeveloperFieldDefinition {
    pub number: u8,
    pub size: u8,
    pub developer_data_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDefinition {
    pub local_type: u8,
    pub big_endian: bool,
    pub global_number: u16,
    pub fields: Vec<FieldDefinition>,
    pub developer_fields: Vec<DeveloperFieldDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitField {
    pub name: String,
    pub number: u8,
    pub value: Option<FieldValue>,
    pub units: Option<String>,
    pub is_developer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitDataMessage {
    pub global_number: u16,
    /// Profile name, `None` for messages outside the known profile.
    pub name: Option<&'static str>,
    pub local_type: u8,
    pub fields: Vec<FitField>,
}

impl FitDataMessage {
    pub fn get_field(&self, name: &str) -> Option<&FitField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Value of a named field; `None` when absent or invalid.
    pub fn get_value(&self, name: &str) -> Option<&FieldValue> {
        self.get_field(name).and_then(|f| f.value.as_ref())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitFrame {
    Header(FitHeader),
    Definition(MessageDefinition),
    Data(FitDataMessage),
    Crc(u16),
}

/// Developer field metadata announced by a `field_description` message.
#[derive(Debug, Clone)]
struct DeveloperField {
    name: String,
    base_type: u8,
    scale: Option<f64>,
    offset: Option<f64>,
    units: Option<String>,
}

/// Per-file decoder state, reset at every chained file boundary.
#[derive(Default)]
struct FileState {
    data_end: usize,
    definitions: [Option<Rc<MessageDefinition>>; LOCAL_TYPES],
    developer_fields: HashMap<(u8, u8), DeveloperField>,
    last_timestamp: Option<u32>,
}

/// Streaming decoder over an in-memory FIT buffer.
///
/// Yields every frame of every chained FIT file in order. After the first
/// error the iterator is exhausted.
pub struct FitReader<'a> {
    data: &'a [u8],
    pos: usize,
    options: DecodeOptions,
    file_start: usize,
    state: Option<FileState>,
    failed: bool,
}

impl<'a> FitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_options(data, DecodeOptions::default())
    }

    pub fn with_options(data: &'a [u8], options: DecodeOptions) -> Self {
        Self {
            data,
            pos: 0,
            options,
            file_start: 0,
            state: None,
            failed: false,
        }
    }

    fn take(&mut self, n: usize, limit: usize) -> Result<&'a [u8]> {
        if self.pos + n > limit {
            return Err(FitError::UnexpectedEof {
                offset: self.pos,
                needed: self.pos + n - limit,
            });
        }
        let data = self.data;
        let slice = &data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_header(&mut self) -> Result<(FitHeader, FileState)> {
        let start = self.pos;
        let header_size = self.data[start] as usize;
        if header_size != 12 && header_size != 14 {
            return Err(FitError::InvalidHeader {
                reason: format!("unsupported header size {}", header_size),
            });
        }

        let bytes = self.take(header_size, self.data.len())?;
        if &bytes[8..12] != SIGNATURE {
            return Err(FitError::InvalidHeader {
                reason: "missing .FIT signature".to_string(),
            });
        }

        let crc = if header_size == 14 {
            let expected = LittleEndian::read_u16(&bytes[12..14]);
            if expected != 0 && self.options.check_crc {
                let computed = crc::checksum(&bytes[..12]);
                if computed != expected {
                    return Err(FitError::HeaderCrcMismatch { expected, computed });
                }
            }
            Some(expected)
        } else {
            None
        };

        let header = FitHeader {
            header_size: bytes[0],
            protocol_version: bytes[1],
            profile_version: LittleEndian::read_u16(&bytes[2..4]),
            data_size: LittleEndian::read_u32(&bytes[4..8]),
            crc,
        };

        let data_end = self.pos + header.data_size as usize;
        if data_end + CRC_SIZE > self.data.len() {
            return Err(FitError::UnexpectedEof {
                offset: self.pos,
                needed: data_end + CRC_SIZE - self.data.len(),
            });
        }

        tracing::debug!(
            "FIT header: protocol {}, profile {}, {} data bytes",
            header.protocol_version,
            header.profile_version,
            header.data_size
        );

        self.file_start = start;
        let state = FileState {
            data_end,
            ..FileState::default()
        };
        Ok((header, state))
    }

    fn read_crc(&mut self) -> Result<u16> {
        let data_end = self.pos;
        let bytes = self.take(CRC_SIZE, self.data.len())?;
        let expected = LittleEndian::read_u16(bytes);
        if self.options.check_crc {
            let computed = crc::checksum(&self.data[self.file_start..data_end]);
            if computed != expected {
                return Err(FitError::CrcMismatch { expected, computed });
            }
        }
        Ok(expected)
    }

    fn read_record(&mut self, state: &mut FileState) -> Result<FitFrame> {
        let limit = state.data_end;
        let header = self.take(1, limit)?[0];

        if header & 0x80 != 0 {
            let local_type = (header >> 5) & 0x03;
            let offset = (header & 0x1F) as u32;
            let timestamp = resolve_compressed_timestamp(state.last_timestamp.unwrap_or(0), offset);
            state.last_timestamp = Some(timestamp);
            let message = self.read_data_message(state, local_type, Some(timestamp))?;
            return Ok(FitFrame::Data(message));
        }

        let local_type = header & 0x0F;
        if header & 0x40 != 0 {
            let has_developer_data = header & 0x20 != 0;
            let definition = self.read_definition(local_type, has_developer_data, limit)?;
            state.definitions[local_type as usize] = Some(Rc::new(definition.clone()));
            Ok(FitFrame::Definition(definition))
        } else {
            let message = self.read_data_message(state, local_type, None)?;
            Ok(FitFrame::Data(message))
        }
    }

    fn read_definition(
        &mut self,
        local_type: u8,
        has_developer_data: bool,
        limit: usize,
    ) -> Result<MessageDefinition> {
        let fixed = self.take(5, limit)?;
        let big_endian = fixed[1] == 1;
        let global_number = if big_endian {
            BigEndian::read_u16(&fixed[2..4])
        } else {
            LittleEndian::read_u16(&fixed[2..4])
        };
        let num_fields = fixed[4] as usize;

        let fields = self
            .take(num_fields * 3, limit)?
            .chunks_exact(3)
            .map(|c| FieldDefinition {
                number: c[0],
                size: c[1],
                base_type: c[2],
            })
            .collect();

        let developer_fields = if has_developer_data {
            let count = self.take(1, limit)?[0] as usize;
            self.take(count * 3, limit)?
                .chunks_exact(3)
                .map(|c| DeveloperFieldDefinition {
                    number: c[0],
                    size: c[1],
                    developer_data_index: c[2],
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(MessageDefinition {
            local_type,
            big_endian,
            global_number,
            fields,
            developer_fields,
        })
    }

    fn read_data_message(
        &mut self,
        state: &mut FileState,
        local_type: u8,
        compressed_timestamp: Option<u32>,
    ) -> Result<FitDataMessage> {
        let definition = state.definitions[local_type as usize]
            .clone()
            .ok_or(FitError::UndefinedLocalMessage(local_type))?;
        let profile = profile::message(definition.global_number);
        let limit = state.data_end;

        let mut fields = Vec::with_capacity(definition.fields.len() + 1);
        let mut manufacturer = None;

        for field_def in &definition.fields {
            let bytes = self.take(field_def.size as usize, limit)?;
            let base_type = base_type_or_byte(field_def.base_type);
            let raw = decode_raw(base_type, bytes, definition.big_endian);

            if field_def.number == TIMESTAMP_FIELD {
                if let Some(ts) = raw.as_ref().and_then(single_unsigned) {
                    state.last_timestamp = Some(ts as u32);
                }
            }

            let field_profile = profile.and_then(|p| p.field(field_def.number));
            if field_profile.is_some_and(|f| f.name == "manufacturer") {
                manufacturer = raw.as_ref().and_then(single_unsigned);
            }

            let value = raw.and_then(|raw| apply_profile(raw, field_profile));
            fields.push(FitField {
                name: field_profile
                    .map(|f| f.name.to_string())
                    .unwrap_or_else(|| format!("unknown_{}", field_def.number)),
                number: field_def.number,
                value,
                units: field_profile.and_then(|f| f.units).map(str::to_string),
                is_developer: false,
            });
        }

        for dev_def in &definition.developer_fields {
            let bytes = self.take(dev_def.size as usize, limit)?;
            fields.push(decode_developer_field(state, dev_def, bytes, definition.big_endian));
        }

        if let Some(ts) = compressed_timestamp {
            fields.retain(|f| f.number != TIMESTAMP_FIELD || f.is_developer);
            fields.push(FitField {
                name: "timestamp".to_string(),
                number: TIMESTAMP_FIELD,
                value: fit_to_utc(ts).map(FieldValue::Timestamp),
                units: None,
                is_developer: false,
            });
        }

        if definition.global_number == mesg_num::DEVICE_INFO
            || definition.global_number == mesg_num::FILE_ID
        {
            if manufacturer.is_some_and(|m| enums::GARMIN_PRODUCT_MANUFACTURERS.contains(&m)) {
                for field in fields.iter_mut().filter(|f| f.name == "product") {
                    field.name = "garmin_product".to_string();
                }
            }
        }

        let message = FitDataMessage {
            global_number: definition.global_number,
            name: profile.map(|p| p.name),
            local_type,
            fields,
        };

        if definition.global_number == mesg_num::FIELD_DESCRIPTION {
            register_developer_field(state, &message);
        }

        Ok(message)
    }
}

impl Iterator for FitReader<'_> {
    type Item = Result<FitFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = match self.state.take() {
            None => {
                if self.pos >= self.data.len() {
                    return None;
                }
                self.read_header().map(|(header, state)| {
                    self.state = Some(state);
                    FitFrame::Header(header)
                })
            }
            Some(mut state) if self.pos < state.data_end => {
                let frame = self.read_record(&mut state);
                self.state = Some(state);
                frame
            }
            Some(_) => self.read_crc().map(FitFrame::Crc),
        };

        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Decode every frame in `data`.
pub fn decode(data: &[u8]) -> Result<Vec<FitFrame>> {
    FitReader::new(data).collect()
}

/// Resolve a 5-bit compressed time offset against the last full timestamp.
pub fn resolve_compressed_timestamp(last: u32, offset: u32) -> u32 {
    let base = last & !0x1F;
    if offset >= (last & 0x1F) {
        base.wrapping_add(offset)
    } else {
        base.wrapping_add(offset).wrapping_add(0x20)
    }
}

fn base_type_or_byte(byte: u8) -> BaseType {
    BaseType::from_u8(byte).unwrap_or_else(|e| {
        tracing::debug!("{}, decoding as bytes", e);
        BaseType::Byte
    })
}

/// Intermediate decode result for one field.
#[derive(Debug, Clone)]
enum Raw {
    /// `None` marks an invalid element; positions are preserved.
    Numbers(Vec<Option<RawValue>>),
    Text(Vec<String>),
    Bytes(Vec<u8>),
}

fn single_unsigned(raw: &Raw) -> Option<u64> {
    match raw {
        Raw::Numbers(values) if values.len() == 1 => values[0].and_then(|v| v.as_u64()),
        _ => None,
    }
}

fn decode_raw(base_type: BaseType, bytes: &[u8], big_endian: bool) -> Option<Raw> {
    match base_type {
        BaseType::String => {
            let strings: Vec<String> = bytes
                .split(|b| *b == 0)
                .filter(|s| !s.is_empty())
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect();
            (!strings.is_empty()).then_some(Raw::Text(strings))
        }
        BaseType::Byte => bytes
            .iter()
            .any(|b| *b != 0xFF)
            .then(|| Raw::Bytes(bytes.to_vec())),
        _ => {
            let size = base_type.size();
            if bytes.is_empty() || bytes.len() % size != 0 {
                return Some(Raw::Bytes(bytes.to_vec()));
            }
            let values: Vec<Option<RawValue>> = bytes
                .chunks_exact(size)
                .map(|chunk| {
                    if big_endian {
                        read_element::<BigEndian>(base_type, chunk)
                    } else {
                        read_element::<LittleEndian>(base_type, chunk)
                    }
                })
                .collect();
            values
                .iter()
                .any(Option::is_some)
                .then_some(Raw::Numbers(values))
        }
    }
}

/// Read one element, returning `None` for the base type's invalid sentinel.
fn read_element<B: ByteOrder>(base_type: BaseType, b: &[u8]) -> Option<RawValue> {
    match base_type {
        BaseType::Enum | BaseType::UInt8 | BaseType::Byte => {
            (b[0] != u8::MAX).then_some(RawValue::Unsigned(b[0] as u64))
        }
        BaseType::UInt8z => (b[0] != 0).then_some(RawValue::Unsigned(b[0] as u64)),
        BaseType::SInt8 => {
            let v = b[0] as i8;
            (v != i8::MAX).then_some(RawValue::Signed(v as i64))
        }
        BaseType::SInt16 => {
            let v = B::read_i16(b);
            (v != i16::MAX).then_some(RawValue::Signed(v as i64))
        }
        BaseType::UInt16 => {
            let v = B::read_u16(b);
            (v != u16::MAX).then_some(RawValue::Unsigned(v as u64))
        }
        BaseType::UInt16z => {
            let v = B::read_u16(b);
            (v != 0).then_some(RawValue::Unsigned(v as u64))
        }
        BaseType::SInt32 => {
            let v = B::read_i32(b);
            (v != i32::MAX).then_some(RawValue::Signed(v as i64))
        }
        BaseType::UInt32 => {
            let v = B::read_u32(b);
            (v != u32::MAX).then_some(RawValue::Unsigned(v as u64))
        }
        BaseType::UInt32z => {
            let v = B::read_u32(b);
            (v != 0).then_some(RawValue::Unsigned(v as u64))
        }
        BaseType::Float32 => {
            let bits = B::read_u32(b);
            (bits != u32::MAX).then(|| RawValue::Float(f32::from_bits(bits) as f64))
        }
        BaseType::Float64 => {
            let bits = B::read_u64(b);
            (bits != u64::MAX).then(|| RawValue::Float(f64::from_bits(bits)))
        }
        BaseType::SInt64 => {
            let v = B::read_i64(b);
            (v != i64::MAX).then_some(RawValue::Signed(v))
        }
        BaseType::UInt64 => {
            let v = B::read_u64(b);
            (v != u64::MAX).then_some(RawValue::Unsigned(v))
        }
        BaseType::UInt64z => {
            let v = B::read_u64(b);
            (v != 0).then_some(RawValue::Unsigned(v))
        }
        BaseType::String => None,
    }
}

fn apply_profile(raw: Raw, field: Option<&FieldDef>) -> Option<FieldValue> {
    match raw {
        Raw::Text(mut strings) => {
            if strings.len() == 1 {
                strings.pop().map(FieldValue::Text)
            } else {
                Some(FieldValue::Array(
                    strings.into_iter().map(FieldValue::Text).collect(),
                ))
            }
        }
        Raw::Bytes(bytes) => Some(FieldValue::Bytes(bytes)),
        Raw::Numbers(values) => {
            collect_numbers(values, |v| convert_number(v, field))
        }
    }
}

/// A single element becomes a scalar; arrays keep invalid slots as `Null`.
fn collect_numbers(
    mut values: Vec<Option<RawValue>>,
    convert: impl Fn(RawValue) -> Option<FieldValue>,
) -> Option<FieldValue> {
    if values.len() == 1 {
        return values.pop().flatten().and_then(convert);
    }
    Some(FieldValue::Array(
        values
            .into_iter()
            .map(|v| v.and_then(&convert).unwrap_or(FieldValue::Null))
            .collect(),
    ))
}

fn convert_number(value: RawValue, field: Option<&FieldDef>) -> Option<FieldValue> {
    let Some(field) = field else {
        return Some(value.into_field_value());
    };

    match field.kind {
        FieldKind::DateTime => match value.as_u64() {
            Some(secs) if secs >= MIN_ABSOLUTE_DATE_TIME as u64 => {
                fit_to_utc(secs as u32).map(FieldValue::Timestamp)
            }
            _ => Some(value.into_field_value()),
        },
        FieldKind::LocalDateTime => value
            .as_u64()
            .and_then(|secs| fit_to_local(secs as u32))
            .map(FieldValue::LocalTimestamp),
        FieldKind::Semicircles => Some(FieldValue::Float(
            value.as_f64() * profile::SEMICIRCLES_TO_DEGREES,
        )),
        FieldKind::Enum(table) => Some(
            value
                .as_u64()
                .and_then(|v| enums::lookup(table, v))
                .map(|name| FieldValue::Text(name.to_string()))
                .unwrap_or_else(|| value.into_field_value()),
        ),
        FieldKind::Plain => Some(scale_value(value, field.scale, field.offset)),
    }
}

fn scale_value(value: RawValue, scale: f64, offset: f64) -> FieldValue {
    if scale == 1.0 && offset == 0.0 {
        value.into_field_value()
    } else {
        FieldValue::Float(value.as_f64() / scale - offset)
    }
}

fn decode_developer_field(
    state: &FileState,
    def: &DeveloperFieldDefinition,
    bytes: &[u8],
    big_endian: bool,
) -> FitField {
    let Some(dev) = state
        .developer_fields
        .get(&(def.developer_data_index, def.number))
    else {
        return FitField {
            name: format!("unknown_dev_{}_{}", def.developer_data_index, def.number),
            number: def.number,
            value: bytes
                .iter()
                .any(|b| *b != 0xFF)
                .then(|| FieldValue::Bytes(bytes.to_vec())),
            units: None,
            is_developer: true,
        };
    };

    let base_type = base_type_or_byte(dev.base_type);
    let value = decode_raw(base_type, bytes, big_endian).and_then(|raw| match raw {
        Raw::Numbers(values) => {
            let scale = dev.scale.filter(|s| *s != 0.0).unwrap_or(1.0);
            let offset = dev.offset.unwrap_or(0.0);
            collect_numbers(values, |v| Some(scale_value(v, scale, offset)))
        }
        other => apply_profile(other, None),
    });

    FitField {
        name: dev.name.clone(),
        number: def.number,
        value,
        units: dev.units.clone(),
        is_developer: true,
    }
}

fn register_developer_field(state: &mut FileState, message: &FitDataMessage) {
    let index = message
        .get_value("developer_data_index")
        .and_then(FieldValue::as_i64);
    let number = message
        .get_value("field_definition_number")
        .and_then(FieldValue::as_i64);
    let base_type = message
        .get_value("fit_base_type_id")
        .and_then(FieldValue::as_i64);

    let (Some(index), Some(number), Some(base_type)) = (index, number, base_type) else {
        tracing::warn!("Ignoring incomplete field_description message");
        return;
    };

    let name = message
        .get_value("field_name")
        .and_then(FieldValue::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("unknown_dev_{}_{}", index, number));

    tracing::debug!("Developer field {}:{} -> {}", index, number, name);

    state.developer_fields.insert(
        (index as u8, number as u8),
        DeveloperField {
            name,
            base_type: base_type as u8,
            scale: message.get_value("scale").and_then(FieldValue::as_f64),
            offset: message.get_value("offset").and_then(FieldValue::as_f64),
            units: message
                .get_value("units")
                .and_then(FieldValue::as_str)
                .map(str::to_string),
        },
    );
}
