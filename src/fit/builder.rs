//! Minimal FIT encoder for building fixtures.
//!
//! Field payloads are passed as raw little-endian bytes (big-endian for
//! definitions made with [`FitBuilder::define_big_endian`]); the builder only
//! frames records and computes CRCs.

use super::crc;
use super::types::BaseType;

const PROTOCOL_VERSION: u8 = 0x20;
const PROFILE_VERSION: u16 = 2132;

#[derive(Debug, Default, Clone)]
pub struct FitBuilder {
    records: Vec<u8>,
}

impl FitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a local message whose fields use their base type's natural size.
    pub fn define(&mut self, local_type: u8, global: u16, fields: &[(u8, BaseType)]) -> &mut Self {
        let sized: Vec<(u8, u8, BaseType)> = fields
            .iter()
            .map(|(number, base)| (*number, base.size() as u8, *base))
            .collect();
        self.write_definition(local_type, global, false, &sized, &[])
    }

    pub fn define_sized(
        &mut self,
        local_type: u8,
        global: u16,
        fields: &[(u8, u8, BaseType)],
    ) -> &mut Self {
        self.write_definition(local_type, global, false, fields, &[])
    }

    pub fn define_big_endian(
        &mut self,
        local_type: u8,
        global: u16,
        fields: &[(u8, BaseType)],
    ) -> &mut Self {
        let sized: Vec<(u8, u8, BaseType)> = fields
            .iter()
            .map(|(number, base)| (*number, base.size() as u8, *base))
            .collect();
        self.write_definition(local_type, global, true, &sized, &[])
    }

    /// Developer fields are `(field_number, size, developer_data_index)`.
    pub fn define_with_developer(
        &mut self,
        local_type: u8,
        global: u16,
        fields: &[(u8, BaseType)],
        developer_fields: &[(u8, u8, u8)],
    ) -> &mut Self {
        let sized: Vec<(u8, u8, BaseType)> = fields
            .iter()
            .map(|(number, base)| (*number, base.size() as u8, *base))
            .collect();
        self.write_definition(local_type, global, false, &sized, developer_fields)
    }

    fn write_definition(
        &mut self,
        local_type: u8,
        global: u16,
        big_endian: bool,
        fields: &[(u8, u8, BaseType)],
        developer_fields: &[(u8, u8, u8)],
    ) -> &mut Self {
        let mut header = 0x40 | (local_type & 0x0F);
        if !developer_fields.is_empty() {
            header |= 0x20;
        }
        self.records.push(header);
        self.records.push(0);
        self.records.push(u8::from(big_endian));
        if big_endian {
            self.records.extend_from_slice(&global.to_be_bytes());
        } else {
            self.records.extend_from_slice(&global.to_le_bytes());
        }
        self.records.push(fields.len() as u8);
        for (number, size, base) in fields {
            self.records.extend_from_slice(&[*number, *size, base.as_u8()]);
        }
        if !developer_fields.is_empty() {
            self.records.push(developer_fields.len() as u8);
            for (number, size, index) in developer_fields {
                self.records.extend_from_slice(&[*number, *size, *index]);
            }
        }
        self
    }

    /// Append a data message; `fields` are concatenated in definition order.
    pub fn data(&mut self, local_type: u8, fields: &[&[u8]]) -> &mut Self {
        self.records.push(local_type & 0x0F);
        for field in fields {
            self.records.extend_from_slice(field);
        }
        self
    }

    /// Append a data message with a compressed timestamp header.
    pub fn compressed(&mut self, local_type: u8, time_offset: u8, fields: &[&[u8]]) -> &mut Self {
        self.records
            .push(0x80 | ((local_type & 0x03) << 5) | (time_offset & 0x1F));
        for field in fields {
            self.records.extend_from_slice(field);
        }
        self
    }

    /// Frame the records with a 14-byte header and both CRCs.
    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.records.len() + 16);
        out.push(14);
        out.push(PROTOCOL_VERSION);
        out.extend_from_slice(&PROFILE_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        out.extend_from_slice(b".FIT");
        let header_crc = crc::checksum(&out);
        out.extend_from_slice(&header_crc.to_le_bytes());
        out.extend_from_slice(&self.records);
        let file_crc = crc::checksum(&out);
        out.extend_from_slice(&file_crc.to_le_bytes());
        out
    }
}

/// Null-padded string field of exactly `size` bytes.
pub fn string_field(value: &str, size: usize) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    bytes.truncate(size.saturating_sub(1));
    bytes.resize(size, 0);
    bytes
}
