//! Fixed-layout record and field headers.

use serde::{Deserialize, Serialize};

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::tag::Tag;

/// Bytes in a record header: tag, size, flags, id, timestamp, version info, version, unused.
pub const RECORD_HEADER_SIZE: usize = 24;
/// Bytes in a field header: tag, size.
pub const FIELD_HEADER_SIZE: usize = 6;
/// A group's declared size also covers its own header.
pub const GROUP_SIZE_ALLOWANCE: u32 = 24;
/// Record flag marking a zlib-compressed payload.
pub const COMPRESSED_FLAG: u32 = 0x0004_0000;

/// Header opening every record, groups included.
///
/// `size` is whatever the file declared and is only meaningful right after a read. Encoding
/// always derives a fresh size from the encoded body, so the structured form leaves it out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    #[serde(rename = "type")]
    pub tag: Tag,
    #[serde(skip)]
    pub size: u32,
    pub flags: u32,
    pub id: u32,
    pub timestamp: u16,
    pub version_info: u16,
    pub version: u16,
    pub unused: u16,
}

impl RecordHeader {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            size: 0,
            flags: 0,
            id: 0,
            timestamp: 0,
            version_info: 0,
            version: 0,
            unused: 0,
        }
    }

    pub fn read<C: ByteCursor + ?Sized>(cursor: &mut C) -> Result<Self> {
        Ok(Self {
            tag: Tag::from_u32(cursor.read_u32("record header tag")?),
            size: cursor.read_u32("record header size")?,
            flags: cursor.read_u32("record header flags")?,
            id: cursor.read_u32("record header id")?,
            timestamp: cursor.read_u16("record header timestamp")?,
            version_info: cursor.read_u16("record header version info")?,
            version: cursor.read_u16("record header version")?,
            unused: cursor.read_u16("record header unused")?,
        })
    }

    /// Write the header with an explicit size, ignoring the stored one.
    pub fn write_with_size(&self, size: u32, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.tag.bytes());
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&self.flags.to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.version_info.to_le_bytes());
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.unused.to_le_bytes());
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        self.write_with_size(self.size, buf)
    }

    pub fn is_group(&self) -> bool {
        self.tag == Tag::GROUP
    }

    pub fn is_compressed(&self) -> bool {
        !self.is_group() && (self.flags & COMPRESSED_FLAG) != 0
    }

    /// Bytes following the header: the payload of a leaf, or the children of a group.
    pub fn payload_size(&self) -> Result<usize> {
        if self.is_group() {
            self.size
                .checked_sub(GROUP_SIZE_ALLOWANCE)
                .map(|s| s as usize)
                .ok_or(Error::BadGroupSize(self.size))
        } else {
            Ok(self.size as usize)
        }
    }

    /// The size to declare for a body of `payload_len` bytes.
    pub fn declared_size(&self, payload_len: usize) -> Result<u32> {
        let allowance = if self.is_group() {
            GROUP_SIZE_ALLOWANCE as usize
        } else {
            0
        };
        u32::try_from(payload_len + allowance)
            .map_err(|_| Error::ParseLimit(format!("record {} body too large", self.tag)))
    }

    /// Group label. Only meaningful for groups, where it occupies the flags slot.
    pub fn label(&self) -> u32 {
        self.flags
    }

    /// Group type. Only meaningful for groups, where it occupies the id slot.
    pub fn group_type(&self) -> u32 {
        self.id
    }
}

/// Header opening every field inside a leaf record's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldHeader {
    pub tag: Tag,
    pub size: u16,
}

impl FieldHeader {
    pub fn new(tag: Tag, size: u16) -> Self {
        Self { tag, size }
    }

    /// Build a header for a payload, failing if it doesn't fit in a 16-bit size.
    pub fn for_payload(tag: Tag, payload_len: usize) -> Result<Self> {
        let size = u16::try_from(payload_len).map_err(|_| Error::FieldTooLarge {
            field: tag,
            size: payload_len,
        })?;
        Ok(Self { tag, size })
    }

    pub fn read<C: ByteCursor + ?Sized>(cursor: &mut C) -> Result<Self> {
        Ok(Self {
            tag: Tag::from_u32(cursor.read_u32("field header tag")?),
            size: cursor.read_u16("field header size")?,
        })
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.tag.bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
    }
}
