//! The record tree.
//!
//! A plugin file is a sequence of records. A record is either a group, which holds further
//! records, or a leaf, which holds fields. A leaf's body is whatever the parser managed to make
//! of it: a typed shape, an ordered set of fields, or untouched bytes.

use crate::error::Result;
use crate::field::DecodedFields;
use crate::header::RecordHeader;
use crate::registry::{Registry, RecordShape, Shape};
use crate::tag::Tag;

#[derive(Clone, Debug)]
pub enum Record {
    Group(GroupRecord),
    Leaf(LeafRecord),
}

impl Record {
    pub fn header(&self) -> &RecordHeader {
        match self {
            Record::Group(g) => &g.header,
            Record::Leaf(l) => &l.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut RecordHeader {
        match self {
            Record::Group(g) => &mut g.header,
            Record::Leaf(l) => &mut l.header,
        }
    }

    pub fn tag(&self) -> Tag {
        self.header().tag
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Record::Group(_))
    }

    pub fn as_group(&self) -> Option<&GroupRecord> {
        match self {
            Record::Group(g) => Some(g),
            Record::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafRecord> {
        match self {
            Record::Leaf(l) => Some(l),
            Record::Group(_) => None,
        }
    }

    /// Encode the record, header included. Sizes are always recomputed from the encoded body.
    pub fn encode(&self, registry: &Registry, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Record::Group(g) => g.encode(registry, out),
            Record::Leaf(l) => l.encode(registry, out),
        }
    }
}

impl From<GroupRecord> for Record {
    fn from(g: GroupRecord) -> Self {
        Record::Group(g)
    }
}

impl From<LeafRecord> for Record {
    fn from(l: LeafRecord) -> Self {
        Record::Leaf(l)
    }
}

#[derive(Clone, Debug)]
pub struct GroupRecord {
    pub header: RecordHeader,
    pub children: GroupChildren,
}

/// A group's children, either parsed or still the bytes they were read from.
#[derive(Clone, Debug)]
pub enum GroupChildren {
    Parsed(Vec<Record>),
    Deferred(Vec<u8>),
}

impl GroupRecord {
    pub fn new(header: RecordHeader, children: Vec<Record>) -> Self {
        Self {
            header,
            children: GroupChildren::Parsed(children),
        }
    }

    /// Parsed children, or `None` if they are still deferred.
    pub fn children(&self) -> Option<&[Record]> {
        match &self.children {
            GroupChildren::Parsed(c) => Some(c),
            GroupChildren::Deferred(_) => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self.children, GroupChildren::Deferred(_))
    }

    /// The encoded children.
    pub fn body(&self, registry: &Registry) -> Result<Vec<u8>> {
        match &self.children {
            GroupChildren::Deferred(bytes) => Ok(bytes.clone()),
            GroupChildren::Parsed(children) => {
                let mut body = Vec::new();
                for child in children {
                    child.encode(registry, &mut body)?;
                }
                Ok(body)
            }
        }
    }

    pub fn encode(&self, registry: &Registry, out: &mut Vec<u8>) -> Result<()> {
        let body = self.body(registry)?;
        write_record(&self.header, &body, out)
    }
}

#[derive(Clone, Debug)]
pub struct LeafRecord {
    pub header: RecordHeader,
    pub body: LeafBody,
}

#[derive(Clone, Debug)]
pub enum LeafBody {
    /// Decoded into a registered record shape.
    Typed(Box<dyn Shape>),
    /// Fields in file order, for records with no shape or whose shape didn't fit.
    Opaque(DecodedFields),
    /// Payload bytes that were never split into fields.
    Undecoded(Vec<u8>),
}

impl LeafRecord {
    pub fn new(header: RecordHeader, body: LeafBody) -> Self {
        Self { header, body }
    }

    /// Wrap a typed shape in a fresh header.
    pub fn typed<T: RecordShape>(shape: T) -> Self {
        Self {
            header: RecordHeader::new(T::TAG),
            body: LeafBody::Typed(Box::new(shape)),
        }
    }

    /// The decoded shape, if the body is typed as `T`.
    pub fn shape<T: RecordShape>(&self) -> Option<&T> {
        match &self.body {
            LeafBody::Typed(shape) => shape.as_any().downcast_ref(),
            _ => None,
        }
    }

    pub fn shape_mut<T: RecordShape>(&mut self) -> Option<&mut T> {
        match &mut self.body {
            LeafBody::Typed(shape) => shape.as_any_mut().downcast_mut(),
            _ => None,
        }
    }

    pub fn editor_id(&self) -> Option<&str> {
        match &self.body {
            LeafBody::Typed(shape) => shape.editor_id(),
            _ => None,
        }
    }

    /// The encoded payload, without the record header.
    pub fn payload(&self, registry: &Registry) -> Result<Vec<u8>> {
        match &self.body {
            LeafBody::Typed(shape) => shape.encode(registry.field_map(shape.tag())?),
            LeafBody::Opaque(fields) => {
                let mut payload = Vec::new();
                fields.write(registry.fields_for(self.header.tag), &mut payload)?;
                Ok(payload)
            }
            LeafBody::Undecoded(bytes) => Ok(bytes.clone()),
        }
    }

    pub fn encode(&self, registry: &Registry, out: &mut Vec<u8>) -> Result<()> {
        let payload = self.payload(registry)?;
        write_record(&self.header, &payload, out)
    }
}

pub(crate) fn write_record(header: &RecordHeader, body: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let size = header.declared_size(body.len())?;
    header.write_with_size(size, out);
    out.extend_from_slice(body);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::Field;
    use crate::header::RECORD_HEADER_SIZE;

    #[test]
    fn empty_group_size() {
        let group = GroupRecord::new(RecordHeader::new(Tag::GROUP), Vec::new());
        let mut out = Vec::new();
        group.encode(&Registry::empty(), &mut out).unwrap();
        assert_eq!(out.len(), RECORD_HEADER_SIZE);
        assert_eq!(&out[0..4], b"GRUP");
        assert_eq!(&out[4..8], &24u32.to_le_bytes());
    }

    #[test]
    fn sizes_recomputed() {
        let mut header = RecordHeader::new("GMST".parse().unwrap());
        header.size = 1000;
        let fields: DecodedFields = vec![Field::raw("EDID".parse().unwrap(), b"x\0".to_vec()).unwrap()]
            .into_iter()
            .collect();
        let leaf = LeafRecord::new(header, LeafBody::Opaque(fields));
        let mut group_header = RecordHeader::new(Tag::GROUP);
        group_header.size = 5;
        let group = GroupRecord::new(group_header, vec![leaf.into()]);

        let mut out = Vec::new();
        group.encode(&Registry::empty(), &mut out).unwrap();
        // group header + leaf header + field header + "x\0"
        assert_eq!(out.len(), 24 + 24 + 6 + 2);
        assert_eq!(&out[4..8], &(24u32 + 24 + 8).to_le_bytes());
        assert_eq!(&out[28..32], &8u32.to_le_bytes());
    }

    #[test]
    fn deferred_children_verbatim() {
        let group = GroupRecord {
            header: RecordHeader::new(Tag::GROUP),
            children: GroupChildren::Deferred(vec![1, 2, 3]),
        };
        assert!(group.is_deferred());
        assert!(group.children().is_none());
        let mut out = Vec::new();
        group.encode(&Registry::empty(), &mut out).unwrap();
        assert_eq!(&out[24..], &[1, 2, 3]);
        assert_eq!(&out[4..8], &27u32.to_le_bytes());
    }
}
