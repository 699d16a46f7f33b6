//! Record parsing: turning a byte stream into a record tree.
//!
//! Structural problems at the top level (a truncated header, a payload running off the end,
//! an impossible group size) end the parse. Everything below that is contained: a bad field
//! only affects that field, a bad leaf only that leaf, and a nested group that fails keeps its
//! children as bytes.

use tracing::{debug, warn};

use crate::config::ProcessorConfig;
use crate::cursor::{ByteCursor, SliceCursor};
use crate::decode::read_fields;
use crate::depth_tracking::DepthTracker;
use crate::error::{Error, Result};
use crate::field::DecodedFields;
use crate::header::RecordHeader;
use crate::issue::{Issue, IssueKind};
use crate::record::{GroupChildren, GroupRecord, LeafBody, LeafRecord, Record};
use crate::registry::Registry;

pub struct Parser<'r> {
    registry: &'r Registry,
    config: &'r ProcessorConfig,
    depth: DepthTracker,
    issues: Vec<Issue>,
}

impl<'r> Parser<'r> {
    pub fn new(registry: &'r Registry, config: &'r ProcessorConfig) -> Self {
        Self {
            registry,
            config,
            depth: DepthTracker::new(config.max_depth),
            issues: Vec::new(),
        }
    }

    /// Issues collected so far.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    /// Parse records until the cursor runs out.
    pub fn parse_all<C: ByteCursor + ?Sized>(&mut self, cursor: &mut C) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while !cursor.is_at_end()? {
            records.push(self.parse_record(cursor)?);
        }
        Ok(records)
    }

    /// Parse one record: its header, then its payload according to its kind.
    pub fn parse_record<C: ByteCursor + ?Sized>(&mut self, cursor: &mut C) -> Result<Record> {
        let header = RecordHeader::read(cursor)?;
        let len = header.payload_size()?;
        if let Some(remaining) = cursor.remaining() {
            if len > remaining {
                return Err(Error::truncated("record payload", remaining, len));
            }
        }
        let payload = cursor.read_bytes(len, "record payload")?;
        debug!(tag = %header.tag, id = header.id, size = len, "Read record");
        if header.is_group() {
            Ok(Record::Group(self.parse_group(header, payload)))
        } else {
            Ok(Record::Leaf(self.parse_leaf(header, payload)))
        }
    }

    /// Build a group from its children's bytes. Children stay deferred if processing is off,
    /// or if they can't be parsed.
    pub fn parse_group(&mut self, header: RecordHeader, body: Vec<u8>) -> GroupRecord {
        if !self.config.process_children {
            return GroupRecord {
                header,
                children: GroupChildren::Deferred(body),
            };
        }
        let children = match self.parse_children(&header, &body) {
            Ok(children) => GroupChildren::Parsed(children),
            Err(e) => {
                warn!(label = header.label(), group_type = header.group_type(), error = %e, "Keeping group children as bytes");
                self.issues
                    .push(Issue::new(IssueKind::DeferredGroup, &header, &e));
                GroupChildren::Deferred(body)
            }
        };
        GroupRecord { header, children }
    }

    /// Parse a group's children. Issues from a failed attempt are dropped along with it.
    pub fn parse_children(&mut self, header: &RecordHeader, body: &[u8]) -> Result<Vec<Record>> {
        self.depth.enter()?;
        let mark = self.issues.len();
        let mut cursor = SliceCursor::new(body);
        let result = self.parse_all(&mut cursor);
        self.depth.exit();
        if result.is_err() {
            self.issues.truncate(mark);
        } else {
            debug!(label = header.label(), "Parsed group children");
        }
        result
    }

    /// Build a leaf from its payload. Never fails: each failure mode falls back to a less
    /// structured body that still encodes to the same bytes.
    pub fn parse_leaf(&mut self, header: RecordHeader, payload: Vec<u8>) -> LeafRecord {
        if header.is_compressed() {
            debug!(tag = %header.tag, id = header.id, "Keeping compressed record as bytes");
            return LeafRecord::new(header, LeafBody::Undecoded(payload));
        }
        let registry = self.registry;
        let map = registry.fields_for(header.tag);
        let fields = match read_fields(&header, &payload, map, &mut self.issues) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(tag = %header.tag, id = header.id, error = %e, "Keeping record payload as bytes");
                self.issues
                    .push(Issue::new(IssueKind::UndecodedRecord, &header, &e));
                return LeafRecord::new(header, LeafBody::Undecoded(payload));
            }
        };
        let body = self.shape_leaf(&header, &payload, fields);
        LeafRecord::new(header, body)
    }

    fn shape_leaf(&mut self, header: &RecordHeader, payload: &[u8], fields: DecodedFields) -> LeafBody {
        let registry = self.registry;
        let (descriptor, map) = match (
            registry.record_shape(header.tag),
            registry.fields_for(header.tag),
        ) {
            (Some(d), Some(m)) => (d, m),
            _ => {
                let e = Error::UnknownRecordShape(header.tag);
                debug!(tag = %header.tag, id = header.id, "{}", e);
                return LeafBody::Opaque(fields);
            }
        };
        let shape = match descriptor.decode(header, &fields, map) {
            Ok(shape) => shape,
            Err(e) => {
                self.opaque(header, &e);
                return LeafBody::Opaque(fields);
            }
        };
        if self.config.verify_round_trip {
            match shape.encode(map) {
                Ok(bytes) if bytes == payload => (),
                Ok(_) => {
                    let e = Error::SerdeFail(format!(
                        "{} doesn't re-encode to the original payload",
                        descriptor.name()
                    ));
                    self.opaque(header, &e);
                    return LeafBody::Opaque(fields);
                }
                Err(e) => {
                    self.opaque(header, &e);
                    return LeafBody::Opaque(fields);
                }
            }
        }
        LeafBody::Typed(shape)
    }

    fn opaque(&mut self, header: &RecordHeader, e: &Error) {
        warn!(tag = %header.tag, id = header.id, error = %e, "Keeping record as opaque fields");
        self.issues.push(Issue::new(IssueKind::OpaqueRecord, header, e));
    }
}
