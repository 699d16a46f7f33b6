use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::header::RecordHeader;
use crate::tag::Tag;

/// What happened to the data an [`Issue`] is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A field's codec failed; the field was kept as raw bytes.
    RawField,
    /// A known record tag met a field tag its field map doesn't cover.
    UnmappedField,
    /// A leaf was kept as opaque fields instead of its record shape.
    OpaqueRecord,
    /// A leaf payload couldn't be split into fields and was kept as bytes.
    UndecodedRecord,
    /// A group's children couldn't be parsed and were kept as bytes.
    DeferredGroup,
    /// A record failed to encode and was left out of the output.
    OmittedRecord,
    /// A structured document couldn't be loaded and was left out of the bundle.
    UnloadableDocument,
}

/// A recoverable problem met while unpacking or packing. The data concerned is never dropped
/// on unpack; it is kept in a less structured form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub record: Tag,
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<Tag>,
    pub message: String,
}

impl Issue {
    pub fn new(kind: IssueKind, header: &RecordHeader, error: &Error) -> Self {
        Self {
            kind,
            record: header.tag,
            id: header.id,
            field: None,
            message: error.to_string(),
        }
    }

    pub fn for_field(kind: IssueKind, header: &RecordHeader, field: Tag, error: &Error) -> Self {
        Self {
            field: Some(field),
            ..Self::new(kind, header, error)
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} in {} {:08X}", self.kind, self.record, self.id)?;
        if let Some(field) = self.field {
            write!(f, " field {}", field)?;
        }
        write!(f, ": {}", self.message)
    }
}
