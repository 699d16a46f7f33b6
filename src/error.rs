use std::fmt;

use serde::{de, ser};
use thiserror::Error;

use crate::tag::Tag;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Occurs when a tag is built from a string that isn't exactly 4 bytes long.
    #[error("Tag must be exactly 4 bytes, got {0}")]
    InvalidTagLength(usize),
    /// A header or a declared-size payload ran past the end of the available bytes.
    #[error("Expected {expected} bytes, but only {actual} remain on step [{step}]")]
    TruncatedInput {
        step: &'static str,
        actual: usize,
        expected: usize,
    },
    /// A field declared more bytes than remain in its record's payload.
    #[error("Field {field} declares {declared} bytes, but only {remaining} remain in the record")]
    FieldOverrun {
        field: Tag,
        declared: usize,
        remaining: usize,
    },
    /// A group header declared a size too small to cover its own header.
    #[error("Group declares size {0}, which is smaller than its header")]
    BadGroupSize(u32),
    /// No field codec is bound for this tag in the record's field map.
    #[error("No decoder for field {field} in record {record}")]
    UnknownFieldDecoder { record: Tag, field: Tag },
    /// A field codec rejected the field payload.
    #[error("Failed to decode field {field}: {reason}")]
    FieldDecodeFailure { field: Tag, reason: String },
    /// No record shape is registered for this tag.
    #[error("No record shape registered for {0}")]
    UnknownRecordShape(Tag),
    /// A structured read asked for a key that isn't present.
    #[error("Missing value for key `{0}`")]
    MissingValue(String),
    /// A record shape was registered without a field map.
    #[error("Record shape {0} has no field map")]
    MissingFieldMap(Tag),
    /// A record shape wrote a key that its field map doesn't bind to a tag.
    #[error("Key `{key}` is not bound to a field tag in record {record}")]
    UnknownField { record: Tag, key: String },
    /// An encoded field payload doesn't fit in the 16-bit field size.
    #[error("Field {field} is {size} bytes, larger than a field can hold")]
    FieldTooLarge { field: Tag, size: usize },
    /// A binary decode finished with bytes left over.
    #[error("{0} bytes left over after decoding")]
    TrailingBytes(usize),
    /// Parsing hit a configured limit.
    #[error("Hit parsing limit: {0}")]
    ParseLimit(String),
    /// Occurs when serde serialization or deserialization fails
    #[error("{0}")]
    SerdeFail(String),
    /// Conversion to or from the structured (JSON) form failed.
    #[error("Structured form error: {0}")]
    Structured(#[from] serde_json::Error),
    /// A structured document doesn't have the layout of a record document.
    #[error("Bad document `{name}`: {reason}")]
    BadDocument { name: String, reason: String },
    /// Encoding a particular record failed.
    #[error("Failed to encode record {record} {id:08X}: {source}")]
    Encode {
        record: Tag,
        id: u32,
        source: Box<Error>,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn truncated(step: &'static str, actual: usize, expected: usize) -> Self {
        Error::TruncatedInput {
            step,
            actual,
            expected,
        }
    }

    pub(crate) fn bad_document(name: &str, reason: impl Into<String>) -> Self {
        Error::BadDocument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        Error::MissingValue(field.to_string())
    }
}
