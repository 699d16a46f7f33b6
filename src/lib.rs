//! plugin-pack reads and writes tag-dispatched game plugin files (`.esp`, `.esm`) without losing
//! a single byte, and projects them into structured JSON documents that can be edited and packed
//! back.
//!
//! A plugin is a sequence of records. Each record opens with a 24-byte header carrying a 4-byte
//! tag. Group records (`GRUP`) hold further records; every other record holds a sequence of
//! fields, each a 6-byte header and a payload. This crate provides:
//!
//! - A [`Processor`] that unpacks a plugin into a [`Bundle`] of [`Record`]s and packs it back.
//!     Packing an unmodified bundle reproduces the input exactly.
//! - A [`Registry`] of record shapes: plain serde structs, bound to field tags through a
//!     [`FieldMap`]. A record with a shape becomes that struct; anything else is kept as an
//!     ordered field list, or as raw bytes when even that fails.
//! - A binary serde format for field payloads ([`to_bytes`], [`from_bytes`]): little-endian
//!     numbers, NUL-terminated strings, sequences running to the end of the payload.
//! - A structured projection: every record as a named JSON [`Document`], saved to and loaded
//!     from a `.esps` directory.
//! - A catalogue of built-in shapes in [`catalogue`].
//!
//! Nothing that fails to decode is thrown away. Whatever had to be kept in a less structured form
//! is reported as an [`Issue`] on the bundle.

pub mod bundle_fs;
pub mod catalogue;
mod config;
pub mod cursor;
pub mod de;
pub mod decode;
mod depth_tracking;
mod error;
mod field;
pub mod header;
mod issue;
pub mod parser;
mod processor;
pub mod reader;
mod record;
mod registry;
pub mod ser;
pub mod structured;
mod tag;
pub mod writer;

pub use self::config::{ProcessorConfig, DEFAULT_MAX_DEPTH};
pub use self::de::from_bytes;
pub use self::error::{Error, Result};
pub use self::field::{DecodedFields, Field, FieldValue, RawData};
pub use self::header::{FieldHeader, RecordHeader};
pub use self::issue::{Issue, IssueKind};
pub use self::processor::{Bundle, Processor};
pub use self::record::{GroupChildren, GroupRecord, LeafBody, LeafRecord, Record};
pub use self::registry::{
    Binding, FieldCodec, FieldMap, RecordShape, Registry, RegistryBuilder, Shape, ShapeDescriptor,
};
pub use self::ser::to_bytes;
pub use self::structured::Document;
pub use self::tag::Tag;
