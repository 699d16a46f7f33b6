//! Whole-file operations: unpacking a plugin into a [`Bundle`] and packing it back.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::bundle_fs;
use crate::config::ProcessorConfig;
use crate::cursor::{ByteCursor, ReaderCursor, SliceCursor};
use crate::error::{Error, Result};
use crate::issue::{Issue, IssueKind};
use crate::parser::Parser;
use crate::record::{write_record, GroupChildren, GroupRecord, Record};
use crate::registry::Registry;
use crate::structured::{self, Document};

/// An unpacked plugin: its records plus everything that had to be kept in a less structured
/// form along the way.
#[derive(Clone, Debug, Default)]
pub struct Bundle {
    pub name: String,
    pub records: Vec<Record>,
    pub issues: Vec<Issue>,
}

impl Bundle {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
            issues: Vec::new(),
        }
    }
}

/// Unpacks and packs plugin files against a shared [`Registry`].
#[derive(Clone, Debug)]
pub struct Processor {
    registry: Arc<Registry>,
    config: ProcessorConfig,
}

impl Processor {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, ProcessorConfig::default())
    }

    pub fn with_config(registry: Arc<Registry>, config: ProcessorConfig) -> Self {
        Self { registry, config }
    }

    /// A processor over the built-in record catalogue.
    pub fn standard() -> Result<Self> {
        Ok(Self::new(Registry::standard()?))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Unpack a plugin from a buffered reader.
    pub fn unpack<R: BufRead>(&self, name: &str, reader: R) -> Result<Bundle> {
        self.unpack_from(name, &mut ReaderCursor::new(reader))
    }

    /// Unpack a plugin held in memory.
    pub fn unpack_bytes(&self, name: &str, bytes: &[u8]) -> Result<Bundle> {
        self.unpack_from(name, &mut SliceCursor::new(bytes))
    }

    pub fn unpack_from<C: ByteCursor + ?Sized>(&self, name: &str, cursor: &mut C) -> Result<Bundle> {
        let mut parser = Parser::new(&self.registry, &self.config);
        let records = parser.parse_all(cursor)?;
        let issues = parser.into_issues();
        debug!(name, records = records.len(), issues = issues.len(), "Unpacked plugin");
        Ok(Bundle {
            name: name.to_string(),
            records,
            issues,
        })
    }

    /// Parse a group's deferred children, nested groups included. Leaves the group untouched
    /// and returns the error if they can't be parsed.
    pub fn expand(&self, group: &mut GroupRecord) -> Result<Vec<Issue>> {
        let body = match &group.children {
            GroupChildren::Deferred(body) => body,
            GroupChildren::Parsed(_) => return Ok(Vec::new()),
        };
        let config = self.config.clone().with_process_children(true);
        let mut parser = Parser::new(&self.registry, &config);
        let children = parser.parse_children(&group.header, body)?;
        group.children = GroupChildren::Parsed(children);
        Ok(parser.into_issues())
    }

    /// Encode a whole bundle. Stops at the first record that fails to encode.
    pub fn pack(&self, bundle: &Bundle) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for record in &bundle.records {
            self.encode_strict(record, &mut out)?;
        }
        Ok(out)
    }

    /// Encode a whole bundle, leaving out records that fail to encode.
    pub fn pack_lenient(&self, bundle: &Bundle) -> (Vec<u8>, Vec<Issue>) {
        let mut out = Vec::new();
        let mut issues = Vec::new();
        for record in &bundle.records {
            self.encode_lenient(record, &mut out, &mut issues);
        }
        (out, issues)
    }

    /// Encode a single record, header included.
    pub fn pack_record(&self, record: &Record) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_strict(record, &mut out)?;
        Ok(out)
    }

    /// Pack a bundle straight into a writer.
    pub fn write<W: Write>(&self, bundle: &Bundle, mut writer: W) -> Result<()> {
        let bytes = self.pack(bundle)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    fn encode_strict(&self, record: &Record, out: &mut Vec<u8>) -> Result<()> {
        let wrap = |e: Error| match e {
            e @ Error::Encode { .. } => e,
            e => Error::Encode {
                record: record.tag(),
                id: record.header().id,
                source: Box::new(e),
            },
        };
        match record {
            Record::Leaf(leaf) => leaf.encode(&self.registry, out).map_err(wrap),
            Record::Group(group) => {
                let body = match &group.children {
                    GroupChildren::Deferred(bytes) => bytes.clone(),
                    GroupChildren::Parsed(children) => {
                        let mut body = Vec::new();
                        for child in children {
                            self.encode_strict(child, &mut body)?;
                        }
                        body
                    }
                };
                write_record(&group.header, &body, out).map_err(wrap)
            }
        }
    }

    fn encode_lenient(&self, record: &Record, out: &mut Vec<u8>, issues: &mut Vec<Issue>) {
        let result = match record {
            Record::Leaf(leaf) => leaf.payload(&self.registry),
            Record::Group(group) => match &group.children {
                GroupChildren::Deferred(bytes) => Ok(bytes.clone()),
                GroupChildren::Parsed(children) => {
                    let mut body = Vec::new();
                    for child in children {
                        self.encode_lenient(child, &mut body, issues);
                    }
                    Ok(body)
                }
            },
        };
        let written = result.and_then(|body| {
            let mut encoded = Vec::new();
            write_record(record.header(), &body, &mut encoded)?;
            Ok(encoded)
        });
        match written {
            Ok(encoded) => out.extend_from_slice(&encoded),
            Err(e) => {
                warn!(tag = %record.tag(), id = record.header().id, error = %e, "Leaving record out");
                issues.push(Issue::new(IssueKind::OmittedRecord, record.header(), &e));
            }
        }
    }

    /// Project a bundle into structured documents.
    pub fn save_structured(&self, bundle: &Bundle) -> Result<Vec<Document>> {
        structured::save_structured(&bundle.records)
    }

    /// Rebuild a bundle from structured documents. Stops at the first document that can't be
    /// loaded.
    pub fn load_structured(&self, name: &str, docs: &[Document]) -> Result<Bundle> {
        Ok(Bundle::new(
            name,
            structured::load_structured(&self.registry, docs, self.config.max_depth)?,
        ))
    }

    /// Rebuild a bundle from structured documents, leaving out documents that can't be loaded.
    /// Each one left out is reported in the bundle's issues.
    pub fn load_structured_lenient(&self, name: &str, docs: &[Document]) -> Bundle {
        let (records, issues) =
            structured::load_structured_lenient(&self.registry, docs, self.config.max_depth);
        debug!(name, records = records.len(), issues = issues.len(), "Loaded documents");
        Bundle {
            name: name.to_string(),
            records,
            issues,
        }
    }

    /// Save a bundle's documents as a `<name>.esps` directory under `dir`.
    pub fn save_to_dir(&self, bundle: &Bundle, dir: &Path) -> Result<PathBuf> {
        let docs = self.save_structured(bundle)?;
        bundle_fs::write_bundle(dir, &bundle.name, &docs)
    }

    /// Load a bundle saved by [`Processor::save_to_dir`].
    pub fn load_from_dir(&self, path: &Path) -> Result<Bundle> {
        let (name, docs) = bundle_fs::read_bundle(path)?;
        self.load_structured(&name, &docs)
    }

    /// Load a bundle saved by [`Processor::save_to_dir`], leaving out documents that can't be
    /// loaded. The directory itself must still be readable JSON.
    pub fn load_from_dir_lenient(&self, path: &Path) -> Result<Bundle> {
        let (name, docs) = bundle_fs::read_bundle(path)?;
        Ok(self.load_structured_lenient(&name, &docs))
    }
}
