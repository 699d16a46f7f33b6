//! The structured (JSON) projection of a record tree.
//!
//! Each record becomes a named [`Document`]. A leaf's document is a JSON object holding its
//! header under `_header`, plus one of:
//!
//! - the keys of its record shape, for a typed leaf
//! - `_opaque`, the ordered list of its fields
//! - `_data`, its payload as base64
//!
//! A group's document holds its header and its children's documents. A group whose children
//! were never parsed carries them as base64 under `_data` in its header.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::depth_tracking::DepthTracker;
use crate::error::{Error, Result};
use crate::field::{DecodedFields, Field, RawData};
use crate::header::RecordHeader;
use crate::issue::{Issue, IssueKind};
use crate::reader::HEADER_KEY;
use crate::record::{GroupChildren, GroupRecord, LeafBody, LeafRecord, Record};
use crate::registry::Registry;
use crate::tag::Tag;

/// Key holding an opaque leaf's fields.
pub const OPAQUE_KEY: &str = "_opaque";
/// Key holding undecoded bytes as base64.
pub const DATA_KEY: &str = "_data";

#[derive(Clone, Debug, PartialEq)]
pub enum Document {
    Record {
        name: String,
        body: Value,
    },
    Group {
        name: String,
        header: Value,
        children: Vec<Document>,
    },
}

impl Document {
    pub fn name(&self) -> &str {
        match self {
            Document::Record { name, .. } | Document::Group { name, .. } => name,
        }
    }
}

/// Name for the record at `index` among its siblings: `"0003 GMST"`, or `"0003 iMaxLevel
/// GMST"` when the record has an editor id.
pub fn document_name(index: usize, record: &Record) -> String {
    let editor_id = match record {
        Record::Leaf(leaf) => leaf.editor_id(),
        Record::Group(_) => None,
    };
    match editor_id {
        Some(id) if !id.is_empty() => format!("{:04} {} {}", index, id, record.tag()),
        _ => format!("{:04} {}", index, record.tag()),
    }
}

/// Project records into documents.
pub fn save_structured(records: &[Record]) -> Result<Vec<Document>> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let name = document_name(index, record);
            match record {
                Record::Leaf(leaf) => Ok(Document::Record {
                    body: leaf_document(leaf)?,
                    name,
                }),
                Record::Group(group) => group_document(name, group),
            }
        })
        .collect()
}

fn leaf_document(leaf: &LeafRecord) -> Result<Value> {
    let mut body = match &leaf.body {
        LeafBody::Typed(shape) => match shape.to_structured()? {
            Value::Object(map) => map,
            _ => {
                return Err(Error::SerdeFail(format!(
                    "record shape {} must serialize as an object",
                    shape.tag()
                )))
            }
        },
        LeafBody::Opaque(fields) => {
            let mut map = Map::new();
            map.insert(
                OPAQUE_KEY.to_string(),
                serde_json::to_value(fields.iter().collect::<Vec<_>>())?,
            );
            map
        }
        LeafBody::Undecoded(bytes) => {
            let mut map = Map::new();
            map.insert(DATA_KEY.to_string(), Value::String(STANDARD.encode(bytes)));
            map
        }
    };
    body.insert(HEADER_KEY.to_string(), serde_json::to_value(&leaf.header)?);
    Ok(Value::Object(body))
}

fn group_document(name: String, group: &GroupRecord) -> Result<Document> {
    let mut header = serde_json::to_value(&group.header)?;
    let children = match &group.children {
        GroupChildren::Parsed(children) => save_structured(children)?,
        GroupChildren::Deferred(bytes) => {
            if let Value::Object(map) = &mut header {
                map.insert(DATA_KEY.to_string(), Value::String(STANDARD.encode(bytes)));
            }
            Vec::new()
        }
    };
    Ok(Document::Group {
        name,
        header,
        children,
    })
}

/// Rebuild records from their documents. Fails on the first document that can't be loaded.
pub fn load_structured(
    registry: &Registry,
    docs: &[Document],
    max_depth: usize,
) -> Result<Vec<Record>> {
    Loader::new(registry, max_depth, false).load_documents(docs)
}

/// Rebuild records from their documents, leaving out any document that can't be loaded. A
/// group whose header loads keeps the children that do.
pub fn load_structured_lenient(
    registry: &Registry,
    docs: &[Document],
    max_depth: usize,
) -> (Vec<Record>, Vec<Issue>) {
    let mut loader = Loader::new(registry, max_depth, true);
    let records = loader.load_documents(docs).unwrap_or_default();
    (records, loader.issues.unwrap_or_default())
}

struct Loader<'a> {
    registry: &'a Registry,
    depth: DepthTracker,
    /// Collects skipped documents when loading leniently.
    issues: Option<Vec<Issue>>,
}

impl<'a> Loader<'a> {
    fn new(registry: &'a Registry, max_depth: usize, lenient: bool) -> Self {
        Self {
            registry,
            depth: DepthTracker::new(max_depth),
            issues: lenient.then(Vec::new),
        }
    }

    fn load_documents(&mut self, docs: &[Document]) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            match self.load_document(doc) {
                Ok(record) => records.push(record),
                Err(e) => match &mut self.issues {
                    Some(issues) => {
                        warn!(document = doc.name(), error = %e, "Couldn't load document");
                        issues.push(document_issue(doc, &e));
                    }
                    None => return Err(e),
                },
            }
        }
        Ok(records)
    }

    fn load_document(&mut self, doc: &Document) -> Result<Record> {
        match doc {
            Document::Record { name, body } => {
                leaf_from_document(self.registry, name, body).map(Record::Leaf)
            }
            Document::Group {
                name,
                header,
                children,
            } => {
                self.depth.enter()?;
                let group = self.group_from_document(name, header, children);
                self.depth.exit();
                group.map(Record::Group)
            }
        }
    }

    fn group_from_document(
        &mut self,
        name: &str,
        header: &Value,
        children: &[Document],
    ) -> Result<GroupRecord> {
        let object = header
            .as_object()
            .ok_or_else(|| Error::bad_document(name, "group header is not a JSON object"))?;
        let group_header: RecordHeader = serde_json::from_value(header.clone())
            .map_err(|e| Error::bad_document(name, e.to_string()))?;
        if !group_header.is_group() {
            return Err(Error::bad_document(
                name,
                format!("group header has type {}", group_header.tag),
            ));
        }
        let children = match object.get(DATA_KEY) {
            Some(data) => {
                let data = RawData::deserialize(data)
                    .map_err(|e| Error::bad_document(name, e.to_string()))?;
                GroupChildren::Deferred(data.0)
            }
            None => GroupChildren::Parsed(self.load_documents(children)?),
        };
        Ok(GroupRecord {
            header: group_header,
            children,
        })
    }
}

/// Report a document that was left out. The record is named by its header when that much can be
/// read, and by the tag at the end of the document name otherwise.
fn document_issue(doc: &Document, error: &Error) -> Issue {
    let header = match doc {
        Document::Record { body, .. } => body.get(HEADER_KEY),
        Document::Group { header, .. } => Some(header),
    };
    let header = header
        .and_then(|h| RecordHeader::deserialize(h).ok())
        .unwrap_or_else(|| {
            let tag = doc
                .name()
                .rsplit(' ')
                .next()
                .and_then(|t| t.parse::<Tag>().ok())
                .unwrap_or(Tag::new([0; 4]));
            RecordHeader::new(tag)
        });
    Issue::new(IssueKind::UnloadableDocument, &header, error)
}

fn leaf_from_document(registry: &Registry, name: &str, body: &Value) -> Result<LeafRecord> {
    let object = body
        .as_object()
        .ok_or_else(|| Error::bad_document(name, "not a JSON object"))?;
    let header = read_header(name, object)?;
    let leaf_body = if let Some(data) = object.get(DATA_KEY) {
        let data = RawData::deserialize(data).map_err(|e| Error::bad_document(name, e.to_string()))?;
        LeafBody::Undecoded(data.0)
    } else if let Some(fields) = object.get(OPAQUE_KEY) {
        let fields = Vec::<Field>::deserialize(fields)
            .map_err(|e| Error::bad_document(name, e.to_string()))?;
        LeafBody::Opaque(fields.into_iter().collect::<DecodedFields>())
    } else {
        let descriptor = registry.record_shape(header.tag).ok_or_else(|| {
            Error::bad_document(
                name,
                format!(
                    "no record shape for {}, and no `{}` or `{}` key",
                    header.tag, OPAQUE_KEY, DATA_KEY
                ),
            )
        })?;
        let shape = descriptor
            .from_structured(body.clone())
            .map_err(|e| Error::bad_document(name, e.to_string()))?;
        LeafBody::Typed(shape)
    };
    Ok(LeafRecord::new(header, leaf_body))
}

fn read_header(name: &str, object: &Map<String, Value>) -> Result<RecordHeader> {
    let header = object
        .get(HEADER_KEY)
        .ok_or_else(|| Error::bad_document(name, format!("missing `{}`", HEADER_KEY)))?;
    RecordHeader::deserialize(header).map_err(|e| Error::bad_document(name, e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::DEFAULT_MAX_DEPTH;
    use serde_json::json;

    fn gmst_header() -> RecordHeader {
        let mut header = RecordHeader::new(Tag::new(*b"GMST"));
        header.id = 0x0102;
        header
    }

    #[test]
    fn opaque_and_undecoded_documents() {
        let fields: DecodedFields = vec![Field::raw(Tag::new(*b"EDID"), b"a\0".to_vec()).unwrap()]
            .into_iter()
            .collect();
        let records: Vec<Record> = vec![
            LeafRecord::new(gmst_header(), LeafBody::Opaque(fields)).into(),
            LeafRecord::new(gmst_header(), LeafBody::Undecoded(vec![1, 2, 3])).into(),
        ];
        let docs = save_structured(&records).unwrap();
        assert_eq!(docs[0].name(), "0000 GMST");
        assert_eq!(docs[1].name(), "0001 GMST");
        let Document::Record { body, .. } = &docs[0] else {
            panic!("expected a record document");
        };
        assert_eq!(body[OPAQUE_KEY], json!([{"tag": "EDID", "raw": "YQA="}]));
        assert_eq!(body[HEADER_KEY]["type"], json!("GMST"));
        let Document::Record { body, .. } = &docs[1] else {
            panic!("expected a record document");
        };
        assert_eq!(body[DATA_KEY], json!("AQID"));

        let registry = Registry::empty();
        let back = load_structured(&registry, &docs, DEFAULT_MAX_DEPTH).unwrap();
        let mut a = Vec::new();
        let mut b = Vec::new();
        for r in &records {
            r.encode(&registry, &mut a).unwrap();
        }
        for r in &back {
            r.encode(&registry, &mut b).unwrap();
        }
        assert_eq!(a, b);
    }

    #[test]
    fn deferred_group_document() {
        let mut header = RecordHeader::new(Tag::GROUP);
        header.flags = u32::from_le_bytes(*b"GMST");
        let group = GroupRecord {
            header,
            children: GroupChildren::Deferred(vec![9, 9]),
        };
        let docs = save_structured(&[group.into()]).unwrap();
        let Document::Group {
            header, children, ..
        } = &docs[0]
        else {
            panic!("expected a group document");
        };
        assert!(children.is_empty());
        assert_eq!(header[DATA_KEY], json!("CQk="));
        let back = load_structured(&Registry::empty(), &docs, DEFAULT_MAX_DEPTH).unwrap();
        let group = back[0].as_group().unwrap();
        assert!(matches!(&group.children, GroupChildren::Deferred(b) if b == &vec![9, 9]));
    }

    #[test]
    fn bad_documents() {
        let registry = Registry::empty();
        let no_header = Document::Record {
            name: "0000 GMST".into(),
            body: json!({"_data": "AQID"}),
        };
        assert!(matches!(
            load_structured(&registry, &[no_header], DEFAULT_MAX_DEPTH),
            Err(Error::BadDocument { name, .. }) if name == "0000 GMST"
        ));
        let unknown_shape = Document::Record {
            name: "0000 GMST".into(),
            body: json!({"_header": serde_json::to_value(gmst_header()).unwrap()}),
        };
        assert!(load_structured(&registry, &[unknown_shape], DEFAULT_MAX_DEPTH).is_err());
        let not_group = Document::Group {
            name: "0000 GRUP".into(),
            header: serde_json::to_value(gmst_header()).unwrap(),
            children: Vec::new(),
        };
        assert!(load_structured(&registry, &[not_group], DEFAULT_MAX_DEPTH).is_err());
    }

    #[test]
    fn lenient_group_keeps_good_children() {
        let mut header = RecordHeader::new(Tag::GROUP);
        header.flags = u32::from_le_bytes(*b"GMST");
        let good = Document::Record {
            name: "0000 GMST".into(),
            body: json!({
                "_header": serde_json::to_value(gmst_header()).unwrap(),
                "_data": "AQID",
            }),
        };
        let bad = Document::Record {
            name: "0001 GMST".into(),
            body: json!({"_data": "AQID"}),
        };
        let docs = vec![Document::Group {
            name: "0000 GRUP".into(),
            header: serde_json::to_value(header).unwrap(),
            children: vec![good, bad],
        }];
        let (records, issues) =
            load_structured_lenient(&Registry::empty(), &docs, DEFAULT_MAX_DEPTH);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_group().unwrap().children().unwrap().len(), 1);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::UnloadableDocument);
        assert_eq!(issues[0].record, Tag::new(*b"GMST"));
        assert!(issues[0].message.contains("0001 GMST"));
    }
}
