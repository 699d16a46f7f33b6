//! Structured documents on disk.
//!
//! A bundle is saved as a `<name>.esps` directory. Each record document becomes
//! `<document name>.json`. Each group becomes a `<document name>.group` directory holding its
//! header in `header.json` and its children under `records/`.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::structured::Document;

pub const BUNDLE_EXTENSION: &str = "esps";
pub const GROUP_EXTENSION: &str = "group";
const HEADER_FILE: &str = "header.json";
const RECORDS_DIR: &str = "records";

/// Write documents into `<dir>/<name>.esps`, replacing any bundle already there.
pub fn write_bundle(dir: &Path, name: &str, docs: &[Document]) -> Result<PathBuf> {
    let path = dir.join(format!("{}.{}", sanitize(name), BUNDLE_EXTENSION));
    if path.exists() {
        fs::remove_dir_all(&path)?;
    }
    fs::create_dir_all(&path)?;
    write_documents(&path, docs)?;
    debug!(path = %path.display(), documents = docs.len(), "Saved bundle");
    Ok(path)
}

fn write_documents(dir: &Path, docs: &[Document]) -> Result<()> {
    for doc in docs {
        match doc {
            Document::Record { name, body } => {
                write_json(&dir.join(format!("{}.json", sanitize(name))), body)?;
            }
            Document::Group {
                name,
                header,
                children,
            } => {
                let group_dir = dir.join(format!("{}.{}", sanitize(name), GROUP_EXTENSION));
                let records = group_dir.join(RECORDS_DIR);
                fs::create_dir_all(&records)?;
                write_json(&group_dir.join(HEADER_FILE), header)?;
                write_documents(&records, children)?;
            }
        }
    }
    Ok(())
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    fs::write(path, text)?;
    Ok(())
}

/// Read a bundle directory back, returning the bundle name and its documents.
pub fn read_bundle(path: &Path) -> Result<(String, Vec<Document>)> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::bad_document(&path.display().to_string(), "not a bundle directory"))?
        .to_string();
    let docs = read_documents(path)?;
    debug!(path = %path.display(), documents = docs.len(), "Loaded bundle");
    Ok((name, docs))
}

fn read_documents(dir: &Path) -> Result<Vec<Document>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let file_name = file_name.to_string();
        entries.push((sort_key(&file_name), file_name, path));
    }
    entries.sort();

    let mut docs = Vec::with_capacity(entries.len());
    for (_, file_name, path) in entries {
        if path.is_dir() {
            let Some(name) = file_name.strip_suffix(&format!(".{}", GROUP_EXTENSION)) else {
                continue;
            };
            let header = read_json(&path.join(HEADER_FILE), name)?;
            let records = path.join(RECORDS_DIR);
            let children = if records.is_dir() {
                read_documents(&records)?
            } else {
                Vec::new()
            };
            docs.push(Document::Group {
                name: name.to_string(),
                header,
                children,
            });
        } else if let Some(name) = file_name.strip_suffix(".json") {
            let body = read_json(&path, name)?;
            docs.push(Document::Record {
                name: name.to_string(),
                body,
            });
        }
    }
    Ok(docs)
}

fn read_json(path: &Path, name: &str) -> Result<Value> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| Error::bad_document(name, e.to_string()))
}

/// Documents are named with their index first; order by that number so bundles of more than
/// 10000 records keep their order.
fn sort_key(file_name: &str) -> Option<u64> {
    file_name
        .split(' ')
        .next()
        .and_then(|index| index.parse().ok())
}

/// Make a document name safe to use as a file name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}
