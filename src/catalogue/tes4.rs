//! The plugin header record (`TES4`), always the first record of a file.

use serde::{Deserialize, Serialize};

use super::types::FormId;
use crate::registry::{FieldMap, RecordShape};
use crate::tag::Tag;

pub const HEDR: Tag = Tag::new(*b"HEDR");
pub const CNAM: Tag = Tag::new(*b"CNAM");
pub const SNAM: Tag = Tag::new(*b"SNAM");
pub const MAST: Tag = Tag::new(*b"MAST");
pub const DATA: Tag = Tag::new(*b"DATA");
pub const ONAM: Tag = Tag::new(*b"ONAM");
pub const INTV: Tag = Tag::new(*b"INTV");
pub const INCC: Tag = Tag::new(*b"INCC");

/// `HEDR`: format version and record bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub version: f32,
    pub record_count: u32,
    pub next_object_id: u32,
}

/// One master file this plugin depends on. The size is unused and is normally zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Master {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginHeader {
    pub info: PluginInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masters: Vec<Master>,
    /// Records from the masters that this plugin overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Vec<FormId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagified_strings: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<u32>,
}

impl RecordShape for PluginHeader {
    const TAG: Tag = Tag::new(*b"TES4");
    const NAME: &'static str = "PluginHeader";

    fn field_map() -> FieldMap {
        FieldMap::new(Self::TAG)
            .field::<PluginInfo>("info", HEDR)
            .field::<String>("author", CNAM)
            .field::<String>("description", SNAM)
            .run("masters", &[("file", MAST), ("size", DATA)])
            .codec::<String>(MAST)
            .codec::<u64>(DATA)
            .field::<Vec<FormId>>("overrides", ONAM)
            .field::<u32>("tagified_strings", INTV)
            .field::<u32>("increment", INCC)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::decode::read_fields;
    use crate::field::write_field;
    use crate::header::RecordHeader;
    use crate::reader::FieldSetReader;
    use crate::writer::to_payload;
    use serde_json::json;

    fn payload() -> Vec<u8> {
        let mut hedr = Vec::new();
        hedr.extend_from_slice(&1.7f32.to_le_bytes());
        hedr.extend_from_slice(&3u32.to_le_bytes());
        hedr.extend_from_slice(&0x800u32.to_le_bytes());
        let mut out = Vec::new();
        write_field(&mut out, HEDR, &hedr).unwrap();
        write_field(&mut out, CNAM, b"mcarofano\0").unwrap();
        write_field(&mut out, MAST, b"Skyrim.esm\0").unwrap();
        write_field(&mut out, DATA, &0u64.to_le_bytes()).unwrap();
        write_field(&mut out, MAST, b"Update.esm\0").unwrap();
        write_field(&mut out, DATA, &0u64.to_le_bytes()).unwrap();
        write_field(&mut out, ONAM, &[0x4D, 0x2E, 0x01, 0x00, 0x07, 0x00, 0x00, 0x01]).unwrap();
        write_field(&mut out, INTV, &1u32.to_le_bytes()).unwrap();
        out
    }

    #[test]
    fn decode_and_encode() {
        let map = PluginHeader::field_map();
        let header = RecordHeader::new(PluginHeader::TAG);
        let data = payload();
        let mut issues = Vec::new();
        let fields = read_fields(&header, &data, Some(&map), &mut issues).unwrap();
        assert!(issues.is_empty());
        let tes4 = PluginHeader::deserialize(FieldSetReader::new(&header, &fields, &map)).unwrap();
        assert_eq!(tes4.author.as_deref(), Some("mcarofano"));
        assert_eq!(tes4.description, None);
        assert_eq!(
            tes4.masters,
            vec![
                Master {
                    file: "Skyrim.esm".into(),
                    size: Some(0)
                },
                Master {
                    file: "Update.esm".into(),
                    size: Some(0)
                },
            ]
        );
        assert_eq!(
            tes4.overrides,
            Some(vec![FormId(0x0001_2E4D), FormId(0x0100_0007)])
        );
        assert_eq!(to_payload(&map, &tes4).unwrap(), data);

        let json = serde_json::to_value(&tes4).unwrap();
        assert_eq!(json["masters"][1], json!({"file": "Update.esm", "size": 0}));
        assert_eq!(json["overrides"], json!(["0x00012E4D", "0x01000007"]));
        assert!(json.get("increment").is_none());
    }
}
