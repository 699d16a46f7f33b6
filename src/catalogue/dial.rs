//! Dialogue topics (`DIAL`). Only the editor id is spelled out; every other field is carried
//! as it was read.

use serde::{Deserialize, Serialize};

use super::EDID;
use crate::field::Field;
use crate::registry::{FieldMap, RecordShape};
use crate::tag::Tag;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialogueTopic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_id: Option<String>,
    /// All of the record's fields. Fields bound to a key above are written from the key instead.
    #[serde(rename = "_fields", default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

impl RecordShape for DialogueTopic {
    const TAG: Tag = Tag::new(*b"DIAL");
    const NAME: &'static str = "DialogueTopic";

    fn field_map() -> FieldMap {
        FieldMap::new(Self::TAG).field::<String>("editor_id", EDID)
    }

    fn editor_id(&self) -> Option<&str> {
        self.editor_id.as_deref()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::decode::read_fields;
    use crate::field::{write_field, FieldValue};
    use crate::header::RecordHeader;
    use crate::reader::FieldSetReader;
    use crate::writer::to_payload;

    const FULL: Tag = Tag::new(*b"FULL");
    const PNAM: Tag = Tag::new(*b"PNAM");

    #[test]
    fn partial_record() {
        let mut data = Vec::new();
        write_field(&mut data, EDID, b"MQ101Topic\0").unwrap();
        write_field(&mut data, FULL, &[0x10, 0, 0, 0]).unwrap();
        write_field(&mut data, PNAM, &50f32.to_le_bytes()).unwrap();

        let map = DialogueTopic::field_map();
        let header = RecordHeader::new(DialogueTopic::TAG);
        let mut issues = Vec::new();
        let fields = read_fields(&header, &data, Some(&map), &mut issues).unwrap();
        // FULL and PNAM have no codec here
        assert_eq!(issues.len(), 2);

        let dial =
            DialogueTopic::deserialize(FieldSetReader::new(&header, &fields, &map)).unwrap();
        assert_eq!(RecordShape::editor_id(&dial), Some("MQ101Topic"));
        assert_eq!(dial.fields.len(), 3);
        assert!(matches!(dial.fields[0].value, FieldValue::Typed(_)));
        assert_eq!(to_payload(&map, &dial).unwrap(), data);

        let mut renamed = dial.clone();
        renamed.editor_id = Some("MQ102Topic".into());
        let payload = to_payload(&map, &renamed).unwrap();
        assert_eq!(&payload[6..16], b"MQ102Topic");
        assert_eq!(payload.len(), data.len());
    }
}
