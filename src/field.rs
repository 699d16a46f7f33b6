//! Fields and the per-record set of decoded fields.

use std::collections::HashMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::header::FieldHeader;
use crate::registry::FieldMap;
use crate::tag::Tag;

/// Uninterpreted bytes.
///
/// Written out verbatim in binary form, and as a base64 string in structured form.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RawData(pub Vec<u8>);

impl fmt::Debug for RawData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RawData({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for RawData {
    fn from(v: Vec<u8>) -> Self {
        RawData(v)
    }
}

impl AsRef<[u8]> for RawData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for RawData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&STANDARD.encode(&self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for RawData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Base64Visitor;

        impl<'de> Visitor<'de> for Base64Visitor {
            type Value = RawData;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(fmt, "a base64 string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RawData, E> {
                STANDARD
                    .decode(v)
                    .map(RawData)
                    .map_err(|e| E::custom(format!("invalid base64: {}", e)))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(Base64Visitor)
        } else {
            serde_bytes::ByteBuf::deserialize(deserializer).map(|b| RawData(b.into_vec()))
        }
    }
}

/// The value carried by a field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Decoded by the field map's codec, held in structured form.
    Typed(serde_json::Value),
    /// The payload exactly as it appeared in the file.
    Raw(Vec<u8>),
}

impl FieldValue {
    pub fn is_raw(&self) -> bool {
        matches!(self, FieldValue::Raw(_))
    }

    /// The structured form handed to record shapes. Raw payloads show up as base64 strings,
    /// which is what [`RawData`] reads.
    pub fn to_structured(&self) -> serde_json::Value {
        match self {
            FieldValue::Typed(v) => v.clone(),
            FieldValue::Raw(bytes) => serde_json::Value::String(STANDARD.encode(bytes)),
        }
    }
}

/// One field of a leaf record.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub header: FieldHeader,
    pub value: FieldValue,
}

impl Field {
    pub fn raw(tag: Tag, payload: Vec<u8>) -> Result<Self> {
        Ok(Self {
            header: FieldHeader::for_payload(tag, payload.len())?,
            value: FieldValue::Raw(payload),
        })
    }

    pub fn tag(&self) -> Tag {
        self.header.tag
    }

    /// Binary payload for this field. Typed values go back through the codec bound in `map`.
    pub fn payload(&self, map: Option<&FieldMap>) -> Result<Vec<u8>> {
        match &self.value {
            FieldValue::Raw(bytes) => Ok(bytes.clone()),
            FieldValue::Typed(value) => {
                let codec = map
                    .and_then(|m| m.field_decoder(self.header.tag))
                    .ok_or(Error::UnknownFieldDecoder {
                        record: map.map(|m| m.record()).unwrap_or(Tag::new([0; 4])),
                        field: self.header.tag,
                    })?;
                codec.encode(value)
            }
        }
    }

    /// Write header and payload, with the size taken from the payload actually written.
    pub fn write(&self, map: Option<&FieldMap>, buf: &mut Vec<u8>) -> Result<()> {
        let payload = self.payload(map)?;
        write_field(buf, self.header.tag, &payload)
    }
}

/// Frame a payload with a field header.
pub fn write_field(buf: &mut Vec<u8>, tag: Tag, payload: &[u8]) -> Result<()> {
    FieldHeader::for_payload(tag, payload.len())?.write(buf);
    buf.extend_from_slice(payload);
    Ok(())
}

/// Convert a value to its structured form. Unlike `serde_json::to_value`, an `f32` keeps its
/// shortest `f32` rendering (`1.7`, not `1.7000000476837158`).
pub(crate) fn to_structured<T: Serialize + ?Sized>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::from_str(&serde_json::to_string(value)?)?)
}

/// Structured form of a single field: `{"tag": "EDID", "typed": ...}` or
/// `{"tag": "XXXX", "raw": "<base64>"}`.
#[derive(Serialize, Deserialize)]
struct FieldDoc {
    tag: Tag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typed: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw: Option<RawData>,
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let doc = match &self.value {
            FieldValue::Typed(v) => FieldDoc {
                tag: self.header.tag,
                typed: Some(v.clone()),
                raw: None,
            },
            FieldValue::Raw(bytes) => FieldDoc {
                tag: self.header.tag,
                typed: None,
                raw: Some(RawData(bytes.clone())),
            },
        };
        doc.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = FieldDoc::deserialize(deserializer)?;
        // The size is recomputed whenever the field is written
        let header = FieldHeader::new(doc.tag, 0);
        match (doc.typed, doc.raw) {
            (Some(v), None) => Ok(Field {
                header,
                value: FieldValue::Typed(v),
            }),
            (None, Some(raw)) => {
                let header = FieldHeader::for_payload(doc.tag, raw.0.len())
                    .map_err(de::Error::custom)?;
                Ok(Field {
                    header,
                    value: FieldValue::Raw(raw.0),
                })
            }
            _ => Err(de::Error::custom(format!(
                "field {} needs exactly one of `typed` or `raw`",
                doc.tag
            ))),
        }
    }
}

/// Every field of one record, in file order, indexed by tag.
///
/// Fields sharing a tag keep their relative order within the tag's bucket.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedFields {
    fields: Vec<Field>,
    by_tag: HashMap<Tag, Vec<usize>>,
}

impl DecodedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: Field) {
        self.by_tag
            .entry(field.tag())
            .or_default()
            .push(self.fields.len());
        self.fields.push(field);
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.by_tag.contains_key(&tag)
    }

    /// All fields carrying `tag`, in arrival order.
    pub fn bucket(&self, tag: Tag) -> impl Iterator<Item = &Field> + '_ {
        self.by_tag
            .get(&tag)
            .into_iter()
            .flatten()
            .map(move |i| &self.fields[*i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_vec(self) -> Vec<Field> {
        self.fields
    }

    /// Encode every field in arrival order.
    pub fn write(&self, map: Option<&FieldMap>, buf: &mut Vec<u8>) -> Result<()> {
        for field in &self.fields {
            field.write(map, buf)?;
        }
        Ok(())
    }
}

impl FromIterator<Field> for DecodedFields {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut fields = DecodedFields::new();
        for field in iter {
            fields.push(field);
        }
        fields
    }
}

impl<'a> IntoIterator for &'a DecodedFields {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn tag(s: &str) -> Tag {
        s.parse().unwrap()
    }

    #[test]
    fn buckets_keep_order() {
        let fields: DecodedFields = vec![
            Field::raw(tag("MAST"), b"A.esm\0".to_vec()).unwrap(),
            Field::raw(tag("DATA"), vec![0; 8]).unwrap(),
            Field::raw(tag("MAST"), b"B.esm\0".to_vec()).unwrap(),
        ]
        .into_iter()
        .collect();
        assert_eq!(fields.len(), 3);
        assert!(fields.contains(tag("DATA")));
        assert!(!fields.contains(tag("EDID")));
        let masters: Vec<_> = fields
            .bucket(tag("MAST"))
            .map(|f| match &f.value {
                FieldValue::Raw(b) => b.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(masters, vec![b"A.esm\0".to_vec(), b"B.esm\0".to_vec()]);
        let order: Vec<Tag> = fields.iter().map(|f| f.tag()).collect();
        assert_eq!(order, vec![tag("MAST"), tag("DATA"), tag("MAST")]);
        assert_eq!(fields.bucket(tag("EDID")).count(), 0);
    }

    #[test]
    fn raw_fields_write_verbatim() {
        let fields: DecodedFields = vec![Field::raw(tag("XXXX"), vec![1, 2, 3]).unwrap()]
            .into_iter()
            .collect();
        let mut buf = Vec::new();
        fields.write(None, &mut buf).unwrap();
        assert_eq!(buf, vec![b'X', b'X', b'X', b'X', 3, 0, 1, 2, 3]);
    }

    #[test]
    fn typed_without_codec_fails() {
        let field = Field {
            header: FieldHeader::new(tag("EDID"), 0),
            value: FieldValue::Typed(json!("Iron")),
        };
        assert!(matches!(
            field.payload(None),
            Err(Error::UnknownFieldDecoder { .. })
        ));
    }

    #[test]
    fn structured_field_forms() {
        let raw = Field::raw(tag("XXXX"), vec![0xDE, 0xAD]).unwrap();
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json, json!({"tag": "XXXX", "raw": "3q0="}));
        let back: Field = serde_json::from_value(json).unwrap();
        assert_eq!(back, raw);

        let typed = Field {
            header: FieldHeader::new(tag("EDID"), 0),
            value: FieldValue::Typed(json!("Iron")),
        };
        let json = serde_json::to_value(&typed).unwrap();
        assert_eq!(json, json!({"tag": "EDID", "typed": "Iron"}));
        let back: Field = serde_json::from_value(json).unwrap();
        assert_eq!(back, typed);

        assert!(serde_json::from_value::<Field>(json!({"tag": "EDID"})).is_err());
    }

    #[test]
    fn raw_data_forms() {
        let data = RawData(vec![1, 2, 3]);
        assert_eq!(serde_json::to_value(&data).unwrap(), json!("AQID"));
        assert_eq!(crate::ser::to_bytes(&data).unwrap(), vec![1, 2, 3]);
        let back: RawData = crate::de::from_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn floats_keep_short_form() {
        let value = to_structured(&(1.7f32, 5f32, 0.1f64)).unwrap();
        assert_eq!(value.to_string(), "[1.7,5.0,0.1]");
        let back: (f32, f32, f64) = serde_json::from_value(value).unwrap();
        assert_eq!(back, (1.7f32, 5f32, 0.1f64));
    }
}
