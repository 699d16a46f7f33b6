//! Reading a record shape out of a record's decoded fields.
//!
//! [`FieldSetReader`] is a serde `Deserializer` that presents a leaf record as a map from the
//! shape's keys to the structured values of the fields bound to them.

use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, Visitor};
use serde::forward_to_deserialize_any;

use crate::error::{Error, Result};
use crate::field::{DecodedFields, Field, FieldValue};
use crate::header::RecordHeader;
use crate::registry::{Binding, FieldMap};
use crate::tag::Tag;

/// Reserved key holding the record header.
pub const HEADER_KEY: &str = "_header";
/// Reserved key holding every decoded field of the record.
pub const FIELDS_KEY: &str = "_fields";

/// Keyed access to one record's decoded fields.
#[derive(Clone, Copy)]
pub struct FieldSetReader<'a> {
    header: &'a RecordHeader,
    fields: &'a DecodedFields,
    map: &'a FieldMap,
}

impl<'a> FieldSetReader<'a> {
    pub fn new(header: &'a RecordHeader, fields: &'a DecodedFields, map: &'a FieldMap) -> Self {
        Self {
            header,
            fields,
            map,
        }
    }

    pub fn header(&self) -> &'a RecordHeader {
        self.header
    }

    pub fn fields(&self) -> &'a DecodedFields {
        self.fields
    }

    /// Whether a read of `key` would find a value.
    pub fn contains(&self, key: &str) -> bool {
        match key {
            HEADER_KEY | FIELDS_KEY => true,
            _ => match self.map.binding_for_key(key) {
                Some(binding) => binding.tags().iter().any(|t| self.fields.contains(*t)),
                None => false,
            },
        }
    }

    /// The structured value for `key`.
    pub fn read(&self, key: &str) -> Result<serde_json::Value> {
        match key {
            HEADER_KEY => return Ok(serde_json::to_value(self.header)?),
            FIELDS_KEY => return Ok(serde_json::to_value(self.fields.iter().collect::<Vec<_>>())?),
            _ => (),
        }
        let binding = self.map.binding_for_key(key).ok_or_else(|| Error::UnknownField {
            record: self.map.record(),
            key: key.to_string(),
        })?;
        let value = match binding {
            Binding::Single(tag) => match self.fields.bucket(*tag).next() {
                Some(field) => self.structured(field)?,
                None => return Err(Error::MissingValue(key.to_string())),
            },
            Binding::Repeated(tag) => serde_json::Value::Array(
                self.fields
                    .bucket(*tag)
                    .map(|f| self.structured(f))
                    .collect::<Result<_>>()?,
            ),
            Binding::Run(members) => self.read_runs(members)?,
        };
        Ok(value)
    }

    /// Read `key` as `T`.
    pub fn read_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        Ok(T::deserialize(self.read(key)?)?)
    }

    /// Read `key` as `T`, or `None` if no field backs it.
    pub fn read_optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if self.contains(key) {
            self.read_as(key).map(Some)
        } else {
            Ok(None)
        }
    }

    fn structured(&self, field: &Field) -> Result<serde_json::Value> {
        match &field.value {
            FieldValue::Raw(_) if self.map.field_decoder(field.tag()).is_some() => {
                Err(Error::FieldDecodeFailure {
                    field: field.tag(),
                    reason: "field codec rejected the payload".to_string(),
                })
            }
            value => Ok(value.to_structured()),
        }
    }

    fn read_runs(&self, members: &[(&'static str, Tag)]) -> Result<serde_json::Value> {
        let mut runs = Vec::new();
        let mut current = serde_json::Map::new();
        for field in self.fields.iter() {
            let Some((name, _)) = members.iter().find(|(_, t)| *t == field.tag()) else {
                continue;
            };
            if current.contains_key(*name) {
                runs.push(serde_json::Value::Object(std::mem::take(&mut current)));
            }
            current.insert(name.to_string(), self.structured(field)?);
        }
        if !current.is_empty() {
            runs.push(serde_json::Value::Object(current));
        }
        Ok(serde_json::Value::Array(runs))
    }
}

impl<'de, 'a> de::Deserializer<'de> for FieldSetReader<'a> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        true
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let keys: Vec<&'static str> = self.map.keys().collect();
        visitor.visit_map(KeyAccess {
            reader: self,
            keys: keys.into_iter(),
            pending: None,
        })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_map(KeyAccess {
            reader: self,
            keys: fields.to_vec().into_iter(),
            pending: None,
        })
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

/// Walks the requested keys, yielding only those with a value behind them. Absent keys are left
/// for serde to default or report as missing.
struct KeyAccess<'a> {
    reader: FieldSetReader<'a>,
    keys: std::vec::IntoIter<&'static str>,
    pending: Option<&'static str>,
}

impl<'de, 'a> de::MapAccess<'de> for KeyAccess<'a> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        for key in self.keys.by_ref() {
            if self.reader.contains(key) {
                self.pending = Some(key);
                let key_de: de::value::StrDeserializer<Error> = key.into_deserializer();
                return seed.deserialize(key_de).map(Some);
            }
        }
        Ok(None)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let key = self
            .pending
            .take()
            .ok_or_else(|| Error::SerdeFail("value requested before key".to_string()))?;
        let value = self.reader.read(key)?;
        seed.deserialize(value).map_err(|e| {
            match (self.reader.map.tag_for_key(key), e.classify()) {
                (Some(field), serde_json::error::Category::Data) => Error::FieldDecodeFailure {
                    field,
                    reason: format!("key `{}`: {}", key, e),
                },
                _ => Error::Structured(e),
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::RawData;
    use crate::header::FieldHeader;
    use serde::Deserialize;
    use serde_json::json;

    const EDID: Tag = Tag::new(*b"EDID");
    const FULL: Tag = Tag::new(*b"FULL");
    const MAST: Tag = Tag::new(*b"MAST");
    const DATA: Tag = Tag::new(*b"DATA");
    const XXXX: Tag = Tag::new(*b"XXXX");

    fn map() -> FieldMap {
        FieldMap::new(Tag::new(*b"TEST"))
            .field::<String>("editor_id", EDID)
            .field::<String>("name", FULL)
            .run("masters", &[("file", MAST), ("size", DATA)])
            .codec::<String>(MAST)
            .codec::<u64>(DATA)
            .untyped("extra", XXXX)
    }

    fn typed(tag: Tag, value: serde_json::Value) -> Field {
        Field {
            header: FieldHeader::new(tag, 0),
            value: FieldValue::Typed(value),
        }
    }

    fn sample() -> DecodedFields {
        vec![
            typed(EDID, json!("Thing")),
            typed(MAST, json!("A.esm")),
            typed(DATA, json!(0)),
            typed(MAST, json!("B.esm")),
            typed(DATA, json!(0)),
            Field::raw(XXXX, vec![1, 2, 3]).unwrap(),
        ]
        .into_iter()
        .collect()
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Master {
        file: String,
        size: u64,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        #[serde(rename = "_header")]
        header: RecordHeader,
        editor_id: String,
        name: Option<String>,
        #[serde(default)]
        masters: Vec<Master>,
        extra: RawData,
    }

    #[test]
    fn reads_shape() {
        let header = RecordHeader::new(Tag::new(*b"TEST"));
        let fields = sample();
        let map = map();
        let reader = FieldSetReader::new(&header, &fields, &map);
        let thing = Thing::deserialize(reader).unwrap();
        assert_eq!(thing.header, header);
        assert_eq!(thing.editor_id, "Thing");
        assert_eq!(thing.name, None);
        assert_eq!(
            thing.masters,
            vec![
                Master {
                    file: "A.esm".into(),
                    size: 0
                },
                Master {
                    file: "B.esm".into(),
                    size: 0
                },
            ]
        );
        assert_eq!(thing.extra, RawData(vec![1, 2, 3]));
    }

    #[test]
    fn contains_and_read() {
        let header = RecordHeader::new(Tag::new(*b"TEST"));
        let fields = sample();
        let map = map();
        let reader = FieldSetReader::new(&header, &fields, &map);
        assert!(reader.contains("editor_id"));
        assert!(reader.contains("masters"));
        assert!(!reader.contains("name"));
        assert!(!reader.contains("unbound"));
        assert!(reader.contains(HEADER_KEY));
        assert_eq!(reader.read_as::<String>("editor_id").unwrap(), "Thing");
        assert_eq!(reader.read_optional::<String>("name").unwrap(), None);
        assert!(matches!(reader.read("name"), Err(Error::MissingValue(k)) if k == "name"));
        assert!(matches!(reader.read("unbound"), Err(Error::UnknownField { .. })));
        let all = reader.read(FIELDS_KEY).unwrap();
        assert_eq!(all.as_array().unwrap().len(), 6);
    }

    #[test]
    fn missing_required_key() {
        let header = RecordHeader::new(Tag::new(*b"TEST"));
        let fields: DecodedFields = vec![typed(FULL, json!("Name"))].into_iter().collect();
        let map = map();
        let reader = FieldSetReader::new(&header, &fields, &map);
        let result = Thing::deserialize(reader);
        assert!(matches!(result, Err(Error::MissingValue(k)) if k == "editor_id"));
    }

    #[test]
    fn rejected_payload_fails_read() {
        let header = RecordHeader::new(Tag::new(*b"TEST"));
        let fields: DecodedFields = vec![Field::raw(EDID, b"no nul".to_vec()).unwrap()]
            .into_iter()
            .collect();
        let map = map();
        let reader = FieldSetReader::new(&header, &fields, &map);
        assert!(matches!(
            reader.read("editor_id"),
            Err(Error::FieldDecodeFailure { .. })
        ));
    }

    #[test]
    fn wrong_type_is_decode_failure() {
        #[derive(Debug, Deserialize)]
        struct Wrong {
            #[allow(dead_code)]
            editor_id: u32,
        }
        let header = RecordHeader::new(Tag::new(*b"TEST"));
        let fields = sample();
        let map = map();
        let reader = FieldSetReader::new(&header, &fields, &map);
        assert!(matches!(
            Wrong::deserialize(reader),
            Err(Error::FieldDecodeFailure { field, .. }) if field == EDID
        ));
    }
}
