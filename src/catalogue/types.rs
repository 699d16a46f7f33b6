//! Field value types shared by the built-in record shapes.

use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Reference to another record, by its 32-bit form id. Written as `"0x%08X"` in structured
/// form.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormId(pub u32);

impl fmt::Debug for FormId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FormId({:#010X})", self.0)
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for FormId {
    fn from(v: u32) -> Self {
        FormId(v)
    }
}

impl Serialize for FormId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_u32(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for FormId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FormIdVisitor;

        impl<'de> Visitor<'de> for FormIdVisitor {
            type Value = FormId;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(fmt, "a form id, as a \"0x\" hex string or a 32-bit integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FormId, E> {
                u32::try_from(v)
                    .map(FormId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FormId, E> {
                u32::try_from(v)
                    .map(FormId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FormId, E> {
                let hex = v
                    .strip_prefix("0x")
                    .or_else(|| v.strip_prefix("0X"))
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))?;
                u32::from_str_radix(hex, 16)
                    .map(FormId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_any(FormIdVisitor)
        } else {
            deserializer.deserialize_u32(FormIdVisitor)
        }
    }
}

/// Object bounds (`OBND`): two opposite corners of the bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x1: i16,
    pub y1: i16,
    pub z1: i16,
    pub x2: i16,
    pub y2: i16,
    pub z2: i16,
}

/// Biped body template (`BOD2`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyTemplate {
    /// Bit set of the body slots covered.
    pub body_parts: u32,
    /// 0 light armour, 1 heavy armour, 2 clothing.
    pub armour_type: u32,
}

/// Strings stored with a `u32` byte count in front and no terminator.
pub mod sized_string {
    use super::*;

    pub fn serialize<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            return serializer.serialize_str(value);
        }
        let len = u32::try_from(value.len())
            .map_err(|_| serde::ser::Error::custom("string too long for a sized string"))?;
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&len)?;
        tuple.serialize_element(serde_bytes::Bytes::new(value.as_bytes()))?;
        tuple.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        struct SizedVisitor;

        impl<'de> Visitor<'de> for SizedVisitor {
            type Value = String;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(fmt, "a byte count followed by that many bytes of UTF-8")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<String, A::Error> {
                let len: u32 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let mut bytes = Vec::with_capacity((len as usize).min(1024));
                for i in 0..len as usize {
                    let b: u8 = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i + 1, &self))?;
                    bytes.push(b);
                }
                String::from_utf8(bytes).map_err(de::Error::custom)
            }
        }

        if deserializer.is_human_readable() {
            String::deserialize(deserializer)
        } else {
            // The element count isn't known until the prefix has been read
            deserializer.deserialize_tuple(usize::MAX, SizedVisitor)
        }
    }
}

/// One replacement texture set for a model (inside `MO2S`/`MO4S` and friends).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateTexture {
    /// Name of the 3D shape the texture applies to.
    #[serde(with = "sized_string")]
    pub name: String,
    /// The texture set record.
    pub texture: FormId,
    /// Index of the shape within the model.
    pub index: u32,
}

/// A counted list of [`AlternateTexture`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlternateTextures {
    pub textures: Vec<AlternateTexture>,
}

#[derive(Serialize)]
struct AlternateTexturesRef<'a> {
    textures: &'a [AlternateTexture],
}

#[derive(Deserialize)]
struct AlternateTexturesDoc {
    textures: Vec<AlternateTexture>,
}

impl Serialize for AlternateTextures {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            return AlternateTexturesRef {
                textures: &self.textures,
            }
            .serialize(serializer);
        }
        let count = u32::try_from(self.textures.len())
            .map_err(|_| serde::ser::Error::custom("too many alternate textures"))?;
        let mut tuple = serializer.serialize_tuple(1 + self.textures.len())?;
        tuple.serialize_element(&count)?;
        for texture in &self.textures {
            tuple.serialize_element(texture)?;
        }
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for AlternateTextures {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountedVisitor;

        impl<'de> Visitor<'de> for CountedVisitor {
            type Value = AlternateTextures;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(fmt, "a count followed by that many alternate textures")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let count: u32 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let mut textures = Vec::new();
                for i in 0..count as usize {
                    let texture = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i + 1, &self))?;
                    textures.push(texture);
                }
                Ok(AlternateTextures { textures })
            }
        }

        if deserializer.is_human_readable() {
            AlternateTexturesDoc::deserialize(deserializer).map(|d| AlternateTextures {
                textures: d.textures,
            })
        } else {
            deserializer.deserialize_tuple(usize::MAX, CountedVisitor)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::de::from_bytes;
    use crate::ser::to_bytes;
    use serde_json::json;

    const TEXTURE: [u8; 16] = [
        0x04, 0x00, 0x00, 0x00, // size 4
        0x54, 0x65, 0x73, 0x74, // "Test"
        0x01, 0x02, 0x03, 0x04, // form id 0x04030201
        0x0F, 0x00, 0x00, 0x00, // index 15
    ];

    #[test]
    fn form_id_forms() {
        let id = FormId(0x0001_2E4D);
        assert_eq!(serde_json::to_value(id).unwrap(), json!("0x00012E4D"));
        assert_eq!(to_bytes(&id).unwrap(), vec![0x4D, 0x2E, 0x01, 0x00]);
        let back: FormId = serde_json::from_value(json!("0x00012E4D")).unwrap();
        assert_eq!(back, id);
        let back: FormId = serde_json::from_value(json!(77389)).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_value::<FormId>(json!("12E4D")).is_err());
        assert!(serde_json::from_value::<FormId>(json!(-1)).is_err());
    }

    #[test]
    fn alternate_texture() {
        let decoded: AlternateTexture = from_bytes(&TEXTURE).unwrap();
        assert_eq!(
            decoded,
            AlternateTexture {
                name: "Test".into(),
                texture: FormId(0x0403_0201),
                index: 15,
            }
        );
        assert_eq!(to_bytes(&decoded).unwrap(), TEXTURE.to_vec());
        let json = serde_json::to_value(&decoded).unwrap();
        assert_eq!(
            json,
            json!({"name": "Test", "texture": "0x04030201", "index": 15})
        );
        let back: AlternateTexture = serde_json::from_value(json).unwrap();
        assert_eq!(back, decoded);
    }

    #[test]
    fn alternate_textures() {
        let mut data = vec![0x01, 0x00, 0x00, 0x00];
        data.extend_from_slice(&TEXTURE);
        let decoded: AlternateTextures = from_bytes(&data).unwrap();
        assert_eq!(decoded.textures.len(), 1);
        assert_eq!(decoded.textures[0].name, "Test");
        assert_eq!(to_bytes(&decoded).unwrap(), data);
        let json = serde_json::to_value(&decoded).unwrap();
        assert_eq!(
            json,
            json!({"textures": [{"name": "Test", "texture": "0x04030201", "index": 15}]})
        );
        let back: AlternateTextures = serde_json::from_value(json).unwrap();
        assert_eq!(back, decoded);
    }

    #[test]
    fn short_sized_string() {
        let data = [0x08, 0x00, 0x00, 0x00, b'a', b'b'];
        #[derive(Debug, Deserialize)]
        struct Name(#[serde(with = "sized_string")] String);
        assert!(from_bytes::<Name>(&data).is_err());
    }

    #[test]
    fn four_char_name_with_reference() {
        use crate::tag::Tag;
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct NamedReference {
            name: Tag,
            reference: FormId,
            index: u32,
        }
        let data = [
            0x54, 0x65, 0x73, 0x74, 0x01, 0x02, 0x03, 0x04, 0x0F, 0x00, 0x00, 0x00,
        ];
        let decoded: NamedReference = from_bytes(&data).unwrap();
        assert_eq!(
            serde_json::to_value(&decoded).unwrap(),
            json!({"name": "Test", "reference": "0x04030201", "index": 15})
        );
        assert_eq!(to_bytes(&decoded).unwrap(), data.to_vec());
    }

    #[test]
    fn bounds_layout() {
        let bounds = Bounds {
            x1: -10,
            y1: -20,
            z1: 0,
            x2: 10,
            y2: 20,
            z2: 30,
        };
        let enc = to_bytes(&bounds).unwrap();
        assert_eq!(enc.len(), 12);
        assert_eq!(&enc[0..2], &(-10i16).to_le_bytes());
        assert_eq!(from_bytes::<Bounds>(&enc).unwrap(), bounds);
    }
}
