//! Four-byte type identifiers.
//!
//! Every record and every field in a plugin file opens with a tag. Tags are compared and hashed
//! by their raw bytes, read and written as a little-endian `u32`, and shown as their four ASCII
//! characters whenever those are printable.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag([u8; 4]);

impl Tag {
    /// Tag of group records.
    pub const GROUP: Tag = Tag(*b"GRUP");

    pub const fn new(bytes: [u8; 4]) -> Self {
        Tag(bytes)
    }

    pub const fn from_u32(value: u32) -> Self {
        Tag(value.to_le_bytes())
    }

    pub const fn bytes(&self) -> [u8; 4] {
        self.0
    }

    pub const fn as_u32(&self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ')
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| Error::InvalidTagLength(s.len()))?;
        Ok(Tag(bytes))
    }
}

impl TryFrom<&str> for Tag {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl From<[u8; 4]> for Tag {
    fn from(bytes: [u8; 4]) -> Self {
        Tag(bytes)
    }
}

impl From<u32> for Tag {
    fn from(value: u32) -> Self {
        Tag::from_u32(value)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_printable() {
            // Printable ASCII is always valid UTF-8
            f.write_str(std::str::from_utf8(&self.0).map_err(|_| fmt::Error)?)
        } else {
            write!(f, "{}", self.as_u32())
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() && self.is_printable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_u32(self.as_u32())
        }
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TagVisitor;

        impl<'de> Visitor<'de> for TagVisitor {
            type Value = Tag;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(fmt, "a 4-character tag or a 32-bit integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Tag, E> {
                let v = u32::try_from(v)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))?;
                Ok(Tag::from_u32(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Tag, E> {
                let v = u32::try_from(v)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))?;
                Ok(Tag::from_u32(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Tag, E> {
                v.parse()
                    .map_err(|_| E::invalid_length(v.len(), &"exactly 4 bytes"))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_any(TagVisitor)
        } else {
            deserializer.deserialize_u32(TagVisitor)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::Rng;

    #[test]
    fn string_roundtrip() {
        for s in ["TES4", "GRUP", "EDID", "KWDA", "A B "] {
            let tag: Tag = s.parse().unwrap();
            assert_eq!(tag.to_string(), s);
        }
    }

    #[test]
    fn bytes_roundtrip() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let bytes: [u8; 4] = rng.gen();
            assert_eq!(Tag::new(bytes).bytes(), bytes);
            assert_eq!(Tag::from_u32(Tag::new(bytes).as_u32()).bytes(), bytes);
        }
    }

    #[test]
    fn wrong_length() {
        assert!(matches!("ABC".parse::<Tag>(), Err(Error::InvalidTagLength(3))));
        assert!(matches!("ABCDE".parse::<Tag>(), Err(Error::InvalidTagLength(5))));
    }

    #[test]
    fn little_endian_value() {
        let tag: Tag = "TES4".parse().unwrap();
        assert_eq!(tag.as_u32(), u32::from_le_bytes(*b"TES4"));
    }

    #[test]
    fn non_printable_shows_number() {
        let tag = Tag::new([0x01, 0x00, 0x00, 0x00]);
        assert_eq!(tag.to_string(), "1");
        let json = serde_json::to_value(tag).unwrap();
        assert_eq!(json, serde_json::json!(1));
        let back: Tag = serde_json::from_value(json).unwrap();
        assert_eq!(back, tag);
    }

    #[test]
    fn json_forms() {
        let tag: Tag = "ARMO".parse().unwrap();
        assert_eq!(serde_json::to_value(tag).unwrap(), serde_json::json!("ARMO"));
        let from_int: Tag = serde_json::from_value(serde_json::json!(tag.as_u32())).unwrap();
        assert_eq!(from_int, tag);
    }
}
