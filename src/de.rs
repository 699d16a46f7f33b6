//! Binary deserialization of field payloads.
//!
//! The inverse of [`crate::ser`]. The layout isn't self-describing, so the type being decoded
//! drives every read. A few rules stand in for the missing markers:
//!
//! - An `Option` is `Some` whenever any bytes remain, so optional values belong at the end
//! - Unbounded sequences and byte buffers consume everything that remains
//! - Strings must be NUL-terminated valid UTF-8

use byteorder::{LittleEndian, ReadBytesExt};
use serde::de::value::U32Deserializer;
use serde::de::Error as DeError;
use serde::de::*;

use crate::error::{Error, Result};

/// Decode a value from a complete field payload. Every byte must be consumed.
pub fn from_bytes<'de, T: Deserialize<'de>>(data: &'de [u8]) -> Result<T> {
    let mut de = BinaryDeserializer::new(data);
    let value = T::deserialize(&mut de)?;
    if !de.data.is_empty() {
        return Err(Error::TrailingBytes(de.data.len()));
    }
    Ok(value)
}

pub struct BinaryDeserializer<'de> {
    data: &'de [u8],
}

impl<'de> BinaryDeserializer<'de> {
    pub fn new(data: &'de [u8]) -> Self {
        Self { data }
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    fn short(&self, step: &'static str, expected: usize) -> Error {
        Error::truncated(step, self.data.len(), expected)
    }

    fn take(&mut self, count: usize, step: &'static str) -> Result<&'de [u8]> {
        if self.data.len() < count {
            return Err(self.short(step, count));
        }
        let (head, tail) = self.data.split_at(count);
        self.data = tail;
        Ok(head)
    }

    fn read_zstr(&mut self) -> Result<&'de str> {
        let end = self
            .data
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| Error::SerdeFail("string is missing its NUL terminator".to_string()))?;
        let bytes = self.take(end + 1, "decode string")?;
        std::str::from_utf8(&bytes[..end])
            .map_err(|e| Error::SerdeFail(format!("string isn't valid UTF-8: {}", e)))
    }

    fn read_variant(&mut self) -> Result<u32> {
        let actual = self.data.len();
        self.data
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::truncated("decode variant index", actual, 4))
    }
}

macro_rules! read_number {
    ($name:ident, $visit:ident, $read:ident, $len:expr) => {
        fn $name<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            let actual = self.data.len();
            let v = self
                .data
                .$read::<LittleEndian>()
                .map_err(|_| Error::truncated(stringify!($name), actual, $len))?;
            visitor.$visit(v)
        }
    };
}

impl<'de, 'a> Deserializer<'de> for &'a mut BinaryDeserializer<'de> {
    type Error = Error;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::SerdeFail(
            "binary field data isn't self-describing".to_string(),
        ))
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.take(1, "decode bool")?[0] {
            0 => visitor.visit_bool(false),
            1 => visitor.visit_bool(true),
            v => Err(Error::invalid_value(
                Unexpected::Unsigned(v as u64),
                &"0 or 1",
            )),
        }
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.take(1, "decode i8")?[0];
        visitor.visit_i8(v as i8)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.take(1, "decode u8")?[0];
        visitor.visit_u8(v)
    }

    read_number!(deserialize_i16, visit_i16, read_i16, 2);
    read_number!(deserialize_i32, visit_i32, read_i32, 4);
    read_number!(deserialize_i64, visit_i64, read_i64, 8);
    read_number!(deserialize_u16, visit_u16, read_u16, 2);
    read_number!(deserialize_u32, visit_u32, read_u32, 4);
    read_number!(deserialize_u64, visit_u64, read_u64, 8);
    read_number!(deserialize_f32, visit_f32, read_f32, 4);
    read_number!(deserialize_f64, visit_f64, read_f64, 8);

    fn deserialize_char<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::SerdeFail(
            "char can't be stored in binary field data".to_string(),
        ))
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let s = self.read_zstr()?;
        visitor.visit_borrowed_str(s)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let rest = self.take(self.data.len(), "decode bytes")?;
        visitor.visit_borrowed_bytes(rest)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.data.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(SeqAccess::new(self, None))
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(SeqAccess::new(self, Some(len)))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_seq(SeqAccess::new(self, Some(len)))
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::SerdeFail(
            "map can't be stored in binary field data".to_string(),
        ))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_seq(SeqAccess::new(self, Some(fields.len())))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_enum(EnumAccess { de: self })
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::SerdeFail(
            "binary field data has no identifiers".to_string(),
        ))
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::SerdeFail(
            "binary field data can't skip unknown values".to_string(),
        ))
    }
}

/// Elements of a tuple or struct (`size_left` known), or of a sequence that runs to the end
/// of the data.
struct SeqAccess<'a, 'de> {
    de: &'a mut BinaryDeserializer<'de>,
    size_left: Option<usize>,
}

impl<'a, 'de> SeqAccess<'a, 'de> {
    fn new(de: &'a mut BinaryDeserializer<'de>, len: Option<usize>) -> Self {
        Self { de, size_left: len }
    }
}

impl<'a, 'de> serde::de::SeqAccess<'de> for SeqAccess<'a, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        match self.size_left {
            Some(0) => Ok(None),
            Some(ref mut left) => {
                *left -= 1;
                seed.deserialize(&mut *self.de).map(Some)
            }
            None if self.de.data.is_empty() => Ok(None),
            None => {
                let before = self.de.data.len();
                let val = seed.deserialize(&mut *self.de)?;
                if self.de.data.len() == before {
                    return Err(Error::SerdeFail(
                        "sequence element consumed no bytes".to_string(),
                    ));
                }
                Ok(Some(val))
            }
        }
    }

    fn size_hint(&self) -> Option<usize> {
        self.size_left
    }
}

struct EnumAccess<'a, 'de> {
    de: &'a mut BinaryDeserializer<'de>,
}

impl<'a, 'de> serde::de::EnumAccess<'de> for EnumAccess<'a, 'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: DeserializeSeed<'de>,
    {
        let index = self.de.read_variant()?;
        let index_de: U32Deserializer<Error> = index.into_deserializer();
        let val = seed.deserialize(index_de)?;
        Ok((val, self))
    }
}

impl<'a, 'de> serde::de::VariantAccess<'de> for EnumAccess<'a, 'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.de)
    }

    fn struct_variant<V>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(SeqAccess::new(self.de, Some(fields.len())))
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(SeqAccess::new(self.de, Some(len)))
    }
}
