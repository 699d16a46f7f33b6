//! Binary serialization of field payloads.
//!
//! Values are laid out back to back with no markers, the way the game engine stores them:
//!
//! - Integers and floats - little-endian, at their declared width
//! - `bool` - one byte, 0 or 1
//! - Strings - UTF-8 followed by a NUL terminator
//! - Bytes - written as-is
//! - `None` and unit - nothing at all
//! - Sequences - elements one after another, with no count
//! - Tuples and structs - fields in declaration order
//! - Enum variants - a little-endian `u32` variant index, then any content
//!
//! Maps and `char` have no representation and fail to serialize.

use serde::ser::*;

use crate::error::{Error, Result};

/// Serialize a value into its binary field layout.
pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut ser = BinarySerializer::default();
    value.serialize(&mut ser)?;
    Ok(ser.into_inner())
}

#[derive(Default, Debug)]
pub struct BinarySerializer {
    buf: Vec<u8>,
}

impl BinarySerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub(crate) fn push_variant(&mut self, variant_index: u32) {
        self.buf.extend_from_slice(&variant_index.to_le_bytes());
    }
}

fn unsupported(what: &str) -> Error {
    Error::SerdeFail(format!("{} can't be stored in binary field data", what))
}

impl<'a> Serializer for &'a mut BinarySerializer {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.buf.push(v as u8);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.buf.push(v);
        Ok(())
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_char(self, _v: char) -> Result<()> {
        Err(unsupported("char"))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        if v.as_bytes().contains(&0) {
            return Err(Error::SerdeFail(
                "strings can't contain an embedded NUL".to_string(),
            ));
        }
        self.buf.extend_from_slice(v.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(v);
        Ok(())
    }

    fn serialize_none(self) -> Result<()> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, v: &T) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> Result<()> {
        self.push_variant(variant_index);
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<()> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<()> {
        self.push_variant(variant_index);
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self> {
        Ok(self)
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self> {
        self.push_variant(variant_index);
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(unsupported("map"))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self> {
        self.push_variant(variant_index);
        Ok(self)
    }
}

impl<'a> SerializeSeq for &'a mut BinarySerializer {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a> SerializeTuple for &'a mut BinarySerializer {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a> SerializeTupleStruct for &'a mut BinarySerializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a> SerializeTupleVariant for &'a mut BinarySerializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a> SerializeStruct for &'a mut BinarySerializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a> SerializeStructVariant for &'a mut BinarySerializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[test]
    fn integers_little_endian() {
        assert_eq!(to_bytes(&0x0403_0201u32).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(to_bytes(&-2i16).unwrap(), vec![0xFE, 0xFF]);
        assert_eq!(to_bytes(&0xABu8).unwrap(), vec![0xAB]);
        assert_eq!(to_bytes(&1u64).unwrap(), vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn floats() {
        assert_eq!(to_bytes(&1.5f32).unwrap(), 1.5f32.to_le_bytes().to_vec());
        assert_eq!(to_bytes(&-0.25f64).unwrap(), (-0.25f64).to_le_bytes().to_vec());
    }

    #[test]
    fn zstring() {
        assert_eq!(to_bytes("Iron").unwrap(), b"Iron\0".to_vec());
        assert_eq!(to_bytes("").unwrap(), vec![0]);
        assert!(to_bytes("a\0b").is_err());
    }

    #[test]
    fn struct_in_order() {
        #[derive(Serialize)]
        struct Data {
            value: u32,
            weight: f32,
            flag: bool,
            missing: Option<u16>,
        }
        let enc = to_bytes(&Data {
            value: 25,
            weight: 2.0,
            flag: true,
            missing: None,
        })
        .unwrap();
        let mut expected = 25u32.to_le_bytes().to_vec();
        expected.extend_from_slice(&2.0f32.to_le_bytes());
        expected.push(1);
        assert_eq!(enc, expected);
    }

    #[test]
    fn sequences_have_no_count() {
        let enc = to_bytes(&vec![1u32, 2, 3]).unwrap();
        assert_eq!(enc.len(), 12);
        assert_eq!(&enc[4..8], &[2, 0, 0, 0]);
    }

    #[test]
    fn enum_index() {
        #[derive(Serialize)]
        enum Target {
            _Subject,
            Reference(u32),
        }
        let enc = to_bytes(&Target::Reference(9)).unwrap();
        assert_eq!(enc, vec![1, 0, 0, 0, 9, 0, 0, 0]);
    }

    #[test]
    fn map_and_char_fail() {
        let map: BTreeMap<String, u32> = BTreeMap::new();
        assert!(to_bytes(&map).is_err());
        assert!(to_bytes(&'x').is_err());
    }
}
