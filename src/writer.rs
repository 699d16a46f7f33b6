//! Writing a record shape back into framed binary fields.
//!
//! [`RecordSerializer`] accepts exactly one thing: a struct whose keys are bound in a
//! [`FieldMap`]. Each key becomes zero or more fields, each framed with its tag and the size of
//! the payload actually written.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::ser::{self, Impossible, Serialize};

use crate::error::{Error, Result};
use crate::field::{write_field, Field};
use crate::reader::{FIELDS_KEY, HEADER_KEY};
use crate::registry::{Binding, FieldMap};
use crate::ser::{to_bytes, BinarySerializer};
use crate::tag::Tag;

/// Encode a record shape into a leaf payload.
pub fn to_payload<T: Serialize + ?Sized>(map: &FieldMap, value: &T) -> Result<Vec<u8>> {
    let mut ser = RecordSerializer::new(map);
    value.serialize(&mut ser)?;
    Ok(ser.into_inner())
}

pub struct RecordSerializer<'m> {
    map: &'m FieldMap,
    body: Vec<u8>,
}

impl<'m> RecordSerializer<'m> {
    pub fn new(map: &'m FieldMap) -> Self {
        Self {
            map,
            body: Vec::new(),
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.body
    }

    fn write_key<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        let map = self.map;
        let binding = map.binding_for_key(key).ok_or_else(|| Error::UnknownField {
            record: map.record(),
            key: key.to_string(),
        })?;
        match binding {
            Binding::Single(tag) => value.serialize(FieldFramer {
                out: &mut self.body,
                tag: *tag,
                repeats: false,
            }),
            Binding::Repeated(tag) => value.serialize(FieldFramer {
                out: &mut self.body,
                tag: *tag,
                repeats: true,
            }),
            Binding::Run(members) => self.write_runs(key, members, value),
        }
    }

    fn write_runs<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        members: &[(&'static str, Tag)],
        value: &T,
    ) -> Result<()> {
        let runs = match serde_json::to_value(value)? {
            serde_json::Value::Null => return Ok(()),
            serde_json::Value::Array(runs) => runs,
            _ => return Err(not_runs(key)),
        };
        for run in runs {
            let serde_json::Value::Object(mut run) = run else {
                return Err(not_runs(key));
            };
            for (name, tag) in members {
                match run.remove(*name) {
                    None | Some(serde_json::Value::Null) => (),
                    Some(member) => {
                        let payload = self.encode_member(*tag, &member)?;
                        write_field(&mut self.body, *tag, &payload)?;
                    }
                }
            }
            if let Some(extra) = run.keys().next() {
                return Err(Error::UnknownField {
                    record: self.map.record(),
                    key: format!("{}.{}", key, extra),
                });
            }
        }
        Ok(())
    }

    fn encode_member(&self, tag: Tag, value: &serde_json::Value) -> Result<Vec<u8>> {
        match (self.map.field_decoder(tag), value) {
            (Some(codec), _) => codec.encode(value),
            (None, serde_json::Value::String(s)) => STANDARD.decode(s).map_err(|e| {
                Error::SerdeFail(format!("field {} is not valid base64: {}", tag, e))
            }),
            (None, _) => Err(Error::UnknownFieldDecoder {
                record: self.map.record(),
                field: tag,
            }),
        }
    }

    /// Write the fields of a `_fields` value whose tags aren't bound to a key.
    fn write_loose<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        if value.is_null() {
            return Ok(());
        }
        let fields: Vec<Field> = serde_json::from_value(value)?;
        let map = self.map;
        for field in fields.iter().filter(|f| map.binding_for_tag(f.tag()).is_none()) {
            field.write(Some(self.map), &mut self.body)?;
        }
        Ok(())
    }
}

fn not_a_record() -> Error {
    Error::SerdeFail("only a struct of bound keys can be written as a record".to_string())
}

fn not_runs(key: &str) -> Error {
    Error::SerdeFail(format!("key `{}` must hold a sequence of structs", key))
}

macro_rules! reject {
    ($($name:ident: $ty:ty),*) => {
        $(
            fn $name(self, _v: $ty) -> Result<()> {
                Err(not_a_record())
            }
        )*
    };
}

impl<'a, 'm> ser::Serializer for &'a mut RecordSerializer<'m> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Self;
    type SerializeStructVariant = Impossible<(), Error>;

    fn is_human_readable(&self) -> bool {
        false
    }

    reject! {
        serialize_bool: bool, serialize_i8: i8, serialize_i16: i16, serialize_i32: i32,
        serialize_i64: i64, serialize_u8: u8, serialize_u16: u16, serialize_u32: u32,
        serialize_u64: u64, serialize_f32: f32, serialize_f64: f64, serialize_char: char,
        serialize_str: &str, serialize_bytes: &[u8]
    }

    fn serialize_none(self) -> Result<()> {
        Err(not_a_record())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Err(not_a_record())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Err(not_a_record())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<()> {
        Err(not_a_record())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()> {
        Err(not_a_record())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(not_a_record())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(not_a_record())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(not_a_record())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(not_a_record())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(not_a_record())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(not_a_record())
    }
}

impl<'a, 'm> ser::SerializeStruct for &'a mut RecordSerializer<'m> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        match key {
            HEADER_KEY => Ok(()),
            FIELDS_KEY => self.write_loose(value),
            _ => self.write_key(key, value),
        }
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

/// Frames the value of one key. `None` writes nothing, and a repeated key writes one field per
/// sequence element. Anything else becomes a single field holding the value's binary layout.
struct FieldFramer<'a> {
    out: &'a mut Vec<u8>,
    tag: Tag,
    repeats: bool,
}

impl<'a> FieldFramer<'a> {
    fn whole<T: Serialize + ?Sized>(self, value: &T) -> Result<()> {
        let payload = to_bytes(value)?;
        write_field(self.out, self.tag, &payload)
    }

    fn framed(self, variant: Option<u32>) -> Framed<'a> {
        let mut ser = BinarySerializer::new();
        if let Some(index) = variant {
            ser.push_variant(index);
        }
        Framed {
            out: self.out,
            tag: self.tag,
            ser,
        }
    }
}

macro_rules! frame_whole {
    ($($name:ident: $ty:ty),*) => {
        $(
            fn $name(self, v: $ty) -> Result<()> {
                self.whole(&v)
            }
        )*
    };
}

impl<'a> ser::Serializer for FieldFramer<'a> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = SeqFramer<'a>;
    type SerializeTuple = Framed<'a>;
    type SerializeTupleStruct = Framed<'a>;
    type SerializeTupleVariant = Framed<'a>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Framed<'a>;
    type SerializeStructVariant = Framed<'a>;

    fn is_human_readable(&self) -> bool {
        false
    }

    frame_whole! {
        serialize_bool: bool, serialize_i8: i8, serialize_i16: i16, serialize_i32: i32,
        serialize_i64: i64, serialize_u8: u8, serialize_u16: u16, serialize_u32: u32,
        serialize_u64: u64, serialize_f32: f32, serialize_f64: f64, serialize_char: char
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.whole(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        write_field(self.out, self.tag, v)
    }

    fn serialize_none(self) -> Result<()> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        write_field(self.out, self.tag, &[])
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        write_field(self.out, self.tag, &[])
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> Result<()> {
        write_field(self.out, self.tag, &variant_index.to_le_bytes())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<()> {
        let mut framed = self.framed(Some(variant_index));
        value.serialize(&mut framed.ser)?;
        framed.finish()
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SeqFramer<'a>> {
        if self.repeats {
            Ok(SeqFramer::Each {
                out: self.out,
                tag: self.tag,
            })
        } else {
            Ok(SeqFramer::Whole(self.framed(None)))
        }
    }

    fn serialize_tuple(self, _len: usize) -> Result<Framed<'a>> {
        Ok(self.framed(None))
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Framed<'a>> {
        Ok(self.framed(None))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Framed<'a>> {
        Ok(self.framed(Some(variant_index)))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::SerdeFail(format!(
            "field {} can't hold a map",
            self.tag
        )))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Framed<'a>> {
        Ok(self.framed(None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Framed<'a>> {
        Ok(self.framed(Some(variant_index)))
    }
}

/// A compound value being collected into a single field.
struct Framed<'a> {
    out: &'a mut Vec<u8>,
    tag: Tag,
    ser: BinarySerializer,
}

impl<'a> Framed<'a> {
    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut self.ser)
    }

    fn finish(self) -> Result<()> {
        write_field(self.out, self.tag, &self.ser.into_inner())
    }
}

impl<'a> ser::SerializeTuple for Framed<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> ser::SerializeTupleStruct for Framed<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> ser::SerializeTupleVariant for Framed<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> ser::SerializeStruct for Framed<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a> ser::SerializeStructVariant for Framed<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

enum SeqFramer<'a> {
    Whole(Framed<'a>),
    Each { out: &'a mut Vec<u8>, tag: Tag },
}

impl<'a> ser::SerializeSeq for SeqFramer<'a> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        match self {
            SeqFramer::Whole(framed) => framed.element(value),
            SeqFramer::Each { out, tag } => {
                let payload = to_bytes(value)?;
                write_field(out, *tag, &payload)
            }
        }
    }

    fn end(self) -> Result<()> {
        match self {
            SeqFramer::Whole(framed) => framed.finish(),
            SeqFramer::Each { .. } => Ok(()),
        }
    }
}
