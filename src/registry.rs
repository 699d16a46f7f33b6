//! Type registries.
//!
//! A [`Registry`] answers two questions by tag: which record shape (if any) a record decodes
//! into, and which [`FieldMap`] binds that shape's keys to field tags and field codecs. It is
//! assembled once through [`RegistryBuilder`] and is read-only afterwards, so one registry can
//! be shared by any number of processors on any number of threads.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::field::DecodedFields;
use crate::header::RecordHeader;
use crate::reader::FieldSetReader;
use crate::tag::Tag;

/// Binary encode/decode behavior for one field type.
///
/// Decoding produces the structured form of the value, and only succeeds if that form encodes
/// back to exactly the original payload, so a typed field never loses bytes.
#[derive(Clone, Copy)]
pub struct FieldCodec {
    type_name: &'static str,
    decode: fn(&[u8]) -> Result<serde_json::Value>,
    encode: fn(&serde_json::Value) -> Result<Vec<u8>>,
}

impl FieldCodec {
    /// Codec for any type with a serde implementation.
    pub fn of<T: Serialize + DeserializeOwned>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            decode: decode_as::<T>,
            encode: encode_as::<T>,
        }
    }

    /// Codec from hand-written functions.
    pub fn new(
        type_name: &'static str,
        decode: fn(&[u8]) -> Result<serde_json::Value>,
        encode: fn(&serde_json::Value) -> Result<Vec<u8>>,
    ) -> Self {
        Self {
            type_name,
            decode,
            encode,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn decode(&self, payload: &[u8]) -> Result<serde_json::Value> {
        (self.decode)(payload)
    }

    pub fn encode(&self, value: &serde_json::Value) -> Result<Vec<u8>> {
        (self.encode)(value)
    }
}

impl fmt::Debug for FieldCodec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FieldCodec({})", self.type_name)
    }
}

fn decode_as<T: Serialize + DeserializeOwned>(payload: &[u8]) -> Result<serde_json::Value> {
    let value: T = crate::de::from_bytes(payload)?;
    let structured = crate::field::to_structured(&value)?;
    if encode_as::<T>(&structured)? != payload {
        return Err(Error::SerdeFail(format!(
            "{} does not re-encode to the original bytes",
            std::any::type_name::<T>()
        )));
    }
    Ok(structured)
}

fn encode_as<T: Serialize + DeserializeOwned>(value: &serde_json::Value) -> Result<Vec<u8>> {
    let value = T::deserialize(value)?;
    crate::ser::to_bytes(&value)
}

/// How one struct key maps onto fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    /// The key holds the first field with this tag.
    Single(Tag),
    /// The key holds a sequence, one field per element, all with this tag.
    Repeated(Tag),
    /// The key holds a sequence of structs. Each struct is a run of consecutive fields, one per
    /// member, and a new run begins whenever a member's tag comes round again.
    Run(Vec<(&'static str, Tag)>),
}

impl Binding {
    pub fn tags(&self) -> Vec<Tag> {
        match self {
            Binding::Single(tag) | Binding::Repeated(tag) => vec![*tag],
            Binding::Run(members) => members.iter().map(|(_, t)| *t).collect(),
        }
    }
}

/// Per-shape table of key bindings and field codecs.
#[derive(Clone, Debug)]
pub struct FieldMap {
    record: Tag,
    bindings: Vec<(&'static str, Binding)>,
    by_key: HashMap<&'static str, usize>,
    by_tag: HashMap<Tag, usize>,
    codecs: HashMap<Tag, FieldCodec>,
}

impl FieldMap {
    pub fn new(record: Tag) -> Self {
        Self {
            record,
            bindings: Vec::new(),
            by_key: HashMap::new(),
            by_tag: HashMap::new(),
            codecs: HashMap::new(),
        }
    }

    /// Bind `key` to the single field `tag`, decoded as `T`.
    pub fn field<T: Serialize + DeserializeOwned>(self, key: &'static str, tag: Tag) -> Self {
        self.bind(key, Binding::Single(tag)).codec::<T>(tag)
    }

    /// Bind `key` to every field `tag`, each decoded as `T`.
    pub fn repeated<T: Serialize + DeserializeOwned>(self, key: &'static str, tag: Tag) -> Self {
        self.bind(key, Binding::Repeated(tag)).codec::<T>(tag)
    }

    /// Bind `key` to the single field `tag` with no codec. The key reads the raw payload as a
    /// base64 string, which [`crate::RawData`] understands.
    pub fn untyped(self, key: &'static str, tag: Tag) -> Self {
        self.bind(key, Binding::Single(tag))
    }

    /// Bind `key` to runs of consecutive fields. Member codecs are attached with
    /// [`FieldMap::codec`].
    pub fn run(self, key: &'static str, members: &[(&'static str, Tag)]) -> Self {
        self.bind(key, Binding::Run(members.to_vec()))
    }

    /// Attach the codec for `T` to `tag`.
    pub fn codec<T: Serialize + DeserializeOwned>(mut self, tag: Tag) -> Self {
        self.set_codec(tag, FieldCodec::of::<T>());
        self
    }

    pub fn bind(mut self, key: &'static str, binding: Binding) -> Self {
        self.insert(key, binding);
        self
    }

    /// Add or replace a binding.
    pub fn insert(&mut self, key: &'static str, binding: Binding) {
        let index = match self.by_key.get(key) {
            Some(&index) => {
                for tag in self.bindings[index].1.tags() {
                    self.by_tag.remove(&tag);
                }
                self.bindings[index].1 = binding;
                index
            }
            None => {
                self.bindings.push((key, binding));
                self.by_key.insert(key, self.bindings.len() - 1);
                self.bindings.len() - 1
            }
        };
        for tag in self.bindings[index].1.tags() {
            self.by_tag.insert(tag, index);
        }
    }

    pub fn set_codec(&mut self, tag: Tag, codec: FieldCodec) {
        self.codecs.insert(tag, codec);
    }

    /// The record tag this map belongs to.
    pub fn record(&self) -> Tag {
        self.record
    }

    pub fn tag_for_key(&self, key: &str) -> Option<Tag> {
        self.binding_for_key(key)
            .and_then(|b| b.tags().first().copied())
    }

    pub fn binding_for_key(&self, key: &str) -> Option<&Binding> {
        self.by_key.get(key).map(|i| &self.bindings[*i].1)
    }

    /// The key and binding a field tag belongs to.
    pub fn binding_for_tag(&self, tag: Tag) -> Option<(&'static str, &Binding)> {
        self.by_tag.get(&tag).map(|i| {
            let (key, binding) = &self.bindings[*i];
            (*key, binding)
        })
    }

    pub fn field_decoder(&self, tag: Tag) -> Option<&FieldCodec> {
        self.codecs.get(&tag)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.bindings.iter().map(|(k, _)| *k)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.codecs.is_empty()
    }
}

/// A declared record shape: a struct whose serde traversal is the one and only description of
/// both its binary and its structured form.
///
/// Keys are the struct's serde field names. Two keys are reserved: `_header` reads the record
/// header and `_fields` reads every decoded field. When writing binary data, `_header` is
/// skipped (the header is written by the record), and `_fields` writes each listed field whose
/// tag isn't bound to a key, so a shape can bind a few keys and carry the rest verbatim.
pub trait RecordShape: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    const TAG: Tag;
    /// Display name of the record type.
    const NAME: &'static str;

    fn field_map() -> FieldMap;

    /// Editor-facing identifier, when the shape has one.
    fn editor_id(&self) -> Option<&str> {
        None
    }
}

/// Object-safe view of a decoded record shape.
pub trait Shape: fmt::Debug + Send + Sync {
    fn tag(&self) -> Tag;

    fn editor_id(&self) -> Option<&str>;

    /// Encode the leaf payload (fields only, no record header).
    fn encode(&self, map: &FieldMap) -> Result<Vec<u8>>;

    fn to_structured(&self) -> Result<serde_json::Value>;

    fn clone_box(&self) -> Box<dyn Shape>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: RecordShape> Shape for T {
    fn tag(&self) -> Tag {
        T::TAG
    }

    fn editor_id(&self) -> Option<&str> {
        RecordShape::editor_id(self)
    }

    fn encode(&self, map: &FieldMap) -> Result<Vec<u8>> {
        crate::writer::to_payload(map, self)
    }

    fn to_structured(&self) -> Result<serde_json::Value> {
        crate::field::to_structured(self)
    }

    fn clone_box(&self) -> Box<dyn Shape> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Clone for Box<dyn Shape> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

type DecodeFn = fn(&RecordHeader, &DecodedFields, &FieldMap) -> Result<Box<dyn Shape>>;
type FromStructuredFn = fn(serde_json::Value) -> Result<Box<dyn Shape>>;

/// Constructors for one record shape, resolved by tag.
#[derive(Clone, Copy)]
pub struct ShapeDescriptor {
    tag: Tag,
    name: &'static str,
    decode: DecodeFn,
    from_structured: FromStructuredFn,
}

impl ShapeDescriptor {
    pub fn of<T: RecordShape>() -> Self {
        Self {
            tag: T::TAG,
            name: T::NAME,
            decode: decode_shape::<T>,
            from_structured: shape_from_structured::<T>,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build the shape from a record's decoded fields.
    pub fn decode(
        &self,
        header: &RecordHeader,
        fields: &DecodedFields,
        map: &FieldMap,
    ) -> Result<Box<dyn Shape>> {
        (self.decode)(header, fields, map)
    }

    /// Build the shape from its structured document.
    pub fn from_structured(&self, value: serde_json::Value) -> Result<Box<dyn Shape>> {
        (self.from_structured)(value)
    }
}

impl fmt::Debug for ShapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ShapeDescriptor({} => {})", self.tag, self.name)
    }
}

fn decode_shape<T: RecordShape>(
    header: &RecordHeader,
    fields: &DecodedFields,
    map: &FieldMap,
) -> Result<Box<dyn Shape>> {
    let reader = FieldSetReader::new(header, fields, map);
    Ok(Box::new(T::deserialize(reader)?))
}

fn shape_from_structured<T: RecordShape>(value: serde_json::Value) -> Result<Box<dyn Shape>> {
    Ok(Box::new(serde_json::from_value::<T>(value)?))
}

/// Frozen lookup tables of record shapes and field maps.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    shapes: HashMap<Tag, ShapeDescriptor>,
    field_maps: HashMap<Tag, FieldMap>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// A registry that knows no shapes: every record decodes as opaque.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The shape registered for `tag`, or `None` for records to keep opaque.
    pub fn record_shape(&self, tag: Tag) -> Option<&ShapeDescriptor> {
        self.shapes.get(&tag)
    }

    /// The field map of a registered shape.
    pub fn field_map(&self, tag: Tag) -> Result<&FieldMap> {
        self.field_maps.get(&tag).ok_or(Error::MissingFieldMap(tag))
    }

    /// The field map for `tag`, if one exists. Field maps may exist for records with no shape,
    /// giving their fields typed values even though the record itself stays opaque.
    pub fn fields_for(&self, tag: Tag) -> Option<&FieldMap> {
        self.field_maps.get(&tag)
    }

    pub fn shapes(&self) -> impl Iterator<Item = &ShapeDescriptor> {
        self.shapes.values()
    }
}

/// Collects shapes and field maps, then validates them into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    shapes: HashMap<Tag, ShapeDescriptor>,
    field_maps: HashMap<Tag, FieldMap>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shape together with its own field map.
    pub fn record<T: RecordShape>(self) -> Self {
        self.shape(ShapeDescriptor::of::<T>()).field_map(T::field_map())
    }

    /// Register a shape constructor for its tag. A field map must also be registered before
    /// [`RegistryBuilder::build`].
    pub fn shape(mut self, descriptor: ShapeDescriptor) -> Self {
        self.shapes.insert(descriptor.tag(), descriptor);
        self
    }

    /// Register (or replace) the field map for the map's record tag.
    pub fn field_map(mut self, map: FieldMap) -> Self {
        self.field_maps.insert(map.record(), map);
        self
    }

    /// Register a field codec for `field` within records tagged `record`.
    pub fn field_decoder(mut self, record: Tag, field: Tag, codec: FieldCodec) -> Self {
        self.field_maps
            .entry(record)
            .or_insert_with(|| FieldMap::new(record))
            .set_codec(field, codec);
        self
    }

    pub fn build(self) -> Result<Registry> {
        for tag in self.shapes.keys() {
            if !self.field_maps.contains_key(tag) {
                return Err(Error::MissingFieldMap(*tag));
            }
        }
        Ok(Registry {
            shapes: self.shapes,
            field_maps: self.field_maps,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    const EDID: Tag = Tag::new(*b"EDID");
    const DATA: Tag = Tag::new(*b"DATA");
    const MAST: Tag = Tag::new(*b"MAST");

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Sample {
        editor_id: String,
    }

    impl RecordShape for Sample {
        const TAG: Tag = Tag::new(*b"SMPL");
        const NAME: &'static str = "Sample";

        fn field_map() -> FieldMap {
            FieldMap::new(Self::TAG).field::<String>("editor_id", EDID)
        }

        fn editor_id(&self) -> Option<&str> {
            Some(&self.editor_id)
        }
    }

    #[test]
    fn field_map_lookups() {
        let map = FieldMap::new(Sample::TAG)
            .field::<String>("editor_id", EDID)
            .repeated::<String>("masters", MAST)
            .untyped("data", DATA);
        assert_eq!(map.tag_for_key("editor_id"), Some(EDID));
        assert_eq!(map.tag_for_key("masters"), Some(MAST));
        assert_eq!(map.tag_for_key("nothing"), None);
        assert!(map.field_decoder(EDID).is_some());
        assert!(map.field_decoder(DATA).is_none());
        assert_eq!(map.binding_for_tag(MAST).map(|(k, _)| k), Some("masters"));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["editor_id", "masters", "data"]);
    }

    #[test]
    fn rebinding_replaces() {
        let map = FieldMap::new(Sample::TAG)
            .untyped("data", DATA)
            .bind("data", Binding::Single(EDID));
        assert_eq!(map.tag_for_key("data"), Some(EDID));
        assert!(map.binding_for_tag(DATA).is_none());
        assert_eq!(map.keys().count(), 1);
    }

    #[test]
    fn run_binding() {
        let map = FieldMap::new(Sample::TAG)
            .run("masters", &[("file", MAST), ("size", DATA)])
            .codec::<String>(MAST)
            .codec::<u64>(DATA);
        assert_eq!(map.tag_for_key("masters"), Some(MAST));
        assert_eq!(map.binding_for_tag(DATA).map(|(k, _)| k), Some("masters"));
        assert_eq!(map.field_decoder(DATA).unwrap().type_name(), "u64");
    }

    #[test]
    fn codec_rejects_lossy_values() {
        let codec = FieldCodec::of::<String>();
        assert_eq!(codec.decode(b"Iron\0").unwrap(), serde_json::json!("Iron"));
        assert!(codec.decode(b"Iron").is_err());
        assert!(codec.decode(b"Iron\0\0").is_err());
        assert_eq!(codec.encode(&serde_json::json!("Iron")).unwrap(), b"Iron\0".to_vec());
        let float = FieldCodec::of::<f32>();
        assert!(float.decode(&f32::NAN.to_le_bytes()).is_err());
        assert!(float.decode(&1.25f32.to_le_bytes()).is_ok());
    }

    #[test]
    fn registry_lookups() {
        let registry = Registry::builder().record::<Sample>().build().unwrap();
        assert!(registry.record_shape(Sample::TAG).is_some());
        assert!(registry.record_shape(EDID).is_none());
        assert!(registry.field_map(Sample::TAG).is_ok());
        assert!(matches!(
            registry.field_map(EDID),
            Err(Error::MissingFieldMap(_))
        ));
    }

    #[test]
    fn shape_without_map_is_rejected() {
        let result = Registry::builder()
            .shape(ShapeDescriptor::of::<Sample>())
            .build();
        assert!(matches!(result, Err(Error::MissingFieldMap(t)) if t == Sample::TAG));
    }

    #[test]
    fn field_decoder_for_unknown_shape() {
        let other = Tag::new(*b"OTHR");
        let registry = Registry::builder()
            .field_decoder(other, EDID, FieldCodec::of::<String>())
            .build()
            .unwrap();
        assert!(registry.record_shape(other).is_none());
        assert!(registry.fields_for(other).unwrap().field_decoder(EDID).is_some());
    }

    #[test]
    fn structured_constructor() {
        let desc = ShapeDescriptor::of::<Sample>();
        let shape = desc
            .from_structured(serde_json::json!({"editor_id": "Foo"}))
            .unwrap();
        assert_eq!(shape.tag(), Sample::TAG);
        assert_eq!(shape.editor_id(), Some("Foo"));
        assert!(shape.as_any().downcast_ref::<Sample>().is_some());
    }
}
