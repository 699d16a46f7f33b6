//! The built-in record catalogue.
//!
//! Shapes here cover the plugin header and a handful of common record types. Anything else
//! decodes as an opaque field list, and still round-trips exactly.

use std::sync::Arc;

use crate::error::Result;
use crate::registry::{FieldCodec, Registry, RegistryBuilder};
use crate::tag::Tag;

pub mod armo;
pub mod condition;
pub mod dial;
pub mod gmst;
pub mod tes4;
pub mod types;

pub use self::armo::{Armour, ArmourData};
pub use self::condition::{Comparison, Condition, ConditionField};
pub use self::dial::DialogueTopic;
pub use self::gmst::GameSetting;
pub use self::tes4::{Master, PluginHeader, PluginInfo};
pub use self::types::{AlternateTexture, AlternateTextures, BodyTemplate, Bounds, FormId};

/// Editor id, shared by most record types.
pub const EDID: Tag = Tag::new(*b"EDID");
/// Condition field.
pub const CTDA: Tag = Tag::new(*b"CTDA");

/// Record types that carry conditions but have no shape of their own.
const CONDITIONED: [Tag; 4] = [
    Tag::new(*b"INFO"),
    Tag::new(*b"PACK"),
    Tag::new(*b"PERK"),
    Tag::new(*b"QUST"),
];

/// Add the built-in shapes and field decoders to a builder.
pub fn register(builder: RegistryBuilder) -> RegistryBuilder {
    let builder = builder
        .record::<PluginHeader>()
        .record::<GameSetting>()
        .record::<DialogueTopic>()
        .record::<Armour>();
    CONDITIONED.iter().fold(builder, |builder, record| {
        builder
            .field_decoder(*record, EDID, FieldCodec::of::<String>())
            .field_decoder(*record, CTDA, FieldCodec::of::<Condition>())
    })
}

impl Registry {
    /// A shared registry holding the built-in catalogue.
    pub fn standard() -> Result<Arc<Registry>> {
        Ok(Arc::new(register(Registry::builder()).build()?))
    }
}
