//! Game settings (`GMST`).

use serde::{Deserialize, Serialize};

use super::EDID;
use crate::field::RawData;
use crate::registry::{FieldMap, RecordShape};
use crate::tag::Tag;

pub const DATA: Tag = Tag::new(*b"DATA");

/// A named setting. The value's type follows the first letter of the editor id (`i`, `f`, `b`
/// or `s`), so it is kept as raw bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSetting {
    pub editor_id: String,
    pub value: RawData,
}

impl RecordShape for GameSetting {
    const TAG: Tag = Tag::new(*b"GMST");
    const NAME: &'static str = "GameSetting";

    fn field_map() -> FieldMap {
        FieldMap::new(Self::TAG)
            .field::<String>("editor_id", EDID)
            .untyped("value", DATA)
    }

    fn editor_id(&self) -> Option<&str> {
        Some(&self.editor_id)
    }
}
