//! Armour (`ARMO`).

use serde::{Deserialize, Serialize};

use super::types::{AlternateTextures, BodyTemplate, Bounds, FormId};
use super::EDID;
use crate::field::RawData;
use crate::registry::{FieldMap, RecordShape};
use crate::tag::Tag;

pub mod tags {
    use crate::tag::Tag;

    pub const VMAD: Tag = Tag::new(*b"VMAD");
    pub const OBND: Tag = Tag::new(*b"OBND");
    pub const FULL: Tag = Tag::new(*b"FULL");
    pub const EITM: Tag = Tag::new(*b"EITM");
    pub const EAMT: Tag = Tag::new(*b"EAMT");
    pub const MOD2: Tag = Tag::new(*b"MOD2");
    pub const MO2T: Tag = Tag::new(*b"MO2T");
    pub const MO2S: Tag = Tag::new(*b"MO2S");
    pub const ICON: Tag = Tag::new(*b"ICON");
    pub const MICO: Tag = Tag::new(*b"MICO");
    pub const MOD4: Tag = Tag::new(*b"MOD4");
    pub const MO4T: Tag = Tag::new(*b"MO4T");
    pub const MO4S: Tag = Tag::new(*b"MO4S");
    pub const ICO2: Tag = Tag::new(*b"ICO2");
    pub const MIC2: Tag = Tag::new(*b"MIC2");
    pub const BOD2: Tag = Tag::new(*b"BOD2");
    pub const YNAM: Tag = Tag::new(*b"YNAM");
    pub const ZNAM: Tag = Tag::new(*b"ZNAM");
    pub const ETYP: Tag = Tag::new(*b"ETYP");
    pub const BIDS: Tag = Tag::new(*b"BIDS");
    pub const BAMT: Tag = Tag::new(*b"BAMT");
    pub const RNAM: Tag = Tag::new(*b"RNAM");
    pub const KSIZ: Tag = Tag::new(*b"KSIZ");
    pub const KWDA: Tag = Tag::new(*b"KWDA");
    pub const DESC: Tag = Tag::new(*b"DESC");
    pub const MODL: Tag = Tag::new(*b"MODL");
    pub const DATA: Tag = Tag::new(*b"DATA");
    pub const DNAM: Tag = Tag::new(*b"DNAM");
    pub const TNAM: Tag = Tag::new(*b"TNAM");
}

use tags::*;

/// `DATA`: base value in gold and weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmourData {
    pub value: u32,
    pub weight: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Armour {
    pub editor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<RawData>,
    pub bounds: Bounds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enchantment: Option<FormId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enchantment_amount: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub male_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub male_model_data: Option<RawData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub male_textures: Option<AlternateTextures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub male_inventory_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub male_message_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub female_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub female_model_data: Option<RawData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub female_textures: Option<AlternateTextures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub female_inventory_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub female_message_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template: Option<BodyTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_sound: Option<FormId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_sound: Option<FormId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equip_type: Option<FormId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bash_impact: Option<FormId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_block_material: Option<FormId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race: Option<FormId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<FormId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Armature (`ARMA`) records, one field each.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub armatures: Vec<FormId>,
    pub data: ArmourData,
    pub armour_rating: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<FormId>,
}

impl RecordShape for Armour {
    const TAG: Tag = Tag::new(*b"ARMO");
    const NAME: &'static str = "Armour";

    fn field_map() -> FieldMap {
        FieldMap::new(Self::TAG)
            .field::<String>("editor_id", EDID)
            .untyped("scripts", VMAD)
            .field::<Bounds>("bounds", OBND)
            .field::<String>("full_name", FULL)
            .field::<FormId>("enchantment", EITM)
            .field::<u16>("enchantment_amount", EAMT)
            .field::<String>("male_model", MOD2)
            .untyped("male_model_data", MO2T)
            .field::<AlternateTextures>("male_textures", MO2S)
            .field::<String>("male_inventory_image", ICON)
            .field::<String>("male_message_image", MICO)
            .field::<String>("female_model", MOD4)
            .untyped("female_model_data", MO4T)
            .field::<AlternateTextures>("female_textures", MO4S)
            .field::<String>("female_inventory_image", ICO2)
            .field::<String>("female_message_image", MIC2)
            .field::<BodyTemplate>("body_template", BOD2)
            .field::<FormId>("pickup_sound", YNAM)
            .field::<FormId>("drop_sound", ZNAM)
            .field::<FormId>("equip_type", ETYP)
            .field::<FormId>("bash_impact", BIDS)
            .field::<FormId>("alternate_block_material", BAMT)
            .field::<FormId>("race", RNAM)
            .field::<u32>("keyword_count", KSIZ)
            .field::<Vec<FormId>>("keywords", KWDA)
            .field::<String>("description", DESC)
            .repeated::<FormId>("armatures", MODL)
            .field::<ArmourData>("data", DATA)
            .field::<u32>("armour_rating", DNAM)
            .field::<FormId>("template", TNAM)
    }

    fn editor_id(&self) -> Option<&str> {
        Some(&self.editor_id)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::decode::read_fields;
    use crate::field::write_field;
    use crate::header::RecordHeader;
    use crate::reader::FieldSetReader;
    use crate::writer::to_payload;
    use serde_json::json;

    /// Payload of a small armour record, with fields in the order the game writes them.
    pub(crate) fn iron_helmet() -> Vec<u8> {
        let mut out = Vec::new();
        let mut obnd = Vec::new();
        for v in [-10i16, -12, 0, 10, 12, 24] {
            obnd.extend_from_slice(&v.to_le_bytes());
        }
        let mut mo2s = 1u32.to_le_bytes().to_vec();
        mo2s.extend_from_slice(&[
            0x04, 0x00, 0x00, 0x00, b'H', b'e', b'l', b'm', 0x01, 0x02, 0x03, 0x04, 0x02, 0x00,
            0x00, 0x00,
        ]);
        let mut data = 60u32.to_le_bytes().to_vec();
        data.extend_from_slice(&5f32.to_le_bytes());
        let mut bod2 = 0x0000_0003u32.to_le_bytes().to_vec();
        bod2.extend_from_slice(&1u32.to_le_bytes());
        let mut kwda = 0x0006_BBD7u32.to_le_bytes().to_vec();
        kwda.extend_from_slice(&0x0006_C0ECu32.to_le_bytes());

        write_field(&mut out, EDID, b"ArmorIronHelmet\0").unwrap();
        write_field(&mut out, OBND, &obnd).unwrap();
        write_field(&mut out, FULL, b"Iron Helmet\0").unwrap();
        write_field(&mut out, MOD2, b"Armor\\Iron\\Helmet.nif\0").unwrap();
        write_field(&mut out, MO2T, &[1, 2, 3, 4, 5]).unwrap();
        write_field(&mut out, MO2S, &mo2s).unwrap();
        write_field(&mut out, BOD2, &bod2).unwrap();
        write_field(&mut out, YNAM, &0x0003_C7F0u32.to_le_bytes()).unwrap();
        write_field(&mut out, ZNAM, &0x0003_C7F1u32.to_le_bytes()).unwrap();
        write_field(&mut out, RNAM, &0x0000_0019u32.to_le_bytes()).unwrap();
        write_field(&mut out, KSIZ, &2u32.to_le_bytes()).unwrap();
        write_field(&mut out, KWDA, &kwda).unwrap();
        write_field(&mut out, MODL, &0x0001_2E4Du32.to_le_bytes()).unwrap();
        write_field(&mut out, MODL, &0x0001_2E4Eu32.to_le_bytes()).unwrap();
        write_field(&mut out, DATA, &data).unwrap();
        write_field(&mut out, DNAM, &1500u32.to_le_bytes()).unwrap();
        out
    }

    #[test]
    fn decode_and_encode() {
        let map = Armour::field_map();
        let header = RecordHeader::new(Armour::TAG);
        let payload = iron_helmet();
        let mut issues = Vec::new();
        let fields = read_fields(&header, &payload, Some(&map), &mut issues).unwrap();
        assert!(issues.is_empty(), "{:?}", issues);
        let armour = Armour::deserialize(FieldSetReader::new(&header, &fields, &map)).unwrap();
        assert_eq!(armour.editor_id, "ArmorIronHelmet");
        assert_eq!(armour.full_name.as_deref(), Some("Iron Helmet"));
        assert_eq!(armour.bounds.z2, 24);
        assert_eq!(armour.armatures, vec![FormId(0x0001_2E4D), FormId(0x0001_2E4E)]);
        assert_eq!(armour.data.value, 60);
        assert_eq!(armour.armour_rating, 1500);
        assert_eq!(armour.template, None);
        let textures = armour.male_textures.as_ref().unwrap();
        assert_eq!(textures.textures[0].name, "Helm");
        assert_eq!(textures.textures[0].index, 2);
        assert_eq!(to_payload(&map, &armour).unwrap(), payload);
    }

    #[test]
    fn structured_form() {
        let map = Armour::field_map();
        let header = RecordHeader::new(Armour::TAG);
        let payload = iron_helmet();
        let fields = read_fields(&header, &payload, Some(&map), &mut Vec::new()).unwrap();
        let armour = Armour::deserialize(FieldSetReader::new(&header, &fields, &map)).unwrap();
        let json = serde_json::to_value(&armour).unwrap();
        assert_eq!(json["data"], json!({"value": 60, "weight": 5.0}));
        assert_eq!(json["keywords"], json!(["0x0006BBD7", "0x0006C0EC"]));
        assert_eq!(json["male_model_data"], json!("AQIDBAU="));
        assert_eq!(
            json["male_textures"],
            json!({"textures": [{"name": "Helm", "texture": "0x04030201", "index": 2}]})
        );
        assert!(json.get("female_model").is_none());
        let back: Armour = serde_json::from_value(json).unwrap();
        assert_eq!(to_payload(&map, &back).unwrap(), payload);
    }

    #[test]
    fn missing_required_field() {
        let map = Armour::field_map();
        let header = RecordHeader::new(Armour::TAG);
        let mut payload = Vec::new();
        write_field(&mut payload, EDID, b"Nothing\0").unwrap();
        let fields = read_fields(&header, &payload, Some(&map), &mut Vec::new()).unwrap();
        assert!(Armour::deserialize(FieldSetReader::new(&header, &fields, &map)).is_err());
    }
}
