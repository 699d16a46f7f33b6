//! Condition fields (`CTDA`): a single test evaluated by the game, such as "the player's level
//! is at least 10".

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::types::FormId;

/// Function index of `GetEventData`, whose first parameter packs two 16-bit values.
pub const GET_EVENT_DATA: u16 = 4672;

/// Flag bits in the low five bits of the operator byte.
pub mod flags {
    pub const OR: u8 = 0x01;
    pub const USE_ALIASES: u8 = 0x02;
    pub const USE_GLOBAL: u8 = 0x04;
    pub const USE_PACKAGE_DATA: u8 = 0x08;
    pub const SWAP_SUBJECT_AND_TARGET: u8 = 0x10;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
}

impl Comparison {
    fn from_op_code(op_code: u8) -> Option<Self> {
        Some(match op_code >> 5 {
            0 => Comparison::Equal,
            1 => Comparison::NotEqual,
            2 => Comparison::Greater,
            3 => Comparison::GreaterOrEqual,
            4 => Comparison::Less,
            5 => Comparison::LessOrEqual,
            _ => return None,
        })
    }

    fn op_bits(self) -> u8 {
        (self as u8) << 5
    }
}

/// The 32-byte condition layout, exactly as stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionField {
    /// Comparison in the top three bits, flags in the low five.
    pub op_code: u8,
    pub padding: [u8; 3],
    /// Either an `f32` or, with [`flags::USE_GLOBAL`], the form id of a global variable.
    pub value: u32,
    pub function: u16,
    pub padding2: u16,
    pub param1: u32,
    pub param2: u32,
    pub run_on: u32,
    pub reference: FormId,
    pub unknown: i32,
}

impl ConditionField {
    pub fn comparison(&self) -> Option<Comparison> {
        Comparison::from_op_code(self.op_code)
    }

    pub fn flags(&self) -> u8 {
        self.op_code & 0x1F
    }

    pub fn uses_global(&self) -> bool {
        self.flags() & flags::USE_GLOBAL != 0
    }

    /// Function parameters. `GetEventData` reports its packed first parameter as two values.
    pub fn parameters(&self) -> Vec<u32> {
        if self.function == GET_EVENT_DATA {
            vec![self.param1 & 0xFFFF, self.param1 >> 16, self.param2]
        } else {
            vec![self.param1, self.param2]
        }
    }
}

fn is_zero<T: Default + PartialEq>(v: &T) -> bool {
    *v == T::default()
}

/// Structured form of a condition.
#[derive(Serialize, Deserialize)]
struct ConditionDoc {
    function: u16,
    comparison: Comparison,
    #[serde(default, skip_serializing_if = "is_zero")]
    flags: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    global: Option<FormId>,
    parameters: Vec<u32>,
    run_on: u32,
    reference: FormId,
    unknown: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    padding: [u8; 3],
    #[serde(default, skip_serializing_if = "is_zero")]
    padding2: u16,
}

impl ConditionDoc {
    fn from_field(field: &ConditionField) -> Result<Self, String> {
        let comparison = field
            .comparison()
            .ok_or_else(|| format!("invalid comparison operator in {:#04X}", field.op_code))?;
        let (value, global) = if field.uses_global() {
            (None, Some(FormId(field.value)))
        } else {
            (Some(f32::from_bits(field.value)), None)
        };
        Ok(Self {
            function: field.function,
            comparison,
            flags: field.flags(),
            value,
            global,
            parameters: field.parameters(),
            run_on: field.run_on,
            reference: field.reference,
            unknown: field.unknown,
            padding: field.padding,
            padding2: field.padding2,
        })
    }

    fn into_field(self) -> Result<ConditionField, String> {
        if self.flags > 0x1F {
            return Err(format!("condition flags {:#04X} don't fit in 5 bits", self.flags));
        }
        let value = match (self.global, self.value) {
            (Some(global), None) if self.flags & flags::USE_GLOBAL != 0 => global.0,
            (None, Some(value)) if self.flags & flags::USE_GLOBAL == 0 => value.to_bits(),
            _ => {
                return Err(
                    "a condition needs `global` when it uses a global, and `value` otherwise"
                        .to_string(),
                )
            }
        };
        let (param1, param2) = match (self.function, self.parameters.as_slice()) {
            (GET_EVENT_DATA, [low, high, param2]) => {
                if *low > 0xFFFF || *high > 0xFFFF {
                    return Err("GetEventData parameters must fit in 16 bits".to_string());
                }
                (low | (high << 16), *param2)
            }
            (GET_EVENT_DATA, _) => {
                return Err("GetEventData takes three parameters".to_string());
            }
            (_, [param1, param2]) => (*param1, *param2),
            _ => return Err("a condition takes two parameters".to_string()),
        };
        Ok(ConditionField {
            op_code: self.comparison.op_bits() | self.flags,
            padding: self.padding,
            value,
            function: self.function,
            padding2: self.padding2,
            param1,
            param2,
            run_on: self.run_on,
            reference: self.reference,
            unknown: self.unknown,
        })
    }
}

/// A condition as stored in a `CTDA` field. Its binary form is the raw layout, and its
/// structured form spells out the test.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Condition(pub ConditionField);

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            ConditionDoc::from_field(&self.0)
                .map_err(S::Error::custom)?
                .serialize(serializer)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            ConditionDoc::deserialize(deserializer)?
                .into_field()
                .map(Condition)
                .map_err(D::Error::custom)
        } else {
            ConditionField::deserialize(deserializer).map(Condition)
        }
    }
}
