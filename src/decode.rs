//! Field decoding: splitting a leaf payload into fields and giving each one a typed value
//! where the record's field map knows how.

use tracing::{trace, warn};

use crate::cursor::SliceCursor;
use crate::error::{Error, Result};
use crate::field::{DecodedFields, Field, FieldValue};
use crate::header::FieldHeader;
use crate::header::RecordHeader;
use crate::issue::{Issue, IssueKind};
use crate::registry::FieldMap;

/// Decode one field payload. Never fails: a field with no codec, or whose codec rejects the
/// payload, keeps its raw bytes. Codec failures are reported to `issues`, as are field tags a
/// known record's map neither binds nor has a codec for.
pub fn read_field(
    record: &RecordHeader,
    header: FieldHeader,
    payload: &[u8],
    map: Option<&FieldMap>,
    issues: &mut Vec<Issue>,
) -> Field {
    let raw = |payload: &[u8]| Field {
        header,
        value: FieldValue::Raw(payload.to_vec()),
    };
    let map = match map {
        Some(map) => map,
        None => return raw(payload),
    };
    let codec = match map.field_decoder(header.tag) {
        Some(codec) => codec,
        // Bound to a key that reads raw bytes
        None if map.binding_for_tag(header.tag).is_some() => return raw(payload),
        None => {
            let err = Error::UnknownFieldDecoder {
                record: record.tag,
                field: header.tag,
            };
            trace!(record = %record.tag, field = %header.tag, "No field decoder");
            issues.push(Issue::for_field(IssueKind::UnmappedField, record, header.tag, &err));
            return raw(payload);
        }
    };
    match codec.decode(payload) {
        Ok(value) => {
            trace!(record = %record.tag, field = %header.tag, codec = codec.type_name(), "Decoded field");
            Field {
                header,
                value: FieldValue::Typed(value),
            }
        }
        Err(e) => {
            let err = Error::FieldDecodeFailure {
                field: header.tag,
                reason: e.to_string(),
            };
            warn!(record = %record.tag, id = record.id, field = %header.tag, error = %e, "Keeping field as raw bytes");
            issues.push(Issue::for_field(IssueKind::RawField, record, header.tag, &err));
            raw(payload)
        }
    }
}

/// Split a leaf payload into its fields.
///
/// Fails with [`Error::FieldOverrun`] if a field declares more bytes than remain, or with
/// [`Error::TruncatedInput`] if a field header is cut short. Either way the payload can't be
/// trusted as a field sequence, and nothing past the failure is returned.
pub fn read_fields(
    record: &RecordHeader,
    payload: &[u8],
    map: Option<&FieldMap>,
    issues: &mut Vec<Issue>,
) -> Result<DecodedFields> {
    let mut cursor = SliceCursor::new(payload);
    let mut fields = DecodedFields::new();
    while !cursor.rest().is_empty() {
        let header = FieldHeader::read(&mut cursor)?;
        let remaining = cursor.rest().len();
        if header.size as usize > remaining {
            return Err(Error::FieldOverrun {
                field: header.tag,
                declared: header.size as usize,
                remaining,
            });
        }
        let body = cursor.read_slice(header.size as usize, "field payload")?;
        fields.push(read_field(record, header, body, map, issues));
    }
    Ok(fields)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::write_field;
    use crate::tag::Tag;

    const EDID: Tag = Tag::new(*b"EDID");
    const DATA: Tag = Tag::new(*b"DATA");
    const XXXX: Tag = Tag::new(*b"XXXX");

    fn map() -> FieldMap {
        FieldMap::new(Tag::new(*b"GMST"))
            .field::<String>("editor_id", EDID)
            .field::<u32>("value", DATA)
    }

    fn header() -> RecordHeader {
        RecordHeader::new(Tag::new(*b"GMST"))
    }

    #[test]
    fn typed_and_raw_fields() {
        let mut payload = Vec::new();
        write_field(&mut payload, EDID, b"iMaxLevel\0").unwrap();
        write_field(&mut payload, DATA, &81u32.to_le_bytes()).unwrap();
        write_field(&mut payload, XXXX, &[1, 2]).unwrap();
        let mut issues = Vec::new();
        let map = map();
        let fields = read_fields(&header(), &payload, Some(&map), &mut issues).unwrap();
        let values: Vec<_> = fields.iter().map(|f| f.value.clone()).collect();
        assert_eq!(
            values,
            vec![
                FieldValue::Typed(serde_json::json!("iMaxLevel")),
                FieldValue::Typed(serde_json::json!(81)),
                FieldValue::Raw(vec![1, 2]),
            ]
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::UnmappedField);
        assert_eq!(issues[0].field, Some(XXXX));

        let mut again = Vec::new();
        fields.write(Some(&map), &mut again).unwrap();
        assert_eq!(again, payload);
    }

    #[test]
    fn untyped_binding_is_quiet() {
        let map = map().untyped("blob", XXXX);
        let mut payload = Vec::new();
        write_field(&mut payload, XXXX, &[1, 2]).unwrap();
        let mut issues = Vec::new();
        let fields = read_fields(&header(), &payload, Some(&map), &mut issues).unwrap();
        assert!(fields.iter().next().unwrap().value.is_raw());
        assert!(issues.is_empty());
    }

    #[test]
    fn codec_failure_keeps_raw() {
        let mut payload = Vec::new();
        write_field(&mut payload, DATA, &[1, 2, 3]).unwrap();
        let mut issues = Vec::new();
        let fields = read_fields(&header(), &payload, Some(&map()), &mut issues).unwrap();
        assert_eq!(fields.iter().next().unwrap().value, FieldValue::Raw(vec![1, 2, 3]));
        assert_eq!(issues[0].kind, IssueKind::RawField);
    }

    #[test]
    fn unknown_record_is_quiet() {
        let mut payload = Vec::new();
        write_field(&mut payload, XXXX, &[5]).unwrap();
        let mut issues = Vec::new();
        let fields = read_fields(&header(), &payload, None, &mut issues).unwrap();
        assert_eq!(fields.len(), 1);
        assert!(issues.is_empty());
    }

    #[test]
    fn overrun_detected() {
        let mut payload = Vec::new();
        write_field(&mut payload, EDID, b"abc\0").unwrap();
        payload.extend_from_slice(b"DATA");
        payload.extend_from_slice(&10u16.to_le_bytes());
        payload.extend_from_slice(&[0; 4]);
        let mut issues = Vec::new();
        let result = read_fields(&header(), &payload, Some(&map()), &mut issues);
        assert!(matches!(
            result,
            Err(Error::FieldOverrun {
                declared: 10,
                remaining: 4,
                ..
            })
        ));
    }

    #[test]
    fn short_header_detected() {
        let mut issues = Vec::new();
        let result = read_fields(&header(), b"EDI", None, &mut issues);
        assert!(matches!(result, Err(Error::TruncatedInput { .. })));
    }

    #[test]
    fn empty_payload() {
        let mut issues = Vec::new();
        let fields = read_fields(&header(), &[], None, &mut issues).unwrap();
        assert!(fields.is_empty());
    }
}
