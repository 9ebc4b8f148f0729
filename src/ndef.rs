// src/ndef.rs
use crate::error::{NdefError, TagError};

// TLV types found in tag memory
pub const TLV_NULL: u8 = 0x00;
pub const TLV_NDEF_MESSAGE: u8 = 0x03;
pub const TLV_TERMINATOR: u8 = 0xFE;
const TLV_LONG_LENGTH: u8 = 0xFF;

// Record header flags
// Bit 7: MB, Bit 6: ME, Bit 5: CF, Bit 4: SR, Bit 3: IL, Bits 2-0: TNF
pub const FLAG_MB: u8 = 0x80;
pub const FLAG_ME: u8 = 0x40;
pub const FLAG_CF: u8 = 0x20;
pub const FLAG_SR: u8 = 0x10;
pub const FLAG_IL: u8 = 0x08;
pub const TNF_MASK: u8 = 0x07;
pub const TNF_WELL_KNOWN: u8 = 0x01;

const TEXT_TYPE: &[u8] = b"T";
const STATUS_UTF16: u8 = 0x80;
const STATUS_LANG_MASK: u8 = 0x3F;
const MAX_LANG_LEN: usize = 63;
const MAX_SHORT_PAYLOAD: usize = 255;

/// Builds a single short Well-Known Text record (UTF-8).
///
/// Layout: `[header 0xD1] [type len 1] [payload len] ['T'] [status] [lang] [text]`.
/// Payloads above 255 bytes would need a long record and are rejected.
pub fn encode_text_record(text: &str, language: &str) -> Result<Vec<u8>, TagError> {
    if !language.is_ascii() {
        return Err(TagError::Encoding(format!(
            "language code {:?} is not ASCII",
            language
        )));
    }
    let lang = language.as_bytes();
    if lang.len() > MAX_LANG_LEN {
        return Err(TagError::Encoding(format!(
            "language code is {} bytes, at most {} allowed",
            lang.len(),
            MAX_LANG_LEN
        )));
    }

    // Status byte: UTF-8 (bit 7=0) | Lang length (bits 0-5)
    let mut payload = Vec::with_capacity(1 + lang.len() + text.len());
    payload.push(lang.len() as u8 & STATUS_LANG_MASK);
    payload.extend_from_slice(lang);
    payload.extend_from_slice(text.as_bytes());

    if payload.len() > MAX_SHORT_PAYLOAD {
        return Err(TagError::Encoding(format!(
            "text payload is {} bytes, short records hold at most {}",
            payload.len(),
            MAX_SHORT_PAYLOAD
        )));
    }

    let header = FLAG_MB | FLAG_ME | FLAG_SR | TNF_WELL_KNOWN;

    let mut record = Vec::with_capacity(3 + TEXT_TYPE.len() + payload.len());
    record.push(header);
    record.push(TEXT_TYPE.len() as u8);
    record.push(payload.len() as u8);
    record.extend_from_slice(TEXT_TYPE);
    record.extend_from_slice(&payload);
    Ok(record)
}

/// Frames an NDEF message as `03 <len> <message> FE`, zero-padded to a multiple of `unit_size`.
pub fn wrap_tlv(ndef_bytes: &[u8], unit_size: usize) -> Vec<u8> {
    let mut tlv = Vec::with_capacity(ndef_bytes.len() + 5 + unit_size);
    tlv.push(TLV_NDEF_MESSAGE);

    if ndef_bytes.len() < TLV_LONG_LENGTH as usize {
        tlv.push(ndef_bytes.len() as u8);
    } else {
        // Long form: 0xFF then a big-endian u16
        tlv.push(TLV_LONG_LENGTH);
        tlv.extend_from_slice(&(ndef_bytes.len() as u16).to_be_bytes());
    }

    tlv.extend_from_slice(ndef_bytes);
    tlv.push(TLV_TERMINATOR);

    if unit_size > 0 {
        let rem = tlv.len() % unit_size;
        if rem != 0 {
            tlv.resize(tlv.len() + unit_size - rem, 0x00);
        }
    }
    tlv
}

/// Finds the first NDEF Message TLV in raw tag memory.
///
/// Never reads past a terminator and returns `None` for anything truncated.
pub fn unwrap_tlv(raw: &[u8]) -> Option<&[u8]> {
    let mut cursor = 0;

    while cursor < raw.len() {
        let tlv_type = raw[cursor];
        cursor += 1;

        match tlv_type {
            TLV_NULL => continue,
            TLV_TERMINATOR => return None,
            _ => {}
        }

        let mut length = *raw.get(cursor)? as usize;
        cursor += 1;
        if length == TLV_LONG_LENGTH as usize {
            let long = raw.get(cursor..cursor + 2)?;
            length = u16::from_be_bytes([long[0], long[1]]) as usize;
            cursor += 2;
        }

        if tlv_type == TLV_NDEF_MESSAGE {
            return raw.get(cursor..cursor + length);
        }
        cursor += length;
    }

    None
}

/// Permissive text decode: anything that is not a readable text record is `None`.
pub fn decode_text_record(ndef_message: &[u8]) -> Option<String> {
    classify_text_record(ndef_message).ok().flatten()
}

/// Like [`decode_text_record`], but keeps malformed input apart from foreign or empty records.
///
/// Only the type field decides whether a record is text; the TNF bits are not checked.
pub fn classify_text_record(ndef_message: &[u8]) -> Result<Option<String>, NdefError> {
    if ndef_message.is_empty() {
        return Ok(None);
    }

    let record = parse_record(ndef_message)?;
    if record.record_type != TEXT_TYPE {
        return Ok(None);
    }

    let Some((&status, rest)) = record.payload.split_first() else {
        return Ok(None);
    };
    let lang_len = (status & STATUS_LANG_MASK) as usize;
    let text_bytes = rest.get(lang_len..).unwrap_or(&[]);

    let text = if status & STATUS_UTF16 != 0 {
        decode_utf16_lossy(text_bytes)
    } else {
        decode_utf8_lossy(text_bytes)
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

/// First record of an NDEF message, borrowed from the input.
#[derive(Debug, PartialEq, Eq)]
pub struct NdefRecord<'a> {
    pub header: u8,
    pub tnf: u8,
    pub record_type: &'a [u8],
    pub id: Option<&'a [u8]>,
    pub payload: &'a [u8],
}

pub fn parse_record(data: &[u8]) -> Result<NdefRecord<'_>, NdefError> {
    let mut reader = ByteReader::new(data);

    let header = reader.byte("header")?;
    if header & FLAG_CF != 0 {
        return Err(NdefError::Chunked);
    }
    let is_short_record = header & FLAG_SR != 0;
    let has_id = header & FLAG_IL != 0;

    let type_len = reader.byte("type length")? as usize;

    // 1 byte for Short Record, 4 bytes otherwise
    let payload_len = if is_short_record {
        reader.byte("payload length")? as usize
    } else {
        let raw = reader.take(4, "payload length")?;
        u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
    };

    let id_len = if has_id {
        reader.byte("id length")? as usize
    } else {
        0
    };

    let record_type = reader.take(type_len, "type")?;
    let id = if has_id {
        Some(reader.take(id_len, "id")?)
    } else {
        None
    };
    let payload = reader.take(payload_len, "payload")?;

    Ok(NdefRecord {
        header,
        tnf: header & TNF_MASK,
        record_type,
        id,
        payload,
    })
}

struct ByteReader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn byte(&mut self, field: &'static str) -> Result<u8, NdefError> {
        Ok(self.take(1, field)?[0])
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], NdefError> {
        let end = self
            .cursor
            .checked_add(len)
            .ok_or(NdefError::Truncated(field))?;
        let slice = self
            .data
            .get(self.cursor..end)
            .ok_or(NdefError::Truncated(field))?;
        self.cursor = end;
        Ok(slice)
    }
}

// Invalid sequences are dropped, not replaced.
fn decode_utf8_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

fn decode_utf16_lossy(bytes: &[u8]) -> String {
    // BOM picks the byte order; big-endian without one
    let (little_endian, body) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (true, rest),
        [0xFE, 0xFF, rest @ ..] => (false, rest),
        _ => (false, bytes),
    };

    let units = body.chunks_exact(2).map(|pair| {
        if little_endian {
            u16::from_le_bytes([pair[0], pair[1]])
        } else {
            u16::from_be_bytes([pair[0], pair[1]])
        }
    });

    char::decode_utf16(units).filter_map(Result::ok).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HI_RECORD: [u8; 9] = [0xD1, 0x01, 0x05, 0x54, 0x02, 0x65, 0x6E, 0x48, 0x69];

    #[test]
    fn encodes_hi_as_known_bytes() {
        let record = encode_text_record("Hi", "en").unwrap();
        assert_eq!(record, HI_RECORD);

        let framed = wrap_tlv(&record, 4);
        assert_eq!(
            framed,
            [0x03, 0x09, 0xD1, 0x01, 0x05, 0x54, 0x02, 0x65, 0x6E, 0x48, 0x69, 0xFE]
        );
    }

    #[test]
    fn wrap_pads_to_block_size() {
        let framed = wrap_tlv(&HI_RECORD, 16);
        assert_eq!(framed.len(), 16);
        assert_eq!(framed[11], TLV_TERMINATOR);
        assert!(framed[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn wrap_uses_long_length_from_255() {
        let message = vec![0xAB; 300];
        let framed = wrap_tlv(&message, 4);
        assert_eq!(&framed[..4], &[0x03, 0xFF, 0x01, 0x2C]);
        assert_eq!(framed[4 + 300], TLV_TERMINATOR);
        assert_eq!(framed.len() % 4, 0);
        assert_eq!(unwrap_tlv(&framed), Some(&message[..]));
    }

    #[test]
    fn decodes_hi() {
        assert_eq!(decode_text_record(&HI_RECORD).as_deref(), Some("Hi"));
    }

    #[test]
    fn round_trip_trims_whitespace() {
        for text in ["Spiderman", "  padded  ", "Grüße aus Köln", "音楽"] {
            let framed = wrap_tlv(&encode_text_record(text, "en").unwrap(), 16);
            let message = unwrap_tlv(&framed).unwrap();
            assert_eq!(decode_text_record(message).as_deref(), Some(text.trim()));
        }
    }

    #[test]
    fn longest_short_record_round_trips() {
        let text = "x".repeat(MAX_SHORT_PAYLOAD - 3);
        let record = encode_text_record(&text, "en").unwrap();
        assert_eq!(record[2], 0xFF);
        let framed = wrap_tlv(&record, 4);
        assert_eq!(decode_text_record(unwrap_tlv(&framed).unwrap()), Some(text));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let text = "x".repeat(MAX_SHORT_PAYLOAD - 2);
        assert!(matches!(
            encode_text_record(&text, "en"),
            Err(TagError::Encoding(_))
        ));
    }

    #[test]
    fn bad_language_codes_are_rejected() {
        assert!(encode_text_record("hi", &"a".repeat(64)).is_err());
        assert!(encode_text_record("hi", "ü").is_err());
        assert_eq!(encode_text_record("hi", "").unwrap()[4], 0x00);
    }

    #[test]
    fn unwrap_ignores_zero_filled_memory() {
        assert_eq!(unwrap_tlv(&[0u8; 64]), None);
        assert_eq!(unwrap_tlv(&[]), None);
    }

    #[test]
    fn unwrap_stops_at_terminator() {
        let raw = [0x00, 0xFE, 0x03, 0x02, 0xAA, 0xBB];
        assert_eq!(unwrap_tlv(&raw), None);
    }

    #[test]
    fn unwrap_skips_foreign_tlvs() {
        // Lock control TLV (0x01), then the NDEF message
        let raw = [0x01, 0x03, 0xA0, 0x10, 0x44, 0x03, 0x02, 0xAA, 0xBB, 0xFE];
        assert_eq!(unwrap_tlv(&raw), Some(&[0xAA, 0xBB][..]));
    }

    #[test]
    fn unwrap_rejects_truncated_buffers() {
        assert_eq!(unwrap_tlv(&[0x03]), None);
        assert_eq!(unwrap_tlv(&[0x03, 0xFF, 0x00]), None);
        assert_eq!(unwrap_tlv(&[0x03, 0x05, 0xD1, 0x01]), None);
        assert_eq!(unwrap_tlv(&[0x01, 0x09, 0x00]), None);
    }

    #[test]
    fn uri_record_is_absent_not_error() {
        let uri = [0xD1, 0x01, 0x01, 0x55, 0x00];
        assert_eq!(classify_text_record(&uri), Ok(None));
        assert_eq!(decode_text_record(&uri), None);
    }

    #[test]
    fn empty_inputs_are_absent() {
        assert_eq!(classify_text_record(&[]), Ok(None));
        // Empty payload
        assert_eq!(classify_text_record(&[0xD1, 0x01, 0x00, 0x54]), Ok(None));
        // Whitespace only
        let spaces = encode_text_record("   ", "en").unwrap();
        assert_eq!(classify_text_record(&spaces), Ok(None));
    }

    #[test]
    fn truncated_record_is_malformed() {
        assert_eq!(
            classify_text_record(&HI_RECORD[..6]),
            Err(NdefError::Truncated("payload"))
        );
        assert_eq!(
            classify_text_record(&[0xD1]),
            Err(NdefError::Truncated("type length"))
        );
        assert_eq!(decode_text_record(&HI_RECORD[..6]), None);
    }

    #[test]
    fn chunked_record_is_malformed() {
        let mut chunked = HI_RECORD;
        chunked[0] |= FLAG_CF;
        assert_eq!(classify_text_record(&chunked), Err(NdefError::Chunked));
    }

    #[test]
    fn long_record_with_id_is_parsed() {
        // MB|ME|IL, TNF=1, long payload length
        let mut message = vec![0xC9, 0x01, 0x00, 0x00, 0x00, 0x05, 0x02, 0x54, 0x69, 0x64];
        message.extend_from_slice(&[0x02, b'e', b'n', b'o', b'k']);
        let record = parse_record(&message).unwrap();
        assert_eq!(record.id, Some(&b"id"[..]));
        assert_eq!(decode_text_record(&message).as_deref(), Some("ok"));
    }

    #[test]
    fn utf16_text_is_decoded() {
        // Status: UTF-16 | lang len 2, BOM FE FF, "Hi"
        let payload = [0x82, b'e', b'n', 0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        let mut message = vec![0xD1, 0x01, payload.len() as u8, 0x54];
        message.extend_from_slice(&payload);
        assert_eq!(decode_text_record(&message).as_deref(), Some("Hi"));

        let le = [0x82, b'e', b'n', 0xFF, 0xFE, 0x48, 0x00, 0x69, 0x00];
        let mut message = vec![0xD1, 0x01, le.len() as u8, 0x54];
        message.extend_from_slice(&le);
        assert_eq!(decode_text_record(&message).as_deref(), Some("Hi"));
    }

    #[test]
    fn invalid_utf8_bytes_are_dropped() {
        let payload = [0x02, b'e', b'n', b'H', 0xC3, b'i', 0xFF];
        let mut message = vec![0xD1, 0x01, payload.len() as u8, 0x54];
        message.extend_from_slice(&payload);
        assert_eq!(decode_text_record(&message).as_deref(), Some("Hi"));
    }

    #[test]
    fn language_longer_than_payload_yields_absent() {
        let payload = [0x3F, b'e', b'n'];
        let mut message = vec![0xD1, 0x01, payload.len() as u8, 0x54];
        message.extend_from_slice(&payload);
        assert_eq!(classify_text_record(&message), Ok(None));
    }

    #[test]
    fn text_type_is_decoded_regardless_of_tnf() {
        // TNF 0x02 (media type) with type "T"
        let mut record = HI_RECORD;
        record[0] = FLAG_MB | FLAG_ME | FLAG_SR | 0x02;
        assert_eq!(decode_text_record(&record).as_deref(), Some("Hi"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // 63 printable chars of at most 4 bytes stay within 255 - (1 + "en")
            #[test]
            fn printable_text_round_trips(
                text in "\\PC{0,63}",
                unit_size in prop_oneof![Just(4usize), Just(16usize)],
            ) {
                let record = encode_text_record(&text, "en").unwrap();
                let framed = wrap_tlv(&record, unit_size);
                prop_assert_eq!(framed.len() % unit_size, 0);

                let message = unwrap_tlv(&framed).unwrap();
                let expected = Some(text.trim()).filter(|t| !t.is_empty());
                let decoded = decode_text_record(message);
                prop_assert_eq!(decoded.as_deref(), expected);
            }

            #[test]
            fn encoding_fails_exactly_past_short_record_limit(text in "[a-zé]{200,300}") {
                let payload_len = 1 + 2 + text.len();
                match encode_text_record(&text, "en") {
                    Ok(record) => {
                        prop_assert!(payload_len <= MAX_SHORT_PAYLOAD);
                        prop_assert_eq!(record[2] as usize, payload_len);
                    }
                    Err(err) => {
                        prop_assert!(payload_len > MAX_SHORT_PAYLOAD);
                        prop_assert!(matches!(err, TagError::Encoding(_)));
                    }
                }
            }

            #[test]
            fn arbitrary_bytes_never_panic(raw in proptest::collection::vec(any::<u8>(), 0..300)) {
                if let Some(message) = unwrap_tlv(&raw) {
                    let _ = classify_text_record(message);
                    let _ = decode_text_record(message);
                }
                let _ = classify_text_record(&raw);
                let _ = decode_text_record(&raw);
            }
        }
    }
}
