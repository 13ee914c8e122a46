use crate::models::{RawValue, ValueAnalysis};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use serde_json::Value;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16,
    Latin1,
    Windows1252,
}

/// Attempt order for byte values. Latin-1 maps every byte, so the chain always ends in a decode.
pub const DECODE_ORDER: [TextEncoding; 4] = [
    TextEncoding::Utf8,
    TextEncoding::Utf16,
    TextEncoding::Latin1,
    TextEncoding::Windows1252,
];

impl TextEncoding {
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => strict_decode(UTF_8, bytes),
            Self::Utf16 => decode_utf16(bytes),
            Self::Latin1 => Some(bytes.iter().map(|&byte| char::from(byte)).collect()),
            Self::Windows1252 => strict_decode(WINDOWS_1252, bytes),
        }
    }
}

fn strict_decode(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

// A byte-order mark picks the endianness and is dropped; without one, little-endian is assumed.
fn decode_utf16(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    match bytes {
        [0xFE, 0xFF, rest @ ..] => strict_decode(UTF_16BE, rest),
        [0xFF, 0xFE, rest @ ..] => strict_decode(UTF_16LE, rest),
        _ => strict_decode(UTF_16LE, bytes),
    }
}

/// Text values pass through unchanged; byte values go through [`DECODE_ORDER`].
/// Only an empty byte value yields `None`.
pub fn decode_text(value: &RawValue) -> Option<String> {
    match value {
        RawValue::Text(text) => Some(text.clone()),
        RawValue::Bytes(bytes) if bytes.is_empty() => None,
        RawValue::Bytes(bytes) => DECODE_ORDER.iter().find_map(|encoding| {
            let decoded = encoding.decode(bytes);
            if decoded.is_none() {
                tracing::trace!(encoding = ?encoding, size = bytes.len(), "encoding rejected value");
            }
            decoded
        }),
    }
}

pub fn decode_json(value: &RawValue) -> Option<Value> {
    let text = decode_text(value)?;
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str(&text) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            tracing::trace!(error = %error, "value is not json");
            None
        }
    }
}

pub fn analyze(value: &RawValue) -> ValueAnalysis {
    let mut analysis = ValueAnalysis {
        size: value.len(),
        is_text: false,
        is_json: false,
        preview: None,
        json_data: None,
    };

    let Some(text) = decode_text(value).filter(|text| !text.is_empty()) else {
        return analysis;
    };
    analysis.is_text = true;
    analysis.preview = Some(preview(&text));

    if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
        analysis.is_json = true;
        analysis.json_data = Some(parsed);
    }
    analysis
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_passes_through_unchanged() {
        let value = RawValue::from("already text ✓");
        let once = decode_text(&value).expect("text");
        let twice = decode_text(&RawValue::Text(once.clone())).expect("text");
        assert_eq!(once, "already text ✓");
        assert_eq!(once, twice);
        assert_eq!(decode_text(&RawValue::from("")), Some(String::new()));
    }

    #[test]
    fn utf8_is_tried_first() {
        let value = RawValue::Bytes("naïve café".as_bytes().to_vec());
        assert_eq!(decode_text(&value).as_deref(), Some("naïve café"));
    }

    #[test]
    fn utf16_with_bom_is_decoded() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "hi ☃".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&RawValue::Bytes(bytes)).as_deref(), Some("hi ☃"));

        let mut bytes = vec![0xFE, 0xFF];
        for unit in "big".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_text(&RawValue::Bytes(bytes)).as_deref(), Some("big"));
    }

    #[test]
    fn odd_length_invalid_utf8_falls_back_to_latin1() {
        let bytes = vec![0x63, 0x61, 0x66, 0xE9, 0x21];
        assert_eq!(decode_text(&RawValue::Bytes(bytes)).as_deref(), Some("café!"));
    }

    #[test]
    fn every_byte_sequence_decodes() {
        let all_bytes: Vec<u8> = (0u8..=255).collect();
        assert!(decode_text(&RawValue::Bytes(all_bytes.clone())).is_some());
        assert!(decode_text(&RawValue::Bytes(all_bytes[1..].to_vec())).is_some());
        assert_eq!(decode_text(&RawValue::Bytes(Vec::new())), None);
    }

    #[test]
    fn latin1_maps_bytes_to_code_points() {
        let decoded = TextEncoding::Latin1.decode(&[0x80, 0xFF]).expect("latin1");
        assert_eq!(decoded, "\u{80}\u{FF}");
        assert_eq!(TextEncoding::Windows1252.decode(&[0x80]).as_deref(), Some("€"));
    }

    #[test]
    fn decode_json_reports_miss_as_none() {
        assert_eq!(
            decode_json(&RawValue::from("{\"text\": \"hello\"}")),
            Some(json!({"text": "hello"}))
        );
        assert_eq!(decode_json(&RawValue::from("{not json")), None);
        assert_eq!(decode_json(&RawValue::Bytes(Vec::new())), None);
    }

    #[test]
    fn analyze_bounds_preview_and_flags_json() {
        let long = "x".repeat(250);
        let analysis = analyze(&RawValue::from(long.as_str()));
        assert_eq!(analysis.size, 250);
        assert!(analysis.is_text);
        assert!(!analysis.is_json);
        assert_eq!(analysis.preview.as_deref().map(str::len), Some(203));

        let analysis = analyze(&RawValue::Bytes(br#"{"notepads": {}}"#.to_vec()));
        assert!(analysis.is_json);
        assert_eq!(analysis.json_data, Some(json!({"notepads": {}})));

        let analysis = analyze(&RawValue::Bytes(Vec::new()));
        assert!(!analysis.is_text);
        assert_eq!(analysis.size, 0);
    }
}
