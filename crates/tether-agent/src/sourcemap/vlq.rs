//! Base64 VLQ decoding for the `mappings` field.

const CONTINUATION: i64 = 0b10_0000;
const DATA_MASK: i64 = 0b01_1111;

fn base64_value(byte: u8) -> Option<i64> {
    let value = match byte {
        b'A'..=b'Z' => byte - b'A',
        b'a'..=b'z' => byte - b'a' + 26,
        b'0'..=b'9' => byte - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(i64::from(value))
}

/// Decode one segment (the text between commas) into its signed fields.
pub(crate) fn decode_segment(segment: &str) -> Result<Vec<i64>, String> {
    let mut values = Vec::with_capacity(5);
    let mut accum = 0i64;
    let mut shift = 0u32;
    for byte in segment.bytes() {
        let digit =
            base64_value(byte).ok_or_else(|| format!("invalid base64 character '{}'", byte as char))?;
        if shift > 60 {
            return Err("VLQ value overflows".to_string());
        }
        accum |= (digit & DATA_MASK) << shift;
        if digit & CONTINUATION == 0 {
            let negative = accum & 1 == 1;
            let magnitude = accum >> 1;
            values.push(if negative { -magnitude } else { magnitude });
            accum = 0;
            shift = 0;
        } else {
            shift += 5;
        }
    }
    if shift != 0 {
        return Err(format!("truncated VLQ segment '{segment}'"));
    }
    Ok(values)
}
