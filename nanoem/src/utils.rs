use std::cmp;

use crate::common::NanoemError;

pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from_le_bytes([a, b, c, d])
}

pub fn compare(a: &[u8], b: &[u8]) -> cmp::Ordering {
    for (ai, bi) in a.iter().zip(b.iter()) {
        match ai.cmp(bi) {
            cmp::Ordering::Equal => continue,
            ord => return ord,
        }
    }

    /* if every single element was equal, compare length */
    a.len().cmp(&b.len())
}

fn is_cp932_lead_byte(c: u8) -> bool {
    (0x81..=0x9f).contains(&c) || (0xe0..=0xfc).contains(&c)
}

/// Longest prefix of `bytes` not exceeding `limit` that does not split a double byte character.
pub fn truncate_cp932(bytes: &[u8], limit: usize) -> &[u8] {
    if bytes.len() <= limit {
        return bytes;
    }
    let mut pos = 0usize;
    while pos < limit {
        let step = if is_cp932_lead_byte(bytes[pos]) { 2 } else { 1 };
        if pos + step > limit {
            break;
        }
        pos += step;
    }
    &bytes[..pos]
}

pub fn encode_cp932(value: &str) -> Result<Vec<u8>, NanoemError> {
    let (bytes, _, had_errors) = encoding_rs::SHIFT_JIS.encode(value);
    if had_errors {
        Err(NanoemError::EncodeJisStringFailed)
    } else {
        Ok(bytes.into_owned())
    }
}

#[test]
fn test_fourcc() {
    assert_eq!(1u32, fourcc(1u8, 0u8, 0u8, 0u8));
    assert_eq!(
        u32::from_le_bytes(*b"nmCS"),
        fourcc(b'n', b'm', b'C', b'S')
    );
}

#[test]
fn test_truncate_cp932_keeps_double_byte_whole() {
    // "ボー" = 83 7b 81 5b
    let bytes = [0x83u8, 0x7b, 0x81, 0x5b];
    assert_eq!(&bytes[..2], truncate_cp932(&bytes, 3));
    assert_eq!(&bytes[..], truncate_cp932(&bytes, 4));
    assert_eq!(b"ab", truncate_cp932(b"abc", 2));
}

#[test]
fn test_encode_cp932_rejects_unmappable() {
    assert_eq!(Ok(b"bone".to_vec()), encode_cp932("bone"));
    assert_eq!(Err(NanoemError::EncodeJisStringFailed), encode_cp932("\u{1F600}"));
}
