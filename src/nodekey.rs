//! Node-key codec: compose structured B-tree keys, decode scalar values.

use crate::error::{Error, Result};
use crate::reader::WordSize;

fn be_word(word_size: WordSize, value: u64) -> Vec<u8> {
    match word_size {
        WordSize::W4 => (value as u32).to_be_bytes().to_vec(),
        WordSize::W8 => value.to_be_bytes().to_vec(),
    }
}

/// `'.' + be_word(id)`.
pub fn make_node_key(word_size: WordSize, id: u64) -> Vec<u8> {
    let mut key = vec![b'.'];
    key.extend(be_word(word_size, id));
    key
}

/// `'.' + be_word(id) + tag`.
pub fn make_node_key_tag(word_size: WordSize, id: u64, tag: u8) -> Vec<u8> {
    let mut key = make_node_key(word_size, id);
    key.push(tag);
    key
}

/// `'.' + be_word(id) + tag + be_word(index)`.
pub fn make_node_key_tag_index(word_size: WordSize, id: u64, tag: u8, index: u64) -> Vec<u8> {
    let mut key = make_node_key_tag(word_size, id, tag);
    key.extend(be_word(word_size, index));
    key
}

/// `'.' + be_word(id) + tag + raw_bytes` (used when `tag == 'H'`).
pub fn make_node_key_tag_hash(word_size: WordSize, id: u64, tag: u8, hash: &[u8]) -> Vec<u8> {
    let mut key = make_node_key_tag(word_size, id, tag);
    key.extend_from_slice(hash);
    key
}

/// `'N' + be_word(id)`.
pub fn make_name_key_id(word_size: WordSize, id: u64) -> Vec<u8> {
    let mut key = vec![b'N'];
    key.extend(be_word(word_size, id));
    key
}

/// `'N' + raw_bytes`.
pub fn make_name_key_name(name: &[u8]) -> Vec<u8> {
    let mut key = vec![b'N'];
    key.extend_from_slice(name);
    key
}

/// Decode a 1/2/4/8-byte value as an unsigned little-endian integer.
pub fn getuint(value: &[u8]) -> Result<u64> {
    match value.len() {
        1 => Ok(u64::from(value[0])),
        2 => Ok(u64::from(u16::from_le_bytes([value[0], value[1]]))),
        4 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(value);
            Ok(u64::from(u32::from_le_bytes(buf)))
        }
        8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(value);
            Ok(u64::from_le_bytes(buf))
        }
        n => Err(Error::OutOfBounds(format!(
            "scalar value has unsupported width {n}"
        ))),
    }
}

/// Decode a 1/2/4/8-byte value as an unsigned big-endian integer (the
/// "long-name id" embedded inside a value).
pub fn getuintbe(value: &[u8]) -> Result<u64> {
    match value.len() {
        1 => Ok(u64::from(value[0])),
        2 => {
            let mut buf = [0u8; 2];
            buf.copy_from_slice(value);
            Ok(u64::from(u16::from_be_bytes(buf)))
        }
        4 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(value);
            Ok(u64::from(u32::from_be_bytes(buf)))
        }
        8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(value);
            Ok(u64::from_be_bytes(buf))
        }
        n => Err(Error::OutOfBounds(format!(
            "scalar value has unsupported width {n}"
        ))),
    }
}

/// Strip trailing zero bytes.
pub fn getstr(value: &[u8]) -> &[u8] {
    let mut end = value.len();
    while end > 0 && value[end - 1] == 0 {
        end -= 1;
    }
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s5_scalar_decode() {
        assert_eq!(getuint(&[0x12]).unwrap(), 0x12);
        assert_eq!(getuint(&[0x12, 0x34]).unwrap(), 0x3412);
        assert_eq!(getuint(&[0x12, 0x34, 0x45, 0x56]).unwrap(), 0x5645_3412);
        assert_eq!(
            getuint(&[0x12, 0x34, 0x45, 0x56, 0x67, 0x78, 0x89, 0x9a]).unwrap(),
            0x9A89_7867_5645_3412
        );
    }

    #[test]
    fn getuint_rejects_odd_widths() {
        assert!(matches!(getuint(&[0x12, 0x34, 0x45]), Err(Error::OutOfBounds(_))));
    }

    #[test]
    fn getstr_strips_trailing_nuls() {
        assert_eq!(getstr(b"hello\0\0\0"), b"hello");
        assert_eq!(getstr(b"noterm"), b"noterm");
        assert_eq!(getstr(b"\0\0\0"), b"");
    }

    #[test]
    fn key_builders_compose_expected_byte_layout() {
        let key = make_node_key(WordSize::W4, 0x1234);
        assert_eq!(key, vec![b'.', 0x00, 0x00, 0x12, 0x34]);

        let key = make_node_key_tag(WordSize::W4, 0x1234, b'S');
        assert_eq!(key, vec![b'.', 0x00, 0x00, 0x12, 0x34, b'S']);

        let key = make_node_key_tag_index(WordSize::W4, 1, b'A', 2);
        assert_eq!(
            key,
            vec![b'.', 0x00, 0x00, 0x00, 0x01, b'A', 0x00, 0x00, 0x00, 0x02]
        );

        let key = make_name_key_id(WordSize::W4, 0xFF);
        assert_eq!(key, vec![b'N', 0x00, 0x00, 0x00, 0xFF]);

        let key = make_name_key_name(b"main");
        assert_eq!(key, vec![b'N', b'm', b'a', b'i', b'n']);
    }
}
