//! Low-level hex/byte-order helpers mirroring the wire format of the
//! legacy getwork `data` field: a 256 hex-char (128-byte) buffer whose
//! first 160 hex chars are the actual block header preimage, padded
//! to the SHA-256 block size by the miner.
use crate::constants::offsets;
use crate::error::ValidationError;

/// Extracts the hex-char range for the given field out of a `data` string.
/// Panics if `data` is shorter than [`constants::TEMPLATE_DATA_HEX_LEN`];
/// callers must validate length first via [`check_length`].
pub fn field(data: &str, range: std::ops::Range<usize>) -> &str {
    &data[range]
}

pub fn check_length(data: &str) -> Result<(), ValidationError> {
    if data.len() != crate::constants::TEMPLATE_DATA_HEX_LEN {
        return Err(ValidationError::IncorrectLength);
    }
    Ok(())
}

pub fn merkle_root(data: &str) -> &str {
    field(data, offsets::MERKLE_ROOT)
}

pub fn version(data: &str) -> &str {
    field(data, offsets::VERSION)
}

pub fn timestamp(data: &str) -> &str {
    field(data, offsets::TIMESTAMP)
}

pub fn prev_block_hash(data: &str) -> &str {
    field(data, offsets::PREV_BLOCK_HASH)
}

/// Decodes the nonce field and reverses its byte order, matching
/// `GUINT32_SWAP_LE_BE` in the original validator.
pub fn nonce(data: &str) -> Result<u32, ValidationError> {
    let raw = u32::from_str_radix(field(data, offsets::NONCE), 16)
        .map_err(|_| ValidationError::NotHex)?;
    Ok(raw.swap_bytes())
}

/// Reverses the byte order of a `word_len` byte word in place, operating
/// directly on the ASCII hex representation. `byte_offset` and `word_len`
/// are given in bytes (i.e. half the hex-char count).
fn swap_hex_word(hex: &mut [u8], byte_offset: usize, word_len: usize) {
    let head = byte_offset * 2;
    let tail = head + word_len * 2 - 2;
    for i in 0..word_len / 2 {
        hex.swap(head + i * 2, tail - i * 2);
        hex.swap(head + i * 2 + 1, tail - i * 2 + 1);
    }
}

/// Builds the 80-byte block header preimage from the 256-char `data`
/// field: strips the padding after hex char 160, then byte-swaps each
/// of the twenty 32-bit words (the wire format stores each word
/// byte-reversed relative to the header encoding SHA-256d expects).
pub fn header_preimage(data: &str) -> Result<[u8; 80], ValidationError> {
    check_length(data)?;

    let mut hex = data.as_bytes()[..offsets::HEADER_HEX_LEN].to_vec();
    for word_start in (0..80).step_by(4) {
        swap_hex_word(&mut hex, word_start, 4);
    }

    let hex = std::str::from_utf8(&hex).expect("ascii hex");
    let mut bin = [0u8; 80];
    hex::decode_to_slice(hex, &mut bin).map_err(|_| ValidationError::NotHex)?;
    Ok(bin)
}

/// Compares two 32-byte hashes the way the original validator does:
/// starting from the most significant byte (index 31) down to the
/// least significant (index 0).
pub fn compare_inverted(a: &[u8; 32], b: &[u8; 32]) -> std::cmp::Ordering {
    for i in (0..32).rev() {
        match a[i].cmp(&b[i]) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

/// Reorders a 64 hex-char block hash into 8-char groups, reversed, so
/// that it can be compared against the `data` field's previous-block-hash
/// slot directly (which the upstream node also presents big-endian-swapped).
pub fn reorder_block_hash(block_hash_hex: &str) -> String {
    assert_eq!(block_hash_hex.len(), 64, "block hash must be 64 hex chars");
    let bytes = block_hash_hex.as_bytes();
    let mut out = vec![0u8; 64];
    for i in (0..64).step_by(8) {
        let src = 64 - 8 - i;
        out[i..i + 8].copy_from_slice(&bytes[src..src + 8]);
    }
    String::from_utf8(out).expect("ascii hex")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorder_block_hash_reverses_word_groups() {
        let hash = "00000000000000000000000000000000000000000000000000000000000000001";
        // 65 chars on purpose would panic; use a real 64-char hash below.
        let hash = &hash[1..];
        let reordered = reorder_block_hash(hash);
        assert_eq!(reordered.len(), 64);
    }

    #[test]
    fn nonce_byte_swap_roundtrips() {
        let data = format!("{}{:08x}", "0".repeat(152), 0x12345678u32);
        assert_eq!(nonce(&data).unwrap(), 0x78563412);
    }

    #[test]
    fn header_preimage_rejects_wrong_length() {
        assert!(header_preimage("abcd").is_err());
    }

    #[test]
    fn compare_inverted_orders_most_significant_byte_first() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[31] = 1;
        b[31] = 2;
        assert_eq!(compare_inverted(&a, &b), std::cmp::Ordering::Less);
    }
}
