//! Fixed-width little-endian integer codec used by every vesting layout

use std::convert::TryInto;

use solana_program::pubkey::Pubkey;

use crate::error::VestingError;

/// Encoded size of a u32
pub const U32_LEN: usize = 4;
/// Encoded size of a u64
pub const U64_LEN: usize = 8;
/// Encoded size of a public key
pub const PUBKEY_LEN: usize = 32;

/// Little-endian bytes of `value`
pub fn encode_u32(value: u32) -> [u8; U32_LEN] {
    value.to_le_bytes()
}

/// Little-endian bytes of `value`
pub fn encode_u64(value: u64) -> [u8; U64_LEN] {
    value.to_le_bytes()
}

/// Borrow exactly `len` bytes at `offset`, returning the slice and the offset after it
fn take(src: &[u8], offset: usize, len: usize) -> Result<(&[u8], usize), VestingError> {
    let end = offset
        .checked_add(len)
        .ok_or(VestingError::MalformedBuffer)?;
    let bytes = src.get(offset..end).ok_or(VestingError::MalformedBuffer)?;
    Ok((bytes, end))
}

/// Read a little-endian u32 at `offset`, returning it with the offset after it
pub fn decode_u32(src: &[u8], offset: usize) -> Result<(u32, usize), VestingError> {
    let (bytes, next) = take(src, offset, U32_LEN)?;
    let value = u32::from_le_bytes(bytes.try_into().map_err(|_| VestingError::MalformedBuffer)?);
    Ok((value, next))
}

/// Read a little-endian u64 at `offset`, returning it with the offset after it
pub fn decode_u64(src: &[u8], offset: usize) -> Result<(u64, usize), VestingError> {
    let (bytes, next) = take(src, offset, U64_LEN)?;
    let value = u64::from_le_bytes(bytes.try_into().map_err(|_| VestingError::MalformedBuffer)?);
    Ok((value, next))
}

/// Read a 32-byte public key at `offset`, returning it with the offset after it
pub fn decode_pubkey(src: &[u8], offset: usize) -> Result<(Pubkey, usize), VestingError> {
    let (bytes, next) = take(src, offset, PUBKEY_LEN)?;
    let key: [u8; PUBKEY_LEN] = bytes.try_into().map_err(|_| VestingError::MalformedBuffer)?;
    Ok((Pubkey::new_from_array(key), next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_little_endian() {
        assert_eq!(encode_u32(3), [3, 0, 0, 0]);
        assert_eq!(encode_u32(0x0102_0304), [4, 3, 2, 1]);
        assert_eq!(encode_u64(1_700_000_000), 1_700_000_000u64.to_le_bytes());
        assert_eq!(encode_u64(u64::MAX), [0xff; 8]);
    }

    #[test]
    fn decodes_at_offset() {
        let mut buf = vec![0xaa, 0xbb];
        buf.extend_from_slice(&encode_u64(42));
        buf.extend_from_slice(&encode_u32(7));

        let (value, next) = decode_u64(&buf, 2).unwrap();
        assert_eq!((value, next), (42, 10));
        let (value, next) = decode_u32(&buf, next).unwrap();
        assert_eq!((value, next), (7, 14));
    }

    #[test]
    fn rejects_short_input() {
        let buf = [1u8, 2, 3];
        assert_eq!(decode_u32(&buf, 0), Err(VestingError::MalformedBuffer));
        assert_eq!(decode_u64(&[0u8; 8], 1), Err(VestingError::MalformedBuffer));
        assert_eq!(decode_pubkey(&[0u8; 31], 0), Err(VestingError::MalformedBuffer));
        assert_eq!(decode_u32(&buf, usize::MAX), Err(VestingError::MalformedBuffer));
    }

    #[test]
    fn decodes_pubkey() {
        let key = Pubkey::new_unique();
        let mut buf = vec![9u8];
        buf.extend_from_slice(key.as_ref());
        assert_eq!(decode_pubkey(&buf, 1).unwrap(), (key, 33));
    }
}
