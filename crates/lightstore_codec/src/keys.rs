//! Order-preserving key codecs.

use crate::error::{CodecError, CodecResult};
use crate::Codec;

/// UTF-8 strings, stored as their bytes.
///
/// Byte order equals lexicographic order of the strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn encode(&self, value: &String) -> CodecResult<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}

/// Raw bytes, stored unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>) -> CodecResult<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// Unsigned 64-bit integers, stored as 8 big-endian bytes.
///
/// Byte order equals numeric order.
#[derive(Debug, Clone, Copy, Default)]
pub struct U64Codec;

impl Codec<u64> for U64Codec {
    fn encode(&self, value: &u64) -> CodecResult<Vec<u8>> {
        Ok(value.to_be_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<u64> {
        let array: [u8; 8] = bytes.try_into().map_err(|_| CodecError::InvalidLength {
            expected: 8,
            actual: bytes.len(),
        })?;
        Ok(u64::from_be_bytes(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn string_rejects_invalid_utf8() {
        assert_eq!(
            StringCodec.decode(&[0xc3, 0x28]).unwrap_err(),
            CodecError::InvalidUtf8
        );
    }

    #[test]
    fn u64_rejects_wrong_length() {
        assert_eq!(
            U64Codec.decode(&[1, 2, 3]).unwrap_err(),
            CodecError::InvalidLength {
                expected: 8,
                actual: 3
            }
        );
    }

    #[test]
    fn bytes_are_unchanged() {
        let raw = vec![0, 255, 7];
        assert_eq!(BytesCodec.encode(&raw).unwrap(), raw);
        assert_eq!(BytesCodec.decode(&raw).unwrap(), raw);
    }

    proptest! {
        #[test]
        fn u64_byte_order_matches_numeric_order(a in any::<u64>(), b in any::<u64>()) {
            let ea = U64Codec.encode(&a).unwrap();
            let eb = U64Codec.encode(&b).unwrap();
            prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
            prop_assert_eq!(U64Codec.decode(&ea).unwrap(), a);
        }

        #[test]
        fn string_byte_order_matches_string_order(a in ".*", b in ".*") {
            let ea = StringCodec.encode(&a).unwrap();
            let eb = StringCodec.encode(&b).unwrap();
            prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
        }
    }
}
