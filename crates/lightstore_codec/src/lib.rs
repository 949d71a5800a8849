//! # LightStore Codec
//!
//! Pluggable key and value codecs for LightStore repositories.
//!
//! A repository stores opaque bytes; a [`Codec`] turns typed keys and values
//! into those bytes and back. Entries are ordered by their **encoded key
//! bytes**, so the key codec decides iteration order.
//!
//! ## Provided Codecs
//!
//! - [`CborCodec`] - Any `serde` type, encoded as CBOR (values)
//! - [`StringCodec`] - UTF-8 strings, ordered lexicographically (keys)
//! - [`U64Codec`] - Big-endian integers, ordered numerically (keys)
//! - [`BytesCodec`] - Raw bytes, unchanged
//!
//! ## Usage
//!
//! ```
//! use lightstore_codec::{CborCodec, Codec, U64Codec};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Point { x: i32, y: i32 }
//!
//! let codec = CborCodec::<Point>::new();
//! let bytes = codec.encode(&Point { x: 1, y: 2 }).unwrap();
//! assert_eq!(codec.decode(&bytes).unwrap(), Point { x: 1, y: 2 });
//!
//! assert!(U64Codec.encode(&2).unwrap() < U64Codec.encode(&10).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod keys;

pub use cbor::CborCodec;
pub use error::{CodecError, CodecResult};
pub use keys::{BytesCodec, StringCodec, U64Codec};

/// Converts between a typed `T` and its byte encoding.
///
/// Codecs are shared by every transaction of a repository, possibly across
/// threads, so they must be `Send + Sync` and hold no per-call state.
///
/// # Invariants
///
/// - `decode(encode(x))` yields a value equal to `x`
/// - Encoding is deterministic: equal values produce equal bytes
pub trait Codec<T>: Send + Sync {
    /// Encodes `value` to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented.
    fn encode(&self, value: &T) -> CodecResult<Vec<u8>>;

    /// Decodes a value from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding.
    fn decode(&self, bytes: &[u8]) -> CodecResult<T>;
}
