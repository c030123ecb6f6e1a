//! Base64-variant codecs used to serialize checksums, salts and rounds
//!
//! Password hash formats rarely use RFC 4648 base64 as-is. Most of them pick
//! their own 64-symbol alphabet and some pack bits little-endian. This module
//! provides a single [`Base64Engine`] that handles any alphabet in either bit
//! order, plus the handful of engines the builtin schemes share.
//!
//! ## Example
//!
//! ```rust
//! use passkit::codec::{h64, Base64Engine, HASH64_CHARS};
//!
//! let encoded = h64().encode_bytes(b"abc");
//! assert_eq!(h64().decode_bytes(&encoded).unwrap(), b"abc");
//!
//! let engine = Base64Engine::new(HASH64_CHARS, true).unwrap();
//! assert_eq!(engine.decode_int12(&engine.encode_int12(0xABC).unwrap()).unwrap(), 0xABC);
//! ```

mod engine;
mod ints;

pub use engine::Base64Engine;

use std::sync::LazyLock;
use thiserror::Error;

/// Standard base64 alphabet
pub const BASE64_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Adapted base64 alphabet ("." instead of "+")
pub const AB64_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789./";

/// Alphabet used by the crypt(3) family ("hash64")
pub const HASH64_CHARS: &str = "./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Alphabet used by bcrypt
pub const BCRYPT_CHARS: &str = "./ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Lower-case hexadecimal digits
pub const LOWER_HEX_CHARS: &str = "0123456789abcdef";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("alphabet must contain exactly 64 symbols, got {0}")]
    InvalidAlphabetLength(usize),

    #[error("alphabet contains duplicate symbol {0:?}")]
    DuplicateSymbol(char),

    #[error("alphabet symbol {0:?} is not ASCII")]
    NonAsciiSymbol(char),

    #[error("encoded length cannot be 1 mod 4 (got {0})")]
    InvalidLength(usize),

    #[error("expected {expected} symbols, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("invalid character {0:?}")]
    InvalidCharacter(char),

    #[error("value {value} does not fit in {bits} bits")]
    OutOfRange { value: u128, bits: u32 },

    #[error("integer width must be 1..=126 bits, got {0}")]
    UnsupportedWidth(u32),

    #[error("transposition offset {offset} out of range for {len} bytes")]
    InvalidOffset { offset: usize, len: usize },

    #[error("transposition leaves output byte {0} unset")]
    IncompleteTransposition(usize),
}

pub type Result<T> = std::result::Result<T, CodecError>;

static H64: LazyLock<Base64Engine> = LazyLock::new(|| {
    Base64Engine::new(HASH64_CHARS, false).expect("HASH64_CHARS is a valid alphabet")
});

static H64_BIG: LazyLock<Base64Engine> = LazyLock::new(|| {
    Base64Engine::new(HASH64_CHARS, true).expect("HASH64_CHARS is a valid alphabet")
});

static BCRYPT64: LazyLock<Base64Engine> = LazyLock::new(|| {
    Base64Engine::new(BCRYPT_CHARS, true).expect("BCRYPT_CHARS is a valid alphabet")
});

static B64: LazyLock<Base64Engine> = LazyLock::new(|| {
    Base64Engine::new(BASE64_CHARS, true).expect("BASE64_CHARS is a valid alphabet")
});

static AB64: LazyLock<Base64Engine> = LazyLock::new(|| {
    Base64Engine::new(AB64_CHARS, true).expect("AB64_CHARS is a valid alphabet")
});

/// Little-endian hash64 engine (md5-crypt, sha-crypt, phpass)
pub fn h64() -> &'static Base64Engine {
    &H64
}

/// Big-endian hash64 engine (des-crypt family)
pub fn h64big() -> &'static Base64Engine {
    &H64_BIG
}

/// Big-endian engine over the bcrypt alphabet
pub fn bcrypt64() -> &'static Base64Engine {
    &BCRYPT64
}

/// Unpadded standard base64
pub fn b64() -> &'static Base64Engine {
    &B64
}

/// Unpadded standard base64 with "." in place of "+"
pub fn ab64() -> &'static Base64Engine {
    &AB64
}
