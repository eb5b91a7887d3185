//! Typed values and their 3-byte wire tags.
//!
//! Every stored record carries one of five value types.  A [`Value`] is
//! reduced to a `(tag, text)` pair before encryption and reconstructed from
//! it after decryption, so a single encode/decode path serves all types.
//!
//! Text forms are locale-independent: booleans are literally `true` or
//! `false`, numbers use Rust's `Display` (shortest round-trip form for
//! floats), strings are their raw UTF-8 bytes.

use std::fmt;

/// The 3-character type tag stored at the front of every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// UTF-8 byte string (`str`).
    Str,
    /// Signed 64-bit integer (`int`).
    I64,
    /// IEEE-754 32-bit float (`flt`).
    F32,
    /// IEEE-754 64-bit float (`dbl`).
    F64,
    /// Boolean (`bol`).
    Bool,
}

impl TypeTag {
    /// Width of the wire tag in bytes.
    pub const LEN: usize = 3;

    /// The tag as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::I64 => "int",
            Self::F32 => "flt",
            Self::F64 => "dbl",
            Self::Bool => "bol",
        }
    }

    /// Parse a wire tag.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "str" => Some(Self::Str),
            "int" => Some(Self::I64),
            "flt" => Some(Self::F32),
            "dbl" => Some(Self::F64),
            "bol" => Some(Self::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that can be stored in the secure store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
}

impl Value {
    /// The wire tag for this value's type.
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Str(_) => TypeTag::Str,
            Self::I64(_) => TypeTag::I64,
            Self::F32(_) => TypeTag::F32,
            Self::F64(_) => TypeTag::F64,
            Self::Bool(_) => TypeTag::Bool,
        }
    }

    /// The canonical text form placed inside the envelope.
    pub(crate) fn to_text(&self) -> Vec<u8> {
        match self {
            Self::Str(s) => s.clone().into_bytes(),
            Self::I64(i) => i.to_string().into_bytes(),
            Self::F32(f) => f.to_string().into_bytes(),
            Self::F64(f) => f.to_string().into_bytes(),
            Self::Bool(b) => if *b { b"true".to_vec() } else { b"false".to_vec() },
        }
    }

    /// Reconstruct a value of the given type from its text form.
    ///
    /// Returns `None` when the text does not parse as the requested type
    /// (bad decimal, non-UTF-8 string bytes, non-literal boolean); the
    /// caller maps that to a type-mismatch error.
    pub(crate) fn from_text(tag: TypeTag, text: &[u8]) -> Option<Self> {
        match tag {
            TypeTag::Str => String::from_utf8(text.to_vec()).ok().map(Self::Str),
            TypeTag::I64 => std::str::from_utf8(text).ok()?.parse().ok().map(Self::I64),
            TypeTag::F32 => std::str::from_utf8(text).ok()?.parse().ok().map(Self::F32),
            TypeTag::F64 => std::str::from_utf8(text).ok()?.parse().ok().map(Self::F64),
            TypeTag::Bool => match text {
                b"true" => Some(Self::Bool(true)),
                b"false" => Some(Self::Bool(false)),
                _ => None,
            },
        }
    }

    /// Consume the value as a string, if it is one.
    pub fn into_str(self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Consume the value as an `i64`, if it is one.
    pub fn into_i64(self) -> Option<i64> {
        match self {
            Self::I64(i) => Some(i),
            _ => None,
        }
    }

    /// Consume the value as an `f32`, if it is one.
    pub fn into_f32(self) -> Option<f32> {
        match self {
            Self::F32(f) => Some(f),
            _ => None,
        }
    }

    /// Consume the value as an `f64`, if it is one.
    pub fn into_f64(self) -> Option<f64> {
        match self {
            Self::F64(f) => Some(f),
            _ => None,
        }
    }

    /// Consume the value as a boolean, if it is one.
    pub fn into_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::I64(i)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Self::F32(f)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::F64(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
