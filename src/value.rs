//! Value-type registry: typed decoders over raw call words
//!
//! Every decode starts from a [`RawWord`]: one machine word captured from an
//! argument slot or the return slot of an intercepted call. Numeric types
//! mask/narrow the word in place; pointer-family types treat the word as an
//! address and go through the [`MemoryReader`](crate::memory::MemoryReader)
//! collaborator. A null address always decodes to [`DecodedValue::Null`]
//! without touching memory.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DecodeFailure;
use crate::memory::MemoryReader;

/// One raw machine word captured from a call (argument or return slot).
pub type RawWord = u64;

/// An address in the traced process.
pub type Address = u64;

/// A decoded, typed value as it appears in an event field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecodedValue {
    Bool(bool),
    Byte(u8),
    Short(u16),
    Word(i64),
    Pointer(Address),
    Bytes(Vec<u8>),
    Str(String),
    /// A pointer-family value whose raw word was null.
    Null,
}

impl DecodedValue {
    /// Coerce an integral value into a buffer/string length.
    ///
    /// Negative words are rejected rather than wrapped.
    pub fn as_length(&self) -> Option<usize> {
        match *self {
            DecodedValue::Byte(v) => Some(usize::from(v)),
            DecodedValue::Short(v) => Some(usize::from(v)),
            DecodedValue::Word(v) => usize::try_from(v).ok(),
            DecodedValue::Pointer(v) => usize::try_from(v).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Bool(v) => write!(f, "{v}"),
            DecodedValue::Byte(v) => write!(f, "{v}"),
            DecodedValue::Short(v) => write!(f, "{v}"),
            DecodedValue::Word(v) => write!(f, "{v}"),
            DecodedValue::Pointer(p) => write!(f, "{p:#x}"),
            DecodedValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            DecodedValue::Str(s) => write!(f, "{s:?}"),
            DecodedValue::Null => write!(f, "null"),
        }
    }
}

/// Runtime parameters resolved from the event just before a dependent-typed
/// decode. In practice a single `length`, but kept name-keyed so bindings
/// stay declarative.
#[derive(Debug, Clone, Default)]
pub struct ParamValues {
    entries: Vec<(String, DecodedValue)>,
}

/// Name of the length parameter consumed by buffer and string types.
pub const LENGTH_PARAM: &str = "length";

impl ParamValues {
    pub fn bind(&mut self, name: impl Into<String>, value: DecodedValue) {
        self.entries.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&DecodedValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Look up the bound `length`, coercing it to a byte count.
    ///
    /// `Ok(None)` means no length was bound (strings then read to their
    /// natural terminator); a bound but non-integral value is an error.
    pub fn length(&self) -> Result<Option<usize>, DecodeFailure> {
        match self.get(LENGTH_PARAM) {
            None => Ok(None),
            Some(value) => value
                .as_length()
                .map(Some)
                .ok_or_else(|| DecodeFailure::BadParameter {
                    parameter: LENGTH_PARAM,
                    value: value.clone(),
                }),
        }
    }
}

/// A typed decoder over one raw word.
///
/// Carries no mutable state, so instances are freely shared across threads
/// and across compiled action lists.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Bool,
    Byte,
    Short,
    Word,
    /// A raw pointer, optionally dereferenced into an inner type.
    Pointer(Option<Box<ValueType>>),
    /// Fixed-length byte buffer; requires a bound `length` parameter.
    Bytes,
    /// NUL-terminated or length-bounded UTF-8 string.
    Utf8Str,
    /// NUL-terminated or length-bounded UTF-16 string.
    Utf16Str,
}

impl ValueType {
    /// Build a pointer-to-`inner` decoder.
    pub fn pointer_to(inner: ValueType) -> ValueType {
        ValueType::Pointer(Some(Box::new(inner)))
    }

    /// Decode one raw word.
    ///
    /// Numeric variants narrow the word directly and never read memory.
    /// Pointer-family variants decode a null word to [`DecodedValue::Null`]
    /// without calling the collaborator; a non-null word is an address to
    /// read through.
    pub fn parse(
        &self,
        raw: RawWord,
        params: &ParamValues,
        mem: &dyn MemoryReader,
    ) -> Result<DecodedValue, DecodeFailure> {
        match self {
            ValueType::Bool => Ok(DecodedValue::Bool(raw != 0)),
            ValueType::Byte => Ok(DecodedValue::Byte((raw & 0xff) as u8)),
            ValueType::Short => Ok(DecodedValue::Short((raw & 0xffff) as u16)),
            ValueType::Word => Ok(DecodedValue::Word(raw as i64)),
            _ if raw == 0 => Ok(DecodedValue::Null),
            ValueType::Pointer(None) => Ok(DecodedValue::Pointer(raw)),
            ValueType::Pointer(Some(inner)) => inner.read_at(raw, params, mem),
            ValueType::Bytes => {
                let len = params
                    .length()?
                    .ok_or(DecodeFailure::MissingParameter(LENGTH_PARAM))?;
                mem.read_bytes(raw, len)
                    .map(DecodedValue::Bytes)
                    .map_err(|source| DecodeFailure::MemoryRead { address: raw, source })
            }
            ValueType::Utf8Str => {
                let len = params.length()?;
                mem.read_utf8(raw, len)
                    .map(DecodedValue::Str)
                    .map_err(|source| DecodeFailure::MemoryRead { address: raw, source })
            }
            ValueType::Utf16Str => {
                let len = params.length()?;
                mem.read_utf16(raw, len)
                    .map(DecodedValue::Str)
                    .map_err(|source| DecodeFailure::MemoryRead { address: raw, source })
            }
        }
    }

    /// Decode the value a non-null pointer points at.
    fn read_at(
        &self,
        address: Address,
        params: &ParamValues,
        mem: &dyn MemoryReader,
    ) -> Result<DecodedValue, DecodeFailure> {
        let wrap = |source| DecodeFailure::MemoryRead { address, source };
        match self {
            ValueType::Bool => Ok(DecodedValue::Bool(mem.read_u8(address).map_err(wrap)? != 0)),
            ValueType::Byte => Ok(DecodedValue::Byte(mem.read_u8(address).map_err(wrap)?)),
            ValueType::Short => Ok(DecodedValue::Short(mem.read_u16(address).map_err(wrap)?)),
            ValueType::Word => Ok(DecodedValue::Word(i64::from(
                mem.read_i32(address).map_err(wrap)?,
            ))),
            // Pointer-family pointee: load the stored word, then decode it
            // as if it had been captured directly.
            ValueType::Pointer(_) | ValueType::Bytes | ValueType::Utf8Str | ValueType::Utf16Str => {
                let word = mem.read_pointer(address).map_err(wrap)?;
                self.parse(word, params, mem)
            }
        }
    }
}
