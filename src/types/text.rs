//! Human-readable names.

use crate::codec::{BinaryDecode, BinaryEncode, ReadBuffer, WriteBuffer};
use crate::core::CodecError;

// LocalizedText encoding-mask bits.
const LOCALE_SPECIFIED: u8 = 0x01;
const TEXT_SPECIFIED: u8 = 0x02;

/// A string with an optional locale, used for display names and
/// descriptions.
///
/// The wire form is a mask byte (bit 0 locale present, bit 1 text
/// present) followed by the present fields; empty strings are absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalizedText {
    /// RFC 3066 locale identifier, empty when unspecified.
    pub locale: String,
    /// The text itself.
    pub text: String,
}

impl LocalizedText {
    /// A text without a locale.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            locale: String::new(),
            text: text.into(),
        }
    }
}

impl BinaryEncode for LocalizedText {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        let mut mask = 0u8;
        if !self.locale.is_empty() {
            mask |= LOCALE_SPECIFIED;
        }
        if !self.text.is_empty() {
            mask |= TEXT_SPECIFIED;
        }
        mask.encode(buf)?;
        if !self.locale.is_empty() {
            self.locale.encode(buf)?;
        }
        if !self.text.is_empty() {
            self.text.encode(buf)?;
        }
        Ok(())
    }
}

impl BinaryDecode for LocalizedText {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let mask = buf.read_byte()?;
        let locale = if mask & LOCALE_SPECIFIED != 0 {
            String::decode(buf)?
        } else {
            String::new()
        };
        let text = if mask & TEXT_SPECIFIED != 0 {
            String::decode(buf)?
        } else {
            String::new()
        };
        Ok(Self { locale, text })
    }
}

/// A name qualified by a namespace index, used for browse names and
/// relative-path targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QualifiedName {
    /// Namespace index the name lives in.
    pub namespace_index: u16,
    /// The name itself.
    pub name: String,
}

impl QualifiedName {
    /// A name in the given namespace.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }
}

impl BinaryEncode for QualifiedName {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.namespace_index.encode(buf)?;
        self.name.encode(buf)
    }
}

impl BinaryDecode for QualifiedName {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(Self {
            namespace_index: u16::decode(buf)?,
            name: String::decode(buf)?,
        })
    }
}
