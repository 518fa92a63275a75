//! Binary wire codecs for primitive types.
//!
//! All integers and floats are little-endian. Strings and byte strings
//! share the signed-length prefix discipline; arrays prefix a signed
//! element count. Composite protocol types implement these traits in
//! [`crate::types`] and [`crate::services`].

use super::buffer::{ReadBuffer, WriteBuffer};
use crate::core::{CodecError, StatusCode};

/// Serialize a value to its binary wire form.
pub trait BinaryEncode {
    /// Append this value's wire form at the buffer's tail.
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError>;
}

/// Deserialize a value from its binary wire form.
pub trait BinaryDecode: Sized {
    /// Remove this value's wire form from the buffer's head.
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError>;
}

macro_rules! impl_fixed_width {
    ($($ty:ty => $len:expr),* $(,)?) => {$(
        impl BinaryEncode for $ty {
            fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
                buf.write(&self.to_le_bytes());
                Ok(())
            }
        }

        impl BinaryDecode for $ty {
            fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
                let mut bytes = [0u8; $len];
                buf.read_exact(&mut bytes)?;
                Ok(<$ty>::from_le_bytes(bytes))
            }
        }
    )*};
}

impl_fixed_width! {
    u8 => 1,
    u16 => 2,
    u32 => 4,
    i16 => 2,
    i32 => 4,
    i64 => 8,
    f64 => 8,
}

impl BinaryEncode for bool {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        buf.write(&[u8::from(*self)]);
        Ok(())
    }
}

impl BinaryDecode for bool {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        // Any nonzero byte decodes as true.
        Ok(buf.read_byte()? != 0)
    }
}

impl BinaryEncode for StatusCode {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        self.0.encode(buf)
    }
}

impl BinaryDecode for StatusCode {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        Ok(StatusCode(u32::decode(buf)?))
    }
}

impl BinaryEncode for String {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        encode_length_prefixed(self.as_bytes(), buf)
    }
}

impl BinaryDecode for String {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let bytes = decode_length_prefixed(buf)?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }
}

impl BinaryEncode for &str {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        encode_length_prefixed(self.as_bytes(), buf)
    }
}

impl<T: BinaryEncode> BinaryEncode for Vec<T> {
    fn encode<B: WriteBuffer + ?Sized>(&self, buf: &mut B) -> Result<(), CodecError> {
        // Empty collections collapse to the null length. This also
        // yields the ByteString wire form for Vec<u8>.
        let len = if self.is_empty() { -1 } else { self.len() as i32 };
        len.encode(buf)?;
        for item in self {
            item.encode(buf)?;
        }
        Ok(())
    }
}

impl<T: BinaryDecode> BinaryDecode for Vec<T> {
    fn decode<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Self, CodecError> {
        let len = i32::decode(buf)?;
        if len <= 0 {
            return Ok(Vec::new());
        }
        // Capacity capped by the bytes actually present, so a hostile
        // length prefix cannot force a huge allocation.
        let mut items = Vec::with_capacity((len as usize).min(buf.remaining()));
        for _ in 0..len {
            items.push(T::decode(buf)?);
        }
        Ok(items)
    }
}

fn encode_length_prefixed<B: WriteBuffer + ?Sized>(
    bytes: &[u8],
    buf: &mut B,
) -> Result<(), CodecError> {
    let len = if bytes.is_empty() {
        -1
    } else {
        bytes.len() as i32
    };
    len.encode(buf)?;
    buf.write(bytes);
    Ok(())
}

fn decode_length_prefixed<B: ReadBuffer + ?Sized>(buf: &mut B) -> Result<Vec<u8>, CodecError> {
    let len = i32::decode(buf)?;
    if len <= 0 {
        return Ok(Vec::new());
    }
    buf.read_vec(len as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buffer;

    fn encode_to_vec<T: BinaryEncode>(value: &T) -> Vec<u8> {
        let mut buf = Buffer::new();
        value.encode(&mut buf).unwrap();
        buf.take_all()
    }

    fn round_trip<T: BinaryEncode + BinaryDecode + PartialEq + std::fmt::Debug>(value: T) {
        let mut buf = Buffer::from(encode_to_vec(&value));
        let decoded = T::decode(&mut buf).unwrap();
        assert_eq!(decoded, value);
        assert!(buf.is_empty(), "decoder left trailing bytes");
    }

    #[test]
    fn test_boolean_wire_form() {
        assert_eq!(encode_to_vec(&false), [0x00]);
        assert_eq!(encode_to_vec(&true), [0x01]);

        // Decode treats any nonzero byte as true.
        let mut buf = Buffer::from(&[0x7Au8][..]);
        assert!(bool::decode(&mut buf).unwrap());
    }

    #[test]
    fn test_uint32_wire_form() {
        assert_eq!(encode_to_vec(&1_000_000_000u32), [0x00, 0xCA, 0x9A, 0x3B]);
    }

    #[test]
    fn test_integer_round_trips() {
        round_trip(0u8);
        round_trip(255u8);
        round_trip(0x2345u16);
        round_trip(0x1133_5577u32);
        round_trip(u32::MAX);
        round_trip(-0x1000i16);
        round_trip(-0x1000_0000i32);
        round_trip(0x1234_3210i32);
        round_trip(-0x0044_0088_00cc_00ffi64);
        round_trip(0.5551f64);
        round_trip(-3.33f64);
    }

    #[test]
    fn test_string_wire_form() {
        let encoded = encode_to_vec(&"水Boy".to_string());
        assert_eq!(hex::encode(&encoded), "06000000e6b0b4426f79");
    }

    #[test]
    fn test_string_round_trips() {
        round_trip(String::new());
        round_trip("foobarbaz".to_string());
        round_trip("水Boy".to_string());
    }

    #[test]
    fn test_empty_string_collapses_to_null() {
        // Empty encodes as the null length.
        assert_eq!(encode_to_vec(&String::new()), (-1i32).to_le_bytes());

        // An explicit zero length also decodes as empty.
        let mut buf = Buffer::from(&0i32.to_le_bytes()[..]);
        assert_eq!(String::decode(&mut buf).unwrap(), "");
    }

    #[test]
    fn test_string_rejects_invalid_utf8() {
        let mut buf = Buffer::new();
        2i32.encode(&mut buf).unwrap();
        buf.write(&[0xFF, 0xFE]);
        assert_eq!(String::decode(&mut buf), Err(CodecError::InvalidUtf8));
    }

    #[test]
    fn test_array_wire_form() {
        let values: Vec<u16> = vec![1, 2, 3];
        let encoded = encode_to_vec(&values);
        assert_eq!(encoded, [3, 0, 0, 0, 1, 0, 2, 0, 3, 0]);
        round_trip(values);
    }

    #[test]
    fn test_byte_string_shares_string_discipline() {
        let bytes: Vec<u8> = vec![0xAA, 0xBB];
        assert_eq!(encode_to_vec(&bytes), [2, 0, 0, 0, 0xAA, 0xBB]);
        round_trip(bytes);
        round_trip(Vec::<u8>::new());
    }

    #[test]
    fn test_array_decode_stops_on_short_input() {
        let mut buf = Buffer::new();
        5i32.encode(&mut buf).unwrap();
        buf.write(&[1, 0]);
        assert!(matches!(
            Vec::<u32>::decode(&mut buf),
            Err(CodecError::ShortRead { .. })
        ));
    }

    #[test]
    fn test_fixed_width_lengths() {
        assert_eq!(encode_to_vec(&0u8).len(), 1);
        assert_eq!(encode_to_vec(&0u16).len(), 2);
        assert_eq!(encode_to_vec(&0u32).len(), 4);
        assert_eq!(encode_to_vec(&0i64).len(), 8);
        assert_eq!(encode_to_vec(&0f64).len(), 8);
        // String: 4-byte length + max(0, len) bytes.
        assert_eq!(encode_to_vec(&"abc".to_string()).len(), 4 + 3);
        assert_eq!(encode_to_vec(&String::new()).len(), 4);
    }
}
