//! Inbound frame assembly and outbound frame emission.

use super::message::{ErrorMessage, Finality, MessageHeader, MessageType};
use crate::codec::{BinaryEncode, Buffer, WriteBuffer};
use crate::core::{CodecError, StatusCode, TransportError};

/// Accumulates stream bytes and yields complete transport messages.
///
/// The reader keeps at most one parsed header pending; a message is
/// yielded only once `message_size - header_size` body bytes have
/// arrived, so short reads never surface past this point.
#[derive(Debug, Default)]
pub struct FrameReader {
    in_buf: Buffer,
    pending: Option<MessageHeader>,
}

impl FrameReader {
    /// A reader with no buffered bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly received stream bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.in_buf.write(data);
    }

    /// The next complete message, if one has fully arrived.
    pub fn next_frame(&mut self) -> Result<Option<(MessageHeader, Buffer)>, TransportError> {
        let header = match self.pending {
            Some(header) => header,
            None => {
                if self.in_buf.len() < MessageHeader::SIZE {
                    return Ok(None);
                }
                let header = MessageHeader::decode(&mut self.in_buf)?;
                self.pending = Some(header);
                header
            }
        };
        if self.in_buf.len() < header.body_size() {
            return Ok(None);
        }

        let mut body = Buffer::new();
        body.move_from(&mut self.in_buf, header.body_size())?;
        self.pending = None;
        Ok(Some((header, body)))
    }
}

/// Emit one framed message: outer header, optional secure-channel id,
/// then the body moved out of `body`.
pub fn write_framed(
    out: &mut Buffer,
    msg_type: MessageType,
    finality: Finality,
    channel_id: Option<u32>,
    body: &mut Buffer,
) -> Result<(), CodecError> {
    let channel_len = if msg_type.is_secure() { 4 } else { 0 };
    let header = MessageHeader {
        message_type: msg_type,
        finality,
        message_size: (MessageHeader::SIZE + channel_len + body.len()) as u32,
    };
    header.encode(out);
    if msg_type.is_secure() {
        channel_id.unwrap_or(0).encode(out)?;
    }
    out.move_all(body);
    Ok(())
}

/// Emit an ERR message for a fatal transport failure.
pub fn write_error(out: &mut Buffer, status: StatusCode, reason: &str) {
    let mut body = Buffer::new();
    let msg = ErrorMessage {
        error: status.0,
        reason: reason.to_string(),
    };
    // ErrorMessage encoding cannot fail.
    if msg.encode(&mut body).is_ok() {
        let _ = write_framed(out, MessageType::Error, Finality::Final, None, &mut body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BinaryDecode;

    #[test]
    fn test_reader_waits_for_header() {
        let mut reader = FrameReader::new();
        reader.push(b"MSGF");
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_reader_waits_for_body() {
        let mut reader = FrameReader::new();
        // Header announcing a 4-byte body.
        reader.push(b"MSGF\x0C\x00\x00\x00");
        assert!(reader.next_frame().unwrap().is_none());
        reader.push(&[1, 2]);
        assert!(reader.next_frame().unwrap().is_none());
        reader.push(&[3, 4]);

        let (header, mut body) = reader.next_frame().unwrap().unwrap();
        assert_eq!(header.message_type, MessageType::Message);
        assert_eq!(body.take_all(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_reader_splits_coalesced_messages() {
        let mut out = Buffer::new();
        let mut body1 = Buffer::from(&[0xAAu8][..]);
        let mut body2 = Buffer::from(&[0xBBu8, 0xCC][..]);
        write_framed(&mut out, MessageType::Hello, Finality::Final, None, &mut body1).unwrap();
        write_framed(&mut out, MessageType::Acknowledge, Finality::Final, None, &mut body2)
            .unwrap();

        let mut reader = FrameReader::new();
        reader.push(&out.take_all());

        let (h1, mut b1) = reader.next_frame().unwrap().unwrap();
        assert_eq!(h1.message_type, MessageType::Hello);
        assert_eq!(b1.take_all(), vec![0xAA]);

        let (h2, mut b2) = reader.next_frame().unwrap().unwrap();
        assert_eq!(h2.message_type, MessageType::Acknowledge);
        assert_eq!(b2.take_all(), vec![0xBB, 0xCC]);

        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_secure_frame_carries_channel_id() {
        let mut out = Buffer::new();
        let mut body = Buffer::from(&[0x01u8][..]);
        write_framed(
            &mut out,
            MessageType::Message,
            Finality::Final,
            Some(7),
            &mut body,
        )
        .unwrap();

        let mut reader = FrameReader::new();
        reader.push(&out.take_all());
        let (header, mut body) = reader.next_frame().unwrap().unwrap();
        assert_eq!(header.message_size as usize, MessageHeader::SIZE + 4 + 1);
        assert_eq!(u32::decode(&mut body).unwrap(), 7);
        assert_eq!(body.take_all(), vec![0x01]);
    }

    #[test]
    fn test_write_error_frames_an_err() {
        let mut out = Buffer::new();
        write_error(&mut out, StatusCode::BAD_DECODING_ERROR, "bad chunk");

        let mut reader = FrameReader::new();
        reader.push(&out.take_all());
        let (header, mut body) = reader.next_frame().unwrap().unwrap();
        assert_eq!(header.message_type, MessageType::Error);
        let err = ErrorMessage::decode(&mut body).unwrap();
        assert_eq!(err.error, StatusCode::BAD_DECODING_ERROR.0);
        assert_eq!(err.reason, "bad chunk");
    }

    #[test]
    fn test_reader_propagates_header_errors() {
        let mut reader = FrameReader::new();
        reader.push(b"ZZZF\x10\x00\x00\x00");
        assert!(reader.next_frame().is_err());
    }
}
