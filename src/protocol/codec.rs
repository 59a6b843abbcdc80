//! Protocol codec for encoding/decoding frames
//!
//! Handles length-prefix framing and envelope serialization.

use bincode::Options;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use thiserror::Error;

/// Default maximum frame payload (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Header size: length(4) = 4 bytes
pub const HEADER_SIZE: usize = 4;

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes (max: {1})")]
    FrameTooLarge(usize, usize),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Largest length the 4-byte prefix can carry
pub const MAX_WIRE_FRAME_SIZE: usize = u32::MAX as usize;

fn wire_options(max_frame_size: usize) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
        .with_limit(max_frame_size as u64)
}

/// Serialize an envelope into a frame payload
pub fn encode_message<T: Serialize>(
    message: &T,
    max_frame_size: usize,
) -> Result<Vec<u8>, CodecError> {
    let payload = wire_options(max_frame_size)
        .reject_trailing_bytes()
        .serialize(message)?;
    Ok(payload)
}

/// Parse a frame payload back into an envelope
pub fn decode_message<T: DeserializeOwned>(
    payload: &[u8],
    max_frame_size: usize,
) -> Result<T, CodecError> {
    let message = wire_options(max_frame_size)
        .reject_trailing_bytes()
        .deserialize(payload)?;
    Ok(message)
}

/// Parse only the leading fields of a frame payload, ignoring the rest
pub fn decode_message_prefix<T: DeserializeOwned>(
    payload: &[u8],
    max_frame_size: usize,
) -> Result<T, CodecError> {
    let message = wire_options(max_frame_size)
        .allow_trailing_bytes()
        .deserialize(payload)?;
    Ok(message)
}

/// Writes length-prefixed frames
pub struct Encoder {
    max_frame_size: usize,
}

impl Encoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(MAX_WIRE_FRAME_SIZE),
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encode a payload into a buffer as one frame
    pub fn encode(&self, payload: &[u8], buf: &mut BytesMut) -> Result<(), CodecError> {
        if payload.len() > self.max_frame_size {
            return Err(CodecError::FrameTooLarge(payload.len(), self.max_frame_size));
        }

        buf.reserve(HEADER_SIZE + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.put_slice(payload);
        Ok(())
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

/// Frame a payload into a fresh buffer
pub fn encode_frame(payload: &[u8], max_frame_size: usize) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    Encoder::new(max_frame_size).encode(payload, &mut buf)?;
    Ok(buf.freeze())
}

/// Reads length-prefixed frames out of a receive buffer
pub struct Decoder {
    state: DecodeState,
    max_frame_size: usize,
}

#[derive(Default)]
enum DecodeState {
    #[default]
    Header,
    Payload {
        length: usize,
    },
}

impl Decoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            state: DecodeState::Header,
            max_frame_size: max_frame_size.min(MAX_WIRE_FRAME_SIZE),
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// True when part of a frame has been consumed from the buffer
    pub fn is_mid_frame(&self) -> bool {
        matches!(self.state, DecodeState::Payload { .. })
    }

    /// Attempt to decode a frame payload from the buffer
    /// Returns Ok(None) if more data is needed
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, CodecError> {
        loop {
            match self.state {
                DecodeState::Header => {
                    if buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
                    if length > self.max_frame_size {
                        return Err(CodecError::FrameTooLarge(length, self.max_frame_size));
                    }

                    buf.advance(HEADER_SIZE);
                    buf.reserve(length);
                    self.state = DecodeState::Payload { length };
                }
                DecodeState::Payload { length } => {
                    if buf.len() < length {
                        return Ok(None);
                    }

                    let payload = buf.split_to(length).freeze();
                    self.state = DecodeState::Header;
                    return Ok(Some(payload));
                }
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        ActivateMessage, CdeRequest, DeviceIdentifier, RequestBody, TransactionId,
    };

    #[test]
    fn test_frame_layout() {
        let frame = encode_frame(b"hello", DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert_eq!(&frame[..], b"\x00\x00\x00\x05hello");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut decoder = Decoder::default();
        let mut buf = BytesMut::new();

        Encoder::default().encode(b"payload bytes", &mut buf).unwrap();

        let payload = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&payload[..], b"payload bytes");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::from(&encode_frame(&[], DEFAULT_MAX_FRAME_SIZE).unwrap()[..]);
        let payload = Decoder::default().decode(&mut buf).unwrap().unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_partial_frame_waits_for_more() {
        let frame = encode_frame(b"0123456789", DEFAULT_MAX_FRAME_SIZE).unwrap();
        let mut decoder = Decoder::default();
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&frame[..2]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert!(!decoder.is_mid_frame());

        buf.extend_from_slice(&frame[2..8]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert!(decoder.is_mid_frame());

        buf.extend_from_slice(&frame[8..]);
        let payload = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&payload[..], b"0123456789");
    }

    #[test]
    fn test_oversized_length_rejected_before_payload() {
        let mut decoder = Decoder::new(16);
        let mut buf = BytesMut::from(&[0x7F, 0xFF, 0xFF, 0xFF][..]);

        match decoder.decode(&mut buf) {
            Err(CodecError::FrameTooLarge(len, max)) => {
                assert_eq!(len, 0x7FFF_FFFF);
                assert_eq!(max, 16);
            }
            other => panic!("expected FrameTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_payload_not_encoded() {
        let mut buf = BytesMut::new();
        let result = Encoder::new(4).encode(b"12345", &mut buf);
        assert!(matches!(result, Err(CodecError::FrameTooLarge(5, 4))));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_payload_at_exact_limit() {
        let mut buf = BytesMut::new();
        Encoder::new(8).encode(b"12345678", &mut buf).unwrap();

        let payload = Decoder::new(8).decode(&mut buf).unwrap().unwrap();
        assert_eq!(&payload[..], b"12345678");
    }

    #[test]
    fn test_length_one_over_limit_rejected() {
        let mut buf = BytesMut::new();
        Encoder::new(9).encode(b"123456789", &mut buf).unwrap();

        assert!(matches!(
            Decoder::new(8).decode(&mut buf),
            Err(CodecError::FrameTooLarge(9, 8))
        ));
    }

    #[test]
    fn test_limit_clamped_to_length_prefix() {
        assert_eq!(Encoder::new(usize::MAX).max_frame_size(), MAX_WIRE_FRAME_SIZE);
        assert_eq!(Decoder::new(usize::MAX).max_frame_size(), MAX_WIRE_FRAME_SIZE);
        assert_eq!(Encoder::new(1024).max_frame_size(), 1024);
    }

    #[test]
    fn test_prefix_decode_ignores_rest() {
        let id = TransactionId::from("abc");
        let mut payload = encode_message(&id, DEFAULT_MAX_FRAME_SIZE).unwrap();
        payload.extend_from_slice(&[1, 2, 3]);

        let decoded: TransactionId =
            decode_message_prefix(&payload, DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_multiple_frames() {
        let mut decoder = Decoder::default();
        let mut buf = BytesMut::new();
        let encoder = Encoder::default();

        for payload in [&b"one"[..], b"two", b"three"] {
            encoder.encode(payload, &mut buf).unwrap();
        }

        for expected in [&b"one"[..], b"two", b"three"] {
            let payload = decoder.decode(&mut buf).unwrap().unwrap();
            assert_eq!(&payload[..], expected);
        }
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_message_roundtrip() {
        let request = CdeRequest {
            trans_id: TransactionId::generate(),
            dcrn: 0,
            node_dcid: "dcid".to_string(),
            body: RequestBody::Activate(ActivateMessage {
                node_dna: DeviceIdentifier::parse("A5F2-16D1-00A2").unwrap(),
                node_name: Some("Node 1".to_string()),
            }),
        };

        let payload = encode_message(&request, DEFAULT_MAX_FRAME_SIZE).unwrap();
        let decoded: CdeRequest = decode_message(&payload, DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_absent_node_name_is_smaller() {
        let mut request = CdeRequest {
            trans_id: TransactionId::generate(),
            dcrn: 0,
            node_dcid: "dcid".to_string(),
            body: RequestBody::Activate(ActivateMessage {
                node_dna: DeviceIdentifier::parse("0-0-1").unwrap(),
                node_name: Some("Node 1".to_string()),
            }),
        };
        let named = encode_message(&request, DEFAULT_MAX_FRAME_SIZE).unwrap();

        request.body = RequestBody::Activate(ActivateMessage {
            node_dna: DeviceIdentifier::parse("0-0-1").unwrap(),
            node_name: None,
        });
        let unnamed = encode_message(&request, DEFAULT_MAX_FRAME_SIZE).unwrap();

        assert!(unnamed.len() < named.len());
    }

    #[test]
    fn test_garbage_payload_fails_to_decode() {
        let result: Result<CdeRequest, _> = decode_message(&[0xFF; 3], DEFAULT_MAX_FRAME_SIZE);
        assert!(matches!(result, Err(CodecError::Serialization(_))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let id = TransactionId::from("abc");
        let mut payload = encode_message(&id, DEFAULT_MAX_FRAME_SIZE).unwrap();
        payload.push(0);
        let result: Result<TransactionId, _> = decode_message(&payload, DEFAULT_MAX_FRAME_SIZE);
        assert!(result.is_err());
    }
}
