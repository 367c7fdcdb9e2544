//! Pure encode/decode of the bancho-style binary packet format.
//!
//! Wire layout per packet: `u16` LE opcode, one padding byte, `u32` LE
//! payload length, then the payload. A request body is a concatenation of
//! these. Framing is handled here; the meaning of each payload lives in
//! [`types`].

pub mod opcodes;
pub mod types;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Errors surfaced while decoding packet framing or a composite payload.
///
/// A [`CodecError`] always means the gateway should close the session: it's
/// either a framing violation or a composite type that declared less data
/// than it needs, and there's no safe way to resync the byte stream.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("declared payload length {declared} but only {available} bytes remained")]
    Truncated { declared: usize, available: usize },
    #[error("string flag byte {0:#04x} is neither empty (0x00) nor present (0x0b)")]
    BadStringFlag(u8),
    #[error("decoded string is not valid utf-8")]
    InvalidUtf8,
    #[error("composite payload ended before all required fields were read")]
    ShortComposite,
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Header preceding every packet: `u16` LE opcode + 1 pad byte + `u32` LE length.
pub const HEADER_SIZE: usize = 7;

/// A single decoded (or to-be-encoded) packet: an opcode and its raw payload.
#[derive(Debug, Clone)]
pub struct Packet {
    pub opcode: u16,
    pub contents: Bytes,
}

impl Packet {
    pub fn new(opcode: impl Into<u16>, contents: Bytes) -> Self {
        Self {
            opcode: opcode.into(),
            contents,
        }
    }

    pub fn empty(opcode: impl Into<u16>) -> Self {
        Self::new(opcode, Bytes::new())
    }

    /// Builds a packet by encoding `value` with [`types::Encode`].
    pub fn encode_new<V: types::Encode>(opcode: impl Into<u16>, value: &V) -> Self {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        Self::new(opcode, buf.freeze())
    }

    pub fn write(&self, dst: &mut BytesMut) {
        dst.put_u16_le(self.opcode);
        dst.put_u8(0);
        dst.put_u32_le(self.contents.len() as u32);
        dst.extend_from_slice(&self.contents);
    }
}

/// Tokio codec implementing the framing rules of §4.1: unknown opcodes are
/// left to the caller to ignore (the payload is still consumed in full),
/// trailing bytes shorter than a header end iteration cleanly, and a
/// declared length that outruns the buffer is a protocol error.
pub struct PacketCodec;

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }
        let opcode = u16::from_le_bytes([src[0], src[1]]);
        let length = u32::from_le_bytes([src[3], src[4], src[5], src[6]]) as usize;

        if src.len() - HEADER_SIZE < length {
            // The whole HTTP body is buffered up front in this transport, so
            // a declared length that outruns what's left is malformed, not
            // merely "more data incoming".
            return Err(CodecError::Truncated {
                declared: length,
                available: src.len() - HEADER_SIZE,
            });
        }

        src.advance(HEADER_SIZE);
        let contents = src.split_to(length).freeze();
        Ok(Some(Packet { opcode, contents }))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.write(dst);
        Ok(())
    }
}

impl Encoder<&Packet> for PacketCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.write(dst);
        Ok(())
    }
}

/// Reads a length-prefixed UTF-8 string: one flag byte (`0x00` empty,
/// `0x0b` present), then an unsigned LEB128 length, then the bytes.
pub fn read_string(src: &mut Bytes) -> CodecResult<String> {
    if src.is_empty() {
        return Err(CodecError::ShortComposite);
    }
    let flag = src.get_u8();
    match flag {
        0x00 => Ok(String::new()),
        0x0b => {
            let len = read_uleb128(src)? as usize;
            if src.len() < len {
                return Err(CodecError::ShortComposite);
            }
            let raw = src.split_to(len);
            String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
        }
        other => Err(CodecError::BadStringFlag(other)),
    }
}

pub fn write_string(dst: &mut BytesMut, value: &str) {
    if value.is_empty() {
        dst.put_u8(0x00);
        return;
    }
    dst.put_u8(0x0b);
    write_uleb128(dst, value.len() as u64);
    dst.extend_from_slice(value.as_bytes());
}

fn read_uleb128(src: &mut Bytes) -> CodecResult<u64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        if src.is_empty() {
            return Err(CodecError::ShortComposite);
        }
        let byte = src.get_u8();
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Ok(result)
}

fn write_uleb128(dst: &mut BytesMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        dst.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Reads a 32-bit integer list prefixed by either a `u16` or `u32` count,
/// depending on the packet it's embedded in.
pub fn read_i32_list16(src: &mut Bytes) -> CodecResult<Vec<i32>> {
    read_i32_list(src, |b| {
        if b.len() < 2 {
            return Err(CodecError::ShortComposite);
        }
        Ok(b.get_u16_le() as usize)
    })
}

pub fn read_i32_list32(src: &mut Bytes) -> CodecResult<Vec<i32>> {
    read_i32_list(src, |b| {
        if b.len() < 4 {
            return Err(CodecError::ShortComposite);
        }
        Ok(b.get_u32_le() as usize)
    })
}

fn read_i32_list(
    src: &mut Bytes,
    read_len: impl FnOnce(&mut Bytes) -> CodecResult<usize>,
) -> CodecResult<Vec<i32>> {
    let count = read_len(src)?;
    if src.len() < count * 4 {
        return Err(CodecError::ShortComposite);
    }
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(src.get_i32_le());
    }
    Ok(out)
}

pub fn write_i32_list16(dst: &mut BytesMut, values: &[i32]) {
    dst.put_u16_le(values.len() as u16);
    for v in values {
        dst.put_i32_le(*v);
    }
}

pub fn write_i32_list32(dst: &mut BytesMut, values: &[i32]) {
    dst.put_u32_le(values.len() as u32);
    for v in values {
        dst.put_i32_le(*v);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn string_round_trip_empty() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "");
        assert_eq!(&buf[..], &[0x00]);
        let mut bytes = buf.freeze();
        assert_eq!(read_string(&mut bytes).unwrap(), "");
    }

    #[test]
    fn string_round_trip_present() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "hello world");
        let mut bytes = buf.freeze();
        assert_eq!(read_string(&mut bytes).unwrap(), "hello world");
    }

    #[test]
    fn string_round_trip_long() {
        let s = "x".repeat(5000);
        let mut buf = BytesMut::new();
        write_string(&mut buf, &s);
        let mut bytes = buf.freeze();
        assert_eq!(read_string(&mut bytes).unwrap(), s);
    }

    #[test]
    fn i32_list_round_trip() {
        let values = vec![1, -2, 3, i32::MAX, i32::MIN];
        let mut buf = BytesMut::new();
        write_i32_list32(&mut buf, &values);
        let mut bytes = buf.freeze();
        assert_eq!(read_i32_list32(&mut bytes).unwrap(), values);
    }

    #[test]
    fn packet_codec_skips_unknown_opcode_by_full_length() {
        let mut codec = PacketCodec;
        let mut buf = BytesMut::new();
        Packet::new(9999u16, Bytes::from_static(b"ignored-payload")).write(&mut buf);
        Packet::new(5u16, Bytes::from_static(b"next")).write(&mut buf);

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.opcode, 9999);
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.opcode, 5);
        assert_eq!(&second.contents[..], b"next");
    }

    #[test]
    fn packet_codec_stops_cleanly_on_short_trailer() {
        let mut codec = PacketCodec;
        let mut buf = BytesMut::from(&b"\x01\x02\x03"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn packet_codec_errors_on_declared_length_too_long() {
        let mut codec = PacketCodec;
        let mut buf = BytesMut::new();
        buf.put_u16_le(1);
        buf.put_u8(0);
        buf.put_u32_le(100);
        buf.extend_from_slice(b"short");
        assert!(codec.decode(&mut buf).is_err());
    }
}
