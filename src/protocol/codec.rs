//! Protocol codec
//!
//! Encoding and decoding functions for the memcached binary protocol.
//!
//! ## Wire Format
//!
//! ### Header (24 bytes, big-endian)
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┬──────────┬──────────────┐
//! │ Magic(1) │Opcode(1) │KeyLen(2) │ExtLen(1) │ Type(1)  │ Status/VB(2) │
//! ├──────────┴──────────┴──────────┴──────────┴──────────┴──────────────┤
//! │ TotalBody (4)  │  Opaque (4)  │             CAS (8)                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Body
//! ```text
//! ┌──────────────┬──────────────┬─────────────────────────────┐
//! │    Extras    │     Key      │            Value            │
//! └──────────────┴──────────────┴─────────────────────────────┘
//! ```
//!
//! Requests carry a zero vbucket, responses a status. CAS is written as zero
//! and ignored on read.

use std::io::{Read, Write};

use bytes::{Buf, BufMut};

use super::{Request, Response, Status};
use crate::error::{Result, StrataError};

/// Header size
pub const HEADER_SIZE: usize = 24;

/// Maximum body size (16 MB)
pub const MAX_BODY_SIZE: u32 = 16 * 1024 * 1024;

/// Magic byte of a request frame
pub const REQUEST_MAGIC: u8 = 0x80;

/// Magic byte of a response frame
pub const RESPONSE_MAGIC: u8 = 0x81;

const RAW_BYTES: u8 = 0x00;

/// Parsed fixed header
struct Header {
    magic: u8,
    opcode: u8,
    key_len: u16,
    extras_len: u8,
    status: u16,
    body_len: u32,
    opaque: u32,
}

impl Header {
    fn parse(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StrataError::Protocol(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let magic = bytes.get_u8();
        let opcode = bytes.get_u8();
        let key_len = bytes.get_u16();
        let extras_len = bytes.get_u8();
        let _data_type = bytes.get_u8();
        let status = bytes.get_u16();
        let body_len = bytes.get_u32();
        let opaque = bytes.get_u32();
        let _cas = bytes.get_u64();

        let header = Self {
            magic,
            opcode,
            key_len,
            extras_len,
            status,
            body_len,
            opaque,
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<()> {
        if self.body_len > MAX_BODY_SIZE {
            return Err(StrataError::Protocol(format!(
                "Body too large: {} bytes (max {})",
                self.body_len, MAX_BODY_SIZE
            )));
        }
        let framed = self.key_len as u32 + self.extras_len as u32;
        if framed > self.body_len {
            return Err(StrataError::Protocol(format!(
                "Key and extras ({} bytes) exceed body length {}",
                framed, self.body_len
            )));
        }
        Ok(())
    }

    fn expect_magic(&self, magic: u8) -> Result<()> {
        if self.magic != magic {
            return Err(StrataError::Protocol(format!(
                "Bad magic: expected 0x{:02x}, got 0x{:02x}",
                magic, self.magic
            )));
        }
        Ok(())
    }

    /// Split a complete frame's body into (extras, key, value).
    fn split_body<'a>(&self, frame: &'a [u8]) -> Result<(&'a [u8], &'a [u8], &'a [u8])> {
        let total_len = HEADER_SIZE + self.body_len as usize;
        if frame.len() < total_len {
            return Err(StrataError::Protocol(format!(
                "Incomplete body: expected {} bytes, got {}",
                total_len,
                frame.len()
            )));
        }

        let body = &frame[HEADER_SIZE..total_len];
        let (extras, rest) = body.split_at(self.extras_len as usize);
        let (key, value) = rest.split_at(self.key_len as usize);
        Ok((extras, key, value))
    }
}

fn encode_frame(
    magic: u8,
    opcode: u8,
    status: u16,
    opaque: u32,
    extras: &[u8],
    key: &[u8],
    value: &[u8],
) -> Result<Vec<u8>> {
    let key_len = u16::try_from(key.len()).map_err(|_| {
        StrataError::Protocol(format!(
            "Key too large: {} bytes (max {})",
            key.len(),
            u16::MAX
        ))
    })?;
    let extras_len = u8::try_from(extras.len()).map_err(|_| {
        StrataError::Protocol(format!(
            "Extras too large: {} bytes (max {})",
            extras.len(),
            u8::MAX
        ))
    })?;
    let body_len = extras.len() + key.len() + value.len();
    if body_len > MAX_BODY_SIZE as usize {
        return Err(StrataError::Protocol(format!(
            "Body too large: {} bytes (max {})",
            body_len, MAX_BODY_SIZE
        )));
    }

    let mut message = Vec::with_capacity(HEADER_SIZE + body_len);
    message.put_u8(magic);
    message.put_u8(opcode);
    message.put_u16(key_len);
    message.put_u8(extras_len);
    message.put_u8(RAW_BYTES);
    message.put_u16(status);
    message.put_u32(body_len as u32);
    message.put_u32(opaque);
    message.put_u64(0);
    message.put_slice(extras);
    message.put_slice(key);
    message.put_slice(value);

    Ok(message)
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
///
/// Fails when a field does not fit its header slot or the body exceeds
/// `MAX_BODY_SIZE`.
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    encode_frame(
        REQUEST_MAGIC,
        request.opcode,
        0,
        request.opaque,
        &request.extras,
        &request.key,
        &request.value,
    )
}

/// Decode a request from bytes
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let header = Header::parse(bytes)?;
    header.expect_magic(REQUEST_MAGIC)?;
    let (extras, key, value) = header.split_body(bytes)?;

    Ok(Request {
        opcode: header.opcode,
        opaque: header.opaque,
        extras: extras.to_vec(),
        key: key.to_vec(),
        value: value.to_vec(),
    })
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    encode_frame(
        RESPONSE_MAGIC,
        response.opcode,
        response.status as u16,
        response.opaque,
        &response.extras,
        &response.key,
        &response.value,
    )
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let header = Header::parse(bytes)?;
    header.expect_magic(RESPONSE_MAGIC)?;
    let (extras, key, value) = header.split_body(bytes)?;

    let status = Status::from_u16(header.status).ok_or_else(|| {
        StrataError::Protocol(format!("Unknown response status: 0x{:04x}", header.status))
    })?;

    Ok(Response {
        opcode: header.opcode,
        status,
        opaque: header.opaque,
        extras: extras.to_vec(),
        key: key.to_vec(),
        value: value.to_vec(),
    })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete frame (header plus body) from a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    // Validates the body length before allocating for it
    let parsed = Header::parse(&header)?;

    let mut frame = vec![0u8; HEADER_SIZE + parsed.body_len as usize];
    frame[..HEADER_SIZE].copy_from_slice(&header);
    if parsed.body_len > 0 {
        reader.read_exact(&mut frame[HEADER_SIZE..])?;
    }
    Ok(frame)
}

/// Read a complete request from a stream
///
/// Blocks until a complete request is received or an error occurs
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let frame = read_frame(reader)?;
    decode_request(&frame)
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    writer.write_all(&encode_request(request)?)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let frame = read_frame(reader)?;
    decode_response(&frame)
}

/// Write a single response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    write_responses(writer, std::slice::from_ref(response))
}

/// Write a batch of responses and flush once
pub fn write_responses<W: Write>(writer: &mut W, responses: &[Response]) -> Result<()> {
    for response in responses {
        writer.write_all(&encode_response(response)?)?;
    }
    writer.flush()?;
    Ok(())
}
