//! Codec Tests
//!
//! Tests for request and response encoding/decoding.

use std::io::Cursor;

use stratakv::protocol::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, write_responses, Command, Opcode, Request,
    Response, Status, HEADER_SIZE, MAX_BODY_SIZE,
};

// =============================================================================
// Request Encoding/Decoding Tests
// =============================================================================

fn round_trip(command: Command) -> Command {
    let encoded = encode_request(&command.into_request(77)).unwrap();
    let decoded = decode_request(&encoded).unwrap();
    assert_eq!(decoded.opaque, 77);
    decoded.command().unwrap()
}

#[test]
fn test_encode_decode_get() {
    let cmd = Command::Get {
        key: b"hello".to_vec(),
    };
    assert_eq!(round_trip(cmd.clone()), cmd);
}

#[test]
fn test_encode_decode_set_with_extras() {
    let cmd = Command::Set {
        key: b"mykey".to_vec(),
        value: b"myvalue".to_vec(),
        flags: 0xdead_beef,
        expiration: 3600,
    };
    assert_eq!(round_trip(cmd.clone()), cmd);
}

#[test]
fn test_encode_decode_set_binary_empty_value() {
    let cmd = Command::Set {
        key: vec![0x00, 0xff, 0x80],
        value: Vec::new(),
        flags: 0,
        expiration: 0,
    };
    assert_eq!(round_trip(cmd.clone()), cmd);
}

#[test]
fn test_encode_decode_flush_delay() {
    assert_eq!(round_trip(Command::Flush { delay: 0 }), Command::Flush { delay: 0 });
    assert_eq!(round_trip(Command::Flush { delay: 9 }), Command::Flush { delay: 9 });
}

#[test]
fn test_unknown_opcode_survives_decoding() {
    let request = Request {
        opcode: 0x33,
        opaque: 1,
        extras: Vec::new(),
        key: b"k".to_vec(),
        value: Vec::new(),
    };
    let decoded = decode_request(&encode_request(&request).unwrap()).unwrap();
    assert_eq!(decoded, request);
    assert_eq!(decoded.command().unwrap(), Command::Unknown { opcode: 0x33 });
}

// =============================================================================
// Response Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_response_with_value() {
    let resp = Response::ok(Opcode::Get as u8, 5)
        .with_extras(vec![0, 0, 0, 0])
        .with_value(b"world".to_vec());
    let decoded = decode_response(&encode_response(&resp).unwrap()).unwrap();
    assert_eq!(decoded, resp);
}

#[test]
fn test_encode_decode_response_error() {
    let resp = Response::error(Opcode::Delete as u8, 8, Status::KeyNotFound, "Not found");
    let decoded = decode_response(&encode_response(&resp).unwrap()).unwrap();
    assert_eq!(decoded.status, Status::KeyNotFound);
    assert_eq!(decoded.value, b"Not found");
    assert!(!decoded.is_success());
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_incomplete_header() {
    let result = decode_request(&[0x80, 0x00, 0x00]);
    assert!(result.is_err());
}

#[test]
fn test_incomplete_body() {
    let request = Command::Get { key: b"abc".to_vec() }.into_request(0);
    let mut encoded = encode_request(&request).unwrap();
    encoded.truncate(encoded.len() - 1);
    assert!(decode_request(&encoded).is_err());
}

#[test]
fn test_bad_magic() {
    let encoded = encode_response(&Response::ok(Opcode::Noop as u8, 0)).unwrap();
    // A response frame is not a request
    assert!(decode_request(&encoded).is_err());

    let encoded = encode_request(&Command::Noop.into_request(0)).unwrap();
    assert!(decode_response(&encoded).is_err());
}

#[test]
fn test_oversized_body_rejected() {
    let mut encoded = encode_request(&Command::Noop.into_request(0)).unwrap();
    encoded[8..12].copy_from_slice(&(MAX_BODY_SIZE + 1).to_be_bytes());
    assert!(decode_request(&encoded).is_err());

    // The stream reader refuses before allocating the body
    let mut cursor = Cursor::new(encoded);
    assert!(read_request(&mut cursor).is_err());
}

#[test]
fn test_key_longer_than_body_rejected() {
    let request = Command::Get { key: b"abc".to_vec() }.into_request(0);
    let mut encoded = encode_request(&request).unwrap();
    encoded[2..4].copy_from_slice(&10u16.to_be_bytes());
    assert!(decode_request(&encoded).is_err());
}

#[test]
fn test_encode_rejects_key_wider_than_header_field() {
    let key = vec![b'k'; u16::MAX as usize + 1];
    let request = Command::Get { key }.into_request(0);
    assert!(encode_request(&request).is_err());

    // Nothing reaches the stream when encoding fails
    let mut buf = Vec::new();
    assert!(write_request(&mut buf, &request).is_err());
    assert!(buf.is_empty());

    let widest = Command::Get {
        key: vec![b'k'; u16::MAX as usize],
    };
    let decoded = decode_request(&encode_request(&widest.into_request(0)).unwrap()).unwrap();
    assert_eq!(decoded.key.len(), u16::MAX as usize);
}

#[test]
fn test_encode_rejects_extras_wider_than_header_field() {
    let request = Request {
        opcode: Opcode::Set as u8,
        opaque: 0,
        extras: vec![0; u8::MAX as usize + 1],
        key: b"k".to_vec(),
        value: Vec::new(),
    };
    assert!(encode_request(&request).is_err());

    let response = Response {
        extras: vec![0; u8::MAX as usize + 1],
        ..Response::ok(Opcode::Get as u8, 0)
    };
    assert!(encode_response(&response).is_err());
}

#[test]
fn test_encode_rejects_oversized_body() {
    let request = Command::Set {
        key: b"k".to_vec(),
        value: vec![0; MAX_BODY_SIZE as usize],
        flags: 0,
        expiration: 0,
    }
    .into_request(0);
    assert!(encode_request(&request).is_err());
}

#[test]
fn test_unknown_response_status() {
    let mut encoded = encode_response(&Response::ok(Opcode::Noop as u8, 0)).unwrap();
    encoded[6..8].copy_from_slice(&0x00ffu16.to_be_bytes());
    assert!(decode_response(&encoded).is_err());
}

#[test]
fn test_set_with_wrong_extras_is_invalid() {
    let request = Request {
        opcode: Opcode::Set as u8,
        opaque: 0,
        extras: vec![0; 4],
        key: b"k".to_vec(),
        value: b"v".to_vec(),
    };
    let decoded = decode_request(&encode_request(&request).unwrap()).unwrap();
    assert!(decoded.command().is_err());
}

#[test]
fn test_delete_without_key_is_invalid() {
    let request = Command::Delete { key: Vec::new() }.into_request(0);
    let decoded = decode_request(&encode_request(&request).unwrap()).unwrap();
    assert!(decoded.command().is_err());
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_write_read_request() {
    let mut buffer = Vec::new();
    let request = Command::Set {
        key: b"stream".to_vec(),
        value: b"data".to_vec(),
        flags: 0,
        expiration: 0,
    }
    .into_request(3);
    write_request(&mut buffer, &request).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_request(&mut cursor).unwrap(), request);
}

#[test]
fn test_stream_multiple_requests() {
    let mut buffer = Vec::new();
    let requests = vec![
        Command::Set {
            key: b"k1".to_vec(),
            value: b"v1".to_vec(),
            flags: 0,
            expiration: 0,
        }
        .into_request(1),
        Command::Get { key: b"k1".to_vec() }.into_request(2),
        Command::Quit.into_request(3),
    ];
    for request in &requests {
        write_request(&mut buffer, request).unwrap();
    }

    let mut cursor = Cursor::new(buffer);
    for expected in &requests {
        assert_eq!(&read_request(&mut cursor).unwrap(), expected);
    }
    // Nothing left
    assert!(read_request(&mut cursor).is_err());
}

#[test]
fn test_stream_stat_batch() {
    let opcode = Opcode::Stat as u8;
    let responses = vec![
        Response::ok(opcode, 4)
            .with_key(b"sets".to_vec())
            .with_value(b"2".to_vec()),
        Response::ok(opcode, 4)
            .with_key(b"gets".to_vec())
            .with_value(b"1".to_vec()),
        Response::ok(opcode, 4),
    ];

    let mut buffer = Vec::new();
    write_responses(&mut buffer, &responses).unwrap();

    let mut cursor = Cursor::new(buffer);
    for expected in &responses {
        assert_eq!(&read_response(&mut cursor).unwrap(), expected);
    }
}

#[test]
fn test_stream_write_read_response() {
    let mut buffer = Vec::new();
    let resp = Response::ok(Opcode::Version as u8, 9).with_value(b"0.1.0".to_vec());
    write_response(&mut buffer, &resp).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_response(&mut cursor).unwrap(), resp);
}

// =============================================================================
// Wire Format Verification Tests
// =============================================================================

#[test]
fn test_wire_format_get() {
    let request = Command::Get {
        key: b"test".to_vec(),
    }
    .into_request(0x0102_0304);
    let encoded = encode_request(&request).unwrap();

    assert_eq!(encoded.len(), HEADER_SIZE + 4);
    assert_eq!(encoded[0], 0x80); // request magic
    assert_eq!(encoded[1], 0x00); // GET
    assert_eq!(&encoded[2..4], &[0x00, 0x04]); // key len
    assert_eq!(encoded[4], 0x00); // extras len
    assert_eq!(&encoded[8..12], &[0x00, 0x00, 0x00, 0x04]); // total body
    assert_eq!(&encoded[12..16], &[0x01, 0x02, 0x03, 0x04]); // opaque
    assert_eq!(&encoded[16..24], &[0; 8]); // cas
    assert_eq!(&encoded[24..], b"test");
}

#[test]
fn test_wire_format_set() {
    let encoded = encode_request(
        &Command::Set {
            key: b"k".to_vec(),
            value: b"vv".to_vec(),
            flags: 1,
            expiration: 2,
        }
        .into_request(0),
    )
    .unwrap();

    assert_eq!(encoded[1], 0x01); // SET
    assert_eq!(encoded[4], 8); // extras len
    assert_eq!(&encoded[8..12], &[0, 0, 0, 11]); // 8 + 1 + 2
    assert_eq!(&encoded[24..32], &[0, 0, 0, 1, 0, 0, 0, 2]);
    assert_eq!(&encoded[32..33], b"k");
    assert_eq!(&encoded[33..], b"vv");
}

#[test]
fn test_wire_format_response_status() {
    let encoded = encode_response(&Response::new(
        Opcode::Get as u8,
        0,
        Status::UnknownCommand,
    )).unwrap();

    assert_eq!(encoded[0], 0x81); // response magic
    assert_eq!(&encoded[6..8], &[0x00, 0x81]); // status
    assert_eq!(encoded.len(), HEADER_SIZE);
}
