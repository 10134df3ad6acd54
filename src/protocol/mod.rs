//! Protocol Module
//!
//! The memcached binary protocol subset spoken by StrataKV nodes.
//!
//! ## Frame Format
//! ```text
//! ┌──────────────────────┬──────────┬──────────┬─────────────────────┐
//! │     Header (24)      │  Extras  │   Key    │        Value        │
//! └──────────────────────┴──────────┴──────────┴─────────────────────┘
//! ```
//!
//! ### Opcodes
//! - 0x00: GET     - Key; response extras carry 4 bytes of flags
//! - 0x01: SET     - Extras: flags (4) + expiration (4); key; value
//! - 0x04: DELETE  - Key
//! - 0x07: QUIT    - Answered, then the connection closes
//! - 0x08: FLUSH   - Optional extras: delay (4)
//! - 0x0a: NOOP
//! - 0x0b: VERSION
//! - 0x10: STAT    - One response per statistic, then an empty terminator
//!
//! ### Status Codes
//! - 0x0000: SUCCESS
//! - 0x0001: KEY_ENOENT
//! - 0x0004: EINVAL
//! - 0x0081: UNKNOWN_COMMAND

mod codec;
mod command;
mod response;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, write_responses, HEADER_SIZE,
    MAX_BODY_SIZE, REQUEST_MAGIC, RESPONSE_MAGIC,
};
pub use command::{Command, Opcode, Request};
pub use response::{Response, Status};
