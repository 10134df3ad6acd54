//! Response definitions
//!
//! Represents responses to clients.

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Status {
    Success = 0x0000,
    KeyNotFound = 0x0001,
    InvalidArguments = 0x0004,
    UnknownCommand = 0x0081,
}

impl Status {
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0x0000 => Some(Status::Success),
            0x0001 => Some(Status::KeyNotFound),
            0x0004 => Some(Status::InvalidArguments),
            0x0081 => Some(Status::UnknownCommand),
            _ => None,
        }
    }
}

/// A response to send to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Opcode of the request being answered
    pub opcode: u8,

    pub status: Status,

    /// Copied from the request
    pub opaque: u32,

    pub extras: Vec<u8>,
    pub key: Vec<u8>,

    /// Value for GET, statistic for STAT, message for errors
    pub value: Vec<u8>,
}

impl Response {
    /// Empty response with the given status
    pub fn new(opcode: u8, opaque: u32, status: Status) -> Self {
        Self {
            opcode,
            status,
            opaque,
            extras: Vec::new(),
            key: Vec::new(),
            value: Vec::new(),
        }
    }

    /// Empty success response
    pub fn ok(opcode: u8, opaque: u32) -> Self {
        Self::new(opcode, opaque, Status::Success)
    }

    /// Failure carrying a human-readable message in the value
    pub fn error(opcode: u8, opaque: u32, status: Status, message: &str) -> Self {
        Self::new(opcode, opaque, status).with_value(message.as_bytes().to_vec())
    }

    pub fn with_extras(mut self, extras: Vec<u8>) -> Self {
        self.extras = extras;
        self
    }

    pub fn with_key(mut self, key: Vec<u8>) -> Self {
        self.key = key;
        self
    }

    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.value = value;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
