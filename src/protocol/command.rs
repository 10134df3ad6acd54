//! Request definitions
//!
//! `Request` is a decoded frame; `Command` is its typed meaning.

use crate::error::{Result, StrataError};

/// Opcodes the node understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Get = 0x00,
    Set = 0x01,
    Delete = 0x04,
    Quit = 0x07,
    Flush = 0x08,
    Noop = 0x0a,
    Version = 0x0b,
    Stat = 0x10,
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Opcode::Get),
            0x01 => Some(Opcode::Set),
            0x04 => Some(Opcode::Delete),
            0x07 => Some(Opcode::Quit),
            0x08 => Some(Opcode::Flush),
            0x0a => Some(Opcode::Noop),
            0x0b => Some(Opcode::Version),
            0x10 => Some(Opcode::Stat),
            _ => None,
        }
    }
}

/// A request frame as it travels on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Raw opcode; unknown values survive decoding so they can be answered
    pub opcode: u8,

    /// Echoed back on every response
    pub opaque: u32,

    pub extras: Vec<u8>,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// A typed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Look up a key
    Get { key: Vec<u8> },

    /// Store a key-value pair. `flags` and `expiration` are carried for the
    /// routing layer; the engine does not interpret them.
    Set {
        key: Vec<u8>,
        value: Vec<u8>,
        flags: u32,
        expiration: u32,
    },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Delete every live key, optionally after `delay` seconds
    Flush { delay: u32 },

    /// Report server statistics
    Stat,

    /// No-op (health check)
    Noop,

    /// Report the server version
    Version,

    /// Close the connection after answering
    Quit,

    /// An opcode this node does not implement
    Unknown { opcode: u8 },
}

impl Command {
    /// Wire opcode of this command
    pub fn opcode(&self) -> u8 {
        match self {
            Command::Get { .. } => Opcode::Get as u8,
            Command::Set { .. } => Opcode::Set as u8,
            Command::Delete { .. } => Opcode::Delete as u8,
            Command::Flush { .. } => Opcode::Flush as u8,
            Command::Stat => Opcode::Stat as u8,
            Command::Noop => Opcode::Noop as u8,
            Command::Version => Opcode::Version as u8,
            Command::Quit => Opcode::Quit as u8,
            Command::Unknown { opcode } => *opcode,
        }
    }

    /// Frame this command with the given opaque value
    pub fn into_request(self, opaque: u32) -> Request {
        let opcode = self.opcode();
        let mut request = Request {
            opcode,
            opaque,
            extras: Vec::new(),
            key: Vec::new(),
            value: Vec::new(),
        };

        match self {
            Command::Get { key } | Command::Delete { key } => request.key = key,
            Command::Set {
                key,
                value,
                flags,
                expiration,
            } => {
                request.extras.extend_from_slice(&flags.to_be_bytes());
                request.extras.extend_from_slice(&expiration.to_be_bytes());
                request.key = key;
                request.value = value;
            }
            Command::Flush { delay } => {
                if delay > 0 {
                    request.extras.extend_from_slice(&delay.to_be_bytes());
                }
            }
            Command::Stat
            | Command::Noop
            | Command::Version
            | Command::Quit
            | Command::Unknown { .. } => {}
        }
        request
    }
}

impl Request {
    /// Interpret the frame.
    ///
    /// Unknown opcodes decode to `Command::Unknown`; a known opcode with the
    /// wrong extras or a missing key is a protocol error.
    pub fn command(&self) -> Result<Command> {
        let opcode = match Opcode::from_u8(self.opcode) {
            Some(opcode) => opcode,
            None => return Ok(Command::Unknown { opcode: self.opcode }),
        };

        match opcode {
            Opcode::Get => {
                self.expect_extras(opcode, 0)?;
                Ok(Command::Get {
                    key: self.require_key(opcode)?,
                })
            }
            Opcode::Set => {
                self.expect_extras(opcode, 8)?;
                let key = self.require_key(opcode)?;
                let flags = u32::from_be_bytes([
                    self.extras[0],
                    self.extras[1],
                    self.extras[2],
                    self.extras[3],
                ]);
                let expiration = u32::from_be_bytes([
                    self.extras[4],
                    self.extras[5],
                    self.extras[6],
                    self.extras[7],
                ]);
                Ok(Command::Set {
                    key,
                    value: self.value.clone(),
                    flags,
                    expiration,
                })
            }
            Opcode::Delete => {
                self.expect_extras(opcode, 0)?;
                Ok(Command::Delete {
                    key: self.require_key(opcode)?,
                })
            }
            Opcode::Flush => {
                let delay = match self.extras.len() {
                    0 => 0,
                    4 => u32::from_be_bytes([
                        self.extras[0],
                        self.extras[1],
                        self.extras[2],
                        self.extras[3],
                    ]),
                    n => {
                        return Err(StrataError::Protocol(format!(
                            "FLUSH: expected 0 or 4 bytes of extras, got {}",
                            n
                        )))
                    }
                };
                Ok(Command::Flush { delay })
            }
            Opcode::Stat => Ok(Command::Stat),
            Opcode::Noop => Ok(Command::Noop),
            Opcode::Version => Ok(Command::Version),
            Opcode::Quit => Ok(Command::Quit),
        }
    }

    fn expect_extras(&self, opcode: Opcode, len: usize) -> Result<()> {
        if self.extras.len() != len {
            return Err(StrataError::Protocol(format!(
                "{:?}: expected {} bytes of extras, got {}",
                opcode,
                len,
                self.extras.len()
            )));
        }
        Ok(())
    }

    fn require_key(&self, opcode: Opcode) -> Result<Vec<u8>> {
        if self.key.is_empty() {
            return Err(StrataError::Protocol(format!("{:?}: missing key", opcode)));
        }
        Ok(self.key.clone())
    }
}
