//! Blocking client
//!
//! Speaks the same memcached binary subset as the server, one request at a
//! time over a single TCP connection.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Result, StrataError};
use crate::protocol::{read_response, write_request, Command, Response, Status};

/// Connection to a StrataKV node
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    next_opaque: u32,
}

impl Client {
    /// Connect to a node
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| StrataError::Network(format!("Failed to connect: {}", e)))?;
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            next_opaque: 1,
        })
    }

    /// Bound every read on the connection (0 disables the timeout)
    pub fn set_timeout(&mut self, ms: u64) -> Result<()> {
        let timeout = if ms > 0 {
            Some(Duration::from_millis(ms))
        } else {
            None
        };
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let response = self.call(Command::Get { key: key.to_vec() })?;
        match response.status {
            Status::Success => Ok(Some(response.value)),
            Status::KeyNotFound => Ok(None),
            _ => Err(server_error(&response)),
        }
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let response = self.call(Command::Set {
            key: key.to_vec(),
            value: value.to_vec(),
            flags: 0,
            expiration: 0,
        })?;
        expect_success(&response)
    }

    /// Returns `false` if the key did not exist
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let response = self.call(Command::Delete { key: key.to_vec() })?;
        match response.status {
            Status::Success => Ok(true),
            Status::KeyNotFound => Ok(false),
            _ => Err(server_error(&response)),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        let response = self.call(Command::Flush { delay: 0 })?;
        expect_success(&response)
    }

    /// Server statistics as (name, value) pairs
    pub fn stats(&mut self) -> Result<Vec<(String, String)>> {
        let opaque = self.send(Command::Stat)?;

        let mut stats = Vec::new();
        loop {
            let response = self.receive(opaque)?;
            expect_success(&response)?;
            if response.key.is_empty() {
                return Ok(stats);
            }
            stats.push((
                String::from_utf8_lossy(&response.key).into_owned(),
                String::from_utf8_lossy(&response.value).into_owned(),
            ));
        }
    }

    pub fn noop(&mut self) -> Result<()> {
        let response = self.call(Command::Noop)?;
        expect_success(&response)
    }

    pub fn version(&mut self) -> Result<String> {
        let response = self.call(Command::Version)?;
        expect_success(&response)?;
        Ok(String::from_utf8_lossy(&response.value).into_owned())
    }

    /// Ask the server to close the connection
    pub fn quit(mut self) -> Result<()> {
        let response = self.call(Command::Quit)?;
        expect_success(&response)
    }

    // =========================================================================
    // Framing
    // =========================================================================

    fn call(&mut self, command: Command) -> Result<Response> {
        let opaque = self.send(command)?;
        self.receive(opaque)
    }

    fn send(&mut self, command: Command) -> Result<u32> {
        let opaque = self.next_opaque;
        self.next_opaque = self.next_opaque.wrapping_add(1);
        write_request(&mut self.writer, &command.into_request(opaque))?;
        Ok(opaque)
    }

    fn receive(&mut self, opaque: u32) -> Result<Response> {
        let response = read_response(&mut self.reader)?;
        if response.opaque != opaque {
            return Err(StrataError::Protocol(format!(
                "Response opaque {} does not match request {}",
                response.opaque, opaque
            )));
        }
        Ok(response)
    }
}

fn expect_success(response: &Response) -> Result<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(server_error(response))
    }
}

fn server_error(response: &Response) -> StrataError {
    StrataError::Protocol(format!(
        "Server returned {:?}: {}",
        response.status,
        String::from_utf8_lossy(&response.value)
    ))
}
