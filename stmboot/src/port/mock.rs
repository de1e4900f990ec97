//! In-memory ports for tests.

use super::Port;
use crate::error::Result;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Reply generator invoked with every packet the host writes.
pub(crate) type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

/// Port backed by a fixed byte stream, exercising the default `read_line`.
pub(crate) struct ByteStreamPort {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl ByteStreamPort {
    pub(crate) fn new(input: &[u8]) -> Self {
        Self {
            input: input
                .iter()
                .copied()
                .collect(),
            output: Vec::new(),
        }
    }

    pub(crate) fn written(&self) -> &[u8] {
        &self.output
    }
}

impl Read for ByteStreamPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.input.pop_front() {
            Some(b) => {
                buf[0] = b;
                Ok(1)
            },
            None => Err(io::Error::from(io::ErrorKind::TimedOut)),
        }
    }
}

impl Write for ByteStreamPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for ByteStreamPort {
    fn timeout(&self) -> Duration {
        Duration::from_millis(20)
    }

    fn name(&self) -> &str {
        "stream"
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Simulated device working line by line.
///
/// Lines queued with [`ScriptedPort::line`] are returned in order; `None`
/// entries and an empty queue read as a timeout. A responder, if set, queues
/// the replies to every packet the host writes.
#[derive(Default)]
pub(crate) struct ScriptedPort {
    lines: VecDeque<Option<Vec<u8>>>,
    responder: Option<Responder>,
    packets: Vec<Vec<u8>>,
    reads: usize,
    closed: bool,
}

impl ScriptedPort {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue one device line.
    pub(crate) fn line(mut self, line: impl AsRef<[u8]>) -> Self {
        self.lines
            .push_back(Some(line.as_ref().to_vec()));
        self
    }

    /// Queue one read timeout.
    pub(crate) fn silence(mut self) -> Self {
        self.lines.push_back(None);
        self
    }

    /// Queue a `RESP` frame carrying `value`.
    pub(crate) fn response(self, value: u32) -> Self {
        self.line(response_line(value))
    }

    pub(crate) fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Every packet written so far.
    pub(crate) fn packets(&self) -> &[Vec<u8>] {
        &self.packets
    }

    /// Packets whose magic equals `magic`.
    pub(crate) fn packets_with_magic(&self, magic: &[u8; 4]) -> Vec<&Vec<u8>> {
        self.packets
            .iter()
            .filter(|p| p.starts_with(magic))
            .collect()
    }

    /// Number of `read_line` calls made.
    pub(crate) fn reads(&self) -> usize {
        self.reads
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Encode a device `RESP` line.
pub(crate) fn response_line(value: u32) -> Vec<u8> {
    let mut line = b"RESP".to_vec();
    line.extend_from_slice(&value.to_le_bytes());
    line.extend_from_slice(b"\r\n");
    line
}

impl Read for ScriptedPort {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::TimedOut))
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for ScriptedPort {
    fn timeout(&self) -> Duration {
        Duration::ZERO
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.packets.push(buf.to_vec());
        if let Some(responder) = self.responder.as_mut() {
            for reply in responder(buf) {
                self.lines.push_back(Some(reply));
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.reads += 1;
        Ok(self
            .lines
            .pop_front()
            .flatten())
    }
}
