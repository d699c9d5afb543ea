//! Newline-delimited duplex byte channel to the subprocess.
//!
//! The channel knows nothing about the protocol. It frames outgoing lines with
//! a single `\n` and splits incoming bytes on `\n`, with a bounded buffer so a
//! peer that never terminates its line cannot grow memory or stall the caller
//! forever once the buffer fills.

use gao_shared::errors::{GaoError, GaoResult};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;

/// Size of the receive buffer, including room for the terminator.
pub const LINE_BUFFER_SIZE: usize = 1024;

/// Longest line content `read_line` returns before giving up on a newline.
pub const MAX_LINE_LEN: usize = LINE_BUFFER_SIZE - 1;

/// How a line returned by [`Channel::read_line`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnd {
    /// A `\n` was seen; it is not part of the content.
    Newline,
    /// The peer closed the stream.
    Eof,
    /// The buffer filled before any newline; the logical message may be cut.
    BufferFull,
}

/// One received line, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    bytes: Vec<u8>,
    end: LineEnd,
}

impl Line {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn end(&self) -> LineEnd {
        self.end
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.end == LineEnd::BufferFull
    }

    /// The content as text. The protocol is ASCII, so invalid UTF-8 is a
    /// protocol violation rather than a transport failure.
    pub fn as_str(&self) -> GaoResult<&str> {
        std::str::from_utf8(&self.bytes)
            .map_err(|e| GaoError::Protocol(format!("response is not valid text: {}", e)))
    }
}

/// Line-framed transport over a byte stream.
///
/// Bytes received after a newline are kept for the next `read_line`, so a
/// peer writing several lines at once loses nothing.
pub struct Channel<S = UnixStream> {
    stream: S,
    pending: Vec<u8>,
}

impl<S> std::fmt::Debug for Channel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<S: Read + Write> Channel<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pending: Vec::with_capacity(LINE_BUFFER_SIZE),
        }
    }

    /// Write `text` followed by a single newline.
    ///
    /// Returns the number of bytes written, terminator included.
    pub fn write_line(&mut self, text: &str) -> GaoResult<usize> {
        if text.contains('\n') {
            return Err(GaoError::InvalidArgument(format!(
                "line must not contain a newline: {:?}",
                text
            )));
        }

        let mut framed = Vec::with_capacity(text.len() + 1);
        framed.extend_from_slice(text.as_bytes());
        framed.push(b'\n');

        self.stream
            .write_all(&framed)
            .map_err(|e| GaoError::transport("write to subprocess failed", e))?;
        self.stream
            .flush()
            .map_err(|e| GaoError::transport("flush to subprocess failed", e))?;

        tracing::trace!(line = %text, bytes = framed.len(), "Wrote line");
        Ok(framed.len())
    }

    /// Block until a newline arrives, the peer closes, or the buffer fills.
    ///
    /// On end of stream the bytes received so far are returned (possibly none).
    /// When [`MAX_LINE_LEN`] bytes arrive without a newline they are returned
    /// as a [`LineEnd::BufferFull`] line instead of blocking for more.
    pub fn read_line(&mut self) -> GaoResult<Line> {
        let mut chunk = [0u8; LINE_BUFFER_SIZE];

        loop {
            let window = self.pending.len().min(MAX_LINE_LEN);
            if let Some(pos) = self.pending[..window].iter().position(|&b| b == b'\n') {
                let mut bytes: Vec<u8> = self.pending.drain(..=pos).collect();
                bytes.pop();
                return Ok(Line {
                    bytes,
                    end: LineEnd::Newline,
                });
            }

            if self.pending.len() >= MAX_LINE_LEN {
                let bytes: Vec<u8> = self.pending.drain(..MAX_LINE_LEN).collect();
                tracing::warn!(bytes = bytes.len(), "Line buffer exhausted without newline");
                return Ok(Line {
                    bytes,
                    end: LineEnd::BufferFull,
                });
            }

            let want = MAX_LINE_LEN - self.pending.len();
            match self.stream.read(&mut chunk[..want]) {
                Ok(0) => {
                    let bytes = std::mem::take(&mut self.pending);
                    tracing::trace!(bytes = bytes.len(), "Peer closed channel");
                    return Ok(Line {
                        bytes,
                        end: LineEnd::Eof,
                    });
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(GaoError::transport("read from subprocess failed", e)),
            }
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::thread;
    use std::time::Duration;

    /// In-memory stream: reads from a fixed script, records writes.
    struct Scripted {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Scripted {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_line_appends_single_newline() {
        let mut channel = Channel::new(Scripted::new(b""));
        let written = channel.write_line("get:state").unwrap();
        assert_eq!(written, 10);
        assert_eq!(channel.get_ref().output, b"get:state\n");
    }

    #[test]
    fn test_write_line_rejects_embedded_newline() {
        let mut channel = Channel::new(Scripted::new(b""));
        let err = channel.write_line("del:1\ndel:2").unwrap_err();
        assert!(matches!(err, GaoError::InvalidArgument(_)));
        assert!(channel.get_ref().output.is_empty());
    }

    #[test]
    fn test_read_line_splits_and_keeps_remainder() {
        let mut channel = Channel::new(Scripted::new(b"OK:1\nOK:2\nOK:3"));

        let first = channel.read_line().unwrap();
        assert_eq!(first.as_str().unwrap(), "OK:1");
        assert_eq!(first.end(), LineEnd::Newline);

        let second = channel.read_line().unwrap();
        assert_eq!(second.as_str().unwrap(), "OK:2");

        let third = channel.read_line().unwrap();
        assert_eq!(third.as_str().unwrap(), "OK:3");
        assert_eq!(third.end(), LineEnd::Eof);

        let fourth = channel.read_line().unwrap();
        assert!(fourth.is_empty());
        assert_eq!(fourth.end(), LineEnd::Eof);
    }

    #[test]
    fn test_read_line_returns_full_buffer_without_newline() {
        let (local, mut peer) = UnixStream::pair().unwrap();
        let writer = thread::spawn(move || {
            peer.write_all(&[b'a'; MAX_LINE_LEN]).unwrap();
            // Stall with the stream open; read_line must not wait for us.
            thread::sleep(Duration::from_millis(500));
            drop(peer);
        });

        let mut channel = Channel::new(local);
        let line = channel.read_line().unwrap();
        assert_eq!(line.len(), 1023);
        assert!(line.is_truncated());

        writer.join().unwrap();
    }

    #[test]
    fn test_read_line_overlong_line_is_split() {
        let mut input = vec![b'x'; MAX_LINE_LEN + 5];
        input.push(b'\n');
        let mut channel = Channel::new(Scripted::new(&input));

        let head = channel.read_line().unwrap();
        assert_eq!(head.len(), MAX_LINE_LEN);
        assert_eq!(head.end(), LineEnd::BufferFull);

        let tail = channel.read_line().unwrap();
        assert_eq!(tail.as_bytes(), b"xxxxx");
        assert_eq!(tail.end(), LineEnd::Newline);
    }

    #[test]
    fn test_read_line_invalid_utf8_is_protocol_violation() {
        let mut channel = Channel::new(Scripted::new(b"OK:\xff\n"));
        let line = channel.read_line().unwrap();
        assert!(line.as_str().unwrap_err().is_protocol_violation());
    }

    #[test]
    fn test_read_after_peer_close_is_empty_eof() {
        let (local, peer) = UnixStream::pair().unwrap();
        drop(peer);
        let mut channel = Channel::new(local);
        let line = channel.read_line().unwrap();
        assert!(line.is_empty());
        assert_eq!(line.end(), LineEnd::Eof);
    }

    #[test]
    fn test_write_after_peer_close_is_transport_failure() {
        let (local, peer) = UnixStream::pair().unwrap();
        drop(peer);
        let mut channel = Channel::new(local);
        let err = channel.write_line("get:state").unwrap_err();
        assert!(matches!(err, GaoError::Transport(_)));
    }
}
