//! Newline-delimited codec for tokio transports.
//!
//! Used on both sides of the relay: server sockets (`\r\n`) and worker pipes
//! (`\n`). Decoded items have their terminator stripped; encoded items are
//! written verbatim, so callers supply their own terminator.
//!
//! A line that is too long or not UTF-8 does not end the stream. It is
//! yielded as an `Err` item and decoding carries on with the next line;
//! only transport I/O errors are fatal.

use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::LineError;

/// Default limit, generous enough for servers that send long lines.
pub const DEFAULT_MAX_LEN: usize = 4096;

/// One decoded item: a line, or the reason one was dropped.
pub type Decoded = Result<String, LineError>;

/// Line-based codec that handles newline-terminated messages.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length, terminator included
    max_len: usize,
    /// Skipping the tail of an over-long line
    discarding: bool,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    /// Codec with [`DEFAULT_MAX_LEN`].
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LEN)
    }

    /// Codec with a custom max line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }

    /// Configured limit.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Decoder for LineCodec {
    type Item = Decoded;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Decoded>, io::Error> {
        loop {
            let newline = src[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            if self.discarding {
                self.next_index = 0;
                match newline {
                    Some(end) => {
                        src.advance(end + 1);
                        self.discarding = false;
                        continue;
                    }
                    None => {
                        src.clear();
                        return Ok(None);
                    }
                }
            }

            let Some(end) = newline else {
                if src.len() > self.max_len {
                    // Report once, then drop bytes up to the next newline.
                    let actual = src.len();
                    src.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Ok(Some(Err(LineError::TooLong {
                        actual,
                        limit: self.max_len,
                    })));
                }
                // No complete line yet - remember where we stopped
                self.next_index = src.len();
                return Ok(None);
            };

            let line = src.split_to(end + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Ok(Some(Err(LineError::TooLong {
                    actual: line.len(),
                    limit: self.max_len,
                })));
            }

            let decoded = match String::from_utf8(line.to_vec()) {
                Ok(mut data) => {
                    let trimmed = data.trim_end_matches(['\r', '\n']).len();
                    data.truncate(trimmed);
                    Ok(data)
                }
                Err(e) => Err(LineError::InvalidUtf8 {
                    byte_pos: e.utf8_error().valid_up_to(),
                }),
            };
            return Ok(Some(decoded));
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.extend_from_slice(msg.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(codec: &mut LineCodec, buf: &mut BytesMut) -> Option<Decoded> {
        codec.decode(buf).unwrap()
    }

    #[test]
    fn test_decode_strips_terminator() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :test\r\nS1 JOIN #a\n");

        assert_eq!(line(&mut codec, &mut buf), Some(Ok("PING :test".to_string())));
        assert_eq!(line(&mut codec, &mut buf), Some(Ok("S1 JOIN #a".to_string())));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_partial_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :");

        assert_eq!(line(&mut codec, &mut buf), None);
        buf.extend_from_slice(b"abc\r\n");
        assert_eq!(line(&mut codec, &mut buf), Some(Ok("PING :abc".to_string())));
    }

    #[test]
    fn test_complete_long_line_skipped() {
        let mut codec = LineCodec::with_max_len(10);
        let mut buf = BytesMut::from("this is way too long\nok\n");
        assert!(matches!(
            line(&mut codec, &mut buf),
            Some(Err(LineError::TooLong { limit: 10, .. }))
        ));
        assert_eq!(line(&mut codec, &mut buf), Some(Ok("ok".to_string())));
    }

    #[test]
    fn test_partial_long_line_discarded_until_newline() {
        let mut codec = LineCodec::with_max_len(10);
        let mut buf = BytesMut::from("no newline yet but long");
        assert!(matches!(
            line(&mut codec, &mut buf),
            Some(Err(LineError::TooLong { actual: 23, limit: 10 }))
        ));
        assert!(buf.is_empty());

        buf.extend_from_slice(b"still the same line");
        assert_eq!(line(&mut codec, &mut buf), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b" end\r\nnext\r\n");
        assert_eq!(line(&mut codec, &mut buf), Some(Ok("next".to_string())));
        assert_eq!(line(&mut codec, &mut buf), None);
    }

    #[test]
    fn test_invalid_utf8_line_skipped() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b":a!b@c PRIVMSG #c :caf\xe9\r\nPING :after\r\n"[..]);
        assert_eq!(
            line(&mut codec, &mut buf),
            Some(Err(LineError::InvalidUtf8 { byte_pos: 22 }))
        );
        assert_eq!(line(&mut codec, &mut buf), Some(Ok("PING :after".to_string())));
    }

    #[test]
    fn test_encode_verbatim() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        codec.encode("PONG :test\r\n".to_string(), &mut buf).unwrap();
        codec.encode("S1 x\n".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"PONG :test\r\nS1 x\n");
    }
}
