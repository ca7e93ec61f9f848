//! Line-based codec for tokio.
//!
//! Reads and writes CRLF-terminated lines. Decoding is tolerant: a bare LF
//! also terminates a line, trailing CR and NUL bytes are stripped (some
//! clients pad their writes with NULs), and empty input segments decode to
//! empty strings the reader can skip.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Maximum accepted line length in bytes, matching the read buffer the wire
/// protocol was designed around.
pub const MAX_LINE: usize = 1400;

/// Codec splitting the byte stream on line terminators.
pub struct LineCodec {
    /// Index of the next byte to check for a newline.
    next_index: usize,
    /// Maximum line length.
    max_len: usize,
}

impl LineCodec {
    /// Create a codec with a custom maximum line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::with_max_len(MAX_LINE)
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        // Look for a newline starting from where we left off.
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Err(ProtocolError::LineTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                });
            }

            let mut data = String::from_utf8(line.to_vec())?;
            // Strip the terminator and any NUL padding.
            while data.ends_with(['\n', '\r', '\0']) {
                data.pop();
            }
            Ok(Some(data))
        } else if src.len() > self.max_len {
            Err(ProtocolError::LineTooLong {
                actual: src.len(),
                limit: self.max_len,
            })
        } else {
            // No full line yet; remember where to resume scanning.
            self.next_index = src.len();
            Ok(None)
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut LineCodec, buf: &mut BytesMut) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = codec.decode(buf).expect("decode") {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn splits_on_crlf() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"NICK anna\r\nUSER anna 0 * :Anna\r\n"[..]);
        let lines = decode_all(&mut codec, &mut buf);
        assert_eq!(lines, vec!["NICK anna", "USER anna 0 * :Anna"]);
    }

    #[test]
    fn buffers_partial_lines() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"PRIVMSG #test "[..]);
        assert!(codec.decode(&mut buf).expect("decode").is_none());

        buf.extend_from_slice(b":hello\r\n");
        assert_eq!(
            codec.decode(&mut buf).expect("decode"),
            Some("PRIVMSG #test :hello".to_string())
        );
    }

    #[test]
    fn strips_nul_padding() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"PING :tok\0\0\r\n"[..]);
        // NULs arrive before the terminator when a client pads a fixed buffer.
        let mut padded = BytesMut::from(&b"QUIT\r\n\0\0"[..]);

        assert_eq!(
            codec.decode(&mut buf).expect("decode"),
            Some("PING :tok".to_string())
        );
        assert_eq!(
            codec.decode(&mut padded).expect("decode"),
            Some("QUIT".to_string())
        );
    }

    #[test]
    fn rejects_oversize_lines() {
        let mut codec = LineCodec::with_max_len(16);
        let mut buf = BytesMut::from(&b"PRIVMSG #test :aaaaaaaaaaaaaaaaaaaa\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::LineTooLong { .. })
        ));
    }

    #[test]
    fn encode_appends_crlf() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(":irc.test 001 anna :Welcome".to_string(), &mut buf)
            .expect("encode");
        assert_eq!(&buf[..], b":irc.test 001 anna :Welcome\r\n");
    }
}
