// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io::{self, BufRead, Write};

use thiserror::Error;

/// Failures of the framing layer itself. These are deliberately a
/// different type from JSON parse failures: a frame that arrives intact
/// but carries garbage JSON gets a -32700 response, while a stream that
/// loses framing cannot be answered at all.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame header: {0:?}")]
    MalformedHeader(String),
    #[error("frame has no Content-Length header")]
    MissingContentLength,
    #[error("invalid Content-Length value: {0:?}")]
    BadContentLength(String),
    #[error("stream closed mid-frame")]
    Truncated,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Reads one frame off the stream and returns its payload bytes.
///
/// Returns Ok(None) when the stream closes cleanly at a frame
/// boundary. Closing anywhere else is a `Truncated` error.
///
/// The header block is a sequence of CRLF-terminated `Name: value`
/// lines ending with an empty line. `Content-Length` is matched
/// case-insensitively and is the only header we act on; the rest are
/// read and ignored. The announced length is a byte count, not a
/// character count.
pub fn read_frame(inp: &mut dyn BufRead) -> Result<Option<Vec<u8>>, FrameError> {
    let mut length = None;
    let mut line = String::new();
    let mut at_boundary = true;

    loop {
        line.clear();
        if inp.read_line(&mut line)? == 0 {
            return if at_boundary { Ok(None) } else { Err(FrameError::Truncated) };
        }
        at_boundary = false;

        if !line.ends_with("\r\n") {
            return Err(FrameError::MalformedHeader(line.clone()));
        }
        let header = &line[..line.len() - 2];
        if header.is_empty() {
            break;
        }

        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| FrameError::MalformedHeader(String::from(header)))?;
        if name.eq_ignore_ascii_case("content-length") {
            let value = value.trim();
            length = Some(
                value
                    .parse::<usize>()
                    .map_err(|_| FrameError::BadContentLength(String::from(value)))?,
            );
        }
    }

    let length = length.ok_or(FrameError::MissingContentLength)?;
    let mut payload = vec![0u8; length];
    inp.read_exact(&mut payload).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            FrameError::Truncated
        } else {
            FrameError::from(e)
        }
    })?;

    Ok(Some(payload))
}

/// Writes one frame and flushes, so the paired reader on the other side
/// of the stream sees the whole message at once.
pub fn write_frame(out: &mut dyn Write, payload: &[u8]) -> io::Result<()> {
    write!(out, "Content-Length: {}\r\n\r\n", payload.len())?;
    out.write_all(payload)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn read_all(bytes: &[u8]) -> Result<Option<Vec<u8>>, FrameError> {
        let mut cursor = Cursor::new(bytes.to_vec());
        read_frame(&mut cursor)
    }

    #[test]
    fn round_trip() {
        let payload = br#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
        let mut wire: Vec<u8> = Vec::new();
        write_frame(&mut wire, payload).unwrap();

        let got = read_all(&wire).unwrap().unwrap();
        assert_eq!(got, payload);
    }

    #[test]
    fn clean_eof_at_boundary() {
        assert!(matches!(read_all(b""), Ok(None)));
    }

    #[test]
    fn eof_inside_headers_is_truncation() {
        assert!(matches!(
            read_all(b"Content-Length: 10\r\n"),
            Err(FrameError::Truncated)
        ));
    }

    #[test]
    fn extra_headers_are_ignored() {
        let wire = b"Content-Type: application/json\r\nContent-Length: 2\r\nX-Extra: 1\r\n\r\n{}";
        let got = read_all(wire).unwrap().unwrap();
        assert_eq!(got, b"{}");
    }

    #[test]
    fn header_name_is_case_insensitive() {
        let wire = b"content-length: 2\r\n\r\n{}";
        let got = read_all(wire).unwrap().unwrap();
        assert_eq!(got, b"{}");
    }

    #[test]
    fn length_counts_bytes_not_characters() {
        // U+1F600 is one character but four bytes of UTF-8.
        let payload = "\"\u{1F600}\"";
        assert_eq!(payload.len(), 6);
        let wire = format!("Content-Length: 6\r\n\r\n{payload}");
        let got = read_all(wire.as_bytes()).unwrap().unwrap();
        assert_eq!(got, payload.as_bytes());
    }

    #[test]
    fn missing_length_header_is_a_framing_error() {
        assert!(matches!(
            read_all(b"X-Whatever: 3\r\n\r\n{}"),
            Err(FrameError::MissingContentLength)
        ));
    }

    #[test]
    fn short_payload_is_a_framing_error() {
        assert!(matches!(
            read_all(b"Content-Length: 10\r\n\r\n{}"),
            Err(FrameError::Truncated)
        ));
    }

    #[test]
    fn garbage_length_is_a_framing_error() {
        assert!(matches!(
            read_all(b"Content-Length: ten\r\n\r\n{}"),
            Err(FrameError::BadContentLength(_))
        ));
    }

    #[test]
    fn bare_lf_header_is_malformed() {
        assert!(matches!(
            read_all(b"Content-Length: 2\n\n{}"),
            Err(FrameError::MalformedHeader(_))
        ));
    }

    #[test]
    fn two_frames_back_to_back() {
        let mut wire: Vec<u8> = Vec::new();
        write_frame(&mut wire, b"{}").unwrap();
        write_frame(&mut wire, b"[1]").unwrap();

        let mut cursor = Cursor::new(wire);
        assert_eq!(read_frame(&mut cursor).unwrap().unwrap(), b"{}");
        assert_eq!(read_frame(&mut cursor).unwrap().unwrap(), b"[1]");
        assert!(matches!(read_frame(&mut cursor), Ok(None)));
    }
}
