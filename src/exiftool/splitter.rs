//! Stream tokenizers for the coprocess's stdout.
//!
//! Two [`Decoder`] implementations frame the bytes the tool writes between
//! ready-markers:
//!
//! - [`ReadyTokenCodec`] (buffered mode) emits everything up to the marker
//!   as one token per command.
//! - [`ObjectCodec`] (streamed mode) recognises the tool's human-readable
//!   record format and emits one token per object, plus the trailing
//!   report line, finishing with a marker-terminated final token.

use crate::error::Error;
use crate::exiftool::READY_MARKER;
use bytes::{Buf, Bytes, BytesMut};
use regex::bytes::Regex;
use std::sync::OnceLock;
use tokio_util::codec::Decoder;

/// A record header: `======== ./path/to/file` on its own line.
const RECORD_PREFIX: &[u8] = b"======== ";

/// Terminal report line, e.g. `    3 image files read`.
fn report_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n+\s+").expect("report pattern"))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// One buffered-mode frame: the bytes of a whole command response.
#[derive(Debug)]
pub struct ReadyFrame {
    /// Response bytes, excluding the marker.
    pub bytes: Bytes,
    /// True when the frame is a tail emitted at end of stream, meaning the
    /// child went away before echoing the marker.
    pub eof: bool,
}

/// Frames stdout on the ready-marker: the token is everything before the
/// marker, and the stream advances past the newline that follows it.
#[derive(Debug, Default)]
pub struct ReadyTokenCodec;

impl Decoder for ReadyTokenCodec {
    type Item = ReadyFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ReadyFrame>, Error> {
        let Some(marker) = find(src, READY_MARKER.as_bytes()) else {
            return Ok(None);
        };
        let Some(newline) = src[marker..].iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let bytes = src.split_to(marker).freeze();
        src.advance(newline + 1);
        Ok(Some(ReadyFrame { bytes, eof: false }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<ReadyFrame>, Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let bytes = src.split_to(src.len()).freeze();
        Ok(Some(ReadyFrame { bytes, eof: true }))
    }
}

/// One streamed-mode token.
#[derive(Debug, PartialEq, Eq)]
pub struct ObjectFrame {
    /// Token text. Empty for a blank marker-terminated tail.
    pub text: String,
    /// True for the marker-terminated final token of a response.
    pub last: bool,
}

/// Frames stdout into per-object tokens.
///
/// A complete record (up to the next record header or the report line) is
/// emitted as soon as it is available, even when the ready-marker is
/// already buffered behind it; the marker then terminates the response
/// with a final token. Content after the marker belongs to the next
/// response and is never consumed early.
#[derive(Debug, Default)]
pub struct ObjectCodec;

fn frame_text(token: &[u8]) -> String {
    String::from_utf8_lossy(token)
        .trim_start_matches('\n')
        .trim_end()
        .to_string()
}

impl Decoder for ObjectCodec {
    type Item = ObjectFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ObjectFrame>, Error> {
        let marker = find(src, READY_MARKER.as_bytes());

        if let Some(start) = find(src, RECORD_PREFIX) {
            if marker.map_or(true, |m| start < m) {
                let after = start + RECORD_PREFIX.len();

                // complete record delimited by the next record header
                if let Some(next) = find(&src[after..], RECORD_PREFIX) {
                    let cut = after + next;
                    if marker.map_or(true, |m| cut <= m) {
                        let token = src.split_to(cut);
                        return Ok(Some(ObjectFrame {
                            text: frame_text(&token),
                            last: false,
                        }));
                    }
                }

                // record delimited by the report line
                if let Some(found) = report_pattern().find(&src[after..]) {
                    let cut = after + found.start();
                    if marker.map_or(true, |m| cut <= m) {
                        let token = src.split_to(cut);
                        return Ok(Some(ObjectFrame {
                            text: frame_text(&token),
                            last: false,
                        }));
                    }
                }
            }
        }

        if let Some(m) = marker {
            let token = src.split_to(m);
            src.advance(READY_MARKER.len());
            return Ok(Some(ObjectFrame {
                text: frame_text(&token),
                last: true,
            }));
        }

        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<ObjectFrame>, Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let token = src.split_to(src.len());
        Ok(Some(ObjectFrame {
            text: frame_text(&token),
            last: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker() -> String {
        READY_MARKER.to_string()
    }

    /// Run the codec over a fully buffered input.
    fn collect(input: &str) -> (Vec<String>, bool) {
        let mut codec = ObjectCodec;
        let mut buf = BytesMut::from(input.as_bytes());
        let mut tokens = Vec::new();
        let mut last = false;
        while let Some(frame) = codec.decode(&mut buf).unwrap() {
            if !frame.text.is_empty() {
                tokens.push(frame.text);
            }
            if frame.last {
                last = true;
                break;
            }
        }
        (tokens, last)
    }

    /// Run the codec the way a pipe delivers data: one byte at a time.
    fn collect_incremental(input: &str) -> (Vec<String>, bool) {
        let mut codec = ObjectCodec;
        let mut buf = BytesMut::new();
        let mut tokens = Vec::new();
        let mut last = false;
        for &b in input.as_bytes() {
            buf.extend_from_slice(&[b]);
            while let Some(frame) = codec.decode(&mut buf).unwrap() {
                if !frame.text.is_empty() {
                    tokens.push(frame.text);
                }
                if frame.last {
                    last = true;
                }
            }
            if last {
                break;
            }
        }
        (tokens, last)
    }

    #[test]
    fn test_two_objects_and_report() {
        let input = format!(
            "======== ./a.JPG\nMIME Type : image/jpeg\n\
             ======== ./b.JPG\nMIME Type : image/jpeg\n\
             \x20\x20\x20\x202 image files read\n{}",
            marker()
        );
        let expected = vec![
            "======== ./a.JPG\nMIME Type : image/jpeg".to_string(),
            "======== ./b.JPG\nMIME Type : image/jpeg".to_string(),
            "    2 image files read".to_string(),
        ];

        let (tokens, last) = collect(&input);
        assert_eq!(tokens, expected);
        assert!(last);

        let (tokens, last) = collect_incremental(&input);
        assert_eq!(tokens, expected);
        assert!(last);
    }

    #[test]
    fn test_single_object_without_report() {
        let input = format!("======== ./a.JPG\nMIME Type : image/jpeg\n{}", marker());
        let (tokens, last) = collect(&input);
        assert_eq!(tokens, vec!["======== ./a.JPG\nMIME Type : image/jpeg"]);
        assert!(last);
    }

    #[test]
    fn test_object_then_report() {
        let input = format!(
            "======== ./a.JPG\nMIME Type : image/jpeg\n    1 image file read\n{}",
            marker()
        );
        let (tokens, last) = collect(&input);
        assert_eq!(
            tokens,
            vec![
                "======== ./a.JPG\nMIME Type : image/jpeg",
                "    1 image file read"
            ]
        );
        assert!(last);
    }

    #[test]
    fn test_only_report() {
        let input = format!("    1 image file read\n{}", marker());
        let (tokens, last) = collect(&input);
        assert_eq!(tokens, vec!["    1 image file read"]);
        assert!(last);
    }

    #[test]
    fn test_no_objects_or_reports() {
        let input = format!("random data{}", marker());
        let (tokens, last) = collect(&input);
        assert_eq!(tokens, vec!["random data"]);
        assert!(last);
    }

    #[test]
    fn test_blank_response_suppressed() {
        let input = format!("\n\n{}", marker());
        let (tokens, last) = collect(&input);
        assert!(tokens.is_empty());
        assert!(last);
    }

    #[test]
    fn test_record_after_marker_not_consumed_early() {
        let input = format!(
            "======== ./a.JPG\nMIME Type : image/jpeg\n{}\n======== ./next.JPG\n",
            marker()
        );
        let mut codec = ObjectCodec;
        let mut buf = BytesMut::from(input.as_bytes());

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.text, "======== ./a.JPG\nMIME Type : image/jpeg");
        assert!(first.last);
        // the next response's header is still buffered
        assert!(find(&buf, RECORD_PREFIX).is_some());
    }

    #[test]
    fn test_ready_token_frames_one_command() {
        let mut codec = ReadyTokenCodec;
        let mut buf = BytesMut::from(format!("13.10\n{}\n", marker()).as_bytes());

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame.bytes[..], b"13.10\n");
        assert!(!frame.eof);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_ready_token_waits_for_newline() {
        let mut codec = ReadyTokenCodec;
        let mut buf = BytesMut::from(format!("out\n{}", marker()).as_bytes());
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame.bytes[..], b"out\n");
    }

    #[test]
    fn test_ready_token_eof_tail() {
        let mut codec = ReadyTokenCodec;
        let mut buf = BytesMut::from(&b"partial output"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        let frame = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(&frame.bytes[..], b"partial output");
        assert!(frame.eof);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }
}
