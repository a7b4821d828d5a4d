//! Write sink for streamed response bodies.
//!
//! Appends chunks up to a hard byte cap while validating UTF-8 as bytes
//! arrive. When the cap is reached the transfer is aborted; the captured
//! buffer is then cut back to the last complete `</item>` or `</entry>` so
//! the parser never sees a half item.

use bytes::BytesMut;

use super::utf8::Utf8Validator;
use crate::app::{HysError, Result};

#[derive(Debug, PartialEq, Eq)]
pub enum SinkPush {
    /// Keep streaming.
    More,
    /// Cap reached, abort the transfer.
    Done,
}

pub struct BodySink {
    buf: BytesMut,
    max_bytes: usize,
    validator: Utf8Validator,
    truncated: bool,
}

impl BodySink {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_bytes,
            validator: Utf8Validator::new(),
            truncated: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<SinkPush> {
        if self.truncated {
            return Ok(SinkPush::Done);
        }
        let remaining = self.max_bytes.saturating_sub(self.buf.len());
        let keep = &chunk[..chunk.len().min(remaining)];
        if !self.validator.push(keep) {
            return Err(HysError::InvalidUtf8);
        }
        self.buf.extend_from_slice(keep);
        if keep.len() < chunk.len() {
            self.truncated = true;
            return Ok(SinkPush::Done);
        }
        Ok(SinkPush::More)
    }

    /// Finalizes the body. A capped transfer succeeds as long as at least
    /// one complete item boundary survived the cut.
    pub fn finish(self) -> Result<(String, bool)> {
        if self.truncated {
            let end = last_item_boundary(&self.buf).ok_or(HysError::FileTooLarge)?;
            let body =
                String::from_utf8(self.buf[..end].to_vec()).map_err(|_| HysError::InvalidUtf8)?;
            return Ok((body, true));
        }
        if !self.validator.finish() {
            return Err(HysError::InvalidUtf8);
        }
        let body = String::from_utf8(self.buf.to_vec()).map_err(|_| HysError::InvalidUtf8)?;
        Ok((body, false))
    }
}

/// Byte offset just past the last complete `</item>` or `</entry>` tag.
fn last_item_boundary(buf: &[u8]) -> Option<usize> {
    let item = rfind_ignore_case(buf, b"</item>").map(|i| i + b"</item>".len());
    let entry = rfind_ignore_case(buf, b"</entry>").map(|i| i + b"</entry>".len());
    item.max(entry)
}

fn rfind_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: usize) -> String {
        format!("<item><title>Item {n}</title><guid>g{n}</guid></item>")
    }

    #[test]
    fn test_small_body_untruncated() {
        let mut sink = BodySink::new(1024);
        assert_eq!(sink.push(b"<rss><channel>").unwrap(), SinkPush::More);
        assert_eq!(sink.push(item(1).as_bytes()).unwrap(), SinkPush::More);
        let (body, truncated) = sink.finish().unwrap();
        assert!(!truncated);
        assert!(body.contains("Item 1"));
    }

    #[test]
    fn test_cap_truncates_at_item_boundary() {
        let mut body = String::from("<rss><channel>");
        for n in 0..100 {
            body.push_str(&item(n));
        }
        let cap = 2048;
        let mut sink = BodySink::new(cap);
        for chunk in body.as_bytes().chunks(512) {
            if sink.push(chunk).unwrap() == SinkPush::Done {
                break;
            }
        }
        let (kept, truncated) = sink.finish().unwrap();
        assert!(truncated);
        assert!(kept.len() <= cap);
        assert!(kept.ends_with("</item>"));
    }

    #[test]
    fn test_cap_without_item_boundary_is_too_large() {
        let mut sink = BodySink::new(16);
        let result = sink.push(b"<rss><channel><title>long title here</title>");
        assert_eq!(result.unwrap(), SinkPush::Done);
        assert!(matches!(sink.finish(), Err(HysError::FileTooLarge)));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut sink = BodySink::new(1024);
        assert!(matches!(
            sink.push(b"<rss>\xff<channel>"),
            Err(HysError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_multibyte_split_across_chunks_ok() {
        let mut sink = BodySink::new(1024);
        sink.push(b"<rss><item><title>caf\xc3").unwrap();
        sink.push(b"\xa9</title></item>").unwrap();
        let (body, _) = sink.finish().unwrap();
        assert!(body.contains("caf\u{e9}"));
    }

    #[test]
    fn test_stream_ending_mid_char_is_invalid() {
        let mut sink = BodySink::new(1024);
        sink.push(b"<rss>caf\xc3").unwrap();
        assert!(matches!(sink.finish(), Err(HysError::InvalidUtf8)));
    }

    #[test]
    fn test_entry_boundary_recognized() {
        let body = b"<feed><entry><id>1</id></entry><entry><id>2";
        let mut sink = BodySink::new(body.len().saturating_sub(1));
        for chunk in body.chunks(8) {
            if sink.push(chunk).unwrap() == SinkPush::Done {
                break;
            }
        }
        let (kept, truncated) = sink.finish().unwrap();
        assert!(truncated);
        assert!(kept.ends_with("</entry>"));
    }
}
