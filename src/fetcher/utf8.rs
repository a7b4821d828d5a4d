//! Streaming UTF-8 validation.
//!
//! Response bodies arrive in arbitrary chunks, so a multi-byte sequence can
//! straddle a chunk boundary. The validator carries the incomplete tail of
//! one chunk into the next; only a sequence that can never become valid
//! fails the stream.

#[derive(Debug, Default)]
pub struct Utf8Validator {
    carry: Vec<u8>,
}

impl Utf8Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk. Returns false as soon as the stream is known to be
    /// invalid UTF-8.
    pub fn push(&mut self, mut chunk: &[u8]) -> bool {
        if !self.carry.is_empty() {
            let expected = sequence_len(self.carry[0]);
            while self.carry.len() < expected && !chunk.is_empty() {
                self.carry.push(chunk[0]);
                chunk = &chunk[1..];
            }
            if self.carry.len() < expected {
                return true;
            }
            if std::str::from_utf8(&self.carry).is_err() {
                return false;
            }
            self.carry.clear();
        }
        match std::str::from_utf8(chunk) {
            Ok(_) => true,
            Err(err) => {
                if err.error_len().is_some() {
                    return false;
                }
                // Incomplete trailing sequence, at most 3 bytes.
                self.carry.extend_from_slice(&chunk[err.valid_up_to()..]);
                true
            }
        }
    }

    /// True when the stream ended on a character boundary.
    pub fn finish(&self) -> bool {
        self.carry.is_empty()
    }
}

fn sequence_len(lead: u8) -> usize {
    match lead {
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}
