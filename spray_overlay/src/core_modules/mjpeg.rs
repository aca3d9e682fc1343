// THEORY:
// An MJPEG feed is an endless `multipart/x-mixed-replace` HTTP body: a boundary
// line, a small header block, one JPEG, repeat. Network chunks bear no relation to
// part boundaries, so the `MjpegSplitter` buffers bytes and yields only whole
// parts.
//
// Key architectural principles:
// 1.  **Length First**: When a part declares `Content-Length` we trust it and never
//     scan the JPEG payload for the boundary.
// 2.  **Boundary Fallback**: Without a length (the common case for small embedded
//     servers) the body runs until the next delimiter, minus the CRLF before it.
// 3.  **Bounded Memory**: Bytes before the first delimiter are discarded, and when
//     no delimiter is in sight only a delimiter-sized tail is retained. A part
//     whose headers or body outgrow `max_part` is dropped and the splitter resyncs
//     on the next delimiter.
// 4.  **Linear Scanning**: A partially received part remembers how far it has been
//     searched, so every byte is scanned once no matter how it is chunked.

use bytes::{Buf, Bytes, BytesMut};
use tracing::warn;

use crate::error::StreamError;

const HEADER_END: &[u8] = b"\r\n\r\n";

/// Largest header block or JPEG accepted in one part.
pub const DEFAULT_MAX_PART: usize = 16 * 1024 * 1024;

/// Headers of the part at the front of the buffer, once they are complete.
#[derive(Debug, Clone, Copy)]
struct PartHeader {
    body_start: usize,
    content_length: Option<usize>,
}

pub struct MjpegSplitter {
    delimiter: Vec<u8>,
    buffer: BytesMut,
    header: Option<PartHeader>,
    // Where the next search for the header end or the closing delimiter resumes.
    scanned: usize,
    max_part: usize,
}

impl MjpegSplitter {
    pub fn new(boundary: &str) -> Self {
        let mut delimiter = b"--".to_vec();
        delimiter.extend_from_slice(boundary.as_bytes());
        Self {
            delimiter,
            buffer: BytesMut::with_capacity(64 * 1024),
            header: None,
            scanned: 0,
            max_part: DEFAULT_MAX_PART,
        }
    }

    pub fn with_max_part(mut self, max_part: usize) -> Self {
        self.max_part = max_part.max(1);
        self
    }

    /// Builds a splitter from a response `Content-Type` header value such as
    /// `multipart/x-mixed-replace; boundary=frame`.
    pub fn from_content_type(content_type: &str) -> Result<Self, StreamError> {
        let mut params = content_type.split(';').map(str::trim);
        let mime = params.next().unwrap_or_default();
        if !mime.to_ascii_lowercase().starts_with("multipart/") {
            return Err(StreamError::NotMultipart(content_type.to_string()));
        }

        let boundary = params
            .filter_map(|p| p.split_once('='))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
            .map(|(_, v)| v.trim().trim_matches('"'))
            .filter(|b| !b.is_empty())
            .ok_or(StreamError::MissingBoundary)?;

        Ok(Self::new(boundary))
    }

    /// Bytes held back waiting for the rest of a part.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feeds a network chunk and returns every part it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);
        let mut parts = Vec::new();
        while let Some(part) = self.next_part() {
            parts.push(part);
        }
        parts
    }

    fn next_part(&mut self) -> Option<Bytes> {
        loop {
            let header = match self.header {
                Some(header) => header,
                None => {
                    // --- 1. Align the buffer on a delimiter ---
                    if !self.align() {
                        return None;
                    }

                    // --- 2. Headers ---
                    let from = self.scanned.max(self.delimiter.len());
                    let Some(header_end) = find(&self.buffer, HEADER_END, from) else {
                        if self.buffer.len() > self.max_part {
                            warn!(bytes = self.buffer.len(), "mjpeg part headers too long, resyncing");
                            self.resync();
                            continue;
                        }
                        self.scanned = self.buffer.len().saturating_sub(HEADER_END.len() - 1).max(from);
                        return None;
                    };
                    let header = PartHeader {
                        body_start: header_end + HEADER_END.len(),
                        content_length: parse_content_length(&self.buffer[self.delimiter.len()..header_end]),
                    };
                    if header.content_length.is_some_and(|length| length > self.max_part) {
                        warn!(length = ?header.content_length, "mjpeg part too large, resyncing");
                        self.resync();
                        continue;
                    }
                    self.header = Some(header);
                    self.scanned = header.body_start;
                    header
                }
            };

            // --- 3. Body ---
            match header.content_length {
                Some(length) => {
                    let end = header.body_start.checked_add(length)?;
                    if self.buffer.len() < end {
                        return None;
                    }
                    self.buffer.advance(header.body_start);
                    let body = self.buffer.split_to(length).freeze();
                    self.finish_part();
                    return Some(body);
                }
                None => {
                    let from = self.scanned.max(header.body_start);
                    let Some(next) = find(&self.buffer, &self.delimiter, from) else {
                        if self.buffer.len() - header.body_start > self.max_part {
                            warn!(bytes = self.buffer.len(), "mjpeg part exceeds size limit, resyncing");
                            self.resync();
                            continue;
                        }
                        self.scanned = self.buffer.len().saturating_sub(self.delimiter.len() - 1).max(from);
                        return None;
                    };
                    let mut body_end = next;
                    if self.buffer[header.body_start..body_end].ends_with(b"\r\n") {
                        body_end -= 2;
                    }
                    let body = Bytes::copy_from_slice(&self.buffer[header.body_start..body_end]);
                    self.buffer.advance(next);
                    self.finish_part();
                    return Some(body);
                }
            }
        }
    }

    /// Moves the buffer to the first delimiter. Without one, keeps only a tail
    /// that might be the start of a delimiter and reports `false`.
    fn align(&mut self) -> bool {
        match find(&self.buffer, &self.delimiter, 0) {
            Some(start) => {
                if start > 0 {
                    self.buffer.advance(start);
                    self.scanned = 0;
                }
                true
            }
            None => {
                let keep = self.delimiter.len().saturating_sub(1);
                if self.buffer.len() > keep {
                    let excess = self.buffer.len() - keep;
                    self.buffer.advance(excess);
                }
                self.scanned = 0;
                false
            }
        }
    }

    /// Abandons the part at the front of the buffer.
    fn resync(&mut self) {
        let skip = self.delimiter.len().min(self.buffer.len());
        self.buffer.advance(skip);
        self.finish_part();
    }

    fn finish_part(&mut self) {
        self.header = None;
        self.scanned = 0;
    }
}

fn parse_content_length(headers: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(headers).ok()?;
    text.split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
