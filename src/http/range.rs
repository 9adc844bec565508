//! `Range: bytes=...` parsing for file downloads.

/// An inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value of the `Content-Range` header.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Parse a single-range `Range` header against a file of `size` bytes.
///
/// Returns `None` for anything that should be answered with the full file:
/// missing unit, multiple ranges, unsatisfiable or malformed ranges.
pub fn parse_range(header: &str, size: u64) -> Option<ByteRange> {
    let spec = header.trim().strip_prefix("bytes=")?;
    if size == 0 || spec.contains(',') {
        return None;
    }

    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    let range = match (start.is_empty(), end.is_empty()) {
        (true, true) => return None,
        // Suffix form: the last N bytes.
        (true, false) => {
            let suffix: u64 = end.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            ByteRange {
                start: size.saturating_sub(suffix),
                end: size - 1,
            }
        }
        (false, true) => ByteRange {
            start: start.parse().ok()?,
            end: size - 1,
        },
        (false, false) => ByteRange {
            start: start.parse().ok()?,
            end: end.parse::<u64>().ok()?.min(size - 1),
        },
    };

    if range.start > range.end || range.start >= size {
        return None;
    }
    Some(range)
}
