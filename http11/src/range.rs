//! A single byte-range (RFC 7233), as parsed out of a `Range:` request
//! header (`bytes=start-end`, either side optional; a missing `start` with
//! a negative `end` means "last `end` bytes").

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    pub start: Option<u64>,
    pub end: Option<i64>,
}

impl Range {
    /// Parse one `start-end` token (already split off the `bytes=` prefix
    /// and any surrounding commas).
    pub fn parse(start: &str, end: &str) -> Option<Range> {
        if start.is_empty() && end.is_empty() {
            return None;
        }
        let start = if start.is_empty() {
            None
        } else {
            Some(start.parse().ok()?)
        };
        let mut end: Option<i64> = if end.is_empty() {
            None
        } else {
            Some(end.parse().ok()?)
        };
        if start.is_none() {
            if let Some(e) = end {
                if e > 0 {
                    end = Some(-e);
                }
            }
        }
        Some(Range { start, end })
    }

    /// The `start-end` fragment for a `Range:` request header.
    pub fn header(&self) -> String {
        let mut s = String::new();
        if let Some(start) = self.start {
            s.push_str(&start.to_string());
        }
        s.push('-');
        if let Some(end) = self.end {
            s.push_str(&end.to_string());
        }
        s
    }

    /// Resolve this range against a known content length, clamping `end`
    /// to not precede `start`.
    pub fn absolutes(&self, content_len: u64) -> (u64, u64) {
        let clen = content_len as i64;
        let start = match self.start {
            Some(s) => s as i64,
            None => match self.end {
                Some(e) if e < 0 => clen + e,
                _ => 0,
            },
        };
        let mut end = clen;
        if let Some(e) = self.end {
            end = if e < 0 { clen + e - 1 } else { e };
        }
        if end < start {
            end = start;
        }
        (start.max(0) as u64, end.max(0) as u64)
    }

    /// The `Content-Range: bytes start-end/total` value.
    pub fn absolute_range(&self, content_len: u64) -> String {
        let (start, end) = self.absolutes(content_len);
        format!("{}-{}/{}", start, end, content_len)
    }

    /// True if this range cannot be satisfied against `content_len`.
    pub fn is_unsatisfiable(&self, content_len: u64) -> bool {
        if content_len == 0 {
            return true;
        }
        let (start, end) = self.absolutes(content_len);
        start >= content_len || (start > 0 && end >= content_len)
    }
}

/// Parse the value of a `Range:` header (`bytes=0-99,200-`) into individual
/// ranges, ignoring the unit prefix and any malformed tokens.
pub fn parse_header(value: &str) -> Vec<Range> {
    let value = match value.strip_prefix("bytes=") {
        Some(v) => v,
        None => return Vec::new(),
    };
    value
        .split(',')
        .filter_map(|token| {
            let token = token.trim();
            let mut parts = token.splitn(2, '-');
            let start = parts.next().unwrap_or("");
            let end = parts.next().unwrap_or("");
            Range::parse(start, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffix_range() {
        let ranges = parse_header("bytes=-500");
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].absolutes(1000), (500, 999));
    }

    #[test]
    fn parses_prefix_range() {
        let ranges = parse_header("bytes=500-");
        assert_eq!(ranges[0].absolutes(1000), (500, 999));
    }

    #[test]
    fn parses_explicit_range() {
        let ranges = parse_header("bytes=0-99");
        assert_eq!(ranges[0].absolutes(1000), (0, 99));
    }

    #[test]
    fn parses_multiple_ranges() {
        let ranges = parse_header("bytes=0-99,200-299");
        assert_eq!(ranges.len(), 2);
    }

    #[test]
    fn detects_unsatisfiable_range() {
        let ranges = parse_header("bytes=5000-");
        assert!(ranges[0].is_unsatisfiable(1000));
    }
}
