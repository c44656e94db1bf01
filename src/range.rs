//! `Range` header handling for cached media
//!
//! Only single byte ranges are honored. Anything this parser does not
//! understand is reported as [`RangeOutcome::Full`] so the client gets the whole
//! object rather than an error.

use crate::storage::ByteRange;

/// How to answer a request given its `Range` header and the object size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Serve the whole object with 200
    Full,
    /// Serve this range with 206
    Partial(ByteRange),
    /// Answer 416 with `Content-Range: bytes */{size}`
    Unsatisfiable,
}

/// Resolve a `Range` header value against an object of `size` bytes
///
/// Accepts `bytes=start-end`, `bytes=start-` and `bytes=-suffix`. An end past
/// the object is clamped to the last byte. Multiple ranges, other units,
/// non-numeric bounds and `end < start` are malformed and yield
/// [`RangeOutcome::Full`].
pub fn parse_range(header: Option<&str>, size: u64) -> RangeOutcome {
    let Some(header) = header else {
        return RangeOutcome::Full;
    };

    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return RangeOutcome::Full;
    };
    if spec.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((start, end)) = spec.trim().split_once('-') else {
        return RangeOutcome::Full;
    };
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        // bytes=-suffix
        (true, false) => {
            let Some(suffix) = parse_bound(end) else {
                return RangeOutcome::Full;
            };
            if suffix == 0 || size == 0 {
                return RangeOutcome::Unsatisfiable;
            }
            RangeOutcome::Partial(ByteRange {
                start: size.saturating_sub(suffix),
                end: size - 1,
            })
        }
        // bytes=start-
        (false, true) => {
            let Some(start) = parse_bound(start) else {
                return RangeOutcome::Full;
            };
            if start >= size {
                return RangeOutcome::Unsatisfiable;
            }
            RangeOutcome::Partial(ByteRange {
                start,
                end: size - 1,
            })
        }
        // bytes=start-end
        (false, false) => {
            let (Some(start), Some(end)) = (parse_bound(start), parse_bound(end)) else {
                return RangeOutcome::Full;
            };
            if end < start {
                return RangeOutcome::Full;
            }
            if start >= size {
                return RangeOutcome::Unsatisfiable;
            }
            RangeOutcome::Partial(ByteRange {
                start,
                end: end.min(size - 1),
            })
        }
        (true, true) => RangeOutcome::Full,
    }
}

fn parse_bound(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(start: u64, end: u64) -> RangeOutcome {
        RangeOutcome::Partial(ByteRange { start, end })
    }

    #[test]
    fn test_no_header_is_full() {
        assert_eq!(parse_range(None, 1000), RangeOutcome::Full);
    }

    #[test]
    fn test_closed_range() {
        assert_eq!(parse_range(Some("bytes=0-99"), 1000), partial(0, 99));
        assert_eq!(parse_range(Some("bytes=999-999"), 1000), partial(999, 999));
    }

    #[test]
    fn test_end_is_clamped() {
        assert_eq!(parse_range(Some("bytes=900-5000"), 1000), partial(900, 999));
    }

    #[test]
    fn test_open_ended_range() {
        assert_eq!(parse_range(Some("bytes=500-"), 1000), partial(500, 999));
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(parse_range(Some("bytes=-100"), 1000), partial(900, 999));
        assert_eq!(parse_range(Some("bytes=-5000"), 1000), partial(0, 999));
        assert_eq!(parse_range(Some("bytes=-0"), 1000), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn test_start_beyond_size_is_unsatisfiable() {
        assert_eq!(parse_range(Some("bytes=2000-"), 1000), RangeOutcome::Unsatisfiable);
        assert_eq!(parse_range(Some("bytes=1000-1200"), 1000), RangeOutcome::Unsatisfiable);
        assert_eq!(parse_range(Some("bytes=0-"), 0), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn test_malformed_headers_fall_back_to_full() {
        for header in [
            "bytes=abc-def",
            "bytes=10-5",
            "items=0-10",
            "bytes=0-10,20-30",
            "bytes=-",
            "bytes=",
            "0-10",
            "bytes=+1-5",
            "bytes=99999999999999999999999-",
        ] {
            assert_eq!(parse_range(Some(header), 1000), RangeOutcome::Full, "{header}");
        }
    }
}
