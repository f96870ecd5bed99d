//! Log sanitization utilities
//!
//! Keeps GraphQL response bodies and manifest lines (which may carry user
//! metadata) from being dumped whole into debug/error logs.

/// Maximum number of bytes to include in truncated log output.
const TRUNCATE_LIMIT: usize = 256;

/// Largest char boundary at or below `index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

/// Truncate a string for safe logging.
///
/// Strings within the limit are returned as-is; longer ones keep the first
/// `TRUNCATE_LIMIT` bytes (rounded down to a char boundary) and note the
/// original length.
pub fn truncate_for_log(s: &str) -> String {
    if s.len() <= TRUNCATE_LIMIT {
        s.to_string()
    } else {
        format!(
            "{}... [truncated, total {} bytes]",
            &s[..floor_char_boundary(s, TRUNCATE_LIMIT)],
            s.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_string_unchanged() {
        assert_eq!(truncate_for_log("{\"data\":null}"), "{\"data\":null}");
    }

    #[test]
    fn exactly_at_limit() {
        let s = "x".repeat(TRUNCATE_LIMIT);
        assert_eq!(truncate_for_log(&s), s);
    }

    #[test]
    fn over_limit_reports_total() {
        let s = "x".repeat(TRUNCATE_LIMIT * 3);
        let result = truncate_for_log(&s);
        assert!(result.ends_with(&format!("total {} bytes]", TRUNCATE_LIMIT * 3)));
        assert!(result.len() < s.len());
    }

    #[test]
    fn multibyte_boundary() {
        // 'é' is 2 bytes, so byte 256 lands mid-char after an odd prefix
        let s = format!("a{}", "é".repeat(300));
        let result = truncate_for_log(&s);
        assert!(result.starts_with('a'));
        assert!(result.contains("[truncated"));
    }
}
