//! Text normalisation for values headed into varchar columns.

/// Truncate `s` to at most `max` bytes without splitting a UTF-8 char.
///
/// `max == 0` means unlimited (some destination columns are unbounded).
pub fn trunc_to_bytes(s: &str, max: usize) -> &str {
    if max == 0 || s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Remove NUL bytes, which PostgreSQL text columns cannot store.
pub fn strip_nul(s: &str) -> String {
    if s.contains('\0') {
        s.replace('\0', "")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_pass_through() {
        assert_eq!(trunc_to_bytes("abc", 10), "abc");
        assert_eq!(trunc_to_bytes("abc", 0), "abc");
    }

    #[test]
    fn truncates_on_byte_budget() {
        assert_eq!(trunc_to_bytes("abcdef", 4), "abcd");
    }

    #[test]
    fn never_splits_a_char() {
        // 'é' is two bytes; a budget of 3 must not cut it in half.
        assert_eq!(trunc_to_bytes("abéc", 3), "ab");
        assert_eq!(trunc_to_bytes("abéc", 4), "abé");
    }

    #[test]
    fn strips_embedded_nul() {
        assert_eq!(strip_nul("a\0b\0"), "ab");
        assert_eq!(strip_nul("clean"), "clean");
    }
}
