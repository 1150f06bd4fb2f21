//! PostgreSQL text helpers shared by the compiler

/// Make `s` match itself literally inside a LIKE pattern by escaping `\`,
/// `%` and `_` with a backslash, PostgreSQL's default LIKE escape.
pub fn escape_like_pattern(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Substring pattern used by `contains`: `%<escaped>%`
///
/// ```
/// use filter_engine::sql::contains_pattern;
///
/// assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
/// ```
pub fn contains_pattern(needle: &str) -> String {
    format!("%{}%", escape_like_pattern(needle))
}

/// PostgreSQL positional placeholder (1-based)
pub fn placeholder(index: usize) -> String {
    format!("${}", index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_plain_text() {
        assert_eq!(contains_pattern("ann"), "%ann%");
        assert_eq!(contains_pattern(""), "%%");
    }

    #[test]
    fn test_contains_pattern_neutralizes_wildcards() {
        // a user searching for "a_b" must not match "axb"
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
    }

    #[test]
    fn test_contains_pattern_escapes_escape_char() {
        assert_eq!(contains_pattern("C:\\temp"), "%C:\\\\temp%");
        assert_eq!(contains_pattern("\\%"), "%\\\\\\%%");
    }

    #[test]
    fn test_escape_keeps_unicode() {
        assert_eq!(escape_like_pattern("größe_ü"), "größe\\_ü");
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(placeholder(1), "$1");
        assert_eq!(placeholder(12), "$12");
    }
}
