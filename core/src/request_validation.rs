//! Detection of markup and script fragments in request values.

/// Whether `value` contains something that could be interpreted as markup.
///
/// A value is dangerous when it contains `<` followed by an ASCII letter,
/// `!`, `/` or `?`, or contains the character-reference opener `&#`.
#[must_use]
pub fn is_dangerous_string(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.windows(2).any(|pair| match pair {
        [b'<', next] => next.is_ascii_alphabetic() || matches!(next, b'!' | b'/' | b'?'),
        [b'&', b'#'] => true,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_is_dangerous() {
        assert!(is_dangerous_string("<script>alert(1)</script>"));
        assert!(is_dangerous_string("hello <b>world"));
        assert!(is_dangerous_string("<!-- comment"));
        assert!(is_dangerous_string("</p>"));
        assert!(is_dangerous_string("&#60;"));
    }

    #[test]
    fn test_plain_text_is_safe() {
        assert!(!is_dangerous_string("Alice"));
        assert!(!is_dangerous_string("1 < 2"));
        assert!(!is_dangerous_string("a & b"));
        assert!(!is_dangerous_string("<"));
        assert!(!is_dangerous_string(""));
    }
}
