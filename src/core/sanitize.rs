//! Free-text sanitization.
//!
//! User-generated strings are HTML-escaped before entering the state store
//! so they are safe to render verbatim downstream. Non-text input simply
//! comes out as the escaped string; there is no failure mode.

/// HTML-escapes the five significant characters in a user-supplied string.
#[must_use]
pub fn html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_script_tags() {
        assert_eq!(
            html("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#039;x&#039;)&lt;/script&gt;"
        );
    }

    #[test]
    fn ampersand_is_escaped_first() {
        assert_eq!(html("a & b"), "a &amp; b");
        assert_eq!(html("&lt;"), "&amp;lt;");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(html("Vacaciones 2026"), "Vacaciones 2026");
    }
}
