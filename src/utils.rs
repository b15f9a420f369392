/// Contains helper functions

/// From https://www.owasp.org/index.php/XSS_(Cross_Site_Scripting)_Prevention_Cheat_Sheet
/// Escape the following characters with HTML entity encoding to prevent switching
/// into any execution context, such as script, style, or event handlers. In
/// addition to the 5 characters significant in XML (&, <, >, ", '), the forward
/// slash is included as it helps to end an HTML entity.
///
/// & --> &amp;
/// < --> &lt;
/// > --> &gt;
/// " --> &quot;
/// ' --> &#x27;     &apos; is not recommended
/// / --> &#x2f;     forward slash is included as it helps end an HTML entity
pub fn escape_html(input: &str, output: &mut String) {
    for c in input.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            '/' => output.push_str("&#x2f;"),
            _ => output.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::escape_html;

    fn escaped(input: &str) -> String {
        let mut out = String::new();
        escape_html(input, &mut out);
        out
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escaped("hello"), "hello");
        assert_eq!(escaped("<a>"), "&lt;a&gt;");
        assert_eq!(escaped("a & b"), "a &amp; b");
        assert_eq!(escaped(r#""quoted""#), "&quot;quoted&quot;");
        assert_eq!(escaped("it's"), "it&#x27;s");
        assert_eq!(escaped("a/b"), "a&#x2f;b");
        assert_eq!(escaped("héllo 世界"), "héllo 世界");
    }

    #[test]
    fn test_escaped_output_is_free_of_specials() {
        let every_ascii: String = (1..=127u8).map(|b| b as char).collect();
        let out = escaped(&every_ascii);
        let stripped = out
            .replace("&amp;", "")
            .replace("&lt;", "")
            .replace("&gt;", "")
            .replace("&quot;", "")
            .replace("&#x27;", "")
            .replace("&#x2f;", "");
        for forbidden in ['<', '>', '&', '"', '\'', '/'].iter() {
            assert!(!stripped.contains(*forbidden), "unescaped `{}` in {:?}", forbidden, out);
        }
    }
}
