use regex::Regex;

use crate::error::EnforcerError;

/// Operators RFC 6570 defines for expression expansion (`{+var}`, `{?var}`,
/// ...). This core supports only the bare `{name}` simple-string form, so
/// any of these appearing as the first character inside braces is rejected
/// (§4.8).
const UNSUPPORTED_OPERATORS: &str = "+?#./;&";

enum Segment {
    Literal(String),
    Placeholder,
}

fn parse_segments(template: &str) -> Result<Vec<Segment>, EnforcerError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let mut inner = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => inner.push(ch),
                        None => {
                            return Err(EnforcerError::UnsupportedTemplate(format!(
                                "unclosed placeholder in \"{template}\""
                            )))
                        }
                    }
                }
                if inner.is_empty() {
                    return Err(EnforcerError::UnsupportedTemplate(format!(
                        "empty placeholder in \"{template}\""
                    )));
                }
                if let Some(first) = inner.chars().next() {
                    if UNSUPPORTED_OPERATORS.contains(first) {
                        return Err(EnforcerError::UnsupportedTemplate(format!(
                            "RFC 6570 operator '{first}' is not supported in \"{template}\""
                        )));
                    }
                }
                segments.push(Segment::Placeholder);
            }
            '}' => {
                return Err(EnforcerError::UnsupportedTemplate(format!(
                    "unmatched '}}' in \"{template}\""
                )))
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Compiles a URI template into an anchored regex: the **last** placeholder
/// matches `.+` (so `file:///{path}` accepts multi-segment paths); every
/// earlier placeholder matches `[^/]+`. Non-placeholder text is
/// regex-escaped (§4.8).
pub fn compile_template(template: &str) -> Result<Regex, EnforcerError> {
    let segments = parse_segments(template)?;
    let last_placeholder = segments.iter().rposition(|s| matches!(s, Segment::Placeholder));

    let mut pattern = String::from("^");
    for (index, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
            Segment::Placeholder if Some(index) == last_placeholder => pattern.push_str("(?:.+)"),
            Segment::Placeholder => pattern.push_str("(?:[^/]+)"),
        }
    }
    pattern.push('$');

    Regex::new(&pattern)
        .map_err(|e| EnforcerError::UnsupportedTemplate(format!("failed to compile \"{template}\": {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_placeholder_matches_single_segment_only() {
        let re = compile_template("mcp://resource/{id}").unwrap();
        assert!(re.is_match("mcp://resource/abc"));
        assert!(!re.is_match("mcp://resource/abc/def"));
    }

    #[test]
    fn last_placeholder_matches_multi_segment_paths() {
        let re = compile_template("file:///{path}").unwrap();
        assert!(re.is_match("file:///a/b/c"));
    }

    #[test]
    fn earlier_placeholder_does_not_cross_a_slash() {
        let re = compile_template("mcp://{bucket}/fixed").unwrap();
        assert!(re.is_match("mcp://bucket-a/fixed"));
        assert!(!re.is_match("mcp://bucket-a/extra/fixed"));
    }

    #[test]
    fn rejects_rfc6570_operators() {
        for template in ["mcp://{+path}", "mcp://{?query}", "mcp://{#frag}"] {
            assert!(compile_template(template).is_err());
        }
    }

    #[test]
    fn literal_characters_are_regex_escaped() {
        let re = compile_template("mcp://resource.one/{id}").unwrap();
        assert!(re.is_match("mcp://resource.one/abc"));
        assert!(!re.is_match("mcp://resourceXone/abc"));
    }

    #[test]
    fn unclosed_placeholder_is_an_error() {
        assert!(compile_template("mcp://resource/{id").is_err());
    }
}
