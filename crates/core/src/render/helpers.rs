//! String transforms available inside templates.

const UNSAFE_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Remove characters that are not allowed in a path component.
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !UNSAFE_CHARS.contains(c) && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Like [`sanitize`], but an `Unknown` placeholder value renders as nothing.
pub fn clean(value: &str) -> String {
    let sanitized = sanitize(value);
    if sanitized.eq_ignore_ascii_case("unknown") {
        String::new()
    } else {
        sanitized
    }
}

/// Sanitized title with runs of whitespace collapsed to one space.
pub fn clean_title(title: &str) -> String {
    sanitize(title).split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("21 Jump Street"), "21 Jump Street");
        assert_eq!(sanitize("What/If?"), "WhatIf");
        assert_eq!(sanitize("  a<b>c|d*  "), "abcd");
        assert_eq!(sanitize("tab\there"), "tabhere");
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean("Unknown"), "");
        assert_eq!(clean("2160p"), "2160p");
        assert_eq!(clean("Director's Cut"), "Director's Cut");
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Show: Name"), "Show Name");
        assert_eq!(clean_title("Mission: Impossible - Fallout"), "Mission Impossible - Fallout");
        assert_eq!(clean_title("  spaced   out  "), "spaced out");
    }
}
