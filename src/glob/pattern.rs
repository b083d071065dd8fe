//! Pattern-string handling: brace expansion, segment split, segment compilation.

use regex::Regex;

use crate::error::{FsError, FsResult};

/// One compiled path segment of a glob pattern.
#[derive(Debug, Clone)]
pub(crate) enum Segment {
    /// `**`: zero or more whole path segments.
    Recursive,
    /// Plain name without wildcards, looked up directly.
    Literal(String),
    /// Wildcard segment. `dotted` is set when the segment itself starts with `.`,
    /// which is what allows it to match hidden names.
    Match { regex: Regex, dotted: bool },
}

impl Segment {
    pub(crate) fn is_recursive(&self) -> bool {
        matches!(self, Segment::Recursive)
    }
}

/// Byte range of the first balanced top-level `{...}` group, braces included.
/// Escaped braces (`\{`) are never group delimiters.
fn first_group(pattern: &str) -> Option<(usize, usize)> {
    let bytes = pattern.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        let open = find_unescaped(bytes, start, b'{')?;
        let mut depth = 0usize;
        let mut i = open;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 1,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((open, i));
                    }
                }
                _ => {}
            }
            i += 1;
        }
        // unbalanced: this brace stays literal, try the next one
        start = open + 1;
    }
    None
}

fn find_unescaped(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == needle {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Splits `text` on `sep` bytes that sit outside any brace group.
fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b if b == sep && depth == 0 => {
                parts.push(&text[last..i]);
                last = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&text[last..]);
    parts
}

/// Expands brace groups combinatorially: `a{b,c{d,e}}f` gives `abf`, `acdf`, `acef`.
/// Only the commas of the outermost group are split; each alternative is expanded again.
/// Braces that do not form a balanced group are kept as literal text.
pub(crate) fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((open, close)) = first_group(pattern) else {
        return vec![pattern.to_string()];
    };
    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    split_top_level(&pattern[open + 1..close], b',')
        .into_iter()
        .flat_map(|alternative| expand_braces(&format!("{prefix}{alternative}{suffix}")))
        .collect()
}

/// Splits a pattern on `/`, ignoring separators inside brace groups. Empty segments
/// (leading, trailing or doubled separators) are dropped, `.` is skipped and `..` pops
/// the previous segment.
pub(crate) fn split_segments(pattern: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = Vec::new();
    for part in split_top_level(pattern, b'/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(part),
        }
    }
    segments
}

fn has_magic(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '\\'])
}

/// Compiles one segment. Wildcards become an anchored regex: `*` matches any run of
/// characters, `?` exactly one, `[...]` classes pass through (`!` negates like `^`)
/// and everything else is matched literally.
pub(crate) fn compile(segment: &str, casefold: bool) -> FsResult<Segment> {
    if segment == "**" {
        return Ok(Segment::Recursive);
    }
    if !casefold && !has_magic(segment) {
        return Ok(Segment::Literal(segment.to_string()));
    }

    let chars: Vec<char> = segment.chars().collect();
    let mut re = String::from(if casefold { "(?si)^" } else { "(?s)^" });
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '\\' => match chars.get(i + 1) {
                Some(next) => {
                    re.push_str(&regex::escape(&next.to_string()));
                    i += 1;
                }
                None => re.push_str(r"\\"),
            },
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&mut re, &chars[i + 1..end]);
                    i = end;
                }
                None => re.push_str(r"\["),
            },
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');

    let regex = Regex::new(&re).map_err(|err| FsError::invalid(segment, err.to_string()))?;
    Ok(Segment::Match {
        regex,
        dotted: segment.starts_with('.'),
    })
}

/// Index of the `]` closing the class opened at `open`. A `]` right after the opening
/// bracket (or its negation) is a member, not the end.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut i = open + 1;
    if matches!(chars.get(i), Some('!' | '^')) {
        i += 1;
    }
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            ']' => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn push_class(re: &mut String, body: &[char]) {
    re.push('[');
    let mut i = 0;
    if matches!(body.first(), Some('!' | '^')) {
        re.push('^');
        i = 1;
    }
    while i < body.len() {
        match body[i] {
            '\\' if i + 1 < body.len() => {
                re.push_str(&regex::escape(&body[i + 1].to_string()));
                i += 1;
            }
            c @ ('[' | ']' | '&' | '~' | '\\') => {
                re.push('\\');
                re.push(c);
            }
            c => re.push(c),
        }
        i += 1;
    }
    re.push(']');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(segment: &str, name: &str) -> bool {
        match compile(segment, false).unwrap() {
            Segment::Match { regex, .. } => regex.is_match(name),
            Segment::Literal(literal) => literal == name,
            Segment::Recursive => true,
        }
    }

    mod braces {
        use super::*;

        #[test]
        fn test_simple_group() {
            assert_eq!(expand_braces("/path/{foo,bar}"), vec!["/path/foo", "/path/bar"]);
        }

        #[test]
        fn test_nested_group() {
            assert_eq!(expand_braces("a{b,c{d,e}}f"), vec!["abf", "acdf", "acef"]);
        }

        #[test]
        fn test_several_groups() {
            assert_eq!(
                expand_braces("{a,b}{1,2}"),
                vec!["a1", "a2", "b1", "b2"]
            );
        }

        #[test]
        fn test_unbalanced_braces_are_literal() {
            assert_eq!(expand_braces("{abc"), vec!["{abc"]);
            assert_eq!(expand_braces("abc}"), vec!["abc}"]);
            assert_eq!(expand_braces("{x{a,b}"), vec!["{xa", "{xb"]);
        }

        #[test]
        fn test_single_alternative_and_empty() {
            assert_eq!(expand_braces("{a}"), vec!["a"]);
            assert_eq!(expand_braces("x{,y}"), vec!["x", "xy"]);
        }

        #[test]
        fn test_escaped_brace() {
            assert_eq!(expand_braces(r"\{a,b}"), vec![r"\{a,b}"]);
        }
    }

    mod segments {
        use super::*;

        #[test]
        fn test_split_drops_empty_and_dots() {
            assert_eq!(split_segments("/a//b/./c/"), vec!["a", "b", "c"]);
            assert_eq!(split_segments("/a/b/../c"), vec!["a", "c"]);
            assert_eq!(split_segments("/../a"), vec!["a"]);
        }

        #[test]
        fn test_split_respects_braces() {
            assert_eq!(split_segments("/x/{a/b,c}/d"), vec!["x", "{a/b,c}", "d"]);
        }
    }

    mod compiling {
        use super::*;

        #[test]
        fn test_wildcards() {
            assert!(matches("*", "foo"));
            assert!(matches("foo*", "foobar"));
            assert!(!matches("foo*", "barfoo"));
            assert!(matches("f?o", "foo"));
            assert!(!matches("f?o", "fo"));
        }

        #[test]
        fn test_wildcards_match_newline() {
            assert!(matches("*", "a\nb"));
            assert!(matches("a?b", "a\nb"));
        }

        #[test]
        fn test_regex_metacharacters_are_literal() {
            assert!(matches("a.b*", "a.bc"));
            assert!(!matches("a.b*", "axbc"));
            assert!(matches("(x)+*", "(x)+y"));
        }

        #[test]
        fn test_character_classes() {
            assert!(matches("file[0-9]", "file7"));
            assert!(!matches("file[0-9]", "filex"));
            assert!(matches("[!a]*", "bcd"));
            assert!(!matches("[!a]*", "abc"));
            assert!(matches("[]x]", "]"));
        }

        #[test]
        fn test_unclosed_class_is_literal() {
            assert!(matches("a[b*", "a[bc"));
        }

        #[test]
        fn test_escape() {
            assert!(matches(r"\*", "*"));
            assert!(!matches(r"\*", "x"));
        }

        #[test]
        fn test_casefold() {
            let Segment::Match { regex, .. } = compile("readme*", true).unwrap() else {
                panic!("expected a regex segment");
            };
            assert!(regex.is_match("README.md"));
        }

        #[test]
        fn test_literal_and_recursive() {
            assert!(matches!(compile("plain", false).unwrap(), Segment::Literal(_)));
            assert!(compile("**", false).unwrap().is_recursive());
        }

        #[test]
        fn test_invalid_range() {
            let err = compile("[z-a]", false).unwrap_err();
            assert!(matches!(err, FsError::InvalidArgument { .. }));
        }

        #[test]
        fn test_dotted_flag() {
            assert!(matches!(
                compile(".*", false).unwrap(),
                Segment::Match { dotted: true, .. }
            ));
        }
    }
}
