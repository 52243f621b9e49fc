//! Text utilities for the line-oriented instrument grammar.
//!
//! The grammar nests parentheses, braces and double-quoted strings inside
//! single lines and across line boundaries, so splitting and depth tracking
//! must ignore separators that sit inside nested or quoted text.

/// Splits `text` on `sep` wherever the separator sits at nesting depth zero
/// outside double quotes. Segments are trimmed; empty segments are dropped.
pub fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_quote = false;
    for c in text.chars() {
        match c {
            '"' => {
                in_quote = !in_quote;
                current.push(c);
            }
            '(' | '{' | '[' if !in_quote => {
                depth += 1;
                current.push(c);
            }
            ')' | '}' | ']' if !in_quote => {
                depth -= 1;
                current.push(c);
            }
            c if c == sep && depth == 0 && !in_quote => {
                let seg = current.trim();
                if !seg.is_empty() {
                    out.push(seg.to_string());
                }
                current.clear();
            }
            c => current.push(c),
        }
    }
    let seg = current.trim();
    if !seg.is_empty() {
        out.push(seg.to_string());
    }
    out
}

/// Splits on the first occurrence of `sep` at depth zero outside quotes.
pub fn split_once_top_level(text: &str, sep: char) -> Option<(String, String)> {
    let mut depth = 0i32;
    let mut in_quote = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            '(' | '{' | '[' if !in_quote => depth += 1,
            ')' | '}' | ']' if !in_quote => depth -= 1,
            c if c == sep && depth == 0 && !in_quote => {
                return Some((
                    text[..i].trim().to_string(),
                    text[i + c.len_utf8()..].trim().to_string(),
                ));
            }
            _ => {}
        }
    }
    None
}

/// Net change in parenthesis depth over `line`, ignoring quoted text.
/// `in_quote` carries quote state across lines of an accumulated statement.
pub fn paren_depth_delta(line: &str, in_quote: &mut bool) -> i32 {
    let mut delta = 0;
    for c in line.chars() {
        match c {
            '"' => *in_quote = !*in_quote,
            '(' if !*in_quote => delta += 1,
            ')' if !*in_quote => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Net change in brace depth over `line`, ignoring quoted text.
pub fn brace_depth_delta(line: &str, in_quote: &mut bool) -> i32 {
    let mut delta = 0;
    for c in line.chars() {
        match c {
            '"' => *in_quote = !*in_quote,
            '{' if !*in_quote => delta += 1,
            '}' if !*in_quote => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Extracts the first balanced parenthesized group: returns the text inside
/// the parens and the remainder after the closing paren. `None` when there
/// is no group or it never closes.
pub fn extract_group(text: &str) -> Option<(String, String)> {
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut start = None;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            '(' if !in_quote => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            ')' if !in_quote => {
                depth -= 1;
                if depth == 0 {
                    let open = start?;
                    return Some((
                        text[open + 1..i].to_string(),
                        text[i + 1..].to_string(),
                    ));
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits the first whitespace-delimited word off `text`.
pub fn next_word(text: &str) -> Option<(&str, &str)> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.find(char::is_whitespace) {
        Some(end) => Some((&trimmed[..end], trimmed[end..].trim_start())),
        None => Some((trimmed, "")),
    }
}

/// Splits a trailing `//` comment off a line, ignoring `//` inside quotes.
/// Returns the code part and the trimmed comment text, if any.
pub fn strip_line_comment(line: &str) -> (&str, Option<&str>) {
    let mut in_quote = false;
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_quote = !in_quote,
            b'/' if !in_quote && i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                let comment = line[i + 2..].trim();
                let comment = if comment.is_empty() { None } else { Some(comment) };
                return (line[..i].trim_end(), comment);
            }
            _ => {}
        }
        i += 1;
    }
    (line, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_nesting() {
        assert_eq!(
            split_top_level("a=1, b=sin(x, y), c=2", ','),
            vec!["a=1", "b=sin(x, y)", "c=2"]
        );
        assert_eq!(
            split_top_level("{1, 2}, 3", ','),
            vec!["{1, 2}", "3"]
        );
    }

    #[test]
    fn test_split_respects_quotes() {
        assert_eq!(
            split_top_level("filename=\"a,b.dat\", n=5", ','),
            vec!["filename=\"a,b.dat\"", "n=5"]
        );
    }

    #[test]
    fn test_split_drops_empty_segments() {
        assert_eq!(split_top_level("a,,b,", ','), vec!["a", "b"]);
        assert!(split_top_level("", ',').is_empty());
    }

    #[test]
    fn test_split_once() {
        assert_eq!(
            split_once_top_level("formula=\"a=b\"", '='),
            Some(("formula".to_string(), "\"a=b\"".to_string()))
        );
        assert_eq!(split_once_top_level("flag", '='), None);
    }

    #[test]
    fn test_paren_delta_across_lines() {
        let mut in_quote = false;
        let mut depth = paren_depth_delta("COMPONENT m = Monitor(", &mut in_quote);
        depth += paren_depth_delta("  filename=\"odd(.dat\",", &mut in_quote);
        assert_eq!(depth, 1);
        depth += paren_depth_delta("  n=5)", &mut in_quote);
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_brace_delta() {
        let mut in_quote = false;
        assert_eq!(brace_depth_delta("struct pnt { double x;", &mut in_quote), 1);
        assert_eq!(brace_depth_delta("};", &mut in_quote), -1);
    }

    #[test]
    fn test_extract_group() {
        let (inner, rest) = extract_group("AT (0, 0, 1) RELATIVE src").unwrap();
        assert_eq!(inner, "0, 0, 1");
        assert_eq!(rest, " RELATIVE src");
        let (inner, rest) = extract_group("COPY(det)(xwidth = 0.2)").unwrap();
        assert_eq!(inner, "det");
        assert_eq!(rest, "(xwidth = 0.2)");
        assert!(extract_group("no parens").is_none());
        assert!(extract_group("open(only").is_none());
    }

    #[test]
    fn test_next_word() {
        assert_eq!(next_word("RELATIVE src"), Some(("RELATIVE", "src")));
        assert_eq!(next_word("  END  "), Some(("END", "")));
        assert_eq!(next_word(""), None);
    }

    #[test]
    fn test_strip_line_comment() {
        assert_eq!(
            strip_line_comment("double d1; // flight path"),
            ("double d1;", Some("flight path"))
        );
        assert_eq!(
            strip_line_comment("char url[] = \"http://host\";"),
            ("char url[] = \"http://host\";", None)
        );
        assert_eq!(strip_line_comment("plain line"), ("plain line", None));
    }
}
