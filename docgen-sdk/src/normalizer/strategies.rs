//! Text repairs applied by the recovery cascade
//!
//! Each repair takes the output of the previous one, so every step keeps
//! all earlier cleanups. All scanners track double-quoted strings so that
//! repairs never rewrite string contents by accident.

/// Trim surrounding whitespace
pub(crate) fn as_is(text: &str) -> String {
    text.trim().to_string()
}

/// Drop a leading fence line (```json, ~~~) and the matching closing fence
pub(crate) fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    let fence = if trimmed.starts_with("```") {
        "```"
    } else if trimmed.starts_with("~~~") {
        "~~~"
    } else {
        return trimmed.to_string();
    };

    if !trimmed.contains('\n') {
        let inner = trimmed.trim_start_matches(fence);
        let inner = inner.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        return inner.trim_end_matches(fence).trim().to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().skip(1).collect();
    while let Some(last) = lines.last() {
        let last = last.trim();
        if last.is_empty() || last.starts_with(fence) {
            lines.pop();
        } else {
            break;
        }
    }
    lines.join("\n")
}

/// Keep only the first balanced top-level object, closing it if the text was cut off
pub(crate) fn extract_balanced(text: &str) -> String {
    let Some(start) = text.find('{') else {
        return text.to_string();
    };
    let body = &text[start..];

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
                if stack.is_empty() {
                    return body[..i + c.len_utf8()].to_string();
                }
            }
            _ => {}
        }
    }

    // Truncated output: close whatever is still open
    let mut out = body.trim_end().to_string();
    if in_string {
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// Remove separators sitting directly before a closing bracket or brace
pub(crate) fn remove_trailing_separators(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Double,
    Single,
    CurlyDouble,
    CurlySingle,
}

impl Delimiter {
    fn opening(c: char) -> Option<Self> {
        match c {
            '"' => Some(Delimiter::Double),
            '\'' => Some(Delimiter::Single),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => Some(Delimiter::CurlyDouble),
            '\u{2018}' | '\u{2019}' => Some(Delimiter::CurlySingle),
            _ => None,
        }
    }

    fn closes(&self, c: char) -> bool {
        match self {
            Delimiter::Double => c == '"',
            Delimiter::Single => c == '\'',
            Delimiter::CurlyDouble => matches!(c, '\u{201C}' | '\u{201D}' | '"'),
            Delimiter::CurlySingle => matches!(c, '\u{2018}' | '\u{2019}' | '\''),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Turn single and typographic quotes into canonical double quotes and quote bare keys
pub(crate) fn normalize_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut open: Option<Delimiter> = None;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        match open {
            Some(delim) => {
                if escaped {
                    escaped = false;
                    if c == '\'' && delim != Delimiter::Double {
                        // \' has no meaning once the string is double quoted
                        out.pop();
                    }
                    out.push(c);
                } else if c == '\\' {
                    escaped = true;
                    out.push(c);
                } else if delim.closes(c) {
                    out.push('"');
                    open = None;
                } else if c == '"' {
                    out.push_str("\\\"");
                } else {
                    out.push(c);
                }
            }
            None => {
                if let Some(delim) = Delimiter::opening(c) {
                    out.push('"');
                    open = Some(delim);
                } else if is_ident_start(c) {
                    let start = i;
                    while i < chars.len() && is_ident_char(chars[i]) {
                        i += 1;
                    }
                    let ident: String = chars[start..i].iter().collect();

                    let next = chars[i..].iter().find(|ch| !ch.is_whitespace());
                    let prev = out.trim_end().chars().last();
                    if next == Some(&':') && matches!(prev, Some('{') | Some(',')) {
                        out.push('"');
                        out.push_str(&ident);
                        out.push('"');
                    } else {
                        out.push_str(match ident.as_str() {
                            "True" => "true",
                            "False" => "false",
                            "None" => "null",
                            other => other,
                        });
                    }
                    continue;
                } else {
                    out.push(c);
                }
            }
        }
        i += 1;
    }
    out
}

/// Escape raw control characters, stray backslashes and unescaped inner quotes inside strings
pub(crate) fn escape_control_chars(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            i += 1;
            continue;
        }

        match c {
            '\\' => match chars.get(i + 1) {
                Some(n @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't')) => {
                    out.push('\\');
                    out.push(*n);
                    i += 2;
                    continue;
                }
                Some('u')
                    if chars.len() >= i + 6
                        && chars[i + 2..i + 6].iter().all(|h| h.is_ascii_hexdigit()) =>
                {
                    out.extend(&chars[i..i + 6]);
                    i += 6;
                    continue;
                }
                _ => out.push_str("\\\\"),
            },
            '"' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if matches!(next, None | Some(',') | Some(':') | Some('}') | Some(']')) {
                    in_string = false;
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

/// Find the bracketed section starting at `open_at` and return it, if it closes
pub(crate) fn balanced_section(text: &str, open_at: usize) -> Option<&str> {
    let body = text.get(open_at..)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&body[..i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
