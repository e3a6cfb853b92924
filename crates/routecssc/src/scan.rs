//! Quote-aware, depth-tracked scanning shared by the expression, condition
//! and stylesheet parsers. Only `(` and `)` change depth; brackets and
//! braces are ordinary text. Characters inside a `'` or `"` run never change
//! depth and never count as separators; there is no escape syntax, the run
//! ends at the next matching quote.

#[derive(Default)]
struct Scanner {
    depth: i32,
    quote: Option<char>,
}

impl Scanner {
    /// Feeds one character; returns true if it sits at depth 0 outside quotes.
    fn step(&mut self, ch: char) -> bool {
        if let Some(open) = self.quote {
            if ch == open {
                self.quote = None;
            }
            return false;
        }
        match ch {
            '"' | '\'' => {
                self.quote = Some(ch);
                false
            }
            '(' => {
                self.depth += 1;
                false
            }
            ')' => {
                self.depth -= 1;
                false
            }
            _ => self.depth == 0,
        }
    }
}

/// Returns the text between the `(` at byte offset `open` and its matching
/// `)`. Unbalanced input yields everything after `open`.
pub fn balanced_content(text: &str, open: usize) -> &str {
    let start = open + 1;
    let Some(rest) = text.get(start..) else {
        return "";
    };
    let mut scanner = Scanner {
        depth: 1,
        quote: None,
    };
    for (idx, ch) in rest.char_indices() {
        scanner.step(ch);
        if scanner.depth == 0 {
            return &rest[..idx];
        }
    }
    rest
}

/// Returns the body of the `{` block at byte offset `open`, up to its
/// matching `}`. Braces only nest outside parentheses and quotes, so markup
/// or JSON inside a call never ends the block. Unbalanced input yields
/// everything after `open`.
pub fn block_content(text: &str, open: usize) -> &str {
    let Some(rest) = text.get(open + 1..) else {
        return "";
    };
    let mut scanner = Scanner::default();
    let mut braces = 1;
    for (idx, ch) in rest.char_indices() {
        let top = scanner.step(ch);
        // A stray `)` must not hide the closing brace.
        scanner.depth = scanner.depth.max(0);
        if !top {
            continue;
        }
        match ch {
            '{' => braces += 1,
            '}' => {
                braces -= 1;
                if braces == 0 {
                    return &rest[..idx];
                }
            }
            _ => {}
        }
    }
    rest
}

/// If `text` is a call of `name`, returns its argument text.
pub fn call_args<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(name)?;
    if !rest.starts_with('(') {
        return None;
    }
    Some(balanced_content(text, name.len()))
}

/// Splits on `sep` wherever it occurs at depth 0 outside quotes.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut scanner = Scanner::default();
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        if scanner.step(ch) && ch == sep {
            parts.push(&text[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Byte offset of the first `target` at depth 0 outside quotes.
pub fn find_top_level(text: &str, target: char) -> Option<usize> {
    let mut scanner = Scanner::default();
    text.char_indices()
        .find(|(_, ch)| scanner.step(*ch) && *ch == target)
        .map(|(idx, _)| idx)
}

/// Byte offset of the first opening bracket `open` that is itself at depth 0
/// outside quotes.
pub fn find_opening(text: &str, open: char) -> Option<usize> {
    let mut scanner = Scanner::default();
    for (idx, ch) in text.char_indices() {
        if ch == open && scanner.depth == 0 && scanner.quote.is_none() {
            return Some(idx);
        }
        scanner.step(ch);
    }
    None
}

/// Removes one layer of matching surrounding quotes.
pub fn strip_quotes(text: &str) -> &str {
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if first == last && (first == '"' || first == '\'') => {
            &text[1..text.len() - 1]
        }
        _ => text,
    }
}

/// The first single- or double-quoted run in `text`: its contents and the
/// byte offset just past the closing quote.
pub fn first_quoted(text: &str) -> Option<(&str, usize)> {
    let (open, quote) = text.char_indices().find(|(_, ch)| *ch == '"' || *ch == '\'')?;
    let body_start = open + 1;
    let close = text[body_start..].find(quote)? + body_start;
    Some((&text[body_start..close], close + 1))
}
