//! Search query tokenizer.
//!
//! Splits a raw query into hashtag, mention and location predicates plus the
//! residual free text. Parsing never fails: input that does not form a token
//! simply ends up in the residual text.

pub mod entities;

use serde::Serialize;

const HASHTAG_MAX: usize = 50;
const MENTION_MAX: usize = 30;
const LOCATION_MARKER: char = '\u{1F4CD}';
const VARIATION_SELECTOR: char = '\u{FE0F}';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationToken {
    pub name: String,
    pub quoted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub locations: Vec<LocationToken>,
    pub text: Option<String>,
}

impl ParsedQuery {
    /// The username when the query is exactly one `@name` and nothing else.
    pub fn exact_username(&self) -> Option<&str> {
        match self.mentions.as_slice() {
            [name]
                if self.hashtags.is_empty()
                    && self.locations.is_empty()
                    && self.text.is_none() =>
            {
                Some(name.as_str())
            }
            _ => None,
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_location_stop(c: char) -> bool {
    matches!(
        c,
        '.' | ',' | ';' | ':' | '!' | '?' | ')' | ']' | '}' | '@' | '#' | LOCATION_MARKER
    )
}

struct Scanner<'a> {
    chars: &'a [char],
}

impl<'a> Scanner<'a> {
    /// Word body of at most `max` chars starting at `start`; `None` if empty.
    fn word(&self, start: usize, max: usize) -> Option<(String, usize)> {
        let end = self.chars[start..]
            .iter()
            .take(max)
            .take_while(|c| is_word_char(**c))
            .count()
            + start;
        if end == start {
            return None;
        }
        Some((self.chars[start..end].iter().collect(), end))
    }

    fn starts_with(&self, at: usize, needle: &str) -> bool {
        let mut idx = at;
        for expected in needle.chars() {
            match self.chars.get(idx) {
                Some(c) if c.eq_ignore_ascii_case(&expected) => idx += 1,
                _ => return false,
            }
        }
        true
    }

    /// Body of `"..."` starting right after the opening quote. Consumes to
    /// the end of input when the quote is never closed.
    fn quoted(&self, start: usize) -> (String, usize) {
        let mut name = String::new();
        let mut idx = start;
        while idx < self.chars.len() {
            match self.chars[idx] {
                '\\' if matches!(self.chars.get(idx + 1), Some('"') | Some('\\')) => {
                    name.push(self.chars[idx + 1]);
                    idx += 2;
                }
                '"' => return (name, idx + 1),
                c => {
                    name.push(c);
                    idx += 1;
                }
            }
        }
        (name, idx)
    }

    fn unquoted(&self, start: usize) -> (String, usize) {
        let mut idx = start;
        while idx < self.chars.len() {
            let c = self.chars[idx];
            if c == '\n' || c == '\r' || is_location_stop(c) {
                break;
            }
            if c == ' ' && self.chars.get(idx + 1) == Some(&' ') {
                break;
            }
            if self.starts_with(idx, "http://") || self.starts_with(idx, "https://") {
                break;
            }
            idx += 1;
        }
        let name: String = self.chars[start..idx].iter().collect();
        (name.trim().to_string(), idx)
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Tokenize a raw search query.
pub fn parse(raw: &str) -> ParsedQuery {
    let chars: Vec<char> = raw.chars().collect();
    let scanner = Scanner { chars: &chars };
    let mut parsed = ParsedQuery::default();
    let mut residual = String::new();
    let mut idx = 0;

    while idx < chars.len() {
        let c = chars[idx];

        if c == '#' {
            if let Some((tag, next)) = scanner.word(idx + 1, HASHTAG_MAX) {
                push_unique(&mut parsed.hashtags, tag.to_lowercase());
                residual.push(' ');
                idx = next;
                continue;
            }
        } else if c == '@' {
            if let Some((name, next)) = scanner.word(idx + 1, MENTION_MAX) {
                push_unique(&mut parsed.mentions, name);
                residual.push(' ');
                idx = next;
                continue;
            }
        } else if c == LOCATION_MARKER {
            let mut body = idx + 1;
            if chars.get(body) == Some(&VARIATION_SELECTOR) {
                body += 1;
            }
            let location = match chars.get(body) {
                Some('"') => {
                    let (name, next) = scanner.quoted(body + 1);
                    Some((name.trim().to_string(), next, true))
                }
                Some(first) if !first.is_whitespace() => {
                    let (name, next) = scanner.unquoted(body);
                    (!name.is_empty()).then_some((name, next, false))
                }
                _ => None,
            };

            if let Some((name, next, quoted)) = location {
                let token = LocationToken { name, quoted };
                if !token.name.is_empty() && !parsed.locations.contains(&token) {
                    parsed.locations.push(token);
                }
                residual.push(' ');
                idx = next;
                continue;
            }
        }

        residual.push(c);
        idx += 1;
    }

    let text = residual.split_whitespace().collect::<Vec<_>>().join(" ");
    parsed.text = if text.is_empty() { None } else { Some(text) };
    parsed
}
