//! Translation of `.terraformignore` lines into anchored regular expressions.

use std::iter::Peekable;
use std::str::Chars;

use regex::Regex;

use crate::error::{Error, Result};

/// A single compiled ignore rule.
#[derive(Clone, Debug)]
pub struct Rule {
    pattern: String,
    negated: bool,
    regex: Regex,
}

impl Rule {
    /// Parse one line of an ignore file.
    ///
    /// Returns `None` for blank lines and `#` comments.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (negated, body) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        if body.is_empty() {
            return Ok(None);
        }

        Self::new(normalize(body), negated).map(Some)
    }

    /// Compile an already normalized pattern.
    pub fn new(pattern: impl Into<String>, negated: bool) -> Result<Self> {
        let pattern = pattern.into();
        let regex = Regex::new(&glob_to_regex(&pattern)).map_err(|e| Error::Pattern {
            pattern: pattern.clone(),
            source: e,
        })?;
        Ok(Self {
            pattern,
            negated,
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// `!` rules re-include what earlier rules excluded.
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Test a `/`-separated path relative to the rule base.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Directory patterns gain a `**` suffix; unanchored ones a `**/` prefix.
fn normalize(pattern: &str) -> String {
    let mut pattern = pattern.to_owned();
    if pattern.ends_with('/') {
        pattern.push_str("**");
    }
    match pattern.strip_prefix('/') {
        Some(anchored) => anchored.to_owned(),
        None => format!("**/{pattern}"),
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut re = String::with_capacity(glob.len() * 2 + 2);
    re.push('^');

    let mut chars = glob.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                // `**/` spans whole segments; any other `**` spans anything
                if chars.peek() == Some(&'/') {
                    chars.next();
                    re.push_str("(.*/)?");
                } else {
                    re.push_str(".*");
                }
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '[' => push_class(&mut re, &mut chars),
            '\\' => match chars.next() {
                Some(escaped) => push_literal(&mut re, escaped),
                None => re.push_str(r"\\"),
            },
            other => push_literal(&mut re, other),
        }
    }

    re.push('$');
    re
}

/// Copy a `[...]` class through, with `[!...]` spelled as `[^...]`.
///
/// Only single characters and `a-z` ranges carry over: a leading `]` is a
/// literal, and the regex set operators `&&`, `--` and `~~` are escaped.
/// An unterminated class is left open so that compilation fails.
fn push_class(re: &mut String, chars: &mut Peekable<Chars<'_>>) {
    re.push('[');
    if chars.peek() == Some(&'!') {
        chars.next();
        re.push('^');
    }
    if chars.peek() == Some(&']') {
        chars.next();
        re.push_str("\\]");
    }

    let mut prev_dash = false;
    while let Some(ch) = chars.next() {
        match ch {
            ']' => {
                re.push(']');
                return;
            }
            '-' if prev_dash || chars.peek() == Some(&'-') => {
                re.push_str("\\-");
                prev_dash = true;
                continue;
            }
            '\\' | '[' | '&' | '~' => {
                re.push('\\');
                re.push(ch);
            }
            _ => re.push(ch),
        }
        prev_dash = false;
    }
}

fn push_literal(re: &mut String, ch: char) {
    let mut buf = [0u8; 4];
    re.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
}
