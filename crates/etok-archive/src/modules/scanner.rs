//! A lightweight reader for `module` blocks in `.tf` files.
//!
//! Only enough HCL is understood to find top-level `module "<name>" { .. }`
//! blocks and their literal `source` attribute: strings (with `${}`/`%{}`
//! templates), heredocs, comments and brace nesting.

use std::fs;
use std::io;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

use super::ModuleCallParser;
use crate::error::{Error, Result};

/// Reads every `*.tf` file of a directory in file-name order.
#[derive(Clone, Copy, Debug, Default)]
pub struct TfScanner;

impl ModuleCallParser for TfScanner {
    fn module_sources(&self, dir: &Path) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_err(dir))? {
            let path = entry.map_err(read_err(dir))?.path();
            if path.extension().is_some_and(|ext| ext == "tf") && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut sources = Vec::new();
        for file in files {
            let text = fs::read_to_string(&file).map_err(read_err(&file))?;
            let found = scan_module_sources(&text).map_err(|message| Error::ModuleParse {
                module: file.clone(),
                message,
            })?;
            sources.extend(found);
        }
        Ok(sources)
    }
}

fn read_err(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
    move |e| Error::ModuleRead {
        path: path.to_path_buf(),
        source: e,
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Eq,
    LBrace,
    RBrace,
    Other,
}

/// The `source` of every top-level module block in `text`, in order.
pub fn scan_module_sources(text: &str) -> std::result::Result<Vec<String>, String> {
    let tokens = lex(text)?;
    let mut sources = Vec::new();
    let mut depth = 0usize;
    let mut block: Option<(String, Option<String>)> = None;

    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Ident(word) if depth == 0 && word == "module" => {
                let label = match tokens.get(i + 1) {
                    Some(Token::Str(label) | Token::Ident(label)) => Some(label.clone()),
                    _ => None,
                };
                if let (Some(label), Some(Token::LBrace)) = (label, tokens.get(i + 2)) {
                    block = Some((label, None));
                    depth = 1;
                    i += 3;
                    continue;
                }
            }
            Token::Ident(word)
                if depth == 1 && word == "source" && tokens.get(i + 1) == Some(&Token::Eq) =>
            {
                if let Some((name, source)) = block.as_mut() {
                    match tokens.get(i + 2) {
                        Some(Token::Str(value)) => *source = Some(value.clone()),
                        _ => {
                            return Err(format!(
                                "module \"{name}\": source must be a string literal"
                            ));
                        }
                    }
                    i += 3;
                    continue;
                }
            }
            Token::LBrace => depth += 1,
            Token::RBrace => {
                depth = depth.checked_sub(1).ok_or("unexpected '}'")?;
                if depth == 0 {
                    if let Some((name, source)) = block.take() {
                        let source = source
                            .ok_or_else(|| format!("module \"{name}\" has no source attribute"))?;
                        sources.push(source);
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    if depth != 0 {
        return Err("unclosed block".into());
    }
    Ok(sources)
}

fn lex(text: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '#' => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'/') => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                skip_block_comment(&mut chars)?;
            }
            '"' => tokens.push(Token::Str(lex_string(&mut chars)?)),
            '<' if chars.peek() == Some(&'<') => {
                chars.next();
                tokens.push(Token::Str(lex_heredoc(&mut chars)?));
            }
            '{' => tokens.push(Token::LBrace),
            '}' => tokens.push(Token::RBrace),
            '=' if chars.peek() == Some(&'=') || chars.peek() == Some(&'>') => {
                chars.next();
                tokens.push(Token::Other);
            }
            '=' => tokens.push(Token::Eq),
            c if is_ident_char(c) => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !is_ident_char(next) {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push(Token::Ident(word));
            }
            c if c.is_whitespace() => {}
            _ => tokens.push(Token::Other),
        }
    }

    Ok(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn skip_line(chars: &mut Peekable<Chars<'_>>) {
    for ch in chars.by_ref() {
        if ch == '\n' {
            break;
        }
    }
}

fn skip_block_comment(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<(), String> {
    while let Some(ch) = chars.next() {
        if ch == '*' && chars.peek() == Some(&'/') {
            chars.next();
            return Ok(());
        }
    }
    Err("unterminated comment".into())
}

/// Read a quoted string whose opening `"` is already consumed.
fn lex_string(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<String, String> {
    let mut value = String::new();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => return Ok(value),
            '\\' => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('r') => value.push('\r'),
                Some(other) => value.push(other),
                None => break,
            },
            c @ ('$' | '%') if chars.peek() == Some(&c) => {
                chars.next();
                value.push(c);
                value.push(c);
            }
            '$' | '%' if chars.peek() == Some(&'{') => {
                chars.next();
                value.push(ch);
                value.push('{');
                lex_template(chars, &mut value)?;
            }
            '\n' => return Err("unterminated string".into()),
            other => value.push(other),
        }
    }
    Err("unterminated string".into())
}

/// Copy a template sequence through its closing `}`, nested strings included.
fn lex_template(
    chars: &mut Peekable<Chars<'_>>,
    value: &mut String,
) -> std::result::Result<(), String> {
    let mut depth = 1usize;
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                let inner = lex_string(chars)?;
                value.push('"');
                value.push_str(&inner);
                value.push('"');
                continue;
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    value.push('}');
                    return Ok(());
                }
            }
            _ => {}
        }
        value.push(ch);
    }
    Err("unterminated template".into())
}

/// Read `<<EOF` / `<<-EOF` bodies; the leading `<<` is already consumed.
fn lex_heredoc(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<String, String> {
    if chars.peek() == Some(&'-') {
        chars.next();
    }
    let mut marker = String::new();
    while let Some(&ch) = chars.peek() {
        if !is_ident_char(ch) {
            break;
        }
        marker.push(ch);
        chars.next();
    }
    if marker.is_empty() {
        return Err("heredoc without marker".into());
    }
    skip_line(chars);

    let mut body = String::new();
    let mut line = String::new();
    for ch in chars.by_ref() {
        if ch == '\n' {
            if line.trim() == marker {
                return Ok(body);
            }
            body.push_str(&line);
            body.push('\n');
            line.clear();
        } else {
            line.push(ch);
        }
    }
    if line.trim() == marker {
        return Ok(body);
    }
    Err(format!("unterminated heredoc '{marker}'"))
}
