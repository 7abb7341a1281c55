//! Template-level tokenizer.
//!
//! Splits a template into literal text, `${...}` markers, `<#name ...>`
//! directive tags and `</#name>` end tags. Comments (`<#-- ... -->`) are
//! dropped here. Anything that looks like the start of a tag but is not
//! well-formed is emitted as literal text, so the tokenizer never fails.

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    Interpolation(String), // body of ${...}
    Directive {
        name: String,
        args: String,
        self_closing: bool,
        raw: String,
    },
    EndDirective {
        name: String,
        raw: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, cursor: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        self.cursor += n;
    }

    fn emit(&mut self, token: Token, len: usize) -> Option<Spanned> {
        let offset = self.cursor;
        self.advance(len);
        Some(Spanned { token, offset })
    }

    pub fn next_token(&mut self) -> Option<Spanned> {
        loop {
            let rest = self.remaining();
            if rest.is_empty() {
                return None;
            }

            match find_next_tag(rest) {
                Some(0) => {}
                Some(idx) => return self.emit(Token::Text(rest[..idx].to_string()), idx),
                None => return self.emit(Token::Text(rest.to_string()), rest.len()),
            }

            if rest.starts_with("<#--") {
                match rest.find("-->") {
                    Some(end) => {
                        self.advance(end + 3);
                        continue;
                    }
                    None => return self.emit(Token::Text(rest.to_string()), rest.len()),
                }
            }

            if rest.starts_with("${") {
                return match interpolation_end(rest) {
                    Some(end) => self.emit(Token::Interpolation(rest[2..end].to_string()), end + 1),
                    None => self.emit(Token::Text("${".to_string()), 2),
                };
            }

            if rest.starts_with("</#") {
                return match lex_end_tag(rest) {
                    Some((token, len)) => self.emit(token, len),
                    None => self.emit(Token::Text("</#".to_string()), 3),
                };
            }

            return match lex_directive(rest) {
                Some((token, len)) => self.emit(token, len),
                None => self.emit(Token::Text("<#".to_string()), 2),
            };
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Spanned;

    fn next(&mut self) -> Option<Spanned> {
        self.next_token()
    }
}

/// 1-based line and column of a byte offset.
pub fn line_col(input: &str, offset: usize) -> (usize, usize) {
    let before = &input[..offset.min(input.len())];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

fn find_next_tag(rest: &str) -> Option<usize> {
    ["${", "<#", "</#"]
        .iter()
        .filter_map(|opener| rest.find(opener))
        .min()
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte index of the `}` closing a marker that starts at `rest[0]`.
/// Braces inside string literals and nested hash literals are skipped.
fn interpolation_end(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in rest.char_indices().skip(2) {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// `<#name args>` or `<#name args/>`. A bare `>` closes the tag unless it is
/// part of `>=`, sits inside brackets or a string literal, or is a numeric
/// comparison in a condition.
fn lex_directive(rest: &str) -> Option<(Token, usize)> {
    let name_len = rest[2..].chars().take_while(|c| is_name_char(*c)).count();
    if name_len == 0 {
        return None;
    }
    let name = &rest[2..2 + name_len];
    let args_start = 2 + name_len;

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = rest[args_start..].char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '>' if depth > 0 => {}
            '>' if matches!(chars.peek(), Some((_, '='))) => {
                chars.next();
            }
            '>' if is_condition(name) && numeric_comparison_follows(&rest[args_start + i + 1..]) => {}
            '>' => {
                let end = args_start + i;
                let mut args = &rest[args_start..end];
                let self_closing = args.ends_with('/');
                if self_closing {
                    args = &args[..args.len() - 1];
                }
                // `<#ifx>` is not an `if` tag.
                if !args.is_empty() && !args.starts_with(char::is_whitespace) {
                    return None;
                }
                let token = Token::Directive {
                    name: name.to_string(),
                    args: args.trim().to_string(),
                    self_closing,
                    raw: rest[..=end].to_string(),
                };
                return Some((token, end + 1));
            }
            _ => {}
        }
    }
    None
}

fn is_condition(name: &str) -> bool {
    matches!(name, "if" | "elseif")
}

/// `<#if price > 500>`: a `>` followed by a number literal and then the real
/// tag end (or a boolean connective) is a comparison, not the tag end.
fn numeric_comparison_follows(after: &str) -> bool {
    let s = after.trim_start();
    let s = s.strip_prefix('-').unwrap_or(s);
    let int_len = s.chars().take_while(char::is_ascii_digit).count();
    if int_len == 0 {
        return false;
    }
    let mut s = &s[int_len..];
    if let Some(frac) = s.strip_prefix('.') {
        let frac_len = frac.chars().take_while(char::is_ascii_digit).count();
        s = &frac[frac_len..];
    }
    let s = s.trim_start();
    s.starts_with('>') || s.starts_with("&&") || s.starts_with("||")
}

fn lex_end_tag(rest: &str) -> Option<(Token, usize)> {
    let name_len = rest[3..].chars().take_while(|c| is_name_char(*c)).count();
    if name_len == 0 {
        return None;
    }
    let after_name = &rest[3 + name_len..];
    let trimmed = after_name.trim_start();
    if !trimmed.starts_with('>') {
        return None;
    }
    let len = 3 + name_len + (after_name.len() - trimmed.len()) + 1;
    let token = Token::EndDirective {
        name: rest[3..3 + name_len].to_string(),
        raw: rest[..len].to_string(),
    };
    Some((token, len))
}
