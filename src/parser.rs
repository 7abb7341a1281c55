use crate::ast::*;
use crate::config::RenderOptions;
use crate::error::{Error, Result};
use crate::expr;
use crate::lexer::{line_col, Spanned, Token, Tokenizer};
use std::collections::VecDeque;
use tracing::{debug, warn};

pub struct Parser<'a> {
    input: &'a str,
    buffer: VecDeque<Spanned>,
    max_depth: usize,
}

fn is_block_end(name: &str) -> bool {
    matches!(name, "list" | "if")
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, options: &RenderOptions) -> Self {
        Self {
            input,
            buffer: balance(Tokenizer::new(input).collect()),
            max_depth: options.max_depth,
        }
    }

    fn peek(&mut self) -> Option<&Spanned> {
        self.buffer.front()
    }

    fn consume(&mut self) -> Option<Spanned> {
        self.buffer.pop_front()
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> Error {
        let (line, column) = line_col(self.input, offset);
        Error::Syntax {
            message: message.into(),
            line,
            column,
        }
    }

    /// Whether the next token ends the enclosing block: `</#list>`, `</#if>`,
    /// `<#elseif ...>` or `<#else>`.
    fn at_terminator(&mut self) -> bool {
        match self.peek().map(|s| &s.token) {
            Some(Token::EndDirective { name, .. }) => is_block_end(name),
            Some(Token::Directive { name, .. }) => matches!(name.as_str(), "elseif" | "else"),
            _ => false,
        }
    }

    pub fn parse(&mut self) -> Result<Vec<Node>> {
        let nodes = self.parse_nodes(0)?;
        match self.consume() {
            None => Ok(nodes),
            Some(Spanned { token, offset }) => {
                let raw = match token {
                    Token::Directive { raw, .. } | Token::EndDirective { raw, .. } => raw,
                    other => format!("{other:?}"),
                };
                Err(self.error(offset, format!("unexpected {raw}")))
            }
        }
    }

    fn parse_nodes(&mut self, depth: usize) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            if self.peek().is_none() || self.at_terminator() {
                break;
            }
            let Some(Spanned { token, offset }) = self.consume() else {
                break;
            };

            match token {
                Token::Text(s) => nodes.push(Node::Text(s)),
                Token::Interpolation(body) => nodes.push(interpolation(&body, self.max_depth)),
                Token::Directive {
                    name,
                    args,
                    raw,
                    self_closing,
                } => match name.as_str() {
                    "assign" => nodes.push(assignment(&args, self.max_depth)),
                    "list" => nodes.push(self.parse_list(&args, offset, depth + 1)?),
                    "if" => nodes.push(self.parse_if(&args, offset, depth + 1)?),
                    _ => {
                        debug!(directive = %name, self_closing, "unsupported directive kept as text");
                        nodes.push(Node::Text(raw));
                    }
                },
                Token::EndDirective { raw, .. } => nodes.push(Node::Text(raw)),
            }
        }
        Ok(nodes)
    }

    fn check_depth(&self, depth: usize, offset: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(self.error(
                offset,
                format!("blocks nested deeper than {} levels", self.max_depth),
            ));
        }
        Ok(())
    }

    fn expect_end(&mut self, block: &str, open_offset: usize) -> Result<()> {
        match self.consume() {
            Some(Spanned {
                token: Token::EndDirective { name, .. },
                ..
            }) if name == block => Ok(()),
            Some(Spanned {
                token: Token::Directive { raw, .. } | Token::EndDirective { raw, .. },
                offset,
            }) => Err(self.error(offset, format!("expected </#{block}>, found {raw}"))),
            _ => Err(self.error(open_offset, format!("unclosed <#{block}>"))),
        }
    }

    fn parse_list(&mut self, args: &str, offset: usize, depth: usize) -> Result<Node> {
        self.check_depth(depth, offset)?;
        let Some((source, target)) = split_list_header(args) else {
            return Err(self.error(offset, format!("malformed <#list {args}>")));
        };

        let iterable = match expr::parse_expression_with_depth(source, self.max_depth) {
            Ok(e) => Some(e),
            Err(err) => {
                debug!(source, %err, "list source did not parse");
                None
            }
        };

        let body = self.parse_nodes(depth)?;

        let else_body = if self.peek_directive("else") {
            self.consume();
            Some(self.parse_nodes(depth)?)
        } else {
            None
        };
        self.expect_end("list", offset)?;

        Ok(Node::List {
            source: source.to_string(),
            iterable,
            target: target.to_string(),
            body,
            else_body,
        })
    }

    fn peek_directive(&mut self, wanted: &str) -> bool {
        matches!(
            self.peek().map(|s| &s.token),
            Some(Token::Directive { name, .. }) if name == wanted
        )
    }

    fn parse_if(&mut self, args: &str, offset: usize, depth: usize) -> Result<Node> {
        self.check_depth(depth, offset)?;
        let body = self.parse_nodes(depth)?;
        let mut cases = vec![(condition(args, self.max_depth), body)];
        let mut else_body = None;

        loop {
            // What comes next: <#elseif ...>, <#else>, or </#if>
            match self.peek().map(|s| s.token.clone()) {
                Some(Token::Directive { name, args, .. }) if name == "elseif" => {
                    self.consume();
                    let block = self.parse_nodes(depth)?;
                    cases.push((condition(&args, self.max_depth), block));
                }
                Some(Token::Directive { name, .. }) if name == "else" => {
                    self.consume();
                    else_body = Some(self.parse_nodes(depth)?);
                    // After else, we must see </#if>
                    self.expect_end("if", offset)?;
                    break;
                }
                Some(Token::EndDirective { .. }) => {
                    self.expect_end("if", offset)?;
                    break;
                }
                _ => return Err(self.error(offset, "unclosed <#if>")),
            }
        }

        Ok(Node::If { cases, else_body })
    }
}

fn interpolation(body: &str, max_depth: usize) -> Node {
    let source = body.trim();
    let expr = match expr::parse_interpolation(source, max_depth) {
        Ok(e) => Some(e),
        Err(err) => {
            debug!(marker = source, %err, "marker did not parse");
            None
        }
    };
    Node::Interpolation {
        source: source.to_string(),
        expr,
    }
}

fn condition(args: &str, max_depth: usize) -> Condition {
    let expr = match expr::parse_expression_with_depth(args, max_depth) {
        Ok(e) => Some(e),
        Err(err) => {
            debug!(condition = args, %err, "condition did not parse");
            None
        }
    };
    Condition {
        source: args.to_string(),
        expr,
    }
}

fn assignment(args: &str, max_depth: usize) -> Node {
    let Some((name, value)) = args.split_once('=') else {
        return Node::Assign {
            name: args.trim().to_string(),
            value: None,
        };
    };
    let name = name.trim();
    let value = if is_identifier(name) {
        expr::parse_expression_with_depth(value, max_depth)
            .ok()
            .and_then(|e| e.literal_value())
    } else {
        None
    };
    Node::Assign {
        name: name.to_string(),
        value,
    }
}

/// An open `<#if>` or `<#list>` while pairing tags.
struct OpenBlock {
    index: usize,
    name: String,
    branches: Vec<usize>,
    seen_else: bool,
}

/// Turn block tags without a partner into literal text: unclosed openers,
/// stray end tags, `<#else>`/`<#elseif>` outside a block and `<#list>`
/// tags without a usable `as` clause. Broken structure then renders as
/// written instead of failing the whole template.
fn balance(tokens: Vec<Spanned>) -> VecDeque<Spanned> {
    let mut stack: Vec<OpenBlock> = Vec::new();
    let mut literal = vec![false; tokens.len()];

    for (i, spanned) in tokens.iter().enumerate() {
        match &spanned.token {
            Token::Directive { name, args, .. } if is_block_end(name) => {
                if name == "list" && split_list_header(args).is_none() {
                    literal[i] = true;
                    continue;
                }
                stack.push(OpenBlock {
                    index: i,
                    name: name.clone(),
                    branches: Vec::new(),
                    seen_else: false,
                });
            }
            Token::Directive { name, .. } if name == "elseif" || name == "else" => {
                match stack.last_mut() {
                    Some(open) if !open.seen_else && (open.name == "if" || name == "else") => {
                        open.seen_else = name == "else";
                        open.branches.push(i);
                    }
                    _ => literal[i] = true,
                }
            }
            Token::EndDirective { name, .. } if is_block_end(name) => {
                match stack.iter().rposition(|open| open.name == *name) {
                    Some(at) => {
                        for dropped in stack.drain(at + 1..) {
                            literal[dropped.index] = true;
                            dropped.branches.iter().for_each(|&b| literal[b] = true);
                        }
                        stack.pop();
                    }
                    None => literal[i] = true,
                }
            }
            _ => {}
        }
    }
    for open in stack {
        literal[open.index] = true;
        open.branches.iter().for_each(|&b| literal[b] = true);
    }

    tokens
        .into_iter()
        .zip(literal)
        .map(|(spanned, literal)| if literal { into_text(spanned) } else { spanned })
        .collect()
}

fn into_text(spanned: Spanned) -> Spanned {
    let token = match spanned.token {
        Token::Directive { raw, .. } | Token::EndDirective { raw, .. } => {
            warn!(tag = %raw, offset = spanned.offset, "unpaired block tag kept as text");
            Token::Text(raw)
        }
        other => other,
    };
    Spanned {
        token,
        offset: spanned.offset,
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// `source as item` → (`source`, `item`).
fn split_list_header(args: &str) -> Option<(&str, &str)> {
    let (rest, target) = args.trim().rsplit_once(char::is_whitespace)?;
    let source = rest.trim_end().strip_suffix("as")?;
    if !source.ends_with(char::is_whitespace) || !is_identifier(target) {
        return None;
    }
    let source = source.trim();
    (!source.is_empty()).then_some((source, target))
}
