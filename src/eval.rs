use crate::arith;
use crate::ast::*;
use crate::builtins::{self, Builtin};
use crate::config::RenderOptions;
use crate::error::{Error, Result};
use crate::scope::{LoopState, ScopeArena, ScopeId};
use crate::value::Value;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Why an expression produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unresolved {
    /// Missing variable, missing path segment, unknown built-in.
    Undefined,
    /// Arithmetic over something that is not a number.
    Invalid,
}

type Outcome = std::result::Result<Value, Unresolved>;

pub(crate) struct Evaluator<'o> {
    scopes: ScopeArena,
    options: &'o RenderOptions,
    iterations: usize,
}

impl<'o> Evaluator<'o> {
    /// Build the global frame: the external context with every assignment in
    /// `nodes` bound over it, in source order.
    pub fn new(context: HashMap<String, Value>, nodes: &[Node], options: &'o RenderOptions) -> Self {
        let mut globals = context;
        bind_assignments(nodes, &mut globals);
        Self {
            scopes: ScopeArena::new(globals),
            options,
            iterations: 0,
        }
    }

    pub fn render(&mut self, nodes: &[Node]) -> Result<String> {
        self.render_nodes(nodes, ScopeArena::ROOT)
    }

    fn render_nodes(&mut self, nodes: &[Node], scope: ScopeId) -> Result<String> {
        let mut output = String::new();
        for node in nodes {
            match node {
                Node::Text(s) => output.push_str(s),
                Node::Interpolation { source, expr } => {
                    output.push_str(&self.interpolate(source, expr.as_ref(), scope));
                }
                Node::Assign { .. } => {} // bound before rendering
                Node::List {
                    source,
                    iterable,
                    target,
                    body,
                    else_body,
                } => {
                    let expanded = self.render_list(
                        source,
                        iterable.as_ref(),
                        target,
                        body,
                        else_body.as_deref(),
                        scope,
                    )?;
                    output.push_str(&expanded);
                }
                Node::If { cases, else_body } => {
                    let branch = cases
                        .iter()
                        .find(|(cond, _)| self.condition_holds(cond, scope))
                        .map(|(_, body)| body)
                        .or(else_body.as_ref());
                    if let Some(body) = branch {
                        output.push_str(self.render_nodes(body, scope)?.trim());
                    }
                }
            }
        }
        Ok(output)
    }

    fn interpolate(&self, source: &str, expr: Option<&Expr>, scope: ScopeId) -> String {
        trace!(marker = source, "processing marker");
        let Some(expr) = expr else {
            return format!("[Undefined: {source}]");
        };
        match self.eval(expr, scope) {
            Ok(Value::Null) | Err(Unresolved::Undefined) => format!("[Undefined: {source}]"),
            Err(Unresolved::Invalid) => format!("[Error in expression: {source}]"),
            Ok(value) => value.to_string(),
        }
    }

    fn render_list(
        &mut self,
        source: &str,
        iterable: Option<&Expr>,
        target: &str,
        body: &[Node],
        else_body: Option<&[Node]>,
        scope: ScopeId,
    ) -> Result<String> {
        let items = match iterable.map(|e| self.eval(e, scope)) {
            Some(Ok(Value::Sequence(items))) => items,
            None if source.trim_start().starts_with('[') => {
                warn!(source, "could not parse literal array");
                return Ok(format!("[Error parsing array: {source}]"));
            }
            other => {
                let found = match &other {
                    Some(Ok(value)) => value.type_name(),
                    _ => "nothing",
                };
                debug!(source, found, "list source is not a sequence");
                return Ok(format!("[Array not found or invalid: {source}]"));
            }
        };

        if items.is_empty() {
            return match else_body {
                Some(nodes) => Ok(self.render_nodes(nodes, scope)?.trim().to_string()),
                None => Ok(String::new()),
            };
        }

        let length = items.len();
        let mut expanded = Vec::with_capacity(length);
        for (index, item) in items.into_iter().enumerate() {
            self.count_iteration()?;

            let state = LoopState { index, length };
            let frame = self.scopes.push(scope);
            self.scopes.set(frame, format!("{target}_index"), Value::Number(index as f64));
            self.scopes.set(frame, format!("{target}_has_next"), Value::Bool(state.has_next()));
            self.scopes.set(frame, target, item);
            self.scopes.set_loop(frame, target, state);
            trace!(item = target, index, depth = self.scopes.depth(), "expanding iteration");

            let rendered = self.render_nodes(body, frame);
            self.scopes.pop(frame);
            expanded.push(rendered?.trim().to_string());
        }

        Ok(expanded.join(&self.options.loop_separator))
    }

    fn count_iteration(&mut self) -> Result<()> {
        self.iterations += 1;
        match self.options.max_loop_iterations {
            Some(limit) if self.iterations > limit => Err(Error::IterationLimit(limit)),
            _ => Ok(()),
        }
    }

    fn condition_holds(&self, cond: &Condition, scope: ScopeId) -> bool {
        let Some(expr) = &cond.expr else {
            debug!(condition = %cond.source, "unrecognised condition is false");
            return false;
        };
        let holds = self.holds(expr, scope);
        debug!(condition = %cond.source, holds, "evaluated condition");
        holds
    }

    /// Truthiness of a boolean operand; unresolved counts as false.
    fn holds(&self, expr: &Expr, scope: ScopeId) -> bool {
        self.eval(expr, scope).is_ok_and(|v| v.is_truthy())
    }

    /// Numeric value of an arithmetic operand; anything else rejects the
    /// whole expression.
    fn number(&self, expr: &Expr, scope: ScopeId) -> std::result::Result<f64, Unresolved> {
        self.eval(expr, scope)
            .ok()
            .as_ref()
            .and_then(arith::operand)
            .ok_or(Unresolved::Invalid)
    }

    fn eval(&self, expr: &Expr, scope: ScopeId) -> Outcome {
        match expr {
            Expr::NumberLit(n) => Ok(Value::Number(*n)),
            Expr::StringLit(s) => Ok(Value::String(s.clone())),
            Expr::BoolLit(b) => Ok(Value::Bool(*b)),
            Expr::SeqLit(items) => items
                .iter()
                .map(|e| self.eval(e, scope))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::Sequence),
            Expr::HashLit(entries) => entries
                .iter()
                .map(|(k, e)| self.eval(e, scope).map(|v| (k.clone(), v)))
                .collect::<std::result::Result<HashMap<_, _>, _>>()
                .map(Value::Hash),
            Expr::Var(name) => self
                .scopes
                .lookup(scope, name)
                .cloned()
                .ok_or(Unresolved::Undefined),
            Expr::Attribute(obj, attr) => match self.eval(obj, scope) {
                Ok(base) => match base.field(attr) {
                    Some(v) => Ok(v.clone()),
                    None if attr == "has_content" => Ok(Value::Bool(base.has_content())),
                    None => Err(Unresolved::Undefined),
                },
                Err(_) if attr == "has_content" => Ok(Value::Bool(false)),
                Err(e) => Err(e),
            },
            Expr::Index(obj, idx) => {
                let base = self.eval(obj, scope)?;
                let key = self.eval(idx, scope)?;
                match (&base, &key) {
                    (Value::Sequence(items), Value::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => {
                        items
                            .get(*n as usize)
                            .filter(|v| !v.is_null())
                            .cloned()
                            .ok_or(Unresolved::Undefined)
                    }
                    (Value::Hash(_), Value::String(k)) => {
                        base.field(k).cloned().ok_or(Unresolved::Undefined)
                    }
                    _ => Err(Unresolved::Undefined),
                }
            }
            Expr::Neg(inner) => Ok(Value::Number(-self.number(inner, scope)?)),
            Expr::BinOp(lhs, op, rhs) => {
                let l = self.number(lhs, scope)?;
                let r = self.number(rhs, scope)?;
                arith::apply(*op, l, r)
                    .map(Value::Number)
                    .ok_or(Unresolved::Invalid)
            }
            // An unresolved side makes only this comparison false.
            Expr::Compare(lhs, op, rhs) => match (self.eval(lhs, scope), self.eval(rhs, scope)) {
                (Ok(l), Ok(r)) => {
                    let result = arith::compare(*op, &l, &r);
                    trace!(?l, ?op, ?r, result, "comparison");
                    Ok(Value::Bool(result))
                }
                (l, r) => {
                    trace!(?l, ?op, ?r, "comparison with an unresolved side");
                    Ok(Value::Bool(false))
                }
            },
            Expr::And(lhs, rhs) => {
                Ok(Value::Bool(self.holds(lhs, scope) && self.holds(rhs, scope)))
            }
            Expr::Or(lhs, rhs) => Ok(Value::Bool(self.holds(lhs, scope) || self.holds(rhs, scope))),
            Expr::Not(inner) => Ok(Value::Bool(!self.holds(inner, scope))),
            Expr::Exists(inner) => Ok(Value::Bool(self.eval(inner, scope).is_ok())),
            Expr::Default(inner, fallback) => self.eval(inner, scope).or_else(|_| match fallback {
                Some(f) => self.eval(f, scope),
                None => Ok(Value::String(String::new())),
            }),
            Expr::Builtin { target, name, args } => {
                let Some(builtin) = Builtin::from_name(name) else {
                    debug!(builtin = %name, "unknown built-in");
                    return Err(Unresolved::Undefined);
                };
                let base = self.eval(target, scope);
                let args = args
                    .iter()
                    .map(|a| self.eval(a, scope))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let loop_state = match target.as_ref() {
                    Expr::Var(name) => self.scopes.loop_state(scope, name),
                    _ => None,
                };
                builtins::apply(builtin, base, &args, loop_state)
            }
        }
    }
}

/// Hoist every `<#assign>` in the tree, nested ones included, into `globals`.
fn bind_assignments(nodes: &[Node], globals: &mut HashMap<String, Value>) {
    for node in nodes {
        match node {
            Node::Assign {
                name,
                value: Some(value),
            } => {
                debug!(name = %name, ?value, "assigned");
                globals.insert(name.clone(), value.clone());
            }
            Node::Assign { name, value: None } => {
                warn!(name = %name, "assignment value is not a literal; skipped");
            }
            Node::List {
                body, else_body, ..
            } => {
                bind_assignments(body, globals);
                if let Some(nodes) = else_body {
                    bind_assignments(nodes, globals);
                }
            }
            Node::If { cases, else_body } => {
                for (_, body) in cases {
                    bind_assignments(body, globals);
                }
                if let Some(nodes) = else_body {
                    bind_assignments(nodes, globals);
                }
            }
            Node::Text(_) | Node::Interpolation { .. } => {}
        }
    }
}
