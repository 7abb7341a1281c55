use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    NumberLit(f64),
    StringLit(String),
    BoolLit(bool),
    SeqLit(Vec<Expr>),
    HashLit(Vec<(String, Expr)>),
    Var(String),
    Attribute(Box<Expr>, String), // foo.bar
    Index(Box<Expr>, Box<Expr>),  // foo[0], foo['bar']
    Neg(Box<Expr>),
    BinOp(Box<Expr>, BinOp, Box<Expr>),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Exists(Box<Expr>),                   // foo??
    Default(Box<Expr>, Option<Box<Expr>>), // foo!'fallback'
    Builtin {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Levels in the tree; a leaf is 1.
    pub fn depth(&self) -> usize {
        1 + match self {
            Expr::NumberLit(_) | Expr::StringLit(_) | Expr::BoolLit(_) | Expr::Var(_) => 0,
            Expr::SeqLit(items) => items.iter().map(Expr::depth).max().unwrap_or(0),
            Expr::HashLit(entries) => entries.iter().map(|(_, e)| e.depth()).max().unwrap_or(0),
            Expr::Attribute(inner, _)
            | Expr::Neg(inner)
            | Expr::Not(inner)
            | Expr::Exists(inner)
            | Expr::Default(inner, None) => inner.depth(),
            Expr::Index(lhs, rhs)
            | Expr::BinOp(lhs, _, rhs)
            | Expr::Compare(lhs, _, rhs)
            | Expr::And(lhs, rhs)
            | Expr::Or(lhs, rhs)
            | Expr::Default(lhs, Some(rhs)) => lhs.depth().max(rhs.depth()),
            Expr::Builtin { target, args, .. } => {
                args.iter().map(Expr::depth).max().unwrap_or(0).max(target.depth())
            }
        }
    }

    /// The value of a literal expression, or `None` if it refers to anything
    /// that needs the environment.
    pub fn literal_value(&self) -> Option<Value> {
        match self {
            Expr::NumberLit(n) => Some(Value::Number(*n)),
            Expr::StringLit(s) => Some(Value::String(s.clone())),
            Expr::BoolLit(b) => Some(Value::Bool(*b)),
            Expr::Neg(inner) => match inner.as_ref() {
                Expr::NumberLit(n) => Some(Value::Number(-n)),
                _ => None,
            },
            Expr::SeqLit(items) => items
                .iter()
                .map(Expr::literal_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::Sequence),
            Expr::HashLit(entries) => entries
                .iter()
                .map(|(k, v)| v.literal_value().map(|v| (k.clone(), v)))
                .collect::<Option<HashMap<_, _>>>()
                .map(Value::Hash),
            _ => None,
        }
    }
}

/// A condition of an `<#if>`/`<#elseif>` tag. `expr` is `None` when the text
/// did not parse; such a condition is always false.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub source: String,
    pub expr: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Interpolation {
        source: String, // marker body, used in diagnostics
        expr: Option<Expr>,
    },
    Assign {
        name: String,
        value: Option<Value>, // None when the right-hand side is not a literal
    },
    List {
        source: String,
        iterable: Option<Expr>,
        target: String, // e.g., "item"
        body: Vec<Node>,
        else_body: Option<Vec<Node>>,
    },
    If {
        cases: Vec<(Condition, Vec<Node>)>, // Includes if and elseifs.
        else_body: Option<Vec<Node>>,
    },
}
