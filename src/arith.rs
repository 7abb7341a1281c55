//! Numeric operands, arithmetic and comparisons.

use crate::ast::{BinOp, CmpOp};
use crate::value::Value;
use std::cmp::Ordering;

/// A string made only of digits, one optional `.`, and an optional leading
/// sign. Exponents, `inf` and `NaN` are not numbers here.
pub(crate) fn parse_numeric(s: &str) -> Option<f64> {
    let s = s.trim();
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    if digits.is_empty()
        || digits.matches('.').count() > 1
        || !digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        || !digits.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }
    s.parse().ok()
}

/// The number an arithmetic operand stands for: numbers and numeric strings.
pub(crate) fn operand(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::String(s) => parse_numeric(s),
        _ => None,
    }
}

/// `None` when the result is not a finite number (e.g. division by zero).
pub(crate) fn apply(op: BinOp, lhs: f64, rhs: f64) -> Option<f64> {
    let result = match op {
        BinOp::Add => lhs + rhs,
        BinOp::Sub => lhs - rhs,
        BinOp::Mul => lhs * rhs,
        BinOp::Div => lhs / rhs,
    };
    result.is_finite().then_some(result)
}

fn coerce(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        other => operand(other),
    }
}

/// Loose equality: numbers and numeric strings compare by value.
pub(crate) fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Sequence(_), Value::Sequence(_)) | (Value::Hash(_), Value::Hash(_)) => lhs == rhs,
        _ => match (coerce(lhs), coerce(rhs)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

pub(crate) fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> bool {
    let ordering = match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => match (parse_numeric(a), parse_numeric(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => Some(a.cmp(b)),
        },
        _ => match (coerce(lhs), coerce(rhs)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    match op {
        CmpOp::Eq => loose_eq(lhs, rhs),
        CmpOp::Ne => !loose_eq(lhs, rhs),
        CmpOp::Lt => ordering == Some(Ordering::Less),
        CmpOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => ordering == Some(Ordering::Greater),
        CmpOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    }
}

pub(crate) fn format_fixed(n: f64, decimals: usize) -> String {
    format!("{n:.decimals$}")
}

/// Decimal places requested by a number pattern such as `"0.00"` or `"#.##"`.
/// Patterns that are not digit masks fall back to two places.
pub(crate) fn pattern_decimals(pattern: &str) -> usize {
    let is_mask = |s: &str| s.chars().all(|c| matches!(c, '0' | '#' | ','));
    match pattern.split_once('.') {
        Some((int, frac)) if is_mask(int) && is_mask(frac) => frac.len(),
        None if !pattern.is_empty() && is_mask(pattern) => 0,
        _ => 2,
    }
}
