//! `?name` built-ins.

use crate::arith;
use crate::eval::Unresolved;
use crate::scope::LoopState;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Size,
    Int,
    UpperCase,
    LowerCase,
    CapFirst,
    Capitalize,
    Trim,
    Length,
    First,
    Last,
    Floor,
    Ceiling,
    Round,
    Abs,
    C,
    Number,
    HasContent,
    Join,
    Contains,
    String,
    // Loop variables only.
    Index,
    Counter,
    HasNext,
    IsFirst,
    IsLast,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "size" => Builtin::Size,
            "int" => Builtin::Int,
            "upper_case" => Builtin::UpperCase,
            "lower_case" => Builtin::LowerCase,
            "cap_first" => Builtin::CapFirst,
            "capitalize" => Builtin::Capitalize,
            "trim" => Builtin::Trim,
            "length" => Builtin::Length,
            "first" => Builtin::First,
            "last" => Builtin::Last,
            "floor" => Builtin::Floor,
            "ceiling" => Builtin::Ceiling,
            "round" => Builtin::Round,
            "abs" => Builtin::Abs,
            "c" => Builtin::C,
            "number" => Builtin::Number,
            "has_content" => Builtin::HasContent,
            "join" => Builtin::Join,
            "contains" => Builtin::Contains,
            "string" => Builtin::String,
            "index" => Builtin::Index,
            "counter" => Builtin::Counter,
            "has_next" => Builtin::HasNext,
            "is_first" => Builtin::IsFirst,
            "is_last" => Builtin::IsLast,
            _ => return None,
        })
    }
}

type Outcome = Result<Value, Unresolved>;

/// Apply `builtin` to an already evaluated base. `loop_state` is set when the
/// base expression names a loop variable in scope.
pub(crate) fn apply(
    builtin: Builtin,
    base: Outcome,
    args: &[Value],
    loop_state: Option<LoopState>,
) -> Outcome {
    match builtin {
        // These two report 0 for anything missing instead of failing.
        Builtin::Size => Ok(Value::Number(match base {
            Ok(Value::Sequence(items)) => items.len() as f64,
            Ok(v) if v.is_truthy() => 1.0,
            _ => 0.0,
        })),
        Builtin::Int => {
            let n = base.ok().as_ref().and_then(arith::operand).unwrap_or(0.0);
            Ok(Value::Number(n.floor()))
        }
        Builtin::HasContent => Ok(Value::Bool(base.is_ok_and(|v| v.has_content()))),

        Builtin::Index => positional(loop_state, |s| Value::Number(s.index as f64)),
        Builtin::Counter => positional(loop_state, |s| Value::Number((s.index + 1) as f64)),
        Builtin::HasNext => positional(loop_state, |s| Value::Bool(s.has_next())),
        Builtin::IsFirst => positional(loop_state, |s| Value::Bool(s.index == 0)),
        Builtin::IsLast => positional(loop_state, |s| Value::Bool(!s.has_next())),

        _ => apply_to_value(builtin, base?, args),
    }
}

fn positional(state: Option<LoopState>, f: impl FnOnce(LoopState) -> Value) -> Outcome {
    state.map(f).ok_or(Unresolved::Undefined)
}

fn map_string(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

fn map_number(value: &Value, f: impl FnOnce(f64) -> f64) -> Outcome {
    arith::operand(value)
        .map(|n| Value::Number(f(n)))
        .ok_or(Unresolved::Invalid)
}

fn cap_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn capitalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            at_word_start = false;
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

fn apply_to_value(builtin: Builtin, value: Value, args: &[Value]) -> Outcome {
    match builtin {
        Builtin::UpperCase => Ok(map_string(value, str::to_uppercase)),
        Builtin::LowerCase => Ok(map_string(value, str::to_lowercase)),
        Builtin::CapFirst => Ok(map_string(value, cap_first)),
        Builtin::Capitalize => Ok(map_string(value, capitalize)),
        Builtin::Trim => Ok(map_string(value, |s| s.trim().to_string())),
        Builtin::Length => Ok(Value::Number(value.to_string().chars().count() as f64)),
        Builtin::First => match value {
            Value::Sequence(items) => items.into_iter().next().ok_or(Unresolved::Undefined),
            _ => Err(Unresolved::Undefined),
        },
        Builtin::Last => match value {
            Value::Sequence(items) => items.into_iter().last().ok_or(Unresolved::Undefined),
            _ => Err(Unresolved::Undefined),
        },
        Builtin::Floor => map_number(&value, f64::floor),
        Builtin::Ceiling => map_number(&value, f64::ceil),
        Builtin::Round => map_number(&value, |n| (n + 0.5).floor()),
        Builtin::Abs => map_number(&value, f64::abs),
        Builtin::Number => map_number(&value, |n| n),
        Builtin::C => Ok(Value::String(value.to_string())),
        Builtin::Join => {
            let separator = match args.first() {
                Some(sep) => sep.to_string(),
                None => ", ".to_string(),
            };
            match value {
                Value::Sequence(items) => Ok(Value::String(
                    items
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(&separator),
                )),
                _ => Err(Unresolved::Invalid),
            }
        }
        Builtin::Contains => {
            let needle = args.first().ok_or(Unresolved::Invalid)?;
            match &value {
                Value::String(s) => Ok(Value::Bool(s.contains(&needle.to_string()))),
                Value::Sequence(items) => Ok(Value::Bool(
                    items.iter().any(|item| arith::loose_eq(item, needle)),
                )),
                _ => Err(Unresolved::Invalid),
            }
        }
        Builtin::String => Ok(format_string(value, args)),
        // Resolved in `apply` before the base is unwrapped.
        Builtin::Size
        | Builtin::Int
        | Builtin::HasContent
        | Builtin::Index
        | Builtin::Counter
        | Builtin::HasNext
        | Builtin::IsFirst
        | Builtin::IsLast => Err(Unresolved::Undefined),
    }
}

/// `?string`, `?string("0.00")` and `?string("yes", "no")`.
fn format_string(value: Value, args: &[Value]) -> Value {
    match (&value, args) {
        (Value::Bool(b), [when_true, when_false, ..]) => {
            let chosen = if *b { when_true } else { when_false };
            Value::String(chosen.to_string())
        }
        (_, [pattern, ..]) => match arith::operand(&value) {
            Some(n) => {
                let decimals = arith::pattern_decimals(&pattern.to_string());
                Value::String(arith::format_fixed(n, decimals))
            }
            None => Value::String(value.to_string()),
        },
        _ => Value::String(value.to_string()),
    }
}
