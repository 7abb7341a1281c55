//! ftlplay: minimal FreeMarker-like engine for documentation playground snippets.
//!
//! The crate takes a template string and a JSON data context and returns the
//! rendered text. It understands a small, auditable subset of FreeMarker:
//!
//! - `${expr}` markers with dotted paths, arithmetic (`+ - * /`, parentheses)
//!   and built-in suffixes such as `?upper_case`, `?size`, `?int` or
//!   `?string["0.00"]`.
//! - `<#assign name = literal>` with string, number, boolean, sequence and
//!   hash literals.
//! - `<#list source as item> ... </#list>` over literal or context sequences,
//!   with `item?index`, `item?has_next` and friends. Loops nest.
//! - `<#if> / <#elseif> / <#else> / </#if>` with comparisons, `?has_content`,
//!   `??`, `&&`, `||` and `!`. Conditionals nest.
//! - `<#-- comments -->`, which are dropped.
//!
//! Missing data never fails a render. Anything the engine cannot resolve is
//! replaced inline with a bracketed diagnostic such as `[Undefined: user.name]`,
//! so a half-working template still shows useful output. Only invalid JSON
//! data and block structure the parser cannot accept abort the call.
//!
//! Not supported: macros, includes, whitespace control, method calls.
//!
//! ```
//! let response = ftlplay::render("Hello ${name}!", Some(r#"{"name": "World"}"#));
//! assert_eq!(response.output(), Some("Hello World!"));
//! ```

pub mod ast;
mod arith;
mod builtins;
pub mod config;
pub mod error;
mod eval;
pub mod expr;
pub mod lexer;
pub mod parser;
mod scope;
pub mod value;

pub use config::RenderOptions;
pub use error::{Error, Result};
pub use value::Value;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A parsed template, reusable across renders.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<ast::Node>,
    options: RenderOptions,
}

impl Template {
    pub fn parse(source: &str, options: &RenderOptions) -> Result<Self> {
        let nodes = parser::Parser::new(source, options).parse()?;
        Ok(Self {
            nodes,
            options: options.clone(),
        })
    }

    pub fn nodes(&self) -> &[ast::Node] {
        &self.nodes
    }

    /// Render against a JSON object. `null` stands for an empty context.
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn render(&self, context: &serde_json::Value) -> Result<String> {
        let globals: HashMap<String, Value> = match context {
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v)))
                .collect(),
            serde_json::Value::Null => HashMap::new(),
            _ => return Err(Error::ContextNotObject),
        };

        let mut evaluator = eval::Evaluator::new(globals, &self.nodes, &self.options);
        let output = evaluator.render(&self.nodes)?;
        Ok(if self.options.trim_output {
            output.trim().to_string()
        } else {
            output
        })
    }
}

/// Result object of the playground endpoint:
/// `{"output": "...", "success": true}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RenderResponse {
    Rendered { output: String, success: bool },
    Failed { error: String },
}

impl RenderResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, RenderResponse::Rendered { success: true, .. })
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            RenderResponse::Rendered { output, .. } => Some(output),
            RenderResponse::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RenderResponse::Failed { error } => Some(error),
            RenderResponse::Rendered { .. } => None,
        }
    }
}

impl From<Result<String>> for RenderResponse {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(output) => RenderResponse::Rendered {
                output,
                success: true,
            },
            Err(err) => RenderResponse::Failed {
                error: err.to_string(),
            },
        }
    }
}

/// Parse the optional `data` field. Empty text means "no context".
pub fn parse_context(data: Option<&str>) -> Result<serde_json::Value> {
    match data.map(str::trim) {
        None | Some("") => Ok(serde_json::Value::Object(serde_json::Map::new())),
        Some(text) => {
            let value: serde_json::Value =
                serde_json::from_str(text).map_err(Error::InvalidData)?;
            if value.is_object() {
                Ok(value)
            } else {
                Err(Error::ContextNotObject)
            }
        }
    }
}

/// Render `template` against an already-parsed JSON context.
pub fn render_value(template: &str, context: &serde_json::Value) -> Result<String> {
    Template::parse(template, &RenderOptions::default())?.render(context)
}

/// Render with default options. `data` is JSON text, as the playground
/// endpoint receives it.
pub fn render(template: &str, data: Option<&str>) -> RenderResponse {
    render_with_options(template, data, &RenderOptions::default())
}

#[tracing::instrument(skip_all, fields(template_len = template.len()))]
pub fn render_with_options(
    template: &str,
    data: Option<&str>,
    options: &RenderOptions,
) -> RenderResponse {
    let result = parse_context(data)
        .and_then(|context| Template::parse(template, options)?.render(&context));
    if let Err(err) = &result {
        debug!(%err, "render failed");
    }
    result.into()
}
