use serde::{Deserialize, Serialize};

/// Default limit for block nesting and for expression depth.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Knobs for a render call. Missing fields take their defaults when loaded
/// from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Placed between the expanded iterations of a `<#list>` block.
    pub loop_separator: String,

    /// Trim leading and trailing whitespace of the final output.
    pub trim_output: bool,

    /// Total loop iterations allowed in one render. `None` means unbounded.
    pub max_loop_iterations: Option<usize>,

    /// Deepest block nesting the parser accepts. Also bounds the depth of
    /// each expression; deeper expressions render as undefined.
    pub max_depth: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            loop_separator: "\n".to_string(),
            trim_output: true,
            max_loop_iterations: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl RenderOptions {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn with_loop_separator(mut self, separator: impl Into<String>) -> Self {
        self.loop_separator = separator.into();
        self
    }

    pub fn with_max_loop_iterations(mut self, limit: usize) -> Self {
        self.max_loop_iterations = Some(limit);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_trim_output(mut self, trim: bool) -> Self {
        self.trim_output = trim;
        self
    }
}
