//! Per-item shaping: jsonPath extraction then JSON Patch

use json_patch::Patch;
use serde_json::Value;
use serde_json_path::JsonPath;

/// Compiled `data.jsonPath` and `data.jsonPatch` of one view
#[derive(Debug, Clone)]
pub struct Shaper {
    path: JsonPath,
    definite: bool,
    patch: Option<Patch>,
}

impl Shaper {
    /// Compile a path expression; the error is the parser's message
    pub fn new(expression: &str, patch: Option<Patch>) -> Result<Self, String> {
        let path = JsonPath::parse(expression).map_err(|e| e.to_string())?;
        Ok(Self {
            path,
            definite: is_definite(expression),
            patch,
        })
    }

    /// Whether the path can match at most one node
    pub fn is_definite(&self) -> bool {
        self.definite
    }

    /// Evaluate the path against one item's data
    ///
    /// A definite path yields the matched node itself; any other path yields
    /// the array of matches. No match at all yields `None`.
    pub fn extract(&self, data: &Value) -> Option<Value> {
        let nodes = self.path.query(data).all();
        if nodes.is_empty() {
            return None;
        }
        if self.definite {
            nodes.into_iter().next().cloned()
        } else {
            Some(Value::Array(nodes.into_iter().cloned().collect()))
        }
    }

    /// Apply the patch, if any, to an extracted value
    pub fn patch(&self, mut value: Value) -> Result<Value, String> {
        if let Some(patch) = &self.patch {
            json_patch::patch(&mut value, &patch.0).map_err(|e| e.to_string())?;
        }
        Ok(value)
    }
}

/// Lexical check for selectors that can fan out
///
/// Wildcards, descendant segments, filters, slices and unions make a path
/// indefinite. Quoted member names are skipped.
fn is_definite(expression: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut previous = '\0';
    for c in expression.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            previous = c;
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '*' | '?' | ':' | ',' => return false,
            '.' if previous == '.' => return false,
            _ => {}
        }
        previous = c;
    }
    true
}
