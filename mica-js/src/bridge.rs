//! JSON crossing of the sandbox boundary
//!
//! Values enter the runtime as JSON text parsed inside QuickJS and leave it
//! through `JSON.stringify`. No host object is ever handed to a script.

use crate::error::JsError;
use rquickjs::{Ctx, Value};

/// Parse JSON text into a fresh value owned by the sandbox
pub fn json_to_js<'js>(ctx: &Ctx<'js>, json: String) -> std::result::Result<Value<'js>, JsError> {
    ctx.json_parse(json)
        .map_err(|e| JsError::type_conversion(format!("JSON.parse failed: {}", e)))
}

/// Convert a sandbox value back to serde_json by round-tripping through JSON.stringify()
///
/// - undefined and functions become null
/// - everything else goes through JSON.stringify -> serde_json::from_str
pub fn js_to_json<'js>(
    ctx: &Ctx<'js>,
    value: Value<'js>,
) -> std::result::Result<serde_json::Value, JsError> {
    if value.is_undefined() || value.is_null() || value.is_function() {
        return Ok(serde_json::Value::Null);
    }

    match ctx.json_stringify(value) {
        Ok(Some(js_string)) => {
            let s: String = js_string
                .to_string()
                .map_err(|e| JsError::type_conversion(format!("String conversion failed: {}", e)))?;
            serde_json::from_str(&s)
                .map_err(|e| JsError::type_conversion(format!("JSON parse failed: {}", e)))
        }
        // JSON.stringify returns undefined for symbols
        Ok(None) => Ok(serde_json::Value::Null),
        Err(e) => Err(JsError::type_conversion(format!(
            "JSON.stringify failed: {}",
            e
        ))),
    }
}
