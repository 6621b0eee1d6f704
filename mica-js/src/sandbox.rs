//! One evaluation in a fresh QuickJS runtime
//!
//! Every evaluation gets its own runtime and context, so nothing a script
//! assigns survives into the next one. The runtime is dropped on return.

use crate::bridge::{js_to_json, json_to_js};
use crate::error::{JsError, Result};
use crate::limits::ScriptLimits;
use rquickjs::{CatchResultExt, CaughtError, Context, Runtime};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Instant;

const RUNNING: u8 = 0;
const DEADLINE: u8 = 1;
const STEPS: u8 = 2;
const CANCELLED: u8 = 3;

/// Shared stop state between the interrupt handler and the host
#[derive(Debug)]
pub(crate) struct Interrupt {
    deadline: Instant,
    step_budget: u64,
    steps: AtomicU64,
    reason: AtomicU8,
}

impl Interrupt {
    pub(crate) fn new(deadline: Instant, step_budget: u64) -> Self {
        Self {
            deadline,
            step_budget,
            steps: AtomicU64::new(0),
            reason: AtomicU8::new(RUNNING),
        }
    }

    /// Called by QuickJS periodically; `true` aborts the script
    pub(crate) fn poll(&self) -> bool {
        if self.reason.load(Ordering::Acquire) != RUNNING {
            return true;
        }
        let steps = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        if steps > self.step_budget {
            self.stop(STEPS);
            return true;
        }
        if Instant::now() >= self.deadline {
            self.stop(DEADLINE);
            return true;
        }
        false
    }

    pub(crate) fn cancel(&self) {
        self.stop(CANCELLED);
    }

    pub(crate) fn expire(&self) {
        self.stop(DEADLINE);
    }

    fn stop(&self, reason: u8) {
        // First reason wins
        let _ = self
            .reason
            .compare_exchange(RUNNING, reason, Ordering::AcqRel, Ordering::Acquire);
    }

    /// The error describing why the script was stopped, if it was
    pub(crate) fn error(&self, limits: &ScriptLimits) -> Option<JsError> {
        match self.reason.load(Ordering::Acquire) {
            DEADLINE => Some(JsError::Timeout {
                limit_ms: limits.timeout_ms(),
            }),
            STEPS => Some(JsError::StepLimitExceeded {
                budget: self.step_budget,
            }),
            CANCELLED => Some(JsError::Interrupted),
            _ => None,
        }
    }
}

/// Run `source` against `input` and `params`, both already JSON text
///
/// The script's completion value is the result. If it is a function, it is
/// called with `(input, params)` and its return value is the result. The
/// result must be an array.
pub(crate) fn run(
    source: &str,
    input_json: String,
    params_json: String,
    limits: &ScriptLimits,
    interrupt: std::sync::Arc<Interrupt>,
) -> Result<Vec<Value>> {
    if let Some(stopped) = interrupt.error(limits) {
        return Err(stopped);
    }
    if Instant::now() >= interrupt.deadline {
        interrupt.expire();
        return Err(JsError::Timeout {
            limit_ms: limits.timeout_ms(),
        });
    }

    let runtime =
        Runtime::new().map_err(|e| JsError::runtime(format!("Failed to create runtime: {}", e)))?;
    runtime.set_memory_limit(limits.memory_limit);
    runtime.set_max_stack_size(limits.max_stack_size);
    let handler_state = interrupt.clone();
    runtime.set_interrupt_handler(Some(Box::new(move || handler_state.poll())));

    let context = Context::full(&runtime)
        .map_err(|e| JsError::runtime(format!("Failed to create context: {}", e)))?;

    let outcome = context.with(|ctx| -> Result<Value> {
        let input = json_to_js(&ctx, input_json)?;
        let params = json_to_js(&ctx, params_json)?;

        let globals = ctx.globals();
        globals
            .set("input", input.clone())
            .map_err(|e| JsError::runtime(e.to_string()))?;
        globals
            .set("params", params.clone())
            .map_err(|e| JsError::runtime(e.to_string()))?;

        let completion: rquickjs::Value = ctx
            .eval(source.as_bytes())
            .catch(&ctx)
            .map_err(describe_caught)?;

        let result = match completion.as_function() {
            Some(transform) => transform
                .call::<_, rquickjs::Value>((input, params))
                .catch(&ctx)
                .map_err(describe_caught)?,
            None => completion.clone(),
        };

        js_to_json(&ctx, result)
    });

    // A stopped script surfaces as an uncatchable exception; report the cause.
    if let Some(stopped) = interrupt.error(limits) {
        if outcome.is_err() {
            return Err(stopped);
        }
    }

    match outcome? {
        Value::Array(items) => Ok(items),
        other => Err(JsError::invalid_output(format!(
            "script must return an array, got {}",
            type_name(&other)
        ))),
    }
}

fn describe_caught(caught: CaughtError<'_>) -> JsError {
    match caught {
        CaughtError::Exception(exception) => {
            let message = exception.message().unwrap_or_default();
            match exception.stack() {
                Some(stack) if !stack.is_empty() => {
                    JsError::script(format!("{}\n{}", message, stack.trim_end()))
                }
                _ => JsError::script(message),
            }
        }
        CaughtError::Value(value) => {
            let rendered = value
                .as_string()
                .and_then(|s| s.to_string().ok())
                .unwrap_or_else(|| format!("{:?}", value));
            JsError::script(format!("uncaught value: {}", rendered))
        }
        CaughtError::Error(error) => JsError::script(error.to_string()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
