//! Sandboxed JavaScript transforms for Mica views
//!
//! A view may carry a script that reshapes the whole batch of rendered
//! items. Scripts run in QuickJS via rquickjs with no host access: no
//! filesystem, network, process, environment, or module loader.
//!
//! # Architecture
//!
//! - **Fresh runtime per evaluation**: nothing leaks between scripts
//! - **Bounded pool**: a semaphore caps concurrent evaluations, each on a
//!   blocking thread so a busy script never stalls the async executor
//! - **Three stops**: a wall-clock deadline and a step budget checked from the
//!   QuickJS interrupt handler, plus host cancellation
//!
//! # Script contract
//!
//! The global `input` holds the item array and `params` the render
//! parameters. The script's completion value is its result; if that value is
//! a function it is called as `f(input, params)`. Either way the result must
//! be an array.
//!
//! ```rust,no_run
//! use mica_js::{ScriptEvaluator, ScriptLimits};
//! use serde_json::json;
//!
//! # async fn example() {
//! let evaluator = ScriptEvaluator::new(ScriptLimits::default());
//! let out = evaluator
//!     .evaluate("input.map(x => x * 2)", &[json!(1), json!(2)], &json!({}))
//!     .await;
//! assert_eq!(out.unwrap(), vec![json!(2), json!(4)]);
//! # }
//! ```

pub mod bridge;
pub mod error;
pub mod limits;
mod sandbox;

pub use error::{JsError, Result};
pub use limits::ScriptLimits;

use sandbox::Interrupt;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Extra time the host waits past the deadline before giving up on the worker
const BACKSTOP_GRACE: Duration = Duration::from_millis(500);

/// Runs transform scripts in isolated, resource-limited runtimes
///
/// Cheap to clone; clones share the worker pool.
#[derive(Debug, Clone)]
pub struct ScriptEvaluator {
    limits: ScriptLimits,
    permits: Arc<Semaphore>,
}

/// Stops the script if the awaiting future is dropped
struct StopOnDrop(Arc<Interrupt>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl ScriptEvaluator {
    pub fn new(limits: ScriptLimits) -> Self {
        let permits = Arc::new(Semaphore::new(limits.workers.max(1)));
        Self { limits, permits }
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }

    /// Evaluate `source` against `input` with `params` bound
    pub async fn evaluate(&self, source: &str, input: &[Value], params: &Value) -> Result<Vec<Value>> {
        self.evaluate_with_cancel(source, input, params, &CancellationToken::new())
            .await
    }

    /// Evaluate, stopping early with [`JsError::Interrupted`] once `cancel` fires
    pub async fn evaluate_with_cancel(
        &self,
        source: &str,
        input: &[Value],
        params: &Value,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>> {
        let started = Instant::now();
        let interrupt = Arc::new(Interrupt::new(
            started + self.limits.timeout,
            self.limits.step_budget,
        ));
        let _stop_on_drop = StopOnDrop(interrupt.clone());

        let input_json = serde_json::to_string(input)?;
        let params_json = serde_json::to_string(params)?;

        let work = async {
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| JsError::runtime("script worker pool is closed"))?;
            let source = source.to_string();
            let limits = self.limits.clone();
            let state = interrupt.clone();
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                sandbox::run(&source, input_json, params_json, &limits, state)
            })
            .await
            .map_err(|e| JsError::runtime(format!("script worker failed: {}", e)))?
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                interrupt.cancel();
                Err(JsError::Interrupted)
            }
            finished = tokio::time::timeout(self.limits.timeout + BACKSTOP_GRACE, work) => {
                match finished {
                    Ok(result) => result,
                    Err(_) => {
                        interrupt.expire();
                        warn!(
                            limit_ms = self.limits.timeout_ms(),
                            "script worker did not stop at its deadline"
                        );
                        Err(JsError::Timeout { limit_ms: self.limits.timeout_ms() })
                    }
                }
            }
        };

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "script evaluated"
        );
        outcome
    }
}

impl Default for ScriptEvaluator {
    fn default() -> Self {
        Self::new(ScriptLimits::default())
    }
}
