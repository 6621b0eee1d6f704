//! The render pipeline
//!
//! parameters → selection → jsonPath → JSON Patch → script → flatten →
//! merge → output validation → history. Items are shaped as they stream
//! out of the fetch cursor; nothing is collected before shaping starts.

use crate::aggregate::{self, Row};
use crate::definition::{ResolvedView, ScriptSpec};
use crate::error::{RenderError, Result};
use crate::params::resolve_parameters;
use crate::request::{ItemError, RenderRequest, RenderedView, ViewTarget};
use crate::source::{HistorySink, ViewSource};
use futures::StreamExt;
use mica_common::log_classified;
use mica_entity::kinds::{SCRIPT_KIND, SCRIPT_SOURCE_FIELD, VIEW_KIND};
use mica_entity::RenderHistoryRecord;
use mica_fetch::EntityFetchers;
use mica_js::ScriptEvaluator;
use mica_validation::{ValidationMode, Validator};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const FETCH_STAGE: &str = "fetch";
const PATCH_STAGE: &str = "jsonPatch";

/// Executes views against the registered fetchers
#[derive(Clone)]
pub struct ViewRenderer {
    fetchers: Arc<EntityFetchers>,
    evaluator: ScriptEvaluator,
    views: Arc<dyn ViewSource>,
    history: Option<Arc<dyn HistorySink>>,
    strict_by_default: bool,
    default_limit: Option<usize>,
}

impl std::fmt::Debug for ViewRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRenderer")
            .field("fetchers", &self.fetchers)
            .field("records_history", &self.history.is_some())
            .field("strict_by_default", &self.strict_by_default)
            .field("default_limit", &self.default_limit)
            .finish_non_exhaustive()
    }
}

impl ViewRenderer {
    pub fn new(
        fetchers: Arc<EntityFetchers>,
        evaluator: ScriptEvaluator,
        views: Arc<dyn ViewSource>,
    ) -> Self {
        Self {
            fetchers,
            evaluator,
            views,
            history: None,
            strict_by_default: false,
            default_limit: None,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    /// Strictness used when a request does not say
    pub fn strict_by_default(mut self, strict: bool) -> Self {
        self.strict_by_default = strict;
        self
    }

    /// Row cap for views whose selector sets no `limit`
    pub fn with_default_limit(mut self, limit: Option<usize>) -> Self {
        self.default_limit = limit;
        self
    }

    pub async fn render(&self, request: RenderRequest) -> Result<RenderedView> {
        self.render_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Render, abandoning fetches and scripts once `cancel` fires
    pub async fn render_with_cancel(
        &self,
        request: RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<RenderedView> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RenderError::Cancelled),
            rendered = self.execute(request, cancel) => rendered,
        };
        if let Err(error) = &outcome {
            log_classified("render failed", error);
        }
        outcome
    }

    async fn execute(
        &self,
        request: RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<RenderedView> {
        let view = self.resolve(request.target()?)?;
        let definition = &view.definition;
        let strict = request.strict.unwrap_or(self.strict_by_default);
        let parameters = resolve_parameters(&view.name, &definition.parameters, &request.parameters)?;
        let shaper = definition.shaper(&view.name)?;
        let script = self.script_source(&view)?;

        let mut fetch = definition.fetch_request(parameters.clone(), strict)?;
        if let (None, Some(limit)) = (definition.selector.limit, self.default_limit) {
            fetch = fetch.with_limit(limit);
        }
        let origin_of_failures = definition
            .selector
            .source
            .clone()
            .unwrap_or_else(|| definition.selector.entity_kind.clone());
        debug!(view = %view.name, kind = %definition.selector.entity_kind, strict, "rendering view");

        let started = Instant::now();
        let mut shaping = Duration::ZERO;
        let mut fetched_count = 0u64;
        let mut item_errors = Vec::new();
        let mut rows = Vec::new();

        let mut cursor = self.fetchers.fetch_all(fetch);
        while let Some(item) = cursor.next().await {
            let fetched = match item {
                Ok(fetched) => fetched,
                Err(error) if strict => return Err(error.into()),
                Err(error) => {
                    warn!(view = %view.name, error = %error, "skipping failed source");
                    item_errors.push(ItemError::new(
                        origin_of_failures.clone(),
                        FETCH_STAGE,
                        error.to_string(),
                    ));
                    continue;
                }
            };
            fetched_count += 1;

            let shape_started = Instant::now();
            let name = fetched.entity.name().to_string();
            let data = Value::Object(fetched.entity.data().clone());
            if let Some(extracted) = shaper.extract(&data) {
                match shaper.patch(extracted) {
                    Ok(value) => rows.push(Row::new(name, value)),
                    Err(message) => {
                        let error = ItemError::new(name, PATCH_STAGE, message);
                        if strict {
                            return Err(error.into());
                        }
                        debug!(view = %view.name, entity = %error.entity, "patch failed, skipping item");
                        item_errors.push(error);
                    }
                }
            }
            shaping += shape_started.elapsed();
        }
        let select_time = started.elapsed().saturating_sub(shaping);

        let render_started = Instant::now();
        if let Some(source) = script {
            let input: Vec<Value> = rows.into_iter().map(|row| row.value).collect();
            let output = self
                .evaluator
                .evaluate_with_cancel(&source, &input, &Value::Object(parameters), cancel)
                .await?;
            rows = output
                .into_iter()
                .enumerate()
                .map(|(i, value)| Row::new(format!("script[{}]", i), value))
                .collect();
        }

        if definition.data.flatten {
            rows = aggregate::flatten(rows);
        }

        let (document, rendered_count) = if definition.data.merge {
            let (merged, errors) = aggregate::merge(rows);
            if strict {
                if let Some(error) = errors.into_iter().next() {
                    return Err(error.into());
                }
            } else {
                item_errors.extend(errors);
            }
            (Value::Object(merged), 1)
        } else {
            let count = rows.len() as u64;
            (Value::Array(rows.into_iter().map(|row| row.value).collect()), count)
        };

        for schema in [definition.output_schema.as_ref(), request.output_schema.as_ref()]
            .into_iter()
            .flatten()
        {
            check_output(schema, &document)?;
        }
        let render_time = shaping + render_started.elapsed();

        let rendered = RenderedView {
            document,
            fetched_count,
            rendered_count,
            item_errors,
            select_time_ms: millis(select_time),
            render_time_ms: millis(render_time),
        };
        info!(
            view = %view.name,
            fetched = rendered.fetched_count,
            rendered = rendered.rendered_count,
            skipped = rendered.item_errors.len(),
            select_ms = rendered.select_time_ms,
            render_ms = rendered.render_time_ms,
            "view rendered"
        );
        self.record_history(&view, &rendered);
        Ok(rendered)
    }

    fn resolve(&self, target: ViewTarget) -> Result<ResolvedView> {
        let entity = match target {
            ViewTarget::Inline(document) => return ResolvedView::inline(document),
            ViewTarget::Id(id) => self
                .views
                .entity_by_id(&id)?
                .ok_or_else(|| RenderError::not_found(format!("view {}", id)))?,
            ViewTarget::Name(name) => self
                .views
                .entity_by_name(&name)?
                .ok_or_else(|| RenderError::not_found(format!("view '{}'", name)))?,
        };
        if entity.kind != VIEW_KIND {
            return Err(RenderError::bad_request(format!(
                "'{}' is a {}, not a view",
                entity.name, entity.kind
            )));
        }
        ResolvedView::from_entity(&entity)
    }

    /// Inline source, or the source of the referenced script entity
    fn script_source(&self, view: &ResolvedView) -> Result<Option<String>> {
        let name = match &view.definition.data.script {
            None => return Ok(None),
            Some(ScriptSpec::Source(source)) => return Ok(Some(source.clone())),
            Some(ScriptSpec::Ref(name)) => name,
        };
        let script = self
            .views
            .entity_by_name(name)?
            .ok_or_else(|| RenderError::not_found(format!("script '{}'", name)))?;
        if script.kind != SCRIPT_KIND {
            return Err(RenderError::invalid_view(
                &view.name,
                format!("'{}' is a {}, not a script", name, script.kind),
            ));
        }
        match script.field(SCRIPT_SOURCE_FIELD) {
            Some(Value::String(source)) => Ok(Some(source.clone())),
            _ => Err(RenderError::invalid_view(
                &view.name,
                format!("script '{}' has no source", name),
            )),
        }
    }

    /// Append a history row for stored views; failures are only logged
    fn record_history(&self, view: &ResolvedView, rendered: &RenderedView) {
        let (Some(history), Some(id)) = (&self.history, view.id) else {
            return;
        };
        let record = RenderHistoryRecord::new(
            id,
            rendered.select_time_ms,
            rendered.render_time_ms,
            rendered.fetched_count,
        );
        if let Err(error) = history.record(&record) {
            warn!(view = %view.name, error = %error, "failed to record render history");
        }
    }
}

fn check_output(schema: &Value, document: &Value) -> Result<()> {
    let tree = Validator::validate_value(schema, document, ValidationMode::Standard)?;
    if tree.is_valid() {
        Ok(())
    } else {
        Err(RenderError::Output {
            errors: tree.errors(),
        })
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use mica_common::{Classify, ErrorCode};
    use mica_entity::{Entity, EntityData, PartialEntity};
    use mica_fetch::{Cursor, EntityFetcher, FetchRequest, FileFetcher, StoreFetcher};
    use mica_js::ScriptLimits;
    use mica_store::{EntityStore, StoreError};
    use serde_json::json;

    fn object(value: Value) -> EntityData {
        match value {
            Value::Object(map) => map,
            _ => panic!("object expected"),
        }
    }

    struct Harness {
        store: Arc<EntityStore>,
        renderer: ViewRenderer,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_evaluator(ScriptEvaluator::default())
        }

        fn with_evaluator(evaluator: ScriptEvaluator) -> Self {
            let store = Arc::new(EntityStore::open_in_memory().unwrap());
            let fetchers = EntityFetchers::new()
                .with(Arc::new(StoreFetcher::new(store.clone())))
                .unwrap()
                .with(Arc::new(FileFetcher::new()))
                .unwrap();
            let renderer = ViewRenderer::new(Arc::new(fetchers), evaluator, store.clone())
                .with_history(store.clone());
            Self { store, renderer }
        }

        fn entity(&self, name: &str, kind: &str, data: Value) -> Entity {
            self.store
                .create(PartialEntity::new(name, kind).with_data(object(data)))
                .unwrap()
        }

        fn view(&self, name: &str, data: Value) -> Entity {
            self.entity(name, VIEW_KIND, data)
        }

        fn demo(&self, values: &[Value]) {
            for (i, value) in values.iter().enumerate() {
                self.entity(
                    &format!("/demo/{}", (b'a' + i as u8) as char),
                    "/demo/v1",
                    json!({"value": value}),
                );
            }
        }
    }

    fn simple_view(path: &str) -> Value {
        json!({
            "selector": {"entityKind": "/demo/v1"},
            "data": {"jsonPath": path}
        })
    }

    #[tokio::test]
    async fn test_renders_values_in_fetch_order() {
        let h = Harness::new();
        h.demo(&[json!(1), json!(2)]);
        h.view("/views/values", simple_view("$.value"));

        let rendered = h
            .renderer
            .render(RenderRequest::by_name("/views/values"))
            .await
            .unwrap();
        assert_eq!(rendered.document, json!([1, 2]));
        assert_eq!(rendered.fetched_count, 2);
        assert_eq!(rendered.rendered_count, 2);
        assert!(rendered.item_errors.is_empty());
    }

    #[tokio::test]
    async fn test_limits_cap_selection() {
        let mut h = Harness::new();
        h.demo(&[json!(1), json!(2), json!(3)]);
        h.view("/views/values", simple_view("$.value"));
        let mut capped = simple_view("$.value");
        capped["selector"]["limit"] = json!(2);
        h.view("/views/capped", capped);

        h.renderer = h.renderer.clone().with_default_limit(Some(1));
        let defaulted = h.renderer.render(RenderRequest::by_name("/views/values")).await.unwrap();
        assert_eq!(defaulted.document, json!([1]));
        let own = h.renderer.render(RenderRequest::by_name("/views/capped")).await.unwrap();
        assert_eq!(own.document, json!([1, 2]));
    }

    #[tokio::test]
    async fn test_merge_is_last_key_wins() {
        let h = Harness::new();
        h.demo(&[json!(1), json!(2)]);
        let mut view = simple_view("$");
        view["data"]["merge"] = json!(true);
        h.view("/views/merged", view);

        let rendered = h
            .renderer
            .render(RenderRequest::by_name("/views/merged"))
            .await
            .unwrap();
        assert_eq!(rendered.document, json!({"value": 2}));
        assert_eq!(rendered.rendered_count, 1);
    }

    #[tokio::test]
    async fn test_unmatched_path_yields_no_row() {
        let h = Harness::new();
        h.demo(&[json!(1)]);
        h.entity("/demo/z", "/demo/v1", json!({"other": true}));
        h.view("/views/values", simple_view("$.value"));

        let rendered = h
            .renderer
            .render(RenderRequest::by_name("/views/values"))
            .await
            .unwrap();
        assert_eq!(rendered.document, json!([1]));
        assert_eq!(rendered.fetched_count, 2);
        assert!(rendered.item_errors.is_empty());
    }

    #[tokio::test]
    async fn test_flatten_then_merge() {
        let h = Harness::new();
        h.demo(&[json!([{"a": 1}, {"b": 2}]), json!([{"a": 3}])]);
        let mut view = simple_view("$.value");
        view["data"]["flatten"] = json!(true);
        h.view("/views/flat", view.clone());
        view["data"]["merge"] = json!(true);
        h.view("/views/flat-merged", view);

        let flat = h.renderer.render(RenderRequest::by_name("/views/flat")).await.unwrap();
        assert_eq!(flat.document, json!([{"a": 1}, {"b": 2}, {"a": 3}]));

        let merged = h
            .renderer
            .render(RenderRequest::by_name("/views/flat-merged"))
            .await
            .unwrap();
        assert_eq!(merged.document, json!({"a": 3, "b": 2}));
    }

    #[tokio::test]
    async fn test_rerender_is_byte_identical() {
        let h = Harness::new();
        h.demo(&[json!({"z": 1, "a": [1, 2]}), json!({"m": null})]);
        h.view("/views/values", simple_view("$.value"));

        let first = h.renderer.render(RenderRequest::by_name("/views/values")).await.unwrap();
        let second = h.renderer.render(RenderRequest::by_name("/views/values")).await.unwrap();
        assert_eq!(
            serde_json::to_string(&first.document).unwrap(),
            serde_json::to_string(&second.document).unwrap()
        );
    }

    fn patch_view() -> Value {
        json!({
            "selector": {"entityKind": "/demo/v1"},
            "data": {
                "jsonPath": "$.value",
                "jsonPatch": [{"op": "remove", "path": "/secret"}]
            }
        })
    }

    #[test_log::test(tokio::test)]
    async fn test_patch_failure_skips_item() {
        let h = Harness::new();
        h.demo(&[json!({"n": 1}), json!({"n": 2, "secret": "x"})]);
        h.view("/views/patched", patch_view());

        let rendered = h
            .renderer
            .render(RenderRequest::by_name("/views/patched"))
            .await
            .unwrap();
        assert_eq!(rendered.document, json!([{"n": 2}]));
        assert_eq!(rendered.item_errors.len(), 1);
        assert_eq!(rendered.item_errors[0].entity, "/demo/a");
        assert_eq!(rendered.item_errors[0].stage, PATCH_STAGE);
    }

    #[tokio::test]
    async fn test_patch_failure_aborts_strict_render() {
        let h = Harness::new();
        h.demo(&[json!({"n": 1}), json!({"n": 2, "secret": "x"})]);
        h.view("/views/patched", patch_view());

        let err = h
            .renderer
            .render(RenderRequest::by_name("/views/patched").strict(true))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::ItemFailed { ref stage, .. } if stage == PATCH_STAGE));
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[tokio::test]
    async fn test_strict_default_applies_when_request_is_silent() {
        let mut h = Harness::new();
        h.renderer = h.renderer.clone().strict_by_default(true);
        h.demo(&[json!({"n": 1})]);
        h.view("/views/patched", patch_view());

        assert!(h.renderer.render(RenderRequest::by_name("/views/patched")).await.is_err());
        let relaxed = h
            .renderer
            .render(RenderRequest::by_name("/views/patched").strict(false))
            .await
            .unwrap();
        assert_eq!(relaxed.item_errors.len(), 1);
    }

    #[tokio::test]
    async fn test_inline_script_with_parameters() {
        let h = Harness::new();
        h.demo(&[json!(1), json!(2)]);
        let mut view = simple_view("$.value");
        view["data"]["script"] = json!({"source": "input.map(v => v * params.factor)"});
        view["parameters"] = json!({"factor": {"type": "integer", "default": 10}});
        h.view("/views/scaled", view);

        let defaulted = h.renderer.render(RenderRequest::by_name("/views/scaled")).await.unwrap();
        assert_eq!(defaulted.document, json!([10, 20]));

        let explicit = h
            .renderer
            .render(RenderRequest::by_name("/views/scaled").with_parameter("factor", json!(3)))
            .await
            .unwrap();
        assert_eq!(explicit.document, json!([3, 6]));
    }

    #[tokio::test]
    async fn test_script_reference() {
        let h = Harness::new();
        h.demo(&[json!(1), json!(2), json!(3)]);
        h.entity(
            "/scripts/odd",
            SCRIPT_KIND,
            json!({"source": "(input) => input.filter(v => v % 2 === 1)"}),
        );
        let mut view = simple_view("$.value");
        view["data"]["script"] = json!({"ref": "/scripts/odd"});
        h.view("/views/odd", view);

        let rendered = h.renderer.render(RenderRequest::by_name("/views/odd")).await.unwrap();
        assert_eq!(rendered.document, json!([1, 3]));
    }

    #[tokio::test]
    async fn test_missing_script_reference_is_not_found() {
        let h = Harness::new();
        let mut view = simple_view("$.value");
        view["data"]["script"] = json!({"ref": "/scripts/nope"});
        h.view("/views/odd", view);

        let err = h
            .renderer
            .render(RenderRequest::by_name("/views/odd"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_runaway_script_times_out() {
        let evaluator = ScriptEvaluator::new(
            ScriptLimits::default().with_timeout(Duration::from_millis(200)),
        );
        let h = Harness::with_evaluator(evaluator);
        h.demo(&[json!(1)]);
        let mut view = simple_view("$.value");
        view["data"]["script"] = json!({"source": "while (true) {}"});
        h.view("/views/spin", view);

        let started = Instant::now();
        let err = h.renderer.render(RenderRequest::by_name("/views/spin")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EvaluationTimeout);
        assert!(started.elapsed() < Duration::from_secs(5));

        h.view("/views/values", simple_view("$.value"));
        let rendered = h.renderer.render(RenderRequest::by_name("/views/values")).await.unwrap();
        assert_eq!(rendered.document, json!([1]));
    }

    #[tokio::test]
    async fn test_output_schema_failure_fails_render() {
        let h = Harness::new();
        h.demo(&[json!(1), json!("two")]);
        let mut view = simple_view("$.value");
        view["outputSchema"] = json!({"type": "array", "items": {"type": "integer"}});
        h.view("/views/typed", view);

        let err = h
            .renderer
            .render(RenderRequest::by_name("/views/typed"))
            .await
            .unwrap_err();
        let errors = match err {
            RenderError::Output { errors } => errors,
            other => panic!("unexpected {other:?}"),
        };
        assert!(errors.contains_key("1"), "{errors:?}");
    }

    #[tokio::test]
    async fn test_request_output_schema_is_checked() {
        let h = Harness::new();
        h.demo(&[json!(1)]);
        h.view("/views/values", simple_view("$.value"));

        let err = h
            .renderer
            .render(RenderRequest::by_name("/views/values").with_output_schema(json!({"type": "object"})))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Output { ref errors } if errors.contains_key("$")));
    }

    #[tokio::test]
    async fn test_parameter_errors_abort_before_fetching() {
        let h = Harness::new();
        let mut view = simple_view("$.value");
        view["parameters"] = json!({"env": {"type": "string", "required": true}});
        h.view("/views/env", view);

        let err = h.renderer.render(RenderRequest::by_name("/views/env")).await.unwrap_err();
        assert!(matches!(err, RenderError::Parameters { ref errors } if errors.contains_key("parameters.env")));
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[tokio::test]
    async fn test_history_recorded_for_stored_views_only() {
        let h = Harness::new();
        h.demo(&[json!(1), json!(2)]);
        let view = h.view("/views/values", simple_view("$.value"));

        h.renderer.render(RenderRequest::by_id(view.id)).await.unwrap();
        h.renderer.render(RenderRequest::inline(simple_view("$.value"))).await.unwrap();

        let history = h.store.history(None, None, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].view_entity_id, view.id);
        assert_eq!(history[0].fetched_entity_count, 2);
    }

    struct BrokenHistory;

    impl HistorySink for BrokenHistory {
        fn record(&self, _record: &RenderHistoryRecord) -> mica_store::Result<()> {
            Err(StoreError::database("disk is full"))
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_history_failure_does_not_fail_render() {
        let mut h = Harness::new();
        h.renderer = h.renderer.clone().with_history(Arc::new(BrokenHistory));
        h.demo(&[json!(1)]);
        h.view("/views/values", simple_view("$.value"));

        let rendered = h.renderer.render(RenderRequest::by_name("/views/values")).await.unwrap();
        assert_eq!(rendered.document, json!([1]));
    }

    #[tokio::test]
    async fn test_unknown_and_wrong_kind_views() {
        let h = Harness::new();
        h.demo(&[json!(1)]);

        let missing = h.renderer.render(RenderRequest::by_name("/views/nope")).await.unwrap_err();
        assert_eq!(missing.code(), ErrorCode::NotFound);

        let not_a_view = h.renderer.render(RenderRequest::by_name("/demo/a")).await.unwrap_err();
        assert!(matches!(not_a_view, RenderError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_source_failure_skipped_unless_strict() {
        let h = Harness::new();
        let dir = tempfile::TempDir::new().unwrap();
        let missing = url::Url::from_file_path(dir.path().join("absent")).unwrap();
        let view = json!({
            "selector": {"entityKind": "/demo/v1", "source": missing.as_str()},
            "data": {"jsonPath": "$"}
        });

        let rendered = h.renderer.render(RenderRequest::inline(view.clone())).await.unwrap();
        assert_eq!(rendered.document, json!([]));
        assert_eq!(rendered.item_errors.len(), 1);
        assert_eq!(rendered.item_errors[0].stage, FETCH_STAGE);

        let err = h
            .renderer
            .render(RenderRequest::inline(view).strict(true))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Fetch(_)));
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[tokio::test]
    async fn test_unknown_store_authority_is_reported() {
        let h = Harness::new();
        h.demo(&[json!(1)]);
        let view = json!({
            "selector": {"entityKind": "/demo/v1", "source": "mica://stroe"},
            "data": {"jsonPath": "$.value"}
        });

        let rendered = h.renderer.render(RenderRequest::inline(view.clone())).await.unwrap();
        assert_eq!(rendered.document, json!([]));
        assert_eq!(rendered.item_errors.len(), 1);
        assert_eq!(rendered.item_errors[0].entity, "mica://stroe");

        let err = h
            .renderer
            .render(RenderRequest::inline(view).strict(true))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    /// Never produces an item
    struct Stalled;

    #[async_trait]
    impl EntityFetcher for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        fn is_supported(&self, request: &FetchRequest) -> bool {
            request.uri.is_none()
        }

        async fn fetch(&self, _request: FetchRequest) -> mica_fetch::Result<Cursor> {
            Ok(stream::pending().boxed())
        }
    }

    #[tokio::test]
    async fn test_cancel_abandons_stalled_fetch() {
        let store = Arc::new(EntityStore::open_in_memory().unwrap());
        let fetchers = EntityFetchers::new().with(Arc::new(Stalled)).unwrap();
        let renderer = ViewRenderer::new(Arc::new(fetchers), ScriptEvaluator::default(), store);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = renderer
            .render_with_cancel(RenderRequest::inline(simple_view("$")), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Cancelled));
    }

    #[tokio::test]
    async fn test_cross_fetcher_duplicates_are_kept() {
        let store = Arc::new(EntityStore::open_in_memory().unwrap());
        store
            .create(PartialEntity::new("/demo/a", "/demo/v1").with_field("value", json!(1)))
            .unwrap();

        struct Mirror(Arc<EntityStore>);

        #[async_trait]
        impl EntityFetcher for Mirror {
            fn name(&self) -> &str {
                "mirror"
            }

            fn is_supported(&self, request: &FetchRequest) -> bool {
                request.uri.is_none()
            }

            async fn fetch(&self, request: FetchRequest) -> mica_fetch::Result<Cursor> {
                StoreFetcher::new(self.0.clone())
                    .with_page_size(1)
                    .fetch(request)
                    .await
            }
        }

        let fetchers = EntityFetchers::new()
            .with(Arc::new(StoreFetcher::new(store.clone())))
            .unwrap()
            .with(Arc::new(Mirror(store.clone())))
            .unwrap();
        let renderer = ViewRenderer::new(Arc::new(fetchers), ScriptEvaluator::default(), store);
        let rendered = renderer
            .render(RenderRequest::inline(simple_view("$.value")))
            .await
            .unwrap();
        assert_eq!(rendered.document, json!([1, 1]));
    }
}
