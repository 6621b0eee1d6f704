//! The assembled catalog

use crate::error::Result;
use chrono::{DateTime, Utc};
use mica_config::CatalogConfig;
use mica_entity::kinds::VIEW_KIND;
use mica_entity::{Entity, EntityId, EntityWriteRequest};
use mica_fetch::{EntityFetchers, FileFetcher, HistoryFetcher, RemoteFetcher, StoreFetcher};
use mica_js::ScriptEvaluator;
use mica_store::{AuditFinding, Catalog, EntityStore};
use mica_views::{RenderRequest, RenderedView, ViewDefinition, ViewRenderer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Store, fetchers, script evaluator and renderer wired from one configuration
#[derive(Debug, Clone)]
pub struct Mica {
    config: CatalogConfig,
    catalog: Catalog,
    renderer: ViewRenderer,
}

impl Mica {
    pub fn open(config: CatalogConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(match &config.database.path {
            Some(path) => EntityStore::open(path)?,
            None => EntityStore::open_in_memory()?,
        });
        let catalog = Catalog::new(store.clone())
            .require_registered_kinds(config.catalog.require_registered_kinds);

        let fetchers = EntityFetchers::new()
            .with(Arc::new(StoreFetcher::new(store.clone())))?
            .with(Arc::new(FileFetcher::new()))?
            .with(Arc::new(HistoryFetcher::new(store.clone())))?
            .with(Arc::new(RemoteFetcher::new(
                config.fetch.remote_timeout(),
                config.fetch.secrets.clone(),
            )?))?;

        let renderer = ViewRenderer::new(
            Arc::new(fetchers),
            ScriptEvaluator::new(config.scripts.clone()),
            store.clone(),
        )
        .with_history(store)
        .strict_by_default(config.render.strict)
        .with_default_limit(config.fetch.default_limit);

        info!(
            database = ?config.database.path,
            strict = config.render.strict,
            "catalog opened"
        );
        Ok(Self {
            config,
            catalog,
            renderer,
        })
    }

    /// A throwaway catalog with default settings
    pub fn in_memory() -> Result<Self> {
        Self::open(CatalogConfig::default())
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        self.catalog.store()
    }

    pub fn renderer(&self) -> &ViewRenderer {
        &self.renderer
    }

    /// Create or update an entity
    ///
    /// View entities must also be renderable: their jsonPath has to compile
    /// and their source URI has to parse.
    pub fn write(&self, request: EntityWriteRequest) -> Result<Entity> {
        if request.kind == VIEW_KIND {
            ViewDefinition::parse(&request.name, &request.data)?;
        }
        Ok(self.catalog.write(request)?)
    }

    pub fn get_by_id(&self, id: &EntityId) -> Result<Option<Entity>> {
        Ok(self.store().get_by_id(id)?)
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<Entity>> {
        Ok(self.store().get_by_name(name)?)
    }

    pub fn delete(&self, id: &EntityId) -> Result<()> {
        Ok(self.catalog.delete(id)?)
    }

    pub async fn render(&self, request: RenderRequest) -> Result<RenderedView> {
        Ok(self.renderer.render(request).await?)
    }

    pub async fn render_with_cancel(
        &self,
        request: RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<RenderedView> {
        Ok(self.renderer.render_with_cancel(request, cancel).await?)
    }

    /// Strict validation of every stored entity against its kind
    pub fn audit(&self) -> Result<Vec<AuditFinding>> {
        Ok(self.catalog.audit()?)
    }

    /// Drop render history older than the configured retention
    pub fn purge_history(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = self.config.history.retention().cutoff(now);
        Ok(self.store().purge_history_before(cutoff)?)
    }
}
