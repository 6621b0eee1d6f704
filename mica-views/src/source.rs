//! What the renderer needs from the catalog

use mica_entity::{Entity, EntityId, RenderHistoryRecord};
use mica_store::EntityStore;

/// Lookup of view and script entities
pub trait ViewSource: Send + Sync {
    fn entity_by_id(&self, id: &EntityId) -> mica_store::Result<Option<Entity>>;
    fn entity_by_name(&self, name: &str) -> mica_store::Result<Option<Entity>>;
}

/// Destination for render-history records
pub trait HistorySink: Send + Sync {
    fn record(&self, record: &RenderHistoryRecord) -> mica_store::Result<()>;
}

impl ViewSource for EntityStore {
    fn entity_by_id(&self, id: &EntityId) -> mica_store::Result<Option<Entity>> {
        self.get_by_id(id)
    }

    fn entity_by_name(&self, name: &str) -> mica_store::Result<Option<Entity>> {
        self.get_by_name(name)
    }
}

impl HistorySink for EntityStore {
    fn record(&self, record: &RenderHistoryRecord) -> mica_store::Result<()> {
        self.append_history(record)
    }
}
