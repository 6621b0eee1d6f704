//! Render-history records
//!
//! One row is appended per render of a stored view. Rows are never updated;
//! an external cleanup job purges rows older than the retention cutoff.

use crate::entity::EntityLike;
use crate::kinds::RENDER_HISTORY_KIND;
use crate::types::{EntityData, EntityId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use ulid::Ulid;

/// Identifier of a history row
pub type HistoryRecordId = Ulid;

/// Default number of days history rows are kept
pub const DEFAULT_RETENTION_DAYS: u32 = 93;

/// Timing and volume of one view render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderHistoryRecord {
    pub id: HistoryRecordId,
    pub view_entity_id: EntityId,
    /// Milliseconds spent selecting source entities
    pub select_time: u64,
    /// Milliseconds spent shaping and aggregating
    pub render_time: u64,
    pub fetched_entity_count: u64,
    pub rendered_at: DateTime<Utc>,
}

impl RenderHistoryRecord {
    pub fn new(
        view_entity_id: EntityId,
        select_time: u64,
        render_time: u64,
        fetched_entity_count: u64,
    ) -> Self {
        Self {
            id: Ulid::new(),
            view_entity_id,
            select_time,
            render_time,
            fetched_entity_count,
            rendered_at: Utc::now(),
        }
    }

    /// Project the row as an entity so views can select it
    pub fn into_entity(self) -> HistoryEntity {
        let name = format!("/mica/history/{}/{}", self.view_entity_id, self.id);
        let data = match json!({
            "viewEntityId": self.view_entity_id.to_string(),
            "selectTime": self.select_time,
            "renderTime": self.render_time,
            "fetchedEntityCount": self.fetched_entity_count,
            "renderedAt": self.rendered_at.to_rfc3339(),
        }) {
            serde_json::Value::Object(map) => map,
            _ => EntityData::new(),
        };
        HistoryEntity { name, data }
    }
}

/// A history row seen through [`EntityLike`]
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntity {
    name: String,
    data: EntityData,
}

impl EntityLike for HistoryEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        RENDER_HISTORY_KIND
    }

    fn data(&self) -> &EntityData {
        &self.data
    }
}

/// How long history rows are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRetention {
    pub days: u32,
}

impl HistoryRetention {
    pub fn days(days: u32) -> Self {
        Self { days }
    }

    /// Rows rendered before this instant are eligible for purging
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.days))
    }
}

impl Default for HistoryRetention {
    fn default() -> Self {
        Self::days(DEFAULT_RETENTION_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retention_cutoff() {
        let now = Utc::now();
        let cutoff = HistoryRetention::default().cutoff(now);
        assert_eq!((now - cutoff).num_days(), 93);
    }

    #[test]
    fn test_history_entity_projection() {
        let view = EntityId::new();
        let record = RenderHistoryRecord::new(view, 12, 30, 4);
        let entity = record.clone().into_entity();

        assert_eq!(entity.kind(), RENDER_HISTORY_KIND);
        assert!(entity.name().starts_with("/mica/history/"));
        assert!(crate::name::is_valid_name(entity.name()));
        assert_eq!(entity.data()["viewEntityId"], json!(view.to_string()));
        assert_eq!(entity.data()["fetchedEntityCount"], json!(4));
        assert_eq!(entity.data()["selectTime"], json!(12));
    }
}
