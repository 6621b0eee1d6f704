//! SQLite-backed entity storage
//!
//! # Schema
//!
//! - `entities`: one row per live entity, `name` unique
//! - `render_history`: append-only render timing rows (see [`crate::history`])
//!
//! Timestamps are stored as microseconds since the epoch. `updated_at` doubles
//! as the optimistic-concurrency token: an update is a single conditional
//! `UPDATE ... WHERE id = ? AND updated_at = ?` inside a transaction.

use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use mica_entity::{Entity, EntityData, EntityId, PartialEntity};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// SQLite cache size in KB (negative value means KB, positive means pages)
const SQLITE_CACHE_SIZE_KB: &str = "-16000";

const ENTITY_COLUMNS: &str = "id, name, kind, created_at, updated_at, data";

/// Primary catalog storage
///
/// `Send + Sync` by wrapping the connection in a Mutex, so one store can be
/// shared across tasks behind an `Arc`.
pub struct EntityStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore").finish_non_exhaustive()
    }
}

impl EntityStore {
    /// Open (creating if needed) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::database(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "cache_size", SQLITE_CACHE_SIZE_KB)?;
        debug!(path = %path.display(), "opened entity store");
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::database("entity store mutex poisoned"))
    }

    fn create_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entities_kind_name ON entities(kind, name);

            CREATE TABLE IF NOT EXISTS render_history (
                id TEXT PRIMARY KEY,
                view_entity_id TEXT NOT NULL,
                select_time INTEGER NOT NULL,
                render_time INTEGER NOT NULL,
                fetched_entity_count INTEGER NOT NULL,
                rendered_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_view ON render_history(view_entity_id, id);
            CREATE INDEX IF NOT EXISTS idx_history_rendered_at ON render_history(rendered_at);
            "#,
        )?;
        Ok(())
    }

    /// Store a new entity, assigning its id and timestamps
    pub fn create(&self, entity: PartialEntity) -> Result<Entity> {
        entity.validate()?;
        let now = now_micros();
        let stored = Entity {
            id: EntityId::new(),
            name: entity.name,
            kind: entity.kind,
            created_at: from_micros(now)?,
            updated_at: from_micros(now)?,
            data: entity.data,
        };
        let data = encode_data(&stored.data)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO entities (id, name, kind, created_at, updated_at, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                stored.id.to_string(),
                stored.name,
                stored.kind,
                now,
                now,
                data
            ],
        )
        .map_err(|e| name_conflict(e, &stored.name))?;

        info!(id = %stored.id, name = %stored.name, kind = %stored.kind, "created entity");
        Ok(stored)
    }

    /// Compare-and-set update keyed on the last observed `updatedAt`
    ///
    /// Replaces `name`, `kind` and `data`. Fails with `Conflict` when
    /// `expected_updated_at` is not the stored token; nothing is written then.
    pub fn update(
        &self,
        id: EntityId,
        expected_updated_at: DateTime<Utc>,
        entity: PartialEntity,
    ) -> Result<Entity> {
        entity.validate()?;
        let expected = expected_updated_at.timestamp_micros();
        // Strictly monotonic even when the clock has not moved
        let next = now_micros().max(expected.saturating_add(1));
        let data = encode_data(&entity.data)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx
            .execute(
                "UPDATE entities SET name = ?1, kind = ?2, data = ?3, updated_at = ?4
                 WHERE id = ?5 AND updated_at = ?6",
                params![entity.name, entity.kind, data, next, id.to_string(), expected],
            )
            .map_err(|e| name_conflict(e, &entity.name))?;

        if changed == 0 {
            return Err(match select_by_id(&tx, &id)? {
                Some(_) => StoreError::Conflict { id },
                None => StoreError::not_found(id.to_string()),
            });
        }

        let stored = select_by_id(&tx, &id)?
            .ok_or_else(|| StoreError::not_found(id.to_string()))?;
        tx.commit()?;

        info!(id = %id, name = %stored.name, "updated entity");
        Ok(stored)
    }

    pub fn get_by_id(&self, id: &EntityId) -> Result<Option<Entity>> {
        let conn = self.conn()?;
        select_by_id(&conn, id)
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<Entity>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM entities WHERE name = ?1", ENTITY_COLUMNS),
                params![name],
                EntityRow::from_row,
            )
            .optional()?;
        row.map(EntityRow::into_entity).transpose()
    }

    /// Delete by id; deleting an unknown id is `NotFound`
    pub fn delete(&self, id: &EntityId) -> Result<()> {
        let removed = self
            .conn()?
            .execute("DELETE FROM entities WHERE id = ?1", params![id.to_string()])?;
        if removed == 0 {
            return Err(StoreError::not_found(id.to_string()));
        }
        info!(id = %id, "deleted entity");
        Ok(())
    }

    /// One page of entities of `kind`, ordered by name, starting after `after`
    pub fn list_by_kind(&self, kind: &str, after: Option<&str>, limit: usize) -> Result<Vec<Entity>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM entities WHERE kind = ?1 AND name > ?2 ORDER BY name LIMIT ?3",
            ENTITY_COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![kind, after.unwrap_or(""), page_limit(limit)],
                EntityRow::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(EntityRow::into_entity).collect()
    }

    /// One page of all entities, ordered by name, starting after `after`
    pub fn list_all(&self, after: Option<&str>, limit: usize) -> Result<Vec<Entity>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM entities WHERE name > ?1 ORDER BY name LIMIT ?2",
            ENTITY_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![after.unwrap_or(""), page_limit(limit)], EntityRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(EntityRow::into_entity).collect()
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

fn select_by_id(conn: &Connection, id: &EntityId) -> Result<Option<Entity>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM entities WHERE id = ?1", ENTITY_COLUMNS),
            params![id.to_string()],
            EntityRow::from_row,
        )
        .optional()?;
    row.map(EntityRow::into_entity).transpose()
}

/// Raw column values of an `entities` row
struct EntityRow {
    id: String,
    name: String,
    kind: String,
    created_at: i64,
    updated_at: i64,
    data: String,
}

impl EntityRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            data: row.get(5)?,
        })
    }

    fn into_entity(self) -> Result<Entity> {
        let id = self
            .id
            .parse()
            .map_err(|_| StoreError::corrupt(format!("bad id '{}'", self.id)))?;
        let data: EntityData = serde_json::from_str(&self.data)
            .map_err(|e| StoreError::corrupt(format!("bad data for '{}': {}", self.name, e)))?;
        Ok(Entity {
            id,
            name: self.name,
            kind: self.kind,
            created_at: from_micros(self.created_at)?,
            updated_at: from_micros(self.updated_at)?,
            data,
        })
    }
}

fn name_conflict(error: rusqlite::Error, name: &str) -> StoreError {
    match error {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            StoreError::DuplicateName {
                name: name.to_string(),
            }
        }
        other => other.into(),
    }
}

fn encode_data(data: &EntityData) -> Result<String> {
    serde_json::to_string(data).map_err(|e| StoreError::database(e.to_string()))
}

fn page_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

pub(crate) fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::corrupt(format!("timestamp out of range: {}", micros)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn partial(name: &str, value: i64) -> PartialEntity {
        PartialEntity::new(name, "/demo/v1").with_field("value", json!(value))
    }

    #[test]
    fn test_create_assigns_identity() {
        let store = EntityStore::open_in_memory().unwrap();
        let created = store.create(partial("/demo/a", 1)).unwrap();
        assert_eq!(created.created_at, created.updated_at);

        let by_id = store.get_by_id(&created.id).unwrap().unwrap();
        assert_eq!(by_id, created);
        let by_name = store.get_by_name("/demo/a").unwrap().unwrap();
        assert_eq!(by_name, created);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("catalog.db");

        let created = {
            let store = EntityStore::open(&path).unwrap();
            store.create(partial("/demo/a", 1)).unwrap()
        };

        let store = EntityStore::open(&path).unwrap();
        let loaded = store.get_by_name("/demo/a").unwrap().unwrap();
        assert_eq!(loaded, created);
        let updated = store
            .update(created.id, created.updated_at, partial("/demo/a", 2))
            .unwrap();
        assert!(updated.updated_at > created.updated_at);
    }

    #[test]
    fn test_duplicate_name() {
        let store = EntityStore::open_in_memory().unwrap();
        store.create(partial("/demo/a", 1)).unwrap();
        let err = store.create(partial("/demo/a", 2)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName { .. }), "{err:?}");
    }

    #[test]
    fn test_invalid_name_rejected() {
        let store = EntityStore::open_in_memory().unwrap();
        let err = store.create(partial("/a//b", 1)).unwrap_err();
        assert!(matches!(err, StoreError::Entity(_)), "{err:?}");
    }

    #[test]
    fn test_update_then_stale_token_conflicts() {
        let store = EntityStore::open_in_memory().unwrap();
        let created = store.create(partial("/demo/a", 1)).unwrap();

        let updated = store
            .update(created.id, created.updated_at, partial("/demo/a", 2))
            .unwrap();
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.data["value"], json!(2));

        let err = store
            .update(created.id, created.updated_at, partial("/demo/a", 3))
            .unwrap_err();
        assert!(err.is_conflict(), "{err:?}");
        let current = store.get_by_id(&created.id).unwrap().unwrap();
        assert_eq!(current.data["value"], json!(2));
    }

    #[test]
    fn test_back_to_back_updates_get_distinct_tokens() {
        let store = EntityStore::open_in_memory().unwrap();
        let mut current = store.create(partial("/demo/a", 0)).unwrap();
        for i in 1..20 {
            let next = store
                .update(current.id, current.updated_at, partial("/demo/a", i))
                .unwrap();
            assert!(next.updated_at > current.updated_at);
            current = next;
        }
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let store = EntityStore::open_in_memory().unwrap();
        let err = store
            .update(EntityId::new(), Utc::now(), partial("/demo/a", 1))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }), "{err:?}");
    }

    #[test]
    fn test_rename_respects_uniqueness() {
        let store = EntityStore::open_in_memory().unwrap();
        store.create(partial("/demo/a", 1)).unwrap();
        let b = store.create(partial("/demo/b", 2)).unwrap();

        let err = store
            .update(b.id, b.updated_at, partial("/demo/a", 2))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName { .. }));

        let renamed = store.update(b.id, b.updated_at, partial("/demo/c", 2)).unwrap();
        assert_eq!(renamed.name, "/demo/c");
        assert!(store.get_by_name("/demo/b").unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let store = EntityStore::open_in_memory().unwrap();
        let created = store.create(partial("/demo/a", 1)).unwrap();
        store.delete(&created.id).unwrap();
        assert!(store.get_by_id(&created.id).unwrap().is_none());
        assert!(matches!(
            store.delete(&created.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_keyset_pagination_by_kind() {
        let store = EntityStore::open_in_memory().unwrap();
        for name in ["/demo/c", "/demo/a", "/demo/b"] {
            store.create(partial(name, 1)).unwrap();
        }
        store
            .create(PartialEntity::new("/other/x", "/other/v1"))
            .unwrap();

        let first = store.list_by_kind("/demo/v1", None, 2).unwrap();
        let names: Vec<_> = first.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["/demo/a", "/demo/b"]);

        let rest = store.list_by_kind("/demo/v1", Some("/demo/b"), 2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, "/demo/c");

        assert_eq!(store.list_all(None, 100).unwrap().len(), 4);
        assert_eq!(store.count().unwrap(), 4);
    }

    #[test]
    fn test_data_order_preserved() {
        let store = EntityStore::open_in_memory().unwrap();
        let entity = PartialEntity::new("/demo/ordered", "/demo/v1")
            .with_field("zeta", json!(1))
            .with_field("alpha", json!(2));
        let created = store.create(entity).unwrap();
        let loaded = store.get_by_id(&created.id).unwrap().unwrap();
        let keys: Vec<_> = loaded.data.keys().cloned().collect();
        assert_eq!(keys, ["zeta", "alpha"]);
    }

    #[test]
    fn test_concurrent_updates_exactly_one_wins() {
        let store = Arc::new(EntityStore::open_in_memory().unwrap());
        let created = store.create(partial("/demo/race", 0)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let token = created.updated_at;
                std::thread::spawn(move || store.update(created.id, token, partial("/demo/race", i)))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::Conflict { .. })))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);
    }
}
