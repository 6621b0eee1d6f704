//! Render-history bookkeeping
//!
//! Rows are append-only. Reading projects them as entities of kind
//! `/mica/render-history/v1`; purging is the trigger contract for an external
//! cleanup job.

use crate::error::{Result, StoreError};
use crate::store::{from_micros, EntityStore};
use chrono::{DateTime, Utc};
use mica_entity::{EntityId, RenderHistoryRecord};
use rusqlite::params;
use tracing::{debug, info};

const HISTORY_COLUMNS: &str =
    "id, view_entity_id, select_time, render_time, fetched_entity_count, rendered_at";

impl EntityStore {
    /// Append one render-history row
    pub fn append_history(&self, record: &RenderHistoryRecord) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO render_history
                 (id, view_entity_id, select_time, render_time, fetched_entity_count, rendered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id.to_string(),
                record.view_entity_id.to_string(),
                to_sql_int(record.select_time),
                to_sql_int(record.render_time),
                to_sql_int(record.fetched_entity_count),
                record.rendered_at.timestamp_micros(),
            ],
        )?;
        debug!(view = %record.view_entity_id, "appended render history");
        Ok(())
    }

    /// One page of history rows ordered by id, optionally for one view
    pub fn history(
        &self,
        view: Option<&EntityId>,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RenderHistoryRecord>> {
        let conn = self.conn()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let after = after.unwrap_or("");
        let rows = match view {
            Some(view) => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {} FROM render_history
                     WHERE view_entity_id = ?1 AND id > ?2 ORDER BY id LIMIT ?3",
                    HISTORY_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![view.to_string(), after, limit], HistoryRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {} FROM render_history WHERE id > ?1 ORDER BY id LIMIT ?2",
                    HISTORY_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![after, limit], HistoryRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        rows.into_iter().map(HistoryRow::into_record).collect()
    }

    /// Delete rows rendered before `cutoff`, returning how many went
    pub fn purge_history_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self.conn()?.execute(
            "DELETE FROM render_history WHERE rendered_at < ?1",
            params![cutoff.timestamp_micros()],
        )?;
        info!(removed, cutoff = %cutoff, "purged render history");
        Ok(removed)
    }
}

struct HistoryRow {
    id: String,
    view_entity_id: String,
    select_time: i64,
    render_time: i64,
    fetched_entity_count: i64,
    rendered_at: i64,
}

impl HistoryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            view_entity_id: row.get(1)?,
            select_time: row.get(2)?,
            render_time: row.get(3)?,
            fetched_entity_count: row.get(4)?,
            rendered_at: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<RenderHistoryRecord> {
        Ok(RenderHistoryRecord {
            id: self
                .id
                .parse()
                .map_err(|_| StoreError::corrupt(format!("bad history id '{}'", self.id)))?,
            view_entity_id: self.view_entity_id.parse().map_err(|_| {
                StoreError::corrupt(format!("bad view id '{}'", self.view_entity_id))
            })?,
            select_time: from_sql_int(self.select_time),
            render_time: from_sql_int(self.render_time),
            fetched_entity_count: from_sql_int(self.fetched_entity_count),
            rendered_at: from_micros(self.rendered_at)?,
        })
    }
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}
