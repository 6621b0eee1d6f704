//! Render-history rows as entities
//!
//! `history://render` yields every row; `history://render?view=<id>` only the
//! rows of one view. Rows come out as `/mica/render-history/v1` entities.

use crate::error::{FetchError, Result};
use crate::fetcher::{empty_cursor, Cursor, EntityFetcher, FetchedEntity};
use crate::request::FetchRequest;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mica_entity::kinds::RENDER_HISTORY_KIND;
use mica_entity::{EntityId, RenderHistoryRecord};
use mica_store::EntityStore;
use std::collections::VecDeque;
use std::sync::Arc;

pub const HISTORY_SCHEME: &str = "history";

const HISTORY_AUTHORITY: &str = "render";

const PAGE_SIZE: usize = 200;

#[derive(Debug, Clone)]
pub struct HistoryFetcher {
    store: Arc<EntityStore>,
}

impl HistoryFetcher {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EntityFetcher for HistoryFetcher {
    fn name(&self) -> &str {
        "history"
    }

    fn schemes(&self) -> &[&'static str] {
        &[HISTORY_SCHEME]
    }

    fn is_supported(&self, request: &FetchRequest) -> bool {
        request.scheme() == Some(HISTORY_SCHEME)
    }

    async fn fetch(&self, request: FetchRequest) -> Result<Cursor> {
        let uri = request
            .uri
            .as_ref()
            .ok_or_else(|| FetchError::bad_request("history fetch needs a history:// URI"))?;
        if uri.host_str() != Some(HISTORY_AUTHORITY) {
            return Err(FetchError::bad_request(format!(
                "unknown history source '{}', expected history://{}",
                uri, HISTORY_AUTHORITY
            )));
        }
        if !request.matches_kind(RENDER_HISTORY_KIND) {
            return Ok(empty_cursor());
        }
        let view = request
            .query_value("view")
            .map(|raw| {
                raw.parse::<EntityId>()
                    .map_err(|_| FetchError::bad_request(format!("invalid view id '{}'", raw)))
            })
            .transpose()?;

        let state = (
            self.store.clone(),
            view,
            None::<String>,
            VecDeque::<RenderHistoryRecord>::new(),
            false,
        );
        Ok(stream::unfold(
            state,
            |(store, view, mut after, mut buffered, mut exhausted)| async move {
                if buffered.is_empty() && !exhausted {
                    match store.history(view.as_ref(), after.as_deref(), PAGE_SIZE) {
                        Ok(page) => {
                            exhausted = page.len() < PAGE_SIZE;
                            after = page.last().map(|r| r.id.to_string());
                            buffered.extend(page);
                        }
                        Err(error) => {
                            return Some((
                                Err(FetchError::from(error)),
                                (store, view, after, buffered, true),
                            ))
                        }
                    }
                }
                let record = buffered.pop_front()?;
                Some((
                    Ok(FetchedEntity::new(record.into_entity())),
                    (store, view, after, buffered, exhausted),
                ))
            },
        )
        .boxed())
    }
}
