//! Entities from the primary catalog store

use crate::error::Result;
use crate::fetcher::{Cursor, EntityFetcher, FetchedEntity};
use crate::request::FetchRequest;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mica_store::EntityStore;
use std::collections::VecDeque;
use std::sync::Arc;

/// Scheme addressing the primary store explicitly (`mica://store`)
pub const STORE_SCHEME: &str = "mica";

const STORE_AUTHORITY: &str = "store";

/// Default rows read per page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Pages through the store by name
///
/// Serves kind-only requests (no URI) and `mica://store` URIs.
#[derive(Debug, Clone)]
pub struct StoreFetcher {
    store: Arc<EntityStore>,
    page_size: usize,
}

impl StoreFetcher {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

struct Pager {
    store: Arc<EntityStore>,
    kind: Option<String>,
    page_size: usize,
    after: Option<String>,
    buffered: VecDeque<mica_entity::Entity>,
    exhausted: bool,
}

impl Pager {
    fn next_page(&mut self) -> Result<()> {
        let page = match &self.kind {
            Some(kind) => self
                .store
                .list_by_kind(kind, self.after.as_deref(), self.page_size)?,
            None => self.store.list_all(self.after.as_deref(), self.page_size)?,
        };
        self.exhausted = page.len() < self.page_size;
        self.after = page.last().map(|e| e.name.clone());
        self.buffered.extend(page);
        Ok(())
    }
}

#[async_trait]
impl EntityFetcher for StoreFetcher {
    fn name(&self) -> &str {
        "store"
    }

    fn schemes(&self) -> &[&'static str] {
        &[STORE_SCHEME]
    }

    fn is_supported(&self, request: &FetchRequest) -> bool {
        match &request.uri {
            None => request.kind.is_some(),
            Some(uri) => uri.scheme() == STORE_SCHEME && uri.host_str() == Some(STORE_AUTHORITY),
        }
    }

    async fn fetch(&self, request: FetchRequest) -> Result<Cursor> {
        let page_size = request
            .limit
            .map_or(self.page_size, |limit| limit.clamp(1, self.page_size));
        let pager = Pager {
            store: self.store.clone(),
            kind: request.kind,
            page_size,
            after: None,
            buffered: VecDeque::new(),
            exhausted: false,
        };

        Ok(stream::unfold(pager, |mut pager| async move {
            if pager.buffered.is_empty() && !pager.exhausted {
                if let Err(error) = pager.next_page() {
                    pager.exhausted = true;
                    return Some((Err(error), pager));
                }
            }
            let entity = pager.buffered.pop_front()?;
            Some((Ok(FetchedEntity::new(entity)), pager))
        })
        .boxed())
    }
}
