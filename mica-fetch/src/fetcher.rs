//! The fetcher capability

use crate::error::{FetchError, Result};
use crate::request::FetchRequest;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use mica_entity::EntityLike;
use url::Url;

/// Lazy, single-pass, finite sequence of fetched records
pub type Cursor = BoxStream<'static, Result<FetchedEntity>>;

/// One record produced by a fetcher
pub struct FetchedEntity {
    pub entity: Box<dyn EntityLike>,
    /// Where the record came from, when the fetcher can say
    pub source: Option<Url>,
}

impl FetchedEntity {
    pub fn new(entity: impl EntityLike + 'static) -> Self {
        Self {
            entity: Box::new(entity),
            source: None,
        }
    }

    pub fn with_source(mut self, source: Url) -> Self {
        self.source = Some(source);
        self
    }
}

impl std::fmt::Debug for FetchedEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedEntity")
            .field("name", &self.entity.name())
            .field("kind", &self.entity.kind())
            .field("source", &self.source.as_ref().map(Url::as_str))
            .finish()
    }
}

/// A source of entities
///
/// A fetcher must not assume it is the only source of a kind, and a kind
/// filter that matches nothing yields an empty cursor rather than an error.
#[async_trait]
pub trait EntityFetcher: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// URI schemes this fetcher claims; at most one fetcher may claim each
    fn schemes(&self) -> &[&'static str] {
        &[]
    }

    fn is_supported(&self, request: &FetchRequest) -> bool;

    async fn fetch(&self, request: FetchRequest) -> Result<Cursor>;
}

pub fn empty_cursor() -> Cursor {
    stream::empty().boxed()
}

pub fn failed_cursor(error: FetchError) -> Cursor {
    stream::once(async move { Err(error) }).boxed()
}
