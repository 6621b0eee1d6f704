//! Dispatch across all registered fetchers

use crate::error::{FetchError, Result};
use crate::fetcher::{failed_cursor, Cursor, EntityFetcher};
use crate::request::FetchRequest;
use futures::future;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Registry of fetchers, queried in registration order
#[derive(Default, Clone)]
pub struct EntityFetchers {
    fetchers: Vec<Arc<dyn EntityFetcher>>,
    scheme_owners: HashMap<&'static str, String>,
}

impl std::fmt::Debug for EntityFetchers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityFetchers")
            .field(
                "fetchers",
                &self.fetchers.iter().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl EntityFetchers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fetcher; fails if one of its schemes is already claimed
    pub fn register(&mut self, fetcher: Arc<dyn EntityFetcher>) -> Result<()> {
        for scheme in fetcher.schemes() {
            if let Some(owner) = self.scheme_owners.get(scheme) {
                return Err(FetchError::DuplicateScheme {
                    scheme: scheme.to_string(),
                    owner: owner.clone(),
                });
            }
        }
        for scheme in fetcher.schemes() {
            self.scheme_owners.insert(scheme, fetcher.name().to_string());
        }
        debug!(fetcher = fetcher.name(), schemes = ?fetcher.schemes(), "registered fetcher");
        self.fetchers.push(fetcher);
        Ok(())
    }

    pub fn with(mut self, fetcher: Arc<dyn EntityFetcher>) -> Result<Self> {
        self.register(fetcher)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }

    /// Fetch everything of `kind` from every supporting source
    pub fn fetch_kind(&self, kind: impl Into<String>) -> Cursor {
        self.fetch_all(FetchRequest::for_kind(kind))
    }

    /// Concatenate the cursors of every fetcher that supports `request`
    ///
    /// Cursors are drained one after another in registration order. A failing
    /// fetcher contributes a single error item and ends; the others still run.
    /// A URI whose scheme no fetcher claims yields a single `UnsupportedScheme`
    /// error, and a URI its scheme owner rejects yields a single `BadRequest`.
    /// A kind-only request with no supporting fetcher yields an empty cursor.
    pub fn fetch_all(&self, request: FetchRequest) -> Cursor {
        if let Some(scheme) = request.scheme() {
            if !self.scheme_owners.contains_key(scheme) {
                return failed_cursor(FetchError::UnsupportedScheme {
                    scheme: scheme.to_string(),
                });
            }
        }

        let supported: Vec<_> = self
            .fetchers
            .iter()
            .filter(|fetcher| fetcher.is_supported(&request))
            .cloned()
            .collect();
        if let (Some(uri), true) = (&request.uri, supported.is_empty()) {
            return failed_cursor(FetchError::bad_request(format!(
                "no fetcher accepts URI '{}'",
                uri
            )));
        }
        debug!(
            kind = ?request.kind,
            uri = ?request.uri.as_ref().map(|u| u.as_str()),
            fetchers = supported.len(),
            "dispatching fetch"
        );

        let limit = request.limit;
        let cursor = stream::iter(supported)
            .flat_map(move |fetcher| {
                let request = request.clone();
                stream::once(async move {
                    let name = fetcher.name().to_string();
                    match fetcher.fetch(request).await {
                        Ok(cursor) => stop_after_error(name, cursor),
                        Err(error) => {
                            warn!(fetcher = %name, error = %error, "fetcher failed to start");
                            failed_cursor(error)
                        }
                    }
                })
                .flatten()
            })
            .boxed();

        match limit {
            Some(limit) => cursor.take(limit).boxed(),
            None => cursor,
        }
    }
}

/// End a cursor right after the first error it yields
fn stop_after_error(fetcher: String, cursor: Cursor) -> Cursor {
    cursor
        .scan(false, move |failed, item| {
            if *failed {
                return future::ready(None);
            }
            if let Err(error) = &item {
                warn!(fetcher = %fetcher, error = %error, "fetcher cursor failed");
                *failed = true;
            }
            future::ready(Some(item))
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchedEntity;
    use async_trait::async_trait;
    use futures::TryStreamExt;
    use mica_entity::PartialEntity;
    use serde_json::json;

    /// Yields fixed values of one kind, optionally failing after some items
    struct Fixed {
        name: &'static str,
        schemes: &'static [&'static str],
        kind: &'static str,
        values: Vec<i64>,
        fail_after: Option<usize>,
    }

    impl Fixed {
        fn new(name: &'static str, kind: &'static str, values: Vec<i64>) -> Self {
            Self {
                name,
                schemes: &[],
                kind,
                values,
                fail_after: None,
            }
        }
    }

    #[async_trait]
    impl EntityFetcher for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn schemes(&self) -> &[&'static str] {
            self.schemes
        }

        fn is_supported(&self, request: &FetchRequest) -> bool {
            match request.scheme() {
                Some(scheme) => self.schemes.contains(&scheme),
                None => true,
            }
        }

        async fn fetch(&self, request: FetchRequest) -> Result<Cursor> {
            let mut items: Vec<Result<FetchedEntity>> = self
                .values
                .iter()
                .filter(|_| request.matches_kind(self.kind))
                .enumerate()
                .map(|(i, v)| {
                    Ok(FetchedEntity::new(
                        PartialEntity::new(format!("/{}/{}", self.name, i), self.kind)
                            .with_field("value", json!(v)),
                    ))
                })
                .collect();
            if let Some(at) = self.fail_after {
                items.truncate(at);
                items.push(Err(FetchError::unavailable(self.name, "went away")));
                items.push(Ok(FetchedEntity::new(PartialEntity::new(
                    "/never/seen",
                    self.kind,
                ))));
            }
            Ok(stream::iter(items).boxed())
        }
    }

    async fn values(cursor: Cursor) -> Vec<std::result::Result<i64, String>> {
        cursor
            .map(|item| {
                item.map(|f| f.entity.data()["value"].as_i64().unwrap_or(-1))
                    .map_err(|e| e.to_string())
            })
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_no_fetchers_is_empty() {
        let fetchers = EntityFetchers::new();
        let items: Vec<_> = fetchers
            .fetch_kind("/demo/v1")
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_concatenates_in_registration_order() {
        let fetchers = EntityFetchers::new()
            .with(Arc::new(Fixed::new("first", "/demo/v1", vec![1, 2])))
            .unwrap()
            .with(Arc::new(Fixed::new("second", "/demo/v1", vec![3])))
            .unwrap();
        let got = values(fetchers.fetch_kind("/demo/v1")).await;
        assert_eq!(got, vec![Ok(1), Ok(2), Ok(3)]);
    }

    #[tokio::test]
    async fn test_unmatched_kind_is_empty() {
        let fetchers = EntityFetchers::new()
            .with(Arc::new(Fixed::new("first", "/demo/v1", vec![1])))
            .unwrap();
        assert!(values(fetchers.fetch_kind("/other/v1")).await.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_failure_isolated_to_one_fetcher() {
        let mut broken = Fixed::new("broken", "/demo/v1", vec![1, 2, 3]);
        broken.fail_after = Some(1);
        let fetchers = EntityFetchers::new()
            .with(Arc::new(broken))
            .unwrap()
            .with(Arc::new(Fixed::new("healthy", "/demo/v1", vec![9])))
            .unwrap();

        let got = values(fetchers.fetch_kind("/demo/v1")).await;
        assert_eq!(got.len(), 3, "{got:?}");
        assert_eq!(got[0], Ok(1));
        assert!(got[1].is_err());
        assert_eq!(got[2], Ok(9));
    }

    #[tokio::test]
    async fn test_limit_spans_fetchers() {
        let fetchers = EntityFetchers::new()
            .with(Arc::new(Fixed::new("first", "/demo/v1", vec![1, 2])))
            .unwrap()
            .with(Arc::new(Fixed::new("second", "/demo/v1", vec![3, 4])))
            .unwrap();
        let got = values(fetchers.fetch_all(FetchRequest::for_kind("/demo/v1").with_limit(3))).await;
        assert_eq!(got, vec![Ok(1), Ok(2), Ok(3)]);
    }

    #[test]
    fn test_duplicate_scheme_rejected() {
        let mut a = Fixed::new("a", "/demo/v1", vec![]);
        a.schemes = &["s3"];
        let mut b = Fixed::new("b", "/demo/v1", vec![]);
        b.schemes = &["s3"];

        let mut fetchers = EntityFetchers::new();
        fetchers.register(Arc::new(a)).unwrap();
        let err = fetchers.register(Arc::new(b)).unwrap_err();
        assert!(matches!(err, FetchError::DuplicateScheme { .. }));
        assert_eq!(fetchers.len(), 1);
    }

    #[tokio::test]
    async fn test_unclaimed_scheme_is_caller_error() {
        let fetchers = EntityFetchers::new()
            .with(Arc::new(Fixed::new("first", "/demo/v1", vec![1])))
            .unwrap();
        let request = FetchRequest::for_uri(url::Url::parse("ftp://host/x").unwrap());
        let items: Vec<_> = fetchers.fetch_all(request).collect().await;
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().is_caller_error());
    }

    #[tokio::test]
    async fn test_uri_rejected_by_scheme_owner_is_caller_error() {
        let mut owner = Fixed::new("owner", "/demo/v1", vec![1]);
        owner.schemes = &["mica"];
        let fetchers = EntityFetchers::new().with(Arc::new(UriFilter(owner))).unwrap();

        let request = FetchRequest::for_uri(url::Url::parse("mica://stroe").unwrap());
        let items: Vec<_> = fetchers.fetch_all(request).collect().await;
        assert_eq!(items.len(), 1);
        let err = items[0].as_ref().unwrap_err();
        assert!(matches!(err, FetchError::BadRequest { .. }));

        let request = FetchRequest::for_uri(url::Url::parse("mica://store").unwrap());
        let got = values(fetchers.fetch_all(request)).await;
        assert_eq!(got, vec![Ok(1)]);
    }

    /// Claims the scheme of its inner fetcher but serves only `<scheme>://store`
    struct UriFilter(Fixed);

    #[async_trait]
    impl EntityFetcher for UriFilter {
        fn name(&self) -> &str {
            self.0.name()
        }

        fn schemes(&self) -> &[&'static str] {
            self.0.schemes()
        }

        fn is_supported(&self, request: &FetchRequest) -> bool {
            self.0.is_supported(request)
                && request
                    .uri
                    .as_ref()
                    .is_none_or(|uri| uri.host_str() == Some("store"))
        }

        async fn fetch(&self, request: FetchRequest) -> Result<Cursor> {
            self.0.fetch(request).await
        }
    }
}
