//! Entities from YAML or JSON files on disk
//!
//! A `file://` URI names either one document file or a directory walked
//! recursively in sorted path order. Each file holds one entity document, a
//! list of them, or (YAML only) several `---`-separated documents.

use crate::error::{FetchError, Result};
use crate::fetcher::{Cursor, EntityFetcher, FetchedEntity};
use crate::request::FetchRequest;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mica_entity::PartialEntity;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use url::Url;
use walkdir::WalkDir;

pub const FILE_SCHEME: &str = "file";

const EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

#[derive(Debug, Clone, Default)]
pub struct FileFetcher;

impl FileFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EntityFetcher for FileFetcher {
    fn name(&self) -> &str {
        "file"
    }

    fn schemes(&self) -> &[&'static str] {
        &[FILE_SCHEME]
    }

    fn is_supported(&self, request: &FetchRequest) -> bool {
        request.scheme() == Some(FILE_SCHEME)
    }

    async fn fetch(&self, request: FetchRequest) -> Result<Cursor> {
        let uri = request
            .uri
            .clone()
            .ok_or_else(|| FetchError::bad_request("file fetch needs a file:// URI"))?;
        let root = uri
            .to_file_path()
            .map_err(|_| FetchError::bad_request(format!("'{}' is not a local file path", uri)))?;
        if !root.exists() {
            return Err(FetchError::bad_request(format!(
                "{} does not exist",
                root.display()
            )));
        }

        let files = document_files(&root)?;
        debug!(root = %root.display(), files = files.len(), "walking entity files");

        let cursor = stream::iter(files)
            .flat_map(move |path| {
                let items: Vec<Result<FetchedEntity>> = match read_documents(&path) {
                    Ok(entities) => {
                        let source = Url::from_file_path(&path).ok();
                        entities
                            .into_iter()
                            .filter(|entity| request.matches_kind(&entity.kind))
                            .map(|entity| {
                                let fetched = FetchedEntity::new(entity);
                                Ok(match &source {
                                    Some(url) => fetched.with_source(url.clone()),
                                    None => fetched,
                                })
                            })
                            .collect()
                    }
                    Err(error) => vec![Err(error)],
                };
                stream::iter(items)
            })
            .boxed();
        Ok(cursor)
    }
}

/// Document files under `root`, sorted by path
fn document_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| FetchError::unavailable("filesystem", e.to_string()))?;
        let is_document = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext));
        if is_document {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn read_documents(path: &Path) -> Result<Vec<PartialEntity>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        FetchError::unavailable("filesystem", format!("{}: {}", path.display(), e))
    })?;
    let invalid = |message: String| FetchError::bad_request(format!("{}: {}", path.display(), message));

    let documents: Vec<Value> = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        vec![serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?]
    } else {
        serde_yaml_ng::Deserializer::from_str(&text)
            .map(Value::deserialize)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| invalid(e.to_string()))?
    };

    let mut entities = Vec::new();
    for document in documents {
        match document {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    entities.push(PartialEntity::from_document(item).map_err(|e| invalid(e.to_string()))?);
                }
            }
            other => {
                entities.push(PartialEntity::from_document(other).map_err(|e| invalid(e.to_string()))?)
            }
        }
    }
    trace!(path = %path.display(), count = entities.len(), "read entity documents");
    Ok(entities)
}
