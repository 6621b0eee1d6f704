//! # Mica
//!
//! A versioned metadata catalog. Named, kinded JSON entities are stored with
//! optimistic concurrency; Kind entities carry the JSON Schema for their
//! kind; View entities declare how to select entities from any registered
//! source and reshape them.
//!
//! ```rust,no_run
//! use mica::{Mica, RenderRequest};
//! use mica::entity::{EntityWriteRequest, PartialEntity};
//! use serde_json::json;
//!
//! # async fn demo() -> mica::Result<()> {
//! let mica = Mica::in_memory()?;
//! mica.write(EntityWriteRequest::create(
//!     PartialEntity::new("/demo/a", "/demo/v1").with_field("value", json!(1)),
//! ))?;
//! let rendered = mica
//!     .render(RenderRequest::inline(json!({
//!         "selector": {"entityKind": "/demo/v1"},
//!         "data": {"jsonPath": "$.value"}
//!     })))
//!     .await?;
//! assert_eq!(rendered.document, json!([1]));
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod error;
pub mod logging;

pub use catalog::Mica;
pub use error::{MicaError, Result};
pub use logging::init_logging;

pub use mica_common::{Classify, ErrorCode, ErrorReport};
pub use mica_config::{CatalogConfig, ConfigProvider};
pub use mica_views::{RenderRequest, RenderedView};

pub use mica_common as common;
pub use mica_config as config;
pub use mica_entity as entity;
pub use mica_fetch as fetch;
pub use mica_js as js;
pub use mica_store as store;
pub use mica_validation as validation;
pub use mica_views as views;
