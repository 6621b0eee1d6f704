//! Primary storage for the Mica catalog
//!
//! - [`EntityStore`]: SQLite persistence with compare-and-set updates keyed on
//!   `updatedAt`, name uniqueness, keyset listing and render history
//! - [`KindSchemas`]: Kind entities exposed as a [`mica_validation::SchemaSource`]
//! - [`Catalog`]: the validated write path and the strict audit pass
//!
//! Conflicting updates are never retried here; callers re-read and resubmit.

pub mod audit;
pub mod catalog;
pub mod error;
pub mod history;
pub mod schema;
pub mod store;

pub use audit::{AuditFinding, AUDIT_PAGE_SIZE};
pub use catalog::Catalog;
pub use error::{Result, StoreError};
pub use schema::KindSchemas;
pub use store::EntityStore;
