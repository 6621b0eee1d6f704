//! Entity data model for the Mica catalog
//!
//! An entity is a named, kinded, versioned JSON document. This crate owns the
//! shapes only; persistence lives in `mica-store` and sourcing in `mica-fetch`.
//!
//! - [`Entity`]: a stored record with identity and timestamps
//! - [`PartialEntity`]: the same document without identity (create requests,
//!   records fetched from sources that have no identity of their own)
//! - [`EntityLike`]: the read capability every fetched record satisfies
//! - [`RenderHistoryRecord`]: append-only timing rows written by view renders

pub mod entity;
pub mod error;
pub mod history;
pub mod kinds;
pub mod name;
pub mod types;

pub use entity::{json_type_name, Entity, EntityLike, EntityWriteRequest, PartialEntity, WriteIntent};
pub use error::{EntityError, Result};
pub use history::{HistoryEntity, HistoryRecordId, HistoryRetention, RenderHistoryRecord};
pub use name::{is_valid_name, validate_name};
pub use types::{EntityData, EntityId};
