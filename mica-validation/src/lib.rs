//! JSON Schema validation for the Mica catalog
//!
//! Validation never answers with a bare boolean. [`Validator::validate`]
//! returns a [`ValidatedProperty`] tree mirroring the validated document, so
//! callers can find exactly which nested field failed. Flattening the tree
//! with [`ValidatedProperty::errors`] gives the `path -> error` report shown
//! to users.
//!
//! Schemas are looked up by kind through the [`SchemaSource`] capability,
//! which keeps the validator independent of where schemas are registered.

pub mod builtin;
pub mod error;
pub mod property;
pub mod source;
pub mod strict;
pub mod validator;

pub use error::{Result, ValidationError};
pub use property::{PropertyError, ValidatedProperty, ROOT_PATH};
pub use source::{LayeredSchemas, SchemaSource, StaticSchemas};
pub use validator::{ValidationMode, Validator};
