//! Common types shared by every Mica crate
//!
//! Each crate owns its own error enum. This crate only provides the shared
//! vocabulary those errors are classified into ([`ErrorCode`]) and a couple of
//! logging helpers.

pub mod error;
pub mod logging;

pub use error::{Classify, ErrorCode, ErrorReport, ErrorSeverity};
pub use logging::{log_classified, Pretty};
