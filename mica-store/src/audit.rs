//! Strict audit of every stored entity
//!
//! Walks the whole catalog page by page and validates each entity against its
//! kind schema with undeclared fields rejected. Entities of unregistered kinds
//! are skipped.

use crate::catalog::Catalog;
use crate::error::Result;
use mica_entity::{Entity, EntityId};
use mica_validation::{PropertyError, ValidationError, ValidationMode, Validator, ROOT_PATH};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Entities read per page during an audit
pub const AUDIT_PAGE_SIZE: usize = 200;

/// One entity that does not satisfy its kind schema
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFinding {
    pub entity_id: EntityId,
    pub name: String,
    pub kind: String,
    pub errors: BTreeMap<String, PropertyError>,
}

impl Catalog {
    /// Validate every stored entity strictly, returning the failures
    pub fn audit(&self) -> Result<Vec<AuditFinding>> {
        let schemas = self.schemas();
        let mut findings = Vec::new();
        let mut checked = 0usize;
        let mut after: Option<String> = None;

        loop {
            let page = self.store().list_all(after.as_deref(), AUDIT_PAGE_SIZE)?;
            let Some(last) = page.last() else {
                break;
            };
            after = Some(last.name.clone());

            for entity in &page {
                checked += 1;
                let outcome = Validator::validate_kind(
                    schemas.as_ref(),
                    &entity.kind,
                    &entity.data,
                    ValidationMode::Strict,
                );
                let errors = match outcome {
                    Ok(Some(tree)) if tree.is_valid() => continue,
                    Ok(Some(tree)) => tree.errors(),
                    Ok(None) => continue,
                    Err(ValidationError::InvalidSchema { message }) => {
                        BTreeMap::from([(ROOT_PATH.to_string(), PropertyError::new("schema", message))])
                    }
                    Err(other) => return Err(other.into()),
                };
                warn!(name = %entity.name, violations = errors.len(), "audit finding");
                findings.push(finding(entity, errors));
            }
        }

        info!(checked, findings = findings.len(), "catalog audit complete");
        Ok(findings)
    }
}

fn finding(entity: &Entity, errors: BTreeMap<String, PropertyError>) -> AuditFinding {
    AuditFinding {
        entity_id: entity.id,
        name: entity.name.clone(),
        kind: entity.kind.clone(),
        errors,
    }
}
