//! services/api/src/adapters/catalog.rs
//!
//! Loads the nested questionnaire definition from its JSON data file and
//! flattens it into the catalog served to sessions.

use std::path::Path;

use assessment_core::catalog::{Catalog, TestStructure};

use crate::error::ApiError;

/// Reads, parses, and flattens the questionnaire definition.
pub async fn load_catalog(path: &Path) -> Result<Catalog, ApiError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ApiError::Catalog(format!("{}: {}", path.display(), e)))?;
    let structure: TestStructure = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::Catalog(format!("{}: {}", path.display(), e)))?;
    Ok(structure.flatten())
}
