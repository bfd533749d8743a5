//! services/api/src/adapters/json_store.rs
//!
//! This module contains the storage adapters: the concrete implementations
//! of the `CodeStore` and `CorpusStore` ports from the `core` crate, backed
//! by JSON files whose layout predates this service and must be preserved.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use assessment_core::domain::{CodeRecord, CorpusEntry};
use assessment_core::ports::{CodeStore, CoreError, CoreResult, CorpusStore};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Registry file: one object keyed by code string.
const CODES_FILE: &str = "codici_seriali.json";
/// Historical corpus file: an array of `{scala, score}` entries.
const CORPUS_FILE: &str = "database.json";
/// Most recent generated batch, replaced wholesale on each generation.
const BATCH_FILE: &str = "ultimi_codici_generati.json";

fn persistence_err(path: &Path, err: impl std::fmt::Display) -> CoreError {
    CoreError::Persistence(format!("{}: {}", path.display(), err))
}

/// Reads and deserializes a JSON file. A missing file is `None`, not an
/// error: every store starts out empty.
async fn read_json<T: DeserializeOwned>(path: &Path) -> CoreResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let value =
                serde_json::from_slice(&bytes).map_err(|e| persistence_err(path, e))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(persistence_err(path, e)),
    }
}

/// Serializes `value` to a sibling temp file and renames it into place, so a
/// crash mid-write can never leave a truncated snapshot behind.
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> CoreResult<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| persistence_err(path, e))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|e| persistence_err(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| persistence_err(path, e))?;
    Ok(())
}

//=========================================================================================
// `CodeStore` Adapter
//=========================================================================================

/// File-backed code registry plus the separate last-batch list.
#[derive(Clone)]
pub struct JsonCodeStore {
    codes_path: PathBuf,
    batch_path: PathBuf,
}

impl JsonCodeStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            codes_path: data_dir.join(CODES_FILE),
            batch_path: data_dir.join(BATCH_FILE),
        }
    }
}

#[async_trait]
impl CodeStore for JsonCodeStore {
    async fn load(&self) -> CoreResult<BTreeMap<String, CodeRecord>> {
        Ok(read_json(&self.codes_path).await?.unwrap_or_default())
    }

    async fn save(&self, registry: &BTreeMap<String, CodeRecord>) -> CoreResult<()> {
        write_json(&self.codes_path, registry).await
    }

    async fn save_batch(&self, codes: &[String]) -> CoreResult<()> {
        write_json(&self.batch_path, codes).await
    }

    async fn load_batch(&self) -> CoreResult<Vec<String>> {
        Ok(read_json(&self.batch_path).await?.unwrap_or_default())
    }
}

//=========================================================================================
// `CorpusStore` Adapter
//=========================================================================================

/// File-backed historical corpus.
#[derive(Clone)]
pub struct JsonCorpusStore {
    path: PathBuf,
}

impl JsonCorpusStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CORPUS_FILE),
        }
    }
}

#[async_trait]
impl CorpusStore for JsonCorpusStore {
    async fn load(&self) -> CoreResult<Vec<CorpusEntry>> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }

    async fn save(&self, entries: &[CorpusEntry]) -> CoreResult<()> {
        write_json(&self.path, entries).await
    }
}
