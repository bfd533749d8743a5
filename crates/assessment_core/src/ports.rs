//! crates/assessment_core/src/ports.rs
//!
//! Defines the storage contracts (traits) for the platform's durable state.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete persistence layer.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::domain::{CodeRecord, CorpusEntry};

//=========================================================================================
// Core Error and Result Types
//=========================================================================================

/// The error taxonomy shared by every core operation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The presented access code is not in the registry. User-correctable.
    #[error("The access code is not valid")]
    UnknownCode,

    /// The presented access code was already consumed. User-correctable,
    /// deliberately distinct from [`CoreError::UnknownCode`].
    #[error("The access code has already been used")]
    AlreadyRedeemed,

    /// Scoring was invoked before every catalog item was answered.
    #[error("Session is missing answers for one or more items")]
    IncompleteSession,

    /// An answer arrived out of strict catalog sequence.
    #[error("Answer recorded out of sequence (expected index {expected}, got {got})")]
    OutOfRange { expected: usize, got: usize },

    /// A durable read or write failed. Fatal to the in-flight operation.
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

/// A convenience type alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

//=========================================================================================
// Storage Ports (Traits)
//=========================================================================================

/// Durable mapping from code string to redemption record, plus the separate
/// "most recent batch" list kept for operator convenience.
///
/// Implementations persist whole snapshots; atomicity across check-then-set
/// sequences is the responsibility of [`crate::store::Store`], which
/// serializes every mutation.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Loads the full registry. Empty when nothing has been persisted yet.
    async fn load(&self) -> CoreResult<BTreeMap<String, CodeRecord>>;

    /// Durably persists the full registry snapshot.
    async fn save(&self, registry: &BTreeMap<String, CodeRecord>) -> CoreResult<()>;

    /// Replaces the most-recently-generated batch wholesale.
    async fn save_batch(&self, codes: &[String]) -> CoreResult<()>;

    /// Loads the most-recently-generated batch. Empty when none exists.
    async fn load_batch(&self) -> CoreResult<Vec<String>>;
}

/// Durable, append-only log of historical `(scale, raw score)` pairs: the
/// reference population for norm-referenced scoring.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Loads every entry ever appended, in append order.
    async fn load(&self) -> CoreResult<Vec<CorpusEntry>>;

    /// Durably persists the grown corpus snapshot.
    async fn save(&self, entries: &[CorpusEntry]) -> CoreResult<()>;
}
