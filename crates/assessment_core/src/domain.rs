//! crates/assessment_core/src/domain.rs
//!
//! Defines the pure, core data structures for the questionnaire platform.
//! Several of these are persisted by the storage adapters; their serialized
//! field names are a compatibility contract with the pre-existing data files
//! and are pinned with serde renames.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format of the redemption stamp stored in a code record (`data` field).
pub const REDEEMED_AT_FORMAT: &str = "%d/%m/%Y %H:%M";

/// A single scoring item, flattened out of the hierarchical catalog.
///
/// `reverse` marks items whose raw answer is inverted (`scale_max + 1 - answer`)
/// before contributing to the owning scale's total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub text: String,
    pub scale: String,
    pub reverse: bool,
}

/// A redemption record, keyed by its code string in the registry.
///
/// Once `used` is true the record never changes again, except for the
/// one-time attachment of `report` and `response_detail` when the holder's
/// session completes scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeRecord {
    pub used: bool,
    pub email: String,
    #[serde(rename = "nome")]
    pub holder_name: String,
    /// Empty until redemption, then `DD/MM/YYYY HH:MM`.
    #[serde(rename = "data")]
    pub redeemed_at: String,
    #[serde(
        rename = "risposte_dettaglio",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub response_detail: Option<Vec<AnswerDetail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
}

impl CodeRecord {
    /// A freshly generated, never-redeemed record.
    pub fn unused() -> Self {
        Self {
            used: false,
            email: String::new(),
            holder_name: String::new(),
            redeemed_at: String::new(),
            response_detail: None,
            report: None,
        }
    }
}

/// One historical `(scale, raw score)` observation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusEntry {
    #[serde(rename = "scala")]
    pub scale: String,
    pub score: i64,
}

/// The scored outcome for one scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleResult {
    #[serde(rename = "punteggio_grezzo")]
    pub raw_score: i64,
    /// Share of the reference population strictly below `raw_score`, 0..100.
    pub percentile: u8,
    /// Nine-band position within the sorted reference population, 1..9.
    #[serde(rename = "stanina")]
    pub stanine: u8,
}

/// A full report: one [`ScaleResult`] per scale touched by the session.
pub type Report = BTreeMap<String, ScaleResult>;

/// Per-item audit entry attached to a completed code record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDetail {
    /// 1-based position of the item in catalog order.
    pub idx: usize,
    pub text: String,
    #[serde(rename = "scala")]
    pub scale: String,
    pub answer: i64,
    /// Post-inversion score actually summed into the scale total.
    #[serde(rename = "punteggio")]
    pub score: i64,
    pub reverse: bool,
}

/// How a redemption attempt succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionOutcome {
    /// A regular code was claimed and is now permanently marked used.
    Redeemed,
    /// The master code was presented; access is repeatable and nothing
    /// was marked used.
    MasterAccess,
}

/// Everything produced by scoring one completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredOutcome {
    pub report: Report,
    /// Validity-of-responding signal from the social-desirability scale.
    pub alert: bool,
    pub response_detail: Vec<AnswerDetail>,
}

/// A completed code's archived outcome, as retrieved for later review.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReport {
    pub holder_name: String,
    pub email: String,
    pub redeemed_at: String,
    pub alert: bool,
    pub report: Report,
    pub response_detail: Vec<AnswerDetail>,
}
