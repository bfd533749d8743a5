//! crates/assessment_core/src/scoring.rs
//!
//! Norm-referenced scoring: per-scale raw sums with reverse-item inversion,
//! percentile ranks and stanine bands computed against the historical
//! population. Every function here is pure; the one side effect of a scoring
//! completion (growing the corpus) lives in [`crate::store::Store`].
//!
//! Ranking is self-inclusive by design: a session's own totals join the
//! reference population before its percentile and stanine are computed, so a
//! population of exactly one entry yields percentile 0 and stanine 9 for that
//! entry. Stored reports depend on this behavior.

use std::collections::BTreeMap;

use crate::domain::{AnswerDetail, CatalogItem, CorpusEntry, Report, ScaleResult};

/// Scale whose elevated scores flag a validity-of-responding concern.
pub const SOCIAL_DESIRABILITY_SCALE: &str = "Desiderabilità sociale";

/// Percentile at or above which the social-desirability scale raises the alert.
const ALERT_PERCENTILE: u8 = 85;
/// Stanine at or above which the social-desirability scale raises the alert.
const ALERT_STANINE: u8 = 8;

/// Post-inversion score of a single answer.
pub fn item_score(answer: i64, reverse: bool, scale_max: i64) -> i64 {
    if reverse {
        scale_max + 1 - answer
    } else {
        answer
    }
}

/// Per-scale raw totals, scales in first-encounter catalog order.
pub fn raw_scores(items: &[CatalogItem], answers: &[i64], scale_max: i64) -> Vec<(String, i64)> {
    let mut totals: Vec<(String, i64)> = Vec::new();
    for (item, &answer) in items.iter().zip(answers) {
        let score = item_score(answer, item.reverse, scale_max);
        match totals.iter_mut().find(|(scale, _)| *scale == item.scale) {
            Some((_, total)) => *total += score,
            None => totals.push((item.scale.clone(), score)),
        }
    }
    totals
}

/// Share of the population strictly below `score`, as a rounded 0..100
/// integer. Ties do not count as "below", so an entry ranked against a
/// population containing only itself scores 0.
pub fn percentile(population: &[i64], score: i64) -> u8 {
    debug_assert!(!population.is_empty());
    let below = population.iter().filter(|&&x| x < score).count();
    ((below as f64 / population.len() as f64) * 100.0).round() as u8
}

/// Nine-band position of `score` within the ascending-sorted population,
/// clamped to 1..9. `position` is the index of the score's first occurrence,
/// so tied entries share the lowest band among them.
pub fn stanine(population: &[i64], score: i64) -> u8 {
    debug_assert!(!population.is_empty());
    let mut sorted = population.to_vec();
    sorted.sort_unstable();
    let position = sorted.iter().position(|&x| x == score).unwrap_or(0);
    let band = ((position + 1) * 9).div_ceil(sorted.len());
    band.clamp(1, 9) as u8
}

/// Builds the per-scale report against the post-append population.
pub fn build_report(raw: &[(String, i64)], corpus: &[CorpusEntry]) -> Report {
    let mut report = BTreeMap::new();
    for (scale, score) in raw {
        let population: Vec<i64> = corpus
            .iter()
            .filter(|entry| entry.scale == *scale)
            .map(|entry| entry.score)
            .collect();
        report.insert(
            scale.clone(),
            ScaleResult {
                raw_score: *score,
                percentile: percentile(&population, *score),
                stanine: stanine(&population, *score),
            },
        );
    }
    report
}

/// Validity-of-responding signal: true when the social-desirability profile
/// is elevated. A downstream review flag, not an error.
pub fn validity_alert(report: &Report, alert_scale: &str) -> bool {
    report
        .get(alert_scale)
        .is_some_and(|r| r.percentile >= ALERT_PERCENTILE || r.stanine >= ALERT_STANINE)
}

/// The full per-item audit trail attached to a completed record.
pub fn response_detail(
    items: &[CatalogItem],
    answers: &[i64],
    scale_max: i64,
) -> Vec<AnswerDetail> {
    items
        .iter()
        .zip(answers)
        .enumerate()
        .map(|(i, (item, &answer))| AnswerDetail {
            idx: i + 1,
            text: item.text.clone(),
            scale: item.scale.clone(),
            answer,
            score: item_score(answer, item.reverse, scale_max),
            reverse: item.reverse,
        })
        .collect()
}
