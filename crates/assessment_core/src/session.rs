//! crates/assessment_core/src/session.rs
//!
//! Per-session response accumulation. A `TestSession` is exclusively owned
//! by its single in-flight transport session and holds no cross-session
//! state.

use crate::domain::CatalogItem;
use crate::ports::{CoreError, CoreResult};

/// Ephemeral state for one questionnaire run.
///
/// The item list is a snapshot captured at session start, so a catalog
/// reload cannot corrupt an in-flight session. Answers are appended in
/// strict catalog order, exactly one per item.
#[derive(Debug, Clone)]
pub struct TestSession {
    code: String,
    holder_name: String,
    holder_email: String,
    items: Vec<CatalogItem>,
    answers: Vec<i64>,
}

impl TestSession {
    pub fn new(
        code: impl Into<String>,
        holder_name: impl Into<String>,
        holder_email: impl Into<String>,
        items: Vec<CatalogItem>,
    ) -> Self {
        Self {
            code: code.into(),
            holder_name: holder_name.into(),
            holder_email: holder_email.into(),
            answers: Vec::with_capacity(items.len()),
            items,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    pub fn holder_email(&self) -> &str {
        &self.holder_email
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn answers(&self) -> &[i64] {
        &self.answers
    }

    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    /// Appends the answer for `index`.
    ///
    /// `index` must equal the number of answers already recorded: no
    /// skipping ahead, no overwriting a prior answer, no answers beyond the
    /// last item. Value-range validation is a transport concern and is not
    /// performed here.
    pub fn record_answer(&mut self, index: usize, value: i64) -> CoreResult<()> {
        if self.is_complete() || index != self.answers.len() {
            return Err(CoreError::OutOfRange {
                expected: self.answers.len(),
                got: index,
            });
        }
        self.answers.push(value);
        Ok(())
    }

    /// True once every item in the snapshot has exactly one answer.
    pub fn is_complete(&self) -> bool {
        self.answers.len() == self.items.len()
    }
}
