//! crates/assessment_core/src/store.rs
//!
//! The explicitly owned store object behind both durable resources: the code
//! registry and the historical corpus. Every state-changing operation
//! (redemption, result attachment, batch generation, scoring completion) is
//! serialized behind one async mutex, so a check-then-set on a code and an
//! append-then-rank on the corpus are each a single atomic unit with respect
//! to every other caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::{
    AnswerDetail, CodeRecord, CorpusEntry, RedemptionOutcome, Report, ScoredOutcome, StoredReport,
    REDEEMED_AT_FORMAT,
};
use crate::ports::{CodeStore, CoreError, CoreResult, CorpusStore};
use crate::scoring;
use crate::session::TestSession;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_SUFFIX_LEN: usize = 6;

/// One `PREFIX-XXXXXX` candidate code. Uniqueness against the registry is
/// the caller's concern.
fn generate_code(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CODE_SUFFIX_LEN)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect();
    format!("{prefix}-{suffix}")
}

/// Owns the storage ports and the in-memory corpus cache.
///
/// The corpus is loaded once at open and kept in memory behind the mutex;
/// the registry is re-read from its port on every operation, so the durable
/// file stays the single source of truth for codes.
pub struct Store {
    codes: Arc<dyn CodeStore>,
    corpus_store: Arc<dyn CorpusStore>,
    master_code: String,
    scale_max: i64,
    alert_scale: String,
    corpus: Mutex<Vec<CorpusEntry>>,
}

impl Store {
    /// Opens the store, loading the historical corpus from its port.
    pub async fn open(
        codes: Arc<dyn CodeStore>,
        corpus_store: Arc<dyn CorpusStore>,
        master_code: impl Into<String>,
        scale_max: i64,
        alert_scale: impl Into<String>,
    ) -> CoreResult<Self> {
        let corpus = corpus_store.load().await?;
        Ok(Self {
            codes,
            corpus_store,
            master_code: master_code.into(),
            scale_max,
            alert_scale: alert_scale.into(),
            corpus: Mutex::new(corpus),
        })
    }

    pub fn master_code(&self) -> &str {
        &self.master_code
    }

    pub fn scale_max(&self) -> i64 {
        self.scale_max
    }

    //=====================================================================================
    // Registry internals
    //=====================================================================================

    /// The reserved master-code record always exists and is recreated
    /// unused whenever it is found missing.
    fn ensure_master(&self, registry: &mut BTreeMap<String, CodeRecord>) {
        registry
            .entry(self.master_code.clone())
            .or_insert_with(CodeRecord::unused);
    }

    async fn load_registry(&self) -> CoreResult<BTreeMap<String, CodeRecord>> {
        let mut registry = self.codes.load().await?;
        self.ensure_master(&mut registry);
        Ok(registry)
    }

    async fn save_registry(&self, registry: &mut BTreeMap<String, CodeRecord>) -> CoreResult<()> {
        self.ensure_master(registry);
        self.codes.save(registry).await
    }

    async fn attach_locked(
        &self,
        code: &str,
        report: &Report,
        detail: &[AnswerDetail],
    ) -> CoreResult<()> {
        let mut registry = self.load_registry().await?;
        let record = registry.get_mut(code).ok_or(CoreError::UnknownCode)?;
        record.report = Some(report.clone());
        record.response_detail = Some(detail.to_vec());
        self.save_registry(&mut registry).await
    }

    //=====================================================================================
    // Code Registry operations
    //=====================================================================================

    /// Atomically claims `code` for the given holder.
    ///
    /// The master code succeeds unconditionally and never transitions to
    /// used; any other known, unused code is marked used, stamped with the
    /// holder's identity and `now`, and persisted before this returns. Of
    /// any number of concurrent attempts on the same code, exactly one
    /// receives [`RedemptionOutcome::Redeemed`].
    pub async fn try_redeem(
        &self,
        code: &str,
        holder_name: &str,
        holder_email: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<RedemptionOutcome> {
        if code == self.master_code {
            return Ok(RedemptionOutcome::MasterAccess);
        }
        let _corpus = self.corpus.lock().await;
        let mut registry = self.load_registry().await?;
        let record = registry.get_mut(code).ok_or(CoreError::UnknownCode)?;
        if record.used {
            return Err(CoreError::AlreadyRedeemed);
        }
        record.used = true;
        record.holder_name = holder_name.to_string();
        record.email = holder_email.to_string();
        record.redeemed_at = now.format(REDEEMED_AT_FORMAT).to_string();
        self.save_registry(&mut registry).await?;
        Ok(RedemptionOutcome::Redeemed)
    }

    /// Persists a report and its response detail into the code's record,
    /// last write wins. Re-completion is prevented by `try_redeem`, not
    /// here.
    pub async fn attach_result(
        &self,
        code: &str,
        report: &Report,
        detail: &[AnswerDetail],
    ) -> CoreResult<()> {
        let _corpus = self.corpus.lock().await;
        self.attach_locked(code, report, detail).await
    }

    /// Generates `count` fresh unique codes, inserts them as unused records,
    /// persists the registry, and replaces the retrievable "most recent
    /// batch". Pre-existing records are never touched.
    pub async fn generate_batch(&self, count: usize, prefix: &str) -> CoreResult<Vec<String>> {
        let _corpus = self.corpus.lock().await;
        let mut registry = self.load_registry().await?;
        let mut fresh = Vec::with_capacity(count);
        while fresh.len() < count {
            let code = generate_code(prefix);
            if registry.contains_key(&code) {
                continue;
            }
            registry.insert(code.clone(), CodeRecord::unused());
            fresh.push(code);
        }
        self.save_registry(&mut registry).await?;
        self.codes.save_batch(&fresh).await?;
        Ok(fresh)
    }

    /// The most recently generated batch, for operator retrieval.
    pub async fn last_batch(&self) -> CoreResult<Vec<String>> {
        self.codes.load_batch().await
    }

    /// Fetches the archived outcome for a completed code, matched on the
    /// code/holder-email pair. The validity alert is recomputed from the
    /// stored report.
    pub async fn stored_report(&self, code: &str, holder_email: &str) -> CoreResult<StoredReport> {
        let registry = self.load_registry().await?;
        let record = registry.get(code).ok_or(CoreError::UnknownCode)?;
        if record.email != holder_email {
            return Err(CoreError::UnknownCode);
        }
        let report = record.report.clone().unwrap_or_default();
        let alert = scoring::validity_alert(&report, &self.alert_scale);
        Ok(StoredReport {
            holder_name: record.holder_name.clone(),
            email: record.email.clone(),
            redeemed_at: record.redeemed_at.clone(),
            alert,
            report,
            response_detail: record.response_detail.clone().unwrap_or_default(),
        })
    }

    //=====================================================================================
    // Scoring completion
    //=====================================================================================

    /// Scores a completed session as one atomic unit: appends its per-scale
    /// totals to the corpus (durably, before any ranking), ranks against the
    /// grown population, archives the report on the originating code record,
    /// and returns the outcome.
    ///
    /// A missing registry record (legitimate for the master code in a
    /// misconfigured store) downgrades the archive step to a warning; the
    /// scored outcome is still returned.
    pub async fn complete_session(&self, session: &TestSession) -> CoreResult<ScoredOutcome> {
        if !session.is_complete() {
            return Err(CoreError::IncompleteSession);
        }
        let raw = scoring::raw_scores(session.items(), session.answers(), self.scale_max);

        let mut corpus = self.corpus.lock().await;
        let mut grown = corpus.clone();
        grown.extend(raw.iter().map(|(scale, score)| CorpusEntry {
            scale: scale.clone(),
            score: *score,
        }));
        self.corpus_store.save(&grown).await?;
        *corpus = grown;

        let report = scoring::build_report(&raw, &corpus);
        let detail = scoring::response_detail(session.items(), session.answers(), self.scale_max);
        let alert = scoring::validity_alert(&report, &self.alert_scale);

        match self.attach_locked(session.code(), &report, &detail).await {
            Ok(()) => {}
            Err(CoreError::UnknownCode) => {
                warn!(
                    code = session.code(),
                    "completed session has no registry record; report not archived"
                );
            }
            Err(err) => return Err(err),
        }

        Ok(ScoredOutcome {
            report,
            alert,
            response_detail: detail,
        })
    }

    //=====================================================================================
    // Export reads
    //=====================================================================================

    /// Redeemed records ordered by redemption stamp, for operator views and
    /// tabular export.
    pub async fn used_records(&self) -> CoreResult<Vec<(String, CodeRecord)>> {
        let registry = self.load_registry().await?;
        let mut used: Vec<(String, CodeRecord)> =
            registry.into_iter().filter(|(_, r)| r.used).collect();
        used.sort_by(|a, b| a.1.redeemed_at.cmp(&b.1.redeemed_at));
        Ok(used)
    }

    /// The full historical corpus in append order.
    pub async fn corpus_entries(&self) -> Vec<CorpusEntry> {
        self.corpus.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CatalogItem, ScaleResult};
    use std::sync::Mutex as StdMutex;

    const MASTER: &str = "GO2B-MASTER";

    /// In-memory stand-in for both storage ports.
    #[derive(Default)]
    struct MemStore {
        registry: StdMutex<BTreeMap<String, CodeRecord>>,
        batch: StdMutex<Vec<String>>,
        corpus: StdMutex<Vec<CorpusEntry>>,
        fail_saves: StdMutex<bool>,
    }

    impl MemStore {
        fn set_fail_saves(&self, fail: bool) {
            *self.fail_saves.lock().unwrap() = fail;
        }

        fn check_writable(&self) -> CoreResult<()> {
            if *self.fail_saves.lock().unwrap() {
                return Err(CoreError::Persistence("disk full".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl CodeStore for MemStore {
        async fn load(&self) -> CoreResult<BTreeMap<String, CodeRecord>> {
            Ok(self.registry.lock().unwrap().clone())
        }

        async fn save(&self, registry: &BTreeMap<String, CodeRecord>) -> CoreResult<()> {
            self.check_writable()?;
            *self.registry.lock().unwrap() = registry.clone();
            Ok(())
        }

        async fn save_batch(&self, codes: &[String]) -> CoreResult<()> {
            self.check_writable()?;
            *self.batch.lock().unwrap() = codes.to_vec();
            Ok(())
        }

        async fn load_batch(&self) -> CoreResult<Vec<String>> {
            Ok(self.batch.lock().unwrap().clone())
        }
    }

    #[async_trait::async_trait]
    impl CorpusStore for MemStore {
        async fn load(&self) -> CoreResult<Vec<CorpusEntry>> {
            Ok(self.corpus.lock().unwrap().clone())
        }

        async fn save(&self, entries: &[CorpusEntry]) -> CoreResult<()> {
            self.check_writable()?;
            *self.corpus.lock().unwrap() = entries.to_vec();
            Ok(())
        }
    }

    async fn open_store(mem: &Arc<MemStore>) -> Store {
        Store::open(
            mem.clone(),
            mem.clone(),
            MASTER,
            6,
            scoring::SOCIAL_DESIRABILITY_SCALE,
        )
        .await
        .unwrap()
    }

    fn seeded(codes: &[&str]) -> Arc<MemStore> {
        let mem = Arc::new(MemStore::default());
        {
            let mut registry = mem.registry.lock().unwrap();
            for code in codes {
                registry.insert(code.to_string(), CodeRecord::unused());
            }
        }
        mem
    }

    fn item(scale: &str, reverse: bool) -> CatalogItem {
        CatalogItem {
            text: format!("{scale} item"),
            scale: scale.to_string(),
            reverse,
        }
    }

    fn completed_session(code: &str, items: Vec<CatalogItem>, answers: &[i64]) -> TestSession {
        let mut session = TestSession::new(code, "Ada", "ada@example.com", items);
        for (i, &answer) in answers.iter().enumerate() {
            session.record_answer(i, answer).unwrap();
        }
        session
    }

    #[tokio::test]
    async fn a_code_is_redeemable_exactly_once() {
        let mem = seeded(&["GO2B-AAAAAA"]);
        let store = open_store(&mem).await;

        let first = store
            .try_redeem("GO2B-AAAAAA", "Ada", "ada@example.com", Utc::now())
            .await
            .unwrap();
        assert_eq!(first, RedemptionOutcome::Redeemed);

        let second = store
            .try_redeem("GO2B-AAAAAA", "Eve", "eve@example.com", Utc::now())
            .await;
        assert!(matches!(second, Err(CoreError::AlreadyRedeemed)));

        // The first holder's identity survived the rejected attempt.
        let record = mem.registry.lock().unwrap()["GO2B-AAAAAA"].clone();
        assert!(record.used);
        assert_eq!(record.holder_name, "Ada");
        assert_eq!(record.email, "ada@example.com");
        assert!(!record.redeemed_at.is_empty());
    }

    #[tokio::test]
    async fn unknown_codes_are_rejected_distinctly() {
        let mem = seeded(&[]);
        let store = open_store(&mem).await;
        let outcome = store
            .try_redeem("GO2B-ZZZZZZ", "Ada", "ada@example.com", Utc::now())
            .await;
        assert!(matches!(outcome, Err(CoreError::UnknownCode)));
    }

    #[tokio::test]
    async fn master_code_is_repeatable_and_never_marked_used() {
        let mem = seeded(&[]);
        let store = open_store(&mem).await;
        for _ in 0..3 {
            let outcome = store
                .try_redeem(MASTER, "Op", "op@example.com", Utc::now())
                .await
                .unwrap();
            assert_eq!(outcome, RedemptionOutcome::MasterAccess);
        }
        // Master access writes nothing at all.
        let registry = mem.registry.lock().unwrap();
        assert!(registry.get(MASTER).map_or(true, |r| !r.used));
    }

    #[tokio::test]
    async fn concurrent_redemptions_of_the_same_code_yield_one_success() {
        let mem = seeded(&["GO2B-AAAAAA"]);
        let store = Arc::new(open_store(&mem).await);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .try_redeem(
                        "GO2B-AAAAAA",
                        &format!("holder {i}"),
                        &format!("holder{i}@example.com"),
                        Utc::now(),
                    )
                    .await
            }));
        }

        let mut successes = 0;
        let mut already = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(RedemptionOutcome::Redeemed) => successes += 1,
                Err(CoreError::AlreadyRedeemed) => already += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(already, 7);
    }

    #[tokio::test]
    async fn redemption_reports_persistence_failures_instead_of_success() {
        let mem = seeded(&["GO2B-AAAAAA"]);
        let store = open_store(&mem).await;
        mem.set_fail_saves(true);
        let outcome = store
            .try_redeem("GO2B-AAAAAA", "Ada", "ada@example.com", Utc::now())
            .await;
        assert!(matches!(outcome, Err(CoreError::Persistence(_))));
        // The durable registry still shows the code unused.
        assert!(!mem.registry.lock().unwrap()["GO2B-AAAAAA"].used);
    }

    #[tokio::test]
    async fn generate_batch_adds_unique_unused_codes_without_touching_existing_ones() {
        let mem = seeded(&["GO2B-OLD111"]);
        let store = open_store(&mem).await;
        mem.registry.lock().unwrap().get_mut("GO2B-OLD111").unwrap().used = true;

        let fresh = store.generate_batch(50, "GO2B").await.unwrap();
        assert_eq!(fresh.len(), 50);

        let distinct: std::collections::BTreeSet<&String> = fresh.iter().collect();
        assert_eq!(distinct.len(), 50);

        let registry = mem.registry.lock().unwrap();
        for code in &fresh {
            assert!(code.starts_with("GO2B-"));
            let record = &registry[code];
            assert!(!record.used);
        }
        // The pre-existing record is untouched, and the master slot exists.
        assert!(registry["GO2B-OLD111"].used);
        assert!(registry.contains_key(MASTER));
        assert_eq!(*mem.batch.lock().unwrap(), fresh);
    }

    #[tokio::test]
    async fn each_batch_replaces_the_retrievable_last_batch() {
        let mem = seeded(&[]);
        let store = open_store(&mem).await;
        let first = store.generate_batch(5, "GO2B").await.unwrap();
        let second = store.generate_batch(5, "GO2B").await.unwrap();
        assert_eq!(store.last_batch().await.unwrap(), second);
        // Both batches remain registered.
        let registry = mem.registry.lock().unwrap();
        for code in first.iter().chain(&second) {
            assert!(registry.contains_key(code));
        }
    }

    #[tokio::test]
    async fn attach_result_is_last_write_wins() {
        let mem = seeded(&["GO2B-AAAAAA"]);
        let store = open_store(&mem).await;

        let mut first = Report::new();
        first.insert(
            "A".to_string(),
            ScaleResult {
                raw_score: 7,
                percentile: 0,
                stanine: 9,
            },
        );
        let mut second = Report::new();
        second.insert(
            "A".to_string(),
            ScaleResult {
                raw_score: 12,
                percentile: 50,
                stanine: 5,
            },
        );

        store.attach_result("GO2B-AAAAAA", &first, &[]).await.unwrap();
        store.attach_result("GO2B-AAAAAA", &second, &[]).await.unwrap();

        let stored = mem.registry.lock().unwrap()["GO2B-AAAAAA"]
            .report
            .clone()
            .unwrap();
        assert_eq!(stored, second);
    }

    #[tokio::test]
    async fn attach_result_rejects_unregistered_codes() {
        let mem = seeded(&[]);
        let store = open_store(&mem).await;
        let outcome = store.attach_result("GO2B-GHOST1", &Report::new(), &[]).await;
        assert!(matches!(outcome, Err(CoreError::UnknownCode)));
    }

    #[tokio::test]
    async fn first_completion_seeds_the_corpus_and_scores_against_itself() {
        // Empty corpus; one scale A with two non-reversed items, answers
        // [3, 4]: raw 7, percentile 0, stanine 9.
        let mem = seeded(&["GO2B-AAAAAA"]);
        let store = open_store(&mem).await;
        store
            .try_redeem("GO2B-AAAAAA", "Ada", "ada@example.com", Utc::now())
            .await
            .unwrap();

        let session = completed_session(
            "GO2B-AAAAAA",
            vec![item("A", false), item("A", false)],
            &[3, 4],
        );
        let outcome = store.complete_session(&session).await.unwrap();

        let a = &outcome.report["A"];
        assert_eq!((a.raw_score, a.percentile, a.stanine), (7, 0, 9));
        assert!(!outcome.alert);
        assert_eq!(outcome.response_detail.len(), 2);

        let corpus = mem.corpus.lock().unwrap().clone();
        assert_eq!(
            corpus,
            vec![CorpusEntry {
                scale: "A".to_string(),
                score: 7
            }]
        );

        // The report was archived onto the code record.
        let record = mem.registry.lock().unwrap()["GO2B-AAAAAA"].clone();
        assert_eq!(record.report.unwrap()["A"].raw_score, 7);
        assert_eq!(record.response_detail.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn later_completions_rank_against_the_grown_population() {
        let mem = seeded(&["GO2B-AAAAAA"]);
        {
            let mut corpus = mem.corpus.lock().unwrap();
            for score in [5, 9] {
                corpus.push(CorpusEntry {
                    scale: "A".to_string(),
                    score,
                });
            }
        }
        let store = open_store(&mem).await;

        let session = completed_session(
            "GO2B-AAAAAA",
            vec![item("A", false), item("A", false)],
            &[3, 4],
        );
        let outcome = store.complete_session(&session).await.unwrap();

        // Population after the self-inclusive append: [5, 9, 7].
        let a = &outcome.report["A"];
        assert_eq!((a.raw_score, a.percentile, a.stanine), (7, 33, 6));
        assert_eq!(mem.corpus.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn incomplete_sessions_are_never_scored() {
        let mem = seeded(&["GO2B-AAAAAA"]);
        let store = open_store(&mem).await;
        let mut session = TestSession::new(
            "GO2B-AAAAAA",
            "Ada",
            "ada@example.com",
            vec![item("A", false), item("A", false)],
        );
        session.record_answer(0, 3).unwrap();

        let outcome = store.complete_session(&session).await;
        assert!(matches!(outcome, Err(CoreError::IncompleteSession)));
        assert!(mem.corpus.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_without_a_registry_record_still_returns_the_outcome() {
        // The master code runs sessions without ever being registered.
        let mem = seeded(&[]);
        let store = open_store(&mem).await;
        let session = completed_session(MASTER, vec![item("A", false)], &[4]);
        let outcome = store.complete_session(&session).await.unwrap();
        assert_eq!(outcome.report["A"].raw_score, 4);
        // The corpus still grew.
        assert_eq!(mem.corpus.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_corpus_append_aborts_scoring_and_keeps_the_cache_clean() {
        let mem = seeded(&["GO2B-AAAAAA"]);
        let store = open_store(&mem).await;
        mem.set_fail_saves(true);

        let session = completed_session("GO2B-AAAAAA", vec![item("A", false)], &[4]);
        let outcome = store.complete_session(&session).await;
        assert!(matches!(outcome, Err(CoreError::Persistence(_))));

        // Neither the durable corpus nor the cache grew.
        assert!(mem.corpus.lock().unwrap().is_empty());
        assert!(store.corpus_entries().await.is_empty());
    }

    #[tokio::test]
    async fn stored_report_requires_the_matching_email() {
        let mem = seeded(&["GO2B-AAAAAA"]);
        let store = open_store(&mem).await;
        store
            .try_redeem("GO2B-AAAAAA", "Ada", "ada@example.com", Utc::now())
            .await
            .unwrap();
        let session = completed_session("GO2B-AAAAAA", vec![item("A", false)], &[4]);
        store.complete_session(&session).await.unwrap();

        let stored = store
            .stored_report("GO2B-AAAAAA", "ada@example.com")
            .await
            .unwrap();
        assert_eq!(stored.holder_name, "Ada");
        assert_eq!(stored.report["A"].raw_score, 4);
        assert_eq!(stored.response_detail.len(), 1);

        let wrong = store.stored_report("GO2B-AAAAAA", "eve@example.com").await;
        assert!(matches!(wrong, Err(CoreError::UnknownCode)));
    }

    #[tokio::test]
    async fn used_records_are_ordered_by_redemption_stamp() {
        let mem = seeded(&["GO2B-AAAAAA", "GO2B-BBBBBB"]);
        let store = open_store(&mem).await;
        let earlier = "2024-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let later = "2024-03-02T09:30:00Z".parse::<DateTime<Utc>>().unwrap();
        store
            .try_redeem("GO2B-BBBBBB", "Second", "b@example.com", later)
            .await
            .unwrap();
        store
            .try_redeem("GO2B-AAAAAA", "First", "a@example.com", earlier)
            .await
            .unwrap();

        let used = store.used_records().await.unwrap();
        let names: Vec<&str> = used.iter().map(|(_, r)| r.holder_name.as_str()).collect();
        assert_eq!(names, ["First", "Second"]);
    }
}
