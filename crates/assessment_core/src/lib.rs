pub mod catalog;
pub mod domain;
pub mod ports;
pub mod scoring;
pub mod session;
pub mod store;

pub use catalog::{Catalog, TestStructure};
pub use domain::{
    AnswerDetail, CatalogItem, CodeRecord, CorpusEntry, RedemptionOutcome, Report, ScaleResult,
    ScoredOutcome, StoredReport,
};
pub use ports::{CodeStore, CoreError, CoreResult, CorpusStore};
pub use session::TestSession;
pub use store::Store;
