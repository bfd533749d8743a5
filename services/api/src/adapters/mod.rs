pub mod catalog;
pub mod json_store;

pub use catalog::load_catalog;
pub use json_store::{JsonCodeStore, JsonCorpusStore};
