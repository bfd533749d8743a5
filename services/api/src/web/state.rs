//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use assessment_core::catalog::Catalog;
use assessment_core::{Store, TestSession};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::Config;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub catalog: Arc<Catalog>,
    pub config: Arc<Config>,
    /// In-flight questionnaire sessions, keyed by their transport token.
    /// Each session is exclusively owned by the holder who redeemed it and
    /// is removed once scoring completes.
    pub sessions: Arc<Mutex<HashMap<Uuid, TestSession>>>,
    /// Tokens of authenticated operator sessions.
    pub admin_tokens: Arc<Mutex<HashSet<String>>>,
}
