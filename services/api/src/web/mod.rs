pub mod admin;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the handlers the binary wires into the router.
pub use middleware::require_admin;
pub use rest::{
    complete_session_handler, get_item_handler, record_answer_handler, start_session_handler,
};
