//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{load_catalog, JsonCodeStore, JsonCorpusStore},
    config::Config,
    error::ApiError,
    web::{
        admin::{
            admin_login_handler, admin_logout_handler, export_codes_handler,
            export_corpus_handler, export_users_handler, generate_codes_handler,
            latest_codes_handler, list_users_handler, stored_report_handler,
        },
        complete_session_handler, get_item_handler, record_answer_handler, require_admin,
        rest::ApiDoc, start_session_handler, state::AppState,
    },
};
use assessment_core::Store;
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Load the Catalog & Open the Store ---
    tokio::fs::create_dir_all(&config.data_dir).await?;
    let catalog = Arc::new(load_catalog(&config.catalog_path).await?);
    info!(
        items = catalog.items.len(),
        scale_max = catalog.scale_max,
        "Catalog loaded"
    );

    let code_store = Arc::new(JsonCodeStore::new(&config.data_dir));
    let corpus_store = Arc::new(JsonCorpusStore::new(&config.data_dir));
    let store = Arc::new(
        Store::open(
            code_store,
            corpus_store,
            config.master_code.clone(),
            catalog.scale_max,
            config.alert_scale.clone(),
        )
        .await?,
    );
    info!(
        corpus_entries = store.corpus_entries().await.len(),
        "Store opened"
    );

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store,
        catalog,
        config: config.clone(),
        sessions: Arc::new(Mutex::new(HashMap::new())),
        admin_tokens: Arc::new(Mutex::new(HashSet::new())),
    });

    let frontend_origin = config
        .frontend_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid FRONTEND_ORIGIN: {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/sessions", post(start_session_handler))
        .route("/sessions/{session_id}/items/{index}", get(get_item_handler))
        .route("/sessions/{session_id}/answers", post(record_answer_handler))
        .route(
            "/sessions/{session_id}/complete",
            post(complete_session_handler),
        )
        .route("/admin/login", post(admin_login_handler));

    // Operator routes (admin session required)
    let admin_routes = Router::new()
        .route("/admin/logout", post(admin_logout_handler))
        .route("/admin/codes", post(generate_codes_handler))
        .route("/admin/codes/latest", get(latest_codes_handler))
        .route("/admin/users", get(list_users_handler))
        .route("/admin/reports/{email}/{code}", get(stored_report_handler))
        .route("/admin/export/users.csv", get(export_users_handler))
        .route("/admin/export/corpus.csv", get(export_corpus_handler))
        .route("/admin/export/codes.csv", get(export_codes_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
