//! services/api/src/web/admin.rs
//!
//! Operator endpoints: login/logout, code batch generation, registered
//! holder listings, archived report retrieval, and tabular exports.

use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::{core_error_response, ReportPayload};
use crate::web::state::AppState;
use assessment_core::ports::CoreError;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct AdminLoginRequest {
    pub user: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct GenerateCodesRequest {
    /// How many codes to generate; the configured batch size when omitted.
    #[serde(default)]
    pub count: Option<usize>,
    /// Code prefix; the configured prefix when omitted.
    #[serde(default)]
    pub prefix: Option<String>,
}

/// One redeemed code as shown on the operator dashboard.
#[derive(Serialize, ToSchema)]
pub struct RegisteredUser {
    pub name: String,
    pub email: String,
    pub code: String,
    pub redeemed_at: String,
}

fn csv_attachment(filename: &'static str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment;filename={filename}"),
            ),
        ],
        body,
    )
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// POST /admin/login - Authenticate the operator
#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Login successful"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn admin_login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Verify the credentials against the configured user and hash
    let parsed_hash = PasswordHash::new(&state.config.admin_password_hash).map_err(|e| {
        error!("Failed to parse admin password hash: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication error".to_string(),
        )
    })?;
    let valid_password = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if req.user != state.config.admin_user || !valid_password {
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
    }

    // 2. Issue an operator session token
    let token = Uuid::new_v4().to_string();
    state.admin_tokens.lock().await.insert(token.clone());
    info!("Operator session opened");

    // 3. Return it as a session cookie
    let cookie = format!("admin_session={}; HttpOnly; SameSite=Lax; Path=/", token);
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

/// POST /admin/logout - Invalidate the operator session
#[utoipa::path(
    post,
    path = "/admin/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn admin_logout_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Extract the session cookie
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    // 2. Parse the token from the cookie
    let token = cookie_header
        .split(';')
        .find_map(|c| {
            let c = c.trim();
            c.strip_prefix("admin_session=")
        })
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    // 3. Forget it
    state.admin_tokens.lock().await.remove(token);

    // 4. Clear the cookie
    let cookie = "admin_session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

//=========================================================================================
// Code Management Handlers
//=========================================================================================

/// POST /admin/codes - Generate a fresh batch of access codes
#[utoipa::path(
    post,
    path = "/admin/codes",
    request_body = GenerateCodesRequest,
    responses(
        (status = 201, description = "The freshly generated codes", body = Vec<String>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn generate_codes_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateCodesRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let count = req.count.unwrap_or(state.config.batch_size);
    let prefix = req
        .prefix
        .unwrap_or_else(|| state.config.code_prefix.clone());
    let codes = state
        .store
        .generate_batch(count, &prefix)
        .await
        .map_err(core_error_response)?;
    info!(count = codes.len(), "Generated access code batch");
    Ok((StatusCode::CREATED, Json(codes)))
}

/// GET /admin/codes/latest - The most recently generated batch
#[utoipa::path(
    get,
    path = "/admin/codes/latest",
    responses(
        (status = 200, description = "The most recent batch, possibly empty", body = Vec<String>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn latest_codes_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let codes = state.store.last_batch().await.map_err(core_error_response)?;
    Ok(Json(codes))
}

//=========================================================================================
// Dashboard and Report Handlers
//=========================================================================================

/// GET /admin/users - Redeemed codes with their holders
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "Registered holders ordered by redemption stamp", body = Vec<RegisteredUser>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let used = state
        .store
        .used_records()
        .await
        .map_err(core_error_response)?;
    let users: Vec<RegisteredUser> = used
        .into_iter()
        .map(|(code, record)| RegisteredUser {
            name: record.holder_name,
            email: record.email,
            code,
            redeemed_at: record.redeemed_at,
        })
        .collect();
    Ok(Json(users))
}

/// GET /admin/reports/{email}/{code} - An archived report
#[utoipa::path(
    get,
    path = "/admin/reports/{email}/{code}",
    responses(
        (status = 200, description = "The archived report", body = ReportPayload),
        (status = 404, description = "No record for this code/email pair"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("email" = String, Path, description = "Holder email as registered."),
        ("code" = String, Path, description = "The redeemed access code.")
    )
)]
pub async fn stored_report_handler(
    State(state): State<Arc<AppState>>,
    Path((email, code)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let stored = state
        .store
        .stored_report(&code, &email)
        .await
        .map_err(|err| match err {
            CoreError::UnknownCode => (StatusCode::NOT_FOUND, "User not found".to_string()),
            other => core_error_response(other),
        })?;
    Ok(Json(ReportPayload {
        name: stored.holder_name,
        email: stored.email,
        code,
        date: stored.redeemed_at,
        alert: stored.alert,
        report: stored.report,
        responses: stored.response_detail,
    }))
}

//=========================================================================================
// Export Handlers
//=========================================================================================

/// GET /admin/export/users.csv - Registered holders as CSV
#[utoipa::path(
    get,
    path = "/admin/export/users.csv",
    responses(
        (status = 200, description = "CSV of registered holders", body = String),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn export_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let used = state
        .store
        .used_records()
        .await
        .map_err(core_error_response)?;
    let mut rows = String::from("Nome,Email,Seriale,Data\n");
    for (code, record) in used {
        rows.push_str(&format!(
            "{},{},{},{}\n",
            record.holder_name, record.email, code, record.redeemed_at
        ));
    }
    Ok(csv_attachment("utenti_registrati.csv", rows))
}

/// GET /admin/export/corpus.csv - The full historical corpus as CSV
#[utoipa::path(
    get,
    path = "/admin/export/corpus.csv",
    responses(
        (status = 200, description = "CSV of every historical scale score", body = String)
    )
)]
pub async fn export_corpus_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entries = state.store.corpus_entries().await;
    let mut rows = String::from("Scala,Score\n");
    for entry in entries {
        rows.push_str(&format!("{},{}\n", entry.scale, entry.score));
    }
    csv_attachment("storico_punteggi.csv", rows)
}

/// GET /admin/export/codes.csv - The most recent batch as CSV
#[utoipa::path(
    get,
    path = "/admin/export/codes.csv",
    responses(
        (status = 200, description = "CSV of the most recent batch", body = String),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn export_codes_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let codes = state.store.last_batch().await.map_err(core_error_response)?;
    let mut rows = String::from("Codice seriale\n");
    for code in codes {
        rows.push_str(&code);
        rows.push('\n');
    }
    Ok(csv_attachment("codici_seriali.csv", rows))
}
