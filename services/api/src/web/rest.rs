//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the questionnaire flow (redeem a code,
//! walk the items, complete and score) and the master definition for the
//! OpenAPI specification.

use crate::web::state::AppState;
use assessment_core::domain::{AnswerDetail, RedemptionOutcome, Report};
use assessment_core::ports::CoreError;
use assessment_core::TestSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        start_session_handler,
        get_item_handler,
        record_answer_handler,
        complete_session_handler,
        crate::web::admin::admin_login_handler,
        crate::web::admin::admin_logout_handler,
        crate::web::admin::generate_codes_handler,
        crate::web::admin::latest_codes_handler,
        crate::web::admin::list_users_handler,
        crate::web::admin::stored_report_handler,
        crate::web::admin::export_users_handler,
        crate::web::admin::export_corpus_handler,
        crate::web::admin::export_codes_handler,
    ),
    components(
        schemas(
            StartSessionRequest,
            StartSessionResponse,
            ItemResponse,
            AnswerRequest,
            AnswerResponse,
            ReportPayload,
            crate::web::admin::AdminLoginRequest,
            crate::web::admin::GenerateCodesRequest,
            crate::web::admin::RegisteredUser,
        )
    ),
    tags(
        (name = "Questionnaire API", description = "API endpoints for the code-gated, norm-referenced questionnaire.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct StartSessionRequest {
    pub name: String,
    pub email: String,
    pub code: String,
}

/// The response payload sent after successfully redeeming a code.
#[derive(Serialize, ToSchema)]
pub struct StartSessionResponse {
    session_id: Uuid,
    /// True when the master code was presented; such access is repeatable.
    master_access: bool,
    total_items: usize,
}

#[derive(Serialize, ToSchema)]
pub struct ItemResponse {
    index: usize,
    total: usize,
    text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AnswerRequest {
    /// Zero-based item index; must equal the number of answers already recorded.
    pub index: usize,
    pub answer: i64,
}

#[derive(Serialize, ToSchema)]
pub struct AnswerResponse {
    complete: bool,
    next_index: Option<usize>,
}

/// A scored report, either fresh from completion or retrieved from the archive.
#[derive(Serialize, ToSchema)]
pub struct ReportPayload {
    pub name: String,
    pub email: String,
    pub code: String,
    pub date: String,
    pub alert: bool,
    #[schema(value_type = Object)]
    pub report: Report,
    #[schema(value_type = Vec<Object>)]
    pub responses: Vec<AnswerDetail>,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a core error onto an HTTP response, keeping the user-correctable
/// code errors distinct and never leaking persistence details.
pub(crate) fn core_error_response(err: CoreError) -> (StatusCode, String) {
    match &err {
        CoreError::UnknownCode => (StatusCode::NOT_FOUND, err.to_string()),
        CoreError::AlreadyRedeemed => (StatusCode::CONFLICT, err.to_string()),
        CoreError::OutOfRange { .. } | CoreError::IncompleteSession => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CoreError::Persistence(_) => {
            error!("Persistence failure: {:?}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage failure, the operation was not applied".to_string(),
            )
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Redeem an access code and open a questionnaire session.
///
/// Regular codes are consumed permanently on success; the master code grants
/// repeatable access and consumes nothing.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Code accepted, session opened", body = StartSessionResponse),
        (status = 400, description = "Missing holder name, email, or code"),
        (status = 404, description = "Unknown access code"),
        (status = 409, description = "Access code already used"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn start_session_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Normalize the submitted identity and code
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();
    let code = req.code.trim().to_uppercase();

    // 2. The master code bypasses the empty-field check
    if code != state.store.master_code() && (name.is_empty() || email.is_empty() || code.is_empty())
    {
        return Err((
            StatusCode::BAD_REQUEST,
            "Name, email, and access code are all required".to_string(),
        ));
    }

    // 3. Atomically claim the code
    let outcome = state
        .store
        .try_redeem(&code, &name, &email, Utc::now())
        .await
        .map_err(core_error_response)?;

    // 4. Open the session with a snapshot of the current catalog
    let session = TestSession::new(&code, &name, &email, state.catalog.items.clone());
    let total_items = session.total_items();
    let session_id = Uuid::new_v4();
    state.sessions.lock().await.insert(session_id, session);

    let response = StartSessionResponse {
        session_id,
        master_access: outcome == RedemptionOutcome::MasterAccess,
        total_items,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Fetch one questionnaire item by position.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/items/{index}",
    responses(
        (status = 200, description = "The item at the requested position", body = ItemResponse),
        (status = 404, description = "Unknown session or item index")
    ),
    params(
        ("session_id" = Uuid, Path, description = "The session token."),
        ("index" = usize, Path, description = "Zero-based item position.")
    )
)]
pub async fn get_item_handler(
    State(state): State<Arc<AppState>>,
    Path((session_id, index)): Path<(Uuid, usize)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let sessions = state.sessions.lock().await;
    let session = sessions
        .get(&session_id)
        .ok_or((StatusCode::NOT_FOUND, "Session not found".to_string()))?;
    let item = session
        .items()
        .get(index)
        .ok_or((StatusCode::NOT_FOUND, "Item index out of range".to_string()))?;
    Ok(Json(ItemResponse {
        index,
        total: session.total_items(),
        text: item.text.clone(),
    }))
}

/// Record the next answer for a session.
///
/// Answers must arrive in strict catalog order, one per item.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/answers",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = AnswerResponse),
        (status = 400, description = "Answer outside the Likert range"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Answer out of sequence")
    ),
    params(
        ("session_id" = Uuid, Path, description = "The session token.")
    )
)]
pub async fn record_answer_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Range-check the answer against the catalog's Likert bound
    let scale_max = state.catalog.scale_max;
    if req.answer < 1 || req.answer > scale_max {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Answer must be between 1 and {scale_max}"),
        ));
    }

    // 2. Append it in strict sequence
    let mut sessions = state.sessions.lock().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or((StatusCode::NOT_FOUND, "Session not found".to_string()))?;
    session
        .record_answer(req.index, req.answer)
        .map_err(core_error_response)?;

    let complete = session.is_complete();
    Ok(Json(AnswerResponse {
        complete,
        next_index: if complete { None } else { Some(req.index + 1) },
    }))
}

/// Complete a session: score it against the historical population and
/// archive the report.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/complete",
    responses(
        (status = 200, description = "The scored report", body = ReportPayload),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Session is not complete"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("session_id" = Uuid, Path, description = "The session token.")
    )
)]
pub async fn complete_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Fetch the session without holding the map across scoring
    let session = state
        .sessions
        .lock()
        .await
        .get(&session_id)
        .cloned()
        .ok_or((StatusCode::NOT_FOUND, "Session not found".to_string()))?;

    // 2. Score, append to the corpus, and archive, as one atomic unit
    let outcome = state
        .store
        .complete_session(&session)
        .await
        .map_err(core_error_response)?;

    // 3. The session is spent
    state.sessions.lock().await.remove(&session_id);

    Ok(Json(ReportPayload {
        name: session.holder_name().to_string(),
        email: session.holder_email().to_string(),
        code: session.code().to_string(),
        date: Utc::now().format("%d/%m/%Y").to_string(),
        alert: outcome.alert,
        report: outcome.report,
        responses: outcome.response_detail,
    }))
}
