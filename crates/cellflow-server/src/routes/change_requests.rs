use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, post, put},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{to_error, AppState};
use crate::store::SubmitDecision;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/change-requests/", post(submit))
        .route("/api/change-requests/{id}/", put(accept))
        .route("/api/change-requests/{id}/", delete(revoke))
}

#[derive(Deserialize)]
struct SubmitForm {
    cell_id: String,
    new_value: String,
}

fn author_from(headers: &HeaderMap) -> String {
    headers
        .get("x-username")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

/// Submit an edit. 201 when the store applied it directly, 202 when it
/// was queued for review.
async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SubmitForm>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let author = author_from(&headers);
    let (decision, request) = state
        .store
        .create_change_request(&form.cell_id, &form.new_value, &author)
        .map_err(to_error)?;

    match decision {
        SubmitDecision::Applied => Ok((
            StatusCode::CREATED,
            Json(json!({ "new_value": request.new_value })),
        )),
        SubmitDecision::Queued => Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "new_value": request.new_value,
                "messages": [
                    { "message": "Change request queued for review", "extra_tags": "info" }
                ],
            })),
        )),
    }
}

async fn accept(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .store
        .accept_request(&id)
        .map(|receipt| {
            Json(json!({
                "new_value": receipt.new_value,
                "messages": [
                    { "message": "Change request accepted", "extra_tags": "success" }
                ],
            }))
        })
        .map_err(to_error)
}

async fn revoke(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .store
        .revoke_request(&id)
        .map(|receipt| {
            Json(json!({
                "old_value": receipt.old_value,
                "other_requests": receipt.other_requests,
                "messages": [
                    { "message": "Change request revoked", "extra_tags": "warning" }
                ],
            }))
        })
        .map_err(to_error)
}
