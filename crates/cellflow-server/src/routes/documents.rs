use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use cellflow_core::document::{CreateDocument, ReplaceDocument};
use cellflow_core::CellflowError;
use serde_json::{json, Value};

use super::{to_error, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/documents", get(list_documents))
        .route("/api/documents", post(create_document))
        .route("/api/documents/{id}", get(get_document))
        .route("/api/documents/{id}/replace", post(replace_document))
        .route("/api/documents/popover/{cell_id}/", get(popover))
        .route("/api/cells/{id}/value", delete(delete_value))
}

async fn list_documents(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.store.list_current()))
}

async fn create_document(
    State(state): State<AppState>,
    Json(input): Json<CreateDocument>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    validate_rows(&input.rows).map_err(to_error)?;
    let document = state.store.create_document(&input);
    Ok((StatusCode::CREATED, Json(json!(document))))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .store
        .get_detail(&id)
        .map(|d| Json(json!(d)))
        .map_err(to_error)
}

async fn replace_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ReplaceDocument>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    validate_rows(&input.rows).map_err(to_error)?;
    state
        .store
        .replace_document(&id, &input.rows)
        .map(|d| (StatusCode::CREATED, Json(json!(d))))
        .map_err(to_error)
}

async fn popover(
    State(state): State<AppState>,
    Path(cell_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .store
        .popover(&cell_id)
        .map(|p| Json(json!(p)))
        .map_err(to_error)
}

async fn delete_value(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .store
        .delete_value(&id)
        .map(|receipt| {
            Json(json!({
                "old_value": receipt.old_value,
                "messages": [
                    { "message": "Applied value deleted", "extra_tags": "warning" }
                ],
            }))
        })
        .map_err(to_error)
}

fn validate_rows(rows: &[Vec<String>]) -> Result<(), CellflowError> {
    if rows.is_empty() || rows.iter().all(|r| r.is_empty()) {
        return Err(CellflowError::InvalidInput(
            "document must have at least one cell".to_string(),
        ));
    }
    Ok(())
}
