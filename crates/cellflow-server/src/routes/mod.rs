pub mod change_requests;
pub mod documents;
pub mod health;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{middleware, Json, Router};
use cellflow_core::CellflowError;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::csrf::csrf_middleware;
use crate::store::Store;

pub struct InnerAppState {
    pub store: Store,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(store: Store) -> Router {
    let state: AppState = Arc::new(InnerAppState { store });

    Router::new()
        .merge(health::routes())
        .merge(documents::routes())
        .merge(change_requests::routes())
        .layer(middleware::from_fn(csrf_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub(crate) fn to_error(e: CellflowError) -> (StatusCode, Json<Value>) {
    let status = match &e {
        CellflowError::NotFound(_) => StatusCode::NOT_FOUND,
        CellflowError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CellflowError::Forbidden(_) => StatusCode::FORBIDDEN,
    };
    (status, Json(json!({ "error": e.to_string() })))
}
