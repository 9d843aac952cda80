//! Route handlers.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/performance` | Body: `{"student_id":1,"auth_token":"…","semester":2}` |
//! | `GET`  | `/health` | `503` when the store does not answer |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
};
use portal_core::{
  grade::validate_semester,
  performance::{PerformanceRequest, PerformanceResponse, aggregate},
  store::GradeLedger,
};
use serde_json::{Value, json};

use crate::{AppState, error::ApiError};

// ─── Performance ─────────────────────────────────────────────────────────────

/// `POST /api/performance`
pub async fn performance<S>(
  State(state): State<AppState<S>>,
  body: Result<Json<PerformanceRequest>, JsonRejection>,
) -> Result<Json<PerformanceResponse>, ApiError>
where
  S: GradeLedger,
{
  let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  if req.auth_token != *state.auth_token {
    return Err(ApiError::Unauthorized);
  }
  if req.student_id <= 0 {
    return Err(ApiError::BadRequest("student_id must be positive".into()));
  }
  let semester = req
    .semester
    .map(validate_semester)
    .transpose()
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let records = state
    .store
    .grade_records(req.student_id, semester)
    .await
    .map_err(ApiError::store)?;
  tracing::debug!(
    student_id = req.student_id,
    grades = records.len(),
    "computed performance"
  );
  Ok(Json(PerformanceResponse::ok(aggregate(&records))))
}

// ─── Health ──────────────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health<S>(State(state): State<AppState<S>>) -> (StatusCode, Json<Value>)
where
  S: GradeLedger,
{
  match state.store.list_groups().await {
    Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
    Err(e) => {
      tracing::warn!(error = %e, "store unreachable");
      (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "unavailable" })),
      )
    }
  }
}
