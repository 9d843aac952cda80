//! Out-of-process performance calculation for the student portal.
//!
//! Exposes an axum [`Router`] backed by any [`GradeLedger`]. The portal calls
//! it over HTTP and falls back to computing the same
//! [`aggregate`](portal_core::performance::aggregate) locally when it fails.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = portal_performance::router(AppState { store, auth_token });
//! ```

pub mod error;
pub mod handlers;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use portal_core::store::GradeLedger;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `performance.toml`.
#[derive(Deserialize, Clone)]
pub struct PerformanceServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  pub store_path: PathBuf,
  /// Shared secret every request must carry in `auth_token`.
  pub auth_token: String,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8081 }

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S> {
  pub store:      Arc<S>,
  pub auth_token: Arc<str>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the service router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: GradeLedger + Clone + 'static,
{
  Router::new()
    .route("/api/performance", post(handlers::performance::<S>))
    .route("/health", get(handlers::health::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use portal_core::{
    account::{NewAccount, Role},
    grade::{NewGrade, NewOffering, NewSubject},
    group::GroupName,
    performance::PerformanceResponse,
    store::AccountStore,
  };
  use portal_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  const TOKEN: &str = "s3cret";

  /// A store with one student holding two Math grades in semester 1 and one
  /// Physics grade in semester 2.
  async fn make_state() -> (AppState<SqliteStore>, i64) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let cs = GroupName::parse("CS-101").unwrap();
    let teacher = store
      .create_account(NewAccount {
        role: Role::Teacher,
        group: None,
        ..NewAccount::student("tnov", None, "T. Novak", cs.clone())
      })
      .await
      .unwrap();
    let alice = store
      .create_account(NewAccount::student("alice", None, "Alice", cs.clone()))
      .await
      .unwrap();
    let bob = store
      .create_account(NewAccount::student("bob", None, "Bob", cs.clone()))
      .await
      .unwrap();

    let mut offerings = Vec::new();
    for (name, semester) in [("Math", 1), ("Physics", 2)] {
      let subject = store.create_subject(NewSubject::new(name)).await.unwrap();
      let offering = store
        .create_offering(NewOffering {
          group: cs.clone(),
          subject_id: subject.subject_id,
          semester,
          teacher_id: teacher.account_id,
        })
        .await
        .unwrap();
      offerings.push(offering.offering_id);
    }
    let grades = [
      (alice.account_id, offerings[0], 5, "2024-01-15"),
      (alice.account_id, offerings[1], 4, "2024-06-01"),
      (bob.account_id, offerings[0], 3, "2024-01-15"),
    ];
    for (student, offering, value, date) in grades {
      store
        .record_grade(NewGrade::parse(student, offering, value, date).unwrap())
        .await
        .unwrap();
    }

    let state = AppState { store: Arc::new(store), auth_token: TOKEN.into() };
    (state, alice.account_id)
  }

  async fn post_json(state: AppState<SqliteStore>, body: String) -> (StatusCode, Value) {
    let req = Request::builder()
      .method("POST")
      .uri("/api/performance")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body))
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn report_groups_by_semester_and_subject() {
    let (state, alice) = make_state().await;
    let body = json!({ "student_id": alice, "auth_token": TOKEN }).to_string();
    let (status, value) = post_json(state, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["success"], true);
    assert_eq!(value["avg_grade"], 4.5);
    assert_eq!(value["semesters"]["1"]["Math"]["teacher"], "T. Novak");
    assert_eq!(value["semesters"]["1"]["Math"]["grades"][0]["type"], "exam");
    assert_eq!(value["semesters"]["2"]["Physics"]["avg"], 4.0);

    let parsed: PerformanceResponse = serde_json::from_value(value).unwrap();
    assert!(parsed.into_report().is_some());
  }

  #[tokio::test]
  async fn semester_filter_narrows_the_report() {
    let (state, alice) = make_state().await;
    let body =
      json!({ "student_id": alice, "auth_token": TOKEN, "semester": 2 }).to_string();
    let (status, value) = post_json(state, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["avg_grade"], 4.0);
    assert!(value["semesters"].get("1").is_none());
  }

  #[tokio::test]
  async fn student_without_grades_has_no_average() {
    let (state, _) = make_state().await;
    let body = json!({ "student_id": 999, "auth_token": TOKEN }).to_string();
    let (status, value) = post_json(state, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["success"], true);
    assert!(value.get("avg_grade").is_none());
    assert_eq!(value["semesters"], json!({}));
  }

  #[tokio::test]
  async fn wrong_token_is_401() {
    let (state, alice) = make_state().await;
    let body = json!({ "student_id": alice, "auth_token": "guess" }).to_string();
    let (status, value) = post_json(state, body).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(value["success"], false);
    assert!(value["error"].is_string());
  }

  #[tokio::test]
  async fn invalid_input_is_400() {
    for body in [
      json!({ "student_id": 0, "auth_token": TOKEN }).to_string(),
      json!({ "student_id": 1, "auth_token": TOKEN, "semester": 13 }).to_string(),
      "{not json".to_string(),
    ] {
      let (state, _) = make_state().await;
      let (status, value) = post_json(state, body.clone()).await;
      assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
      assert_eq!(value["success"], false, "{body}");
    }
  }

  #[tokio::test]
  async fn health_reports_ok() {
    let (state, _) = make_state().await;
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }
}
