//! Structured domain events and the sink interface the portal reports to.
//!
//! The core never decides how an event is delivered (log line, flash banner,
//! audit table); it only calls [`EventSink::emit`].

use serde::Serialize;

use crate::{grade::GradeValue, group::GroupName};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PortalEvent {
  Registered {
    account_id: i64,
    login:      String,
    group:      GroupName,
  },
  GroupCreated {
    group: GroupName,
  },
  ProfileUpdated {
    account_id:         i64,
    credential_changed: bool,
  },
  GradeRecorded {
    student_id:  i64,
    offering_id: i64,
    value:       GradeValue,
    /// The value this grade overwrote, if any.
    previous:    Option<GradeValue>,
  },
  MaterialPublished {
    material_id: i64,
    subject_id:  i64,
    groups:      Vec<GroupName>,
  },
  /// A uniqueness conflict surfaced to the caller.
  Conflict {
    operation: &'static str,
    detail:    String,
  },
  /// The remote performance service failed and the report was computed
  /// locally.
  PerformanceFallback {
    student_id: i64,
    reason:     String,
  },
}

impl PortalEvent {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Registered { .. } => "registered",
      Self::GroupCreated { .. } => "group_created",
      Self::ProfileUpdated { .. } => "profile_updated",
      Self::GradeRecorded { .. } => "grade_recorded",
      Self::MaterialPublished { .. } => "material_published",
      Self::Conflict { .. } => "conflict",
      Self::PerformanceFallback { .. } => "performance_fallback",
    }
  }
}

/// Receives every event the portal emits.
pub trait EventSink: Send + Sync {
  fn emit(&self, event: &PortalEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
  fn emit(&self, _: &PortalEvent) {}
}
