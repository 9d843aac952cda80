//! [`EventSink`] implementations.

use std::sync::{Mutex, PoisonError};

use portal_core::events::{EventSink, PortalEvent};

/// Logs every event through `tracing` with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
  fn emit(&self, event: &PortalEvent) {
    let name = event.name();
    match event {
      PortalEvent::Registered { account_id, login, group } => {
        tracing::info!(event = name, account_id, %login, %group);
      }
      PortalEvent::GroupCreated { group } => {
        tracing::info!(event = name, %group);
      }
      PortalEvent::ProfileUpdated { account_id, credential_changed } => {
        tracing::info!(event = name, account_id, credential_changed);
      }
      PortalEvent::GradeRecorded { student_id, offering_id, value, previous } => {
        tracing::info!(
          event = name,
          student_id,
          offering_id,
          value = value.get(),
          previous = ?previous.map(|p| p.get())
        );
      }
      PortalEvent::MaterialPublished { material_id, subject_id, groups } => {
        tracing::info!(event = name, material_id, subject_id, ?groups);
      }
      PortalEvent::Conflict { operation, detail } => {
        tracing::warn!(event = name, %operation, %detail);
      }
      PortalEvent::PerformanceFallback { student_id, reason } => {
        tracing::warn!(event = name, student_id, %reason);
      }
    }
  }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
  events: Mutex<Vec<PortalEvent>>,
}

impl MemorySink {
  pub fn new() -> Self { Self::default() }

  pub fn events(&self) -> Vec<PortalEvent> {
    self
      .events
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn names(&self) -> Vec<&'static str> {
    self.events().iter().map(PortalEvent::name).collect()
  }
}

impl EventSink for MemorySink {
  fn emit(&self, event: &PortalEvent) {
    self
      .events
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(event.clone());
  }
}
