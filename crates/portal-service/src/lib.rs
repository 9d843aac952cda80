//! The student portal facade.
//!
//! [`Portal`] sits between a presentation layer and the storage traits of
//! `portal-core`. It validates input before any write, checks what the
//! [`Caller`] may do, hashes credentials, reports domain events to an
//! [`EventSink`](portal_core::events::EventSink), and asks the performance
//! service for reports with a local fallback.
//!
//! # Wiring
//!
//! ```rust,ignore
//! let store = SqliteStore::open("portal.db").await?;
//! let portal = Portal::new(store, Arc::new(TracingSink))
//!   .with_material_dir("media")
//!   .with_performance(PerformanceClient::new(&settings)?);
//! let caller = portal.authenticate("alice", "secret").await?;
//! ```

pub mod caller;
pub mod config;
pub mod credential;
pub mod error;
pub mod events;
pub mod performance;
pub mod portal;

pub use caller::Caller;
pub use error::{Error, Result};
pub use portal::Portal;
