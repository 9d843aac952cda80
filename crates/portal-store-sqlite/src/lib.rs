//! SQLite backends for the student portal.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.
//!
//! Two storage designs are provided:
//!
//! - [`SqliteStore`]: the normalized model. Fixed tables with foreign keys;
//!   implements every trait in [`portal_core::store`].
//! - [`PartitionedStore`]: one dynamically provisioned table per group.
//!   Implements only the directory and roster traits and exists so legacy
//!   databases can be read and [migrated](migrate::migrate_partitioned).

mod db;
mod encode;
mod ledger;
mod schema;
mod store;

pub mod error;
pub mod migrate;
pub mod partitioned;

pub use error::{Error, Result};
pub use partitioned::PartitionedStore;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
