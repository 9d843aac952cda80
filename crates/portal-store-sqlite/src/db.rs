//! Helpers for running work on the connection thread.
//!
//! Closures passed here return this crate's [`Result`] so domain errors
//! (conflicts, missing rows) can be raised from inside a transaction and
//! roll it back.

use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior, params};

use crate::Result;

/// Run a read-only closure on the connection thread.
pub async fn read<T, F>(conn: &tokio_rusqlite::Connection, f: F) -> Result<T>
where
  T: Send + 'static,
  F: FnOnce(&Connection) -> Result<T> + Send + 'static,
{
  conn.call(move |conn| Ok(f(conn))).await?
}

/// Run a closure inside a `BEGIN IMMEDIATE` transaction. The transaction is
/// committed only when the closure succeeds.
///
/// Taking the write lock up front means check-then-insert sequences cannot
/// interleave with another writer.
pub async fn write<T, F>(conn: &tokio_rusqlite::Connection, f: F) -> Result<T>
where
  T: Send + 'static,
  F: FnOnce(&Connection) -> Result<T> + Send + 'static,
{
  conn
    .call(move |conn| {
      let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
      let out = f(&tx);
      if out.is_ok() {
        tx.commit()?;
      }
      Ok(out)
    })
    .await?
}

/// Whether `sql` (taking a single parameter) yields at least one row.
pub fn exists(
  conn: &Connection,
  sql: &str,
  param: impl rusqlite::ToSql,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(sql, params![param], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}
