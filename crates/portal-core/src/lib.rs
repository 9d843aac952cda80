//! Core types and trait definitions for the student portal.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement the traits in [`store`]; the portal facade and
//! the performance service depend on those traits, not on a backend.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod account;
pub mod error;
pub mod events;
pub mod grade;
pub mod group;
pub mod material;
pub mod performance;
pub mod roster;
pub mod store;

pub use error::{Classify, Error, ErrorKind, Result};
