//! `TaskFlow` task store library.
//!
//! Exposes the HTTP task store for use in tests and embedding. The server
//! owns the durable copy of every task and applies reorder batches
//! atomically.

pub mod config;
pub mod server;
pub mod store;
