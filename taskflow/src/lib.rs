//! `TaskFlow` client library.
//!
//! - [`api`]: the typed HTTP client for the task store
//! - [`tasks`]: the client-side task collection with optimistic updates
//! - [`config`]: layered client configuration
//! - [`cli`]: the command-line presenter

pub mod api;
pub mod cli;
pub mod config;
pub mod tasks;
