//! Shared wire definitions for the `TaskFlow` HTTP API.

pub mod codec;
pub mod order;
pub mod routes;
pub mod task;
