//! Stack models
//!
//! Request/response values exchanged between the deployment engine and its callers.

pub mod models;

pub use models::*;
