//! # API Shared
//!
//! Shared definitions for the LeafDoc HTTP API.
//!
//! Contains:
//! - Request/response types (`models` module), serialisable and documented for OpenAPI
//! - `HealthService`
//! - `AccountService`: users, sessions and per-user settings
//!
//! Kept free of HTTP framework types so the same definitions can back other front ends.

pub mod auth;
pub mod health;
pub mod models;

pub use auth::{AccountError, AccountResult, AccountService, User};
pub use health::HealthService;
pub use models::*;
