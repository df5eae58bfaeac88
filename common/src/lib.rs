//! Shared building blocks for the Text2SQL service.
//!
//! - `config`: environment-driven service configuration
//! - `errors`: application error type and its HTTP rendering
//! - `middleware`: request-id propagation
//! - `models`: request/response bodies of the public API

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
