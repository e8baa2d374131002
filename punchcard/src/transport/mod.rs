//! Transport layer for punchcard.
//!
//! Currently provides HTTP transport via axum. The core service is
//! transport-agnostic; everything here only marshals requests into it.

pub mod http;

pub use http::{AppState, routes, serve};
