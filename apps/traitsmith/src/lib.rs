//! # traitsmith
//!
//! Caller surfaces over `traitsmith-core`: a clap CLI, an axum HTTP API,
//! and the file-backed catalog and configuration they share.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;

pub use error::AppError;
