//! # Blockbuster API Server Library
//!
//! HTTP layer of the rental backend: configuration, router, error mapping
//! and route handlers over the services in `blockbuster-shared`.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
