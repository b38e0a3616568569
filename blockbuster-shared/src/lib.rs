//! # Blockbuster Shared Library
//!
//! Domain types, persistence and business services for the Blockbuster
//! rental backend. The API server is a thin HTTP layer over this crate.
//!
//! ## Module Organization
//!
//! - `models`: Movie, user and loan records plus their validated inputs
//! - `db`: PostgreSQL pool and migrations
//! - `repository`: Persistence traits with Postgres and in-memory backends
//! - `service`: Movie, user and loan services (the loan lifecycle lives here)
//! - `error`: Storage and service error types

pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;

/// Current version of the Blockbuster shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
