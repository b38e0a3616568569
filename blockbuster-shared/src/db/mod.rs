/// Database layer for Blockbuster
///
/// - `pool`: PostgreSQL connection pool with a startup health check
/// - `migrations`: embedded schema migrations for movies, users and loans
///
/// Row types live in `models`; the SQL that reads and writes them lives in
/// `repository::postgres`.

pub mod migrations;
pub mod pool;
