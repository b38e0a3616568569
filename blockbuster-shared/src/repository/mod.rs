/// Persistence abstractions
///
/// One trait per entity. Services hold them as `Arc<dyn ...>` so the same
/// business logic runs against PostgreSQL in production and against the
/// in-memory store in tests.
///
/// Multi-table mutations go through [`LoanTransaction`], obtained from
/// [`LoanRepository::begin`]. A transaction that is dropped without
/// [`LoanTransaction::commit`] is rolled back, so an early `?` return can
/// never leave a loan recorded without its stock change or the reverse.
///
/// # Example
///
/// ```
/// use blockbuster_shared::repository::Repositories;
///
/// let repos = Repositories::in_memory();
/// assert!(repos.pool.is_none());
/// ```

pub mod memory;
pub mod postgres;

use crate::error::StoreError;
use crate::models::{
    loan::{Loan, LoanStatus},
    movie::{CreateMovie, Movie, UpdateMovie},
    user::{CreateUser, UpdateUser, User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Repository result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Movie table access
#[async_trait]
pub trait MovieRepository: Send + Sync {
    async fn insert(&self, data: &CreateMovie) -> StoreResult<Movie>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Movie>>;

    /// All movies, newest first
    async fn list(&self) -> StoreResult<Vec<Movie>>;

    /// Movies whose name or director contains `query`, ignoring case
    async fn search(&self, query: &str) -> StoreResult<Vec<Movie>>;

    /// Replaces the mutable fields; `None` when no row matched
    async fn update(&self, id: Uuid, data: &UpdateMovie) -> StoreResult<Option<Movie>>;

    /// Returns whether a row was deleted
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

/// User table access
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, data: &CreateUser) -> StoreResult<User>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// All users, newest first
    async fn list(&self) -> StoreResult<Vec<User>>;

    /// Users whose name or email contains `query`, ignoring case
    async fn search(&self, query: &str) -> StoreResult<Vec<User>>;

    /// Replaces the mutable fields; `None` when no row matched
    async fn update(&self, id: Uuid, data: &UpdateUser) -> StoreResult<Option<User>>;

    /// Returns whether a row was deleted
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

/// Loan table access
///
/// There is deliberately no plain insert: loans are only written inside a
/// [`LoanTransaction`].
#[async_trait]
pub trait LoanRepository: Send + Sync {
    /// Opens a transactional scope
    async fn begin(&self) -> StoreResult<Box<dyn LoanTransaction>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Loan>>;

    /// Active loans of one user, most recently borrowed first
    async fn list_active_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Loan>>;

    /// All loans, newest first
    async fn list(&self) -> StoreResult<Vec<Loan>>;

    async fn list_by_status(&self, status: LoanStatus) -> StoreResult<Vec<Loan>>;
}

/// Unit of work spanning the movies, users and loans tables
///
/// The `lock_*` reads take row locks that are held until commit or rollback.
#[async_trait]
pub trait LoanTransaction: Send {
    async fn lock_movie(&mut self, id: Uuid) -> StoreResult<Option<Movie>>;

    async fn lock_user(&mut self, id: Uuid) -> StoreResult<Option<User>>;

    async fn lock_loan(&mut self, id: Uuid) -> StoreResult<Option<Loan>>;

    async fn active_loans_for_user(&mut self, user_id: Uuid) -> StoreResult<Vec<Loan>>;

    /// Inserts an active loan borrowed at `borrowed_at`
    async fn insert_loan(
        &mut self,
        movie_id: Uuid,
        user_id: Uuid,
        borrowed_at: DateTime<Utc>,
    ) -> StoreResult<Loan>;

    /// Moves an active loan to returned; `None` if no active loan matched
    async fn mark_returned(
        &mut self,
        id: Uuid,
        returned_at: DateTime<Utc>,
    ) -> StoreResult<Option<Loan>>;

    /// Adds `delta` to a movie's stock; `None` if the movie does not exist
    ///
    /// Fails with the `movies_quantity_non_negative` constraint when the
    /// result would drop below zero and with `movies_quantity_within_limit`
    /// when it would pass [`MAX_STOCK`](crate::models::movie::MAX_STOCK).
    async fn adjust_movie_quantity(&mut self, movie_id: Uuid, delta: i32)
        -> StoreResult<Option<Movie>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// The repository set for one backend
#[derive(Clone)]
pub struct Repositories {
    pub movies: Arc<dyn MovieRepository>,
    pub users: Arc<dyn UserRepository>,
    pub loans: Arc<dyn LoanRepository>,

    /// Underlying pool when backed by PostgreSQL
    pub pool: Option<PgPool>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            movies: Arc::new(postgres::PgMovieRepository::new(pool.clone())),
            users: Arc::new(postgres::PgUserRepository::new(pool.clone())),
            loans: Arc::new(postgres::PgLoanRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Repositories over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::from_memory_store(memory::MemoryStore::default())
    }

    /// Repositories over an existing in-memory store
    pub fn from_memory_store(store: memory::MemoryStore) -> Self {
        Self {
            movies: Arc::new(store.movies()),
            users: Arc::new(store.users()),
            loans: Arc::new(store.loans()),
            pool: None,
        }
    }
}
