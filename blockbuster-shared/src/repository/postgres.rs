/// PostgreSQL repositories
///
/// Every method is one parameterized statement. Updates use `RETURNING` so a
/// missing row comes back as `None` instead of a separate existence query.
/// Nothing is cached and nothing is retried.

use super::{LoanRepository, LoanTransaction, MovieRepository, StoreResult, UserRepository};
use crate::models::{
    loan::{Loan, LoanStatus},
    movie::{CreateMovie, Movie, UpdateMovie},
    user::{CreateUser, UpdateUser, User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

/// `ILIKE` pattern matching `query` anywhere, with wildcards in it escaped
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Movies backed by the `movies` table
#[derive(Clone)]
pub struct PgMovieRepository {
    pool: PgPool,
}

impl PgMovieRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MovieRepository for PgMovieRepository {
    async fn insert(&self, data: &CreateMovie) -> StoreResult<Movie> {
        let movie = sqlx::query_as::<_, Movie>(
            r#"
            INSERT INTO movies (name, director, year, quantity, cover_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, director, year, quantity, cover_url, created_at, updated_at
            "#,
        )
        .bind(&data.name)
        .bind(&data.director)
        .bind(data.year)
        .bind(data.quantity)
        .bind(&data.cover_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(movie)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(
            r#"
            SELECT id, name, director, year, quantity, cover_url, created_at, updated_at
            FROM movies
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(movie)
    }

    async fn list(&self) -> StoreResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(
            r#"
            SELECT id, name, director, year, quantity, cover_url, created_at, updated_at
            FROM movies
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(movies)
    }

    async fn search(&self, query: &str) -> StoreResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(
            r#"
            SELECT id, name, director, year, quantity, cover_url, created_at, updated_at
            FROM movies
            WHERE name ILIKE $1 OR director ILIKE $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(like_pattern(query))
        .fetch_all(&self.pool)
        .await?;

        Ok(movies)
    }

    async fn update(&self, id: Uuid, data: &UpdateMovie) -> StoreResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(
            r#"
            UPDATE movies
            SET name = $2, director = $3, year = $4, quantity = $5, cover_url = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, director, year, quantity, cover_url, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.director)
        .bind(data.year)
        .bind(data.quantity)
        .bind(&data.cover_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(movie)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Users backed by the `users` table
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, data: &CreateUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_name, email)
            VALUES ($1, $2)
            RETURNING id, user_name, email, created_at, updated_at
            "#,
        )
        .bind(&data.user_name)
        .bind(&data.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, user_name, email, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, user_name, email, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn search(&self, query: &str) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, user_name, email, created_at, updated_at
            FROM users
            WHERE user_name ILIKE $1 OR email ILIKE $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(like_pattern(query))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn update(&self, id: Uuid, data: &UpdateUser) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET user_name = $2, email = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_name, email, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&data.user_name)
        .bind(&data.email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Loans backed by the `loans` table
#[derive(Clone)]
pub struct PgLoanRepository {
    pool: PgPool,
}

impl PgLoanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanRepository for PgLoanRepository {
    async fn begin(&self) -> StoreResult<Box<dyn LoanTransaction>> {
        let tx = self.pool.begin().await?;
        debug!("Opened loan transaction");
        Ok(Box::new(PgLoanTransaction { tx }))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, movie_id, user_id, borrowed_at, returned_at, status, created_at, updated_at
            FROM loans
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(loan)
    }

    async fn list_active_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, movie_id, user_id, borrowed_at, returned_at, status, created_at, updated_at
            FROM loans
            WHERE user_id = $1 AND status = $2
            ORDER BY borrowed_at DESC
            "#,
        )
        .bind(user_id)
        .bind(LoanStatus::Active)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    async fn list(&self) -> StoreResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, movie_id, user_id, borrowed_at, returned_at, status, created_at, updated_at
            FROM loans
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    async fn list_by_status(&self, status: LoanStatus) -> StoreResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, movie_id, user_id, borrowed_at, returned_at, status, created_at, updated_at
            FROM loans
            WHERE status = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }
}

/// A `BEGIN ... COMMIT` block on one pooled connection
///
/// sqlx rolls the transaction back when it is dropped uncommitted.
pub struct PgLoanTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LoanTransaction for PgLoanTransaction {
    async fn lock_movie(&mut self, id: Uuid) -> StoreResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(
            r#"
            SELECT id, name, director, year, quantity, cover_url, created_at, updated_at
            FROM movies
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(movie)
    }

    async fn lock_user(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, user_name, email, created_at, updated_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn lock_loan(&mut self, id: Uuid) -> StoreResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, movie_id, user_id, borrowed_at, returned_at, status, created_at, updated_at
            FROM loans
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(loan)
    }

    async fn active_loans_for_user(&mut self, user_id: Uuid) -> StoreResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, movie_id, user_id, borrowed_at, returned_at, status, created_at, updated_at
            FROM loans
            WHERE user_id = $1 AND status = $2
            ORDER BY borrowed_at DESC
            "#,
        )
        .bind(user_id)
        .bind(LoanStatus::Active)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(loans)
    }

    async fn insert_loan(
        &mut self,
        movie_id: Uuid,
        user_id: Uuid,
        borrowed_at: DateTime<Utc>,
    ) -> StoreResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (movie_id, user_id, borrowed_at, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $3, $3)
            RETURNING id, movie_id, user_id, borrowed_at, returned_at, status, created_at, updated_at
            "#,
        )
        .bind(movie_id)
        .bind(user_id)
        .bind(borrowed_at)
        .bind(LoanStatus::Active)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(loan)
    }

    async fn mark_returned(
        &mut self,
        id: Uuid,
        returned_at: DateTime<Utc>,
    ) -> StoreResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = $3, returned_at = $2, updated_at = $2
            WHERE id = $1 AND status = $4
            RETURNING id, movie_id, user_id, borrowed_at, returned_at, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(returned_at)
        .bind(LoanStatus::Returned)
        .bind(LoanStatus::Active)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(loan)
    }

    async fn adjust_movie_quantity(
        &mut self,
        movie_id: Uuid,
        delta: i32,
    ) -> StoreResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(
            r#"
            UPDATE movies
            SET quantity = quantity + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, director, year, quantity, cover_url, created_at, updated_at
            "#,
        )
        .bind(movie_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(movie)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        debug!("Committed loan transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        debug!("Rolled back loan transaction");
        Ok(())
    }
}
