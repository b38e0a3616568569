/// In-memory repositories
///
/// Backs the service and router tests and lets the API run without a
/// database. It enforces the same constraints as the SQL schema and reports
/// them under the same names, so services cannot tell the backends apart.
///
/// Transactions take a store-wide async mutex and work on a staged copy of
/// the tables. `commit` publishes the copy; dropping the transaction throws
/// it away. Transactions are therefore fully serialized.

use super::{LoanRepository, LoanTransaction, MovieRepository, StoreResult, UserRepository};
use crate::error::{constraints, StoreError};
use crate::models::{
    loan::{Loan, LoanStatus},
    movie::{CreateMovie, Movie, UpdateMovie, MAX_STOCK},
    user::{CreateUser, UpdateUser, User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Rows kept in insertion order
#[derive(Debug, Clone, Default)]
struct Tables {
    movies: Vec<Movie>,
    users: Vec<User>,
    loans: Vec<Loan>,
}

impl Tables {
    fn movie_mut(&mut self, id: Uuid) -> Option<&mut Movie> {
        self.movies.iter_mut().find(|m| m.id == id)
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    fn loan_mut(&mut self, id: Uuid) -> Option<&mut Loan> {
        self.loans.iter_mut().find(|l| l.id == id)
    }

    fn ensure_email_free(&self, email: &str, except: Option<Uuid>) -> StoreResult<()> {
        let taken = self
            .users
            .iter()
            .any(|u| u.email == email && Some(u.id) != except);

        if taken {
            Err(violation(constraints::USERS_EMAIL_UNIQUE))
        } else {
            Ok(())
        }
    }

    fn active_loans_for_user(&self, user_id: Uuid) -> Vec<Loan> {
        let mut loans: Vec<Loan> = self
            .loans
            .iter()
            .filter(|l| l.user_id == user_id && l.status == LoanStatus::Active)
            .cloned()
            .collect();
        loans.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at));
        loans
    }
}

fn violation(name: &str) -> StoreError {
    StoreError::ConstraintViolation(name.to_string())
}

fn check_quantity(quantity: i32) -> StoreResult<()> {
    if quantity < 0 {
        Err(violation(constraints::MOVIES_QUANTITY_NON_NEGATIVE))
    } else if quantity > MAX_STOCK {
        Err(violation(constraints::MOVIES_QUANTITY_WITHIN_LIMIT))
    } else {
        Ok(())
    }
}

/// Case-insensitive substring match
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Newest first; rows inserted later win ties
fn newest_first<T: Clone>(rows: &[T], created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut rows: Vec<T> = rows.iter().rev().cloned().collect();
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    rows
}

/// Shared in-process store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn movies(&self) -> MemoryMovieRepository {
        MemoryMovieRepository { store: self.clone() }
    }

    pub fn users(&self) -> MemoryUserRepository {
        MemoryUserRepository { store: self.clone() }
    }

    pub fn loans(&self) -> MemoryLoanRepository {
        MemoryLoanRepository { store: self.clone() }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryMovieRepository {
    store: MemoryStore,
}

#[async_trait]
impl MovieRepository for MemoryMovieRepository {
    async fn insert(&self, data: &CreateMovie) -> StoreResult<Movie> {
        check_quantity(data.quantity)?;

        let now = Utc::now();
        let movie = Movie {
            id: Uuid::new_v4(),
            name: data.name.clone(),
            director: data.director.clone(),
            year: data.year,
            quantity: data.quantity,
            cover_url: data.cover_url.clone(),
            created_at: now,
            updated_at: now,
        };

        self.store.tables.lock().await.movies.push(movie.clone());
        Ok(movie)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Movie>> {
        let tables = self.store.tables.lock().await;
        Ok(tables.movies.iter().find(|m| m.id == id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Movie>> {
        let tables = self.store.tables.lock().await;
        Ok(newest_first(&tables.movies, |m| m.created_at))
    }

    async fn search(&self, query: &str) -> StoreResult<Vec<Movie>> {
        let needle = query.to_lowercase();
        let tables = self.store.tables.lock().await;
        let mut movies = newest_first(&tables.movies, |m| m.created_at);
        movies.retain(|m| {
            contains_ignore_case(&m.name, &needle) || contains_ignore_case(&m.director, &needle)
        });
        Ok(movies)
    }

    async fn update(&self, id: Uuid, data: &UpdateMovie) -> StoreResult<Option<Movie>> {
        check_quantity(data.quantity)?;

        let mut tables = self.store.tables.lock().await;
        let Some(movie) = tables.movie_mut(id) else {
            return Ok(None);
        };

        movie.name = data.name.clone();
        movie.director = data.director.clone();
        movie.year = data.year;
        movie.quantity = data.quantity;
        movie.cover_url = data.cover_url.clone();
        movie.updated_at = Utc::now();

        Ok(Some(movie.clone()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.store.tables.lock().await;

        if tables.loans.iter().any(|l| l.movie_id == id) {
            return Err(violation(constraints::LOANS_MOVIE_ID_FKEY));
        }

        let before = tables.movies.len();
        tables.movies.retain(|m| m.id != id);
        Ok(tables.movies.len() < before)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryUserRepository {
    store: MemoryStore,
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, data: &CreateUser) -> StoreResult<User> {
        let mut tables = self.store.tables.lock().await;
        tables.ensure_email_free(&data.email, None)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            user_name: data.user_name.clone(),
            email: data.email.clone(),
            created_at: now,
            updated_at: now,
        };

        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.store.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let tables = self.store.tables.lock().await;
        Ok(newest_first(&tables.users, |u| u.created_at))
    }

    async fn search(&self, query: &str) -> StoreResult<Vec<User>> {
        let needle = query.to_lowercase();
        let tables = self.store.tables.lock().await;
        let mut users = newest_first(&tables.users, |u| u.created_at);
        users.retain(|u| {
            contains_ignore_case(&u.user_name, &needle) || contains_ignore_case(&u.email, &needle)
        });
        Ok(users)
    }

    async fn update(&self, id: Uuid, data: &UpdateUser) -> StoreResult<Option<User>> {
        let mut tables = self.store.tables.lock().await;
        if tables.users.iter().all(|u| u.id != id) {
            return Ok(None);
        }
        tables.ensure_email_free(&data.email, Some(id))?;

        let Some(user) = tables.user_mut(id) else {
            return Ok(None);
        };

        user.user_name = data.user_name.clone();
        user.email = data.email.clone();
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.store.tables.lock().await;

        if tables.loans.iter().any(|l| l.user_id == id) {
            return Err(violation(constraints::LOANS_USER_ID_FKEY));
        }

        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        Ok(tables.users.len() < before)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryLoanRepository {
    store: MemoryStore,
}

#[async_trait]
impl LoanRepository for MemoryLoanRepository {
    async fn begin(&self) -> StoreResult<Box<dyn LoanTransaction>> {
        let guard = self.store.tables.clone().lock_owned().await;
        let staged = Tables::clone(&guard);
        Ok(Box::new(MemoryLoanTransaction { guard, staged }))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Loan>> {
        let tables = self.store.tables.lock().await;
        Ok(tables.loans.iter().find(|l| l.id == id).cloned())
    }

    async fn list_active_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Loan>> {
        let tables = self.store.tables.lock().await;
        Ok(tables.active_loans_for_user(user_id))
    }

    async fn list(&self) -> StoreResult<Vec<Loan>> {
        let tables = self.store.tables.lock().await;
        Ok(newest_first(&tables.loans, |l| l.created_at))
    }

    async fn list_by_status(&self, status: LoanStatus) -> StoreResult<Vec<Loan>> {
        let tables = self.store.tables.lock().await;
        let mut loans = newest_first(&tables.loans, |l| l.created_at);
        loans.retain(|l| l.status == status);
        Ok(loans)
    }
}

/// Holds the store lock for its whole lifetime
pub struct MemoryLoanTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl LoanTransaction for MemoryLoanTransaction {
    async fn lock_movie(&mut self, id: Uuid) -> StoreResult<Option<Movie>> {
        Ok(self.staged.movie_mut(id).map(|m| m.clone()))
    }

    async fn lock_user(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.staged.user_mut(id).map(|u| u.clone()))
    }

    async fn lock_loan(&mut self, id: Uuid) -> StoreResult<Option<Loan>> {
        Ok(self.staged.loan_mut(id).map(|l| l.clone()))
    }

    async fn active_loans_for_user(&mut self, user_id: Uuid) -> StoreResult<Vec<Loan>> {
        Ok(self.staged.active_loans_for_user(user_id))
    }

    async fn insert_loan(
        &mut self,
        movie_id: Uuid,
        user_id: Uuid,
        borrowed_at: DateTime<Utc>,
    ) -> StoreResult<Loan> {
        if self.staged.movie_mut(movie_id).is_none() {
            return Err(violation(constraints::LOANS_MOVIE_ID_FKEY));
        }
        if self.staged.user_mut(user_id).is_none() {
            return Err(violation(constraints::LOANS_USER_ID_FKEY));
        }
        if !self.staged.active_loans_for_user(user_id).is_empty() {
            return Err(violation(constraints::LOANS_ONE_ACTIVE_PER_USER));
        }

        let loan = Loan {
            id: Uuid::new_v4(),
            movie_id,
            user_id,
            borrowed_at,
            returned_at: None,
            status: LoanStatus::Active,
            created_at: borrowed_at,
            updated_at: borrowed_at,
        };

        self.staged.loans.push(loan.clone());
        Ok(loan)
    }

    async fn mark_returned(
        &mut self,
        id: Uuid,
        returned_at: DateTime<Utc>,
    ) -> StoreResult<Option<Loan>> {
        let Some(loan) = self.staged.loan_mut(id).filter(|l| l.is_active()) else {
            return Ok(None);
        };

        loan.status = LoanStatus::Returned;
        loan.returned_at = Some(returned_at);
        loan.updated_at = returned_at;

        Ok(Some(loan.clone()))
    }

    async fn adjust_movie_quantity(
        &mut self,
        movie_id: Uuid,
        delta: i32,
    ) -> StoreResult<Option<Movie>> {
        let Some(movie) = self.staged.movie_mut(movie_id) else {
            return Ok(None);
        };

        let quantity = match movie.quantity.checked_add(delta) {
            Some(quantity) => quantity,
            None if delta < 0 => return Err(violation(constraints::MOVIES_QUANTITY_NON_NEGATIVE)),
            None => return Err(violation(constraints::MOVIES_QUANTITY_WITHIN_LIMIT)),
        };
        check_quantity(quantity)?;

        movie.quantity = quantity;
        movie.updated_at = Utc::now();

        Ok(Some(movie.clone()))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryLoanTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie_input(quantity: i32) -> CreateMovie {
        CreateMovie {
            name: "Inception".to_string(),
            director: "Christopher Nolan".to_string(),
            year: 2010,
            quantity,
            cover_url: None,
        }
    }

    fn user_input(email: &str) -> CreateUser {
        CreateUser {
            user_name: "Alice".to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = MemoryStore::new();
        let movie = store.movies().insert(&movie_input(1)).await.unwrap();
        let user = store.users().insert(&user_input("a@x.com")).await.unwrap();

        {
            let mut tx = store.loans().begin().await.unwrap();
            tx.insert_loan(movie.id, user.id, Utc::now()).await.unwrap();
            tx.adjust_movie_quantity(movie.id, -1).await.unwrap();
        }

        assert!(store.loans().list().await.unwrap().is_empty());
        let movie = store.movies().find_by_id(movie.id).await.unwrap().unwrap();
        assert_eq!(movie.quantity, 1);
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let movie = store.movies().insert(&movie_input(2)).await.unwrap();
        let user = store.users().insert(&user_input("a@x.com")).await.unwrap();

        let mut tx = store.loans().begin().await.unwrap();
        let loan = tx.insert_loan(movie.id, user.id, Utc::now()).await.unwrap();
        tx.adjust_movie_quantity(movie.id, -1).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.loans().find_by_id(loan.id).await.unwrap(), Some(loan));
        let movie = store.movies().find_by_id(movie.id).await.unwrap().unwrap();
        assert_eq!(movie.quantity, 1);
    }

    #[tokio::test]
    async fn test_quantity_cannot_go_negative() {
        let store = MemoryStore::new();
        let movie = store.movies().insert(&movie_input(0)).await.unwrap();

        let mut tx = store.loans().begin().await.unwrap();
        let err = tx.adjust_movie_quantity(movie.id, -1).await.unwrap_err();
        assert_eq!(err.constraint(), Some(constraints::MOVIES_QUANTITY_NON_NEGATIVE));
    }

    #[tokio::test]
    async fn test_one_active_loan_per_user() {
        let store = MemoryStore::new();
        let movie = store.movies().insert(&movie_input(5)).await.unwrap();
        let user = store.users().insert(&user_input("a@x.com")).await.unwrap();

        let mut tx = store.loans().begin().await.unwrap();
        tx.insert_loan(movie.id, user.id, Utc::now()).await.unwrap();
        let err = tx.insert_loan(movie.id, user.id, Utc::now()).await.unwrap_err();
        assert_eq!(err.constraint(), Some(constraints::LOANS_ONE_ACTIVE_PER_USER));
    }

    #[tokio::test]
    async fn test_unique_email() {
        let store = MemoryStore::new();
        let users = store.users();
        let alice = users.insert(&user_input("a@x.com")).await.unwrap();
        let bob = users.insert(&user_input("b@x.com")).await.unwrap();

        let err = users.insert(&user_input("a@x.com")).await.unwrap_err();
        assert_eq!(err.constraint(), Some(constraints::USERS_EMAIL_UNIQUE));

        let update = UpdateUser {
            user_name: "Bob".to_string(),
            email: "a@x.com".to_string(),
        };
        let err = users.update(bob.id, &update).await.unwrap_err();
        assert_eq!(err.constraint(), Some(constraints::USERS_EMAIL_UNIQUE));

        // Keeping one's own email is fine
        let update = UpdateUser {
            user_name: "Alice B.".to_string(),
            email: "a@x.com".to_string(),
        };
        assert!(users.update(alice.id, &update).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_referenced_movie_cannot_be_deleted() {
        let store = MemoryStore::new();
        let movie = store.movies().insert(&movie_input(1)).await.unwrap();
        let user = store.users().insert(&user_input("a@x.com")).await.unwrap();

        let mut tx = store.loans().begin().await.unwrap();
        tx.insert_loan(movie.id, user.id, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        let err = store.movies().delete(movie.id).await.unwrap_err();
        assert_eq!(err.constraint(), Some(constraints::LOANS_MOVIE_ID_FKEY));
        let err = store.users().delete(user.id).await.unwrap_err();
        assert_eq!(err.constraint(), Some(constraints::LOANS_USER_ID_FKEY));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryStore::new();
        let first = store.movies().insert(&movie_input(1)).await.unwrap();
        let second = store.movies().insert(&movie_input(1)).await.unwrap();

        let ids: Vec<Uuid> = store
            .movies()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_quantity_cannot_exceed_limit() {
        let store = MemoryStore::new();
        let movie = store.movies().insert(&movie_input(MAX_STOCK)).await.unwrap();

        let mut tx = store.loans().begin().await.unwrap();
        let err = tx.adjust_movie_quantity(movie.id, 1).await.unwrap_err();
        assert_eq!(err.constraint(), Some(constraints::MOVIES_QUANTITY_WITHIN_LIMIT));

        let err = tx.adjust_movie_quantity(movie.id, i32::MAX).await.unwrap_err();
        assert_eq!(err.constraint(), Some(constraints::MOVIES_QUANTITY_WITHIN_LIMIT));
        drop(tx);

        let mut update = UpdateMovie::from(&movie);
        update.quantity = i32::MAX;
        let err = store.movies().update(movie.id, &update).await.unwrap_err();
        assert_eq!(err.constraint(), Some(constraints::MOVIES_QUANTITY_WITHIN_LIMIT));
        let stored = store.movies().find_by_id(movie.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, MAX_STOCK);
    }

    #[tokio::test]
    async fn test_search_matches_name_or_director_ignoring_case() {
        let store = MemoryStore::new();
        let movies = store.movies();
        let inception = movies.insert(&movie_input(1)).await.unwrap();
        let alien = movies
            .insert(&CreateMovie {
                name: "Alien".to_string(),
                director: "Ridley Scott".to_string(),
                year: 1979,
                quantity: 1,
                cover_url: None,
            })
            .await
            .unwrap();

        let hits = movies.search("NOLAN").await.unwrap();
        assert_eq!(hits, vec![inception.clone()]);

        let hits = movies.search("alien").await.unwrap();
        assert_eq!(hits, vec![alien.clone()]);

        assert_eq!(movies.search("n").await.unwrap(), vec![alien, inception]);
        assert!(movies.search("kubrick").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_users_by_name_or_email() {
        let store = MemoryStore::new();
        let users = store.users();
        let alice = users.insert(&user_input("alice@x.com")).await.unwrap();
        let bob = users
            .insert(&CreateUser {
                user_name: "Bob".to_string(),
                email: "bob@y.org".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(users.search("bob").await.unwrap(), vec![bob.clone()]);
        assert_eq!(users.search("X.COM").await.unwrap(), vec![alice]);
        assert_eq!(users.search("y.org").await.unwrap(), vec![bob]);
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let store = MemoryStore::new();
        let movie = store.movies().insert(&movie_input(2)).await.unwrap();
        let alice = store.users().insert(&user_input("a@x.com")).await.unwrap();
        let bob = store.users().insert(&user_input("b@x.com")).await.unwrap();

        let mut tx = store.loans().begin().await.unwrap();
        let returned = tx.insert_loan(movie.id, alice.id, Utc::now()).await.unwrap();
        tx.mark_returned(returned.id, Utc::now()).await.unwrap();
        let active = tx.insert_loan(movie.id, bob.id, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        let loans = store.loans();
        let ids = |loans: Vec<Loan>| loans.into_iter().map(|l| l.id).collect::<Vec<_>>();
        assert_eq!(ids(loans.list_by_status(LoanStatus::Active).await.unwrap()), vec![active.id]);
        assert_eq!(
            ids(loans.list_by_status(LoanStatus::Returned).await.unwrap()),
            vec![returned.id]
        );
    }

    #[tokio::test]
    async fn test_mark_returned_only_once() {
        let store = MemoryStore::new();
        let movie = store.movies().insert(&movie_input(1)).await.unwrap();
        let user = store.users().insert(&user_input("a@x.com")).await.unwrap();

        let mut tx = store.loans().begin().await.unwrap();
        let loan = tx.insert_loan(movie.id, user.id, Utc::now()).await.unwrap();
        let returned = tx.mark_returned(loan.id, Utc::now()).await.unwrap().unwrap();
        assert_eq!(returned.status, LoanStatus::Returned);
        assert!(returned.returned_at.is_some());
        assert!(tx.mark_returned(loan.id, Utc::now()).await.unwrap().is_none());
    }
}
