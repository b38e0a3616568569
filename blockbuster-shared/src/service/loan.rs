/// Loan service: the check-out / return workflow
///
/// # Creating a loan
///
/// ```text
/// fetch movie ── missing ──▶ NotFound
///      │ quantity <= 0 ────▶ MovieUnavailable
/// fetch user ─── missing ──▶ NotFound
///      │ has active loan ──▶ UserHasActiveLoan
/// BEGIN
///   lock user, lock movie, re-check all of the above
///   insert loan (active, borrowed_at = now)
///   quantity -= 1
/// COMMIT
/// ```
///
/// The checks before `BEGIN` reject obvious failures without taking locks.
/// The re-check under row locks is what makes concurrent requests for the
/// same user or the same last copy resolve to exactly one success. The schema
/// backs this up with a partial unique index and a quantity check, whose
/// violations map to the same business-rule errors.
///
/// # Returning a loan
///
/// ```text
/// BEGIN
///   lock loan ── missing ──▶ NotFound
///        │ already returned ▶ LoanAlreadyReturned
///   status = returned, returned_at = now
///   quantity += 1
/// COMMIT
/// ```

use crate::error::{BusinessRuleViolation, EntityKind, ServiceError, ServiceResult};
use crate::models::loan::{Loan, LoanStatus};
use crate::repository::LoanRepository;
use crate::service::{movie::MovieService, user::UserService};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct LoanService {
    loans: Arc<dyn LoanRepository>,
    movies: MovieService,
    users: UserService,
}

impl LoanService {
    pub fn new(loans: Arc<dyn LoanRepository>, movies: MovieService, users: UserService) -> Self {
        Self {
            loans,
            movies,
            users,
        }
    }

    /// Lends one copy of a movie to a user
    #[instrument(skip(self), fields(movie_id = %movie_id, user_id = %user_id))]
    pub async fn create_loan(&self, movie_id: Uuid, user_id: Uuid) -> ServiceResult<Loan> {
        let movie = self.movies.get_movie(movie_id).await?;
        if !movie.is_available() {
            return Err(BusinessRuleViolation::MovieUnavailable.into());
        }

        let user = self.users.get_user(user_id).await?;
        if !self.loans.list_active_for_user(user.id).await?.is_empty() {
            return Err(BusinessRuleViolation::UserHasActiveLoan.into());
        }

        let mut tx = self.loans.begin().await?;

        let user = tx
            .lock_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::User, user_id))?;
        let movie = tx
            .lock_movie(movie_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Movie, movie_id))?;

        if !movie.is_available() {
            debug!("movie ran out of stock before the lock was taken");
            tx.rollback().await?;
            return Err(BusinessRuleViolation::MovieUnavailable.into());
        }
        if !tx.active_loans_for_user(user.id).await?.is_empty() {
            debug!("user took a loan before the lock was taken");
            tx.rollback().await?;
            return Err(BusinessRuleViolation::UserHasActiveLoan.into());
        }

        let loan = tx.insert_loan(movie.id, user.id, Utc::now()).await?;
        let movie = tx
            .adjust_movie_quantity(movie.id, -1)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Movie, movie_id))?;

        tx.commit().await?;

        info!(loan_id = %loan.id, remaining = movie.quantity, "loan_created");
        Ok(loan)
    }

    /// Marks a loan returned and puts the copy back on the shelf
    #[instrument(skip(self), fields(loan_id = %loan_id))]
    pub async fn return_movie(&self, loan_id: Uuid) -> ServiceResult<Loan> {
        let mut tx = self.loans.begin().await?;

        let loan = tx
            .lock_loan(loan_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Loan, loan_id))?;

        if !loan.status.can_transition_to(LoanStatus::Returned) {
            tx.rollback().await?;
            return Err(BusinessRuleViolation::LoanAlreadyReturned.into());
        }

        let returned = tx
            .mark_returned(loan.id, Utc::now())
            .await?
            .ok_or(ServiceError::BusinessRule(BusinessRuleViolation::LoanAlreadyReturned))?;
        let movie = tx
            .adjust_movie_quantity(returned.movie_id, 1)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Movie, returned.movie_id))?;

        tx.commit().await?;

        info!(movie_id = %movie.id, quantity = movie.quantity, "loan_returned");
        Ok(returned)
    }

    pub async fn get_loan(&self, id: Uuid) -> ServiceResult<Loan> {
        self.loans
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Loan, id))
    }

    /// Active loans held by a user
    pub async fn get_user_loans(&self, user_id: Uuid) -> ServiceResult<Vec<Loan>> {
        let user = self.users.get_user(user_id).await?;
        Ok(self.loans.list_active_for_user(user.id).await?)
    }

    /// Every loan, newest first
    pub async fn list_loans(&self) -> ServiceResult<Vec<Loan>> {
        Ok(self.loans.list().await?)
    }

    /// Loans in one lifecycle state, newest first
    pub async fn list_loans_by_status(&self, status: LoanStatus) -> ServiceResult<Vec<Loan>> {
        Ok(self.loans.list_by_status(status).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        movie::{CreateMovie, UpdateMovie, MAX_STOCK},
        user::CreateUser,
    };
    use crate::repository::Repositories;
    use crate::service::Services;
    use futures::future::join_all;

    async fn inception(services: &Services, quantity: i32) -> Uuid {
        services
            .movies
            .create_movie(CreateMovie {
                name: "Inception".to_string(),
                director: "Christopher Nolan".to_string(),
                year: 2010,
                quantity,
                cover_url: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn user(services: &Services, name: &str) -> Uuid {
        services
            .users
            .create_user(CreateUser {
                user_name: name.to_string(),
                email: format!("{}@x.com", name.to_lowercase()),
            })
            .await
            .unwrap()
            .id
    }

    fn services() -> Services {
        Services::new(&Repositories::in_memory())
    }

    async fn quantity(services: &Services, movie_id: Uuid) -> i32 {
        services.movies.get_movie(movie_id).await.unwrap().quantity
    }

    #[tokio::test]
    async fn test_create_loan_decrements_stock_by_one() {
        let svc = services();
        let movie_id = inception(&svc, 3).await;
        let alice = user(&svc, "Alice").await;

        let loan = svc.loans.create_loan(movie_id, alice).await.unwrap();

        assert_eq!(loan.status, LoanStatus::Active);
        assert!(loan.returned_at.is_none());
        assert_eq!(loan.movie_id, movie_id);
        assert_eq!(loan.user_id, alice);
        assert_eq!(quantity(&svc, movie_id).await, 2);
    }

    #[tokio::test]
    async fn test_inception_scenario() {
        let svc = services();
        let movie_id = inception(&svc, 1).await;
        let alice = user(&svc, "Alice").await;
        let bob = user(&svc, "Bob").await;

        let loan = svc.loans.create_loan(movie_id, alice).await.unwrap();
        assert_eq!(quantity(&svc, movie_id).await, 0);

        let err = svc.loans.create_loan(movie_id, bob).await.unwrap_err();
        assert_eq!(err.business_rule(), Some(BusinessRuleViolation::MovieUnavailable));
        assert_eq!(err.to_string(), "movie is not available");
        assert_eq!(quantity(&svc, movie_id).await, 0);

        let returned = svc.loans.return_movie(loan.id).await.unwrap();
        assert_eq!(returned.status, LoanStatus::Returned);
        assert_eq!(quantity(&svc, movie_id).await, 1);
    }

    #[tokio::test]
    async fn test_user_with_active_loan_is_refused() {
        let svc = services();
        let first = inception(&svc, 5).await;
        let second = inception(&svc, 5).await;
        let alice = user(&svc, "Alice").await;

        svc.loans.create_loan(first, alice).await.unwrap();
        let err = svc.loans.create_loan(second, alice).await.unwrap_err();

        assert_eq!(err.business_rule(), Some(BusinessRuleViolation::UserHasActiveLoan));
        assert_eq!(quantity(&svc, second).await, 5);
    }

    #[tokio::test]
    async fn test_missing_movie_or_user_is_not_found() {
        let svc = services();
        let movie_id = inception(&svc, 1).await;
        let alice = user(&svc, "Alice").await;

        let err = svc.loans.create_loan(Uuid::new_v4(), alice).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: EntityKind::Movie, .. }));

        let err = svc.loans.create_loan(movie_id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: EntityKind::User, .. }));
        assert_eq!(quantity(&svc, movie_id).await, 1);
    }

    #[tokio::test]
    async fn test_round_trip_restores_stock() {
        let svc = services();
        let movie_id = inception(&svc, 2).await;
        let alice = user(&svc, "Alice").await;

        let loan = svc.loans.create_loan(movie_id, alice).await.unwrap();
        svc.loans.return_movie(loan.id).await.unwrap();

        assert_eq!(quantity(&svc, movie_id).await, 2);

        let loans = svc.loans.list_loans().await.unwrap();
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].status, LoanStatus::Returned);
        assert!(loans[0].returned_at.is_some());
        assert!(svc.loans.get_user_loans(alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_double_return_is_refused_and_stock_unchanged() {
        let svc = services();
        let movie_id = inception(&svc, 1).await;
        let alice = user(&svc, "Alice").await;

        let loan = svc.loans.create_loan(movie_id, alice).await.unwrap();
        svc.loans.return_movie(loan.id).await.unwrap();

        let err = svc.loans.return_movie(loan.id).await.unwrap_err();
        assert_eq!(err.business_rule(), Some(BusinessRuleViolation::LoanAlreadyReturned));
        assert_eq!(quantity(&svc, movie_id).await, 1);
    }

    #[tokio::test]
    async fn test_return_after_restock_to_limit() {
        let svc = services();
        let movie_id = inception(&svc, 1).await;
        let alice = user(&svc, "Alice").await;
        let loan = svc.loans.create_loan(movie_id, alice).await.unwrap();

        let mut restock = UpdateMovie::from(&svc.movies.get_movie(movie_id).await.unwrap());
        restock.quantity = i32::MAX;
        let err = svc.movies.update_movie(movie_id, restock.clone()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        restock.quantity = MAX_STOCK;
        svc.movies.update_movie(movie_id, restock.clone()).await.unwrap();

        let err = svc.loans.return_movie(loan.id).await.unwrap_err();
        assert_eq!(err.business_rule(), Some(BusinessRuleViolation::StockLimitReached));
        assert_eq!(svc.loans.get_loan(loan.id).await.unwrap().status, LoanStatus::Active);
        assert_eq!(quantity(&svc, movie_id).await, MAX_STOCK);

        restock.quantity = MAX_STOCK - 1;
        svc.movies.update_movie(movie_id, restock).await.unwrap();
        let returned = svc.loans.return_movie(loan.id).await.unwrap();
        assert_eq!(returned.status, LoanStatus::Returned);
        assert_eq!(quantity(&svc, movie_id).await, MAX_STOCK);
    }

    #[tokio::test]
    async fn test_list_loans_by_status() {
        let svc = services();
        let movie_id = inception(&svc, 2).await;
        let alice = user(&svc, "Alice").await;
        let bob = user(&svc, "Bob").await;

        let first = svc.loans.create_loan(movie_id, alice).await.unwrap();
        svc.loans.return_movie(first.id).await.unwrap();
        let second = svc.loans.create_loan(movie_id, bob).await.unwrap();

        let active = svc.loans.list_loans_by_status(LoanStatus::Active).await.unwrap();
        assert_eq!(active, vec![second]);

        let returned = svc.loans.list_loans_by_status(LoanStatus::Returned).await.unwrap();
        assert_eq!(returned.len(), 1);
        assert_eq!(returned[0].id, first.id);
    }

    #[tokio::test]
    async fn test_return_unknown_loan_is_not_found() {
        let svc = services();
        let err = svc.loans.return_movie(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: EntityKind::Loan, .. }));
    }

    #[tokio::test]
    async fn test_user_can_borrow_again_after_return() {
        let svc = services();
        let movie_id = inception(&svc, 1).await;
        let alice = user(&svc, "Alice").await;

        let loan = svc.loans.create_loan(movie_id, alice).await.unwrap();
        svc.loans.return_movie(loan.id).await.unwrap();
        let again = svc.loans.create_loan(movie_id, alice).await.unwrap();

        let active = svc.loans.get_user_loans(alice).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, again.id);
        assert_eq!(svc.loans.get_loan(loan.id).await.unwrap().status, LoanStatus::Returned);
    }

    #[tokio::test]
    async fn test_user_loans_for_unknown_user_is_not_found() {
        let svc = services();
        let err = svc.loans.get_user_loans(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_loans_for_same_user_admit_one() {
        let svc = services();
        let alice = user(&svc, "Alice").await;
        let mut movies = Vec::new();
        for _ in 0..8 {
            movies.push(inception(&svc, 1).await);
        }

        let attempts = movies.iter().map(|&movie_id| {
            let loans = svc.loans.clone();
            tokio::spawn(async move { loans.create_loan(movie_id, alice).await })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let refused = results
            .iter()
            .filter(|r| {
                r.as_ref().err().and_then(ServiceError::business_rule)
                    == Some(BusinessRuleViolation::UserHasActiveLoan)
            })
            .count();

        assert_eq!(successes, 1);
        assert_eq!(refused, movies.len() - 1);
        assert_eq!(svc.loans.get_user_loans(alice).await.unwrap().len(), 1);

        let mut total = 0;
        for movie_id in &movies {
            total += quantity(&svc, *movie_id).await;
        }
        assert_eq!(total, movies.len() as i32 - 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_loans_for_last_copy_admit_one() {
        let svc = services();
        let movie_id = inception(&svc, 1).await;
        let mut users = Vec::new();
        for i in 0..8 {
            users.push(user(&svc, &format!("User{i}")).await);
        }

        let attempts = users.iter().map(|&user_id| {
            let loans = svc.loans.clone();
            tokio::spawn(async move { loans.create_loan(movie_id, user_id).await })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let unavailable = results
            .iter()
            .filter(|r| {
                r.as_ref().err().and_then(ServiceError::business_rule)
                    == Some(BusinessRuleViolation::MovieUnavailable)
            })
            .count();

        assert_eq!(successes, 1);
        assert_eq!(unavailable, users.len() - 1);
        assert_eq!(quantity(&svc, movie_id).await, 0);
        assert_eq!(svc.loans.list_loans().await.unwrap().len(), 1);
    }
}
