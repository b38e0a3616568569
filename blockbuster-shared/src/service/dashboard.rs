/// Aggregate counts for the overview page

use crate::error::ServiceResult;
use crate::models::loan::Loan;
use crate::service::{loan::LoanService, movie::MovieService, user::UserService};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Store-wide totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_movies: usize,
    pub total_users: usize,
    pub total_loans: usize,

    /// Loans not yet returned
    pub active_loans: usize,

    /// Movies with at least one copy on the shelf
    pub available_movies: usize,
}

#[derive(Clone)]
pub struct DashboardService {
    movies: MovieService,
    users: UserService,
    loans: LoanService,
}

impl DashboardService {
    pub fn new(movies: MovieService, users: UserService, loans: LoanService) -> Self {
        Self {
            movies,
            users,
            loans,
        }
    }

    #[instrument(skip(self))]
    pub async fn summary(&self) -> ServiceResult<DashboardSummary> {
        let movies = self.movies.list_movies().await?;
        let users = self.users.list_users().await?;
        let loans = self.loans.list_loans().await?;

        Ok(DashboardSummary {
            total_movies: movies.len(),
            total_users: users.len(),
            total_loans: loans.len(),
            active_loans: loans.iter().filter(|loan| loan.is_active()).count(),
            available_movies: movies.iter().filter(|movie| movie.is_available()).count(),
        })
    }

    /// Most recent loans, up to `limit`
    pub async fn recent_loans(&self, limit: usize) -> ServiceResult<Vec<Loan>> {
        let mut loans = self.loans.list_loans().await?;
        loans.truncate(limit);
        Ok(loans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{movie::CreateMovie, user::CreateUser};
    use crate::repository::Repositories;
    use crate::service::Services;

    #[tokio::test]
    async fn test_summary_counts() {
        let svc = Services::new(&Repositories::in_memory());

        let empty = svc.dashboard.summary().await.unwrap();
        assert_eq!(
            empty,
            DashboardSummary {
                total_movies: 0,
                total_users: 0,
                total_loans: 0,
                active_loans: 0,
                available_movies: 0,
            }
        );

        let movie = svc
            .movies
            .create_movie(CreateMovie {
                name: "Heat".to_string(),
                director: "Michael Mann".to_string(),
                year: 1995,
                quantity: 1,
                cover_url: None,
            })
            .await
            .unwrap();
        let mut borrowers = Vec::new();
        for name in ["ana", "ben"] {
            let user = svc
                .users
                .create_user(CreateUser {
                    user_name: name.to_string(),
                    email: format!("{name}@x.com"),
                })
                .await
                .unwrap();
            borrowers.push(user.id);
        }

        let first = svc.loans.create_loan(movie.id, borrowers[0]).await.unwrap();
        svc.loans.return_movie(first.id).await.unwrap();
        svc.loans.create_loan(movie.id, borrowers[1]).await.unwrap();

        let summary = svc.dashboard.summary().await.unwrap();
        assert_eq!(summary.total_movies, 1);
        assert_eq!(summary.total_users, 2);
        assert_eq!(summary.total_loans, 2);
        assert_eq!(summary.active_loans, 1);
        assert_eq!(summary.available_movies, 0);

        let recent = svc.dashboard.recent_loans(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].user_id, borrowers[1]);
    }
}
