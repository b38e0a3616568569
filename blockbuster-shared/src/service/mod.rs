/// Domain services
///
/// - `movie`: movie CRUD with validation
/// - `user`: user CRUD with validation
/// - `loan`: check-out and return workflow (composes the other two)
/// - `dashboard`: aggregate counts for an overview page
///
/// Services are cheap to clone; every field is an `Arc`.

pub mod dashboard;
pub mod loan;
pub mod movie;
pub mod user;

use crate::repository::Repositories;

pub use dashboard::{DashboardService, DashboardSummary};
pub use loan::LoanService;
pub use movie::MovieService;
pub use user::UserService;

/// Every service wired to one repository set
#[derive(Clone)]
pub struct Services {
    pub movies: MovieService,
    pub users: UserService,
    pub loans: LoanService,
    pub dashboard: DashboardService,
}

impl Services {
    pub fn new(repos: &Repositories) -> Self {
        let movies = MovieService::new(repos.movies.clone());
        let users = UserService::new(repos.users.clone());
        let loans = LoanService::new(repos.loans.clone(), movies.clone(), users.clone());
        let dashboard = DashboardService::new(movies.clone(), users.clone(), loans.clone());

        Self {
            movies,
            users,
            loans,
            dashboard,
        }
    }
}
