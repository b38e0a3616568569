/// Movie service
///
/// Validates input before it reaches the store and turns "no row" answers
/// into [`ServiceError::NotFound`].

use crate::error::{constraints, BusinessRuleViolation, EntityKind, ServiceError, ServiceResult};
use crate::models::movie::{CreateMovie, Movie, UpdateMovie};
use crate::repository::MovieRepository;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct MovieService {
    repo: Arc<dyn MovieRepository>,
}

impl MovieService {
    pub fn new(repo: Arc<dyn MovieRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_movie(&self, input: CreateMovie) -> ServiceResult<Movie> {
        let input = input.normalized();
        input.ensure_valid()?;

        let movie = self.repo.insert(&input).await?;
        info!(movie_id = %movie.id, quantity = movie.quantity, "movie_created");
        Ok(movie)
    }

    pub async fn get_movie(&self, id: Uuid) -> ServiceResult<Movie> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Movie, id))
    }

    /// All movies, newest first
    pub async fn list_movies(&self) -> ServiceResult<Vec<Movie>> {
        Ok(self.repo.list().await?)
    }

    /// Movies whose name or director contains `query`; a blank query lists all
    pub async fn search_movies(&self, query: &str) -> ServiceResult<Vec<Movie>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list_movies().await;
        }
        Ok(self.repo.search(query).await?)
    }

    #[instrument(skip(self, input), fields(movie_id = %id))]
    pub async fn update_movie(&self, id: Uuid, input: UpdateMovie) -> ServiceResult<Movie> {
        let input = input.normalized();
        input.ensure_valid()?;

        let movie = self
            .repo
            .update(id, &input)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Movie, id))?;

        info!(quantity = movie.quantity, "movie_updated");
        Ok(movie)
    }

    #[instrument(skip(self), fields(movie_id = %id))]
    pub async fn delete_movie(&self, id: Uuid) -> ServiceResult<()> {
        let deleted = self.repo.delete(id).await.map_err(|err| {
            if err.constraint() == Some(constraints::LOANS_MOVIE_ID_FKEY) {
                ServiceError::from(BusinessRuleViolation::ReferencedByLoans(EntityKind::Movie))
            } else {
                ServiceError::from(err)
            }
        })?;

        if !deleted {
            return Err(ServiceError::not_found(EntityKind::Movie, id));
        }

        info!("movie_deleted");
        Ok(())
    }
}
