/// User service

use crate::error::{constraints, BusinessRuleViolation, EntityKind, ServiceError, ServiceResult};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::repository::UserRepository;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Registers a user; a duplicate email is a business-rule conflict
    #[instrument(skip(self, input))]
    pub async fn create_user(&self, input: CreateUser) -> ServiceResult<User> {
        let input = input.normalized();
        input.ensure_valid()?;

        let user = self.repo.insert(&input).await?;
        info!(user_id = %user.id, "user_created");
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> ServiceResult<User> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::User, id))
    }

    /// All users, newest first
    pub async fn list_users(&self) -> ServiceResult<Vec<User>> {
        Ok(self.repo.list().await?)
    }

    /// Users whose name or email contains `query`; a blank query lists all
    pub async fn search_users(&self, query: &str) -> ServiceResult<Vec<User>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list_users().await;
        }
        Ok(self.repo.search(query).await?)
    }

    #[instrument(skip(self, input), fields(user_id = %id))]
    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> ServiceResult<User> {
        let input = input.normalized();
        input.ensure_valid()?;

        let user = self
            .repo
            .update(id, &input)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::User, id))?;

        info!("user_updated");
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: Uuid) -> ServiceResult<()> {
        let deleted = self.repo.delete(id).await.map_err(|err| {
            if err.constraint() == Some(constraints::LOANS_USER_ID_FKEY) {
                ServiceError::from(BusinessRuleViolation::ReferencedByLoans(EntityKind::User))
            } else {
                ServiceError::from(err)
            }
        })?;

        if !deleted {
            return Err(ServiceError::not_found(EntityKind::User, id));
        }

        info!("user_deleted");
        Ok(())
    }
}
