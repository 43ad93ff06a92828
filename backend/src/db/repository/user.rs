//! User repository trait.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{NewUser, User, UserId};

/// Repository trait for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user.
    ///
    /// # Returns
    /// * `Err(RepositoryError::Conflict)` - If the email or username is taken
    async fn create_user(&self, user: &NewUser) -> RepositoryResult<User>;

    /// Fetch a user by id.
    async fn get_user(&self, user_id: UserId) -> RepositoryResult<User>;

    /// Look up a user by exact username.
    async fn find_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;

    /// Look up a user whose email or username matches.
    async fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> RepositoryResult<Option<User>>;
}
