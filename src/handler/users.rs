//! User operations and credential handling.
//!
//! At least one Admin must exist at all times: deleting or demoting the last
//! one is refused.

use super::{found, validate_key, DataHandler};
use crate::auth::generate_salt;
use crate::errors::{DataError, DataResult};
use crate::models::{Page, PageRequest, Role, User, UserState};
use crate::storage::Storage;

/// Username of the account created by [`DataHandler::ensure_admin`].
pub const BOOTSTRAP_ADMIN: &str = "admin";

impl<S: Storage> DataHandler<S> {
    pub async fn get_user(&self, username: &str) -> DataResult<User> {
        self.storage.get_user(username).await
    }

    pub async fn get_users(&self, usernames: &[String]) -> DataResult<Vec<User>> {
        let mut users = Vec::with_capacity(usernames.len());
        for username in usernames {
            users.push(self.storage.get_user(username).await?);
        }
        Ok(users)
    }

    pub async fn add_user(&self, user: &User) -> DataResult<()> {
        validate_key("User", &user.username)?;
        self.storage.insert_user(user).await
    }

    /// Replace a user, creating it if it does not exist.
    pub async fn update_user(&self, user: &User) -> DataResult<()> {
        let existing = match self.storage.get_user(&user.username).await {
            Err(e) if e.is_not_found() => return self.add_user(user).await,
            Err(e) => return Err(e),
            Ok(existing) => existing,
        };

        if existing.is_admin() && !user.is_admin() {
            self.require_other_admin(&user.username).await?;
        }
        self.storage.store_user(user).await
    }

    pub async fn delete_user(&self, username: &str) -> DataResult<()> {
        let user = self.storage.get_user(username).await?;
        if user.is_admin() {
            self.require_other_admin(username).await?;
        }
        self.storage.remove_user(username).await
    }

    pub async fn search_users(
        &self,
        query: &str,
        page_size: i64,
        page_number: i64,
    ) -> DataResult<Page<User>> {
        self.storage
            .search_users(query.trim(), PageRequest::new(page_size, page_number))
            .await
    }

    /// Set a new password, marking the credentials as user-chosen.
    pub async fn set_password(&self, username: &str, password: &str) -> DataResult<()> {
        if password.is_empty() {
            return Err(DataError::Validation("Password is required".to_string()));
        }
        let mut user = self.storage.get_user(username).await?;
        user.salt = generate_salt();
        user.hash = self.hasher.hash(password, &user.salt);
        user.state = UserState::Set;
        self.storage.store_user(&user).await
    }

    /// Check a username/password pair and return the matching user.
    pub async fn authenticate(&self, username: &str, password: &str) -> DataResult<User> {
        let invalid = || DataError::Validation("Invalid username or password".to_string());

        let user = match self.storage.get_user(username).await {
            Err(e) if e.is_not_found() => return Err(invalid()),
            other => other?,
        };
        if user.hash.is_empty() || !self.hasher.verify(&user.hash, &user.salt, password) {
            return Err(invalid());
        }
        Ok(user)
    }

    /// Create an Admin account when none exists. Returns whether one was created.
    ///
    /// The account gets the configured bootstrap password, which must be
    /// changed after first login.
    pub async fn ensure_admin(&self) -> DataResult<bool> {
        if self.storage.count_users_with_role(Role::Admin).await? > 0 {
            return Ok(false);
        }

        let mut admin = User::new(BOOTSTRAP_ADMIN, Role::Admin);
        if let Some(existing) = found(self.storage.get_user(BOOTSTRAP_ADMIN).await)? {
            admin.config = existing.config;
        }
        admin.salt = generate_salt();
        admin.hash = self.hasher.hash(&self.admin_password, &admin.salt);
        admin.state = UserState::New;
        self.storage.store_user(&admin).await?;

        tracing::warn!(
            "No admin user found; created '{}' with the bootstrap password. Change it immediately!",
            BOOTSTRAP_ADMIN
        );
        Ok(true)
    }

    async fn require_other_admin(&self, username: &str) -> DataResult<()> {
        let admins = self.storage.count_users_with_role(Role::Admin).await?;
        if admins <= 1 {
            return Err(DataError::ConstraintViolation(format!(
                "Refusing to remove '{}': it is the last admin",
                username
            )));
        }
        Ok(())
    }
}
