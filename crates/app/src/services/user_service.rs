//! User service: use-cases for managing back-office accounts.

use std::sync::Arc;

use mims_domain::error::{AuthError, ConflictError, MimsError, NotFoundError};
use mims_domain::id::UserId;
use mims_domain::time::now;
use mims_domain::user::{Role, User, check_password_policy, normalize_email};

use crate::password::{hash_password, verify_password};
use crate::ports::{SessionRepository, UserRepository};

/// Input for [`UserService::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password: String,
    pub line_user_id: Option<String>,
}

/// Partial update for [`UserService::update_user`].
///
/// An empty `line_user_id` clears it.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub line_user_id: Option<String>,
}

/// Application service for user accounts.
pub struct UserService<U, S> {
    users: Arc<U>,
    sessions: Arc<S>,
}

impl<U, S> UserService<U, S>
where
    U: UserRepository + Send + Sync,
    S: SessionRepository + Send + Sync,
{
    /// Create a new service backed by the given repositories.
    pub fn new(users: Arc<U>, sessions: Arc<S>) -> Self {
        Self { users, sessions }
    }

    /// Register a new account with a hashed password.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] for a bad email, name or password,
    /// [`MimsError::Conflict`] when the email is registered, or a storage error.
    #[tracing::instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: NewUser) -> Result<User, MimsError> {
        check_password_policy(&input.password)?;
        let mut builder = User::builder()
            .email(input.email)
            .display_name(input.display_name)
            .role(input.role);
        if let Some(line_user_id) = input.line_user_id {
            builder = builder.line_user_id(line_user_id);
        }
        let mut user = builder.build()?;

        if self.users.get_by_email(&user.email).await?.is_some() {
            return Err(ConflictError::EmailTaken(user.email).into());
        }
        user.password_hash = hash_password(&input.password)?;
        let user = self.users.create(user).await?;
        tracing::info!(user = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    /// Look up a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] when no user with `id` exists,
    /// or a storage error from the repository.
    pub async fn get_user(&self, id: UserId) -> Result<User, MimsError> {
        self.users.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "User",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Look up a user by email.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, MimsError> {
        self.users.get_by_email(&normalize_email(email)).await
    }

    /// List all users.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_users(&self) -> Result<Vec<User>, MimsError> {
        self.users.get_all().await
    }

    /// Change name, role, active flag or LINE id.
    ///
    /// Disabling an account revokes its sessions.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id,
    /// [`MimsError::Validation`] if the result is invalid, or a storage error.
    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, MimsError> {
        let mut user = self.get_user(id).await?;
        if let Some(name) = update.display_name {
            user.display_name = name.trim().to_string();
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(line_user_id) = update.line_user_id {
            let line_user_id = line_user_id.trim().to_string();
            user.line_user_id = (!line_user_id.is_empty()).then_some(line_user_id);
        }
        let disabling = update.active == Some(false) && user.active;
        if let Some(active) = update.active {
            user.active = active;
        }
        user.validate()?;
        user.updated_at = now();

        let user = self.users.update(user).await?;
        if disabling {
            let revoked = self.sessions.delete_for_user(id).await?;
            tracing::info!(user = %id, revoked, "user disabled");
        }
        Ok(user)
    }

    /// Set a new password.
    ///
    /// With `current`, the caller is changing their own password and it must
    /// match. Without it (administrator reset) every session of the user is
    /// revoked.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] when `current` is wrong,
    /// [`MimsError::Validation`] when the new password is too short,
    /// [`MimsError::NotFound`] for an unknown id, or a storage error.
    pub async fn change_password(
        &self,
        id: UserId,
        current: Option<&str>,
        new_password: &str,
    ) -> Result<(), MimsError> {
        let mut user = self.get_user(id).await?;
        if let Some(current) = current
            && !verify_password(current, &user.password_hash)
        {
            return Err(AuthError::InvalidCredentials.into());
        }
        check_password_policy(new_password)?;

        user.password_hash = hash_password(new_password)?;
        user.updated_at = now();
        self.users.update(user).await?;
        if current.is_none() {
            self.sessions.delete_for_user(id).await?;
        }
        Ok(())
    }

    /// Delete an account and revoke its sessions.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id, or a storage error.
    pub async fn delete_user(&self, id: UserId) -> Result<(), MimsError> {
        self.get_user(id).await?;
        self.sessions.delete_for_user(id).await?;
        self.users.delete(id).await
    }
}
