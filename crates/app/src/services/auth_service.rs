//! Auth service: login sessions and the first administrator.

use std::sync::Arc;
use std::time::Duration;

use mims_domain::error::{AuthError, MimsError};
use mims_domain::time::now;
use mims_domain::user::{Role, Session, SessionToken, User, check_password_policy, normalize_email};

use crate::password::{hash_password, verify_password};
use crate::ports::{SessionRepository, UserRepository};
use crate::rate_limiter::RateLimiter;

/// Tunables for [`AuthService`].
#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    /// How long a session stays valid after login.
    pub session_ttl: Duration,
    /// Failed or successful attempts allowed per email within `login_window`.
    pub login_max_attempts: usize,
    pub login_window: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(12 * 60 * 60),
            login_max_attempts: 5,
            login_window: Duration::from_secs(15 * 60),
        }
    }
}

/// Application service for authentication.
pub struct AuthService<U, S> {
    users: Arc<U>,
    sessions: Arc<S>,
    limiter: RateLimiter,
    session_ttl: chrono::Duration,
}

impl<U, S> AuthService<U, S>
where
    U: UserRepository + Send + Sync,
    S: SessionRepository + Send + Sync,
{
    /// Create a new service backed by the given repositories.
    pub fn new(users: Arc<U>, sessions: Arc<S>, settings: AuthSettings) -> Self {
        Self {
            users,
            sessions,
            limiter: RateLimiter::new(settings.login_max_attempts, settings.login_window),
            session_ttl: chrono::Duration::from_std(settings.session_ttl)
                .unwrap_or_else(|_| chrono::Duration::hours(12)),
        }
    }

    /// Check credentials and open a session.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::RateLimited`] after too many attempts for the
    /// email, [`AuthError::InvalidCredentials`] for an unknown email or wrong
    /// password, [`AuthError::AccountDisabled`] for a disabled account, or a
    /// storage error.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(Session, User), MimsError> {
        let email = normalize_email(email);
        self.limiter.check(&email)?;

        let Some(user) = self.users.get_by_email(&email).await? else {
            tracing::info!("login failed: unknown email");
            return Err(AuthError::InvalidCredentials.into());
        };
        if !verify_password(password, &user.password_hash) {
            tracing::info!(user = %user.id, "login failed: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.active {
            return Err(AuthError::AccountDisabled.into());
        }

        self.limiter.reset(&email);
        let session = self
            .sessions
            .create(Session::open(user.id, self.session_ttl))
            .await?;
        tracing::info!(user = %user.id, "login succeeded");
        Ok((session, user))
    }

    /// Revoke a session. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn logout(&self, token: &SessionToken) -> Result<(), MimsError> {
        self.sessions.delete(token).await
    }

    /// Resolve the user behind a session token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] for an unknown token or a
    /// deleted user, [`AuthError::SessionExpired`] for an expired session,
    /// [`AuthError::AccountDisabled`] for a disabled user, or a storage error.
    pub async fn authenticate(&self, token: &SessionToken) -> Result<User, MimsError> {
        let Some(session) = self.sessions.get(token).await? else {
            return Err(AuthError::Unauthenticated.into());
        };
        if session.is_expired(now()) {
            self.sessions.delete(token).await?;
            return Err(AuthError::SessionExpired.into());
        }
        let Some(user) = self.users.get_by_id(session.user_id).await? else {
            self.sessions.delete(token).await?;
            return Err(AuthError::Unauthenticated.into());
        };
        if !user.active {
            return Err(AuthError::AccountDisabled.into());
        }
        Ok(user)
    }

    /// Create the first administrator when no account exists yet.
    ///
    /// Returns the created user, or `None` when users already exist.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] for a bad email or password, or a
    /// storage error.
    pub async fn bootstrap_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, MimsError> {
        if self.users.count().await? > 0 {
            return Ok(None);
        }
        check_password_policy(password)?;
        let mut admin = User::builder()
            .email(email)
            .display_name("Administrator")
            .role(Role::Admin)
            .build()?;
        admin.password_hash = hash_password(password)?;
        let admin = self.users.create(admin).await?;
        tracing::info!(email = %admin.email, "bootstrap administrator created");
        Ok(Some(admin))
    }

    /// Delete expired sessions, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn purge_expired_sessions(&self) -> Result<u64, MimsError> {
        let removed = self.sessions.delete_expired(now()).await?;
        self.limiter.prune();
        if removed > 0 {
            tracing::debug!(removed, "expired sessions purged");
        }
        Ok(removed)
    }
}
