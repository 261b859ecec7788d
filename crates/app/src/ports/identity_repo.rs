//! Identity ports: users and login sessions.

use std::future::Future;

use mims_domain::error::MimsError;
use mims_domain::id::UserId;
use mims_domain::time::Timestamp;
use mims_domain::user::{Session, SessionToken, User};

/// Repository for back-office [`User`]s.
pub trait UserRepository {
    fn create(&self, user: User) -> impl Future<Output = Result<User, MimsError>> + Send;

    fn get_by_id(&self, id: UserId)
    -> impl Future<Output = Result<Option<User>, MimsError>> + Send;

    /// Look a user up by normalized email.
    fn get_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, MimsError>> + Send;

    /// All users, ordered by display name.
    fn get_all(&self) -> impl Future<Output = Result<Vec<User>, MimsError>> + Send;

    fn count(&self) -> impl Future<Output = Result<u64, MimsError>> + Send;

    fn update(&self, user: User) -> impl Future<Output = Result<User, MimsError>> + Send;

    fn delete(&self, id: UserId) -> impl Future<Output = Result<(), MimsError>> + Send;
}

/// Store for login [`Session`]s.
pub trait SessionRepository {
    fn create(&self, session: Session) -> impl Future<Output = Result<Session, MimsError>> + Send;

    fn get(
        &self,
        token: &SessionToken,
    ) -> impl Future<Output = Result<Option<Session>, MimsError>> + Send;

    fn delete(&self, token: &SessionToken) -> impl Future<Output = Result<(), MimsError>> + Send;

    /// Revoke every session of a user.
    fn delete_for_user(&self, user_id: UserId)
    -> impl Future<Output = Result<u64, MimsError>> + Send;

    /// Remove sessions that expired before `now`, returning how many were removed.
    fn delete_expired(&self, now: Timestamp) -> impl Future<Output = Result<u64, MimsError>> + Send;
}
