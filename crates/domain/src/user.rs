//! Users, roles, permissions and login sessions.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, MimsError, ValidationError};
use crate::id::UserId;
use crate::time::{Timestamp, now};
use crate::validate::{is_email, max_chars, normalize_optional};

/// Shortest accepted password.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// What a user is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewCases,
    EditCases,
    AssignCases,
    DeleteCases,
    /// Case types, providers, webhooks, LINE channels, templates and the outbox.
    ManageSettings,
    ManageUsers,
}

impl Permission {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewCases => "view_cases",
            Self::EditCases => "edit_cases",
            Self::AssignCases => "assign_cases",
            Self::DeleteCases => "delete_cases",
            Self::ManageSettings => "manage_settings",
            Self::ManageUsers => "manage_users",
        }
    }
}

/// Role of a back-office user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Supervisor,
    #[default]
    Agent,
    Viewer,
}

impl Role {
    pub const ALL: [Self; 4] = [Self::Admin, Self::Supervisor, Self::Agent, Self::Viewer];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Supervisor => "supervisor",
            Self::Agent => "agent",
            Self::Viewer => "viewer",
        }
    }

    /// Whether this role grants `permission`.
    #[must_use]
    pub fn allows(self, permission: Permission) -> bool {
        match self {
            Self::Admin => true,
            Self::Supervisor => permission != Permission::ManageUsers,
            Self::Agent => matches!(permission, Permission::ViewCases | Permission::EditCases),
            Self::Viewer => permission == Permission::ViewCases,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// A back-office account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
    /// LINE user id used for direct notifications.
    pub line_user_id: Option<String>,
    /// PHC-formatted password hash. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    #[must_use]
    pub fn builder() -> UserBuilder {
        UserBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidEmail`] or
    /// [`ValidationError::EmptyName`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_email(&self.email) {
            return Err(ValidationError::InvalidEmail);
        }
        if self.display_name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        max_chars("display_name", &self.display_name, 100)?;
        Ok(())
    }

    /// Fail with [`AuthError::Forbidden`] unless the user's role grants `permission`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] when the permission is missing.
    pub fn require(&self, permission: Permission) -> Result<(), AuthError> {
        if self.role.allows(permission) {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                permission: permission.as_str(),
            })
        }
    }
}

/// Canonical form of an email address used for lookups.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Enforce the password policy.
///
/// # Errors
///
/// Returns [`ValidationError::PasswordTooShort`] below [`MIN_PASSWORD_CHARS`].
pub fn check_password_policy(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_CHARS,
        });
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct UserBuilder {
    id: Option<UserId>,
    email: Option<String>,
    display_name: Option<String>,
    role: Option<Role>,
    active: Option<bool>,
    line_user_id: Option<String>,
    password_hash: Option<String>,
}

impl UserBuilder {
    #[must_use]
    pub fn id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    #[must_use]
    pub fn line_user_id(mut self, line_user_id: impl Into<String>) -> Self {
        self.line_user_id = Some(line_user_id.into());
        self
    }

    #[must_use]
    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    /// Consume the builder, validate, and return a [`User`].
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail.
    pub fn build(self) -> Result<User, MimsError> {
        let ts = now();
        let user = User {
            id: self.id.unwrap_or_default(),
            email: normalize_email(&self.email.unwrap_or_default()),
            display_name: self.display_name.unwrap_or_default().trim().to_string(),
            role: self.role.unwrap_or_default(),
            active: self.active.unwrap_or(true),
            line_user_id: normalize_optional(self.line_user_id),
            password_hash: self.password_hash.unwrap_or_default(),
            created_at: ts,
            updated_at: ts,
        };
        user.validate()?;
        Ok(user)
    }
}

/// Opaque session token handed to the browser as a cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh random token (256 bits, hex encoded).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        ))
    }

    /// Wrap a token received from a client.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A logged-in session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: UserId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Session {
    /// Open a session for `user_id` valid for `ttl`.
    #[must_use]
    pub fn open(user_id: UserId, ttl: Duration) -> Self {
        let created_at = now();
        Self {
            token: SessionToken::generate(),
            user_id,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    #[must_use]
    pub fn is_expired(&self, at: Timestamp) -> bool {
        at >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User::builder()
            .email("Agent@Example.com ")
            .display_name("Somchai")
            .role(role)
            .build()
            .unwrap()
    }

    #[test]
    fn should_normalize_email_when_building() {
        assert_eq!(user(Role::Agent).email, "agent@example.com");
    }

    #[test]
    fn should_reject_invalid_email() {
        let result = User::builder().email("nope").display_name("x").build();
        assert!(matches!(
            result,
            Err(MimsError::Validation(ValidationError::InvalidEmail))
        ));
    }

    #[test]
    fn should_grant_everything_to_admin() {
        for permission in [
            Permission::ViewCases,
            Permission::DeleteCases,
            Permission::ManageSettings,
            Permission::ManageUsers,
        ] {
            assert!(Role::Admin.allows(permission));
        }
    }

    #[test]
    fn should_deny_user_management_to_supervisor() {
        assert!(Role::Supervisor.allows(Permission::ManageSettings));
        assert!(!Role::Supervisor.allows(Permission::ManageUsers));
    }

    #[test]
    fn should_limit_agent_to_viewing_and_editing() {
        assert!(Role::Agent.allows(Permission::EditCases));
        assert!(!Role::Agent.allows(Permission::AssignCases));
        assert!(!Role::Agent.allows(Permission::DeleteCases));
    }

    #[test]
    fn should_return_forbidden_with_permission_name() {
        let err = user(Role::Viewer).require(Permission::EditCases).unwrap_err();
        assert_eq!(
            err,
            AuthError::Forbidden {
                permission: "edit_cases"
            }
        );
    }

    #[test]
    fn should_never_serialize_password_hash() {
        let mut u = user(Role::Agent);
        u.password_hash = "$argon2id$secret".to_string();
        let json = serde_json::to_string(&u).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn should_enforce_minimum_password_length() {
        assert!(check_password_policy("short").is_err());
        assert!(check_password_policy("long enough").is_ok());
    }

    #[test]
    fn should_generate_64_hex_char_tokens() {
        let token = SessionToken::generate();
        assert_eq!(token.as_str().len(), 64);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, SessionToken::generate());
    }

    #[test]
    fn should_expire_session_after_ttl() {
        let session = Session::open(UserId::new(), Duration::hours(1));
        assert!(!session.is_expired(session.created_at));
        assert!(session.is_expired(session.created_at + Duration::hours(1)));
    }

    #[test]
    fn should_parse_roles() {
        assert_eq!("supervisor".parse::<Role>().unwrap(), Role::Supervisor);
        assert!("root".parse::<Role>().is_err());
    }
}
