//! Provider: a contractor or vendor that cases can be routed to.

use serde::{Deserialize, Serialize};

use crate::error::{MimsError, ValidationError};
use crate::id::ProviderId;
use crate::time::{Timestamp, now};
use crate::validate::{is_email, max_chars, normalize_optional};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Provider {
    #[must_use]
    pub fn builder() -> ProviderBuilder {
        ProviderBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] for a blank name or
    /// [`ValidationError::InvalidEmail`] for a malformed contact email.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        max_chars("name", &self.name, 200)?;
        if let Some(email) = &self.contact_email
            && !is_email(email)
        {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ProviderBuilder {
    id: Option<ProviderId>,
    name: Option<String>,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    active: Option<bool>,
}

impl ProviderBuilder {
    #[must_use]
    pub fn id(mut self, id: ProviderId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn contact_email(mut self, email: impl Into<String>) -> Self {
        self.contact_email = Some(email.into());
        self
    }

    #[must_use]
    pub fn contact_phone(mut self, phone: impl Into<String>) -> Self {
        self.contact_phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Consume the builder, validate, and return a [`Provider`].
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail.
    pub fn build(self) -> Result<Provider, MimsError> {
        let ts = now();
        let provider = Provider {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default().trim().to_string(),
            contact_email: normalize_optional(self.contact_email)
                .map(|email| email.to_ascii_lowercase()),
            contact_phone: normalize_optional(self.contact_phone),
            active: self.active.unwrap_or(true),
            created_at: ts,
            updated_at: ts,
        };
        provider.validate()?;
        Ok(provider)
    }
}
