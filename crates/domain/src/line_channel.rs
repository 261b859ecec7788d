//! LINE channel: credentials of a LINE Messaging API bot.

use serde::{Deserialize, Serialize};

use crate::error::{MimsError, ValidationError};
use crate::id::LineChannelId;
use crate::time::{Timestamp, now};
use crate::validate::{max_chars, normalize_optional};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineChannel {
    pub id: LineChannelId,
    pub name: String,
    /// Long-lived channel access token. Never serialized.
    #[serde(skip_serializing, default)]
    pub access_token: String,
    /// User, group or room id that receives notifications by default.
    pub default_target: Option<String>,
    pub active: bool,
    pub created_at: Timestamp,
}

impl LineChannel {
    #[must_use]
    pub fn builder() -> LineChannelBuilder {
        LineChannelBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] or
    /// [`ValidationError::EmptyAccessToken`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        max_chars("name", &self.name, 100)?;
        if self.access_token.trim().is_empty() {
            return Err(ValidationError::EmptyAccessToken);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LineChannelBuilder {
    id: Option<LineChannelId>,
    name: Option<String>,
    access_token: Option<String>,
    default_target: Option<String>,
    active: Option<bool>,
}

impl LineChannelBuilder {
    #[must_use]
    pub fn id(mut self, id: LineChannelId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn default_target(mut self, target: impl Into<String>) -> Self {
        self.default_target = Some(target.into());
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Consume the builder, validate, and return a [`LineChannel`].
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail.
    pub fn build(self) -> Result<LineChannel, MimsError> {
        let channel = LineChannel {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default().trim().to_string(),
            access_token: self.access_token.unwrap_or_default().trim().to_string(),
            default_target: normalize_optional(self.default_target),
            active: self.active.unwrap_or(true),
            created_at: now(),
        };
        channel.validate()?;
        Ok(channel)
    }
}
