//! Notification templates: message bodies rendered for case events.
//!
//! Bodies use `{{ key }}` placeholders. Keys missing from the render
//! context are left in the output unchanged so a broken template is visible
//! in the delivered message instead of silently losing text.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::case::Case;
use crate::error::{MimsError, ValidationError};
use crate::event::EventKind;
use crate::id::{LineChannelId, TemplateId};
use crate::time::{Timestamp, now};
use crate::validate::max_chars;

/// LINE rejects text messages longer than this.
pub const MAX_BODY_CHARS: usize = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub id: TemplateId,
    pub name: String,
    pub event: EventKind,
    pub channel_id: LineChannelId,
    pub body: String,
    pub active: bool,
    pub created_at: Timestamp,
}

impl NotificationTemplate {
    #[must_use]
    pub fn builder() -> TemplateBuilder {
        TemplateBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`], [`ValidationError::EmptyMessage`]
    /// or [`ValidationError::TooLong`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.body.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        max_chars("body", &self.body, MAX_BODY_CHARS)
    }

    /// Render the body with `context`.
    #[must_use]
    pub fn render(&self, context: &HashMap<String, String>) -> String {
        render(&self.body, context)
    }
}

/// Replace `{{ key }}` placeholders in `body` with values from `context`.
#[must_use]
pub fn render(body: &str, context: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after_open[..end].trim();
        match context.get(key) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    out
}

/// Names resolved alongside a case when building a render context.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaseNames<'a> {
    pub assignee: Option<&'a str>,
    pub case_type: Option<&'a str>,
    pub actor: Option<&'a str>,
}

/// Build the placeholder map for a case event.
///
/// Keys: `case.reference`, `case.title`, `case.status`, `case.severity`,
/// `case.location`, `case.assignee`, `case.type`, `event`, `actor`.
#[must_use]
pub fn case_context(case: &Case, event: EventKind, names: CaseNames<'_>) -> HashMap<String, String> {
    let mut ctx = HashMap::new();
    ctx.insert("case.reference".to_string(), case.reference.clone());
    ctx.insert("case.title".to_string(), case.title.clone());
    ctx.insert("case.status".to_string(), case.status.to_string());
    ctx.insert("case.severity".to_string(), case.severity.to_string());
    ctx.insert(
        "case.location".to_string(),
        case.location.clone().unwrap_or_default(),
    );
    ctx.insert(
        "case.assignee".to_string(),
        names.assignee.unwrap_or("-").to_string(),
    );
    ctx.insert(
        "case.type".to_string(),
        names.case_type.unwrap_or("-").to_string(),
    );
    ctx.insert("event".to_string(), event.to_string());
    ctx.insert("actor".to_string(), names.actor.unwrap_or("system").to_string());
    ctx
}

#[derive(Debug, Default)]
pub struct TemplateBuilder {
    id: Option<TemplateId>,
    name: Option<String>,
    event: Option<EventKind>,
    channel_id: Option<LineChannelId>,
    body: Option<String>,
    active: Option<bool>,
}

impl TemplateBuilder {
    #[must_use]
    pub fn id(mut self, id: TemplateId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn event(mut self, event: EventKind) -> Self {
        self.event = Some(event);
        self
    }

    #[must_use]
    pub fn channel_id(mut self, channel_id: LineChannelId) -> Self {
        self.channel_id = Some(channel_id);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Consume the builder, validate, and return a [`NotificationTemplate`].
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail.
    pub fn build(self) -> Result<NotificationTemplate, MimsError> {
        let template = NotificationTemplate {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default().trim().to_string(),
            event: self.event.unwrap_or(EventKind::CaseCreated),
            channel_id: self.channel_id.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            active: self.active.unwrap_or(true),
            created_at: now(),
        };
        template.validate()?;
        Ok(template)
    }
}
