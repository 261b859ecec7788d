//! Template service: message bodies rendered for case events.

use std::collections::HashMap;
use std::sync::Arc;

use mims_domain::case::Case;
use mims_domain::error::{MimsError, NotFoundError};
use mims_domain::id::TemplateId;
use mims_domain::template::{CaseNames, NotificationTemplate, case_context};

use crate::ports::{LineChannelRepository, TemplateRepository};

/// Placeholder values used when previewing without a case.
fn sample_context(template: &NotificationTemplate) -> HashMap<String, String> {
    [
        ("case.reference", "C260101-a1b2c3"),
        ("case.title", "Air conditioner leaking"),
        ("case.status", "in_progress"),
        ("case.severity", "high"),
        ("case.location", "Building A, floor 3"),
        ("case.assignee", "Somchai"),
        ("case.type", "Facilities"),
        ("actor", "Administrator"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .chain([("event".to_string(), template.event.to_string())])
    .collect()
}

/// Application service for notification templates.
pub struct TemplateService<T, L> {
    repo: Arc<T>,
    channels: Arc<L>,
}

impl<T, L> TemplateService<T, L>
where
    T: TemplateRepository + Send + Sync,
    L: LineChannelRepository + Send + Sync,
{
    pub fn new(repo: Arc<T>, channels: Arc<L>) -> Self {
        Self { repo, channels }
    }

    async fn ensure_channel(&self, template: &NotificationTemplate) -> Result<(), MimsError> {
        if self.channels.get_by_id(template.channel_id).await?.is_none() {
            return Err(NotFoundError {
                entity: "LineChannel",
                id: template.channel_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Create a template bound to an existing channel.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail,
    /// [`MimsError::NotFound`] for an unknown channel, or a storage error.
    pub async fn create_template(
        &self,
        template: NotificationTemplate,
    ) -> Result<NotificationTemplate, MimsError> {
        template.validate()?;
        self.ensure_channel(&template).await?;
        self.repo.create(template).await
    }

    /// Look up a template by id.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id, or a storage error.
    pub async fn get_template(&self, id: TemplateId) -> Result<NotificationTemplate, MimsError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "NotificationTemplate",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all templates.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_templates(&self) -> Result<Vec<NotificationTemplate>, MimsError> {
        self.repo.get_all().await
    }

    /// Update a template.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown template or channel,
    /// [`MimsError::Validation`] if invariants fail, or a storage error.
    pub async fn update_template(
        &self,
        template: NotificationTemplate,
    ) -> Result<NotificationTemplate, MimsError> {
        self.get_template(template.id).await?;
        template.validate()?;
        self.ensure_channel(&template).await?;
        self.repo.update(template).await
    }

    /// Delete a template.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id, or a storage error.
    pub async fn delete_template(&self, id: TemplateId) -> Result<(), MimsError> {
        self.get_template(id).await?;
        self.repo.delete(id).await
    }

    /// Render a template against a case, or against sample values.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id, or a storage error.
    pub async fn preview(
        &self,
        id: TemplateId,
        case: Option<&Case>,
        names: CaseNames<'_>,
    ) -> Result<String, MimsError> {
        let template = self.get_template(id).await?;
        let context = match case {
            Some(case) => case_context(case, template.event, names),
            None => sample_context(&template),
        };
        Ok(template.render(&context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryLineChannels, InMemoryTemplates};
    use mims_domain::event::EventKind;
    use mims_domain::id::LineChannelId;
    use mims_domain::line_channel::LineChannel;

    async fn setup() -> (
        TemplateService<InMemoryTemplates, InMemoryLineChannels>,
        LineChannel,
    ) {
        let channels = Arc::new(InMemoryLineChannels::default());
        let channel = channels
            .create(
                LineChannel::builder()
                    .name("Ops")
                    .access_token("token")
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        (
            TemplateService::new(Arc::new(InMemoryTemplates::default()), channels),
            channel,
        )
    }

    fn template(channel_id: LineChannelId, body: &str) -> NotificationTemplate {
        NotificationTemplate::builder()
            .name("Status")
            .event(EventKind::CaseStatusChanged)
            .channel_id(channel_id)
            .body(body)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_reject_template_for_unknown_channel() {
        let (svc, _) = setup().await;
        let result = svc
            .create_template(template(LineChannelId::new(), "hi"))
            .await;
        assert!(matches!(result, Err(MimsError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_preview_with_sample_values() {
        let (svc, channel) = setup().await;
        let created = svc
            .create_template(template(channel.id, "{{event}}: {{ case.title }} {{ unknown }}"))
            .await
            .unwrap();

        let text = svc
            .preview(created.id, None, CaseNames::default())
            .await
            .unwrap();
        assert_eq!(
            text,
            "case.status_changed: Air conditioner leaking {{ unknown }}"
        );
    }

    #[tokio::test]
    async fn should_preview_against_a_case() {
        let (svc, channel) = setup().await;
        let created = svc
            .create_template(template(
                channel.id,
                "{{ case.title }} -> {{ case.assignee }} by {{ actor }}",
            ))
            .await
            .unwrap();
        let case = Case::builder().title("Printer jam").build().unwrap();

        let text = svc
            .preview(
                created.id,
                Some(&case),
                CaseNames {
                    assignee: Some("Nok"),
                    ..CaseNames::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(text, "Printer jam -> Nok by system");
    }

    #[tokio::test]
    async fn should_update_and_delete_template() {
        let (svc, channel) = setup().await;
        let mut created = svc
            .create_template(template(channel.id, "a"))
            .await
            .unwrap();
        created.active = false;
        assert!(!svc.update_template(created.clone()).await.unwrap().active);

        svc.delete_template(created.id).await.unwrap();
        assert!(svc.list_templates().await.unwrap().is_empty());
    }
}
