//! LINE channel service: bot credentials used by notifications.

use std::sync::Arc;

use mims_domain::error::{ConflictError, MimsError, NotFoundError};
use mims_domain::id::LineChannelId;
use mims_domain::line_channel::LineChannel;

use crate::ports::{LineChannelRepository, TemplateRepository};

/// Application service for LINE channel CRUD operations.
pub struct LineChannelService<L, T> {
    repo: Arc<L>,
    templates: Arc<T>,
}

impl<L, T> LineChannelService<L, T>
where
    L: LineChannelRepository + Send + Sync,
    T: TemplateRepository + Send + Sync,
{
    pub fn new(repo: Arc<L>, templates: Arc<T>) -> Self {
        Self { repo, templates }
    }

    /// Create a channel.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail, or a storage error.
    pub async fn create_channel(&self, channel: LineChannel) -> Result<LineChannel, MimsError> {
        channel.validate()?;
        self.repo.create(channel).await
    }

    /// Look up a channel by id.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id, or a storage error.
    pub async fn get_channel(&self, id: LineChannelId) -> Result<LineChannel, MimsError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "LineChannel",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all channels.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_channels(&self) -> Result<Vec<LineChannel>, MimsError> {
        self.repo.get_all().await
    }

    /// Update a channel.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id,
    /// [`MimsError::Validation`] if invariants fail, or a storage error.
    pub async fn update_channel(&self, channel: LineChannel) -> Result<LineChannel, MimsError> {
        self.get_channel(channel.id).await?;
        channel.validate()?;
        self.repo.update(channel).await
    }

    /// Delete a channel no template sends through.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id,
    /// [`MimsError::Conflict`] while templates use it, or a storage error.
    pub async fn delete_channel(&self, id: LineChannelId) -> Result<(), MimsError> {
        self.get_channel(id).await?;
        if self.templates.uses_channel(id).await? {
            return Err(ConflictError::InUse {
                entity: "LINE channel",
                id: id.to_string(),
            }
            .into());
        }
        self.repo.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryLineChannels, InMemoryTemplates};
    use mims_domain::error::ValidationError;
    use mims_domain::template::NotificationTemplate;

    fn make_service() -> (
        LineChannelService<InMemoryLineChannels, InMemoryTemplates>,
        Arc<InMemoryTemplates>,
    ) {
        let templates = Arc::new(InMemoryTemplates::default());
        let svc = LineChannelService::new(
            Arc::new(InMemoryLineChannels::default()),
            Arc::clone(&templates),
        );
        (svc, templates)
    }

    fn ops() -> LineChannel {
        LineChannel::builder()
            .name("Ops")
            .access_token("token")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_fetch_channel() {
        let (svc, _) = make_service();
        let channel = svc.create_channel(ops()).await.unwrap();
        assert_eq!(svc.get_channel(channel.id).await.unwrap().name, "Ops");
    }

    #[tokio::test]
    async fn should_reject_blank_token_on_update() {
        let (svc, _) = make_service();
        let mut channel = svc.create_channel(ops()).await.unwrap();
        channel.access_token = " ".into();
        assert!(matches!(
            svc.update_channel(channel).await,
            Err(MimsError::Validation(ValidationError::EmptyAccessToken))
        ));
    }

    #[tokio::test]
    async fn should_refuse_to_delete_channel_used_by_template() {
        let (svc, templates) = make_service();
        let channel = svc.create_channel(ops()).await.unwrap();
        templates
            .create(
                NotificationTemplate::builder()
                    .name("New case")
                    .channel_id(channel.id)
                    .body("{{ case.title }}")
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(matches!(
            svc.delete_channel(channel.id).await,
            Err(MimsError::Conflict(ConflictError::InUse { .. }))
        ));
    }

    #[tokio::test]
    async fn should_delete_unused_channel() {
        let (svc, _) = make_service();
        let channel = svc.create_channel(ops()).await.unwrap();
        svc.delete_channel(channel.id).await.unwrap();
        assert!(svc.list_channels().await.unwrap().is_empty());
    }
}
