//! Provider service: use-cases for managing service providers.

use std::sync::Arc;

use mims_domain::error::{ConflictError, MimsError, NotFoundError};
use mims_domain::id::ProviderId;
use mims_domain::provider::Provider;
use mims_domain::time::now;

use crate::ports::{CaseRepository, ProviderRepository};

/// Application service for provider CRUD operations.
pub struct ProviderService<R, C> {
    repo: Arc<R>,
    cases: Arc<C>,
}

impl<R, C> ProviderService<R, C>
where
    R: ProviderRepository + Send + Sync,
    C: CaseRepository + Send + Sync,
{
    /// Create a new service backed by the given repositories.
    pub fn new(repo: Arc<R>, cases: Arc<C>) -> Self {
        Self { repo, cases }
    }

    async fn ensure_unique_name(&self, provider: &Provider) -> Result<(), MimsError> {
        if let Some(existing) = self.repo.find_by_name(&provider.name).await?
            && existing.id != provider.id
        {
            return Err(ConflictError::NameTaken {
                entity: "provider",
                name: provider.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Create a new provider.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail,
    /// [`MimsError::Conflict`] if the name is taken, or a storage error.
    pub async fn create_provider(&self, provider: Provider) -> Result<Provider, MimsError> {
        provider.validate()?;
        self.ensure_unique_name(&provider).await?;
        self.repo.create(provider).await
    }

    /// Look up a provider by id.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] when no provider with `id` exists,
    /// or a storage error from the repository.
    pub async fn get_provider(&self, id: ProviderId) -> Result<Provider, MimsError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Provider",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all providers.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_providers(&self) -> Result<Vec<Provider>, MimsError> {
        self.repo.get_all().await
    }

    /// Update an existing provider.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail,
    /// [`MimsError::Conflict`] if the name is taken, or a storage error.
    pub async fn update_provider(&self, mut provider: Provider) -> Result<Provider, MimsError> {
        provider.validate()?;
        self.ensure_unique_name(&provider).await?;
        provider.updated_at = now();
        self.repo.update(provider).await
    }

    /// Delete a provider no case references.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id,
    /// [`MimsError::Conflict`] while cases still use it, or a storage error.
    pub async fn delete_provider(&self, id: ProviderId) -> Result<(), MimsError> {
        self.get_provider(id).await?;
        if self.cases.uses_provider(id).await? {
            return Err(ConflictError::InUse {
                entity: "provider",
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
    use crate::testing::{InMemoryCases, InMemoryProviders};
    use mims_domain::case::Case;
    use mims_domain::error::ValidationError;

    fn make_service() -> (
        ProviderService<InMemoryProviders, InMemoryCases>,
        Arc<InMemoryCases>,
    ) {
        let cases = Arc::new(InMemoryCases::default());
        let svc = ProviderService::new(Arc::new(InMemoryProviders::default()), Arc::clone(&cases));
        (svc, cases)
    }

    fn acme() -> Provider {
        Provider::builder()
            .name("ACME Facilities")
            .contact_email("Ops@Acme.example")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_provider_with_normalized_email() {
        let (svc, _) = make_service();
        let created = svc.create_provider(acme()).await.unwrap();
        assert_eq!(created.contact_email.as_deref(), Some("ops@acme.example"));
        assert_eq!(svc.list_providers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_reject_invalid_contact_email_on_update() {
        let (svc, _) = make_service();
        let mut provider = svc.create_provider(acme()).await.unwrap();
        provider.contact_email = Some("not-an-email".into());
        let result = svc.update_provider(provider).await;
        assert!(matches!(
            result,
            Err(MimsError::Validation(ValidationError::InvalidEmail))
        ));
    }

    #[tokio::test]
    async fn should_reject_duplicate_name() {
        let (svc, _) = make_service();
        svc.create_provider(acme()).await.unwrap();
        let result = svc.create_provider(acme()).await;
        assert!(matches!(result, Err(MimsError::Conflict(_))));
    }

    #[tokio::test]
    async fn should_refuse_to_delete_provider_in_use() {
        let (svc, cases) = make_service();
        let provider = svc.create_provider(acme()).await.unwrap();
        cases
            .create(
                Case::builder()
                    .title("Aircon")
                    .provider_id(provider.id)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(matches!(
            svc.delete_provider(provider.id).await,
            Err(MimsError::Conflict(ConflictError::InUse { .. }))
        ));
    }

    #[tokio::test]
    async fn should_return_not_found_when_deleting_unknown_provider() {
        let (svc, _) = make_service();
        assert!(matches!(
            svc.delete_provider(ProviderId::new()).await,
            Err(MimsError::NotFound(_))
        ));
    }
}
