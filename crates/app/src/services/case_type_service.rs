//! Case type service: use-cases for managing case categories.

use std::sync::Arc;

use mims_domain::case_type::CaseType;
use mims_domain::error::{ConflictError, MimsError, NotFoundError};
use mims_domain::id::CaseTypeId;

use crate::ports::{CaseRepository, CaseTypeRepository};

/// Application service for case type CRUD operations.
pub struct CaseTypeService<T, C> {
    repo: Arc<T>,
    cases: Arc<C>,
}

impl<T, C> CaseTypeService<T, C>
where
    T: CaseTypeRepository + Send + Sync,
    C: CaseRepository + Send + Sync,
{
    /// Create a new service backed by the given repositories.
    pub fn new(repo: Arc<T>, cases: Arc<C>) -> Self {
        Self { repo, cases }
    }

    async fn ensure_unique_name(&self, case_type: &CaseType) -> Result<(), MimsError> {
        if let Some(existing) = self.repo.find_by_name(&case_type.name).await?
            && existing.id != case_type.id
        {
            return Err(ConflictError::NameTaken {
                entity: "case type",
                name: case_type.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Create a new case type after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail,
    /// [`MimsError::Conflict`] if the name is taken, or a storage error.
    pub async fn create_case_type(&self, case_type: CaseType) -> Result<CaseType, MimsError> {
        case_type.validate()?;
        self.ensure_unique_name(&case_type).await?;
        self.repo.create(case_type).await
    }

    /// Look up a case type by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] when no case type with `id` exists,
    /// or a storage error from the repository.
    pub async fn get_case_type(&self, id: CaseTypeId) -> Result<CaseType, MimsError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "CaseType",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all case types.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_case_types(&self) -> Result<Vec<CaseType>, MimsError> {
        self.repo.get_all().await
    }

    /// Update an existing case type.
    ///
    /// SLA changes apply to cases created or re-prioritised afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::Validation`] if invariants fail,
    /// [`MimsError::Conflict`] if the name is taken, or a storage error.
    pub async fn update_case_type(&self, case_type: CaseType) -> Result<CaseType, MimsError> {
        case_type.validate()?;
        self.ensure_unique_name(&case_type).await?;
        self.repo.update(case_type).await
    }

    /// Delete a case type that no case references.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id,
    /// [`MimsError::Conflict`] while cases still use it, or a storage error.
    pub async fn delete_case_type(&self, id: CaseTypeId) -> Result<(), MimsError> {
        self.get_case_type(id).await?;
        if self.cases.uses_case_type(id).await? {
            return Err(ConflictError::InUse {
                entity: "case type",
                id: id.to_string(),
            }
            .into());
        }
        self.repo.delete(id).await
    }
}
