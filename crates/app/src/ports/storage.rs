//! Storage ports: repository traits for cases and their reference data.

use std::future::Future;

use mims_domain::activity::CaseActivity;
use mims_domain::attachment::Attachment;
use mims_domain::case::{Case, CaseQuery, CaseStatus, Severity};
use mims_domain::case_type::CaseType;
use mims_domain::error::MimsError;
use mims_domain::id::{AttachmentId, CaseId, CaseTypeId, ProviderId};
use mims_domain::provider::Provider;
use mims_domain::time::Timestamp;

/// Number of cases per status and severity, used by the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseCounts {
    pub by_status: Vec<(CaseStatus, u64)>,
    pub by_severity: Vec<(Severity, u64)>,
}

/// Repository for persisting and querying [`Case`]s.
pub trait CaseRepository {
    /// Persist a new case.
    fn create(&self, case: Case) -> impl Future<Output = Result<Case, MimsError>> + Send;

    /// Get a case by its unique identifier.
    fn get_by_id(&self, id: CaseId)
    -> impl Future<Output = Result<Option<Case>, MimsError>> + Send;

    /// List cases matching `query`, newest first, honouring limit and offset.
    ///
    /// `now` is the reference instant for the overdue filter.
    fn list(
        &self,
        query: &CaseQuery,
        now: Timestamp,
    ) -> impl Future<Output = Result<Vec<Case>, MimsError>> + Send;

    /// Count cases matching `query`, ignoring limit and offset.
    fn count(
        &self,
        query: &CaseQuery,
        now: Timestamp,
    ) -> impl Future<Output = Result<u64, MimsError>> + Send;

    /// All open cases, used to evaluate SLA state.
    fn list_open(&self) -> impl Future<Output = Result<Vec<Case>, MimsError>> + Send;

    /// Case counts grouped by status and by severity.
    fn counts(&self) -> impl Future<Output = Result<CaseCounts, MimsError>> + Send;

    /// Whether any case references the case type.
    fn uses_case_type(&self, id: CaseTypeId)
    -> impl Future<Output = Result<bool, MimsError>> + Send;

    /// Whether any case references the provider.
    fn uses_provider(&self, id: ProviderId) -> impl Future<Output = Result<bool, MimsError>> + Send;

    /// Replace an existing case.
    fn update(&self, case: Case) -> impl Future<Output = Result<Case, MimsError>> + Send;

    /// Delete a case together with its activities and attachment rows.
    fn delete(&self, id: CaseId) -> impl Future<Output = Result<(), MimsError>> + Send;
}

/// Repository for [`CaseType`]s.
pub trait CaseTypeRepository {
    fn create(&self, case_type: CaseType)
    -> impl Future<Output = Result<CaseType, MimsError>> + Send;

    fn get_by_id(
        &self,
        id: CaseTypeId,
    ) -> impl Future<Output = Result<Option<CaseType>, MimsError>> + Send;

    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<CaseType>, MimsError>> + Send;

    /// All case types, ordered by name.
    fn get_all(&self) -> impl Future<Output = Result<Vec<CaseType>, MimsError>> + Send;

    fn update(&self, case_type: CaseType)
    -> impl Future<Output = Result<CaseType, MimsError>> + Send;

    fn delete(&self, id: CaseTypeId) -> impl Future<Output = Result<(), MimsError>> + Send;
}

/// Append-only store for case timelines.
pub trait ActivityRepository {
    fn append(
        &self,
        activity: CaseActivity,
    ) -> impl Future<Output = Result<CaseActivity, MimsError>> + Send;

    /// Activities of a case, oldest first.
    fn list_for_case(
        &self,
        case_id: CaseId,
    ) -> impl Future<Output = Result<Vec<CaseActivity>, MimsError>> + Send;
}

/// Repository for [`Attachment`] metadata. The bytes live in a
/// [`BlobStore`](super::BlobStore).
pub trait AttachmentRepository {
    fn create(
        &self,
        attachment: Attachment,
    ) -> impl Future<Output = Result<Attachment, MimsError>> + Send;

    fn get_by_id(
        &self,
        id: AttachmentId,
    ) -> impl Future<Output = Result<Option<Attachment>, MimsError>> + Send;

    /// Attachments of a case, oldest first.
    fn list_for_case(
        &self,
        case_id: CaseId,
    ) -> impl Future<Output = Result<Vec<Attachment>, MimsError>> + Send;

    fn delete(&self, id: AttachmentId) -> impl Future<Output = Result<(), MimsError>> + Send;
}

/// Repository for [`Provider`]s.
pub trait ProviderRepository {
    fn create(&self, provider: Provider)
    -> impl Future<Output = Result<Provider, MimsError>> + Send;

    fn get_by_id(
        &self,
        id: ProviderId,
    ) -> impl Future<Output = Result<Option<Provider>, MimsError>> + Send;

    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Provider>, MimsError>> + Send;

    /// All providers, ordered by name.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Provider>, MimsError>> + Send;

    fn update(&self, provider: Provider)
    -> impl Future<Output = Result<Provider, MimsError>> + Send;

    fn delete(&self, id: ProviderId) -> impl Future<Output = Result<(), MimsError>> + Send;
}
