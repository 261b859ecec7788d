//! Attachment service: files uploaded to cases.

use std::sync::Arc;

use mims_domain::activity::{ActivityKind, CaseActivity};
use mims_domain::attachment::Attachment;
use mims_domain::error::{MimsError, NotFoundError};
use mims_domain::id::{AttachmentId, CaseId};
use mims_domain::user::User;

use crate::ports::{ActivityRepository, AttachmentRepository, BlobStore, CaseRepository};

/// Application service for case attachments.
pub struct AttachmentService<C, F, A, B> {
    cases: Arc<C>,
    attachments: Arc<F>,
    activities: Arc<A>,
    blobs: Arc<B>,
    max_bytes: u64,
}

impl<C, F, A, B> AttachmentService<C, F, A, B>
where
    C: CaseRepository + Send + Sync,
    F: AttachmentRepository + Send + Sync,
    A: ActivityRepository + Send + Sync,
    B: BlobStore + Send + Sync,
{
    /// Create a new service; uploads larger than `max_bytes` are rejected.
    pub fn new(
        cases: Arc<C>,
        attachments: Arc<F>,
        activities: Arc<A>,
        blobs: Arc<B>,
        max_bytes: u64,
    ) -> Self {
        Self {
            cases,
            attachments,
            activities,
            blobs,
            max_bytes,
        }
    }

    /// Largest accepted upload, in bytes.
    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    async fn ensure_case(&self, case_id: CaseId) -> Result<mims_domain::case::Case, MimsError> {
        self.cases.get_by_id(case_id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Case",
                id: case_id.to_string(),
            }
            .into()
        })
    }

    /// Store a file and attach it to a case.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown case,
    /// [`MimsError::Validation`] for a closed case or a rejected file, or a
    /// storage error.
    #[tracing::instrument(skip(self, bytes, actor), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        case_id: CaseId,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        actor: &User,
    ) -> Result<Attachment, MimsError> {
        let case = self.ensure_case(case_id).await?;
        case.ensure_mutable()?;
        let attachment = Attachment::new(
            case_id,
            file_name,
            content_type,
            bytes.len() as u64,
            self.max_bytes,
            Some(actor.id),
        )?;

        self.blobs.put(&attachment.storage_key, bytes).await?;
        let attachment = match self.attachments.create(attachment.clone()).await {
            Ok(created) => created,
            Err(err) => {
                if let Err(cleanup) = self.blobs.delete(&attachment.storage_key).await {
                    tracing::warn!(%cleanup, key = %attachment.storage_key, "orphaned blob");
                }
                return Err(err);
            }
        };

        self.activities
            .append(CaseActivity::new(
                case_id,
                Some(actor.id),
                ActivityKind::AttachmentAdded {
                    attachment_id: attachment.id,
                    file_name: attachment.file_name.clone(),
                },
            ))
            .await?;
        Ok(attachment)
    }

    /// Attachments of a case.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown case, or a storage error.
    pub async fn list(&self, case_id: CaseId) -> Result<Vec<Attachment>, MimsError> {
        self.ensure_case(case_id).await?;
        self.attachments.list_for_case(case_id).await
    }

    /// Look up attachment metadata.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id, or a storage error.
    pub async fn get(&self, id: AttachmentId) -> Result<Attachment, MimsError> {
        self.attachments.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Attachment",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Metadata and content of an attachment.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] when the row or its bytes are missing,
    /// or a storage error.
    pub async fn download(&self, id: AttachmentId) -> Result<(Attachment, Vec<u8>), MimsError> {
        let attachment = self.get(id).await?;
        let Some(bytes) = self.blobs.get(&attachment.storage_key).await? else {
            tracing::warn!(attachment = %id, key = %attachment.storage_key, "attachment content missing");
            return Err(NotFoundError {
                entity: "Attachment content",
                id: id.to_string(),
            }
            .into());
        };
        Ok((attachment, bytes))
    }

    /// Remove an attachment and its content.
    ///
    /// # Errors
    ///
    /// Returns [`MimsError::NotFound`] for an unknown id, or a storage error.
    pub async fn delete(&self, id: AttachmentId, actor: &User) -> Result<(), MimsError> {
        let attachment = self.get(id).await?;
        self.attachments.delete(id).await?;
        self.blobs.delete(&attachment.storage_key).await?;
        self.activities
            .append(CaseActivity::new(
                attachment.case_id,
                Some(actor.id),
                ActivityKind::AttachmentRemoved {
                    attachment_id: attachment.id,
                    file_name: attachment.file_name,
                },
            ))
            .await?;
        Ok(())
    }

    /// Remove every attachment of a case, before the case itself is deleted.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository or blob store.
    pub async fn delete_for_case(&self, case_id: CaseId) -> Result<usize, MimsError> {
        let attachments = self.attachments.list_for_case(case_id).await?;
        for attachment in &attachments {
            self.attachments.delete(attachment.id).await?;
            self.blobs.delete(&attachment.storage_key).await?;
        }
        Ok(attachments.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryActivities, InMemoryAttachments, InMemoryBlobs, InMemoryCases};
    use mims_domain::case::{Case, CaseStatus};
    use mims_domain::error::ValidationError;
    use mims_domain::time::now;

    type Service =
        AttachmentService<InMemoryCases, InMemoryAttachments, InMemoryActivities, InMemoryBlobs>;

    struct Fixture {
        svc: Service,
        cases: Arc<InMemoryCases>,
        activities: Arc<InMemoryActivities>,
        blobs: Arc<InMemoryBlobs>,
        case: Case,
        actor: User,
    }

    async fn fixture() -> Fixture {
        let cases = Arc::new(InMemoryCases::default());
        let activities = Arc::new(InMemoryActivities::default());
        let blobs = Arc::new(InMemoryBlobs::default());
        let case = cases
            .create(Case::builder().title("Leak").build().unwrap())
            .await
            .unwrap();
        let actor = User::builder()
            .email("a@example.com")
            .display_name("A")
            .build()
            .unwrap();
        let svc = AttachmentService::new(
            Arc::clone(&cases),
            Arc::new(InMemoryAttachments::default()),
            Arc::clone(&activities),
            Arc::clone(&blobs),
            1024,
        );
        Fixture {
            svc,
            cases,
            activities,
            blobs,
            case,
            actor,
        }
    }

    #[tokio::test]
    async fn should_store_upload_and_download_it() {
        let f = fixture().await;
        let attachment = f
            .svc
            .upload(f.case.id, "photo.png", "image/png", b"png-bytes".to_vec(), &f.actor)
            .await
            .unwrap();
        assert_eq!(attachment.size_bytes, 9);

        let (meta, bytes) = f.svc.download(attachment.id).await.unwrap();
        assert_eq!(meta.file_name, "photo.png");
        assert_eq!(bytes, b"png-bytes");

        let timeline = f.activities.list_for_case(f.case.id).await.unwrap();
        assert_eq!(timeline[0].kind.as_str(), "attachment_added");
    }

    #[tokio::test]
    async fn should_reject_oversized_upload_without_storing() {
        let f = fixture().await;
        let result = f
            .svc
            .upload(f.case.id, "big.pdf", "application/pdf", vec![0; 2048], &f.actor)
            .await;
        assert!(matches!(
            result,
            Err(MimsError::Validation(ValidationError::FileTooLarge { .. }))
        ));
        assert!(f.blobs.keys().is_empty());
    }

    #[tokio::test]
    async fn should_reject_upload_on_closed_case() {
        let f = fixture().await;
        let mut case = f.case.clone();
        case.transition_to(CaseStatus::Cancelled, now()).unwrap();
        f.cases.update(case).await.unwrap();

        let result = f
            .svc
            .upload(f.case.id, "a.txt", "text/plain", b"x".to_vec(), &f.actor)
            .await;
        assert!(matches!(
            result,
            Err(MimsError::Validation(ValidationError::TerminalCase { .. }))
        ));
    }

    #[tokio::test]
    async fn should_remove_content_on_delete() {
        let f = fixture().await;
        let attachment = f
            .svc
            .upload(f.case.id, "a.txt", "text/plain", b"x".to_vec(), &f.actor)
            .await
            .unwrap();

        f.svc.delete(attachment.id, &f.actor).await.unwrap();
        assert!(f.blobs.keys().is_empty());
        assert!(matches!(
            f.svc.get(attachment.id).await,
            Err(MimsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_purge_all_attachments_of_a_case() {
        let f = fixture().await;
        for name in ["a.txt", "b.txt"] {
            f.svc
                .upload(f.case.id, name, "text/plain", b"x".to_vec(), &f.actor)
                .await
                .unwrap();
        }
        assert_eq!(f.svc.delete_for_case(f.case.id).await.unwrap(), 2);
        assert!(f.blobs.keys().is_empty());
        assert!(f.svc.list(f.case.id).await.unwrap().is_empty());
    }
}
