//! File/attachment service over the storage collaborator. Task files upload
//! under a path keyed by the owning task; attachments for tasks that have not
//! been persisted yet live in an explicit draft set and are promoted to table
//! rows when the creation flow assigns the task a durable id.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use models::{Attachment, AttachmentTarget, UpdateProfile};
use remote::{AVATARS_BUCKET, RemoteError, StorageApi, TASK_FILES_BUCKET, UploadOptions};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use super::gateway::Gateway;

#[derive(Debug, Error)]
pub enum FileServiceError {
    #[error("invalid file payload: {0}")]
    InvalidPayload(String),
    #[error("attachment {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub struct FileService {
    storage: Arc<dyn StorageApi>,
    gateway: Gateway,
    drafts: DashMap<Uuid, Vec<Attachment>>,
}

impl FileService {
    pub fn new(storage: Arc<dyn StorageApi>, gateway: Gateway) -> Self {
        Self {
            storage,
            gateway,
            drafts: DashMap::new(),
        }
    }

    /// Creates the named buckets if the project does not have them yet.
    pub async fn ensure_buckets(&self) -> Result<(), FileServiceError> {
        let existing = self.storage.list_buckets().await?;
        for bucket in [AVATARS_BUCKET, TASK_FILES_BUCKET] {
            if !existing.iter().any(|b| b.name == bucket) {
                self.storage.create_bucket(bucket, true).await?;
            }
        }
        Ok(())
    }

    pub async fn attach(
        &self,
        target: AttachmentTarget,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Attachment, FileServiceError> {
        if name.trim().is_empty() {
            return Err(FileServiceError::InvalidPayload(
                "file name must not be empty".to_string(),
            ));
        }

        let path = match target {
            AttachmentTarget::Task(task_id) => format!("{task_id}/{name}"),
            AttachmentTarget::Draft(draft_id) => format!("drafts/{draft_id}/{name}"),
        };
        let size = bytes.len() as i64;
        self.storage
            .upload(
                TASK_FILES_BUCKET,
                &path,
                bytes,
                content_type,
                UploadOptions::default(),
            )
            .await?;
        let url = self.storage.public_url(TASK_FILES_BUCKET, &path);

        let attachment = Attachment {
            id: Uuid::new_v4(),
            task_id: match target {
                AttachmentTarget::Task(task_id) => Some(task_id),
                AttachmentTarget::Draft(_) => None,
            },
            name: name.to_string(),
            url,
            size,
            content_type: content_type.to_string(),
            created_at: Utc::now(),
        };

        match target {
            AttachmentTarget::Task(task_id) => {
                Ok(self.gateway.create_attachment(task_id, &attachment).await?)
            }
            AttachmentTarget::Draft(draft_id) => {
                self.drafts
                    .entry(draft_id)
                    .or_default()
                    .push(attachment.clone());
                Ok(attachment)
            }
        }
    }

    pub fn draft_attachments(&self, draft_id: Uuid) -> Vec<Attachment> {
        self.drafts
            .get(&draft_id)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    /// Moves a draft's attachments into the task's row set. Called by the
    /// task creation flow once the task has a durable id; a draft that is
    /// never promoted is discarded with its uploads intact.
    pub async fn promote_drafts(
        &self,
        draft_id: Uuid,
        task_id: Uuid,
    ) -> Result<Vec<Attachment>, FileServiceError> {
        let Some((_, pending)) = self.drafts.remove(&draft_id) else {
            return Ok(Vec::new());
        };
        let mut promoted = Vec::with_capacity(pending.len());
        for attachment in pending {
            match self.gateway.create_attachment(task_id, &attachment).await {
                Ok(stored) => promoted.push(stored),
                Err(err) => {
                    warn!(attachment = %attachment.name, error = %err, "draft promotion failed");
                    return Err(err.into());
                }
            }
        }
        Ok(promoted)
    }

    pub async fn delete_attachment(
        &self,
        task_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<(), FileServiceError> {
        let attachments = self.gateway.attachments_for_task(task_id).await?;
        let attachment = attachments
            .into_iter()
            .find(|a| a.id == attachment_id)
            .ok_or(FileServiceError::NotFound(attachment_id))?;

        self.gateway.delete_attachment(attachment_id).await?;
        match object_path(&attachment.url) {
            Some(path) => {
                if let Err(err) = self
                    .storage
                    .remove(TASK_FILES_BUCKET, &[path.to_string()])
                    .await
                {
                    warn!(attachment = %attachment.name, error = %err, "storage removal failed");
                }
            }
            None => {
                warn!(attachment = %attachment.name, url = %attachment.url, "no storage path in attachment url");
            }
        }
        Ok(())
    }

    pub async fn upload_avatar(
        &self,
        user_id: Uuid,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, FileServiceError> {
        let path = format!("{user_id}/{name}");
        self.storage
            .upload(
                AVATARS_BUCKET,
                &path,
                bytes,
                content_type,
                UploadOptions::default(),
            )
            .await?;
        let url = self.storage.public_url(AVATARS_BUCKET, &path);
        self.gateway
            .update_profile(
                user_id,
                UpdateProfile {
                    avatar_url: Some(url.clone()),
                    ..UpdateProfile::default()
                },
            )
            .await?;
        Ok(url)
    }
}

/// Storage object path of a task file, recovered from its public URL.
/// Attachments uploaded as drafts keep their `drafts/{draft_id}/…` path after
/// promotion, so the path cannot be rebuilt from the owning task id.
fn object_path(url: &str) -> Option<&str> {
    let marker = format!("/{TASK_FILES_BUCKET}/");
    url.split_once(marker.as_str()).map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use remote::MemoryRemote;
    use serde_json::json;

    use super::*;

    fn service_with(remote: Arc<MemoryRemote>) -> FileService {
        FileService::new(remote.clone(), Gateway::new(remote))
    }

    #[tokio::test]
    async fn attaching_to_a_task_stores_a_row() {
        let remote = Arc::new(MemoryRemote::new());
        let service = service_with(remote.clone());
        let task_id = Uuid::new_v4();

        let attachment = service
            .attach(
                AttachmentTarget::Task(task_id),
                "notes.txt",
                "text/plain",
                b"hello".to_vec(),
            )
            .await
            .unwrap();

        assert_eq!(attachment.task_id, Some(task_id));
        assert_eq!(remote.rows("task_files").len(), 1);
        assert!(
            remote
                .object(TASK_FILES_BUCKET, &format!("{task_id}/notes.txt"))
                .is_some()
        );
    }

    #[tokio::test]
    async fn draft_attachments_promote_to_task_rows() {
        let remote = Arc::new(MemoryRemote::new());
        let service = service_with(remote.clone());
        let draft_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();

        service
            .attach(
                AttachmentTarget::Draft(draft_id),
                "brief.pdf",
                "application/pdf",
                vec![1, 2, 3],
            )
            .await
            .unwrap();
        assert!(remote.rows("task_files").is_empty());
        assert_eq!(service.draft_attachments(draft_id).len(), 1);

        let promoted = service.promote_drafts(draft_id, task_id).await.unwrap();
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].task_id, Some(task_id));
        assert_eq!(remote.rows("task_files").len(), 1);
        assert!(service.draft_attachments(draft_id).is_empty());
    }

    #[tokio::test]
    async fn deleting_a_promoted_attachment_removes_the_draft_object() {
        let remote = Arc::new(MemoryRemote::new());
        let service = service_with(remote.clone());
        let draft_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();

        service
            .attach(
                AttachmentTarget::Draft(draft_id),
                "brief.pdf",
                "application/pdf",
                vec![1, 2, 3],
            )
            .await
            .unwrap();
        let promoted = service.promote_drafts(draft_id, task_id).await.unwrap();
        let stored_path = format!("drafts/{draft_id}/brief.pdf");
        assert!(remote.object(TASK_FILES_BUCKET, &stored_path).is_some());

        service
            .delete_attachment(task_id, promoted[0].id)
            .await
            .unwrap();

        assert!(remote.rows("task_files").is_empty());
        assert!(remote.object(TASK_FILES_BUCKET, &stored_path).is_none());
    }

    #[tokio::test]
    async fn avatar_upload_updates_the_profile() {
        let remote = Arc::new(MemoryRemote::new());
        let user_id = Uuid::new_v4();
        remote.seed(
            "profiles",
            vec![json!({
                "id": user_id.to_string(),
                "name": "Sam",
                "email": "sam@taskboard.dev",
                "role": "user",
                "job_title": null,
                "avatar_url": null,
                "organization_id": null,
            })],
        );
        let service = service_with(remote.clone());

        let url = service
            .upload_avatar(user_id, "me.png", "image/png", vec![0])
            .await
            .unwrap();
        assert_eq!(remote.rows("profiles")[0]["avatar_url"], json!(url));
    }
}
