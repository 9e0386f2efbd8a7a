use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Where an uploaded file should be attached. Drafts hold attachments for a
/// task that has not been persisted yet; the draft set is promoted to task
/// rows once creation assigns a durable id. The distinction is explicit state,
/// never inferred from the shape of an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", tag = "kind", content = "id")]
pub enum AttachmentTarget {
    Draft(Uuid),
    Task(Uuid),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Uuid,
    pub task_id: Option<Uuid>,
    pub name: String,
    pub url: String,
    pub size: i64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttachment {
    pub target: AttachmentTarget,
    pub name: String,
    pub content_type: String,
    /// File bytes, base64-encoded by the SPA.
    pub data: String,
}
