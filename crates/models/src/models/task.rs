use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::{attachment::Attachment, label::Label, profile::Profile};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub column_id: Uuid,
    pub project_id: Uuid,
    pub owner_id: Uuid,
    /// Dense, zero-based position within the owning column.
    pub order: i32,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// The only two completion states are active and completed. Marking a
    /// task complete stamps `completed_at`; reverting clears it. No other
    /// field is touched by the transition.
    pub fn set_completion(&mut self, completed: bool, at: Option<DateTime<Utc>>) {
        self.completed = completed;
        self.completed_at = if completed {
            Some(at.unwrap_or_else(Utc::now))
        } else {
            None
        };
    }
}

/// Label, assignee and file associations for one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssociations {
    pub labels: Vec<Label>,
    pub assignees: Vec<Profile>,
    pub files: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub label_ids: Option<Vec<Uuid>>,
    pub assignee_ids: Option<Vec<Uuid>>,
    /// Draft attachment set to promote once the task has a durable id.
    pub draft_id: Option<Uuid>,
}

impl CreateTask {
    pub fn from_title(title: String) -> Self {
        Self {
            title,
            description: None,
            due_date: None,
            label_ids: None,
            assignee_ids: None,
            draft_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub label_ids: Option<Vec<Uuid>>,
    pub assignee_ids: Option<Vec<Uuid>>,
}
