//! Per-board write-intent queue. Every optimistic local mutation enqueues a
//! write descriptor; a single worker per board drains them in order, so rapid
//! successive drags on the same board serialize their remote effects instead
//! of racing. Failed order writes are repaired by re-normalizing the affected
//! container to a dense permutation, and every outcome is surfaced to
//! subscribers instead of being silently logged away.

use std::{sync::Arc, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use models::{BoardColumn, Task};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use super::gateway::Gateway;
use remote::RemoteError;

const MAX_RETRIES: usize = 2;
const OUTCOME_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum WriteIntent {
    CreateColumn(BoardColumn),
    RenameColumn { id: Uuid, title: String },
    DeleteColumn { id: Uuid },
    ReorderColumns { project_id: Uuid, orders: Vec<(Uuid, i32)> },
    CreateTask(Task),
    UpdateTaskFields { id: Uuid, patch: Value },
    DeleteTask { id: Uuid },
    SetTaskColumn { task_id: Uuid, column_id: Uuid, order: i32 },
    ReorderTasks { column_id: Uuid, orders: Vec<(Uuid, i32)> },
    SetCompletion {
        task_id: Uuid,
        completed: bool,
        completed_at: Option<DateTime<Utc>>,
    },
    SyncLabels { task_id: Uuid, labels: Vec<Uuid> },
    SyncAssignees { task_id: Uuid, assignees: Vec<Uuid> },
    /// Compensating repair: re-read the column and rewrite a dense order
    /// permutation after an order write was lost.
    RenormalizeColumn { column_id: Uuid },
}

impl WriteIntent {
    pub fn describe(&self) -> String {
        match self {
            WriteIntent::CreateColumn(column) => format!("create column '{}'", column.title),
            WriteIntent::RenameColumn { id, .. } => format!("rename column {id}"),
            WriteIntent::DeleteColumn { id } => format!("delete column {id}"),
            WriteIntent::ReorderColumns { project_id, .. } => {
                format!("reorder columns of project {project_id}")
            }
            WriteIntent::CreateTask(task) => format!("create task '{}'", task.title),
            WriteIntent::UpdateTaskFields { id, .. } => format!("update task {id}"),
            WriteIntent::DeleteTask { id } => format!("delete task {id}"),
            WriteIntent::SetTaskColumn { task_id, column_id, .. } => {
                format!("move task {task_id} to column {column_id}")
            }
            WriteIntent::ReorderTasks { column_id, .. } => {
                format!("reorder tasks of column {column_id}")
            }
            WriteIntent::SetCompletion { task_id, completed, .. } => {
                format!("set task {task_id} completed={completed}")
            }
            WriteIntent::SyncLabels { task_id, .. } => format!("sync labels of task {task_id}"),
            WriteIntent::SyncAssignees { task_id, .. } => {
                format!("sync assignees of task {task_id}")
            }
            WriteIntent::RenormalizeColumn { column_id } => {
                format!("renormalize column {column_id}")
            }
        }
    }

    /// Container to renormalize when this intent's order write is lost.
    fn repair_target(&self) -> Option<Uuid> {
        match self {
            WriteIntent::ReorderTasks { column_id, .. } => Some(*column_id),
            WriteIntent::SetTaskColumn { column_id, .. } => Some(*column_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum WriteOutcome {
    Applied { description: String },
    Repaired { description: String, column_id: Uuid },
    Failed { description: String, error: String },
}

enum Message {
    Intent(WriteIntent),
    Flush(oneshot::Sender<()>),
}

/// Handle to one board's write worker.
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<Message>,
    outcomes: broadcast::Sender<WriteOutcome>,
}

impl WriteQueue {
    pub fn spawn(gateway: Gateway) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (outcomes, _) = broadcast::channel(OUTCOME_CAPACITY);
        let worker_outcomes = outcomes.clone();
        tokio::spawn(async move {
            drain(gateway, rx, worker_outcomes).await;
        });
        Arc::new(Self { tx, outcomes })
    }

    /// Fire-and-forget from the caller's perspective; ordering and retries
    /// are the worker's responsibility.
    pub fn enqueue(&self, intent: WriteIntent) {
        debug!(intent = %intent.describe(), "enqueue write intent");
        let _ = self.tx.send(Message::Intent(intent));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WriteOutcome> {
        self.outcomes.subscribe()
    }

    /// Resolves once every intent enqueued before this call has been drained.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Message::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn drain(
    gateway: Gateway,
    mut rx: mpsc::UnboundedReceiver<Message>,
    outcomes: broadcast::Sender<WriteOutcome>,
) {
    while let Some(message) = rx.recv().await {
        let intent = match message {
            Message::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            Message::Intent(intent) => intent,
        };

        let description = intent.describe();
        let attempt = || async { apply(&gateway, &intent).await };
        let result = attempt
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(50))
                    .with_max_times(MAX_RETRIES),
            )
            .await;

        let outcome = match result {
            Ok(()) => WriteOutcome::Applied { description },
            Err(err) => {
                warn!(intent = %description, error = %err, "write intent exhausted retries");
                match intent.repair_target() {
                    Some(column_id) => match renormalize(&gateway, column_id).await {
                        Ok(()) => WriteOutcome::Repaired {
                            description,
                            column_id,
                        },
                        Err(repair_err) => {
                            warn!(column_id = %column_id, error = %repair_err, "renormalize failed");
                            WriteOutcome::Failed {
                                description,
                                error: repair_err.to_string(),
                            }
                        }
                    },
                    None => WriteOutcome::Failed {
                        description,
                        error: err.to_string(),
                    },
                }
            }
        };
        let _ = outcomes.send(outcome);
    }
}

async fn apply(gateway: &Gateway, intent: &WriteIntent) -> Result<(), RemoteError> {
    match intent {
        WriteIntent::CreateColumn(column) => {
            gateway.create_column(column).await?;
        }
        WriteIntent::RenameColumn { id, title } => {
            gateway.rename_column(*id, title).await?;
        }
        WriteIntent::DeleteColumn { id } => {
            gateway.delete_column(*id).await?;
        }
        WriteIntent::ReorderColumns { project_id, orders } => {
            gateway.reorder_columns(*project_id, orders).await?;
        }
        WriteIntent::CreateTask(task) => {
            gateway.create_task(task).await?;
        }
        WriteIntent::UpdateTaskFields { id, patch } => {
            gateway.update_task_fields(*id, patch.clone()).await?;
        }
        WriteIntent::DeleteTask { id } => {
            gateway.delete_task(*id).await?;
        }
        WriteIntent::SetTaskColumn {
            task_id,
            column_id,
            order,
        } => {
            gateway
                .update_task_fields(
                    *task_id,
                    serde_json::json!({
                        "column_id": column_id,
                        "order": order,
                        "updated_at": Utc::now(),
                    }),
                )
                .await?;
        }
        WriteIntent::ReorderTasks { column_id, orders } => {
            gateway.reorder_tasks(*column_id, orders).await?;
        }
        WriteIntent::SetCompletion {
            task_id,
            completed,
            completed_at,
        } => {
            gateway
                .set_task_completion(*task_id, *completed, *completed_at)
                .await?;
        }
        WriteIntent::SyncLabels { task_id, labels } => {
            gateway.sync_task_labels(*task_id, labels).await?;
        }
        WriteIntent::SyncAssignees { task_id, assignees } => {
            gateway.sync_task_assignees(*task_id, assignees).await?;
        }
        WriteIntent::RenormalizeColumn { column_id } => {
            renormalize(gateway, *column_id).await?;
        }
    }
    Ok(())
}

/// Reads the column's tasks in their stored order and rewrites a dense
/// 0..N-1 permutation over them.
async fn renormalize(gateway: &Gateway, column_id: Uuid) -> Result<(), RemoteError> {
    let tasks = gateway.tasks_for_column(column_id).await?;
    let orders: Vec<(Uuid, i32)> = tasks
        .iter()
        .enumerate()
        .map(|(index, task)| (task.id, index as i32))
        .collect();
    gateway.reorder_tasks(column_id, &orders).await
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use models::Task;
    use remote::MemoryRemote;
    use serde_json::json;

    use super::*;

    fn seed_task(remote: &MemoryRemote, id: Uuid, column: Uuid, order: i32) {
        remote.seed(
            "tasks",
            vec![json!({
                "id": id.to_string(),
                "title": "t",
                "description": null,
                "column_id": column.to_string(),
                "project_id": Uuid::new_v4().to_string(),
                "owner_id": Uuid::new_v4().to_string(),
                "order": order,
                "due_date": null,
                "completed": false,
                "completed_at": null,
                "created_at": Utc::now(),
                "updated_at": Utc::now(),
            })],
        );
    }

    #[tokio::test]
    async fn transient_failure_is_retried_to_applied() {
        let remote = Arc::new(MemoryRemote::new());
        let column = Uuid::new_v4();
        let task = Uuid::new_v4();
        seed_task(&remote, task, column, 0);
        remote.inject_failures("tasks", 1);

        let queue = WriteQueue::spawn(Gateway::new(remote.clone()));
        let mut outcomes = queue.subscribe();
        queue.enqueue(WriteIntent::ReorderTasks {
            column_id: column,
            orders: vec![(task, 3)],
        });
        queue.flush().await;

        assert!(matches!(
            outcomes.recv().await.unwrap(),
            WriteOutcome::Applied { .. }
        ));
        assert_eq!(remote.rows("tasks")[0]["order"], json!(3));
    }

    #[tokio::test]
    async fn exhausted_retries_trigger_renormalize_repair() {
        let remote = Arc::new(MemoryRemote::new());
        let column = Uuid::new_v4();
        let task = Uuid::new_v4();
        seed_task(&remote, task, column, 7);
        // one initial attempt plus MAX_RETRIES retries, then repair succeeds
        remote.inject_failures("tasks", MAX_RETRIES + 1);

        let queue = WriteQueue::spawn(Gateway::new(remote.clone()));
        let mut outcomes = queue.subscribe();
        queue.enqueue(WriteIntent::ReorderTasks {
            column_id: column,
            orders: vec![(task, 1)],
        });
        queue.flush().await;

        match outcomes.recv().await.unwrap() {
            WriteOutcome::Repaired { column_id, .. } => assert_eq!(column_id, column),
            other => panic!("expected repair, got {other:?}"),
        }
        // repair rewrote a dense permutation over the single task
        assert_eq!(remote.rows("tasks")[0]["order"], json!(0));
    }

    #[tokio::test]
    async fn intents_drain_in_submission_order() {
        let remote = Arc::new(MemoryRemote::new());
        let column = Uuid::new_v4();
        let task = Uuid::new_v4();
        seed_task(&remote, task, column, 0);

        let queue = WriteQueue::spawn(Gateway::new(remote.clone()));
        for order in 1..=5 {
            queue.enqueue(WriteIntent::ReorderTasks {
                column_id: column,
                orders: vec![(task, order)],
            });
        }
        queue.flush().await;
        assert_eq!(remote.rows("tasks")[0]["order"], json!(5));
    }

    #[tokio::test]
    async fn create_task_intent_persists_row() {
        let remote = Arc::new(MemoryRemote::new());
        let queue = WriteQueue::spawn(Gateway::new(remote.clone()));
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: "write me".to_string(),
            description: None,
            column_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            order: 0,
            due_date: None,
            completed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        queue.enqueue(WriteIntent::CreateTask(task.clone()));
        queue.flush().await;
        assert_eq!(remote.rows("tasks").len(), 1);
        assert_eq!(remote.rows("tasks")[0]["title"], json!("write me"));
    }
}
