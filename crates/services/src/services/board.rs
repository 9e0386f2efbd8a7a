//! Board state container: the authoritative-for-the-session, in-memory
//! representation of one project's columns and tasks. User actions mutate the
//! local state synchronously for a responsive UI, then enqueue write intents
//! that persist the mutation through the board's write queue. One container
//! exists per open board; the remote store is the only point of cross-session
//! consistency.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use models::{
    BoardColumn, Capability, CreateTask, Role, Task, UpdateTask,
};
use remote::RemoteError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    gateway::Gateway,
    queue::{WriteIntent, WriteOutcome, WriteQueue},
    session::Identity,
};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("operation requires the {0} capability")]
    Forbidden(Capability),
    #[error("column title must not be empty")]
    EmptyTitle,
    #[error("unknown column {0}")]
    UnknownColumn(Uuid),
    #[error("unknown task {0}")]
    UnknownTask(Uuid),
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum DragKind {
    Column,
    Task,
}

/// Drag-and-drop result as the SPA reports it. `destination_*` are absent
/// when the item was dropped outside any droppable area.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub kind: DragKind,
    /// Column id for task drags, project id for column drags.
    pub source_container: Uuid,
    pub source_index: usize,
    pub destination_container: Option<Uuid>,
    pub destination_index: Option<usize>,
}

/// User-visible description of a completed local move, emitted regardless of
/// whether the remote writes have finished or succeeded.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct BoardNotice {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub moved: bool,
    pub notice: Option<BoardNotice>,
}

impl MoveOutcome {
    fn unchanged() -> Self {
        Self {
            moved: false,
            notice: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ColumnState {
    pub column: BoardColumn,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub project_id: Uuid,
    pub columns: Vec<ColumnState>,
}

pub struct BoardService {
    project_id: Uuid,
    gateway: Gateway,
    queue: Arc<WriteQueue>,
    state: RwLock<Vec<ColumnState>>,
}

impl BoardService {
    /// Loads the project's board from the remote store and starts its write
    /// worker.
    pub async fn open(gateway: Gateway, project_id: Uuid) -> Result<Arc<Self>, BoardError> {
        let queue = WriteQueue::spawn(gateway.clone());
        let service = Arc::new(Self {
            project_id,
            gateway,
            queue,
            state: RwLock::new(Vec::new()),
        });
        service.reload().await?;
        Ok(service)
    }

    /// Re-fetches columns and tasks; loading twice with no intervening
    /// mutation yields identical ordered sequences.
    pub async fn reload(&self) -> Result<BoardSnapshot, BoardError> {
        let columns = self.gateway.columns_for_project(self.project_id).await?;
        let tasks = self.gateway.tasks_for_project(self.project_id).await?;

        let mut fresh: Vec<ColumnState> = columns
            .into_iter()
            .map(|column| ColumnState {
                column,
                tasks: Vec::new(),
            })
            .collect();
        for task in tasks {
            if let Some(entry) = fresh.iter_mut().find(|c| c.column.id == task.column_id) {
                entry.tasks.push(task);
            }
        }
        for entry in &mut fresh {
            entry.tasks.sort_by_key(|task| task.order);
        }

        let mut state = self.state.write().await;
        *state = fresh;
        Ok(BoardSnapshot {
            project_id: self.project_id,
            columns: state.clone(),
        })
    }

    pub async fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            project_id: self.project_id,
            columns: self.state.read().await.clone(),
        }
    }

    pub fn subscribe_outcomes(&self) -> tokio::sync::broadcast::Receiver<WriteOutcome> {
        self.queue.subscribe()
    }

    /// Awaits the drain of every write enqueued so far.
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// Applies a drag-and-drop result: splice the local sequences, then
    /// enqueue the remote writes that persist the new order.
    pub async fn move_item(&self, request: MoveRequest) -> Result<MoveOutcome, BoardError> {
        let (Some(dest_container), Some(dest_index)) =
            (request.destination_container, request.destination_index)
        else {
            return Ok(MoveOutcome::unchanged());
        };
        if dest_container == request.source_container && dest_index == request.source_index {
            return Ok(MoveOutcome::unchanged());
        }

        match request.kind {
            DragKind::Column => {
                self.move_column(request.source_index, dest_index).await
            }
            DragKind::Task => {
                self.move_task(
                    request.source_container,
                    request.source_index,
                    dest_container,
                    dest_index,
                )
                .await
            }
        }
    }

    async fn move_column(
        &self,
        source_index: usize,
        dest_index: usize,
    ) -> Result<MoveOutcome, BoardError> {
        let mut state = self.state.write().await;
        let len = state.len();
        if source_index >= len {
            return Err(BoardError::IndexOutOfBounds {
                index: source_index,
                len,
            });
        }
        let dest_index = dest_index.min(len - 1);

        let entry = state.remove(source_index);
        let title = entry.column.title.clone();
        state.insert(dest_index, entry);
        let orders = renumber_columns(&mut state);
        drop(state);

        self.queue.enqueue(WriteIntent::ReorderColumns {
            project_id: self.project_id,
            orders,
        });

        info!(project_id = %self.project_id, %title, from = source_index, to = dest_index, "column moved");
        Ok(MoveOutcome {
            moved: true,
            notice: Some(BoardNotice {
                message: format!(
                    "Moved column '{title}' from position {} to {}",
                    source_index + 1,
                    dest_index + 1
                ),
            }),
        })
    }

    async fn move_task(
        &self,
        source_column: Uuid,
        source_index: usize,
        dest_column: Uuid,
        dest_index: usize,
    ) -> Result<MoveOutcome, BoardError> {
        let mut state = self.state.write().await;

        let source_pos = state
            .iter()
            .position(|c| c.column.id == source_column)
            .ok_or(BoardError::UnknownColumn(source_column))?;
        if source_index >= state[source_pos].tasks.len() {
            return Err(BoardError::IndexOutOfBounds {
                index: source_index,
                len: state[source_pos].tasks.len(),
            });
        }

        if source_column == dest_column {
            let tasks = &mut state[source_pos].tasks;
            let dest_index = dest_index.min(tasks.len() - 1);
            let task = tasks.remove(source_index);
            let title = task.title.clone();
            tasks.insert(dest_index, task);
            let orders = renumber_tasks(tasks);
            let column_title = state[source_pos].column.title.clone();
            drop(state);

            self.queue.enqueue(WriteIntent::ReorderTasks {
                column_id: source_column,
                orders,
            });

            return Ok(MoveOutcome {
                moved: true,
                notice: Some(BoardNotice {
                    message: format!(
                        "Moved '{title}' from position {} to {} in '{column_title}'",
                        source_index + 1,
                        dest_index + 1
                    ),
                }),
            });
        }

        let dest_pos = state
            .iter()
            .position(|c| c.column.id == dest_column)
            .ok_or(BoardError::UnknownColumn(dest_column))?;

        let mut task = state[source_pos].tasks.remove(source_index);
        let title = task.title.clone();
        task.column_id = dest_column;
        let dest_index = dest_index.min(state[dest_pos].tasks.len());
        state[dest_pos].tasks.insert(dest_index, task);

        let source_orders = renumber_tasks(&mut state[source_pos].tasks);
        let dest_orders = renumber_tasks(&mut state[dest_pos].tasks);
        let task_id = state[dest_pos].tasks[dest_index].id;
        let source_title = state[source_pos].column.title.clone();
        let dest_title = state[dest_pos].column.title.clone();
        drop(state);

        // Three independent writes, serialized by the board's queue worker.
        self.queue.enqueue(WriteIntent::SetTaskColumn {
            task_id,
            column_id: dest_column,
            order: dest_index as i32,
        });
        self.queue.enqueue(WriteIntent::ReorderTasks {
            column_id: source_column,
            orders: source_orders,
        });
        self.queue.enqueue(WriteIntent::ReorderTasks {
            column_id: dest_column,
            orders: dest_orders,
        });

        info!(task_id = %task_id, from = %source_title, to = %dest_title, "task moved across columns");
        Ok(MoveOutcome {
            moved: true,
            notice: Some(BoardNotice {
                message: format!("Moved '{title}' from '{source_title}' to '{dest_title}'"),
            }),
        })
    }

    pub async fn add_column(
        &self,
        identity: &Identity,
        title: &str,
    ) -> Result<BoardColumn, BoardError> {
        require(identity.role, Capability::ManageColumns)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::EmptyTitle);
        }

        let mut state = self.state.write().await;
        let now = Utc::now();
        let column = BoardColumn {
            id: Uuid::new_v4(),
            title: title.to_string(),
            project_id: self.project_id,
            order: state.len() as i32,
            created_at: now,
            updated_at: now,
        };
        state.push(ColumnState {
            column: column.clone(),
            tasks: Vec::new(),
        });
        drop(state);

        self.queue.enqueue(WriteIntent::CreateColumn(column.clone()));
        Ok(column)
    }

    pub async fn edit_column(
        &self,
        identity: &Identity,
        column_id: Uuid,
        title: &str,
    ) -> Result<BoardColumn, BoardError> {
        require(identity.role, Capability::ManageColumns)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::EmptyTitle);
        }

        let mut state = self.state.write().await;
        let entry = state
            .iter_mut()
            .find(|c| c.column.id == column_id)
            .ok_or(BoardError::UnknownColumn(column_id))?;
        entry.column.title = title.to_string();
        entry.column.updated_at = Utc::now();
        let column = entry.column.clone();
        drop(state);

        self.queue.enqueue(WriteIntent::RenameColumn {
            id: column_id,
            title: title.to_string(),
        });
        Ok(column)
    }

    /// Removes the column locally and enqueues the remote delete; the task
    /// cascade happens in the remote store.
    pub async fn delete_column(
        &self,
        identity: &Identity,
        column_id: Uuid,
    ) -> Result<(), BoardError> {
        require(identity.role, Capability::ManageColumns)?;

        let mut state = self.state.write().await;
        let pos = state
            .iter()
            .position(|c| c.column.id == column_id)
            .ok_or(BoardError::UnknownColumn(column_id))?;
        state.remove(pos);
        let orders = renumber_columns(&mut state);
        drop(state);

        self.queue.enqueue(WriteIntent::DeleteColumn { id: column_id });
        self.queue.enqueue(WriteIntent::ReorderColumns {
            project_id: self.project_id,
            orders,
        });
        Ok(())
    }

    pub async fn add_task(
        &self,
        identity: &Identity,
        column_id: Uuid,
        data: CreateTask,
    ) -> Result<Task, BoardError> {
        require(identity.role, Capability::EditTasks)?;
        if data.title.trim().is_empty() {
            return Err(BoardError::EmptyTitle);
        }

        let mut state = self.state.write().await;
        let entry = state
            .iter_mut()
            .find(|c| c.column.id == column_id)
            .ok_or(BoardError::UnknownColumn(column_id))?;
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: data.title.trim().to_string(),
            description: data.description.clone(),
            column_id,
            project_id: self.project_id,
            owner_id: identity.user_id,
            order: entry.tasks.len() as i32,
            due_date: data.due_date,
            completed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        entry.tasks.push(task.clone());
        drop(state);

        self.queue.enqueue(WriteIntent::CreateTask(task.clone()));
        if let Some(labels) = data.label_ids {
            self.queue.enqueue(WriteIntent::SyncLabels {
                task_id: task.id,
                labels,
            });
        }
        if let Some(assignees) = data.assignee_ids {
            self.queue.enqueue(WriteIntent::SyncAssignees {
                task_id: task.id,
                assignees,
            });
        }
        Ok(task)
    }

    pub async fn edit_task(
        &self,
        identity: &Identity,
        column_id: Uuid,
        task_id: Uuid,
        data: UpdateTask,
    ) -> Result<Task, BoardError> {
        require(identity.role, Capability::EditTasks)?;

        let mut state = self.state.write().await;
        let entry = state
            .iter_mut()
            .find(|c| c.column.id == column_id)
            .ok_or(BoardError::UnknownColumn(column_id))?;
        let task = entry
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or(BoardError::UnknownTask(task_id))?;

        let mut patch = serde_json::Map::new();
        patch.insert("updated_at".to_string(), serde_json::json!(Utc::now()));
        if let Some(title) = &data.title {
            task.title = title.clone();
            patch.insert("title".to_string(), serde_json::json!(title));
        }
        if let Some(description) = &data.description {
            task.description = Some(description.clone());
            patch.insert("description".to_string(), serde_json::json!(description));
        }
        if let Some(due_date) = data.due_date {
            task.due_date = Some(due_date);
            patch.insert("due_date".to_string(), serde_json::json!(due_date));
        }
        task.updated_at = Utc::now();
        let task = task.clone();
        drop(state);

        self.queue.enqueue(WriteIntent::UpdateTaskFields {
            id: task_id,
            patch: serde_json::Value::Object(patch),
        });
        if let Some(labels) = data.label_ids {
            self.queue
                .enqueue(WriteIntent::SyncLabels { task_id, labels });
        }
        if let Some(assignees) = data.assignee_ids {
            self.queue
                .enqueue(WriteIntent::SyncAssignees { task_id, assignees });
        }
        Ok(task)
    }

    /// Owners may delete their own tasks; deleting someone else's requires
    /// the admin capability.
    pub async fn delete_task(
        &self,
        identity: &Identity,
        column_id: Uuid,
        task_id: Uuid,
    ) -> Result<(), BoardError> {
        let mut state = self.state.write().await;
        let entry = state
            .iter_mut()
            .find(|c| c.column.id == column_id)
            .ok_or(BoardError::UnknownColumn(column_id))?;
        let pos = entry
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or(BoardError::UnknownTask(task_id))?;
        if entry.tasks[pos].owner_id != identity.user_id {
            require(identity.role, Capability::DeleteAnyTask)?;
        }
        entry.tasks.remove(pos);
        let orders = renumber_tasks(&mut entry.tasks);
        drop(state);

        self.queue.enqueue(WriteIntent::DeleteTask { id: task_id });
        self.queue.enqueue(WriteIntent::ReorderTasks {
            column_id,
            orders,
        });
        Ok(())
    }

    pub async fn set_task_completion(
        &self,
        identity: &Identity,
        column_id: Uuid,
        task_id: Uuid,
        completed: bool,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Task, BoardError> {
        require(identity.role, Capability::EditTasks)?;

        let mut state = self.state.write().await;
        let entry = state
            .iter_mut()
            .find(|c| c.column.id == column_id)
            .ok_or(BoardError::UnknownColumn(column_id))?;
        let task = entry
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or(BoardError::UnknownTask(task_id))?;
        task.set_completion(completed, completed_at);
        let completed_at = task.completed_at;
        let task = task.clone();
        drop(state);

        self.queue.enqueue(WriteIntent::SetCompletion {
            task_id,
            completed,
            completed_at,
        });
        Ok(task)
    }
}

fn require(role: Role, capability: Capability) -> Result<(), BoardError> {
    if role.allows(capability) {
        Ok(())
    } else {
        Err(BoardError::Forbidden(capability))
    }
}

fn renumber_columns(state: &mut [ColumnState]) -> Vec<(Uuid, i32)> {
    state
        .iter_mut()
        .enumerate()
        .map(|(index, entry)| {
            entry.column.order = index as i32;
            (entry.column.id, index as i32)
        })
        .collect()
}

fn renumber_tasks(tasks: &mut [Task]) -> Vec<(Uuid, i32)> {
    tasks
        .iter_mut()
        .enumerate()
        .map(|(index, task)| {
            task.order = index as i32;
            (task.id, index as i32)
        })
        .collect()
}

/// One board container per open project. Two registries (or two processes)
/// pointed at the same project do not share live edits; the remote store is
/// the only reconciliation point.
pub struct BoardRegistry {
    gateway: Gateway,
    boards: DashMap<Uuid, Arc<BoardService>>,
}

impl BoardRegistry {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            boards: DashMap::new(),
        }
    }

    pub async fn open(&self, project_id: Uuid) -> Result<Arc<BoardService>, BoardError> {
        if let Some(board) = self.boards.get(&project_id) {
            return Ok(board.clone());
        }
        let board = BoardService::open(self.gateway.clone(), project_id).await?;
        // Concurrent opens race to this point; the entry decides the winner
        // and the loser's instance is dropped, which shuts down its worker.
        Ok(self.boards.entry(project_id).or_insert(board).clone())
    }

    pub fn close(&self, project_id: Uuid) {
        self.boards.remove(&project_id);
    }
}

#[cfg(test)]
mod tests {
    use remote::MemoryRemote;
    use serde_json::{Value, json};

    use super::*;

    fn column_row(id: Uuid, project_id: Uuid, title: &str, order: i32) -> Value {
        json!({
            "id": id.to_string(),
            "title": title,
            "project_id": project_id.to_string(),
            "order": order,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        })
    }

    fn task_row(id: Uuid, column_id: Uuid, project_id: Uuid, title: &str, order: i32) -> Value {
        json!({
            "id": id.to_string(),
            "title": title,
            "description": null,
            "column_id": column_id.to_string(),
            "project_id": project_id.to_string(),
            "owner_id": Uuid::new_v4().to_string(),
            "order": order,
            "due_date": null,
            "completed": false,
            "completed_at": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        })
    }

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "dev@taskboard.dev".to_string(),
            name: "Dev".to_string(),
            role,
            avatar_url: None,
        }
    }

    fn remote_orders(remote: &MemoryRemote) -> std::collections::HashMap<Uuid, i64> {
        remote
            .rows("tasks")
            .iter()
            .map(|row| {
                (
                    row["id"].as_str().unwrap().parse().unwrap(),
                    row["order"].as_i64().unwrap(),
                )
            })
            .collect()
    }

    async fn board_with(
        remote: &Arc<MemoryRemote>,
        project_id: Uuid,
    ) -> Arc<BoardService> {
        BoardService::open(Gateway::new(remote.clone()), project_id)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn same_column_move_persists_a_dense_permutation() {
        let remote = Arc::new(MemoryRemote::new());
        let project_id = Uuid::new_v4();
        let column_id = Uuid::new_v4();
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        remote.seed(
            "columns",
            vec![column_row(column_id, project_id, "Todo", 0)],
        );
        remote.seed(
            "tasks",
            ids.iter()
                .enumerate()
                .map(|(i, id)| task_row(*id, column_id, project_id, &format!("T{i}"), i as i32))
                .collect(),
        );
        let board = board_with(&remote, project_id).await;

        let outcome = board
            .move_item(MoveRequest {
                kind: DragKind::Task,
                source_container: column_id,
                source_index: 0,
                destination_container: Some(column_id),
                destination_index: Some(2),
            })
            .await
            .unwrap();
        assert!(outcome.moved);

        let snapshot = board.snapshot().await;
        let local: Vec<Uuid> = snapshot.columns[0].tasks.iter().map(|t| t.id).collect();
        assert_eq!(local, vec![ids[1], ids[2], ids[0], ids[3]]);

        board.flush().await;
        let orders = remote_orders(&remote);
        assert_eq!(orders[&ids[0]], 2);
        assert_eq!(orders[&ids[1]], 0);
        assert_eq!(orders[&ids[2]], 1);
        assert_eq!(orders[&ids[3]], 3);
    }

    #[tokio::test]
    async fn column_move_persists_a_dense_column_order() {
        let remote = Arc::new(MemoryRemote::new());
        let project_id = Uuid::new_v4();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        remote.seed(
            "columns",
            ids.iter()
                .enumerate()
                .map(|(i, id)| column_row(*id, project_id, &format!("C{i}"), i as i32))
                .collect(),
        );
        let board = board_with(&remote, project_id).await;

        let outcome = board
            .move_item(MoveRequest {
                kind: DragKind::Column,
                source_container: project_id,
                source_index: 0,
                destination_container: Some(project_id),
                destination_index: Some(2),
            })
            .await
            .unwrap();
        assert!(outcome.moved);

        let snapshot = board.snapshot().await;
        let local: Vec<Uuid> = snapshot.columns.iter().map(|c| c.column.id).collect();
        assert_eq!(local, vec![ids[1], ids[2], ids[0]]);

        board.flush().await;
        let persisted: std::collections::HashMap<Uuid, i64> = remote
            .rows("columns")
            .iter()
            .map(|row| {
                (
                    row["id"].as_str().unwrap().parse().unwrap(),
                    row["order"].as_i64().unwrap(),
                )
            })
            .collect();
        assert_eq!(persisted[&ids[1]], 0);
        assert_eq!(persisted[&ids[2]], 1);
        assert_eq!(persisted[&ids[0]], 2);
    }

    #[tokio::test]
    async fn concurrent_opens_share_one_board_instance() {
        let remote = Arc::new(MemoryRemote::new());
        let project_id = Uuid::new_v4();
        let registry = BoardRegistry::new(Gateway::new(remote.clone()));

        let (first, second) = tokio::join!(registry.open(project_id), registry.open(project_id));
        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    }

    #[tokio::test]
    async fn cross_column_move_renumbers_both_columns() {
        let remote = Arc::new(MemoryRemote::new());
        let project_id = Uuid::new_v4();
        let source = Uuid::new_v4();
        let dest = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        remote.seed(
            "columns",
            vec![
                column_row(source, project_id, "Todo", 0),
                column_row(dest, project_id, "Doing", 1),
            ],
        );
        remote.seed(
            "tasks",
            vec![
                task_row(a, source, project_id, "A", 0),
                task_row(b, source, project_id, "B", 1),
                task_row(x, dest, project_id, "X", 0),
                task_row(y, dest, project_id, "Y", 1),
            ],
        );
        let board = board_with(&remote, project_id).await;

        board
            .move_item(MoveRequest {
                kind: DragKind::Task,
                source_container: source,
                source_index: 0,
                destination_container: Some(dest),
                destination_index: Some(1),
            })
            .await
            .unwrap();
        board.flush().await;

        let orders = remote_orders(&remote);
        assert_eq!(orders[&b], 0);
        assert_eq!(orders[&x], 0);
        assert_eq!(orders[&a], 1);
        assert_eq!(orders[&y], 2);

        let moved = remote
            .rows("tasks")
            .into_iter()
            .find(|row| row["id"] == json!(a.to_string()))
            .unwrap();
        assert_eq!(moved["column_id"], json!(dest.to_string()));
    }

    #[tokio::test]
    async fn drop_without_destination_writes_nothing() {
        let remote = Arc::new(MemoryRemote::new());
        let project_id = Uuid::new_v4();
        let column_id = Uuid::new_v4();
        remote.seed(
            "columns",
            vec![column_row(column_id, project_id, "Todo", 0)],
        );
        remote.seed(
            "tasks",
            vec![task_row(Uuid::new_v4(), column_id, project_id, "A", 0)],
        );
        let board = board_with(&remote, project_id).await;

        let outcome = board
            .move_item(MoveRequest {
                kind: DragKind::Task,
                source_container: column_id,
                source_index: 0,
                destination_container: None,
                destination_index: None,
            })
            .await
            .unwrap();
        assert!(!outcome.moved);

        let outcome = board
            .move_item(MoveRequest {
                kind: DragKind::Task,
                source_container: column_id,
                source_index: 0,
                destination_container: Some(column_id),
                destination_index: Some(0),
            })
            .await
            .unwrap();
        assert!(!outcome.moved);

        board.flush().await;
        assert_eq!(remote.write_calls(), 0);
    }

    #[tokio::test]
    async fn reloading_twice_yields_identical_snapshots() {
        let remote = Arc::new(MemoryRemote::new());
        let project_id = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        remote.seed(
            "columns",
            vec![
                column_row(second, project_id, "Doing", 1),
                column_row(first, project_id, "Todo", 0),
            ],
        );
        remote.seed(
            "tasks",
            vec![
                task_row(Uuid::new_v4(), first, project_id, "B", 1),
                task_row(Uuid::new_v4(), first, project_id, "A", 0),
            ],
        );
        let board = board_with(&remote, project_id).await;

        let one = board.reload().await.unwrap();
        let two = board.reload().await.unwrap();
        assert_eq!(one.columns, two.columns);
        assert_eq!(one.columns[0].column.id, first);
        assert_eq!(one.columns[0].tasks[0].title, "A");
    }

    #[tokio::test]
    async fn non_admin_cannot_delete_columns() {
        let remote = Arc::new(MemoryRemote::new());
        let project_id = Uuid::new_v4();
        let column_id = Uuid::new_v4();
        remote.seed(
            "columns",
            vec![column_row(column_id, project_id, "Todo", 0)],
        );
        let board = board_with(&remote, project_id).await;

        let result = board.delete_column(&identity(Role::User), column_id).await;
        assert!(matches!(
            result,
            Err(BoardError::Forbidden(Capability::ManageColumns))
        ));

        board
            .delete_column(&identity(Role::Admin), column_id)
            .await
            .unwrap();
        board.flush().await;
        assert!(remote.rows("columns").is_empty());
    }

    #[tokio::test]
    async fn completion_toggle_stamps_and_clears_completed_at() {
        let remote = Arc::new(MemoryRemote::new());
        let project_id = Uuid::new_v4();
        let column_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        remote.seed(
            "columns",
            vec![column_row(column_id, project_id, "Todo", 0)],
        );
        remote.seed(
            "tasks",
            vec![task_row(task_id, column_id, project_id, "A", 0)],
        );
        let board = board_with(&remote, project_id).await;
        let admin = identity(Role::Admin);

        let task = board
            .set_task_completion(&admin, column_id, task_id, true, None)
            .await
            .unwrap();
        assert!(task.completed);
        assert!(task.completed_at.is_some());
        board.flush().await;
        let row = &remote.rows("tasks")[0];
        assert_eq!(row["completed"], json!(true));
        assert!(!row["completed_at"].is_null());

        let task = board
            .set_task_completion(&admin, column_id, task_id, false, None)
            .await
            .unwrap();
        assert!(task.completed_at.is_none());
        board.flush().await;
        assert_eq!(remote.rows("tasks")[0]["completed_at"], json!(null));
    }

    #[tokio::test]
    async fn add_task_enqueues_association_sync() {
        let remote = Arc::new(MemoryRemote::new());
        let project_id = Uuid::new_v4();
        let column_id = Uuid::new_v4();
        let label = Uuid::new_v4();
        remote.seed(
            "columns",
            vec![column_row(column_id, project_id, "Todo", 0)],
        );
        let board = board_with(&remote, project_id).await;

        let mut data = CreateTask::from_title("Write docs".to_string());
        data.label_ids = Some(vec![label]);
        let task = board
            .add_task(&identity(Role::User), column_id, data)
            .await
            .unwrap();
        board.flush().await;

        assert_eq!(remote.rows("tasks").len(), 1);
        let joins = remote.rows("task_labels");
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0]["task_id"], json!(task.id.to_string()));
        assert_eq!(joins[0]["label_id"], json!(label.to_string()));
    }
}
