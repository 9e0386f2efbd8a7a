//! Entity-shaped operations over the generic table collaborator. Owns the
//! translation between the client's camelCase models and the store's
//! snake_case schema, the missing-relation tolerance for list calls, and the
//! relation helpers (reorder, move-to-column, association sync, members).

use std::{collections::HashSet, str::FromStr, sync::Arc};

use chrono::{DateTime, Utc};
use models::{
    Attachment, BoardColumn, CreateLabel, CreateOrganization, CreateProfile, CreateProject, Label,
    Organization, Profile, Project, Role, Task, TaskAssociations, UpdateOrganization,
    UpdateProfile, UpdateProject,
};
use remote::{Query, RemoteError, SortDirection, TableApi, table::expect_single};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use tracing::warn;
use uuid::Uuid;

#[derive(Clone)]
pub struct Gateway {
    tables: Arc<dyn TableApi>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OrganizationRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    logo_url: Option<String>,
    is_default: bool,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        Organization {
            id: row.id,
            name: row.name,
            description: row.description,
            logo_url: row.logo_url,
            is_default: row.is_default,
            owner_id: row.owner_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    is_favorite: bool,
    organization_id: Option<Uuid>,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            title: row.title,
            description: row.description,
            is_favorite: row.is_favorite,
            organization_id: row.organization_id,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ColumnRow {
    id: Uuid,
    title: String,
    project_id: Uuid,
    order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ColumnRow> for BoardColumn {
    fn from(row: ColumnRow) -> Self {
        BoardColumn {
            id: row.id,
            title: row.title,
            project_id: row.project_id,
            order: row.order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&BoardColumn> for ColumnRow {
    fn from(column: &BoardColumn) -> Self {
        ColumnRow {
            id: column.id,
            title: column.title.clone(),
            project_id: column.project_id,
            order: column.order,
            created_at: column.created_at,
            updated_at: column.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TaskRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    column_id: Uuid,
    project_id: Uuid,
    owner_id: Uuid,
    order: i32,
    due_date: Option<DateTime<Utc>>,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            title: row.title,
            description: row.description,
            column_id: row.column_id,
            project_id: row.project_id,
            owner_id: row.owner_id,
            order: row.order,
            due_date: row.due_date,
            completed: row.completed,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        TaskRow {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            column_id: task.column_id,
            project_id: task.project_id,
            owner_id: task.owner_id,
            order: task.order,
            due_date: task.due_date,
            completed: task.completed,
            completed_at: task.completed_at,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LabelRow {
    id: Uuid,
    name: String,
    color: String,
    organization_id: Option<Uuid>,
}

impl From<LabelRow> for Label {
    fn from(row: LabelRow) -> Self {
        Label {
            id: row.id,
            name: row.name,
            color: row.color,
            organization_id: row.organization_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProfileRow {
    id: Uuid,
    name: String,
    email: String,
    role: Option<String>,
    job_title: Option<String>,
    avatar_url: Option<String>,
    organization_id: Option<Uuid>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row
                .role
                .as_deref()
                .and_then(|r| Role::from_str(r).ok())
                .unwrap_or_default(),
            job_title: row.job_title,
            avatar_url: row.avatar_url,
            organization_id: row.organization_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AttachmentRow {
    id: Uuid,
    task_id: Uuid,
    name: String,
    url: String,
    size: i64,
    content_type: String,
    created_at: DateTime<Utc>,
}

impl From<AttachmentRow> for Attachment {
    fn from(row: AttachmentRow) -> Self {
        Attachment {
            id: row.id,
            task_id: Some(row.task_id),
            name: row.name,
            url: row.url,
            size: row.size,
            content_type: row.content_type,
            created_at: row.created_at,
        }
    }
}

fn patch_map() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("updated_at".to_string(), json!(Utc::now()));
    map
}

fn set<T: Serialize>(map: &mut Map<String, Value>, key: &str, value: &Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_string(), json!(value));
    }
}

impl Gateway {
    pub fn new(tables: Arc<dyn TableApi>) -> Self {
        Self { tables }
    }

    /// List rows, tolerating an unprovisioned table: a missing relation is an
    /// empty collection, logged as a warning, never an error to the caller.
    async fn list<T: DeserializeOwned>(
        &self,
        table: &str,
        query: Query,
    ) -> Result<Vec<T>, RemoteError> {
        match self.tables.select(table, query).await {
            Ok(rows) => rows
                .into_iter()
                .map(|row| serde_json::from_value(row).map_err(RemoteError::from))
                .collect(),
            Err(err) if err.is_missing_relation() => {
                warn!(table, "relation missing, returning empty collection");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    async fn find<T: DeserializeOwned>(
        &self,
        table: &str,
        id: Uuid,
    ) -> Result<Option<T>, RemoteError> {
        let rows = match self
            .tables
            .select(table, Query::new().eq("id", id.to_string()).single())
            .await
        {
            Ok(rows) => rows,
            Err(err) if err.is_missing_relation() => return Ok(None),
            Err(err) => return Err(err),
        };
        rows.into_iter()
            .next()
            .map(|row| serde_json::from_value(row).map_err(RemoteError::from))
            .transpose()
    }

    async fn insert_one<T: DeserializeOwned>(
        &self,
        table: &str,
        row: Value,
    ) -> Result<T, RemoteError> {
        let inserted = expect_single(self.tables.insert(table, row).await?)?;
        Ok(serde_json::from_value(inserted)?)
    }

    async fn update_one<T: DeserializeOwned>(
        &self,
        table: &str,
        id: Uuid,
        patch: Value,
    ) -> Result<T, RemoteError> {
        let rows = self
            .tables
            .update(table, Query::new().eq("id", id.to_string()), patch)
            .await?;
        Ok(serde_json::from_value(expect_single(rows)?)?)
    }

    // ---- organizations -----------------------------------------------------

    pub async fn organizations(&self) -> Result<Vec<Organization>, RemoteError> {
        let rows: Vec<OrganizationRow> = self
            .list(
                "organizations",
                Query::new().order_by("created_at", SortDirection::Ascending),
            )
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create_organization(
        &self,
        owner_id: Uuid,
        data: CreateOrganization,
    ) -> Result<Organization, RemoteError> {
        let row = OrganizationRow {
            id: Uuid::new_v4(),
            name: data.name,
            description: data.description,
            logo_url: data.logo_url,
            is_default: data.is_default.unwrap_or(false),
            owner_id,
            created_at: Utc::now(),
        };
        self.insert_one::<OrganizationRow>("organizations", serde_json::to_value(&row)?)
            .await
            .map(Into::into)
    }

    pub async fn update_organization(
        &self,
        id: Uuid,
        data: UpdateOrganization,
    ) -> Result<Organization, RemoteError> {
        let mut patch = Map::new();
        set(&mut patch, "name", &data.name);
        set(&mut patch, "description", &data.description);
        set(&mut patch, "logo_url", &data.logo_url);
        set(&mut patch, "is_default", &data.is_default);
        self.update_one::<OrganizationRow>("organizations", id, Value::Object(patch))
            .await
            .map(Into::into)
    }

    pub async fn delete_organization(&self, id: Uuid) -> Result<(), RemoteError> {
        self.tables
            .delete("organizations", Query::new().eq("id", id.to_string()))
            .await?;
        Ok(())
    }

    // ---- projects ----------------------------------------------------------

    pub async fn projects(&self) -> Result<Vec<Project>, RemoteError> {
        let rows: Vec<ProjectRow> = self
            .list(
                "projects",
                Query::new().order_by("created_at", SortDirection::Descending),
            )
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn projects_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Project>, RemoteError> {
        let rows: Vec<ProjectRow> = self
            .list(
                "projects",
                Query::new()
                    .eq("organization_id", organization_id.to_string())
                    .order_by("created_at", SortDirection::Descending),
            )
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn find_project(&self, id: Uuid) -> Result<Option<Project>, RemoteError> {
        Ok(self
            .find::<ProjectRow>("projects", id)
            .await?
            .map(Into::into))
    }

    pub async fn create_project(
        &self,
        owner_id: Uuid,
        data: CreateProject,
    ) -> Result<Project, RemoteError> {
        let now = Utc::now();
        let row = ProjectRow {
            id: Uuid::new_v4(),
            title: data.title,
            description: data.description,
            is_favorite: false,
            organization_id: data.organization_id,
            owner_id,
            created_at: now,
            updated_at: now,
        };
        self.insert_one::<ProjectRow>("projects", serde_json::to_value(&row)?)
            .await
            .map(Into::into)
    }

    pub async fn update_project(
        &self,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Project, RemoteError> {
        let mut patch = patch_map();
        set(&mut patch, "title", &data.title);
        set(&mut patch, "description", &data.description);
        set(&mut patch, "is_favorite", &data.is_favorite);
        set(&mut patch, "organization_id", &data.organization_id);
        self.update_one::<ProjectRow>("projects", id, Value::Object(patch))
            .await
            .map(Into::into)
    }

    pub async fn delete_project(&self, id: Uuid) -> Result<(), RemoteError> {
        self.tables
            .delete("projects", Query::new().eq("id", id.to_string()))
            .await?;
        Ok(())
    }

    // ---- columns -----------------------------------------------------------

    pub async fn columns_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<BoardColumn>, RemoteError> {
        let rows: Vec<ColumnRow> = self
            .list(
                "columns",
                Query::new()
                    .eq("project_id", project_id.to_string())
                    .order_by("order", SortDirection::Ascending),
            )
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Persists a column the board created locally (the id is generated on
    /// the client side, creation is a separate explicit call).
    pub async fn create_column(&self, column: &BoardColumn) -> Result<BoardColumn, RemoteError> {
        let row = ColumnRow::from(column);
        self.insert_one::<ColumnRow>("columns", serde_json::to_value(&row)?)
            .await
            .map(Into::into)
    }

    pub async fn rename_column(&self, id: Uuid, title: &str) -> Result<BoardColumn, RemoteError> {
        let mut patch = patch_map();
        patch.insert("title".to_string(), json!(title));
        self.update_one::<ColumnRow>("columns", id, Value::Object(patch))
            .await
            .map(Into::into)
    }

    /// Task cascade is enforced by the remote store, not here.
    pub async fn delete_column(&self, id: Uuid) -> Result<(), RemoteError> {
        self.tables
            .delete("columns", Query::new().eq("id", id.to_string()))
            .await?;
        Ok(())
    }

    pub async fn reorder_columns(
        &self,
        project_id: Uuid,
        orders: &[(Uuid, i32)],
    ) -> Result<(), RemoteError> {
        self.reorder("columns", "project_id", project_id, orders)
            .await
    }

    // ---- tasks -------------------------------------------------------------

    pub async fn tasks_for_project(&self, project_id: Uuid) -> Result<Vec<Task>, RemoteError> {
        let rows: Vec<TaskRow> = self
            .list(
                "tasks",
                Query::new()
                    .eq("project_id", project_id.to_string())
                    .order_by("order", SortDirection::Ascending),
            )
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn tasks_for_column(&self, column_id: Uuid) -> Result<Vec<Task>, RemoteError> {
        let rows: Vec<TaskRow> = self
            .list(
                "tasks",
                Query::new()
                    .eq("column_id", column_id.to_string())
                    .order_by("order", SortDirection::Ascending),
            )
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn find_task(&self, id: Uuid) -> Result<Option<Task>, RemoteError> {
        Ok(self.find::<TaskRow>("tasks", id).await?.map(Into::into))
    }

    pub async fn create_task(&self, task: &Task) -> Result<Task, RemoteError> {
        let row = TaskRow::from(task);
        self.insert_one::<TaskRow>("tasks", serde_json::to_value(&row)?)
            .await
            .map(Into::into)
    }

    pub async fn update_task_fields(&self, id: Uuid, patch: Value) -> Result<Task, RemoteError> {
        self.update_one::<TaskRow>("tasks", id, patch)
            .await
            .map(Into::into)
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<(), RemoteError> {
        self.tables
            .delete("task_labels", Query::new().eq("task_id", id.to_string()))
            .await
            .ok();
        self.tables
            .delete("task_assignees", Query::new().eq("task_id", id.to_string()))
            .await
            .ok();
        self.tables
            .delete("tasks", Query::new().eq("id", id.to_string()))
            .await?;
        Ok(())
    }

    pub async fn set_task_completion(
        &self,
        id: Uuid,
        completed: bool,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Task, RemoteError> {
        let mut patch = patch_map();
        patch.insert("completed".to_string(), json!(completed));
        patch.insert(
            "completed_at".to_string(),
            if completed {
                json!(completed_at.unwrap_or_else(Utc::now))
            } else {
                Value::Null
            },
        );
        self.update_one::<TaskRow>("tasks", id, Value::Object(patch))
            .await
            .map(Into::into)
    }

    pub async fn reorder_tasks(
        &self,
        column_id: Uuid,
        orders: &[(Uuid, i32)],
    ) -> Result<(), RemoteError> {
        self.reorder("tasks", "column_id", column_id, orders).await
    }

    /// Applies each `(id, order)` pair as an independent update. Not
    /// transactional: every pair is attempted even after a failure, and the
    /// first error is reported once the sweep finishes.
    async fn reorder(
        &self,
        table: &str,
        container_column: &str,
        container_id: Uuid,
        orders: &[(Uuid, i32)],
    ) -> Result<(), RemoteError> {
        let mut first_error = None;
        for (id, order) in orders {
            let mut patch = patch_map();
            patch.insert("order".to_string(), json!(order));
            let result = self
                .tables
                .update(
                    table,
                    Query::new()
                        .eq("id", id.to_string())
                        .eq(container_column, container_id.to_string()),
                    Value::Object(patch),
                )
                .await
                .and_then(expect_single);
            if let Err(err) = result {
                warn!(table, id = %id, order, error = %err, "reorder update failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Relocates a task to another column: reads its current position, writes
    /// the new column/order, then runs two best-effort sweeps that close the
    /// gap in the old column and open one in the new. Sweep failures are
    /// logged only; the caller's queue owns the repair policy.
    pub async fn move_to_column(
        &self,
        task_id: Uuid,
        new_column_id: Uuid,
        new_order: i32,
    ) -> Result<Task, RemoteError> {
        let current = expect_single(
            self.tables
                .select("tasks", Query::new().eq("id", task_id.to_string()).single())
                .await?,
        )?;
        let current: TaskRow = serde_json::from_value(current)?;

        let mut patch = patch_map();
        patch.insert("column_id".to_string(), json!(new_column_id));
        patch.insert("order".to_string(), json!(new_order));
        let moved: Task = self
            .update_one::<TaskRow>("tasks", task_id, Value::Object(patch))
            .await?
            .into();

        self.shift_orders(current.column_id, current.order, task_id, -1)
            .await;
        self.shift_orders(new_column_id, new_order - 1, task_id, 1)
            .await;

        Ok(moved)
    }

    async fn shift_orders(&self, column_id: Uuid, above: i32, skip: Uuid, delta: i32) {
        let query = Query::new()
            .eq("column_id", column_id.to_string())
            .gt("order", above);
        let rows = match self.tables.select("tasks", query).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(column_id = %column_id, error = %err, "order sweep read failed");
                return;
            }
        };
        for row in rows {
            let Ok(task) = serde_json::from_value::<TaskRow>(row) else {
                continue;
            };
            if task.id == skip {
                continue;
            }
            let mut patch = patch_map();
            patch.insert("order".to_string(), json!(task.order + delta));
            if let Err(err) = self
                .tables
                .update(
                    "tasks",
                    Query::new().eq("id", task.id.to_string()),
                    Value::Object(patch),
                )
                .await
            {
                warn!(task_id = %task.id, error = %err, "order sweep update failed");
            }
        }
    }

    // ---- associations ------------------------------------------------------

    pub async fn label_ids_for_task(&self, task_id: Uuid) -> Result<Vec<Uuid>, RemoteError> {
        self.join_ids("task_labels", "task_id", task_id, "label_id")
            .await
    }

    pub async fn assignee_ids_for_task(&self, task_id: Uuid) -> Result<Vec<Uuid>, RemoteError> {
        self.join_ids("task_assignees", "task_id", task_id, "user_id")
            .await
    }

    async fn join_ids(
        &self,
        table: &str,
        key_column: &str,
        key: Uuid,
        value_column: &str,
    ) -> Result<Vec<Uuid>, RemoteError> {
        let rows: Vec<Value> = self
            .list(table, Query::new().eq(key_column, key.to_string()))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(value_column))
            .filter_map(|v| v.as_str())
            .filter_map(|s| Uuid::from_str(s).ok())
            .collect())
    }

    /// Reconciles a task's labels to the desired set by diffing against the
    /// current associations and issuing only the delta. The association is
    /// never momentarily empty.
    pub async fn sync_task_labels(
        &self,
        task_id: Uuid,
        desired: &[Uuid],
    ) -> Result<(), RemoteError> {
        self.sync_join("task_labels", "label_id", task_id, desired)
            .await
    }

    pub async fn sync_task_assignees(
        &self,
        task_id: Uuid,
        desired: &[Uuid],
    ) -> Result<(), RemoteError> {
        self.sync_join("task_assignees", "user_id", task_id, desired)
            .await
    }

    async fn sync_join(
        &self,
        table: &str,
        value_column: &str,
        task_id: Uuid,
        desired: &[Uuid],
    ) -> Result<(), RemoteError> {
        let current: HashSet<Uuid> = self
            .join_ids(table, "task_id", task_id, value_column)
            .await?
            .into_iter()
            .collect();
        let desired: HashSet<Uuid> = desired.iter().copied().collect();

        let added: Vec<Value> = desired
            .difference(&current)
            .map(|id| json!({ "task_id": task_id, value_column: id }))
            .collect();
        if !added.is_empty() {
            self.tables.insert(table, Value::Array(added)).await?;
        }

        let removed: Vec<Value> = current
            .difference(&desired)
            .map(|id| json!(id.to_string()))
            .collect();
        if !removed.is_empty() {
            self.tables
                .delete(
                    table,
                    Query::new()
                        .eq("task_id", task_id.to_string())
                        .in_(value_column, removed),
                )
                .await?;
        }
        Ok(())
    }

    pub async fn associations_for_task(
        &self,
        task_id: Uuid,
    ) -> Result<TaskAssociations, RemoteError> {
        let label_ids = self.label_ids_for_task(task_id).await?;
        let labels = if label_ids.is_empty() {
            Vec::new()
        } else {
            let rows: Vec<LabelRow> = self
                .list(
                    "labels",
                    Query::new().in_(
                        "id",
                        label_ids.iter().map(|id| json!(id.to_string())).collect(),
                    ),
                )
                .await?;
            rows.into_iter().map(Into::into).collect()
        };

        let assignee_ids = self.assignee_ids_for_task(task_id).await?;
        let assignees = if assignee_ids.is_empty() {
            Vec::new()
        } else {
            let rows: Vec<ProfileRow> = self
                .list(
                    "profiles",
                    Query::new().in_(
                        "id",
                        assignee_ids
                            .iter()
                            .map(|id| json!(id.to_string()))
                            .collect(),
                    ),
                )
                .await?;
            rows.into_iter().map(Into::into).collect()
        };

        let files = self.attachments_for_task(task_id).await?;

        Ok(TaskAssociations {
            labels,
            assignees,
            files,
        })
    }

    // ---- labels ------------------------------------------------------------

    pub async fn labels(&self, organization_id: Option<Uuid>) -> Result<Vec<Label>, RemoteError> {
        let mut query = Query::new().order_by("name", SortDirection::Ascending);
        if let Some(org) = organization_id {
            query = query.eq("organization_id", org.to_string());
        }
        let rows: Vec<LabelRow> = self.list("labels", query).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create_label(&self, data: CreateLabel) -> Result<Label, RemoteError> {
        let row = LabelRow {
            id: Uuid::new_v4(),
            name: data.name,
            color: data.color,
            organization_id: data.organization_id,
        };
        self.insert_one::<LabelRow>("labels", serde_json::to_value(&row)?)
            .await
            .map(Into::into)
    }

    pub async fn delete_label(&self, id: Uuid) -> Result<(), RemoteError> {
        self.tables
            .delete("task_labels", Query::new().eq("label_id", id.to_string()))
            .await
            .ok();
        self.tables
            .delete("labels", Query::new().eq("id", id.to_string()))
            .await?;
        Ok(())
    }

    // ---- profiles & membership ---------------------------------------------

    pub async fn profiles(&self) -> Result<Vec<Profile>, RemoteError> {
        let rows: Vec<ProfileRow> = self
            .list(
                "profiles",
                Query::new().order_by("name", SortDirection::Ascending),
            )
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, RemoteError> {
        Ok(self
            .find::<ProfileRow>("profiles", id)
            .await?
            .map(Into::into))
    }

    /// Raw role column for a profile, `None` when the column is null or the
    /// row (or table) is absent. The session service layers the metadata
    /// precedence on top of this.
    pub async fn stored_role(&self, user_id: Uuid) -> Result<Option<Role>, RemoteError> {
        Ok(self
            .find::<ProfileRow>("profiles", user_id)
            .await?
            .and_then(|row| row.role)
            .and_then(|role| Role::from_str(&role).ok()))
    }

    pub async fn create_profile(&self, data: CreateProfile) -> Result<Profile, RemoteError> {
        let row = ProfileRow {
            id: data.id,
            name: data.name,
            email: data.email,
            role: Some(data.role.unwrap_or_default().to_string()),
            job_title: data.job_title,
            avatar_url: None,
            organization_id: data.organization_id,
        };
        self.insert_one::<ProfileRow>("profiles", serde_json::to_value(&row)?)
            .await
            .map(Into::into)
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Profile, RemoteError> {
        let mut patch = Map::new();
        set(&mut patch, "name", &data.name);
        set(&mut patch, "job_title", &data.job_title);
        set(&mut patch, "avatar_url", &data.avatar_url);
        set(&mut patch, "organization_id", &data.organization_id);
        if let Some(role) = data.role {
            patch.insert("role".to_string(), json!(role.to_string()));
        }
        self.update_one::<ProfileRow>("profiles", id, Value::Object(patch))
            .await
            .map(Into::into)
    }

    /// Removes a profile and its membership/assignment join rows. The join
    /// deletes are best-effort; the profile row delete is authoritative.
    pub async fn delete_profile(&self, id: Uuid) -> Result<(), RemoteError> {
        self.tables
            .delete("user_projects", Query::new().eq("user_id", id.to_string()))
            .await
            .ok();
        self.tables
            .delete("task_assignees", Query::new().eq("user_id", id.to_string()))
            .await
            .ok();
        self.tables
            .delete("profiles", Query::new().eq("id", id.to_string()))
            .await?;
        Ok(())
    }

    pub async fn organization_members(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Profile>, RemoteError> {
        let rows: Vec<ProfileRow> = self
            .list(
                "profiles",
                Query::new()
                    .eq("organization_id", organization_id.to_string())
                    .order_by("name", SortDirection::Ascending),
            )
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn project_members(&self, project_id: Uuid) -> Result<Vec<Profile>, RemoteError> {
        let member_ids = self
            .join_ids("user_projects", "project_id", project_id, "user_id")
            .await?;
        if member_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ProfileRow> = self
            .list(
                "profiles",
                Query::new().in_(
                    "id",
                    member_ids.iter().map(|id| json!(id.to_string())).collect(),
                ),
            )
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn add_project_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), RemoteError> {
        self.tables
            .insert(
                "user_projects",
                json!({ "project_id": project_id, "user_id": user_id }),
            )
            .await?;
        Ok(())
    }

    pub async fn remove_project_member(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), RemoteError> {
        self.tables
            .delete(
                "user_projects",
                Query::new()
                    .eq("project_id", project_id.to_string())
                    .eq("user_id", user_id.to_string()),
            )
            .await?;
        Ok(())
    }

    // ---- attachments -------------------------------------------------------

    pub async fn attachments_for_task(
        &self,
        task_id: Uuid,
    ) -> Result<Vec<Attachment>, RemoteError> {
        let rows: Vec<AttachmentRow> = self
            .list(
                "task_files",
                Query::new()
                    .eq("task_id", task_id.to_string())
                    .order_by("created_at", SortDirection::Ascending),
            )
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create_attachment(
        &self,
        task_id: Uuid,
        attachment: &Attachment,
    ) -> Result<Attachment, RemoteError> {
        let row = AttachmentRow {
            id: attachment.id,
            task_id,
            name: attachment.name.clone(),
            url: attachment.url.clone(),
            size: attachment.size,
            content_type: attachment.content_type.clone(),
            created_at: attachment.created_at,
        };
        self.insert_one::<AttachmentRow>("task_files", serde_json::to_value(&row)?)
            .await
            .map(Into::into)
    }

    pub async fn delete_attachment(&self, id: Uuid) -> Result<(), RemoteError> {
        self.tables
            .delete("task_files", Query::new().eq("id", id.to_string()))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use remote::MemoryRemote;

    use super::*;

    fn gateway_with(remote: Arc<MemoryRemote>) -> Gateway {
        Gateway::new(remote)
    }

    #[tokio::test]
    async fn missing_relation_yields_empty_list() {
        let remote = Arc::new(MemoryRemote::with_tables(&["tasks"]));
        let gateway = gateway_with(remote);
        let labels = gateway.labels(None).await.unwrap();
        assert!(labels.is_empty());
    }

    #[tokio::test]
    async fn zero_rows_on_single_update_is_no_data() {
        let remote = Arc::new(MemoryRemote::new());
        let gateway = gateway_with(remote);
        let err = gateway
            .rename_column(Uuid::new_v4(), "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NoData));
    }

    #[tokio::test]
    async fn sync_labels_issues_only_the_delta() {
        let remote = Arc::new(MemoryRemote::new());
        let task_id = Uuid::new_v4();
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        let add = Uuid::new_v4();
        remote.seed(
            "task_labels",
            vec![
                json!({"task_id": task_id.to_string(), "label_id": keep.to_string()}),
                json!({"task_id": task_id.to_string(), "label_id": drop.to_string()}),
            ],
        );
        let gateway = gateway_with(remote.clone());

        gateway
            .sync_task_labels(task_id, &[keep, add])
            .await
            .unwrap();

        let mut ids = gateway.label_ids_for_task(task_id).await.unwrap();
        ids.sort();
        let mut expected = vec![keep, add];
        expected.sort();
        assert_eq!(ids, expected);
        // one insert for the added id, one delete for the removed id
        assert_eq!(remote.write_calls(), 2);
    }

    #[tokio::test]
    async fn move_to_column_rewrites_neighbours() {
        let remote = Arc::new(MemoryRemote::new());
        let src = Uuid::new_v4();
        let dst = Uuid::new_v4();
        let project = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let (t, u, v) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mk = |id: Uuid, column: Uuid, order: i32| {
            json!({
                "id": id.to_string(),
                "title": "t",
                "description": null,
                "column_id": column.to_string(),
                "project_id": project.to_string(),
                "owner_id": owner.to_string(),
                "order": order,
                "due_date": null,
                "completed": false,
                "completed_at": null,
                "created_at": Utc::now(),
                "updated_at": Utc::now(),
            })
        };
        remote.seed("tasks", vec![mk(t, src, 0), mk(u, src, 1), mk(v, dst, 0)]);
        let gateway = gateway_with(remote.clone());

        let moved = gateway.move_to_column(t, dst, 1).await.unwrap();
        assert_eq!(moved.column_id, dst);
        assert_eq!(moved.order, 1);

        let source_tasks = gateway.tasks_for_column(src).await.unwrap();
        assert_eq!(source_tasks.len(), 1);
        assert_eq!(source_tasks[0].id, u);
        assert_eq!(source_tasks[0].order, 0);

        let dest_tasks = gateway.tasks_for_column(dst).await.unwrap();
        assert_eq!(
            dest_tasks.iter().map(|t| (t.id, t.order)).collect::<Vec<_>>(),
            vec![(v, 0), (t, 1)]
        );
    }
}
