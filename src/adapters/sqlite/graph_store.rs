//! SQLite implementation of the graph ports.

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActorId, AuditField, Checklist, EntityType, FieldChange, Link, LinkKind, Task, TaskStatus,
    TaskType,
};
use crate::domain::ports::{AuditSink, GraphRepository, GraphStore};

const TASK_COLUMNS: &str = "id, name, description, due_date, output, assigned_to, created_by, \
     status, previous_status, task_type, parent_task_id, is_review_required, is_reviewed, \
     is_deleted, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteGraph {
    pool: SqlitePool,
}

impl SqliteGraph {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// One open SQLite transaction.
///
/// The transaction holds the database write lock from `begin` until it ends,
/// so overlapping walks run one after another. Dropping it without
/// committing rolls back.
pub struct SqliteGraphTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl GraphRepository for SqliteGraph {
    type Tx = SqliteGraphTransaction;

    async fn begin(&self) -> DomainResult<Self::Tx> {
        let mut tx = self.pool.begin().await?;
        // A write statement before any read upgrades the deferred BEGIN to a
        // write transaction, same as BEGIN IMMEDIATE. Contenders wait on
        // busy_timeout here instead of failing later with SQLITE_BUSY.
        sqlx::query("UPDATE tasks SET id = id WHERE 0")
            .execute(&mut *tx)
            .await?;
        Ok(SqliteGraphTransaction { tx })
    }

    async fn commit(&self, tx: Self::Tx) -> DomainResult<()> {
        tx.tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> DomainResult<()> {
        tx.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for SqliteGraphTransaction {
    async fn record(&mut self, change: FieldChange) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO field_changes (id, entity_type, entity_id, field, old_value, new_value, actor, changed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(change.id.to_string())
        .bind(change.entity_type.as_str())
        .bind(change.entity_id.to_string())
        .bind(change.field.as_str())
        .bind(&change.old_value)
        .bind(&change.new_value)
        .bind(change.actor.as_str())
        .bind(change.changed_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn history(&mut self, entity_id: Uuid) -> DomainResult<Vec<FieldChange>> {
        let rows: Vec<FieldChangeRow> = sqlx::query_as(
            r#"SELECT id, entity_type, entity_id, field, old_value, new_value, actor, changed_at
               FROM field_changes WHERE entity_id = ? ORDER BY seq"#,
        )
        .bind(entity_id.to_string())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(FieldChange::try_from).collect()
    }
}

#[async_trait]
impl GraphStore for SqliteGraphTransaction {
    async fn get_task(&mut self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> =
            sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&mut *self.tx)
                .await?;

        row.map(Task::try_from).transpose()
    }

    async fn insert_task(&mut self, task: &Task) -> DomainResult<()> {
        sqlx::query(&format!(
            "INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(task.id.to_string())
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.due_date.map(|d| d.to_rfc3339()))
        .bind(&task.output)
        .bind(task.assigned_to.as_ref().map(ActorId::as_str))
        .bind(task.created_by.as_str())
        .bind(task.status.as_str())
        .bind(task.previous_status.map(|s| s.as_str()))
        .bind(task.task_type.as_str())
        .bind(task.parent_task_id.map(|id| id.to_string()))
        .bind(task.is_review_required)
        .bind(task.is_reviewed)
        .bind(task.is_deleted)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_task(&mut self, task: &Task) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE tasks SET name = ?, description = ?, due_date = ?, output = ?,
               assigned_to = ?, status = ?, previous_status = ?, is_review_required = ?,
               is_reviewed = ?, is_deleted = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.due_date.map(|d| d.to_rfc3339()))
        .bind(&task.output)
        .bind(task.assigned_to.as_ref().map(ActorId::as_str))
        .bind(task.status.as_str())
        .bind(task.previous_status.map(|s| s.as_str()))
        .bind(task.is_review_required)
        .bind(task.is_reviewed)
        .bind(task.is_deleted)
        .bind(task.updated_at.to_rfc3339())
        .bind(task.id.to_string())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(task.id));
        }
        Ok(())
    }

    async fn get_checklist(&mut self, id: Uuid) -> DomainResult<Option<Checklist>> {
        let row: Option<ChecklistRow> = sqlx::query_as(
            r#"SELECT id, name, is_completed, is_deleted, created_by, created_at, updated_at
               FROM checklists WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Checklist::try_from).transpose()
    }

    async fn insert_checklist(&mut self, checklist: &Checklist) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO checklists (id, name, is_completed, is_deleted, created_by, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(checklist.id.to_string())
        .bind(&checklist.name)
        .bind(checklist.is_completed)
        .bind(checklist.is_deleted)
        .bind(checklist.created_by.as_str())
        .bind(checklist.created_at.to_rfc3339())
        .bind(checklist.updated_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_checklist(&mut self, checklist: &Checklist) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE checklists SET name = ?, is_completed = ?, is_deleted = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&checklist.name)
        .bind(checklist.is_completed)
        .bind(checklist.is_deleted)
        .bind(checklist.updated_at.to_rfc3339())
        .bind(checklist.id.to_string())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ChecklistNotFound(checklist.id));
        }
        Ok(())
    }

    async fn insert_link(&mut self, link: &Link) -> DomainResult<()> {
        let (parent_task_id, sub_task_id) = match link.kind {
            LinkKind::Owns { parent_task_id } => (Some(parent_task_id), None),
            LinkKind::Requires { sub_task_id } => (None, Some(sub_task_id)),
        };
        sqlx::query(
            "INSERT INTO task_checklist_links (id, checklist_id, parent_task_id, sub_task_id) VALUES (?, ?, ?, ?)",
        )
        .bind(link.id.to_string())
        .bind(link.checklist_id.to_string())
        .bind(parent_task_id.map(|id| id.to_string()))
        .bind(sub_task_id.map(|id| id.to_string()))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn checklists_of_task(&mut self, task_id: Uuid) -> DomainResult<Vec<Checklist>> {
        let rows: Vec<ChecklistRow> = sqlx::query_as(
            r#"SELECT c.id, c.name, c.is_completed, c.is_deleted, c.created_by, c.created_at, c.updated_at
               FROM checklists c
               JOIN task_checklist_links l ON l.checklist_id = c.id
               WHERE l.parent_task_id = ? AND c.is_deleted = 0
               ORDER BY l.rowid"#,
        )
        .bind(task_id.to_string())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Checklist::try_from).collect()
    }

    async fn owners_of_checklist(&mut self, checklist_id: Uuid) -> DomainResult<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"SELECT parent_task_id FROM task_checklist_links
               WHERE checklist_id = ? AND parent_task_id IS NOT NULL
               ORDER BY rowid"#,
        )
        .bind(checklist_id.to_string())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(|(id,)| parse_uuid(id)).collect()
    }

    async fn subtasks_of_checklist(&mut self, checklist_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            r#"SELECT {} FROM tasks t
               JOIN task_checklist_links l ON l.sub_task_id = t.id
               WHERE l.checklist_id = ? AND t.is_deleted = 0
               ORDER BY l.rowid"#,
            prefixed_task_columns("t")
        ))
        .bind(checklist_id.to_string())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn checklists_requiring_task(&mut self, task_id: Uuid) -> DomainResult<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"SELECT l.checklist_id FROM task_checklist_links l
               JOIN checklists c ON c.id = l.checklist_id
               WHERE l.sub_task_id = ? AND c.is_deleted = 0
               ORDER BY l.rowid"#,
        )
        .bind(task_id.to_string())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(|(id,)| parse_uuid(id)).collect()
    }

    async fn reviews_of_task(&mut self, task_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            r#"SELECT {TASK_COLUMNS} FROM tasks
               WHERE parent_task_id = ? AND task_type = 'review' AND is_deleted = 0
               ORDER BY created_at"#
        ))
        .bind(task_id.to_string())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn tasks_for_actor(&mut self, actor: &ActorId) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            r#"SELECT {TASK_COLUMNS} FROM tasks
               WHERE (created_by = ? OR assigned_to = ?) AND is_deleted = 0
               ORDER BY created_at"#
        ))
        .bind(actor.as_str())
        .bind(actor.as_str())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn deleted_reviews_of_task(&mut self, task_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            r#"SELECT {TASK_COLUMNS} FROM tasks
               WHERE parent_task_id = ? AND task_type = 'review' AND is_deleted = 1
               ORDER BY created_at DESC"#
        ))
        .bind(task_id.to_string())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn mark_deleted(
        &mut self,
        task_ids: &[Uuid],
        checklist_ids: &[Uuid],
    ) -> DomainResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        for id in task_ids {
            let result = sqlx::query("UPDATE tasks SET is_deleted = 1, updated_at = ? WHERE id = ?")
                .bind(&now)
                .bind(id.to_string())
                .execute(&mut *self.tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(DomainError::TaskNotFound(*id));
            }
        }
        for id in checklist_ids {
            let result =
                sqlx::query("UPDATE checklists SET is_deleted = 1, updated_at = ? WHERE id = ?")
                    .bind(&now)
                    .bind(id.to_string())
                    .execute(&mut *self.tx)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(DomainError::ChecklistNotFound(*id));
            }
        }
        Ok(())
    }
}

fn prefixed_task_columns(alias: &str) -> String {
    TASK_COLUMNS
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_status(s: &str) -> DomainResult<TaskStatus> {
    TaskStatus::from_str(s)
        .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {s}")))
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    name: String,
    description: String,
    due_date: Option<String>,
    output: Option<String>,
    assigned_to: Option<String>,
    created_by: String,
    status: String,
    previous_status: Option<String>,
    task_type: String,
    parent_task_id: Option<String>,
    is_review_required: bool,
    is_reviewed: bool,
    is_deleted: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let task_type = TaskType::from_str(&row.task_type).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid task type: {}", row.task_type))
        })?;

        Ok(Task {
            id: parse_uuid(&row.id)?,
            name: row.name,
            description: row.description,
            due_date: parse_optional_datetime(row.due_date)?,
            output: row.output,
            assigned_to: row.assigned_to.map(ActorId::new),
            created_by: ActorId::new(row.created_by),
            status: parse_status(&row.status)?,
            previous_status: row.previous_status.as_deref().map(parse_status).transpose()?,
            task_type,
            parent_task_id: parse_optional_uuid(row.parent_task_id)?,
            is_review_required: row.is_review_required,
            is_reviewed: row.is_reviewed,
            is_deleted: row.is_deleted,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ChecklistRow {
    id: String,
    name: String,
    is_completed: bool,
    is_deleted: bool,
    created_by: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ChecklistRow> for Checklist {
    type Error = DomainError;

    fn try_from(row: ChecklistRow) -> Result<Self, Self::Error> {
        Ok(Checklist {
            id: parse_uuid(&row.id)?,
            name: row.name,
            is_completed: row.is_completed,
            is_deleted: row.is_deleted,
            created_by: ActorId::new(row.created_by),
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FieldChangeRow {
    id: String,
    entity_type: String,
    entity_id: String,
    field: String,
    old_value: Option<String>,
    new_value: Option<String>,
    actor: String,
    changed_at: String,
}

impl TryFrom<FieldChangeRow> for FieldChange {
    type Error = DomainError;

    fn try_from(row: FieldChangeRow) -> Result<Self, Self::Error> {
        let entity_type = EntityType::from_str(&row.entity_type).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid entity type: {}", row.entity_type))
        })?;
        let field = AuditField::from_str(&row.field)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid field: {}", row.field)))?;

        Ok(FieldChange {
            id: parse_uuid(&row.id)?,
            entity_type,
            entity_id: parse_uuid(&row.entity_id)?,
            field,
            old_value: row.old_value,
            new_value: row.new_value,
            actor: ActorId::new(row.actor),
            changed_at: parse_datetime(&row.changed_at)?,
        })
    }
}
