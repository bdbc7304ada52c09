use crate::entities::*;
use chrono::{DateTime, Utc};
use sea_orm::*;

pub mod api;

const TITLE_MAX_LEN: usize = 200;
const DESCRIPTION_MAX_LEN: usize = 2000;

#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Task {
    id: u32,
    owner: String,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: u32,
        owner: String,
        title: String,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            title,
            description,
            created_at,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the identity of the user who created the task.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Case-insensitive substring match on the title. An empty query matches everything.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty() || self.title.to_lowercase().contains(&query)
    }
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Task::new(
            model.id as u32,
            model.owner,
            model.title,
            model.description,
            model.created_at,
        )
    }
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    #[error("Invalid task: {0}")]
    Validation(String),
    #[error("Task with ID {0} not found")]
    NotFound(u32),
    /// The task exists but belongs to someone else.
    #[error("Task with ID {0} belongs to another user")]
    Forbidden(u32),
    /// The owner identity has no user record.
    #[error("User '{0}' does not exist")]
    UnknownOwner(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

fn validate_title(title: &str) -> Result<String, TaskServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TaskServiceError::Validation(
            "title must not be empty".to_string(),
        ));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(TaskServiceError::Validation(format!(
            "title must be at most {} characters",
            TITLE_MAX_LEN
        )));
    }
    Ok(title.to_string())
}

fn validate_description(description: Option<&str>) -> Result<Option<String>, TaskServiceError> {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        return Err(TaskServiceError::Validation(format!(
            "description must be at most {} characters",
            DESCRIPTION_MAX_LEN
        )));
    }
    Ok(Some(description.to_string()))
}

/// Task storage where every operation is scoped to one owner.
pub struct TaskService<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl TaskService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> TaskService<'_> {
        TaskService { db }
    }

    /// Creates a new task owned by `owner`.
    ///
    /// # Arguments
    ///
    /// * `owner` - The identity from the verified session.
    /// * `title` - The task title; must not be blank.
    /// * `description` - Optional details; blank descriptions are stored as absent.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `Task` if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn create(
        &self,
        owner: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<Task, TaskServiceError> {
        let title = validate_title(title)?;
        let description = validate_description(description)?;

        let active_model = task::ActiveModel {
            owner: ActiveValue::Set(owner.to_string()),
            title: ActiveValue::Set(title),
            description: ActiveValue::Set(description),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        };
        let created_model = active_model
            .insert(self.db)
            .await
            .map_err(|err| match err.sql_err() {
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                    TaskServiceError::UnknownOwner(owner.to_string())
                }
                _ => TaskServiceError::Database(err),
            })?;
        Ok(Task::from(created_model))
    }

    /// Retrieves all tasks owned by `owner`, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_owner(&self, owner: &str) -> Result<Vec<Task>, TaskServiceError> {
        let tasks = task::Entity::find()
            .filter(task::Column::Owner.eq(owner))
            .order_by_desc(task::Column::Id)
            .all(self.db)
            .await?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok(tasks)
    }

    /// Retrieves the tasks owned by `owner` whose title contains `query`.
    ///
    /// The search only narrows the owner's own list.
    #[tracing::instrument(skip(self))]
    pub async fn search_for_owner(
        &self,
        owner: &str,
        query: &str,
    ) -> Result<Vec<Task>, TaskServiceError> {
        let tasks = self
            .list_for_owner(owner)
            .await?
            .into_iter()
            .filter(|task| task.matches_search(query))
            .collect();
        Ok(tasks)
    }

    /// Deletes a task by its ID on behalf of `owner`.
    ///
    /// # Returns
    ///
    /// The deleted `Task`, `NotFound` if no task has this ID, or `Forbidden` if it
    /// belongs to another user. Nothing is deleted in the error cases.
    #[tracing::instrument(skip(self))]
    pub async fn delete_by_id(&self, owner: &str, id: u32) -> Result<Task, TaskServiceError> {
        // Ids beyond the column range cannot exist.
        let row_id = i32::try_from(id).map_err(|_| TaskServiceError::NotFound(id))?;
        let task_to_delete = task::Entity::find_by_id(row_id)
            .one(self.db)
            .await?
            .ok_or(TaskServiceError::NotFound(id))?;

        if task_to_delete.owner != owner {
            return Err(TaskServiceError::Forbidden(id));
        }

        // The owner filter keeps the statement itself scoped, whatever happened
        // since the lookup.
        let result = task::Entity::delete_many()
            .filter(task::Column::Id.eq(row_id))
            .filter(task::Column::Owner.eq(owner))
            .exec(self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(TaskServiceError::NotFound(id));
        }

        tracing::info!("Deleted task {}", id);
        Ok(Task::from(task_to_delete))
    }
}
