//! Task record CRUD and domain matching.
//!
//! Tasks are stored together as one map under the `tasks` key. Each write
//! reads the whole map, changes it, and writes it back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Store, compile_pattern, keys, require_non_empty};
use crate::Error;

/// Shape of the output a task asks the assistant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    PlainText,
    Html,
    Markdown,
    StructuredData,
}

/// A user-defined automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    pub prompt_template: String,
    /// Regexes matched case-insensitively against the page's domain.
    pub website_patterns: Vec<String>,
    pub output_format: OutputFormat,
    pub tags: Vec<String>,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub usage_count: u64,
}

pub type TaskMap = BTreeMap<String, Task>;

/// Caller-supplied fields for a new task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub prompt_template: String,
    pub website_patterns: Vec<String>,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Defaults to enabled.
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub prompt_template: Option<String>,
    pub website_patterns: Option<Vec<String>>,
    pub output_format: Option<OutputFormat>,
    pub tags: Option<Vec<String>>,
    pub is_enabled: Option<bool>,
}

impl Task {
    fn apply(&mut self, update: TaskUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(prompt_template) = update.prompt_template {
            self.prompt_template = prompt_template;
        }
        if let Some(website_patterns) = update.website_patterns {
            self.website_patterns = website_patterns;
        }
        if let Some(output_format) = update.output_format {
            self.output_format = output_format;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(is_enabled) = update.is_enabled {
            self.is_enabled = is_enabled;
        }
    }

    /// Check required fields and that every pattern compiles.
    pub fn validate(&self) -> Result<(), Error> {
        require_non_empty("name", &self.name)?;
        require_non_empty("prompt_template", &self.prompt_template)?;
        if self.website_patterns.is_empty() {
            return Err(Error::InvalidInput("website_patterns must contain at least one pattern".into()));
        }
        for pattern in &self.website_patterns {
            require_non_empty("website pattern", pattern)?;
            compile_pattern(pattern)?;
        }
        Ok(())
    }

    /// Whether any valid pattern matches `domain`. Invalid patterns are skipped.
    pub fn matches_domain(&self, domain: &str) -> bool {
        self.website_patterns.iter().any(|pattern| match compile_pattern(pattern) {
            Ok(re) => re.is_match(domain),
            Err(e) => {
                tracing::warn!(task_id = %self.id, error = %e, "Skipping invalid website pattern");
                false
            }
        })
    }
}

impl Store {
    /// Validate and store a new task. Returns its id.
    pub async fn create_task(&self, new: NewTask) -> Result<String, Error> {
        let now = Utc::now();
        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            prompt_template: new.prompt_template,
            website_patterns: new.website_patterns,
            output_format: new.output_format,
            tags: new.tags,
            is_enabled: new.is_enabled.unwrap_or(true),
            created_at: now,
            updated_at: now,
            usage_count: 0,
        };
        task.validate()?;

        let mut tasks = self.get_all_tasks().await?;
        let id = task.id.clone();
        tasks.insert(id.clone(), task);
        self.write(keys::TASKS, &tasks).await?;

        tracing::debug!(task_id = %id, "Created task");
        Ok(id)
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>, Error> {
        Ok(self.get_all_tasks().await?.remove(id))
    }

    /// All tasks keyed by id; empty when nothing is stored.
    pub async fn get_all_tasks(&self) -> Result<TaskMap, Error> {
        Ok(self.read(keys::TASKS).await?.unwrap_or_default())
    }

    /// Merge `update` into the task. Returns false if the id is unknown.
    ///
    /// The stored task is left untouched when the merged record fails
    /// validation.
    pub async fn update_task(&self, id: &str, update: TaskUpdate) -> Result<bool, Error> {
        let mut tasks = self.get_all_tasks().await?;
        let Some(task) = tasks.get_mut(id) else {
            return Ok(false);
        };

        task.apply(update);
        task.validate()?;
        task.updated_at = Utc::now();

        self.write(keys::TASKS, &tasks).await?;
        Ok(true)
    }

    /// Remove the task and its usage metrics. Returns false if the id is unknown.
    pub async fn delete_task(&self, id: &str) -> Result<bool, Error> {
        let mut tasks = self.get_all_tasks().await?;
        if tasks.remove(id).is_none() {
            return Ok(false);
        }
        self.write(keys::TASKS, &tasks).await?;
        self.remove_usage_stats(id).await?;

        tracing::debug!(task_id = %id, "Deleted task");
        Ok(true)
    }

    /// Enabled tasks with at least one pattern matching `domain`.
    pub async fn get_tasks_for_domain(&self, domain: &str) -> Result<Vec<Task>, Error> {
        let tasks = self.get_all_tasks().await?;
        Ok(tasks
            .into_values()
            .filter(|task| task.is_enabled && task.matches_domain(domain))
            .collect())
    }

    pub async fn get_tasks_by_tag(&self, tag: &str) -> Result<Vec<Task>, Error> {
        let tasks = self.get_all_tasks().await?;
        Ok(tasks
            .into_values()
            .filter(|task| task.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .collect())
    }

    pub async fn set_task_enabled(&self, id: &str, enabled: bool) -> Result<bool, Error> {
        self.update_task(id, TaskUpdate { is_enabled: Some(enabled), ..Default::default() })
            .await
    }

    /// Bump the usage counter of an existing task.
    pub(crate) async fn increment_task_usage(&self, id: &str) -> Result<(), Error> {
        let mut tasks = self.get_all_tasks().await?;
        if let Some(task) = tasks.get_mut(id) {
            task.usage_count += 1;
            self.write(keys::TASKS, &tasks).await?;
        }
        Ok(())
    }
}
