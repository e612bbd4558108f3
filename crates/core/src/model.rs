use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::status;

pub const TITLE_MAX_LEN: usize = 255;
pub const TAG_NAME_MAX_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }

    /// `done` is the only state in which due dates stop mattering.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        status::parse_strict(s).ok_or_else(|| {
            anyhow!(
                "Unknown status '{}': expected todo|in-progress|done",
                s.trim()
            )
        })
    }
}

impl ValueEnum for TaskStatus {
    fn value_variants<'a>() -> &'a [Self] {
        const VARIANTS: [TaskStatus; 3] =
            [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];
        &VARIANTS
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        let value = clap::builder::PossibleValue::new(self.as_str());
        Some(match self {
            TaskStatus::Todo => value.alias("pending"),
            TaskStatus::InProgress => value.alias("in_progress"),
            TaskStatus::Done => value.alias("completed"),
        })
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(status::to_legacy(*self))
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(status::to_canonical(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, with = "calendar_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub project_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    #[serde(default, deserialize_with = "unique_tags")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }

    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        crate::dates::is_overdue_on(self.due_date, &self.status, today)
    }

    pub fn is_due_soon_on(&self, today: NaiveDate) -> bool {
        crate::dates::is_due_soon_on(self.due_date, &self.status, today)
    }
}

/// Server-computed task counters from `GET /dashboard`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default, alias = "total_tasks")]
    pub total: u64,
    #[serde(default)]
    pub todo: u64,
    #[serde(default, alias = "in-progress")]
    pub in_progress: u64,
    #[serde(default)]
    pub done: u64,
}

/// Payload for `POST /tasks`. Tags travel by name; the server creates them on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    pub tags: Vec<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_date"
    )]
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
}

/// Partial update for `PUT /tasks/:id`.
///
/// `project_id` and `due_date` are doubly optional: the outer `None` leaves the field
/// untouched, `Some(None)` clears it on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Option<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_patch_date"
    )]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl From<&Task> for TaskPatch {
    fn from(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            description: task.description.clone(),
            project_id: Some(task.project_id),
            tags: Some(task.tags.iter().map(|tag| tag.name.clone()).collect()),
            due_date: Some(task.due_date),
            status: Some(task.status),
        }
    }
}

/// Per-field validation messages, keyed by the field name the server reports.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Due,
    Title,
    Created,
}

impl FromStr for SortField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "due" | "due_date" | "due-date" => Ok(SortField::Due),
            "title" => Ok(SortField::Title),
            "created" | "created_at" | "created-at" => Ok(SortField::Created),
            other => Err(anyhow!(
                "Unknown sort field '{}': expected due|title|created",
                other
            )),
        }
    }
}

pub fn sort_tasks(tasks: &mut [Task], field: SortField) {
    match field {
        // Undated tasks sink to the bottom.
        SortField::Due => tasks.sort_by(|a, b| match (a.due_date, b.due_date) {
            (Some(left), Some(right)) => left.cmp(&right),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }),
        SortField::Title => tasks.sort_by_key(|task| task.title.to_lowercase()),
        SortField::Created => tasks.sort_by_key(|task| task.created_at),
    }
}

/// Embedded tags missing an id or name are skipped rather than failing the task.
fn unique_tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Tag>, D::Error> {
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    let mut unique: Vec<Tag> = Vec::with_capacity(raw.len());
    for value in raw {
        let tag = match serde_json::from_value::<Tag>(value) {
            Ok(tag) => tag,
            Err(err) => {
                tracing::debug!(error = %err, "skipping malformed embedded tag");
                continue;
            }
        };
        if !unique.iter().any(|existing| existing.name == tag.name) {
            unique.push(tag);
        }
    }
    Ok(unique)
}

fn serialize_date<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
        None => serializer.serialize_none(),
    }
}

fn serialize_patch_date<S: Serializer>(
    value: &Option<Option<NaiveDate>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serialize_date(&value.flatten(), serializer)
}

/// Due dates arrive either as `2025-01-05` or with a time suffix
/// (`2025-01-05T00:00:00.000000Z`); only the calendar day is kept.
pub(crate) mod calendar_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        super::serialize_date(value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        let day = raw.trim().split(['T', ' ']).next()?;
        if day.is_empty() {
            return None;
        }
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}
