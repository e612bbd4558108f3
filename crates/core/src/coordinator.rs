//! Owner of the in-memory task, project, tag and stats collections.
//!
//! Every mutation goes through the entity services and is followed by a silent
//! wholesale reload; nothing is patched locally. Reload results carry a generation
//! number and a result older than the one already applied is dropped.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;

use crate::error::{BulkDeleteError, ClientError};
use crate::model::{
    FieldErrors, Project, Stats, Tag, Task, TaskDraft, TaskPatch, TaskStatus, User,
};
use crate::services::{tags, DashboardService, ProjectsService, TagsService, TasksService};
use crate::session::Session;
use crate::telemetry::{Event, Handle};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Loading,
    Ready,
}

/// Selects a tag either by server id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagRef {
    Id(u64),
    Name(String),
}

impl TagRef {
    pub fn matches(&self, tag: &Tag) -> bool {
        match self {
            TagRef::Id(id) => tag.id == *id,
            TagRef::Name(name) => tag.name == *name,
        }
    }
}

impl From<&str> for TagRef {
    fn from(name: &str) -> Self {
        TagRef::Name(name.trim().trim_start_matches('#').to_string())
    }
}

/// Project, tag and status constraints combined with AND. Empty criteria match every task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub project_id: Option<u64>,
    pub tags: Vec<TagRef>,
    pub status: Option<TaskStatus>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.project_id.is_none() && self.tags.is_empty() && self.status.is_none()
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(project_id) = self.project_id {
            if task.project_id != Some(project_id) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        self.tags
            .iter()
            .all(|wanted| task.tags.iter().any(|tag| wanted.matches(tag)))
    }
}

/// Project selector as typed by a user: a numeric id, or `all`/`none`/empty for no filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectSelector(pub Option<u64>);

impl FromStr for ProjectSelector {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "all" | "none" | "null" => Ok(Self(None)),
            _ => trimmed
                .parse::<u64>()
                .map(|id| Self(Some(id)))
                .map_err(|_| anyhow::anyhow!("Invalid project '{trimmed}': expected an id or 'all'")),
        }
    }
}

pub fn filter_tasks(tasks: &[Task], criteria: &FilterCriteria) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| criteria.matches(task))
        .cloned()
        .collect()
}

/// Point-in-time copy of the coordinator state.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub phase: Phase,
    pub tasks: Vec<Task>,
    pub filtered: Vec<Task>,
    pub projects: Vec<Project>,
    pub tags: Vec<Tag>,
    pub stats: Stats,
    pub error: Option<String>,
    pub field_errors: FieldErrors,
    pub criteria: FilterCriteria,
}

#[derive(Debug, Default)]
struct State {
    view: Snapshot,
    applied_generation: u64,
}

struct Loaded {
    tasks: Vec<Task>,
    projects: Vec<Project>,
    tags: Vec<Tag>,
    stats: Stats,
}

pub struct Coordinator {
    tasks: TasksService,
    projects: ProjectsService,
    tags: TagsService,
    dashboard: DashboardService,
    session: Session,
    state: Mutex<State>,
    generation: AtomicU64,
    telemetry: Handle,
}

impl Coordinator {
    pub fn new(transport: Arc<dyn Transport>, session: Session) -> Self {
        Self {
            tasks: TasksService::new(transport.clone()),
            projects: ProjectsService::new(transport.clone()),
            tags: TagsService::new(transport.clone()),
            dashboard: DashboardService::new(transport),
            session,
            state: Mutex::new(State::default()),
            generation: AtomicU64::new(0),
            telemetry: Handle::new(),
        }
    }

    pub fn tasks_service(&self) -> &TasksService {
        &self.tasks
    }

    pub fn projects_service(&self) -> &ProjectsService {
        &self.projects
    }

    pub fn tags_service(&self) -> &TagsService {
        &self.tags
    }

    pub fn telemetry(&self) -> &Handle {
        &self.telemetry
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().view.clone()
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().view.phase
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().view.tasks.clone()
    }

    pub fn filtered(&self) -> Vec<Task> {
        self.state.lock().view.filtered.clone()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.state.lock().view.projects.clone()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.state.lock().view.tags.clone()
    }

    pub fn stats(&self) -> Stats {
        self.state.lock().view.stats
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().view.error.clone()
    }

    pub fn field_errors(&self) -> FieldErrors {
        self.state.lock().view.field_errors.clone()
    }

    pub fn clear_error(&self) {
        let mut state = self.state.lock();
        state.view.error = None;
        state.view.field_errors.clear();
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.current_user()
    }

    /// Tags in use by the loaded tasks, one per name.
    pub fn tag_catalog(&self) -> Vec<Tag> {
        tags::extract_from_tasks(&self.state.lock().view.tasks)
    }

    /// Fetch tasks, projects, tags and stats together. Any failure empties every
    /// collection; the phase always ends at [`Phase::Ready`].
    pub async fn load(&self) -> Result<(), ClientError> {
        self.state.lock().view.phase = Phase::Loading;
        self.telemetry.record(Event::LoadStarted { silent: false });
        let generation = self.next_generation();

        match self.fetch_all().await {
            Ok(loaded) => {
                if self.commit(generation, loaded) {
                    let mut state = self.state.lock();
                    state.view.error = None;
                    state.view.field_errors.clear();
                }
                self.state.lock().view.phase = Phase::Ready;
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "initial load failed");
                self.telemetry.record(Event::LoadFailed {
                    error: err.to_string(),
                });
                let mut state = self.state.lock();
                if generation >= state.applied_generation {
                    state.applied_generation = generation;
                    let criteria = std::mem::take(&mut state.view.criteria);
                    state.view = Snapshot {
                        error: Some(err.to_string()),
                        criteria,
                        ..Snapshot::default()
                    };
                }
                state.view.phase = Phase::Ready;
                Err(err)
            }
        }
    }

    /// Explicit reload: goes back through [`Phase::Loading`].
    pub async fn reload(&self) -> Result<(), ClientError> {
        self.load().await
    }

    /// Reload without touching the phase. A failure keeps the current state.
    async fn reload_silently(&self) {
        self.telemetry.record(Event::LoadStarted { silent: true });
        let generation = self.next_generation();
        match self.fetch_all().await {
            Ok(loaded) => {
                self.commit(generation, loaded);
            }
            Err(err) => {
                tracing::warn!(error = %err, "silent reload failed, keeping current data");
                self.telemetry.record(Event::LoadFailed {
                    error: err.to_string(),
                });
            }
        }
    }

    async fn fetch_all(&self) -> Result<Loaded, ClientError> {
        let (tasks, projects, tags, stats) = tokio::join!(
            self.tasks.list(None),
            self.projects.list(None),
            self.tags.list(None),
            self.dashboard.stats(),
        );
        Ok(Loaded {
            tasks: tasks?,
            projects: projects?,
            tags,
            stats: stats?,
        })
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replace the collections unless a newer generation already landed.
    fn commit(&self, generation: u64, loaded: Loaded) -> bool {
        let mut state = self.state.lock();
        if generation < state.applied_generation {
            tracing::debug!(
                generation,
                applied = state.applied_generation,
                "discarding stale reload"
            );
            self.telemetry.record(Event::StaleReloadDiscarded { generation });
            return false;
        }

        state.applied_generation = generation;
        let filtered = filter_tasks(&loaded.tasks, &state.view.criteria);
        self.telemetry.record(Event::LoadCompleted {
            tasks: loaded.tasks.len(),
            projects: loaded.projects.len(),
            tags: loaded.tags.len(),
        });
        tracing::info!(
            tasks = loaded.tasks.len(),
            projects = loaded.projects.len(),
            tags = loaded.tags.len(),
            "data loaded"
        );

        let view = &mut state.view;
        view.tasks = loaded.tasks;
        view.filtered = filtered;
        view.projects = loaded.projects;
        view.tags = loaded.tags;
        view.stats = loaded.stats;
        true
    }

    /// Recompute the filtered view from the tasks already held. No request is made.
    pub fn apply_filters(&self, criteria: FilterCriteria) -> Vec<Task> {
        let mut state = self.state.lock();
        let filtered = filter_tasks(&state.view.tasks, &criteria);
        state.view.criteria = criteria;
        state.view.filtered = filtered.clone();
        self.telemetry.record(Event::FiltersApplied {
            matched: filtered.len(),
        });
        filtered
    }

    pub async fn create_task(&self, draft: TaskDraft) -> Result<Task, ClientError> {
        let result = self.tasks.create(draft).await;
        self.settle("create_task", result).await
    }

    pub async fn update_task(&self, id: u64, patch: TaskPatch) -> Result<Task, ClientError> {
        let result = self.tasks.update(id, patch).await;
        self.settle("update_task", result).await
    }

    pub async fn update_status(&self, id: u64, status: TaskStatus) -> Result<Task, ClientError> {
        let result = self.tasks.update(id, TaskPatch::status(status)).await;
        self.settle("update_status", result).await
    }

    pub async fn delete_task(&self, id: u64) -> Result<(), ClientError> {
        let result = self.tasks.delete(id).await;
        self.settle("delete_task", result).await
    }

    /// Delete every id concurrently and wait for all of them. Reloads when at least
    /// one deletion went through; any failure is reported with the per-id breakdown.
    pub async fn bulk_delete(&self, ids: &[u64]) -> Result<Vec<u64>, BulkDeleteError> {
        let mut seen = HashSet::new();
        let ids: Vec<u64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let outcomes = join_all(ids.iter().map(|&id| async move {
            (id, self.tasks.delete(id).await)
        }))
        .await;

        let mut deleted = Vec::new();
        let mut failures = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => deleted.push(id),
                Err(err) => failures.push((id, err)),
            }
        }
        self.telemetry.record(Event::BulkDeleteFinished {
            deleted: deleted.len(),
            failed: failures.len(),
        });

        if !deleted.is_empty() {
            self.reload_silently().await;
        }

        if failures.is_empty() {
            self.clear_error();
            return Ok(deleted);
        }

        let err = BulkDeleteError { deleted, failures };
        tracing::warn!(failed = ?err.failed_ids(), "bulk delete partially failed");
        let mut state = self.state.lock();
        state.view.error = Some(err.to_string());
        state.view.field_errors.clear();
        Err(err)
    }

    /// Server-side tag search; replaces the held tag list.
    pub async fn search_tags(&self, query: &str) -> Vec<Tag> {
        let found = self.tags.list(Some(query)).await;
        self.state.lock().view.tags = found.clone();
        found
    }

    /// Server-side project search; on failure the held list is kept.
    pub async fn search_projects(&self, query: &str) -> Result<Vec<Project>, ClientError> {
        match self.projects.list(Some(query)).await {
            Ok(found) => {
                self.state.lock().view.projects = found.clone();
                Ok(found)
            }
            Err(err) => {
                tracing::warn!(error = %err, "project search failed");
                Err(err)
            }
        }
    }

    async fn settle<T>(&self, action: &'static str, result: Result<T, ClientError>) -> Result<T, ClientError> {
        match result {
            Ok(value) => {
                self.clear_error();
                self.telemetry.record(Event::MutationApplied(action));
                self.reload_silently().await;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(action, error = %err, "mutation failed");
                self.telemetry.record(Event::MutationFailed {
                    action,
                    error: err.to_string(),
                });
                let mut state = self.state.lock();
                state.view.error = Some(err.to_string());
                state.view.field_errors = err.field_errors().cloned().unwrap_or_default();
                Err(err)
            }
        }
    }
}
