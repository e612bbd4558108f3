use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::envelope;
use crate::error::{ClientError, Entity};
use crate::model::{FieldErrors, Task, TaskDraft, TaskPatch, TAG_NAME_MAX_LEN, TITLE_MAX_LEN};
use crate::transport::{ApiRequest, Transport};

/// Page size used to pull the whole task list in one round trip.
pub const TASK_PAGE_SIZE: u32 = 1000;

const TASKS_PATH: &str = "/tasks";

pub(crate) fn task_path(id: u64) -> String {
    format!("{TASKS_PATH}/{id}")
}

#[derive(Clone)]
pub struct TasksService {
    transport: Arc<dyn Transport>,
}

impl TasksService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch every task visible to the current user.
    ///
    /// The API has no server-side search for tasks; a non-blank `search` narrows the
    /// result locally by title and description.
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Task>, ClientError> {
        let request = ApiRequest::get(TASKS_PATH).query("per_page", TASK_PAGE_SIZE);
        let raw = self.send(request).await?;
        let mut tasks: Vec<Task> = envelope::normalize(raw);

        if let Some(term) = search.map(str::trim).filter(|term| !term.is_empty()) {
            let needle = term.to_lowercase();
            tasks.retain(|task| {
                task.title.to_lowercase().contains(&needle)
                    || task
                        .description
                        .as_deref()
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
            });
        }

        tracing::debug!(count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    pub async fn get(&self, id: u64) -> Result<Task, ClientError> {
        let raw = self.send(ApiRequest::get(task_path(id))).await.map_err(|err| match err {
            ClientError::NotFound { message, cause, .. } => ClientError::NotFound {
                entity: Entity::Task,
                id: Some(id),
                message,
                cause,
            },
            other => other,
        })?;
        envelope::normalize_one(raw).ok_or_else(|| ClientError::not_found(Entity::Task, id))
    }

    pub async fn create(&self, draft: TaskDraft) -> Result<Task, ClientError> {
        let draft = prepare_draft(draft)?;
        tracing::info!(
            title = draft.title.as_str(),
            status = %draft.status,
            project_id = ?draft.project_id,
            tags = draft.tags.len(),
            has_due_date = draft.due_date.is_some(),
            "creating task"
        );

        let body = to_body(&draft)?;
        let raw = self.send(ApiRequest::post(TASKS_PATH).json(body)).await?;
        envelope::normalize_one(raw).ok_or_else(|| ClientError::unknown("Failed to create task"))
    }

    pub async fn update(&self, id: u64, patch: TaskPatch) -> Result<Task, ClientError> {
        let patch = prepare_patch(patch)?;
        tracing::info!(task_id = id, status = ?patch.status, "updating task");

        let body = to_body(&patch)?;
        let raw = self.send(ApiRequest::put(task_path(id)).json(body)).await?;
        envelope::normalize_one(raw).ok_or_else(|| ClientError::unknown("Failed to update task"))
    }

    pub async fn delete(&self, id: u64) -> Result<(), ClientError> {
        tracing::info!(task_id = id, "deleting task");
        self.send(ApiRequest::delete(task_path(id))).await?;
        Ok(())
    }

    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError> {
        self.transport
            .send(request)
            .await
            .map_err(|err| ClientError::from_transport(Entity::Task, err))
    }
}

fn to_body<T: serde::Serialize>(payload: &T) -> Result<Value, ClientError> {
    serde_json::to_value(payload).map_err(|err| ClientError::unknown(err.to_string()))
}

/// Trim, validate and deduplicate a create payload before it leaves the client.
pub fn prepare_draft(mut draft: TaskDraft) -> Result<TaskDraft, ClientError> {
    let mut errors = FieldErrors::new();
    draft.title = draft.title.trim().to_string();
    check_title(&draft.title, &mut errors);
    draft.tags = normalize_tags(draft.tags);
    check_tags(&draft.tags, &mut errors);
    draft.description = draft.description.filter(|text| !text.trim().is_empty());

    if errors.is_empty() {
        Ok(draft)
    } else {
        Err(ClientError::invalid(errors))
    }
}

/// Same checks as [`prepare_draft`], applied only to the fields being changed.
pub fn prepare_patch(mut patch: TaskPatch) -> Result<TaskPatch, ClientError> {
    let mut errors = FieldErrors::new();
    if let Some(title) = patch.title.as_mut() {
        *title = title.trim().to_string();
        check_title(title, &mut errors);
    }
    if let Some(tags) = patch.tags.take() {
        let tags = normalize_tags(tags);
        check_tags(&tags, &mut errors);
        patch.tags = Some(tags);
    }

    if errors.is_empty() {
        Ok(patch)
    } else {
        Err(ClientError::invalid(errors))
    }
}

fn check_title(title: &str, errors: &mut FieldErrors) {
    if title.is_empty() {
        errors
            .entry("title".into())
            .or_default()
            .push("Task title is required".into());
    } else if title.chars().count() > TITLE_MAX_LEN {
        errors
            .entry("title".into())
            .or_default()
            .push(format!("Task title cannot exceed {TITLE_MAX_LEN} characters"));
    }
}

fn check_tags(tags: &[String], errors: &mut FieldErrors) {
    if tags.iter().any(|tag| tag.chars().count() > TAG_NAME_MAX_LEN) {
        errors
            .entry("tags".into())
            .or_default()
            .push(format!("Tag name cannot exceed {TAG_NAME_MAX_LEN} characters"));
    }
}

/// Trim, drop blanks and leading `#`, and keep the first spelling of each name.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for tag in tags {
        let trimmed = tag.trim().trim_start_matches('#').trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            result.push(trimmed.to_string());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{task_json, ScriptedTransport};
    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use serde_json::json;

    fn service() -> (TasksService, Arc<ScriptedTransport>) {
        let transport = ScriptedTransport::new();
        (TasksService::new(transport.clone()), transport)
    }

    #[tokio::test]
    async fn list_requests_large_page_and_unwraps_pagination() {
        let (service, transport) = service();
        transport.ok(
            Method::GET,
            "/tasks",
            json!({ "success": true, "data": { "data": [task_json(1, "A", None, &[]), task_json(2, "B", None, &[])], "total": 2 } }),
        );

        let tasks = service.list(None).await.unwrap();
        assert_eq!(tasks.len(), 2);

        let calls = transport.calls();
        assert_eq!(calls[0].query, vec![("per_page".to_string(), "1000".to_string())]);
    }

    #[tokio::test]
    async fn list_filters_locally_by_search_term() {
        let (service, transport) = service();
        transport.ok(
            Method::GET,
            "/tasks",
            json!([task_json(1, "Write report", None, &[]), task_json(2, "Call bank", None, &[])]),
        );

        let tasks = service.list(Some("REPORT")).await.unwrap();
        assert_eq!(tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn get_fails_with_not_found_when_payload_is_empty() {
        let (service, transport) = service();
        transport.ok(Method::GET, "/tasks/5", json!({ "success": true, "data": null }));

        let err = service.get(5).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::NotFound {
                entity: Entity::Task,
                id: Some(5),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn get_maps_http_404_to_not_found_with_id() {
        let (service, _transport) = service();
        let err = service.get(77).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound { id: Some(77), .. }));
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn create_surfaces_server_validation_errors() {
        let (service, transport) = service();
        transport.status(
            Method::POST,
            "/tasks",
            422,
            json!({ "message": "The given data was invalid.", "errors": { "due_date": ["The due date must be a date."] } }),
        );

        let err = service
            .create(TaskDraft {
                title: "Plan".into(),
                ..TaskDraft::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "The given data was invalid.");
        assert_eq!(
            err.field_errors().unwrap()["due_date"],
            vec!["The due date must be a date.".to_string()]
        );
    }

    #[tokio::test]
    async fn create_rejects_blank_title_without_calling_server() {
        let (service, transport) = service();
        let err = service
            .create(TaskDraft {
                title: "   ".into(),
                ..TaskDraft::default()
            })
            .await
            .unwrap_err();

        assert!(err.field_errors().unwrap().contains_key("title"));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn create_sends_deduplicated_tag_names() {
        let (service, transport) = service();
        transport.ok(
            Method::POST,
            "/tasks",
            json!({ "success": true, "data": task_json(3, "Plan", None, &["ops"]) }),
        );

        let created = service
            .create(TaskDraft {
                title: " Plan ".into(),
                tags: vec!["ops".into(), "#ops".into(), " ".into()],
                ..TaskDraft::default()
            })
            .await
            .unwrap();
        assert_eq!(created.id, 3);

        let body = transport.calls()[0].body.clone().unwrap();
        assert_eq!(body["title"], "Plan");
        assert_eq!(body["tags"], json!(["ops"]));
    }

    #[tokio::test]
    async fn update_puts_partial_payload() {
        let (service, transport) = service();
        transport.ok(
            Method::PUT,
            "/tasks/8",
            json!({ "success": true, "data": task_json(8, "Plan", None, &[]) }),
        );

        service.update(8, TaskPatch::status(crate::model::TaskStatus::Done)).await.unwrap();
        assert_eq!(transport.calls()[0].body, Some(json!({ "status": "done" })));
    }

    #[tokio::test]
    async fn delete_propagates_server_errors() {
        let (service, transport) = service();
        transport.status(Method::DELETE, "/tasks/2", 500, json!({ "message": "Server exploded" }));

        let err = service.delete(2).await.unwrap_err();
        assert_eq!(err.to_string(), "Server exploded");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn long_tags_and_titles_are_rejected() {
        let err = prepare_draft(TaskDraft {
            title: "x".repeat(TITLE_MAX_LEN + 1),
            tags: vec!["y".repeat(TAG_NAME_MAX_LEN + 1)],
            ..TaskDraft::default()
        })
        .unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("tags"));

        assert!(prepare_patch(TaskPatch::default()).is_ok());
    }
}
