use std::collections::HashSet;
use std::sync::Arc;

use crate::envelope;
use crate::error::{ClientError, Entity, Operation};
use crate::model::{Tag, Task};
use crate::transport::{ApiRequest, Transport};

const TAGS_PATH: &str = "/tags";

/// Tag search. Tags are created and removed through task payloads, never directly.
#[derive(Clone)]
pub struct TagsService {
    transport: Arc<dyn Transport>,
}

impl TagsService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Search results from the server, or an empty list if the lookup fails.
    pub async fn list(&self, search: Option<&str>) -> Vec<Tag> {
        let request = ApiRequest::get(TAGS_PATH).search(search);
        match self.transport.send(request).await {
            Ok(raw) => {
                let tags: Vec<Tag> = envelope::normalize(raw);
                tracing::debug!(count = tags.len(), "fetched tags");
                tags
            }
            Err(err) => {
                let err = ClientError::from_transport(Entity::Tag, err);
                tracing::warn!(error = %err, "tag lookup failed, continuing without tags");
                Vec::new()
            }
        }
    }

    pub async fn get(&self, id: u64) -> Result<Tag, ClientError> {
        self.list(None)
            .await
            .into_iter()
            .find(|tag| tag.id == id)
            .ok_or_else(|| ClientError::not_found(Entity::Tag, id))
    }

    pub async fn create(&self, _name: &str) -> Result<Tag, ClientError> {
        Err(managed_through_task(Operation::Create))
    }

    pub async fn update(&self, _id: u64, _name: &str) -> Result<Tag, ClientError> {
        Err(managed_through_task(Operation::Update))
    }

    pub async fn delete(&self, _id: u64) -> Result<(), ClientError> {
        Err(managed_through_task(Operation::Delete))
    }
}

fn managed_through_task(operation: Operation) -> ClientError {
    tracing::warn!(%operation, "rejected tag mutation, tags are managed through tasks");
    ClientError::ManagedThroughTask { operation }
}

/// Distinct tags across `tasks`, keyed by name, in first-seen order.
pub fn extract_from_tasks(tasks: &[Task]) -> Vec<Tag> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for tag in tasks.iter().flat_map(|task| task.tags.iter()) {
        if tag.name.is_empty() {
            continue;
        }
        if seen.insert(tag.name.as_str()) {
            unique.push(tag.clone());
        }
    }
    unique
}
