use std::sync::Arc;

use crate::envelope;
use crate::error::{ClientError, Entity, Operation};
use crate::model::Project;
use crate::transport::{ApiRequest, Transport};

const PROJECTS_PATH: &str = "/projects";

/// Read-only access to projects. The backend exposes only the index endpoint.
#[derive(Clone)]
pub struct ProjectsService {
    transport: Arc<dyn Transport>,
}

impl ProjectsService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Project>, ClientError> {
        let request = ApiRequest::get(PROJECTS_PATH).search(search);
        let raw = self
            .transport
            .send(request)
            .await
            .map_err(|err| ClientError::from_transport(Entity::Project, err))?;
        let projects: Vec<Project> = envelope::normalize(raw);
        tracing::debug!(count = projects.len(), "fetched projects");
        Ok(projects)
    }

    /// There is no `GET /projects/:id`; the project is looked up in the index.
    pub async fn get(&self, id: u64) -> Result<Project, ClientError> {
        self.list(None)
            .await?
            .into_iter()
            .find(|project| project.id == id)
            .ok_or_else(|| ClientError::not_found(Entity::Project, id))
    }

    pub async fn create(&self, name: &str, _description: Option<&str>) -> Result<Project, ClientError> {
        Err(read_only(Operation::Create, name))
    }

    pub async fn update(
        &self,
        id: u64,
        _name: &str,
        _description: Option<&str>,
    ) -> Result<Project, ClientError> {
        Err(read_only(Operation::Update, &id.to_string()))
    }

    pub async fn delete(&self, id: u64) -> Result<(), ClientError> {
        Err(read_only(Operation::Delete, &id.to_string()))
    }
}

fn read_only(operation: Operation, target: &str) -> ClientError {
    tracing::warn!(%operation, target, "rejected project mutation, projects are read-only");
    ClientError::ReadOnly {
        entity: Entity::Project,
        operation,
    }
}
