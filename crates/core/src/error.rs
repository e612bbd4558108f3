use std::fmt;

use serde_json::Value;

use crate::envelope::ErrorBody;
use crate::model::FieldErrors;

pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred";

/// Failures raised by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-success status code.
    #[error("request failed with status {status}")]
    Status { status: u16, body: Value },

    /// No response was received (DNS, connect, TLS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// A response arrived but its body could not be read as JSON.
    #[error("could not decode response body: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Task,
    Project,
    Tag,
    User,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Task => "Task",
            Entity::Project => "Project",
            Entity::Tag => "Tag",
            Entity::User => "User",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "Create",
            Operation::Update => "Update",
            Operation::Delete => "Delete",
        };
        f.write_str(name)
    }
}

/// Typed failures surfaced by the entity access layer and the coordinator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: FieldErrors,
        #[source]
        cause: Option<TransportError>,
    },

    #[error("{message}")]
    NotFound {
        entity: Entity,
        id: Option<u64>,
        message: String,
        #[source]
        cause: Option<TransportError>,
    },

    #[error("{entity}s are read-only. {operation} operation not available.")]
    ReadOnly { entity: Entity, operation: Operation },

    #[error("Tags are managed through tasks, not as separate entities.")]
    ManagedThroughTask { operation: Operation },

    #[error("{message}")]
    Authorization {
        message: String,
        #[source]
        cause: TransportError,
    },

    #[error("{message}")]
    Network {
        message: String,
        #[source]
        cause: TransportError,
    },

    #[error("{message}")]
    Unknown {
        message: String,
        #[source]
        cause: Option<TransportError>,
    },
}

impl ClientError {
    /// Translate a transport failure, picking the most useful human message:
    /// the server's `message`, then the first field error, then a generic fallback.
    pub fn from_transport(entity: Entity, err: TransportError) -> Self {
        match &err {
            TransportError::Status { status, body } => {
                let body = ErrorBody::parse(body);
                let message = body
                    .message
                    .clone()
                    .or_else(|| body.first_field_error().map(str::to_string))
                    .or_else(|| body.error.clone())
                    .unwrap_or_else(|| default_message(*status));
                match *status {
                    401 => ClientError::Authorization {
                        message,
                        cause: err,
                    },
                    404 => ClientError::NotFound {
                        entity,
                        id: None,
                        message,
                        cause: Some(err),
                    },
                    422 => ClientError::Validation {
                        message,
                        errors: body.errors,
                        cause: Some(err),
                    },
                    _ => ClientError::Unknown {
                        message,
                        cause: Some(err),
                    },
                }
            }
            TransportError::Network(detail) => ClientError::Network {
                message: format!("Unable to reach the server: {detail}"),
                cause: err,
            },
            TransportError::Decode(_) => ClientError::Unknown {
                message: FALLBACK_MESSAGE.to_string(),
                cause: Some(err),
            },
        }
    }

    pub fn not_found(entity: Entity, id: u64) -> Self {
        ClientError::NotFound {
            entity,
            id: Some(id),
            message: format!("{entity} not found"),
            cause: None,
        }
    }

    /// Client-side validation failure; no request was sent.
    pub fn invalid(errors: FieldErrors) -> Self {
        let message = errors
            .values()
            .find_map(|messages| messages.first().cloned())
            .unwrap_or_else(|| String::from("Validation failed"));
        ClientError::Validation {
            message,
            errors,
            cause: None,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        ClientError::Unknown {
            message: message.into(),
            cause: None,
        }
    }

    /// HTTP status of the underlying response, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Validation { cause, .. }
            | ClientError::NotFound { cause, .. }
            | ClientError::Unknown { cause, .. } => cause.as_ref().and_then(TransportError::status),
            ClientError::Authorization { cause, .. } | ClientError::Network { cause, .. } => {
                cause.status()
            }
            ClientError::ReadOnly { .. } | ClientError::ManagedThroughTask { .. } => None,
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ClientError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Authorization { .. })
    }
}

fn default_message(status: u16) -> String {
    match status {
        401 => String::from("Unauthenticated"),
        404 => String::from("Resource not found"),
        422 => String::from("Validation failed"),
        _ => FALLBACK_MESSAGE.to_string(),
    }
}

/// Outcome of a bulk delete in which at least one deletion failed.
#[derive(Debug, Clone)]
pub struct BulkDeleteError {
    pub deleted: Vec<u64>,
    pub failures: Vec<(u64, ClientError)>,
}

impl BulkDeleteError {
    pub fn failed_ids(&self) -> Vec<u64> {
        self.failures.iter().map(|(id, _)| *id).collect()
    }
}

impl fmt::Display for BulkDeleteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.deleted.len() + self.failures.len();
        write!(
            f,
            "Failed to delete {} of {} task{}",
            self.failures.len(),
            total,
            if total == 1 { "" } else { "s" }
        )?;
        if let Some((id, err)) = self.failures.first() {
            write!(f, " (#{id}: {err})")?;
        }
        Ok(())
    }
}

impl std::error::Error for BulkDeleteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|(_, err)| err as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn status(status: u16, body: Value) -> TransportError {
        TransportError::Status { status, body }
    }

    #[test]
    fn validation_keeps_field_errors_and_status() {
        let err = ClientError::from_transport(
            Entity::Task,
            status(
                422,
                json!({ "message": "The title field is required.", "errors": { "title": ["The title field is required."] } }),
            ),
        );
        assert_eq!(err.to_string(), "The title field is required.");
        assert_eq!(err.status(), Some(422));
        assert_eq!(
            err.field_errors().unwrap()["title"],
            vec!["The title field is required.".to_string()]
        );
    }

    #[test]
    fn message_falls_back_to_first_field_error() {
        let err = ClientError::from_transport(
            Entity::Task,
            status(422, json!({ "errors": { "due_date": ["Not a date."] } })),
        );
        assert_eq!(err.to_string(), "Not a date.");
    }

    #[test]
    fn message_falls_back_to_generic_text() {
        let err = ClientError::from_transport(Entity::Task, status(500, json!("<html>")));
        assert!(matches!(err, ClientError::Unknown { .. }));
        assert_eq!(err.to_string(), FALLBACK_MESSAGE);
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn unauthorized_and_missing_are_classified() {
        let unauthorized =
            ClientError::from_transport(Entity::Task, status(401, json!({ "message": "Unauthenticated." })));
        assert!(unauthorized.is_unauthorized());
        assert_eq!(unauthorized.status(), Some(401));

        let missing = ClientError::from_transport(Entity::Task, status(404, json!({})));
        assert!(matches!(missing, ClientError::NotFound { entity: Entity::Task, .. }));
    }

    #[test]
    fn network_failures_have_no_status() {
        let err = ClientError::from_transport(
            Entity::Project,
            TransportError::Network("connection refused".into()),
        );
        assert!(matches!(err, ClientError::Network { .. }));
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn read_only_messages_name_the_operation() {
        let err = ClientError::ReadOnly {
            entity: Entity::Project,
            operation: Operation::Delete,
        };
        assert_eq!(
            err.to_string(),
            "Projects are read-only. Delete operation not available."
        );
    }

    #[test]
    fn bulk_delete_error_summarizes_failures() {
        let err = BulkDeleteError {
            deleted: vec![1],
            failures: vec![(2, ClientError::not_found(Entity::Task, 2))],
        };
        assert_eq!(err.failed_ids(), vec![2]);
        assert_eq!(err.to_string(), "Failed to delete 1 of 2 tasks (#2: Task not found)");
    }
}
