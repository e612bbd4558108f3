pub mod auth;
pub mod capture;
pub mod config;
pub mod coordinator;
pub mod dates;
pub mod envelope;
pub mod error;
pub mod model;
pub mod parser;
pub mod services;
pub mod session;
pub mod status;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod testing;

pub use auth::AuthService;
pub use capture::{CaptureInput, DraftError};
pub use config::AppConfig;
pub use coordinator::{Coordinator, FilterCriteria, Phase, ProjectSelector, Snapshot, TagRef};
pub use error::{BulkDeleteError, ClientError, Entity, Operation, TransportError};
pub use model::*;
pub use services::{DashboardService, ProjectsService, TagsService, TasksService};
pub use session::{CredentialStore, Session};
pub use transport::{ApiRequest, HttpTransport, Transport};
