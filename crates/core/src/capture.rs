use crate::model::TaskStatus;

/// Raw input for creating a task from a client (CLI today).
///
/// `text` may carry inline `#tag` and `due:<spec>` tokens; explicit fields win over
/// inline ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureInput {
    pub text: Vec<String>,
    pub description: Option<String>,
    pub project_id: Option<u64>,
    pub tags: Vec<String>,
    pub due: Option<String>,
    pub status: Option<TaskStatus>,
}

impl CaptureInput {
    pub fn require_text(&self) -> Result<(), DraftError> {
        if self.text.iter().all(|word| word.trim().is_empty()) {
            return Err(DraftError::EmptyText);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("Task text cannot be empty")]
    EmptyText,

    #[error("Task title cannot be empty after parsing tokens")]
    EmptyTitle,

    #[error("Date specification cannot be empty")]
    EmptyDate,

    #[error("Unrecognized date specification '{0}'. Try YYYY-MM-DD, today, tomorrow, +3d, mon")]
    UnknownDate(String),

    #[error("Relative date '{0}' is invalid. Use +<n>d, +<n>w or +<n>m")]
    BadRelative(String),
}
