//! Status vocabulary mapping.
//!
//! Storage, filtering and the wire format use the canonical spelling
//! (`todo`, `in-progress`, `done`). Older payloads and some display code still use
//! the legacy spelling (`pending`, `in_progress`, `completed`), so every display
//! helper here accepts both.

use crate::model::TaskStatus;

/// Map any known spelling onto the canonical status.
///
/// Total: unknown spellings fall back to [`TaskStatus::Todo`].
pub fn to_canonical(raw: &str) -> TaskStatus {
    match parse_strict(raw) {
        Some(status) => status,
        None => {
            tracing::debug!(status = raw, "unknown task status, treating as todo");
            TaskStatus::Todo
        }
    }
}

/// Spelling sent back to the backend. Matches the canonical spelling today.
pub fn to_legacy(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "todo",
        TaskStatus::InProgress => "in-progress",
        TaskStatus::Done => "done",
    }
}

pub(crate) fn parse_strict(raw: &str) -> Option<TaskStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "todo" | "to-do" | "pending" => Some(TaskStatus::Todo),
        "in-progress" | "in_progress" | "inprogress" => Some(TaskStatus::InProgress),
        "done" | "completed" => Some(TaskStatus::Done),
        _ => None,
    }
}

/// Anything a status can be read from: the typed enum or a raw string in either vocabulary.
pub trait StatusLike {
    fn known_status(&self) -> Option<TaskStatus>;

    fn is_terminal(&self) -> bool {
        self.known_status().is_some_and(|status| status.is_terminal())
    }
}

impl StatusLike for TaskStatus {
    fn known_status(&self) -> Option<TaskStatus> {
        Some(*self)
    }
}

impl StatusLike for str {
    fn known_status(&self) -> Option<TaskStatus> {
        parse_strict(self)
    }
}

impl StatusLike for String {
    fn known_status(&self) -> Option<TaskStatus> {
        parse_strict(self)
    }
}

impl<T: StatusLike + ?Sized> StatusLike for &T {
    fn known_status(&self) -> Option<TaskStatus> {
        (**self).known_status()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Outline,
    Default,
    Success,
}

pub fn badge<S: StatusLike + ?Sized>(status: &S) -> Badge {
    match status.known_status() {
        Some(TaskStatus::Todo) | None => Badge::Outline,
        Some(TaskStatus::InProgress) => Badge::Default,
        Some(TaskStatus::Done) => Badge::Success,
    }
}

/// Human label; unknown spellings are shown as-is.
pub fn label(raw: &str) -> String {
    match parse_strict(raw) {
        Some(status) => status_label(status).to_string(),
        None => raw.to_string(),
    }
}

pub fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "To Do",
        TaskStatus::InProgress => "In Progress",
        TaskStatus::Done => "Done",
    }
}

pub fn icon<S: StatusLike + ?Sized>(status: &S) -> &'static str {
    match status.known_status() {
        Some(TaskStatus::Todo) | None => "📝",
        Some(TaskStatus::InProgress) => "⚙️",
        Some(TaskStatus::Done) => "✅",
    }
}
