//! In-process record of coordinator lifecycle events, mirrored to `tracing` at debug level.

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    LoadStarted { silent: bool },
    LoadCompleted { tasks: usize, projects: usize, tags: usize },
    LoadFailed { error: String },
    StaleReloadDiscarded { generation: u64 },
    FiltersApplied { matched: usize },
    MutationApplied(&'static str),
    MutationFailed { action: &'static str, error: String },
    BulkDeleteFinished { deleted: usize, failed: usize },
}

#[derive(Debug, Default)]
pub struct Handle {
    #[cfg(feature = "telemetry")]
    events: Mutex<Vec<Event>>,
}

impl Handle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        #[cfg(feature = "telemetry")]
        {
            match &event {
                Event::LoadStarted { silent } => tracing::debug!(silent, "telemetry load started"),
                Event::LoadCompleted {
                    tasks,
                    projects,
                    tags,
                } => tracing::debug!(tasks, projects, tags, "telemetry load completed"),
                Event::LoadFailed { error } => {
                    tracing::debug!(error = %error, "telemetry load failed")
                }
                Event::StaleReloadDiscarded { generation } => {
                    tracing::debug!(generation, "telemetry stale reload discarded")
                }
                Event::FiltersApplied { matched } => {
                    tracing::debug!(matched, "telemetry filters applied")
                }
                Event::MutationApplied(action) => {
                    tracing::debug!(action, "telemetry mutation applied")
                }
                Event::MutationFailed { action, error } => tracing::debug!(
                    action,
                    error = %error,
                    "telemetry mutation failed"
                ),
                Event::BulkDeleteFinished { deleted, failed } => {
                    tracing::debug!(deleted, failed, "telemetry bulk delete finished")
                }
            }
            self.events.lock().push(event);
        }
        #[cfg(not(feature = "telemetry"))]
        {
            let _ = event;
        }
    }

    pub fn is_enabled(&self) -> bool {
        cfg!(feature = "telemetry")
    }

    /// Snapshot of everything recorded so far; always empty with the feature off.
    pub fn events(&self) -> Vec<Event> {
        #[cfg(feature = "telemetry")]
        {
            self.events.lock().clone()
        }
        #[cfg(not(feature = "telemetry"))]
        {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_events_when_enabled() {
        let handle = Handle::new();
        handle.record(Event::LoadCompleted {
            tasks: 2,
            projects: 1,
            tags: 0,
        });
        handle.record(Event::MutationApplied("create_task"));
        if handle.is_enabled() {
            assert_eq!(handle.events().len(), 2);
            assert_eq!(handle.events()[1], Event::MutationApplied("create_task"));
        } else {
            assert!(handle.events().is_empty());
        }
    }
}
