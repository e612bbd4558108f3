//! Entity access layer: one service per REST resource, all sharing a [`Transport`](crate::transport::Transport).

pub mod dashboard;
pub mod projects;
pub mod tags;
pub mod tasks;

pub use dashboard::DashboardService;
pub use projects::ProjectsService;
pub use tags::{extract_from_tasks, TagsService};
pub use tasks::{TasksService, TASK_PAGE_SIZE};
