use std::path::PathBuf;

use clap::{value_parser, ArgAction, Args, Parser, Subcommand};

use crate::capture::CaptureInput;
use crate::core::ProjectSelector;
use crate::model::{SortField, TaskStatus};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "Terminal client for the task management REST API.",
    after_help = "Examples:\n  taskdeck login --email ada@example.com\n  taskdeck add Write release notes #docs due:fri --project 3\n  taskdeck list --project 3 --tag docs --status todo\n  taskdeck delete 12 13"
)]
pub struct Cli {
    /// Base URL of the API (defaults to $TASKDECK_API_URL, then http://task_management.test/api)
    #[arg(long, value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Override the data directory holding stored credentials
    #[arg(long, value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Tracing filter written to stderr (e.g. "debug", "taskdeck_core=trace")
    #[arg(long = "log", value_name = "DIRECTIVE", global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Sign in and store the session token
    Login(LoginArgs),
    /// Create an account and sign in
    Register(RegisterArgs),
    /// Revoke the session and forget stored credentials
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List tasks, optionally filtered
    List(ListArgs),
    /// Show one task in detail
    Show(ShowArgs),
    /// Create a task
    Add(AddArgs),
    /// Change fields of an existing task
    Edit(EditArgs),
    /// Set the status of a task
    Status(StatusArgs),
    /// Delete one or more tasks by id
    Delete(DeleteArgs),
    /// List projects
    Projects(SearchArgs),
    /// List tags
    Tags(TagsArgs),
    /// Show task counters
    Stats,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    /// Read from stdin when omitted
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    /// Read from stdin when omitted
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only tasks in this project (`all` for no filter)
    #[arg(long, value_name = "ID|all")]
    pub project: Option<ProjectSelector>,

    /// Only tasks carrying every given tag (repeat or comma-separate)
    #[arg(long, value_delimiter = ',', action = ArgAction::Append)]
    pub tag: Vec<String>,

    #[arg(long, value_enum)]
    pub status: Option<TaskStatus>,

    /// Sort by due, title or created
    #[arg(long, value_name = "FIELD")]
    pub sort: Option<SortField>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[arg(value_name = "ID", value_parser = value_parser!(u64))]
    pub id: u64,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Task title with optional inline tokens (#tag, due:)
    #[arg(value_name = "TEXT", required = true)]
    pub text: Vec<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Project id
    #[arg(long, value_parser = value_parser!(u64))]
    pub project: Option<u64>,

    /// Add tags (comma-separated or repeated flag; '#' prefix optional)
    #[arg(long, value_delimiter = ',', action = ArgAction::Append)]
    pub tag: Vec<String>,

    /// Due date (2025-12-24, today, tomorrow, +3d, fri)
    #[arg(long, value_name = "DATE")]
    pub due: Option<String>,

    /// Initial status (defaults to todo)
    #[arg(long, value_enum)]
    pub status: Option<TaskStatus>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    #[arg(value_name = "ID", value_parser = value_parser!(u64))]
    pub id: u64,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Move to a project, or `none` to detach
    #[arg(long, value_name = "ID|none")]
    pub project: Option<ProjectSelector>,

    /// Replace the tag set (comma-separated or repeated flag)
    #[arg(long, value_delimiter = ',', action = ArgAction::Append)]
    pub tag: Vec<String>,

    /// Remove every tag
    #[arg(long, conflicts_with = "tag")]
    pub clear_tags: bool,

    /// New due date, or `none` to clear it
    #[arg(long, value_name = "DATE|none")]
    pub due: Option<String>,

    #[arg(long, value_enum)]
    pub status: Option<TaskStatus>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(value_name = "ID", value_parser = value_parser!(u64))]
    pub id: u64,

    #[arg(value_name = "STATUS", value_enum)]
    pub status: TaskStatus,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// One or more task ids to delete
    #[arg(value_name = "ID", required = true, value_parser = value_parser!(u64))]
    pub ids: Vec<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TagsArgs {
    /// Server-side search term
    #[arg(long, conflicts_with = "from_tasks")]
    pub search: Option<String>,

    /// List the tags in use by your tasks instead of asking the tag index
    #[arg(long)]
    pub from_tasks: bool,
}

impl From<AddArgs> for CaptureInput {
    fn from(args: AddArgs) -> Self {
        CaptureInput {
            text: args.text,
            description: args.description,
            project_id: args.project,
            tags: args.tag,
            due: args.due,
            status: args.status,
        }
    }
}
