use std::fmt;
use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};

use crate::cli::{
    AddArgs, CliCommand, DeleteArgs, EditArgs, ListArgs, LoginArgs, RegisterArgs, SearchArgs,
    ShowArgs, StatusArgs, TagsArgs,
};
use crate::config::AppConfig;
use crate::core::dates;
use crate::core::error::{BulkDeleteError, ClientError};
use crate::core::parser::{parse_capture, parse_date_spec};
use crate::core::services::DashboardService;
use crate::core::transport::{HttpTransport, Transport};
use crate::core::{AuthService, Coordinator, CredentialStore, FilterCriteria, Session, TagRef};
use crate::model::{sort_tasks, TaskPatch};
use crate::render;

/// Everything a command needs, wired around one shared [`Session`].
pub struct App {
    session: Session,
    auth: AuthService,
    coordinator: Coordinator,
    dashboard: DashboardService,
}

impl App {
    /// Restore stored credentials and talk to the configured API over HTTP.
    pub fn connect(config: AppConfig) -> Result<Self> {
        let store = CredentialStore::new(&config);
        let session = Session::restore(&store);
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config, session.clone())?);
        Ok(Self::with_transport(session, store, transport))
    }

    pub fn with_transport(
        session: Session,
        store: CredentialStore,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            auth: AuthService::new(transport.clone(), session.clone(), store),
            coordinator: Coordinator::new(transport.clone(), session.clone()),
            dashboard: DashboardService::new(transport),
            session,
        }
    }
}

pub async fn execute<W: Write>(app: &App, command: CliCommand, mut writer: W) -> Result<()> {
    match command {
        CliCommand::Login(args) => handle_login(app, args, &mut writer).await,
        CliCommand::Register(args) => handle_register(app, args, &mut writer).await,
        CliCommand::Logout => {
            app.auth.logout().await;
            writeln!(writer, "Logged out")?;
            Ok(())
        }
        CliCommand::Whoami => handle_whoami(app, &mut writer).await,
        CliCommand::List(args) => handle_list(app, &args, &mut writer).await,
        CliCommand::Show(args) => handle_show(app, &args, &mut writer).await,
        CliCommand::Add(args) => handle_add(app, args, &mut writer).await,
        CliCommand::Edit(args) => handle_edit(app, args, &mut writer).await,
        CliCommand::Status(args) => handle_status(app, &args, &mut writer).await,
        CliCommand::Delete(args) => handle_delete(app, &args, &mut writer).await,
        CliCommand::Projects(args) => handle_projects(app, &args, &mut writer).await,
        CliCommand::Tags(args) => handle_tags(app, &args, &mut writer).await,
        CliCommand::Stats => {
            let stats = app.dashboard.stats().await.map_err(explain)?;
            for line in render::stats_lines(&stats) {
                writeln!(writer, "{line}")?;
            }
            Ok(())
        }
    }
}

async fn handle_login<W: Write>(app: &App, args: LoginArgs, mut writer: W) -> Result<()> {
    let password = resolve_password(args.password)?;
    let user = app.auth.login(&args.email, &password).await.map_err(explain)?;
    writeln!(writer, "Logged in as {} <{}>", user.name, user.email)?;
    Ok(())
}

async fn handle_register<W: Write>(app: &App, args: RegisterArgs, mut writer: W) -> Result<()> {
    let password = resolve_password(args.password)?;
    let user = app
        .auth
        .register(&args.name, &args.email, &password)
        .await
        .map_err(explain)?;
    writeln!(writer, "Registered and logged in as {} <{}>", user.name, user.email)?;
    Ok(())
}

async fn handle_whoami<W: Write>(app: &App, mut writer: W) -> Result<()> {
    if !app.session.is_authenticated() {
        writeln!(writer, "Not logged in")?;
        return Ok(());
    }
    let user = app.auth.current_user().await.map_err(explain)?;
    writeln!(writer, "{} <{}> (#{})", user.name, user.email, user.id)?;
    Ok(())
}

async fn handle_list<W: Write>(app: &App, args: &ListArgs, mut writer: W) -> Result<()> {
    app.coordinator.load().await.map_err(explain)?;

    let criteria = FilterCriteria {
        project_id: args.project.and_then(|selector| selector.0),
        tags: args
            .tag
            .iter()
            .map(|name| TagRef::from(name.as_str()))
            .filter(|tag| !matches!(tag, TagRef::Name(name) if name.is_empty()))
            .collect(),
        status: args.status,
    };
    let mut tasks = app.coordinator.apply_filters(criteria);
    if let Some(field) = args.sort {
        sort_tasks(&mut tasks, field);
    }

    let total = app.coordinator.tasks().len();
    if tasks.is_empty() {
        writeln!(writer, "No tasks match")?;
    } else {
        let today = dates::today();
        for task in &tasks {
            writeln!(writer, "{}", render::task_line(task, today))?;
        }
    }
    writeln!(writer, "{} of {} task{}", tasks.len(), total, if total == 1 { "" } else { "s" })?;
    Ok(())
}

async fn handle_show<W: Write>(app: &App, args: &ShowArgs, mut writer: W) -> Result<()> {
    let task = app
        .coordinator
        .tasks_service()
        .get(args.id)
        .await
        .map_err(explain)?;
    for line in render::task_detail(&task, dates::today()) {
        writeln!(writer, "{line}")?;
    }
    Ok(())
}

async fn handle_add<W: Write>(app: &App, args: AddArgs, mut writer: W) -> Result<()> {
    let draft = parse_capture(&args.into())?;
    let task = app.coordinator.create_task(draft).await.map_err(explain)?;
    writeln!(writer, "Created task #{}: {}", task.id, task.title)?;
    Ok(())
}

async fn handle_edit<W: Write>(app: &App, args: EditArgs, mut writer: W) -> Result<()> {
    let id = args.id;
    let patch = patch_from_args(args)?;
    if patch.is_empty() {
        bail!("Nothing to update for task #{id}; pass at least one field to change");
    }
    let task = app.coordinator.update_task(id, patch).await.map_err(explain)?;
    writeln!(writer, "Updated task #{}: {}", task.id, task.title)?;
    Ok(())
}

fn patch_from_args(args: EditArgs) -> Result<TaskPatch> {
    let tags = if args.clear_tags {
        Some(Vec::new())
    } else if args.tag.is_empty() {
        None
    } else {
        Some(args.tag)
    };

    let due_date = match args.due.as_deref().map(str::trim) {
        None => None,
        Some(spec) if matches!(spec.to_ascii_lowercase().as_str(), "none" | "clear") => Some(None),
        Some(spec) => Some(Some(parse_date_spec(spec)?)),
    };

    Ok(TaskPatch {
        title: args.title,
        description: args.description,
        project_id: args.project.map(|selector| selector.0),
        tags,
        due_date,
        status: args.status,
    })
}

async fn handle_status<W: Write>(app: &App, args: &StatusArgs, mut writer: W) -> Result<()> {
    let task = app
        .coordinator
        .update_status(args.id, args.status)
        .await
        .map_err(explain)?;
    writeln!(writer, "Task #{} is now {}", task.id, task.status)?;
    Ok(())
}

async fn handle_delete<W: Write>(app: &App, args: &DeleteArgs, mut writer: W) -> Result<()> {
    let summary = match app.coordinator.bulk_delete(&args.ids).await {
        Ok(deleted) => DeleteSummary {
            deleted: deleted.len(),
            failed: Vec::new(),
        },
        Err(err) => {
            DeleteSummary::from_error(&err).write_to(&mut writer)?;
            return Err(err.into());
        }
    };
    summary.write_to(&mut writer)?;
    Ok(())
}

async fn handle_projects<W: Write>(app: &App, args: &SearchArgs, mut writer: W) -> Result<()> {
    let projects = match args.search.as_deref() {
        Some(query) => app.coordinator.search_projects(query).await,
        None => app.coordinator.projects_service().list(None).await,
    }
    .map_err(explain)?;
    if projects.is_empty() {
        writeln!(writer, "No projects")?;
    }
    for project in &projects {
        writeln!(writer, "{}", render::project_line(project))?;
    }
    Ok(())
}

async fn handle_tags<W: Write>(app: &App, args: &TagsArgs, mut writer: W) -> Result<()> {
    let tags = if args.from_tasks {
        app.coordinator.load().await.map_err(explain)?;
        app.coordinator.tag_catalog()
    } else {
        app.coordinator
            .tags_service()
            .list(args.search.as_deref())
            .await
    };
    if tags.is_empty() {
        writeln!(writer, "No tags")?;
    }
    for tag in &tags {
        writeln!(writer, "{}", render::tag_line(tag))?;
    }
    Ok(())
}

fn resolve_password(flag: Option<String>) -> Result<String> {
    if let Some(password) = flag {
        return Ok(password);
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(anyhow!("Password is required (pass --password or pipe it on stdin)"));
    }
    Ok(password)
}

/// Attach a hint for the one failure users can fix themselves.
fn explain(err: ClientError) -> anyhow::Error {
    if err.is_unauthorized() {
        anyhow::Error::new(err).context("Not signed in or session expired; run `taskdeck login`")
    } else {
        anyhow::Error::new(err)
    }
}

struct DeleteSummary {
    deleted: usize,
    failed: Vec<(u64, String)>,
}

impl DeleteSummary {
    fn from_error(err: &BulkDeleteError) -> Self {
        Self {
            deleted: err.deleted.len(),
            failed: err
                .failures
                .iter()
                .map(|(id, err)| (*id, err.to_string()))
                .collect(),
        }
    }

    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", SummaryLine::deleted(self.deleted))?;
        for (id, reason) in &self.failed {
            writeln!(writer, "Failed to delete #{id}: {reason}")?;
        }
        Ok(())
    }
}

enum SummaryLine {
    Deleted(usize),
    NoneDeleted,
}

impl SummaryLine {
    fn deleted(count: usize) -> Self {
        if count > 0 {
            SummaryLine::Deleted(count)
        } else {
            SummaryLine::NoneDeleted
        }
    }
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryLine::Deleted(count) => {
                write!(
                    f,
                    "Deleted {} task{}",
                    count,
                    if *count == 1 { "" } else { "s" }
                )
            }
            SummaryLine::NoneDeleted => write!(f, "No tasks deleted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn task(id: u64, title: &str, project_id: Option<u64>, tags: &[&str]) -> Value {
        let tags: Vec<Value> = tags
            .iter()
            .enumerate()
            .map(|(idx, name)| json!({ "id": idx + 1, "name": name }))
            .collect();
        json!({ "id": id, "title": title, "status": "todo", "project_id": project_id, "tags": tags })
    }

    async fn mount_collections(server: &MockServer) {
        let routes = [
            (
                "/tasks",
                json!({ "success": true, "data": { "data": [
                    task(1, "Draft plan", Some(10), &["ops"]),
                    task(2, "Buy milk", None, &["home"])
                ] } }),
            ),
            ("/projects", json!({ "success": true, "data": [{ "id": 10, "name": "Launch" }] })),
            ("/tags", json!({ "success": true, "data": [] })),
            (
                "/dashboard",
                json!({ "success": true, "data": { "total_tasks": 2, "todo": 2, "in_progress": 0, "done": 0 } }),
            ),
        ];
        for (route, body) in routes {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(server)
                .await;
        }
    }

    fn app(server: &MockServer, dir: &TempDir) -> App {
        let config = AppConfig::new(server.uri(), dir.path().to_path_buf());
        App::connect(config).expect("app")
    }

    async fn run(app: &App, args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("taskdeck").chain(args.iter().copied()))?;
        let mut output = Vec::new();
        execute(app, cli.command, &mut output).await?;
        Ok(String::from_utf8(output).expect("utf8"))
    }

    async fn run_with_output(app: &App, args: &[&str]) -> (Result<()>, String) {
        let cli = Cli::try_parse_from(std::iter::once("taskdeck").chain(args.iter().copied()))
            .expect("valid arguments");
        let mut output = Vec::new();
        let result = execute(app, cli.command, &mut output).await;
        (result, String::from_utf8(output).expect("utf8"))
    }

    #[tokio::test]
    async fn list_applies_project_filter() {
        let server = MockServer::start().await;
        mount_collections(&server).await;
        let dir = TempDir::new().unwrap();
        let app = app(&server, &dir);

        let output = run(&app, &["list", "--project", "10"]).await.unwrap();
        assert!(output.contains("Draft plan"));
        assert!(!output.contains("Buy milk"));
        assert!(output.ends_with("1 of 2 tasks\n"));
    }

    #[tokio::test]
    async fn list_tag_filter_uses_and_semantics() {
        let server = MockServer::start().await;
        mount_collections(&server).await;
        let dir = TempDir::new().unwrap();
        let app = app(&server, &dir);

        let output = run(&app, &["list", "--tag", "ops,home"]).await.unwrap();
        assert!(output.starts_with("No tasks match"));
    }

    #[tokio::test]
    async fn add_sends_parsed_draft() {
        let server = MockServer::start().await;
        mount_collections(&server).await;
        Mock::given(method("POST"))
            .and(path("/tasks"))
            .and(body_partial_json(json!({ "title": "Write notes", "tags": ["docs"], "project_id": 10 })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({ "success": true, "data": task(3, "Write notes", Some(10), &["docs"]) })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let app = app(&server, &dir);

        let output = run(&app, &["add", "Write", "notes", "#docs", "--project", "10"])
            .await
            .unwrap();
        assert_eq!(output, "Created task #3: Write notes\n");
    }

    #[tokio::test]
    async fn add_reports_server_validation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "The selected project id is invalid.",
                "errors": { "project_id": ["The selected project id is invalid."] }
            })))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let app = app(&server, &dir);

        let err = run(&app, &["add", "Orphan", "--project", "99"]).await.unwrap_err();
        assert_eq!(err.to_string(), "The selected project id is invalid.");
    }

    #[tokio::test]
    async fn delete_reports_deleted_and_failed() {
        let server = MockServer::start().await;
        mount_collections(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/9"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Task not found" })))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let app = app(&server, &dir);

        let (result, output) = run_with_output(&app, &["delete", "1", "9"]).await;
        assert_eq!(output, "Deleted 1 task\nFailed to delete #9: Task not found\n");
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Failed to delete 1 of 2 tasks (#9: Task not found)");
    }

    #[tokio::test]
    async fn delete_fails_when_every_deletion_fails() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/1"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "Server exploded" })))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let app = app(&server, &dir);

        let (result, output) = run_with_output(&app, &["delete", "1"]).await;
        assert_eq!(output, "No tasks deleted\nFailed to delete #1: Server exploded\n");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_succeeds_when_every_deletion_succeeds() {
        let server = MockServer::start().await;
        mount_collections(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let app = app(&server, &dir);

        let output = run(&app, &["delete", "1"]).await.unwrap();
        assert_eq!(output, "Deleted 1 task\n");
    }

    #[tokio::test]
    async fn delete_handles_no_matches() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let app = app(&server, &dir);

        let (result, output) = run_with_output(&app, &["delete", "5"]).await;
        assert!(output.starts_with("No tasks deleted"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn edit_without_fields_is_rejected_locally() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let app = app(&server, &dir);

        let err = run(&app, &["edit", "4"]).await.unwrap_err();
        assert!(err.to_string().contains("Nothing to update"));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[test]
    fn edit_patch_clears_due_date_and_project() {
        let patch = patch_from_args(EditArgs {
            id: 4,
            due: Some("none".into()),
            project: Some(crate::core::ProjectSelector(None)),
            clear_tags: true,
            ..EditArgs::default()
        })
        .unwrap();
        assert_eq!(patch.due_date, Some(None));
        assert_eq!(patch.project_id, Some(None));
        assert_eq!(patch.tags, Some(Vec::new()));
    }

    #[tokio::test]
    async fn login_persists_session_for_later_commands() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok-9",
                "token_type": "Bearer",
                "user": { "id": 1, "name": "Ada", "email": "ada@example.com" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer tok-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "user": { "id": 1, "name": "Ada", "email": "ada@example.com" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();

        let first = app(&server, &dir);
        let output = run(&first, &["login", "--email", "ada@example.com", "--password", "secret"])
            .await
            .unwrap();
        assert_eq!(output, "Logged in as Ada <ada@example.com>\n");

        // a fresh process restores the token from disk
        let second = app(&server, &dir);
        let output = run(&second, &["whoami"]).await.unwrap();
        assert_eq!(output, "Ada <ada@example.com> (#1)\n");
    }

    #[tokio::test]
    async fn unauthorized_errors_suggest_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dashboard"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Unauthenticated." })))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let app = app(&server, &dir);

        let err = run(&app, &["stats"]).await.unwrap_err();
        assert!(err.to_string().contains("taskdeck login"));
    }
}
