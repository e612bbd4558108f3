use chrono::NaiveDate;
use taskdeck_core::dates::format_date;
use taskdeck_core::status::{icon, status_label};

use crate::model::{Project, Stats, Tag, Task};

pub(crate) fn task_line(task: &Task, today: NaiveDate) -> String {
    let mut line = format!(
        "#{:<4} {} {:<11} {}",
        task.id,
        icon(&task.status),
        status_label(task.status),
        task.title
    );

    if task.due_date.is_some() {
        line.push_str(&format!("  (due {}{})", format_date(task.due_date), due_marker(task, today)));
    }
    for name in task.tag_names() {
        line.push_str(&format!(" #{name}"));
    }
    if let Some(project) = &task.project {
        line.push_str(&format!("  [{}]", project.name));
    }
    line
}

pub(crate) fn task_detail(task: &Task, today: NaiveDate) -> Vec<String> {
    let mut lines = vec![
        format!("#{} {}", task.id, task.title),
        format!("Status:   {} {}", icon(&task.status), status_label(task.status)),
        format!("Due:      {}{}", format_date(task.due_date), due_marker(task, today)),
    ];

    let project = match (&task.project, task.project_id) {
        (Some(project), _) => format!("{} (#{})", project.name, project.id),
        (None, Some(id)) => format!("#{id}"),
        (None, None) => String::from("None"),
    };
    lines.push(format!("Project:  {project}"));

    let tags = task.tag_names();
    lines.push(format!(
        "Tags:     {}",
        if tags.is_empty() {
            String::from("None")
        } else {
            tags.join(", ")
        }
    ));

    if let Some(description) = task.description.as_deref().filter(|text| !text.is_empty()) {
        lines.push(String::new());
        lines.push(description.to_string());
    }
    lines
}

fn due_marker(task: &Task, today: NaiveDate) -> &'static str {
    if task.is_overdue_on(today) {
        ", overdue"
    } else if task.is_due_soon_on(today) {
        ", due soon"
    } else {
        ""
    }
}

pub(crate) fn project_line(project: &Project) -> String {
    match project.tasks_count {
        Some(count) => format!(
            "#{:<4} {} ({} task{})",
            project.id,
            project.name,
            count,
            if count == 1 { "" } else { "s" }
        ),
        None => format!("#{:<4} {}", project.id, project.name),
    }
}

pub(crate) fn tag_line(tag: &Tag) -> String {
    format!("#{}", tag.name)
}

pub(crate) fn stats_lines(stats: &Stats) -> Vec<String> {
    vec![
        format!("Total:       {}", stats.total),
        format!("To Do:       {}", stats.todo),
        format!("In Progress: {}", stats.in_progress),
        format!("Done:        {}", stats.done),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;
    use pretty_assertions::assert_eq;

    fn task(due: Option<NaiveDate>, status: TaskStatus) -> Task {
        serde_json::from_value(serde_json::json!({
            "id": 3,
            "title": "Renew passport",
            "status": status,
            "due_date": due.map(|d| d.to_string()),
            "tags": [{ "id": 1, "name": "admin" }],
            "project": { "id": 2, "name": "Life" },
            "project_id": 2
        }))
        .unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn line_flags_overdue_tasks() {
        let line = task_line(&task(Some(day(2)), TaskStatus::Todo), day(5));
        assert_eq!(
            line,
            "#3    📝 To Do       Renew passport  (due Jan 2, 2025, overdue) #admin  [Life]"
        );
    }

    #[test]
    fn done_tasks_are_never_flagged() {
        let line = task_line(&task(Some(day(2)), TaskStatus::Done), day(5));
        assert!(!line.contains("overdue"));
        let soon = task_line(&task(Some(day(6)), TaskStatus::InProgress), day(5));
        assert!(soon.contains("due soon"));
    }

    #[test]
    fn detail_lists_every_field() {
        let lines = task_detail(&task(None, TaskStatus::InProgress), day(5));
        assert_eq!(lines[2], "Due:      No date");
        assert_eq!(lines[3], "Project:  Life (#2)");
        assert_eq!(lines[4], "Tags:     admin");
    }
}
