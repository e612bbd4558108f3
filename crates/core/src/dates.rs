//! Due-date policy: overdue and due-soon flags derived from a calendar day and a status.
//!
//! Both predicates compare calendar days only. `today` counts as due soon, never overdue.

use chrono::{Duration, Local, NaiveDate};

use crate::status::StatusLike;

/// Width of the due-soon window in days after today (inclusive).
pub const DUE_SOON_DAYS: i64 = 3;

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn is_overdue<S: StatusLike + ?Sized>(due: Option<NaiveDate>, status: &S) -> bool {
    is_overdue_on(due, status, today())
}

pub fn is_due_soon<S: StatusLike + ?Sized>(due: Option<NaiveDate>, status: &S) -> bool {
    is_due_soon_on(due, status, today())
}

pub fn is_overdue_on<S: StatusLike + ?Sized>(
    due: Option<NaiveDate>,
    status: &S,
    today: NaiveDate,
) -> bool {
    match due {
        Some(day) if !status.is_terminal() => day < today,
        _ => false,
    }
}

pub fn is_due_soon_on<S: StatusLike + ?Sized>(
    due: Option<NaiveDate>,
    status: &S,
    today: NaiveDate,
) -> bool {
    match due {
        Some(day) if !status.is_terminal() => {
            day >= today && day <= today + Duration::days(DUE_SOON_DAYS)
        }
        _ => false,
    }
}

/// `Jan 5, 2025`, or `No date` when absent.
pub fn format_date(due: Option<NaiveDate>) -> String {
    match due {
        Some(day) => day.format("%b %-d, %Y").to_string(),
        None => String::from("No date"),
    }
}

/// Same as [`format_date`] but for raw wire values, which may be malformed.
pub fn format_raw_date(raw: Option<&str>) -> String {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => String::from("No date"),
        Some(value) => match crate::model::calendar_date::parse(value) {
            Some(day) => format_date(Some(day)),
            None => String::from("Invalid date"),
        },
    }
}
