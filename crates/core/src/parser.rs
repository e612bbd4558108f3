use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::capture::{CaptureInput, DraftError};
use crate::dates;
use crate::model::TaskDraft;
use crate::services::tasks::normalize_tags;

/// Tokens pulled out of the free-form capture text.
#[derive(Debug, Default)]
struct InlineTokens {
    title_words: Vec<String>,
    tags: Vec<String>,
    due_date: Option<NaiveDate>,
}

/// Turn capture input into a create payload, resolving dates against the local day.
pub fn parse_capture(input: &CaptureInput) -> Result<TaskDraft, DraftError> {
    parse_capture_on(input, dates::today())
}

pub fn parse_capture_on(input: &CaptureInput, today: NaiveDate) -> Result<TaskDraft, DraftError> {
    input.require_text()?;
    let raw_text = input.text.join(" ");
    let inline = parse_inline_tokens(&raw_text, today)?;

    let mut tags = inline.tags;
    tags.extend(input.tags.iter().cloned());

    let due_date = match &input.due {
        Some(spec) => Some(parse_date_spec_on(spec, today)?),
        None => inline.due_date,
    };

    let title = inline.title_words.join(" ").trim().to_string();
    if title.is_empty() {
        return Err(DraftError::EmptyTitle);
    }

    Ok(TaskDraft {
        title,
        description: input
            .description
            .as_ref()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()),
        project_id: input.project_id,
        tags: normalize_tags(tags),
        due_date,
        status: input.status.unwrap_or_default(),
    })
}

fn parse_inline_tokens(text: &str, today: NaiveDate) -> Result<InlineTokens, DraftError> {
    let mut result = InlineTokens::default();

    for raw_piece in text.split_whitespace() {
        let (piece, trailing) = strip_trailing_punctuation(raw_piece);
        if piece.starts_with('#') && piece.len() > 1 {
            result.tags.push(piece.trim_start_matches('#').to_string());
            if let Some(rest) = trailing {
                push_trailing(&mut result.title_words, rest);
            }
            continue;
        }
        if let Some(spec) = piece.strip_prefix("due:") {
            result.due_date = Some(parse_date_spec_on(spec, today)?);
            if let Some(rest) = trailing {
                push_trailing(&mut result.title_words, rest);
            }
            continue;
        }

        result.title_words.push(raw_piece.to_string());
    }

    Ok(result)
}

fn strip_trailing_punctuation(input: &str) -> (String, Option<String>) {
    // `+` and `-` stay attached so `due:+3d` and `due:2025-01-05` survive intact.
    static PUNCT_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[.,;:!?)\]]+$").expect("valid regex"));
    match PUNCT_RE.find(input) {
        Some(mat) if mat.start() > 0 => (
            input[..mat.start()].to_string(),
            Some(input[mat.start()..].to_string()),
        ),
        _ => (input.to_string(), None),
    }
}

fn push_trailing(words: &mut Vec<String>, trailing: String) {
    if let Some(last) = words.last_mut() {
        last.push_str(&trailing);
    }
}

pub fn parse_date_spec(spec: &str) -> Result<NaiveDate, DraftError> {
    parse_date_spec_on(spec, dates::today())
}

/// Resolve a due-date spec to a calendar day relative to `today`.
///
/// Weekday names always point into the future: naming today's weekday means a week out.
pub fn parse_date_spec_on(spec: &str, today: NaiveDate) -> Result<NaiveDate, DraftError> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(DraftError::EmptyDate);
    }

    let lower = trimmed.to_ascii_lowercase();
    match lower.as_str() {
        "today" => return Ok(today),
        "tomorrow" => return Ok(today + Duration::days(1)),
        _ => {}
    }

    if lower.starts_with('+') {
        return parse_relative_spec(&lower, today);
    }

    if let Some(weekday) = parse_weekday(&lower) {
        let mut days_ahead = (weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        if days_ahead == 0 {
            days_ahead = 7;
        }
        return Ok(today + Duration::days(days_ahead));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.date_naive());
    }

    Err(DraftError::UnknownDate(trimmed.to_string()))
}

fn parse_relative_spec(spec: &str, today: NaiveDate) -> Result<NaiveDate, DraftError> {
    static RELATIVE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\+(\d{1,4})([dwm])$").expect("valid regex"));
    let bad = || DraftError::BadRelative(spec.to_string());

    let caps = RELATIVE_RE.captures(spec).ok_or_else(bad)?;
    let value: u32 = caps[1].parse().map_err(|_| bad())?;
    match &caps[2] {
        "d" => Ok(today + Duration::days(value.into())),
        "w" => Ok(today + Duration::weeks(value.into())),
        _ => today.checked_add_months(Months::new(value)).ok_or_else(bad),
    }
}

fn parse_weekday(label: &str) -> Option<Weekday> {
    match label {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}
