// Text helpers shared by the views.

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Longest description shown before cutting it off.
pub const DESCRIPTION_LIMIT: usize = 500;

/// US-style letter grade for a percentage.
pub fn letter_grade(percentage: f64) -> &'static str {
    const SCALE: [(f64, &str); 11] = [
        (93.0, "A"),
        (90.0, "A-"),
        (87.0, "B+"),
        (83.0, "B"),
        (80.0, "B-"),
        (77.0, "C+"),
        (73.0, "C"),
        (70.0, "C-"),
        (67.0, "D+"),
        (63.0, "D"),
        (60.0, "D-"),
    ];
    SCALE
        .iter()
        .find(|(floor, _)| percentage >= *floor)
        .map(|(_, letter)| *letter)
        .unwrap_or("F")
}

/// Drops anything between `<` and `>` and trims the result.
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

/// Cuts `text` to `limit` characters, adding `...` when something was cut.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Plain-text description ready for display.
pub fn description(html: &str) -> String {
    truncate(&strip_html(html), DESCRIPTION_LIMIT)
}

/// `Mar 5, 11:59 PM` in local time.
pub fn short_datetime(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%b %-d, %-I:%M %p").to_string()
}

/// `Tuesday, March 5, 2024 at 11:59 PM` in local time.
pub fn long_datetime(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%A, %B %-d, %Y at %-I:%M %p")
        .to_string()
}

pub fn time_of_day(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%-I:%M %p").to_string()
}

/// `Tuesday, March 5`
pub fn day_heading(day: NaiveDate) -> String {
    day.format("%A, %B %-d").to_string()
}

pub fn short_date(day: NaiveDate) -> String {
    day.format("%b %-d").to_string()
}

/// Scores without a pointless `.0`.
pub fn number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
