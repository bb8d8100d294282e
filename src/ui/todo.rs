use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use crossterm::style::Stylize;
use dialoguer::Select;
use serde_json::Value;

use super::format::{description, short_datetime};
use super::help::{self, HelpTopic};
use super::{ask, ask_optional, confirm, fetch, heading, pause, perform, pick};
use crate::api::ApiClient;
use crate::models::PlannerNoteRequest;

/// An item the user marked complete during this session, so it can be
/// restored.
struct Completed {
    override_id: u64,
    label: String,
}

pub fn show(api: &ApiClient) -> Result<()> {
    let mut completed: Vec<Completed> = Vec::new();
    loop {
        let items = [
            "To-do list",
            "Restore a completed item",
            "Planner notes",
            "New planner note",
            "Help",
            "← Back to Main Menu",
        ];
        let selection = Select::new()
            .with_prompt("To-do")
            .items(&items)
            .default(0)
            .interact()?;
        match selection {
            0 => todo_list(api, &mut completed)?,
            1 => restore(api, &mut completed)?,
            2 => notes(api)?,
            3 => create_note(api)?,
            4 => help::show(HelpTopic::Todo),
            _ => return Ok(()),
        }
    }
}

/// What the service calls the underlying object and its id, for overrides.
fn plannable(item: &Value) -> Option<(&'static str, u64)> {
    for kind in ["assignment", "quiz", "discussion_topic", "wiki_page"] {
        if let Some(id) = item.get(kind).and_then(|v| v.get("id")).and_then(Value::as_u64) {
            return Some((kind, id));
        }
    }
    None
}

fn item_title(item: &Value) -> &str {
    ["assignment", "quiz"]
        .iter()
        .filter_map(|kind| item.get(*kind))
        .find_map(|v| v.get("name").or_else(|| v.get("title")).and_then(Value::as_str))
        .unwrap_or("Untitled")
}

fn item_due(item: &Value) -> Option<DateTime<Utc>> {
    item.get("assignment")
        .or_else(|| item.get("quiz"))
        .and_then(|v| v.get("due_at"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

fn item_label(item: &Value) -> String {
    let course = item.get("context_name").and_then(Value::as_str).unwrap_or("Unknown Course");
    format!("{} - {}", course, item_title(item))
}

fn todo_list(api: &ApiClient, completed: &mut Vec<Completed>) -> Result<()> {
    let Some(items) = fetch("to-do items", || api.todos()) else {
        return Ok(());
    };
    heading("To-do");
    if items.is_empty() {
        println!("{}", "\n  Nothing needs your attention".green());
        return pause();
    }
    for item in &items {
        let action = match item.get("type").and_then(Value::as_str) {
            Some("grading") => "Grade",
            _ => "Submit",
        };
        println!();
        println!("  ☐ {}", item_title(item).white().bold());
        let mut meta = vec![action.to_string()];
        if let Some(course) = item.get("context_name").and_then(Value::as_str) {
            meta.push(course.to_string());
        }
        if let Some(due) = item_due(item) {
            meta.push(format!("Due: {}", short_datetime(due)));
        }
        println!("{}", format!("     {}", meta.join(" | ")).dark_grey());
    }

    println!();
    let labels: Vec<String> = items.iter().map(item_label).collect();
    let Some(index) = pick("Mark an item complete", &labels)? else {
        return Ok(());
    };
    let Some((kind, id)) = plannable(&items[index]) else {
        println!("{}", "This item cannot be marked complete".yellow());
        return Ok(());
    };
    if let Some(created) = perform("Marking complete", || api.create_todo_override(kind, id, true)) {
        if let Some(override_id) = created.get("id").and_then(Value::as_u64) {
            completed.push(Completed {
                override_id,
                label: labels[index].clone(),
            });
        }
    }
    Ok(())
}

fn restore(api: &ApiClient, completed: &mut Vec<Completed>) -> Result<()> {
    if completed.is_empty() {
        println!("{}", "Nothing was marked complete in this session".dark_grey());
        return Ok(());
    }
    let labels: Vec<String> = completed.iter().map(|c| c.label.clone()).collect();
    let Some(index) = pick("Restore which item?", &labels)? else {
        return Ok(());
    };
    let override_id = completed[index].override_id;
    if perform("Restoring item", || api.update_todo_override(override_id, false)).is_some() {
        completed.remove(index);
    }
    Ok(())
}

fn note_label(note: &Value) -> String {
    let title = note.get("title").and_then(Value::as_str).unwrap_or("Untitled");
    let date = note
        .get("todo_date")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
        .map(short_datetime);
    match date {
        Some(date) => format!("{} ({})", title, date),
        None => title.to_string(),
    }
}

fn notes(api: &ApiClient) -> Result<()> {
    let Some(notes) = fetch("planner notes", || api.planner_notes()) else {
        return Ok(());
    };
    heading("Planner Notes");
    if notes.is_empty() {
        println!("{}", "\n  No planner notes".dark_grey());
        return pause();
    }
    let labels: Vec<String> = notes.iter().map(note_label).collect();
    let Some(index) = pick("Open a note", &labels)? else {
        return Ok(());
    };
    let note = &notes[index];
    let Some(id) = note.get("id").and_then(Value::as_u64) else {
        return Ok(());
    };
    println!("{}", format!("\n  {}", labels[index]).white().bold());
    if let Some(details) = note.get("details").and_then(Value::as_str).map(description) {
        println!("  {}", details.white());
    }
    println!();

    let actions = ["Edit", "Delete", "← Back"];
    let action = Select::new()
        .with_prompt("What would you like to do?")
        .items(&actions)
        .default(0)
        .interact()?;
    match action {
        0 => {
            let request = PlannerNoteRequest {
                title: ask_optional("New title (empty keeps it)")?,
                details: ask_optional("New details (empty keeps them)")?,
                ..PlannerNoteRequest::default()
            };
            perform("Updating note", || api.update_planner_note(id, &request));
        }
        1 => {
            if confirm("Delete this note?")? {
                perform("Deleting note", || api.delete_planner_note(id));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Noon local time on `day`, which keeps the note on that day in any zone
/// near the user's.
fn note_date(day: NaiveDate) -> Option<DateTime<Utc>> {
    let noon = NaiveTime::from_hms_opt(12, 0, 0)?;
    Local
        .from_local_datetime(&day.and_time(noon))
        .earliest()
        .map(|at| at.with_timezone(&Utc))
}

fn create_note(api: &ApiClient) -> Result<()> {
    let title = ask("Title")?;
    let details = ask_optional("Details (optional)")?;
    let todo_date = match ask_optional("Date (YYYY-MM-DD, optional)")? {
        Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(day) => note_date(day),
            Err(_) => {
                println!("{}", "Ignoring date that is not YYYY-MM-DD".yellow());
                None
            }
        },
        None => None,
    };
    let request = PlannerNoteRequest {
        title: Some(title),
        details,
        todo_date,
        course_id: None,
    };
    perform("Creating note", || api.create_planner_note(&request));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plannable_prefers_the_nested_object_id() {
        let item = json!({"type": "submitting", "assignment": {"id": 42, "name": "Essay"}});
        assert_eq!(plannable(&item), Some(("assignment", 42)));
        let quiz = json!({"type": "submitting", "quiz": {"id": 7, "title": "Pop quiz"}});
        assert_eq!(plannable(&quiz), Some(("quiz", 7)));
        assert_eq!(item_title(&quiz), "Pop quiz");
        assert_eq!(plannable(&json!({"type": "grading"})), None);
    }

    #[test]
    fn labels_fall_back_when_fields_are_missing() {
        let item = json!({"context_name": "Biology", "assignment": {"id": 1, "name": "Lab report"}});
        assert_eq!(item_label(&item), "Biology - Lab report");
        assert_eq!(item_label(&json!({})), "Unknown Course - Untitled");
        assert_eq!(note_label(&json!({"title": "Buy a notebook"})), "Buy a notebook");
    }

    #[test]
    fn note_dates_land_on_the_chosen_day() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let at = note_date(day).unwrap();
        assert_eq!(at.with_timezone(&Local).date_naive(), day);
    }
}
