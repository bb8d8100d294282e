use anyhow::Result;
use chrono::Utc;
use crossterm::style::Stylize;
use dialoguer::Select;
use serde_json::Value;
use std::path::PathBuf;

use super::format::{description, long_datetime, number, short_datetime};
use super::help::{self, HelpTopic};
use super::{ask, confirm, fetch, heading, pause, perform, pick};
use crate::api::ApiClient;
use crate::models::{Assignment, AssignmentFilter, SubmissionRequest, SubmissionStatus, UploadTarget};

pub fn show(api: &ApiClient) -> Result<()> {
    loop {
        let mut items: Vec<String> = AssignmentFilter::ALL
            .iter()
            .map(|f| format!("{} Assignments", f.title()))
            .collect();
        items.push("Help".to_string());
        items.push("← Back to Main Menu".to_string());
        let selection = Select::new()
            .with_prompt("Assignment Filter")
            .items(&items)
            .default(0)
            .interact()?;
        let filter = match AssignmentFilter::ALL.get(selection) {
            Some(filter) => *filter,
            None if selection == AssignmentFilter::ALL.len() => {
                help::show(HelpTopic::Assignments);
                continue;
            }
            None => return Ok(()),
        };

        let Some(assignments) = fetch("assignments", || api.all_assignments()) else {
            continue;
        };
        let filtered = filter.apply(&assignments, Utc::now());
        heading(&format!("Assignments - {}", filter.title()));
        display_grouped(&filtered);
        browse(api, &filtered)?;
    }
}

/// Prints assignments grouped by course, keeping their order inside each
/// group.
pub fn display_grouped(assignments: &[Assignment]) {
    if assignments.is_empty() {
        println!("{}", "\n  No assignments found".dark_grey());
        return;
    }
    let mut groups: Vec<(&str, Vec<&Assignment>)> = Vec::new();
    for assignment in assignments {
        let course = assignment.course_name.as_deref().unwrap_or("Unknown Course");
        match groups.iter_mut().find(|(name, _)| *name == course) {
            Some((_, list)) => list.push(assignment),
            None => groups.push((course, vec![assignment])),
        }
    }
    for (course, list) in groups {
        println!();
        println!("{}", format!("  {}", course).yellow().bold());
        println!("{}", format!("  {}", "─".repeat(40)).dark_grey());
        for assignment in list {
            display_line(assignment);
        }
    }
}

fn status_icon(status: SubmissionStatus) -> &'static str {
    match status {
        SubmissionStatus::NotSubmitted => "○",
        SubmissionStatus::Submitted | SubmissionStatus::Graded => "✓",
        SubmissionStatus::Missing => "✗",
        SubmissionStatus::Late => "⚠",
    }
}

fn display_line(assignment: &Assignment) {
    let status = assignment.status();
    println!("  {} {}", status_icon(status), assignment.name.as_str().white());

    let mut details = Vec::new();
    if let Some(due) = assignment.due_at {
        let text = format!("Due: {}", short_datetime(due));
        let overdue = due < Utc::now()
            && !matches!(status, SubmissionStatus::Submitted | SubmissionStatus::Graded);
        details.push(if overdue { text.red().to_string() } else { text });
    }
    if let Some(points) = assignment.points_possible.filter(|p| *p > 0.0) {
        details.push(format!("Points: {}", number(points)));
    }
    if let (Some(score), Some(pct)) = (
        assignment.submission.as_ref().and_then(|s| s.score),
        assignment.percentage(),
    ) {
        let possible = assignment.points_possible.unwrap_or_default();
        details.push(
            format!("Score: {}/{} ({:.1}%)", number(score), number(possible), pct)
                .green()
                .to_string(),
        );
    }
    if !details.is_empty() {
        println!("     {}", details.join(" | ").dark_grey());
    }
}

/// Lets the user open assignments from a list until they go back.
pub fn browse(api: &ApiClient, assignments: &[Assignment]) -> Result<()> {
    if assignments.is_empty() {
        return pause();
    }
    loop {
        println!();
        if !confirm("Would you like to view assignment details?")? {
            return Ok(());
        }
        let labels: Vec<String> = assignments
            .iter()
            .map(|a| {
                let due = a
                    .due_at
                    .map(short_datetime)
                    .unwrap_or_else(|| "No due date".to_string());
                format!(
                    "{} - {} ({})",
                    a.course_name.as_deref().unwrap_or("Unknown"),
                    a.name,
                    due
                )
            })
            .collect();
        if let Some(index) = pick("Select an assignment", &labels)? {
            details(api, &assignments[index])?;
        }
    }
}

fn details(api: &ApiClient, assignment: &Assignment) -> Result<()> {
    heading("Assignment Details");
    println!("{}", format!("\n  {}", assignment.name).white().bold());
    println!(
        "{}",
        format!("  Course: {}", assignment.course_name.as_deref().unwrap_or("Unknown")).dark_grey()
    );
    if let Some(due) = assignment.due_at {
        println!("{}", format!("  Due: {}", long_datetime(due)).dark_grey());
    }
    if let Some(points) = assignment.points_possible {
        println!("{}", format!("  Points: {}", number(points)).dark_grey());
    }
    if !assignment.submission_types.is_empty() {
        println!(
            "{}",
            format!("  Submission Types: {}", assignment.submission_types.join(", ")).dark_grey()
        );
    }

    if let Some(submission) = &assignment.submission {
        println!();
        println!("{}", "  Submission Status:".yellow());
        println!(
            "{}",
            format!("    State: {}", assignment.status().label()).dark_grey()
        );
        if let Some(at) = submission.submitted_at {
            println!("{}", format!("    Submitted: {}", short_datetime(at)).dark_grey());
        }
        if let (Some(score), Some(pct)) = (submission.score, assignment.percentage()) {
            let possible = assignment.points_possible.unwrap_or_default();
            println!(
                "{}",
                format!("    Score: {}/{} ({:.1}%)", number(score), number(possible), pct).green()
            );
        }
        if let Some(grade) = &submission.grade {
            println!("{}", format!("    Grade: {}", grade).green());
        }
        if !submission.attachments.is_empty() {
            println!(
                "{}",
                format!("    Attachments: {}", submission.attachments.len()).dark_grey()
            );
        }
    }

    if let Some(text) = assignment.description.as_deref().map(description).filter(|d| !d.is_empty()) {
        println!();
        println!("{}", "  Description:".yellow());
        println!("  {}", text.white());
    }
    if let Some(url) = &assignment.html_url {
        println!();
        println!("{}", format!("  URL: {}", url).dark_grey());
    }

    match assignment.course_id {
        Some(course_id) if accepts_online_work(assignment) => {
            println!();
            if confirm("Submit work for this assignment?")? {
                submit(api, course_id, assignment)?;
            }
            Ok(())
        }
        _ => pause(),
    }
}

fn accepts_online_work(assignment: &Assignment) -> bool {
    assignment
        .submission_types
        .iter()
        .any(|t| matches!(t.as_str(), "online_text_entry" | "online_url" | "online_upload"))
}

fn submit(api: &ApiClient, course_id: u64, assignment: &Assignment) -> Result<()> {
    let offered: Vec<(&str, &str)> = [
        ("online_text_entry", "Text entry"),
        ("online_url", "Website URL"),
        ("online_upload", "File upload"),
    ]
    .into_iter()
    .filter(|(kind, _)| assignment.submission_types.iter().any(|t| t.as_str() == *kind))
    .collect();
    let labels: Vec<String> = offered.iter().map(|(_, label)| label.to_string()).collect();
    let Some(index) = pick("How do you want to submit?", &labels)? else {
        return Ok(());
    };

    let request = match offered[index].0 {
        "online_text_entry" => SubmissionRequest::OnlineTextEntry {
            body: ask("Text to submit")?,
        },
        "online_url" => SubmissionRequest::OnlineUrl {
            url: ask("URL to submit")?,
        },
        _ => {
            let path = PathBuf::from(ask("File path")?.trim());
            let target = UploadTarget::Submission {
                course_id,
                assignment_id: assignment.id,
            };
            let Some(file) = perform("Uploading file", || api.upload_file(target, &path)) else {
                return Ok(());
            };
            let Some(file_id) = file.get("id").and_then(Value::as_u64) else {
                println!("{}", "Upload finished but no file id came back".red());
                return Ok(());
            };
            SubmissionRequest::OnlineUpload {
                file_ids: vec![file_id],
            }
        }
    };
    perform("Submitting assignment", || {
        api.submit_assignment(course_id, assignment.id, &request)
    });
    pause()
}
