use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::Select;

use super::format::{description, long_datetime, short_datetime};
use super::help::{self, HelpTopic};
use super::{fetch, heading, pause, pick};
use crate::api::{ApiClient, EnrollmentState};
use crate::models::{Course, DiscussionTopic};

pub fn show(api: &ApiClient) -> Result<()> {
    loop {
        let items = ["All Courses", "Choose a Course", "Help", "← Back to Main Menu"];
        let selection = Select::new()
            .with_prompt("Announcements")
            .items(&items)
            .default(0)
            .interact()?;
        match selection {
            0 | 1 => {
                let Some(courses) = fetch("courses", || api.courses(EnrollmentState::Active)) else {
                    continue;
                };
                let chosen: Vec<&Course> = if selection == 0 {
                    courses.iter().collect()
                } else {
                    let labels: Vec<String> = courses.iter().map(|c| c.name.clone()).collect();
                    match pick("Select a course", &labels)? {
                        Some(index) => vec![&courses[index]],
                        None => continue,
                    }
                };
                if chosen.is_empty() {
                    println!("{}", "\n  No active courses found".dark_grey());
                    continue;
                }
                let codes: Vec<String> = chosen.iter().map(|c| c.context_code()).collect();
                if let Some(mut topics) = fetch("announcements", || api.announcements(&codes)) {
                    newest_first(&mut topics);
                    browse(&topics, &courses)?;
                }
            }
            2 => help::show(HelpTopic::Announcements),
            _ => return Ok(()),
        }
    }
}

pub fn newest_first(topics: &mut [DiscussionTopic]) {
    topics.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
}

fn course_name<'a>(topic: &DiscussionTopic, courses: &'a [Course]) -> Option<&'a str> {
    let code = topic.context_code.as_deref()?;
    courses
        .iter()
        .find(|c| c.context_code() == code)
        .map(|c| c.name.as_str())
}

/// Lists topics and opens the chosen ones until the user goes back.
pub fn browse(topics: &[DiscussionTopic], courses: &[Course]) -> Result<()> {
    heading("Announcements");
    if topics.is_empty() {
        println!("{}", "\n  No announcements found".dark_grey());
        return pause();
    }
    for topic in topics {
        println!();
        println!("  📢 {}", topic.title.as_str().white().bold());
        let mut meta = Vec::new();
        if let Some(course) = course_name(topic, courses) {
            meta.push(course.to_string());
        }
        if let Some(author) = topic.author() {
            meta.push(author.to_string());
        }
        if let Some(at) = topic.posted_at {
            meta.push(short_datetime(at));
        }
        if !meta.is_empty() {
            println!("{}", format!("     {}", meta.join(" | ")).dark_grey());
        }
    }

    loop {
        println!();
        let labels: Vec<String> = topics.iter().map(|t| t.title.clone()).collect();
        let Some(index) = pick("Read an announcement", &labels)? else {
            return Ok(());
        };
        details(&topics[index], course_name(&topics[index], courses))?;
    }
}

fn details(topic: &DiscussionTopic, course: Option<&str>) -> Result<()> {
    heading("Announcement");
    println!("{}", format!("\n  {}", topic.title).white().bold());
    if let Some(course) = course {
        println!("{}", format!("  Course: {}", course).dark_grey());
    }
    if let Some(author) = topic.author() {
        println!("{}", format!("  From: {}", author).dark_grey());
    }
    if let Some(at) = topic.posted_at {
        println!("{}", format!("  Posted: {}", long_datetime(at)).dark_grey());
    }
    if let Some(text) = topic.message.as_deref().map(description) {
        println!();
        println!("  {}", text.white());
    }
    if let Some(url) = &topic.html_url {
        println!("{}", format!("\n  URL: {}", url).dark_grey());
    }
    pause()
}
