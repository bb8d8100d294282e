use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::Select;
use serde_json::Value;
use std::path::PathBuf;

use super::format::{description, letter_grade, number, short_datetime, strip_html, truncate};
use super::help::{self, HelpTopic};
use super::{announcements, assignments, ask, confirm, fetch, heading, pause, perform, pick};
use crate::api::{ApiClient, EnrollmentState};
use crate::models::{sort_by_due_date, Course, DiscussionTopic, UploadTarget};

pub fn show(api: &ApiClient) -> Result<()> {
    loop {
        let items = [
            "Active courses",
            "Completed courses",
            "Search courses",
            "My files",
            "Help",
            "← Back to Main Menu",
        ];
        let selection = Select::new()
            .with_prompt("Courses")
            .items(&items)
            .default(0)
            .interact()?;
        let courses = match selection {
            0 => fetch("courses", || api.courses(EnrollmentState::Active)),
            1 => fetch("courses", || api.courses(EnrollmentState::Completed)),
            2 => {
                let query = ask("Search for")?;
                fetch("courses", || api.search_courses(query.trim()))
            }
            3 => {
                my_files(api)?;
                continue;
            }
            4 => {
                help::show(HelpTopic::Courses);
                continue;
            }
            _ => return Ok(()),
        };
        let Some(courses) = courses else {
            continue;
        };
        list(&courses);
        if courses.is_empty() {
            continue;
        }
        let labels: Vec<String> = courses.iter().map(label).collect();
        if let Some(index) = pick("Open a course", &labels)? {
            course_menu(api, &courses[index])?;
        }
    }
}

fn label(course: &Course) -> String {
    if course.course_code.is_empty() {
        course.name.clone()
    } else {
        format!("{} ({})", course.name, course.course_code)
    }
}

fn enrollment_score(course: &Course) -> Option<f64> {
    course
        .enrollments
        .iter()
        .find_map(|e| e.computed_current_score)
}

fn list(courses: &[Course]) {
    heading("Your Courses");
    if courses.is_empty() {
        println!("{}", "\n  No courses found".dark_grey());
        return;
    }
    for course in courses {
        println!();
        println!("  📚 {}", course.name.as_str().white().bold());
        let mut meta = Vec::new();
        if !course.course_code.is_empty() {
            meta.push(course.course_code.clone());
        }
        if let Some(term) = course.term.as_ref().and_then(|t| t.name.as_deref()) {
            meta.push(term.to_string());
        }
        if let Some(score) = enrollment_score(course) {
            meta.push(format!("{}% ({})", number(score), letter_grade(score)));
        }
        if !meta.is_empty() {
            println!("{}", format!("     {}", meta.join(" | ")).dark_grey());
        }
    }
}

fn course_menu(api: &ApiClient, summary: &Course) -> Result<()> {
    let course = fetch("course details", || api.course(summary.id)).unwrap_or_else(|| summary.clone());
    details(&course);
    loop {
        let items = [
            "Assignments",
            "Announcements",
            "Grades",
            "Modules",
            "Discussions",
            "Files",
            "Recent activity",
            "Upload a file",
            "← Back",
        ];
        let selection = Select::new()
            .with_prompt(course.name.as_str())
            .items(&items)
            .default(0)
            .interact()?;
        match selection {
            0 => {
                if let Some(mut list) = fetch("assignments", || api.course_assignments(course.id)) {
                    for assignment in &mut list {
                        assignment.course_name = Some(course.name.clone());
                        assignment.course_id.get_or_insert(course.id);
                    }
                    sort_by_due_date(&mut list);
                    heading(&format!("Assignments - {}", course.name));
                    assignments::display_grouped(&list);
                    assignments::browse(api, &list)?;
                }
            }
            1 => {
                let codes = vec![course.context_code()];
                if let Some(mut topics) = fetch("announcements", || api.announcements(&codes)) {
                    announcements::newest_first(&mut topics);
                    announcements::browse(&topics, std::slice::from_ref(&course))?;
                }
            }
            2 => {
                if let Some(grades) = fetch("grades", || api.course_grades(course.id)) {
                    heading(&format!("Grades - {}", course.name));
                    match (grades.current_score, grades.final_score) {
                        (None, None) => println!("{}", "\n  No grade data available".dark_grey()),
                        (current, final_score) => {
                            println!();
                            if let Some(score) = current {
                                println!(
                                    "{}",
                                    format!("  Current: {}% ({})", number(score), letter_grade(score)).green()
                                );
                            }
                            if let Some(score) = final_score {
                                println!(
                                    "{}",
                                    format!("  Final: {}% ({})", number(score), letter_grade(score)).yellow()
                                );
                            }
                        }
                    }
                    pause()?;
                }
            }
            3 => {
                if let Some(modules) = fetch("modules", || api.modules(course.id)) {
                    show_modules(&modules);
                    pause()?;
                }
            }
            4 => discussions(api, &course)?,
            5 => {
                if let Some(files) = fetch("files", || api.files(Some(course.id))) {
                    show_files(&files);
                    pause()?;
                }
            }
            6 => {
                if let Some(stream) = fetch("recent activity", || api.course_stream(course.id)) {
                    show_stream(&stream);
                    pause()?;
                }
            }
            7 => {
                let path = PathBuf::from(ask("File path")?.trim());
                perform("Uploading file", || api.upload_file(UploadTarget::Course(course.id), &path));
            }
            _ => return Ok(()),
        }
    }
}

fn details(course: &Course) {
    heading(&course.name);
    if !course.course_code.is_empty() {
        println!("{}", format!("  Code: {}", course.course_code).dark_grey());
    }
    if let Some(term) = course.term.as_ref().and_then(|t| t.name.as_deref()) {
        println!("{}", format!("  Term: {}", term).dark_grey());
    }
    let teachers: Vec<&str> = course.teachers.iter().map(|t| t.display_name.as_str()).collect();
    if !teachers.is_empty() {
        println!("{}", format!("  Teachers: {}", teachers.join(", ")).dark_grey());
    }
    if let Some(score) = enrollment_score(course) {
        println!(
            "{}",
            format!("  Current score: {}% ({})", number(score), letter_grade(score)).green()
        );
    }
    if let Some(text) = course.syllabus_body.as_deref().map(description).filter(|s| !s.is_empty()) {
        println!("{}", "\n  Syllabus:".yellow());
        println!("  {}", text.white());
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn show_modules(modules: &[Value]) {
    heading("Modules");
    if modules.is_empty() {
        println!("{}", "\n  No modules found".dark_grey());
        return;
    }
    for module in modules {
        println!();
        println!("  📦 {}", str_field(module, "name").unwrap_or("Untitled").white().bold());
        let items = module.get("items").and_then(Value::as_array);
        for item in items.into_iter().flatten() {
            let title = str_field(item, "title").unwrap_or("Untitled");
            let kind = str_field(item, "type").unwrap_or("Item");
            println!("{}", format!("     - {} [{}]", title, kind).dark_grey());
        }
    }
}

fn show_files(files: &[Value]) {
    heading("Files");
    if files.is_empty() {
        println!("{}", "\n  No files found".dark_grey());
        return;
    }
    for file in files {
        let name = str_field(file, "display_name")
            .or_else(|| str_field(file, "filename"))
            .unwrap_or("Unnamed");
        let size = file.get("size").and_then(Value::as_u64).map(human_size);
        match size {
            Some(size) => println!("  📄 {} {}", name.white(), format!("({})", size).dark_grey()),
            None => println!("  📄 {}", name.white()),
        }
    }
}

fn my_files(api: &ApiClient) -> Result<()> {
    if let Some(files) = fetch("your files", || api.files(None)) {
        show_files(&files);
    }
    println!();
    if confirm("Upload a file to your personal files?")? {
        let path = PathBuf::from(ask("File path")?.trim());
        perform("Uploading file", || api.upload_file(UploadTarget::User, &path));
    }
    Ok(())
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

fn show_stream(stream: &[Value]) {
    heading("Recent Activity");
    if stream.is_empty() {
        println!("{}", "\n  Nothing new".dark_grey());
        return;
    }
    for item in stream {
        let title = str_field(item, "title").unwrap_or("Untitled");
        let kind = str_field(item, "type").unwrap_or("Activity");
        println!();
        println!("  {} {}", format!("[{}]", kind).cyan(), title.white());
        let when = str_field(item, "updated_at")
            .and_then(|s| s.parse::<chrono::DateTime<chrono::Utc>>().ok())
            .map(short_datetime);
        if let Some(when) = when {
            println!("{}", format!("     {}", when).dark_grey());
        }
        if let Some(message) = str_field(item, "message") {
            let text = truncate(&strip_html(message), 120);
            if !text.is_empty() {
                println!("{}", format!("     {}", text).dark_grey());
            }
        }
    }
}

fn discussions(api: &ApiClient, course: &Course) -> Result<()> {
    let Some(topics) = fetch("discussions", || api.discussion_topics(course.id)) else {
        return Ok(());
    };
    heading(&format!("Discussions - {}", course.name));
    if topics.is_empty() {
        println!("{}", "\n  No discussions found".dark_grey());
        return pause();
    }
    loop {
        let labels: Vec<String> = topics.iter().map(topic_label).collect();
        let Some(index) = pick("Open a discussion", &labels)? else {
            return Ok(());
        };
        let topic = &topics[index];
        heading(&topic.title);
        if let Some(author) = topic.author() {
            println!("{}", format!("  By {}", author).dark_grey());
        }
        if let Some(text) = topic.message.as_deref().map(description) {
            println!();
            println!("  {}", text.white());
        }
        println!();
        if confirm("Reply to this discussion?")? {
            let message = ask("Your reply")?;
            perform("Posting reply", || {
                api.post_discussion_entry(course.id, topic.id, &message)
            });
        }
    }
}

fn topic_label(topic: &DiscussionTopic) -> String {
    match topic.posted_at {
        Some(at) => format!("{} ({})", topic.title, short_datetime(at)),
        None => topic.title.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
    }

    #[test]
    fn labels_include_the_course_code_when_present() {
        let course: Course =
            serde_json::from_value(json!({"id": 1, "name": "Chemistry", "course_code": "CHEM-101"})).unwrap();
        assert_eq!(label(&course), "Chemistry (CHEM-101)");
        let bare: Course = serde_json::from_value(json!({"id": 2, "name": "Seminar"})).unwrap();
        assert_eq!(label(&bare), "Seminar");
    }

    #[test]
    fn enrollment_score_takes_the_first_computed_score() {
        let course: Course = serde_json::from_value(json!({
            "id": 1,
            "enrollments": [{"type": "observer"}, {"computed_current_score": 91.5}]
        }))
        .unwrap();
        assert_eq!(enrollment_score(&course), Some(91.5));
    }
}
