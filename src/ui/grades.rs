use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::Select;

use super::format::{letter_grade, number};
use super::help::{self, HelpTopic};
use super::{fetch, heading, pause, pick};
use crate::api::ApiClient;
use crate::models::{Assignment, CourseGrades, Grades};

pub fn show(api: &ApiClient) -> Result<()> {
    loop {
        let Some(grades) = fetch("grades", || api.all_grades()) else {
            return Ok(());
        };
        display(&grades);

        let items = [
            "View course grade details",
            "Export grades summary",
            "Help",
            "← Back to Main Menu",
        ];
        let selection = Select::new()
            .with_prompt("What would you like to do?")
            .items(&items)
            .default(0)
            .interact()?;
        match selection {
            0 => {
                let labels: Vec<String> = grades
                    .iter()
                    .map(|g| {
                        let current = g
                            .grades
                            .current_score
                            .map(number)
                            .unwrap_or_else(|| "N/A".to_string());
                        format!("{} - Current: {}%", g.course_name, current)
                    })
                    .collect();
                if let Some(index) = pick("Select a course", &labels)? {
                    course_details(api, &grades[index])?;
                }
            }
            1 => export(&grades)?,
            2 => help::show(HelpTopic::Grades),
            _ => return Ok(()),
        }
    }
}

/// Mean of the present values, `None` when there are none.
fn average(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn score_line(grades: &Grades) -> Vec<String> {
    let mut parts = Vec::new();
    if let Some(score) = grades.current_score {
        parts.push(format!("Current: {}% ({})", number(score), letter_grade(score)).green().to_string());
    }
    if let Some(score) = grades.final_score {
        parts.push(format!("Final: {}% ({})", number(score), letter_grade(score)).yellow().to_string());
    }
    parts
}

fn display(grades: &[CourseGrades]) {
    heading("Your Grades");
    if grades.is_empty() {
        println!("{}", "\n  No grades found".dark_grey());
        return;
    }

    for course in grades {
        println!();
        println!("{}", format!("  {}", course.course_name).yellow().bold());
        println!("{}", format!("  {}", "─".repeat(40)).dark_grey());
        let parts = score_line(&course.grades);
        if parts.is_empty() {
            println!("{}", "  No grade data available".dark_grey());
        } else {
            println!("  {}", parts.join(" | "));
        }
        let mut letters = Vec::new();
        if let Some(g) = &course.grades.current_grade {
            letters.push(format!("Current: {}", g));
        }
        if let Some(g) = &course.grades.final_grade {
            letters.push(format!("Final: {}", g));
        }
        if !letters.is_empty() {
            println!("{}", format!("  Letter Grade: {}", letters.join(" | ")).dark_grey());
        }
    }

    let current = average(grades.iter().map(|g| g.grades.current_score));
    let final_avg = average(grades.iter().map(|g| g.grades.final_score));
    if current.is_some() || final_avg.is_some() {
        println!();
        println!("{}", "  ───────────────────────────────────────".cyan());
        println!("{}", "  Overall Summary".cyan().bold());
        println!("{}", "  ───────────────────────────────────────".cyan());
        if let Some(avg) = current {
            println!(
                "{}",
                format!("  Average Current Score: {:.2}% ({})", avg, letter_grade(avg)).green()
            );
        }
        if let Some(avg) = final_avg {
            println!(
                "{}",
                format!("  Average Final Score: {:.2}% ({})", avg, letter_grade(avg)).yellow()
            );
        }
        println!("{}", format!("  Courses with grades: {}", grades.len()).dark_grey());
    }
}

fn course_details(api: &ApiClient, course: &CourseGrades) -> Result<()> {
    heading("Course Grade Details");
    println!("{}", format!("\n  {}", course.course_name).white().bold());
    println!("{}", format!("  Course ID: {}", course.course_id).dark_grey());
    println!();
    println!("{}", "  Grade Breakdown:".yellow());
    let g = &course.grades;
    if let Some(score) = g.current_score {
        println!("{}", format!("    Current Score: {}%", number(score)).green());
    }
    if let Some(grade) = &g.current_grade {
        println!("{}", format!("    Current Grade: {}", grade).green());
    }
    if let Some(score) = g.final_score {
        println!("{}", format!("    Final Score: {}%", number(score)).yellow());
    }
    if let Some(grade) = &g.final_grade {
        println!("{}", format!("    Final Grade: {}", grade).yellow());
    }
    println!();
    println!("{}", "  Note: Current scores are based on graded assignments only.".dark_grey());
    println!("{}", "  Final scores include ungraded assignments as zeros.".dark_grey());

    if let Some(assignments) = fetch("assignment grades", || api.course_assignments(course.course_id)) {
        let graded = recently_graded(&assignments, 5);
        if !graded.is_empty() {
            println!();
            println!("{}", "  Recent Graded Assignments:".yellow());
            for a in graded {
                let score = a.submission.as_ref().and_then(|s| s.score).unwrap_or_default();
                let possible = a.points_possible.unwrap_or_default();
                let pct = a
                    .percentage()
                    .map(|p| format!("{:.1}% - {}", p, letter_grade(p)))
                    .unwrap_or_else(|| "N/A".to_string());
                println!("    📝 {}", a.name);
                println!(
                    "{}",
                    format!("       Score: {}/{} ({})", number(score), number(possible), pct).dark_grey()
                );
            }
        }
    }
    pause()
}

/// First `limit` assignments that carry a score.
fn recently_graded(assignments: &[Assignment], limit: usize) -> Vec<&Assignment> {
    assignments
        .iter()
        .filter(|a| a.submission.as_ref().and_then(|s| s.score).is_some())
        .take(limit)
        .collect()
}

fn export(grades: &[CourseGrades]) -> Result<()> {
    println!();
    println!("{}", "  Grades Summary Export".yellow());
    println!("{}", format!("  {}", "═".repeat(40)).dark_grey());
    for course in grades {
        println!("\n  Course: {}", course.course_name);
        if let Some(score) = course.grades.current_score {
            let letter = course
                .grades
                .current_grade
                .clone()
                .unwrap_or_else(|| letter_grade(score).to_string());
            println!("  Current Score: {}% ({})", number(score), letter);
        }
        if let Some(score) = course.grades.final_score {
            let letter = course
                .grades
                .final_grade
                .clone()
                .unwrap_or_else(|| letter_grade(score).to_string());
            println!("  Final Score: {}% ({})", number(score), letter);
        }
    }
    println!();
    println!("{}", format!("  {}", "═".repeat(40)).dark_grey());
    println!("{}", "  ✓ Grades summary displayed above".green());
    pause()
}
