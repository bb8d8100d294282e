use crossterm::style::Stylize;

use super::heading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Main,
    Calendar,
    Courses,
    Assignments,
    Announcements,
    Grades,
    Inbox,
    Todo,
}

pub fn show(topic: HelpTopic) {
    heading("LMS CLI Help");
    println!();
    for (title, lines) in entries(topic) {
        println!("{}", format!("  {}", title).white().bold());
        for line in *lines {
            println!("{}", format!("     {}", line).dark_grey());
        }
        println!();
    }
    println!("{}", "  Navigation:".dark_grey());
    println!("{}", "    Arrow keys + Enter  - Choose a menu entry".white());
    println!("{}", "    ← Back              - Return to the previous menu".white());
    println!("{}", "    Ctrl+C              - Exit the application".white());
}

type Entry = (&'static str, &'static [&'static str]);

fn entries(topic: HelpTopic) -> &'static [Entry] {
    match topic {
        HelpTopic::Main => &[
            ("Calendar", &["View calendar events, assignment due dates", "and course schedules; add or remove events"]),
            ("Courses", &["Browse enrolled courses, their modules, files,", "discussions and activity"]),
            ("Assignments", &["All assignments across courses with due dates,", "submission status and grades; submit work"]),
            ("Announcements", &["Read announcements from every course"]),
            ("Grades", &["Current and final scores with letter grades"]),
            ("Inbox", &["Read conversations, reply and compose messages"]),
            ("To-do", &["Items needing attention and personal planner notes"]),
        ],
        HelpTopic::Calendar => &[
            ("Views", &["Today, this week, this month, upcoming or everything"]),
            ("Events", &["Pick an event to see its time, place and description"]),
            ("Manage", &["Create a personal event, or edit and delete", "events you own"]),
        ],
        HelpTopic::Courses => &[
            ("Search", &["Filter courses by name or course code"]),
            ("My files", &["Your personal files; upload new ones from disk"]),
            ("Course menu", &["Assignments, announcements, grades, modules,", "discussions, files, activity stream and uploads"]),
        ],
        HelpTopic::Assignments => &[
            ("Filters", &["Upcoming: due later and not yet submitted", "Missing: flagged missing by the instructor", "Submitted / Graded: handed in or scored"]),
            ("Submit", &["Hand in text, a URL or a file from disk"]),
        ],
        HelpTopic::Announcements => &[
            ("Announcements", &["Newest first, from all courses or one course"]),
        ],
        HelpTopic::Grades => &[
            ("Scores", &["Current scores count graded work only;", "final scores count ungraded work as zero"]),
            ("Export", &["Print a plain summary you can copy"]),
        ],
        HelpTopic::Inbox => &[
            ("Conversations", &["Unread or all conversations; reply in place"]),
            ("Compose", &["Recipients are user ids or course contexts"]),
        ],
        HelpTopic::Todo => &[
            ("To-do", &["Mark items complete to hide them"]),
            ("Planner notes", &["Personal reminders with an optional date"]),
        ],
    }
}
