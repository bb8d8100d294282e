// Data shapes returned by the LMS API.
//
// Only the fields the client actually reads are typed. Everything else the
// service sends is kept in an `extra` map so records pass through untouched.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier that the service sends either as a number or as a string
/// (calendar items for assignments come back as `"assignment_42"`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ItemId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{}", n),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Term {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Teacher {
    #[serde(default)]
    pub display_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Score block found under an enrollment's `grades` key.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Grades {
    #[serde(default)]
    pub current_score: Option<f64>,
    #[serde(default)]
    pub final_score: Option<f64>,
    #[serde(default)]
    pub current_grade: Option<String>,
    #[serde(default)]
    pub final_grade: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Enrollment {
    #[serde(default)]
    pub computed_current_score: Option<f64>,
    #[serde(default)]
    pub computed_final_score: Option<f64>,
    #[serde(default)]
    pub grades: Option<Grades>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Course {
    pub id: u64,
    // Courses restricted by date come back with only an id.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub term: Option<Term>,
    #[serde(default)]
    pub teachers: Vec<Teacher>,
    #[serde(default)]
    pub enrollments: Vec<Enrollment>,
    #[serde(default)]
    pub syllabus_body: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Course {
    /// Case-insensitive match against the course name or code.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query) || self.course_code.to_lowercase().contains(&query)
    }

    /// Context code used to scope calendar and announcement queries.
    pub fn context_code(&self) -> String {
        format!("course_{}", self.id)
    }
}

/// Per-course grades as produced by the grade aggregation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CourseGrades {
    pub course_id: u64,
    pub course_name: String,
    #[serde(flatten)]
    pub grades: Grades,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Submission {
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub missing: bool,
    #[serde(default)]
    pub late: bool,
    #[serde(default)]
    pub attachments: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Client-side classification of where an assignment stands. Derived from
/// the submission record, never sent back to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    NotSubmitted,
    Submitted,
    Graded,
    Missing,
    Late,
}

impl SubmissionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionStatus::NotSubmitted => "not submitted",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Graded => "graded",
            SubmissionStatus::Missing => "missing",
            SubmissionStatus::Late => "late",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Assignment {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub submission: Option<Submission>,
    #[serde(default)]
    pub submission_types: Vec<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub course_id: Option<u64>,
    /// Filled in when assignments are aggregated across courses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Assignment {
    pub fn status(&self) -> SubmissionStatus {
        let Some(submission) = &self.submission else {
            return SubmissionStatus::NotSubmitted;
        };
        if submission.missing {
            return SubmissionStatus::Missing;
        }
        if submission.late {
            return SubmissionStatus::Late;
        }
        match submission.workflow_state.as_deref() {
            Some("graded") => SubmissionStatus::Graded,
            Some("submitted") => SubmissionStatus::Submitted,
            _ => SubmissionStatus::NotSubmitted,
        }
    }

    /// Score as a percentage of the points possible, when both are known.
    pub fn percentage(&self) -> Option<f64> {
        let score = self.submission.as_ref()?.score?;
        let possible = self.points_possible.filter(|p| *p > 0.0)?;
        Some(score / possible * 100.0)
    }
}

/// Orders assignments by due date, earliest first, with undated ones at the
/// end. The sort is stable so equal keys keep their fetch order.
pub fn sort_by_due_date(assignments: &mut [Assignment]) {
    assignments.sort_by(|a, b| match (a.due_at, b.due_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentFilter {
    All,
    Upcoming,
    Missing,
    Submitted,
    Graded,
}

impl AssignmentFilter {
    pub const ALL: [AssignmentFilter; 5] = [
        AssignmentFilter::All,
        AssignmentFilter::Upcoming,
        AssignmentFilter::Missing,
        AssignmentFilter::Submitted,
        AssignmentFilter::Graded,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            AssignmentFilter::All => "All",
            AssignmentFilter::Upcoming => "Upcoming",
            AssignmentFilter::Missing => "Missing",
            AssignmentFilter::Submitted => "Submitted",
            AssignmentFilter::Graded => "Graded",
        }
    }

    pub fn matches(&self, assignment: &Assignment, now: DateTime<Utc>) -> bool {
        let submission = assignment.submission.as_ref();
        let state = submission.and_then(|s| s.workflow_state.as_deref());
        match self {
            AssignmentFilter::All => true,
            AssignmentFilter::Upcoming => {
                assignment.due_at.map_or(false, |due| due > now)
                    && (submission.is_none() || state == Some("unsubmitted"))
            }
            AssignmentFilter::Missing => submission.map_or(false, |s| s.missing),
            AssignmentFilter::Submitted => matches!(state, Some("submitted") | Some("graded")),
            AssignmentFilter::Graded => {
                state == Some("graded") && submission.map_or(false, |s| s.score.is_some())
            }
        }
    }

    pub fn apply(&self, assignments: &[Assignment], now: DateTime<Utc>) -> Vec<Assignment> {
        assignments
            .iter()
            .filter(|a| self.matches(a, now))
            .cloned()
            .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CalendarEvent {
    pub id: ItemId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub all_day_date: Option<NaiveDate>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub context_code: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub assignment: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CalendarEvent {
    /// The day the event lands on, in the given timezone.
    pub fn day<Tz: chrono::TimeZone>(&self, tz: &Tz) -> Option<NaiveDate> {
        self.start_at
            .map(|start| start.with_timezone(tz).date_naive())
            .or(self.all_day_date)
    }

    pub fn is_assignment(&self) -> bool {
        self.assignment.is_some() || self.event_type.as_deref() == Some("assignment")
    }
}

/// Announcements and course discussions share this shape.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiscussionTopic {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub context_code: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DiscussionTopic {
    pub fn author(&self) -> Option<&str> {
        self.user_name.as_deref().or_else(|| {
            self.extra
                .get("author")
                .and_then(|a| a.get("display_name"))
                .and_then(Value::as_str)
        })
    }
}

/// Payload for creating or updating a calendar event.
#[derive(Serialize, Debug, Clone, Default)]
pub struct CalendarEventRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

/// What kind of work is being handed in.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "submission_type", rename_all = "snake_case")]
pub enum SubmissionRequest {
    OnlineTextEntry { body: String },
    OnlineUrl { url: String },
    OnlineUpload { file_ids: Vec<u64> },
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct NewConversation {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_code: Option<String>,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct PlannerNoteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todo_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<u64>,
}

/// Where an uploaded file should end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    /// The user's personal files.
    User,
    Course(u64),
    /// Attached to the caller's submission for an assignment.
    Submission { course_id: u64, assignment_id: u64 },
}

impl UploadTarget {
    pub fn endpoint(&self) -> String {
        match self {
            UploadTarget::User => "/users/self/files".to_string(),
            UploadTarget::Course(id) => format!("/courses/{}/files", id),
            UploadTarget::Submission {
                course_id,
                assignment_id,
            } => format!(
                "/courses/{}/assignments/{}/submissions/self/files",
                course_id, assignment_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assignment(value: Value) -> Assignment {
        serde_json::from_value(value).unwrap()
    }

    fn now() -> DateTime<Utc> {
        "2024-03-03T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn status_without_submission_is_not_submitted() {
        let a = assignment(json!({"id": 1, "name": "Essay"}));
        assert_eq!(a.status(), SubmissionStatus::NotSubmitted);
    }

    #[test]
    fn missing_and_late_flags_win_over_workflow_state() {
        let missing = assignment(json!({
            "id": 1,
            "submission": {"workflow_state": "graded", "missing": true, "late": true}
        }));
        assert_eq!(missing.status(), SubmissionStatus::Missing);

        let late = assignment(json!({
            "id": 2,
            "submission": {"workflow_state": "submitted", "late": true}
        }));
        assert_eq!(late.status(), SubmissionStatus::Late);

        let graded = assignment(json!({"id": 3, "submission": {"workflow_state": "graded", "score": 9}}));
        assert_eq!(graded.status(), SubmissionStatus::Graded);

        let pending = assignment(json!({"id": 4, "submission": {"workflow_state": "pending_review"}}));
        assert_eq!(pending.status(), SubmissionStatus::NotSubmitted);
    }

    #[test]
    fn undated_assignments_sort_last() {
        let mut items = vec![
            assignment(json!({"id": 1, "due_at": "2024-03-05T23:59:00Z"})),
            assignment(json!({"id": 2, "due_at": null})),
            assignment(json!({"id": 3, "due_at": "2024-03-01T23:59:00Z"})),
            assignment(json!({"id": 4})),
        ];
        sort_by_due_date(&mut items);
        let ids: Vec<u64> = items.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 1, 2, 4]);
    }

    #[test]
    fn filters_follow_submission_state() {
        let items = vec![
            assignment(json!({"id": 1, "due_at": "2024-03-05T00:00:00Z"})),
            assignment(json!({"id": 2, "due_at": "2024-03-01T00:00:00Z", "submission": {"missing": true, "workflow_state": "unsubmitted"}})),
            assignment(json!({"id": 3, "submission": {"workflow_state": "submitted"}})),
            assignment(json!({"id": 4, "submission": {"workflow_state": "graded", "score": 8.5}})),
            assignment(json!({"id": 5, "due_at": "2024-03-09T00:00:00Z", "submission": {"workflow_state": "unsubmitted"}})),
        ];
        let ids = |filter: AssignmentFilter| -> Vec<u64> {
            filter.apply(&items, now()).iter().map(|a| a.id).collect()
        };
        assert_eq!(ids(AssignmentFilter::All).len(), 5);
        assert_eq!(ids(AssignmentFilter::Upcoming), vec![1, 5]);
        assert_eq!(ids(AssignmentFilter::Missing), vec![2]);
        assert_eq!(ids(AssignmentFilter::Submitted), vec![3, 4]);
        assert_eq!(ids(AssignmentFilter::Graded), vec![4]);
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = json!({"id": 7, "name": "Lab", "lock_at": "2024-01-01T00:00:00Z", "rubric": [1, 2]});
        let a = assignment(raw.clone());
        let back = serde_json::to_value(&a).unwrap();
        assert_eq!(back["lock_at"], raw["lock_at"]);
        assert_eq!(back["rubric"], raw["rubric"]);
        assert!(back.get("course_name").is_none());
    }

    #[test]
    fn calendar_ids_accept_numbers_and_strings() {
        let event: CalendarEvent =
            serde_json::from_value(json!({"id": "assignment_42", "title": "Quiz", "type": "assignment"})).unwrap();
        assert_eq!(event.id.to_string(), "assignment_42");
        assert!(event.is_assignment());

        let event: CalendarEvent = serde_json::from_value(json!({"id": 9, "all_day_date": "2024-03-05"})).unwrap();
        assert_eq!(event.id, ItemId::Number(9));
        assert_eq!(event.day(&Utc), NaiveDate::from_ymd_opt(2024, 3, 5));
    }

    #[test]
    fn submission_request_is_tagged_by_type() {
        let body = serde_json::to_value(SubmissionRequest::OnlineUrl {
            url: "https://example.org".into(),
        })
        .unwrap();
        assert_eq!(body, json!({"submission_type": "online_url", "url": "https://example.org"}));
    }

    #[test]
    fn course_search_ignores_case() {
        let course: Course =
            serde_json::from_value(json!({"id": 1, "name": "Linear Algebra", "course_code": "MATH-221"})).unwrap();
        assert!(course.matches("algebra"));
        assert!(course.matches("math"));
        assert!(!course.matches("physics"));
        assert_eq!(course.context_code(), "course_1");
    }
}
