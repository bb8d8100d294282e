// API client module: a blocking HTTP client for the LMS REST API.
//
// One `ApiClient` value holds the base URL and bearer token for the whole
// session. Every call funnels through `send`, which is the only place
// responses are turned into `ApiError`s.

mod aggregate;
mod error;
mod mutations;
mod upload;

pub use aggregate::{Aggregated, CourseFailure};
pub use error::ApiError;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, CONTENT_TYPE, LINK};
use reqwest::redirect::Policy;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::models::{
    Assignment, CalendarEvent, Course, DiscussionTopic, Enrollment, Grades, Submission, User,
};

/// Fixed per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on `Link: rel="next"` pages followed for one listing.
const MAX_PAGES: usize = 20;

type Query = Vec<(&'static str, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnrollmentState {
    #[default]
    Active,
    InvitedOrPending,
    Completed,
}

impl EnrollmentState {
    fn as_str(&self) -> &'static str {
        match self {
            EnrollmentState::Active => "active",
            EnrollmentState::InvitedOrPending => "invited_or_pending",
            EnrollmentState::Completed => "completed",
        }
    }
}

/// Filters for `calendar_events`. Empty means every event the user can see.
#[derive(Debug, Clone, Default)]
pub struct CalendarQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub context_codes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationScope {
    /// Everything in the inbox.
    Inbox,
    #[default]
    Unread,
    Starred,
    Sent,
    Archived,
}

impl ConversationScope {
    fn as_param(&self) -> Option<&'static str> {
        match self {
            ConversationScope::Inbox => None,
            ConversationScope::Unread => Some("unread"),
            ConversationScope::Starred => Some("starred"),
            ConversationScope::Sent => Some("sent"),
            ConversationScope::Archived => Some("archived"),
        }
    }
}

/// Blocking client bound to one LMS instance and one bearer token.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    // Direct uploads must hand redirects back to us instead of following them.
    upload_client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Client for `https://{domain}/api/v1`.
    pub fn new(token: &str, domain: &str) -> Result<Self, ApiError> {
        let domain = domain
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        Self::with_base_url(token, &format!("https://{}/api/v1", domain))
    }

    /// Client for an explicit API base such as `http://localhost:3000/api/v1`.
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, ApiError> {
        if reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token)).is_err() {
            return Err(ApiError::InvalidToken);
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ApiError::Transport)?;
        let upload_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(Policy::none())
            .build()
            .map_err(ApiError::Transport)?;
        Ok(ApiClient {
            client,
            upload_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether `url` points at the same scheme, host and port as the API
    /// base. The bearer token is only ever sent there.
    fn same_origin(&self, url: &str) -> bool {
        match (Url::parse(url), Url::parse(&self.base_url)) {
            (Ok(target), Ok(base)) => target.origin() == base.origin(),
            _ => false,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the bearer token and JSON content type.
    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json")
    }

    /// Sends a request and normalizes any failure into an `ApiError`.
    fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let res = builder.send().map_err(ApiError::Transport)?;
        check(res)
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<T, ApiError> {
        tracing::debug!(path, "GET");
        let res = self.send(self.authed(self.client.get(self.url(path)).query(query)))?;
        parse(res)
    }

    /// GET a listing, following `rel="next"` links.
    fn get_list<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<Vec<T>, ApiError> {
        tracing::debug!(path, "GET list");
        let mut items = Vec::new();
        let mut pages = 0;
        let mut next = Some(self.authed(self.client.get(self.url(path)).query(query)));
        while let Some(request) = next.take() {
            let res = self.send(request)?;
            pages += 1;
            let link = next_link(res.headers());
            let page: Vec<T> = parse(res)?;
            items.extend(page);
            match link {
                Some(url) if !self.same_origin(&url) => {
                    tracing::warn!(path, %url, "Ignoring pagination link to another host")
                }
                Some(url) if pages < MAX_PAGES => next = Some(self.authed(self.client.get(url))),
                Some(_) => tracing::warn!(path, pages, "Stopped following pagination links"),
                None => {}
            }
        }
        Ok(items)
    }

    pub fn current_user(&self) -> Result<User, ApiError> {
        self.get("/users/self", &Vec::new())
    }

    pub fn courses(&self, state: EnrollmentState) -> Result<Vec<Course>, ApiError> {
        let query = vec![
            ("enrollment_state", state.as_str().to_string()),
            ("include[]", "term".to_string()),
            ("include[]", "teachers".to_string()),
            ("include[]", "total_scores".to_string()),
        ];
        self.get_list("/courses", &query)
    }

    pub fn course(&self, course_id: u64) -> Result<Course, ApiError> {
        let query = vec![
            ("include[]", "syllabus_body".to_string()),
            ("include[]", "term".to_string()),
            ("include[]", "teachers".to_string()),
        ];
        self.get(&format!("/courses/{}", course_id), &query)
    }

    /// Active courses whose name or code contains `query`, ignoring case.
    pub fn search_courses(&self, query: &str) -> Result<Vec<Course>, ApiError> {
        Ok(self
            .courses(EnrollmentState::Active)?
            .into_iter()
            .filter(|c| c.matches(query))
            .collect())
    }

    pub fn calendar_events(&self, filter: &CalendarQuery) -> Result<Vec<CalendarEvent>, ApiError> {
        let mut query: Query = vec![("all_events", "true".to_string())];
        query.extend(
            filter
                .context_codes
                .iter()
                .map(|code| ("context_codes[]", code.clone())),
        );
        if let Some(start) = filter.start_date {
            query.push(("start_date", start.to_rfc3339()));
        }
        if let Some(end) = filter.end_date {
            query.push(("end_date", end.to_rfc3339()));
        }
        self.get_list("/calendar_events", &query)
    }

    pub fn upcoming_events(&self) -> Result<Vec<CalendarEvent>, ApiError> {
        self.get_list("/users/self/upcoming_events", &Vec::new())
    }

    pub fn course_assignments(&self, course_id: u64) -> Result<Vec<Assignment>, ApiError> {
        let query = vec![
            ("include[]", "submission".to_string()),
            ("include[]", "overrides".to_string()),
            ("order_by", "due_at".to_string()),
        ];
        self.get_list(&format!("/courses/{}/assignments", course_id), &query)
    }

    pub fn assignment(&self, course_id: u64, assignment_id: u64) -> Result<Assignment, ApiError> {
        let query = vec![
            ("include[]", "submission".to_string()),
            ("include[]", "overrides".to_string()),
        ];
        self.get(
            &format!("/courses/{}/assignments/{}", course_id, assignment_id),
            &query,
        )
    }

    pub fn submission(&self, course_id: u64, assignment_id: u64) -> Result<Submission, ApiError> {
        let query = vec![
            ("include[]", "submission_comments".to_string()),
            ("include[]", "rubric_assessment".to_string()),
        ];
        self.get(
            &format!(
                "/courses/{}/assignments/{}/submissions/self",
                course_id, assignment_id
            ),
            &query,
        )
    }

    /// Active announcements for the given context codes (`course_123`).
    pub fn announcements(&self, context_codes: &[String]) -> Result<Vec<DiscussionTopic>, ApiError> {
        let mut query: Query = context_codes
            .iter()
            .map(|code| ("context_codes[]", code.clone()))
            .collect();
        query.push(("active_only", "true".to_string()));
        self.get_list("/announcements", &query)
    }

    pub fn discussion_topics(&self, course_id: u64) -> Result<Vec<DiscussionTopic>, ApiError> {
        let query = vec![
            ("order_by", "recent_activity".to_string()),
            ("include[]", "all_dates".to_string()),
            ("include[]", "sections".to_string()),
            ("include[]", "user".to_string()),
        ];
        self.get_list(&format!("/courses/{}/discussion_topics", course_id), &query)
    }

    /// The caller's grades in one course. Empty when there is no enrollment.
    pub fn course_grades(&self, course_id: u64) -> Result<Grades, ApiError> {
        let query = vec![
            ("user_id", "self".to_string()),
            ("include[]", "grades".to_string()),
            ("include[]", "computed_current_score".to_string()),
            ("include[]", "computed_final_score".to_string()),
        ];
        let enrollments: Vec<Enrollment> =
            self.get(&format!("/courses/{}/enrollments", course_id), &query)?;
        Ok(enrollments
            .into_iter()
            .next()
            .and_then(|e| e.grades)
            .unwrap_or_default())
    }

    pub fn modules(&self, course_id: u64) -> Result<Vec<Value>, ApiError> {
        let query = vec![
            ("include[]", "items".to_string()),
            ("include[]", "content_details".to_string()),
        ];
        self.get_list(&format!("/courses/{}/modules", course_id), &query)
    }

    /// Files of a course, or the user's own files when `course_id` is `None`.
    pub fn files(&self, course_id: Option<u64>) -> Result<Vec<Value>, ApiError> {
        let path = match course_id {
            Some(id) => format!("/courses/{}/files", id),
            None => "/users/self/files".to_string(),
        };
        self.get_list(&path, &vec![("per_page", "50".to_string())])
    }

    pub fn todos(&self) -> Result<Vec<Value>, ApiError> {
        self.get_list(
            "/users/self/todo",
            &vec![("include[]", "ungraded_quizzes".to_string())],
        )
    }

    pub fn planner_notes(&self) -> Result<Vec<Value>, ApiError> {
        self.get_list("/planner_notes", &Vec::new())
    }

    pub fn conversations(&self, scope: ConversationScope) -> Result<Vec<Value>, ApiError> {
        let query: Query = scope
            .as_param()
            .map(|s| ("scope", s.to_string()))
            .into_iter()
            .collect();
        self.get_list("/conversations", &query)
    }

    pub fn course_stream(&self, course_id: u64) -> Result<Vec<Value>, ApiError> {
        self.get_list(
            &format!("/courses/{}/activity_stream", course_id),
            &Vec::new(),
        )
    }
}

/// Passes successful responses through and turns the rest into errors.
fn check(res: Response) -> Result<Response, ApiError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().unwrap_or_default();
    tracing::debug!(status = status.as_u16(), "Request rejected");
    Err(ApiError::from_status(status, &body))
}

fn parse<T: DeserializeOwned>(res: Response) -> Result<T, ApiError> {
    let text = res.text().map_err(ApiError::Transport)?;
    Ok(serde_json::from_str(&text)?)
}

/// Parsed body, or `true` when the service answered with nothing.
fn parse_or_true(res: Response) -> Result<Value, ApiError> {
    let text = res.text().map_err(ApiError::Transport)?;
    if text.trim().is_empty() {
        return Ok(Value::Bool(true));
    }
    Ok(serde_json::from_str(&text)?)
}

/// Extracts the `rel="next"` target from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| p.trim() == "rel=\"next\"");
        if is_next {
            Some(target.trim_start_matches('<').trim_end_matches('>').to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn domain_becomes_https_api_base() {
        let api = ApiClient::new("t", "school.instructure.com/").unwrap();
        assert_eq!(api.base_url(), "https://school.instructure.com/api/v1");
        let api = ApiClient::new("t", "https://school.instructure.com").unwrap();
        assert_eq!(api.base_url(), "https://school.instructure.com/api/v1");
    }

    #[test]
    fn tokens_with_newlines_are_rejected() {
        assert!(matches!(
            ApiClient::new("abc\ndef", "example.org"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn only_links_on_the_api_host_are_followed() {
        let api = ApiClient::with_base_url("t", "https://school.example/api/v1").unwrap();
        assert!(api.same_origin("https://school.example/api/v1/courses?page=2"));
        assert!(!api.same_origin("https://evil.example/api/v1/courses?page=2"));
        assert!(!api.same_origin("http://school.example/api/v1/courses?page=2"));
        assert!(!api.same_origin("https://school.example:8443/api/v1/courses"));
        assert!(!api.same_origin("/api/v1/courses?page=2"));
    }

    #[test]
    fn next_link_is_found_among_relations() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://x/api/v1/courses?page=1>; rel=\"current\",<https://x/api/v1/courses?page=2>; rel=\"next\",<https://x/api/v1/courses?page=5>; rel=\"last\"",
            ),
        );
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("https://x/api/v1/courses?page=2")
        );

        headers.insert(LINK, HeaderValue::from_static("<https://x/a?page=1>; rel=\"first\""));
        assert_eq!(next_link(&headers), None);
    }
}
