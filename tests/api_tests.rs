use lms_cli::api::{ApiClient, ApiError, CalendarQuery, EnrollmentState};
use lms_cli::models::{Grades, PlannerNoteRequest, SubmissionRequest, UploadTarget};
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const TOKEN: &str = "test-token";

/// A mock LMS on a background runtime, driven from a plain test thread so
/// the blocking client never runs inside async code.
struct Harness {
    // Declared first so the server shuts down before its runtime.
    server: MockServer,
    rt: Runtime,
}

impl Harness {
    fn new() -> Self {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        Harness { server, rt }
    }

    fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    fn base_url(&self) -> String {
        format!("{}/api/v1", self.server.uri())
    }

    fn client(&self) -> ApiClient {
        ApiClient::with_base_url(TOKEN, &self.base_url()).unwrap()
    }

    fn requests(&self) -> Vec<Request> {
        self.rt.block_on(self.server.received_requests()).unwrap()
    }
}

fn courses_mock(body: Value) -> Mock {
    Mock::given(method("GET"))
        .and(path("/api/v1/courses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
}

#[test]
fn current_user_sends_one_authenticated_request() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/users/self"))
            .and(header("authorization", "Bearer test-token"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "name": "Ada"}))),
    );

    let user = h.client().current_user().unwrap();
    assert_eq!(user.id, 7);
    assert_eq!(user.name, "Ada");
    assert_eq!(h.requests().len(), 1);
}

#[test]
fn courses_ask_for_the_enrollment_state_and_includes() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses"))
            .and(query_param("enrollment_state", "completed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 3, "name": "History"}]))),
    );

    let courses = h.client().courses(EnrollmentState::Completed).unwrap();
    assert_eq!(courses.len(), 1);
    let url = h.requests()[0].url.to_string();
    assert!(url.contains("include%5B%5D=term") || url.contains("include[]=term"), "{}", url);
}

#[test]
fn list_endpoints_follow_next_links() {
    let h = Harness::new();
    let next = format!("<{}/courses?page=2>; rel=\"next\"", h.base_url());
    // Mounted first so it wins over the unfiltered first-page mock.
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 2, "name": "B"}]))),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Link", next.as_str())
                    .set_body_json(json!([{"id": 1, "name": "A"}])),
            ),
    );

    let courses = h.client().courses(EnrollmentState::Active).unwrap();
    let ids: Vec<u64> = courses.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2]);

    let requests = h.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|r| r.headers.get("authorization").is_some()));
}

#[test]
fn status_codes_map_to_error_kinds() {
    let h = Harness::new();
    let cases = [
        ("/api/v1/courses/1", 401),
        ("/api/v1/courses/2", 404),
        ("/api/v1/courses/3", 429),
    ];
    for (route, status) in cases {
        h.mount(
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(status)),
        );
    }
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses/4"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"errors": [{"message": "database on fire"}]})),
            ),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses/5"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message": "bad include"}))),
    );

    let api = h.client();
    assert!(matches!(api.course(1), Err(ApiError::Unauthorized)));
    assert!(matches!(api.course(2), Err(ApiError::NotFound)));
    assert!(matches!(api.course(3), Err(ApiError::RateLimited)));

    match api.course(4) {
        Err(ApiError::Remote { message, status }) => {
            assert_eq!(message, "database on fire");
            assert_eq!(status, 500);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    let err = api.course(5).unwrap_err();
    assert_eq!(err.to_string(), "bad include");
    assert_eq!(err.status(), Some(422));

    assert_eq!(
        api.course(1).unwrap_err().to_string(),
        "Invalid API token or unauthorized access"
    );
}

#[test]
fn unauthorized_is_the_same_on_every_endpoint() {
    let h = Harness::new();
    h.mount(Mock::given(wiremock::matchers::any()).respond_with(ResponseTemplate::new(401)));

    let api = h.client();
    assert!(matches!(api.current_user(), Err(ApiError::Unauthorized)));
    assert!(matches!(api.todos(), Err(ApiError::Unauthorized)));
    assert!(matches!(
        api.calendar_events(&CalendarQuery::default()),
        Err(ApiError::Unauthorized)
    ));
    assert!(matches!(api.delete_planner_note(1), Err(ApiError::Unauthorized)));
    assert!(matches!(
        api.create_calendar_event(&Default::default()).unwrap_err().root(),
        ApiError::Unauthorized
    ));
}

#[test]
fn unreachable_service_is_a_transport_error() {
    let api = ApiClient::with_base_url(TOKEN, "http://127.0.0.1:9/api/v1").unwrap();
    let err = api.current_user().unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "{:?}", err);
    assert_eq!(err.status(), None);
}

#[test]
fn assignment_aggregation_skips_failing_courses_and_sorts() {
    let h = Harness::new();
    h.mount(courses_mock(json!([
        {"id": 1, "name": "Algebra"},
        {"id": 2, "name": "Broken"},
        {"id": 3, "name": "Chemistry"}
    ])));
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses/1/assignments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 10, "name": "Proofs", "due_at": "2024-03-05T23:59:00Z"},
                {"id": 11, "name": "Reading"}
            ]))),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses/2/assignments"))
            .respond_with(ResponseTemplate::new(500)),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses/3/assignments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 30, "name": "Titration", "due_at": "2024-03-01T23:59:00Z"}
            ]))),
    );

    let merged = h.client().all_assignments_detailed().unwrap();
    let ids: Vec<u64> = merged.items.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![30, 10, 11]);
    assert_eq!(merged.items[0].course_name.as_deref(), Some("Chemistry"));
    assert_eq!(merged.items[1].course_id, Some(1));

    assert_eq!(merged.failures.len(), 1);
    assert_eq!(merged.failures[0].course_id, 2);
    assert_eq!(merged.failures[0].error.status(), Some(500));

    // The plain variant drops the failure list but keeps the same items.
    let plain = h.client().all_assignments().unwrap();
    assert_eq!(plain.len(), 3);
}

#[test]
fn aggregation_fails_when_courses_cannot_be_listed() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses"))
            .respond_with(ResponseTemplate::new(401)),
    );
    assert!(matches!(h.client().all_grades(), Err(ApiError::Unauthorized)));
}

#[test]
fn grades_fall_back_to_empty_without_an_enrollment() {
    let h = Harness::new();
    h.mount(courses_mock(json!([
        {"id": 1, "name": "Algebra"},
        {"id": 2, "name": "Biology"}
    ])));
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses/1/enrollments"))
            .and(query_param("user_id", "self"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([]))),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses/2/enrollments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"grades": {"current_score": 91.2, "current_grade": "A-"}}
            ]))),
    );

    let grades = h.client().all_grades().unwrap();
    assert_eq!(grades.len(), 2);
    assert_eq!(grades[0].course_name, "Algebra");
    assert_eq!(grades[0].grades, Grades::default());
    assert_eq!(grades[1].grades.current_score, Some(91.2));
    assert_eq!(grades[1].grades.current_grade.as_deref(), Some("A-"));
}

#[test]
fn calendar_query_sends_dates_and_contexts() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/calendar_events"))
            .and(query_param("all_events", "true"))
            .and(query_param("context_codes[]", "course_4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "assignment_9", "title": "Quiz", "type": "assignment"},
                {"id": 12, "title": "Office hours", "start_at": "2024-03-04T15:00:00Z"}
            ]))),
    );

    let query = CalendarQuery {
        start_date: Some("2024-03-01T00:00:00Z".parse().unwrap()),
        end_date: Some("2024-03-08T00:00:00Z".parse().unwrap()),
        context_codes: vec!["course_4".to_string()],
    };
    let events = h.client().calendar_events(&query).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0].is_assignment());

    let url = &h.requests()[0].url;
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(pairs.iter().any(|(k, _)| k == "start_date"));
    assert!(pairs.iter().any(|(k, _)| k == "end_date"));
}

#[test]
fn upload_with_created_response_needs_no_follow_up() {
    let h = Harness::new();
    let upload_url = format!("{}/one-time-upload", h.server.uri());
    h.mount(
        Mock::given(method("POST"))
            .and(path("/api/v1/users/self/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "upload_url": upload_url,
                "upload_params": {"key": "abc/notes.txt", "acl": "private"}
            }))),
    );
    h.mount(
        Mock::given(method("POST"))
            .and(path("/one-time-upload"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 99, "display_name": "notes.txt"}))),
    );

    let file = h
        .client()
        .upload_bytes(UploadTarget::User, "notes.txt", "text/plain", b"hello".to_vec())
        .unwrap();
    assert_eq!(file["id"], 99);

    let requests = h.requests();
    assert_eq!(requests.len(), 2);
    let announce: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(announce, json!({"name": "notes.txt", "size": 5, "content_type": "text/plain"}));

    let upload = &requests[1];
    assert!(upload.headers.get("authorization").is_none());
    let body = String::from_utf8_lossy(&upload.body);
    let key_at = body.find("name=\"key\"").unwrap();
    let file_at = body.find("name=\"file\"").unwrap();
    assert!(key_at < file_at, "file part must come last");
}

#[test]
fn upload_redirect_is_resolved_with_one_authenticated_get() {
    let h = Harness::new();
    let upload_url = format!("{}/one-time-upload", h.server.uri());
    let location = format!("{}/files/99/create_success", h.base_url());
    h.mount(
        Mock::given(method("POST"))
            .and(path("/api/v1/courses/5/assignments/6/submissions/self/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "upload_url": upload_url,
                "upload_params": {}
            }))),
    );
    h.mount(
        Mock::given(method("POST"))
            .and(path("/one-time-upload"))
            .respond_with(ResponseTemplate::new(303).insert_header("Location", location.as_str())),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/files/99/create_success"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 99}))),
    );

    let target = UploadTarget::Submission {
        course_id: 5,
        assignment_id: 6,
    };
    let file = h
        .client()
        .upload_bytes(target, "essay.pdf", "application/pdf", vec![1, 2, 3])
        .unwrap();
    assert_eq!(file, json!({"id": 99}));
    assert_eq!(h.requests().len(), 3);
}

#[test]
fn upload_rejection_is_reported_as_an_upload_failure() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("POST"))
            .and(path("/api/v1/courses/8/files"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "quota exceeded"}))),
    );

    let err = h
        .client()
        .upload_bytes(UploadTarget::Course(8), "big.zip", "application/zip", vec![0; 16])
        .unwrap_err();
    assert_eq!(err.to_string(), "Uploading file failed (HTTP 403): quota exceeded");
    assert!(matches!(err.root(), ApiError::Remote { status: 403, .. }));
}

#[test]
fn submission_failures_keep_their_cause() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("POST"))
            .and(path("/api/v1/courses/1/assignments/2/submissions"))
            .and(body_json(json!({
                "submission": {"submission_type": "online_text_entry", "body": "My answer"}
            })))
            .respond_with(ResponseTemplate::new(404)),
    );

    let request = SubmissionRequest::OnlineTextEntry {
        body: "My answer".to_string(),
    };
    let err = h.client().submit_assignment(1, 2, &request).unwrap_err();
    assert!(matches!(
        err,
        ApiError::Operation {
            operation: "Submitting assignment",
            ..
        }
    ));
    assert!(matches!(err.root(), ApiError::NotFound));
    assert_eq!(err.status(), Some(404));
    assert_eq!(
        err.to_string(),
        "Submitting assignment failed (HTTP 404): Resource not found"
    );
}

#[test]
fn empty_mutation_responses_read_as_true() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("DELETE"))
            .and(path("/api/v1/planner_notes/5"))
            .respond_with(ResponseTemplate::new(204)),
    );
    h.mount(
        Mock::given(method("DELETE"))
            .and(path("/api/v1/calendar_events/12"))
            .and(query_param("cancel_reason", "moved"))
            .respond_with(ResponseTemplate::new(200)),
    );

    let api = h.client();
    assert_eq!(api.delete_planner_note(5).unwrap(), Value::Bool(true));
    assert_eq!(
        api.delete_calendar_event(12, Some("moved")).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn planner_notes_and_overrides_send_their_payloads() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("PUT"))
            .and(path("/api/v1/planner_notes/3"))
            .and(body_json(json!({"title": "Read chapter 4"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3, "title": "Read chapter 4"}))),
    );
    h.mount(
        Mock::given(method("POST"))
            .and(path("/api/v1/planner/overrides"))
            .and(body_json(json!({
                "plannable_type": "assignment",
                "plannable_id": 42,
                "marked_complete": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 77, "marked_complete": true}))),
    );
    h.mount(
        Mock::given(method("PUT"))
            .and(path("/api/v1/planner/overrides/77"))
            .and(body_json(json!({"marked_complete": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 77, "marked_complete": false}))),
    );
    h.mount(
        Mock::given(method("DELETE"))
            .and(path("/api/v1/planner/overrides/77"))
            .respond_with(ResponseTemplate::new(204)),
    );

    let api = h.client();
    let note = PlannerNoteRequest {
        title: Some("Read chapter 4".to_string()),
        ..PlannerNoteRequest::default()
    };
    assert_eq!(api.update_planner_note(3, &note).unwrap()["id"], 3);

    let created = api.create_todo_override("assignment", 42, true).unwrap();
    assert_eq!(created["id"], 77);
    let updated = api.update_todo_override(77, false).unwrap();
    assert_eq!(updated["marked_complete"], false);
    assert_eq!(api.delete_todo_override(77).unwrap(), Value::Bool(true));
}

#[test]
fn personal_files_and_event_updates_use_the_user_scope() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/users/self/files"))
            .and(query_param("per_page", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "display_name": "cv.pdf"}]))),
    );
    h.mount(
        Mock::given(method("PUT"))
            .and(path("/api/v1/calendar_events/12"))
            .and(body_json(json!({"calendar_event": {"title": "Moved"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 12, "title": "Moved"}))),
    );

    let api = h.client();
    let files = api.files(None).unwrap();
    assert_eq!(files[0]["display_name"], "cv.pdf");

    let request = lms_cli::models::CalendarEventRequest {
        title: Some("Moved".to_string()),
        ..Default::default()
    };
    assert_eq!(api.update_calendar_event(12, &request).unwrap()["title"], "Moved");
}

#[test]
fn upload_with_a_non_json_answer_returns_the_raw_body() {
    let h = Harness::new();
    let upload_url = format!("{}/storage-upload", h.server.uri());
    h.mount(
        Mock::given(method("POST"))
            .and(path("/api/v1/users/self/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upload_url": upload_url}))),
    );
    h.mount(
        Mock::given(method("POST"))
            .and(path("/storage-upload"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<PostResponse><Key>abc</Key></PostResponse>"),
            ),
    );

    let file = h
        .client()
        .upload_bytes(UploadTarget::User, "notes.txt", "text/plain", b"hello".to_vec())
        .unwrap();
    assert_eq!(
        file,
        Value::String("<PostResponse><Key>abc</Key></PostResponse>".to_string())
    );
    assert_eq!(h.requests().len(), 2);
}

#[test]
fn upload_with_an_empty_answer_reads_as_true() {
    let h = Harness::new();
    let upload_url = format!("{}/storage-upload", h.server.uri());
    h.mount(
        Mock::given(method("POST"))
            .and(path("/api/v1/users/self/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upload_url": upload_url}))),
    );
    h.mount(
        Mock::given(method("POST"))
            .and(path("/storage-upload"))
            .respond_with(ResponseTemplate::new(204)),
    );

    let file = h
        .client()
        .upload_bytes(UploadTarget::User, "notes.txt", "text/plain", b"hello".to_vec())
        .unwrap();
    assert_eq!(file, Value::Bool(true));
}

#[test]
fn next_links_to_another_host_are_not_followed() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Link", "<http://127.0.0.1:9/api/v1/courses?page=2>; rel=\"next\"")
                    .set_body_json(json!([{"id": 1, "name": "A"}])),
            ),
    );

    let courses = h.client().courses(EnrollmentState::Active).unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(h.requests().len(), 1);
}

#[test]
fn grade_aggregation_skips_failing_courses() {
    let h = Harness::new();
    h.mount(courses_mock(json!([
        {"id": 1, "name": "Broken"},
        {"id": 2, "name": "Biology"}
    ])));
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses/1/enrollments"))
            .respond_with(ResponseTemplate::new(500)),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v1/courses/2/enrollments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"grades": {"current_score": 88.0}}
            ]))),
    );

    let merged = h.client().all_grades_detailed().unwrap();
    assert_eq!(merged.items.len(), 1);
    assert_eq!(merged.items[0].course_name, "Biology");
    assert_eq!(merged.items[0].grades.current_score, Some(88.0));
    assert_eq!(merged.failures.len(), 1);
    assert_eq!(merged.failures[0].course_id, 1);
    assert_eq!(merged.failures[0].course_name, "Broken");
    assert_eq!(merged.failures[0].error.status(), Some(500));
}
