// Calls that change state on the service. Each returns the response body,
// or JSON `true` when the service sends nothing back.

use serde::Serialize;
use serde_json::{json, Value};

use super::{parse_or_true, ApiClient, ApiError};
use crate::models::{CalendarEventRequest, NewConversation, PlannerNoteRequest, SubmissionRequest};

impl ApiClient {
    fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        tracing::debug!(path, "POST");
        let res = self.send(self.authed(self.client.post(self.url(path))).json(body))?;
        parse_or_true(res)
    }

    fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        tracing::debug!(path, "PUT");
        let res = self.send(self.authed(self.client.put(self.url(path))).json(body))?;
        parse_or_true(res)
    }

    fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        tracing::debug!(path, "DELETE");
        let res = self.send(self.authed(self.client.delete(self.url(path))).query(query))?;
        parse_or_true(res)
    }

    pub fn create_calendar_event(&self, event: &CalendarEventRequest) -> Result<Value, ApiError> {
        self.post_json("/calendar_events", &json!({ "calendar_event": event }))
            .map_err(|e| e.during("Creating calendar event"))
    }

    pub fn update_calendar_event(
        &self,
        event_id: u64,
        event: &CalendarEventRequest,
    ) -> Result<Value, ApiError> {
        self.put_json(
            &format!("/calendar_events/{}", event_id),
            &json!({ "calendar_event": event }),
        )
    }

    pub fn delete_calendar_event(
        &self,
        event_id: u64,
        cancel_reason: Option<&str>,
    ) -> Result<Value, ApiError> {
        let query: Vec<(&str, String)> = cancel_reason
            .map(|reason| ("cancel_reason", reason.to_string()))
            .into_iter()
            .collect();
        self.delete(&format!("/calendar_events/{}", event_id), &query)
    }

    pub fn submit_assignment(
        &self,
        course_id: u64,
        assignment_id: u64,
        submission: &SubmissionRequest,
    ) -> Result<Value, ApiError> {
        self.post_json(
            &format!(
                "/courses/{}/assignments/{}/submissions",
                course_id, assignment_id
            ),
            &json!({ "submission": submission }),
        )
        .map_err(|e| e.during("Submitting assignment"))
    }

    pub fn post_discussion_entry(
        &self,
        course_id: u64,
        topic_id: u64,
        message: &str,
    ) -> Result<Value, ApiError> {
        self.post_json(
            &format!(
                "/courses/{}/discussion_topics/{}/entries",
                course_id, topic_id
            ),
            &json!({ "message": message }),
        )
    }

    pub fn send_message(&self, message: &NewConversation) -> Result<Value, ApiError> {
        self.post_json("/conversations", message)
    }

    pub fn reply_to_conversation(&self, conversation_id: u64, body: &str) -> Result<Value, ApiError> {
        self.post_json(
            &format!("/conversations/{}/add_message", conversation_id),
            &json!({ "body": body }),
        )
    }

    pub fn create_planner_note(&self, note: &PlannerNoteRequest) -> Result<Value, ApiError> {
        self.post_json("/planner_notes", note)
    }

    pub fn update_planner_note(&self, note_id: u64, note: &PlannerNoteRequest) -> Result<Value, ApiError> {
        self.put_json(&format!("/planner_notes/{}", note_id), note)
    }

    pub fn delete_planner_note(&self, note_id: u64) -> Result<Value, ApiError> {
        self.delete(&format!("/planner_notes/{}", note_id), &[])
    }

    /// Marks a to-do item (assignment, quiz, planner note...) complete or not.
    /// `plannable_type` is the service's type name, e.g. `assignment`.
    pub fn create_todo_override(
        &self,
        plannable_type: &str,
        plannable_id: u64,
        marked_complete: bool,
    ) -> Result<Value, ApiError> {
        self.post_json(
            "/planner/overrides",
            &json!({
                "plannable_type": plannable_type,
                "plannable_id": plannable_id,
                "marked_complete": marked_complete,
            }),
        )
    }

    pub fn update_todo_override(&self, override_id: u64, marked_complete: bool) -> Result<Value, ApiError> {
        self.put_json(
            &format!("/planner/overrides/{}", override_id),
            &json!({ "marked_complete": marked_complete }),
        )
    }

    pub fn delete_todo_override(&self, override_id: u64) -> Result<Value, ApiError> {
        self.delete(&format!("/planner/overrides/{}", override_id), &[])
    }
}
