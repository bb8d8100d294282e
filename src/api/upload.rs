// File uploads follow the service's three step protocol:
//   1. announce the file and receive a one-time upload URL plus form fields,
//   2. POST the form fields and the file to that URL,
//   3. resolve the result: 201 carries the file record, a Location header
//      points at it, anything else is returned as is.

use reqwest::blocking::{multipart, Response};
use reqwest::header::LOCATION;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::Path;

use super::{parse, parse_or_true, ApiClient, ApiError};
use crate::models::UploadTarget;

const OPERATION: &str = "Uploading file";

/// Response to step 1.
#[derive(Deserialize, Debug)]
struct UploadTicket {
    upload_url: String,
    #[serde(default)]
    upload_params: Map<String, Value>,
    #[serde(default)]
    file_param: Option<String>,
}

impl ApiClient {
    /// Uploads a file from disk. The content type is guessed from the
    /// extension.
    pub fn upload_file(&self, target: UploadTarget, path: &Path) -> Result<Value, ApiError> {
        let bytes = std::fs::read(path).map_err(|source| ApiError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload.bin");
        self.upload_bytes(target, name, content_type_for(path), bytes)
    }

    pub fn upload_bytes(
        &self,
        target: UploadTarget,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, ApiError> {
        self.upload_inner(target, name, content_type, bytes)
            .map_err(|e| e.during(OPERATION))
    }

    fn upload_inner(
        &self,
        target: UploadTarget,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, ApiError> {
        let announce = json!({
            "name": name,
            "size": bytes.len(),
            "content_type": content_type,
        });
        tracing::debug!(endpoint = %target.endpoint(), name, size = bytes.len(), "Requesting upload ticket");
        let res = self.send(
            self.authed(self.client.post(self.url(&target.endpoint())))
                .json(&announce),
        )?;
        let ticket: UploadTicket = parse(res)?;

        let mut form = multipart::Form::new();
        for (key, value) in ticket.upload_params {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s,
                other => other.to_string(),
            };
            form = form.text(key, value);
        }
        let part = multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(content_type)
            .map_err(ApiError::Transport)?;
        // The file part has to come after every other field.
        form = form.part(ticket.file_param.unwrap_or_else(|| "file".to_string()), part);

        let res = self
            .upload_client
            .post(&ticket.upload_url)
            .multipart(form)
            .send()
            .map_err(ApiError::Transport)?;
        let status = res.status();
        if status.is_client_error() || status.is_server_error() {
            let body = res.text().unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
        if status == StatusCode::CREATED {
            return upload_body(res);
        }
        let location = res
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        match location {
            Some(url) => {
                tracing::debug!(%url, "Confirming upload");
                let res = self.send(self.authed(self.client.get(url)))?;
                parse_or_true(res)
            }
            None => upload_body(res),
        }
    }
}

/// Body of a direct-upload response. Storage hosts may answer with XML or
/// plain text, which comes back as a JSON string instead of failing.
fn upload_body(res: Response) -> Result<Value, ApiError> {
    let text = res.text().map_err(ApiError::Transport)?;
    if text.trim().is_empty() {
        return Ok(Value::Bool(true));
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => "application/octet-stream",
    }
}
