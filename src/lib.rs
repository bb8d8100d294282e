// Library root
// -----------
// This crate exposes the library surface behind the `lms-cli` binary.
//
// Module responsibilities:
// - `api`: the LMS REST client. One method per remote resource, plus the
//   cross-course aggregations, mutations and the file upload protocol. All
//   failures come back as `api::ApiError`.
// - `credentials`: the saved domain + token pair on disk.
// - `models`: typed views of the records the service returns.
// - `config` / `logger`: environment settings and tracing setup.
// - `ui`: the interactive menus. It only talks to `api` and `credentials`.
pub mod api;
pub mod config;
pub mod credentials;
pub mod logger;
pub mod models;
pub mod ui;
