use indicatif::ProgressBar;
use std::env;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// The spinner currently on screen, if any.
static ACTIVE_PROGRESS: Mutex<Option<ProgressBar>> = Mutex::new(None);

/// Registers the bar log lines must print around, or clears it with `None`.
pub fn track_progress(bar: Option<ProgressBar>) {
    match ACTIVE_PROGRESS.lock() {
        Ok(mut active) => *active = bar,
        Err(poisoned) => *poisoned.into_inner() = bar,
    }
}

fn active_progress() -> Option<ProgressBar> {
    match ACTIVE_PROGRESS.lock() {
        Ok(active) => active.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Stderr writer that hides the active spinner while a line is written, so
/// the line is not drawn over and the spinner redraws below it.
struct SuspendingStderr;

impl Write for SuspendingStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match active_progress() {
            Some(bar) => bar.suspend(|| io::stderr().write(buf)),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `LOG_LEVEL`; the
/// default only shows warnings so menus stay readable. Logs go to stderr.
pub fn init_logging() {
    let level = env::var("LOG_LEVEL").unwrap_or_else(|_| "WARN".to_string());
    let level = level.to_lowercase();

    let filter = match env::var("RUST_LOG") {
        Ok(rust_log) => EnvFilter::new(rust_log),
        Err(_) => EnvFilter::new(level),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(|| SuspendingStderr)
        .init();
}
