// UI layer: interactive menus using `dialoguer`, spinners from `indicatif`
// and colours from `crossterm`. Each area of the LMS gets its own module;
// this one handles sign-in and the main menu loop.

mod announcements;
mod assignments;
mod calendar;
mod courses;
mod format;
mod grades;
mod help;
mod inbox;
mod todo;

use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::api::{ApiClient, ApiError};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::logger;

use help::HelpTopic;

const RULE: &str = "═══════════════════════════════════════";

/// Runs the CLI until the user exits.
pub fn run(config: Config) -> Result<()> {
    banner();
    let session = Session {
        store: config.credential_store()?,
        config,
    };
    let Some(mut api) = session.start()? else {
        return Ok(());
    };

    loop {
        heading("Main Menu");
        let items = [
            "Calendar - View events and deadlines",
            "Courses - Browse your courses",
            "Assignments - View and submit assignments",
            "Announcements - Read course announcements",
            "Grades - Check your grades",
            "Inbox - Read and send messages",
            "To-do - Items needing attention and planner notes",
            "Help - View available commands",
            "Refresh - Re-authenticate",
            "Clear Token - Remove saved credentials",
            "Exit",
        ];
        let selection = Select::new()
            .with_prompt("What would you like to do?")
            .items(&items)
            .default(0)
            .interact()?;
        match selection {
            0 => calendar::show(&api)?,
            1 => courses::show(&api)?,
            2 => assignments::show(&api)?,
            3 => announcements::show(&api)?,
            4 => grades::show(&api)?,
            5 => inbox::show(&api)?,
            6 => todo::show(&api)?,
            7 => help::show(HelpTopic::Main),
            8 => match session.prompt_authentication()? {
                Some(fresh) => api = fresh,
                None => break,
            },
            9 => {
                let confirm = Confirm::new()
                    .with_prompt("Are you sure you want to clear saved credentials?")
                    .default(false)
                    .interact()?;
                if !confirm {
                    continue;
                }
                session.store.clear()?;
                println!("{}", "✓ Credentials cleared".green());
                match session.prompt_authentication()? {
                    Some(fresh) => api = fresh,
                    None => break,
                }
            }
            _ => break,
        }
    }
    println!("{}", "\nThank you for using the LMS CLI!".cyan());
    Ok(())
}

struct Session {
    config: Config,
    store: CredentialStore,
}

impl Session {
    /// Signs in with saved credentials, then environment credentials, then
    /// by asking. `None` means the user gave up.
    fn start(&self) -> Result<Option<ApiClient>> {
        let saved = self.store.load().map(|c| (c.token, c.domain));
        let use_saved = match &saved {
            Some((_, domain)) => Confirm::new()
                .with_prompt(format!("Found stored API token for {}. Use it?", domain))
                .default(true)
                .interact()?,
            None => false,
        };
        for (token, domain) in startup_candidates(saved, use_saved, self.config.env_credentials()) {
            if let Some(api) = self.authenticate(&token, &domain, false) {
                return Ok(Some(api));
            }
        }
        self.prompt_authentication()
    }

    fn prompt_authentication(&self) -> Result<Option<ApiClient>> {
        loop {
            println!();
            println!("{}", "Please provide your LMS credentials:".yellow());
            println!("{}", "(Saved tokens are obscured, not encrypted)".dark_grey());
            let domain: String = Input::new()
                .with_prompt("Domain (e.g., canvas.instructure.com)")
                .validate_with(|input: &String| -> Result<(), &str> {
                    if input.trim().is_empty() {
                        Err("Domain is required")
                    } else {
                        Ok(())
                    }
                })
                .interact_text()?;
            // `Password` hides input and refuses an empty value.
            let token = Password::new().with_prompt("API token").interact()?;
            let save = Confirm::new()
                .with_prompt("Save credentials for future use?")
                .default(true)
                .interact()?;

            if let Some(api) = self.authenticate(token.trim(), domain.trim(), save) {
                return Ok(Some(api));
            }
            let retry = Confirm::new()
                .with_prompt("Would you like to try again?")
                .default(true)
                .interact()?;
            if !retry {
                return Ok(None);
            }
        }
    }

    /// Checks the token by fetching the current user.
    fn authenticate(&self, token: &str, domain: &str, save: bool) -> Option<ApiClient> {
        let api = match self.config.client(token, domain) {
            Ok(api) => api,
            Err(e) => {
                println!("{}", format!("Error: {:#}", e).red());
                return None;
            }
        };
        let spinner = spinner("Authenticating...");
        match api.current_user() {
            Ok(user) => {
                spinner.finish();
                println!("{}", format!("✓ Authenticated as {}", user.name).green());
                if save {
                    match self.store.store(token, domain) {
                        Ok(_) => println!("{}", "Credentials saved".dark_grey()),
                        Err(e) => println!("{}", format!("Could not save credentials: {}", e).yellow()),
                    }
                }
                Some(api)
            }
            Err(e) => {
                spinner.finish();
                println!("{}", "Authentication failed".red());
                println!("{}", format!("Error: {}", e).red());
                None
            }
        }
    }
}

/// Credentials to try before asking, in order. A declined saved pair is
/// skipped, and environment credentials equal to it are not tried twice.
fn startup_candidates(
    saved: Option<(String, String)>,
    use_saved: bool,
    env: Option<(String, String)>,
) -> Vec<(String, String)> {
    let env = env.filter(|pair| saved.as_ref() != Some(pair));
    saved.filter(|_| use_saved).into_iter().chain(env).collect()
}

fn banner() {
    println!("{}", RULE.cyan().bold());
    println!("{}", "    LMS CLI - Interactive Mode".cyan().bold());
    println!("{}", RULE.cyan().bold());
    println!();
}

pub(crate) fn heading(title: &str) {
    println!();
    println!("{}", RULE.cyan());
    println!("{}", format!("  {}", title).cyan().bold());
    println!("{}", RULE.cyan());
}

/// A steady spinner that log lines print around. Clears itself when
/// dropped.
pub(crate) struct Spinner(ProgressBar);

impl Spinner {
    pub(crate) fn finish(self) {
        drop(self);
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        logger::track_progress(None);
        self.0.finish_and_clear();
    }
}

pub(crate) fn spinner(message: &str) -> Spinner {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    logger::track_progress(Some(bar.clone()));
    Spinner(bar)
}

/// Runs one API call behind a spinner. Failures are reported and turned
/// into `None` so the menu can carry on.
pub(crate) fn fetch<T>(what: &str, call: impl FnOnce() -> Result<T, ApiError>) -> Option<T> {
    let spinner = spinner(&format!("Loading {}...", what));
    let result = call();
    spinner.finish();
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            println!("{}", format!("Failed to load {}", what).red());
            println!("{}", e.to_string().red());
            None
        }
    }
}

/// Like `fetch` for calls that change something.
pub(crate) fn perform<T>(what: &str, call: impl FnOnce() -> Result<T, ApiError>) -> Option<T> {
    let spinner = spinner(&format!("{}...", what));
    let result = call();
    spinner.finish();
    match result {
        Ok(value) => {
            println!("{}", format!("✓ {}: done", what).green());
            Some(value)
        }
        Err(e) => {
            println!("{}", e.to_string().red());
            None
        }
    }
}

pub(crate) fn pause() -> Result<()> {
    let _: String = Input::new()
        .with_prompt("Press Enter to continue")
        .allow_empty(true)
        .interact_text()?;
    Ok(())
}

/// Select from `labels`, with a trailing "Back" entry. `None` means back.
pub(crate) fn pick(prompt: &str, labels: &[String]) -> Result<Option<usize>> {
    let mut items: Vec<String> = labels.to_vec();
    items.push("← Back".to_string());
    let selection = Select::new()
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact()?;
    Ok((selection < labels.len()).then_some(selection))
}

pub(crate) fn ask(prompt: &str) -> Result<String> {
    Ok(Input::<String>::new().with_prompt(prompt).interact_text()?)
}

pub(crate) fn ask_optional(prompt: &str) -> Result<Option<String>> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    let value = value.trim().to_string();
    Ok((!value.is_empty()).then_some(value))
}

pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}
