use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::style::Stylize;
use dialoguer::Select;
use serde_json::Value;

use super::format::{short_datetime, strip_html, truncate};
use super::help::{self, HelpTopic};
use super::{ask, ask_optional, confirm, fetch, heading, pause, perform, pick};
use crate::api::{ApiClient, ConversationScope, EnrollmentState};
use crate::models::NewConversation;

pub fn show(api: &ApiClient) -> Result<()> {
    loop {
        let items = [
            "Unread conversations",
            "All conversations",
            "Sent",
            "Compose message",
            "Help",
            "← Back to Main Menu",
        ];
        let selection = Select::new()
            .with_prompt("Inbox")
            .items(&items)
            .default(0)
            .interact()?;
        let scope = match selection {
            0 => ConversationScope::Unread,
            1 => ConversationScope::Inbox,
            2 => ConversationScope::Sent,
            3 => {
                compose(api)?;
                continue;
            }
            4 => {
                help::show(HelpTopic::Inbox);
                continue;
            }
            _ => return Ok(()),
        };
        if let Some(conversations) = fetch("conversations", || api.conversations(scope)) {
            browse(api, &conversations)?;
        }
    }
}

fn text<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn participants(conversation: &Value) -> String {
    let names: Vec<&str> = conversation
        .get("participants")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|p| text(p, "name"))
        .collect();
    if names.is_empty() {
        "Unknown".to_string()
    } else {
        names.join(", ")
    }
}

fn subject(conversation: &Value) -> &str {
    text(conversation, "subject")
        .filter(|s| !s.is_empty())
        .unwrap_or("(no subject)")
}

fn is_unread(conversation: &Value) -> bool {
    text(conversation, "workflow_state") == Some("unread")
}

fn browse(api: &ApiClient, conversations: &[Value]) -> Result<()> {
    heading("Inbox");
    if conversations.is_empty() {
        println!("{}", "\n  No conversations found".dark_grey());
        return pause();
    }
    for conversation in conversations {
        println!();
        let marker = if is_unread(conversation) { "●".cyan() } else { " ".white() };
        println!("  {} {}", marker, subject(conversation).white().bold());
        let mut meta = vec![participants(conversation)];
        if let Some(context) = text(conversation, "context_name") {
            meta.push(context.to_string());
        }
        if let Some(at) = text(conversation, "last_message_at").and_then(|s| s.parse::<DateTime<Utc>>().ok()) {
            meta.push(short_datetime(at));
        }
        println!("{}", format!("     {}", meta.join(" | ")).dark_grey());
        if let Some(last) = text(conversation, "last_message") {
            println!("{}", format!("     {}", truncate(&strip_html(last), 80)).dark_grey());
        }
    }

    loop {
        println!();
        let labels: Vec<String> = conversations
            .iter()
            .map(|c| format!("{} - {}", subject(c), participants(c)))
            .collect();
        let Some(index) = pick("Open a conversation", &labels)? else {
            return Ok(());
        };
        let conversation = &conversations[index];
        heading(subject(conversation));
        println!("{}", format!("  With: {}", participants(conversation)).dark_grey());
        if let Some(last) = text(conversation, "last_message") {
            println!();
            println!("  {}", strip_html(last).white());
        }
        println!();
        let Some(id) = conversation.get("id").and_then(Value::as_u64) else {
            continue;
        };
        if confirm("Reply to this conversation?")? {
            let body = ask("Message")?;
            perform("Sending reply", || api.reply_to_conversation(id, &body));
        }
    }
}

/// Recipient ids entered as a comma separated list.
fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

fn compose(api: &ApiClient) -> Result<()> {
    heading("New Message");
    let mut message = NewConversation::default();

    if confirm("Send within a course?")? {
        if let Some(courses) = fetch("courses", || api.courses(EnrollmentState::Active)) {
            let labels: Vec<String> = courses.iter().map(|c| c.name.clone()).collect();
            if let Some(index) = pick("Which course?", &labels)? {
                message.context_code = Some(courses[index].context_code());
            }
        }
    }

    message.recipients = parse_recipients(&ask("Recipients (user ids, comma separated)")?);
    if message.recipients.is_empty() {
        println!("{}", "At least one recipient is required".yellow());
        return Ok(());
    }
    message.subject = ask_optional("Subject")?.unwrap_or_default();
    message.body = ask("Message")?;
    if confirm("Send this message?")? {
        perform("Sending message", || api.send_message(&message));
    }
    Ok(())
}
