use anyhow::Result;
use chrono::{DateTime, Duration, Local, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use crossterm::style::Stylize;
use dialoguer::Select;

use super::format::{day_heading, description, long_datetime, short_date, time_of_day};
use super::help::{self, HelpTopic};
use super::{ask, ask_optional, confirm, fetch, heading, pause, perform, pick};
use crate::api::{ApiClient, CalendarQuery, EnrollmentState};
use crate::models::{CalendarEvent, CalendarEventRequest, ItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Today,
    Week,
    Month,
    Upcoming,
    All,
}

impl View {
    fn title(&self) -> &'static str {
        match self {
            View::Today => "Today's Events",
            View::Week => "This Week",
            View::Month => "This Month",
            View::Upcoming => "Upcoming Events",
            View::All => "All Events",
        }
    }

    /// Date window starting at local midnight today. `None` for views that
    /// are not bounded by dates.
    fn range(&self, today: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let end = match self {
            View::Today => today + Duration::days(1),
            View::Week => today + Duration::days(7),
            View::Month => today.checked_add_months(Months::new(1))?,
            View::Upcoming | View::All => return None,
        };
        Some((local_midnight(today)?, local_midnight(end)?))
    }
}

fn local_midnight(day: NaiveDate) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&day.and_time(NaiveTime::MIN))
        .earliest()
        .map(|at| at.with_timezone(&Utc))
}

pub fn show(api: &ApiClient) -> Result<()> {
    let views = [View::Today, View::Week, View::Month, View::Upcoming, View::All];
    loop {
        let mut items: Vec<String> = views.iter().map(|v| v.title().to_string()).collect();
        items.extend(
            ["Create event", "Edit event", "Delete event", "Help", "← Back to Main Menu"]
                .iter()
                .map(|s| s.to_string()),
        );
        let selection = Select::new()
            .with_prompt("Calendar View")
            .items(&items)
            .default(0)
            .interact()?;
        match selection {
            i if i < views.len() => {
                let view = views[i];
                let loaded = fetch("calendar events", || match view {
                    View::Upcoming => api.upcoming_events(),
                    _ => {
                        let query = match view.range(Local::now().date_naive()) {
                            Some((start, end)) => CalendarQuery {
                                start_date: Some(start),
                                end_date: Some(end),
                                ..CalendarQuery::default()
                            },
                            None => CalendarQuery::default(),
                        };
                        api.calendar_events(&query)
                    }
                });
                if let Some(mut events) = loaded {
                    sort_events(&mut events);
                    display(&events, view);
                    event_details(&events)?;
                }
            }
            5 => create_event(api)?,
            6 => edit_event(api)?,
            7 => delete_event(api)?,
            8 => help::show(HelpTopic::Calendar),
            _ => return Ok(()),
        }
    }
}

fn event_start(event: &CalendarEvent) -> Option<DateTime<Utc>> {
    event.start_at.or_else(|| {
        event
            .all_day_date
            .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
    })
}

fn sort_events(events: &mut [CalendarEvent]) {
    events.sort_by_key(|e| event_start(e).unwrap_or(DateTime::<Utc>::MIN_UTC));
}

fn display(events: &[CalendarEvent], view: View) {
    heading(&format!("Calendar - {}", view.title()));
    if events.is_empty() {
        println!("{}", "\n  No events found for this period".dark_grey());
        return;
    }

    let mut last_day = None;
    for event in events {
        let day = event.day(&Local);
        if day != last_day {
            println!();
            let label = day.map(day_heading).unwrap_or_else(|| "No date".to_string());
            println!("{}", format!("  {}", label).yellow().bold());
            println!("{}", format!("  {}", "─".repeat(35)).dark_grey());
            last_day = day;
        }
        let time = match event.start_at {
            Some(start) if !event.all_day => time_of_day(start),
            _ => "All Day".to_string(),
        };
        let icon = if event.is_assignment() {
            "📝"
        } else if event.event_type.as_deref() == Some("event") {
            "📅"
        } else {
            "📌"
        };
        println!(
            "  {} {} {}",
            icon,
            format!("{:<10}", time).white(),
            event.title.as_deref().unwrap_or("Untitled").cyan()
        );
        if let Some(location) = &event.location_name {
            println!("{}", format!("     📍 {}", location).dark_grey());
        }
    }
}

fn event_label(event: &CalendarEvent) -> String {
    let date = event
        .day(&Local)
        .map(short_date)
        .unwrap_or_else(|| "No date".to_string());
    format!("{} - {}", date, event.title.as_deref().unwrap_or("Untitled"))
}

fn event_details(events: &[CalendarEvent]) -> Result<()> {
    if events.is_empty() || !confirm("Would you like to view details for any event?")? {
        return Ok(());
    }
    let labels: Vec<String> = events.iter().map(event_label).collect();
    let Some(index) = pick("Select an event", &labels)? else {
        return Ok(());
    };
    let event = &events[index];

    heading("Event Details");
    println!("{}", format!("\n  {}", event.title.as_deref().unwrap_or("Untitled Event")).white().bold());
    if let Some(start) = event.start_at {
        println!("{}", format!("  Starts: {}", long_datetime(start)).dark_grey());
    } else if let Some(day) = event.all_day_date {
        println!("{}", format!("  Date: {} (all day)", day_heading(day)).dark_grey());
    }
    if let Some(end) = event.end_at {
        println!("{}", format!("  Ends: {}", time_of_day(end)).dark_grey());
    }
    if let Some(location) = &event.location_name {
        println!("{}", format!("  Location: {}", location).dark_grey());
    }
    if let Some(text) = event.description.as_deref().map(description).filter(|d| !d.is_empty()) {
        println!("{}", "\n  Description:".dark_grey());
        println!("  {}", text.white());
    }
    if let Some(url) = &event.html_url {
        println!("{}", format!("\n  URL: {}", url).dark_grey());
    }
    pause()
}

fn create_event(api: &ApiClient) -> Result<()> {
    let Some(user) = fetch("your profile", || api.current_user()) else {
        return Ok(());
    };
    let Some(courses) = fetch("courses", || api.courses(EnrollmentState::Active)) else {
        return Ok(());
    };
    let mut contexts = vec![("My calendar".to_string(), format!("user_{}", user.id))];
    contexts.extend(
        courses
            .iter()
            .map(|c| (c.name.clone(), c.context_code())),
    );
    let labels: Vec<String> = contexts.iter().map(|(name, _)| name.clone()).collect();
    let Some(index) = pick("Which calendar?", &labels)? else {
        return Ok(());
    };

    let title = ask("Title")?;
    let date = loop {
        let raw = ask("Date (YYYY-MM-DD)")?;
        match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(date) => break date,
            Err(_) => println!("{}", "Please use the YYYY-MM-DD format".yellow()),
        }
    };
    let start_time = ask_optional("Start time (HH:MM, empty for all day)")?
        .and_then(|t| NaiveTime::parse_from_str(&t, "%H:%M").ok());
    let location = ask_optional("Location (optional)")?;

    let mut request = CalendarEventRequest {
        context_code: Some(contexts[index].1.clone()),
        title: Some(title),
        location_name: location,
        ..CalendarEventRequest::default()
    };
    match start_time.and_then(|t| Local.from_local_datetime(&date.and_time(t)).earliest()) {
        Some(start) => {
            let start = start.with_timezone(&Utc);
            request.start_at = Some(start);
            request.end_at = Some(start + Duration::hours(1));
        }
        None => {
            request.start_at = local_midnight(date);
            request.all_day = Some(true);
        }
    }
    perform("Creating event", || api.create_calendar_event(&request));
    Ok(())
}

/// Upcoming events the user owns, with their numeric ids.
fn owned_events(api: &ApiClient) -> Option<Vec<(u64, CalendarEvent)>> {
    let mut events = fetch("upcoming events", || api.upcoming_events())?;
    sort_events(&mut events);
    // Assignment entries have string ids and cannot be changed here.
    let owned: Vec<(u64, CalendarEvent)> = events
        .into_iter()
        .filter(|e| !e.is_assignment())
        .filter_map(|e| match e.id {
            ItemId::Number(id) => Some((id, e)),
            ItemId::Text(_) => None,
        })
        .collect();
    if owned.is_empty() {
        println!("{}", "No upcoming events that can be changed".dark_grey());
        return None;
    }
    Some(owned)
}

fn edit_event(api: &ApiClient) -> Result<()> {
    let Some(events) = owned_events(api) else {
        return Ok(());
    };
    let labels: Vec<String> = events.iter().map(|(_, e)| event_label(e)).collect();
    let Some(index) = pick("Edit which event?", &labels)? else {
        return Ok(());
    };
    let (id, _) = &events[index];
    let request = CalendarEventRequest {
        title: ask_optional("New title (empty keeps it)")?,
        location_name: ask_optional("New location (empty keeps it)")?,
        description: ask_optional("New description (empty keeps it)")?,
        ..CalendarEventRequest::default()
    };
    if request.title.is_none() && request.location_name.is_none() && request.description.is_none() {
        println!("{}", "Nothing to change".dark_grey());
        return Ok(());
    }
    perform("Updating event", || api.update_calendar_event(*id, &request));
    Ok(())
}

fn delete_event(api: &ApiClient) -> Result<()> {
    let Some(events) = owned_events(api) else {
        return Ok(());
    };
    let labels: Vec<String> = events.iter().map(|(_, e)| event_label(e)).collect();
    let Some(index) = pick("Delete which event?", &labels)? else {
        return Ok(());
    };
    let (id, _) = &events[index];
    if confirm(&format!("Delete \"{}\"?", labels[index]))? {
        let reason = ask_optional("Reason (optional)")?;
        perform("Deleting event", || api.delete_calendar_event(*id, reason.as_deref()));
    }
    Ok(())
}
