//! # Message Rendering
//!
//! Pure transforms from thread data to what the user sees: the chronological
//! message list, sidebar labels and the plain-text transcript export.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

use crate::types::{Message, Origin, Thread};

/// Sender label for user messages
pub const USER_LABEL: &str = "You";

/// Sender label for assistant messages
pub const ASSISTANT_LABEL: &str = "Tiggy";

/// One message ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage<'a> {
    pub origin: Origin,
    pub sender: &'static str,
    pub text: &'a str,
    pub time_label: String,
}

pub fn sender_label(origin: Origin) -> &'static str {
    match origin {
        Origin::User => USER_LABEL,
        Origin::Assistant => ASSISTANT_LABEL,
    }
}

/// `HH:MM` in the given time zone
pub fn time_label_in<Tz: TimeZone>(timestamp: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    timestamp.with_timezone(tz).format("%H:%M").to_string()
}

/// Render a message sequence in true chronological order, labelled in `tz`
pub fn render_messages_in<'a, Tz: TimeZone>(
    messages: &'a [Message],
    tz: &Tz,
) -> Vec<RenderedMessage<'a>>
where
    Tz::Offset: std::fmt::Display,
{
    let mut ordered: Vec<&Message> = messages.iter().collect();
    ordered.sort_by_key(|m| m.timestamp);

    ordered
        .into_iter()
        .map(|m| RenderedMessage {
            origin: m.origin,
            sender: sender_label(m.origin),
            text: &m.text,
            time_label: time_label_in(m.timestamp, tz),
        })
        .collect()
}

/// Render a message sequence with local time labels
pub fn render_messages(messages: &[Message]) -> Vec<RenderedMessage<'_>> {
    render_messages_in(messages, &Local)
}

/// Sidebar "when" label: time today, `Yesterday`, or the date
pub fn updated_label_in<Tz: TimeZone>(
    updated_at: DateTime<Utc>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let age = now.signed_duration_since(updated_at);
    if age < chrono::Duration::hours(24) {
        time_label_in(updated_at, tz)
    } else if age < chrono::Duration::hours(48) {
        "Yesterday".to_string()
    } else {
        updated_at.with_timezone(tz).format("%m/%d/%Y").to_string()
    }
}

/// Sidebar meta line: `N messages • <when>`
pub fn thread_meta_in<Tz: TimeZone>(thread: &Thread, now: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{} messages • {}",
        thread.messages().len(),
        updated_label_in(thread.updated_at, now, tz)
    )
}

pub fn thread_meta(thread: &Thread) -> String {
    thread_meta_in(thread, Utc::now(), &Local)
}

/// Plain-text transcript, or `None` for an empty thread
pub fn export_transcript_in<Tz: TimeZone>(messages: &[Message], tz: &Tz) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    if messages.is_empty() {
        return None;
    }

    let body = render_messages_in(messages, tz)
        .into_iter()
        .map(|m| format!("[{}] {}: {}", m.time_label, m.sender, m.text))
        .collect::<Vec<_>>()
        .join("\n\n");
    Some(body)
}

pub fn export_transcript(messages: &[Message]) -> Option<String> {
    export_transcript_in(messages, &Local)
}

/// File name for a transcript saved on `date`
pub fn transcript_file_name(date: NaiveDate) -> String {
    format!("tiggy-chat-{}.txt", date.format("%Y-%m-%d"))
}
