//! Message definitions for the broker
//!
//! `Message` is the immutable record appended to a topic's log and to its
//! author's sent-log. Both logs hold the same `Arc<Message>`; a message is
//! never mutated, only removed.
//!
//! Notes on fields:
//! - `id`: assigned by the topic registry's process-wide counter at append
//!   time; ids are unique across all topics and never reused
//! - `topic`: normalized topic name, always equal to the owning log's name
//! - `author`: connection id of the publishing client
//! - `body`: message text, wrapped at `WRAP_WIDTH` characters
//! - `created_at`: local wall-clock time of the append

use chrono::{DateTime, Local};
use std::fmt;
use std::sync::Arc;

use crate::broker::topic::{ConnectionId, MessageId, TopicName};

/// Bodies get a line break inserted after every `WRAP_WIDTH` characters.
pub const WRAP_WIDTH: usize = 80;

/// Separator line framing every rendered message block.
pub const SEPARATOR: &str =
    "--------------------------------------------------------------------------------";

/// Prefix of every rendered body line after the first. No body line can
/// then equal a separator or the inspect control line.
pub const CONTINUATION: &str = "| ";

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y - %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub topic: TopicName,
    pub author: ConnectionId,
    pub body: String,
    pub created_at: DateTime<Local>,
}

/// How a live broadcast copy is framed for its recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The author's own copy.
    Sent,
    /// Every other bound connection's copy.
    Received,
}

impl Delivery {
    pub fn label(self) -> &'static str {
        match self {
            Delivery::Sent => "SENT",
            Delivery::Received => "RECEIVED",
        }
    }
}

impl Message {
    pub fn new(id: MessageId, topic: &str, author: ConnectionId, body: &str) -> Self {
        Self {
            id,
            topic: topic.to_string(),
            author,
            body: wrap_body(body, WRAP_WIDTH),
            created_at: Local::now(),
        }
    }

    /// Render the message as a separator-framed block. `delivery` adds the
    /// SENT/RECEIVED tag used on live broadcasts; listings pass `None`.
    pub fn render(&self, delivery: Option<Delivery>) -> String {
        let header = match delivery {
            Some(d) => format!("[{} | ID {} | TOPIC '{}']", d.label(), self.id, self.topic),
            None => format!("[ID {} | TOPIC '{}']", self.id, self.topic),
        };
        let body = self.body.replace('\n', &format!("\n{CONTINUATION}"));
        format!(
            "{SEPARATOR}\n{}\n{header}\nBODY: {body}\n{SEPARATOR}",
            self.created_at.format(TIMESTAMP_FORMAT),
        )
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(None))
    }
}

/// Render a titled listing of messages, e.g. `LISTALL` over a topic log.
pub fn render_log(label: &str, topic: &str, messages: &[Arc<Message>]) -> String {
    if messages.is_empty() {
        return format!("> No messages available for topic '{topic}'.");
    }
    let mut out = format!(
        "--- {label}: {} MESSAGES IN '{topic}' ---\n",
        messages.len()
    );
    for message in messages {
        out.push_str(&message.render(None));
        out.push('\n');
    }
    out.push_str(&format!("--- {label}: END OF MESSAGES IN '{topic}' ---"));
    out
}

/// Insert a newline after every `width` characters.
pub fn wrap_body(body: &str, width: usize) -> String {
    let chars: Vec<char> = body.chars().collect();
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
