//! Wire commands
//!
//! Every inbound line is parsed once into a `Command`. The first token is
//! matched case-insensitively; anything that is not a known command word is
//! kept verbatim as `Command::Text`, which a publisher's handler treats as a
//! message body.

use crate::broker::topic::{TopicName, normalize_topic};
use crate::utils::error::ProtocolError;

/// First token of the control line that drives client-side deferral.
pub const INSPECT_CONTROL: &str = "IS_SERVER_INSPECTING";

pub fn inspect_control_line(inspecting: bool) -> String {
    format!("{INSPECT_CONTROL} {inspecting}")
}

/// Recognize `IS_SERVER_INSPECTING <true|false>`, matched byte for byte.
/// Any other line, including padded or indented variants, is `None`.
pub fn parse_inspect_control(line: &str) -> Option<bool> {
    match line.strip_prefix(INSPECT_CONTROL)?.strip_prefix(' ')? {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Publish(TopicName),
    Subscribe(TopicName),
    /// Explicit publish of everything after `send`.
    Send(String),
    Show,
    List,
    ListAll,
    Quit,
    /// Not a command word: a message body, or an error when unregistered.
    Text(String),
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, ProtocolError> {
        let line = line.trim();
        let mut tokens = line.split_whitespace();
        let Some(head) = tokens.next() else {
            return Ok(Command::Text(String::new()));
        };

        let command = match head.to_lowercase().as_str() {
            "publish" => {
                let rest: Vec<&str> = tokens.collect();
                Command::Publish(
                    normalize_topic(&rest).ok_or(ProtocolError::MissingTopic { command: "publish" })?,
                )
            }
            "subscribe" => {
                let rest: Vec<&str> = tokens.collect();
                Command::Subscribe(
                    normalize_topic(&rest)
                        .ok_or(ProtocolError::MissingTopic { command: "subscribe" })?,
                )
            }
            "send" => {
                let body = line[head.len()..].trim_start();
                if body.is_empty() {
                    return Err(ProtocolError::EmptyBody);
                }
                Command::Send(body.to_string())
            }
            "show" => Command::Show,
            "list" => Command::List,
            "listall" => Command::ListAll,
            "quit" => Command::Quit,
            _ => Command::Text(line.to_string()),
        };
        Ok(command)
    }

    /// Commands deferred while the connection's topic is being inspected.
    pub fn is_restricted(&self) -> bool {
        matches!(
            self,
            Command::Send(_) | Command::Text(_) | Command::List | Command::ListAll
        )
    }
}
