//! Client-side command routing.
//!
//! `CommandRouter` holds no I/O. It turns what the user types and what the
//! server sends into `Action`s for the run loop. It tracks the local role
//! and topic to reject obviously invalid commands early, and consumes the
//! `IS_SERVER_INSPECTING` control line: while it is `true`, `send`, `list`
//! and `listall` go to the backlog instead of the server, and when it turns
//! `false` the backlog is replayed with list-class commands last.

use crate::broker::topic::normalize_topic;
use crate::client::{Registration, Role};
use crate::transport::backlog::{Backlog, is_list_class};
use crate::transport::command::parse_inspect_control;
use crate::utils::error::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write this line to the server.
    Forward(String),
    /// Show this text to the user.
    Print(String),
    /// Stop reading user input; the connection closes once the server
    /// acknowledges the forwarded `quit`.
    Quit,
}

#[derive(Debug, Default)]
pub struct CommandRouter {
    registration: Registration,
    server_inspecting: bool,
    backlog: Backlog,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn is_server_inspecting(&self) -> bool {
        self.server_inspecting
    }

    pub fn queued(&self) -> usize {
        self.backlog.len()
    }

    /// Drop queued commands (on disconnect), returning how many were lost.
    pub fn discard_backlog(&mut self) -> usize {
        self.backlog.clear()
    }

    /// Route one line typed by the user.
    pub fn handle_input(&mut self, input: &str) -> Vec<Action> {
        let line = input.trim();
        let mut tokens = line.split_whitespace();
        let Some(head) = tokens.next() else {
            return Vec::new();
        };
        let head = head.to_lowercase();

        let result = match head.as_str() {
            "help" => Ok(vec![Action::Print(self.help())]),
            "quit" => Ok(vec![Action::Forward("quit".to_string()), Action::Quit]),
            "show" => Ok(vec![Action::Forward("show".to_string())]),
            "publish" | "subscribe" => {
                let rest: Vec<&str> = tokens.collect();
                self.register(&head, &rest)
            }
            "send" => {
                let body = line[head.len()..].trim_start();
                self.send(line, body)
            }
            "list" => self.require_publisher("list").map(|()| self.defer_or_forward(line, "list")),
            "listall" => self
                .require_registered("listall")
                .map(|()| self.defer_or_forward(line, "listall")),
            _ => Err(ProtocolError::UnknownCommand(head.clone())),
        };

        result.unwrap_or_else(|e| vec![Action::Print(format!("> (ERROR) {e}"))])
    }

    /// Route one line received from the server.
    pub fn handle_server_line(&mut self, line: &str) -> Vec<Action> {
        match parse_inspect_control(line) {
            Some(true) => {
                self.server_inspecting = true;
                Vec::new()
            }
            Some(false) => {
                self.server_inspecting = false;
                self.replay()
            }
            None => vec![Action::Print(line.to_string())],
        }
    }

    fn register(&mut self, command: &str, topic_tokens: &[&str]) -> Result<Vec<Action>, ProtocolError> {
        let (role, usage) = if command == "publish" {
            (Role::Publisher, "publish")
        } else {
            (Role::Subscriber, "subscribe")
        };
        let topic =
            normalize_topic(topic_tokens).ok_or(ProtocolError::MissingTopic { command: usage })?;
        self.registration.register(role, topic.clone())?;
        Ok(vec![Action::Forward(format!("{usage} {topic}"))])
    }

    fn send(&mut self, line: &str, body: &str) -> Result<Vec<Action>, ProtocolError> {
        match self.registration.role() {
            None => return Err(ProtocolError::NotRegistered("send".to_string())),
            Some(Role::Subscriber) => return Err(ProtocolError::SubscriberCannotSend),
            Some(Role::Publisher) => {}
        }
        if body.is_empty() {
            return Err(ProtocolError::EmptyBody);
        }
        if self.server_inspecting {
            return Ok(self.defer(line));
        }
        Ok(vec![Action::Forward(format!("send {body}"))])
    }

    fn require_registered(&self, command: &str) -> Result<(), ProtocolError> {
        if self.registration.is_registered() {
            Ok(())
        } else {
            Err(ProtocolError::NotRegistered(command.to_string()))
        }
    }

    fn require_publisher(&self, command: &str) -> Result<(), ProtocolError> {
        self.require_registered(command)?;
        if self.registration.role() == Some(Role::Publisher) {
            Ok(())
        } else {
            Err(ProtocolError::PublisherOnly {
                command: command.to_string(),
            })
        }
    }

    fn defer_or_forward(&mut self, line: &str, command: &str) -> Vec<Action> {
        if self.server_inspecting {
            self.defer(line)
        } else {
            vec![Action::Forward(command.to_string())]
        }
    }

    fn defer(&mut self, line: &str) -> Vec<Action> {
        self.backlog.push(line);
        let when = if is_list_class(line) {
            "after the other queued commands"
        } else {
            "when the server finishes inspecting"
        };
        vec![Action::Print(format!("> (QUEUED) '{line}' will run {when}"))]
    }

    fn replay(&mut self) -> Vec<Action> {
        let entries = self.backlog.drain_ordered();
        if entries.is_empty() {
            return Vec::new();
        }

        let mut plan = format!(
            "--- EXECUTION PLAN: {} QUEUED COMMAND(S) ---\n",
            entries.len()
        );
        for (n, entry) in entries.iter().enumerate() {
            plan.push_str(&format!("{}. {entry}\n", n + 1));
        }
        plan.push_str("--- END OF EXECUTION PLAN ---");

        let mut actions = vec![Action::Print(plan)];
        for entry in &entries {
            actions.extend(self.handle_input(entry));
        }
        actions
    }

    fn help(&self) -> String {
        let mut out = String::from("--- HELP: AVAILABLE COMMANDS ---\n");
        match self.registration.role() {
            None => out.push_str(
                "> publish <topic>: Register as a publisher on a topic\n\
                 > subscribe <topic>: Register as a subscriber on a topic\n",
            ),
            Some(Role::Publisher) => out.push_str(
                "> send <message>: Publish a message on your topic\n\
                 > list: List the messages you sent on your topic\n\
                 > listall: List every message on your topic\n",
            ),
            Some(Role::Subscriber) => {
                out.push_str("> listall: List every message on your topic\n")
            }
        }
        out.push_str(
            "> show: Show available topics\n\
             > quit: Disconnect from the server",
        );
        out
    }
}
