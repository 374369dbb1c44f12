//! Operator console
//!
//! The console is the only issuer of inspect transitions and of the
//! administrative mutations (delete, clear, kick, quit). It runs as a single
//! task reading the server's stdin, so those operations never race each
//! other. `AdminConsole::execute` holds the command logic and is driven
//! directly by tests; `run_console` is the stdin loop around it.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::admin::export::{ExportTarget, export_messages};
use crate::broker::Broker;
use crate::broker::message::render_log;
use crate::broker::topic::{ConnectionId, MessageId, TopicName, normalize_topic, render_summaries};
use crate::client::Client;
use crate::utils::error::AdminError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Show,
    Inspect(TopicName),
    End,
    ListAll,
    Delete(MessageId),
    Clear,
    Kick(ConnectionId),
    ExportUser(ConnectionId),
    ExportTopic(TopicName),
    Users,
    User(ConnectionId),
    Quit,
    Help,
}

impl AdminCommand {
    /// Parse one console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<AdminCommand>, AdminError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((head, args)) = tokens.split_first() else {
            return Ok(None);
        };

        let command = match head.to_lowercase().as_str() {
            "show" => AdminCommand::Show,
            "inspect" => AdminCommand::Inspect(
                normalize_topic(args).ok_or(AdminError::Usage("inspect <topic>"))?,
            ),
            "end" => AdminCommand::End,
            "listall" => AdminCommand::ListAll,
            "delete" => AdminCommand::Delete(parse_id(
                args.first(),
                "delete <messageID> (see 'listall' for valid ids)",
            )?),
            "clear" => AdminCommand::Clear,
            "kick" => AdminCommand::Kick(parse_id(args.first(), "kick <userID>")?),
            "export" => {
                const USAGE: &str = "export [user <userID> | topic <topic>]";
                match args.split_first() {
                    Some((kind, rest)) if kind.eq_ignore_ascii_case("user") => {
                        AdminCommand::ExportUser(parse_id(rest.first(), USAGE)?)
                    }
                    Some((kind, rest)) if kind.eq_ignore_ascii_case("topic") => {
                        AdminCommand::ExportTopic(
                            normalize_topic(rest).ok_or(AdminError::Usage(USAGE))?,
                        )
                    }
                    _ => return Err(AdminError::Usage(USAGE)),
                }
            }
            "users" => AdminCommand::Users,
            "user" => AdminCommand::User(parse_id(args.first(), "user <userID>")?),
            "quit" => AdminCommand::Quit,
            "help" => AdminCommand::Help,
            other => return Err(AdminError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// Numeric arguments must be plain decimal digits.
fn parse_id(token: Option<&&str>, usage: &'static str) -> Result<u64, AdminError> {
    token
        .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
        .and_then(|t| t.parse().ok())
        .ok_or(AdminError::Usage(usage))
}

/// Console output for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Set once `quit` has shut the broker down.
    pub shutdown: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            shutdown: false,
        }
    }
}

pub struct AdminConsole {
    broker: Arc<Broker>,
    export_dir: PathBuf,
    pending_clear: Option<TopicName>,
}

impl AdminConsole {
    pub fn new(broker: Arc<Broker>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            broker,
            export_dir: export_dir.into(),
            pending_clear: None,
        }
    }

    /// Whether the next line answers a `clear` confirmation.
    pub fn awaiting_confirmation(&self) -> bool {
        self.pending_clear.is_some()
    }

    pub fn execute(&mut self, line: &str) -> Result<Reply, AdminError> {
        if let Some(topic) = self.pending_clear.take() {
            return self.confirm_clear(&topic, line);
        }

        let Some(command) = AdminCommand::parse(line)? else {
            return Ok(Reply::text(""));
        };

        match command {
            AdminCommand::Show => Ok(Reply::text(render_summaries(
                &self.broker.topic_summaries(),
            ))),
            AdminCommand::Inspect(topic) => {
                let notified = self.broker.begin_inspect(&topic)?;
                Ok(Reply::text(format!(
                    "--- INSPECT MODE STARTED ---\n> Begun inspecting topic '{topic}' ({notified} client(s) notified). Enter 'help' for a list of available commands."
                )))
            }
            AdminCommand::End => {
                let (topic, _) = self.broker.end_inspect()?;
                Ok(Reply::text(format!(
                    "> Exited inspect mode for topic '{topic}'.\n--- INSPECT MODE ENDED ---"
                )))
            }
            AdminCommand::ListAll => {
                let topic = self.inspected("listall")?;
                let log = self.broker.snapshot(&topic);
                Ok(Reply::text(render_log("LISTALL", &topic, &log)))
            }
            AdminCommand::Delete(id) => {
                self.broker.delete_message(id)?;
                Ok(Reply::text(format!("> (SUCCESS) Message with ID {id} deleted.")))
            }
            AdminCommand::Clear => {
                let topic = self.inspected("clear")?;
                if self.broker.snapshot(&topic).is_empty() {
                    return Err(AdminError::NoMessages(format!("topic '{topic}'")));
                }
                let prompt = format!(
                    "> Are you sure you want to clear all messages in topic '{topic}'? (y/n)"
                );
                self.pending_clear = Some(topic);
                Ok(Reply::text(prompt))
            }
            AdminCommand::Kick(id) => {
                self.broker.kick(id)?;
                Ok(Reply::text(format!("> User ID {id} has been kicked.")))
            }
            AdminCommand::ExportUser(id) => {
                let client = self.broker.client(id).ok_or(AdminError::UserNotFound(id))?;
                let path = export_messages(
                    &self.export_dir,
                    &ExportTarget::User(id),
                    &client.sent_messages(),
                )?;
                Ok(Reply::text(format!(
                    "> Messages for user ID {id} exported to '{}'.",
                    path.display()
                )))
            }
            AdminCommand::ExportTopic(topic) => {
                if !self.broker.topics().contains(&topic) {
                    return Err(AdminError::TopicNotFound(topic));
                }
                let log = self.broker.snapshot(&topic);
                let path = export_messages(
                    &self.export_dir,
                    &ExportTarget::Topic(topic.clone()),
                    &log,
                )?;
                Ok(Reply::text(format!(
                    "> Messages in topic '{topic}' exported to '{}'.",
                    path.display()
                )))
            }
            AdminCommand::Users => Ok(Reply::text(self.render_users())),
            AdminCommand::User(id) => {
                let client = self.broker.client(id).ok_or(AdminError::UserNotFound(id))?;
                Ok(Reply::text(format!(
                    "--- SHOW: USER DETAILS ---\n{}\n--- END OF USER DETAILS ---",
                    describe_client(&client)
                )))
            }
            AdminCommand::Quit => {
                let notified = self.broker.shutdown()?;
                Ok(Reply {
                    text: format!("> Disconnecting {notified} client(s)\n--- SERVER SHUTDOWN ---"),
                    shutdown: true,
                })
            }
            AdminCommand::Help => Ok(Reply::text(self.help())),
        }
    }

    fn confirm_clear(&self, topic: &str, answer: &str) -> Result<Reply, AdminError> {
        if !answer.trim().eq_ignore_ascii_case("y") {
            return Ok(Reply::text("> Clear operation cancelled."));
        }
        let removed = self.broker.clear_topic()?;
        Ok(Reply::text(format!(
            "> All {removed} message(s) in topic '{topic}' have been cleared."
        )))
    }

    fn inspected(&self, command: &'static str) -> Result<TopicName, AdminError> {
        self.broker
            .inspected_topic()
            .ok_or(AdminError::InspectInactive(command))
    }

    fn render_users(&self) -> String {
        let clients = self.broker.clients();
        if clients.is_empty() {
            return "> No users connected.".to_string();
        }
        let mut out = String::from("--- SHOW: CONNECTED USERS ---\n");
        for client in &clients {
            out.push_str(&describe_client(client));
            out.push('\n');
        }
        out.push_str("--- END OF SHOW USERS ---");
        out
    }

    fn help(&self) -> String {
        let mut out = String::from(
            "--- HELP: AVAILABLE COMMANDS ---\n\
             > show: Show available topics\n\
             > kick <userID>: Kick a client by ID\n\
             > export user <userID>: Export all messages of a user\n\
             > export topic <topic>: Export all messages of a topic\n\
             > users: Show all connected users and their details\n\
             > user <userID>: Show details of a specific user\n",
        );
        if self.broker.inspected_topic().is_some() {
            out.push_str(
                "> listall: List all messages in the topic\n\
                 > delete <messageID>: Delete a message by ID\n\
                 > clear: Clear all messages in the topic being inspected\n\
                 > end: Exit inspect mode\n\
                 ! Commands 'quit' and 'inspect' are disabled in inspect mode; \
                 clients' 'send', 'list' and 'listall' are queued until it ends.",
            );
        } else {
            out.push_str(
                "> inspect <topic>: Inspect a topic (list, delete and clear its messages)\n\
                 > quit: Shut the server down",
            );
        }
        out
    }
}

fn describe_client(client: &Client) -> String {
    let topic = client.topic().unwrap_or_else(|| "none".to_string());
    let role = client.role().map_or("unregistered", |r| r.as_str());
    format!(
        "> User ID: {} | Topic: {topic} | Role: {role}\n> Messages sent: {} | Inspecting: {}",
        client.id,
        client.sent_count(),
        if client.is_inspecting() { "yes" } else { "no" },
    )
}

/// Read console commands from stdin until `quit` or until `shutdown` is
/// cancelled. If stdin closes first, the server keeps running until shutdown.
pub async fn run_console(mut console: AdminConsole, shutdown: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("--- CONSOLE READY: enter 'help' for the list of commands ---");

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("console input closed");
                shutdown.cancelled().await;
                break;
            }
            Err(e) => {
                warn!(error = %e, "console read failed");
                shutdown.cancelled().await;
                break;
            }
        };

        match console.execute(&line) {
            Ok(reply) => {
                if !reply.text.is_empty() {
                    println!("{}", reply.text);
                }
                if reply.shutdown {
                    break;
                }
            }
            Err(e) => println!("> (ERROR) {e}"),
        }
    }
}
