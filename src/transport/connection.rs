//! Per-connection handler.
//!
//! Each accepted socket gets one task running `handle_connection`. The
//! client is registered with the broker before the read loop starts, so a
//! still-unregistered connection is already visible to `kick` and shutdown.
//!
//! The socket is split: the read half feeds the command state machine, the
//! write half belongs to a writer task draining the client's outbound
//! channel. Replies from this loop and broadcasts from other connections
//! both go through that channel, one complete line or block at a time.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::broker::message::render_log;
use crate::broker::topic::{TopicName, render_summaries};
use crate::client::{Client, Registration, Role};
use crate::config::BrokerSettings;
use crate::transport::backlog::Backlog;
use crate::transport::command::Command;
use crate::utils::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Serve one connection until it quits, disconnects, is kicked, or the
/// broker shuts down. Teardown always runs exactly once.
pub async fn handle_connection(
    socket: TcpStream,
    addr: SocketAddr,
    broker: Arc<Broker>,
    settings: BrokerSettings,
) {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let client = broker.register_client(tx);
    let cancel = client.cancellation().clone();
    info!(client = client.id, %addr, "client connected");

    let (read_half, write_half) = socket.into_split();
    let mut lines = FramedRead::new(
        read_half,
        LinesCodec::new_with_max_length(settings.max_line_bytes),
    );
    let writer = tokio::spawn(write_loop(
        client.id,
        FramedWrite::new(write_half, LinesCodec::new()),
        rx,
        cancel.clone(),
    ));

    client.send(format!(
        "> CONNECTED AS USER {}. REGISTER WITH 'publish <topic>' OR 'subscribe <topic>'",
        client.id
    ));

    let mut session = Session::new(broker.clone(), client.clone());
    let mut inspecting = client.watch_inspecting();
    let read_timeout = settings.read_timeout();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            changed = inspecting.changed() => {
                if changed.is_err() {
                    break;
                }
                if !*inspecting.borrow_and_update() {
                    session.replay_backlog();
                }
            }

            read = tokio::time::timeout(read_timeout, lines.next()) => match read {
                // Routine re-poll; lets a dead flag end the loop.
                Err(_elapsed) => {
                    if !client.is_alive() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!(client = client.id, "end of stream");
                    break;
                }
                Ok(Some(Err(e))) => {
                    warn!(client = client.id, error = %e, "read failed");
                    break;
                }
                Ok(Some(Ok(line))) => {
                    if session.handle_line(&line) == Flow::Quit {
                        break;
                    }
                }
            },
        }
    }

    let dropped = session.backlog.clear();
    if dropped > 0 {
        debug!(client = client.id, dropped, "discarded queued commands");
    }
    broker.cleanup_client(client.id);
    if let Err(e) = writer.await {
        warn!(client = client.id, error = %e, "writer task failed");
    }
    info!(client = client.id, %addr, "client disconnected");
}

/// Drain the outbound channel into the socket. On cancellation, lines that
/// were already queued (a kick or shutdown notice) are still written before
/// the write half is shut down.
async fn write_loop(
    client_id: u64,
    mut sink: FramedWrite<OwnedWriteHalf, LinesCodec>,
    mut rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            line = rx.recv() => match line {
                Some(line) => {
                    if let Err(e) = sink.send(line).await {
                        warn!(client = client_id, error = %e, "write failed");
                        cancel.cancel();
                        return;
                    }
                }
                None => break,
            },

            _ = cancel.cancelled() => {
                while let Ok(line) = rx.try_recv() {
                    if sink.send(line).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }

    // `send` flushes every line, so nothing is left buffered in the sink.
    if let Err(e) = sink.into_inner().shutdown().await {
        debug!(client = client_id, error = %e, "shutdown of write half failed");
    }
}

/// The command state machine of one connection.
pub(crate) struct Session {
    broker: Arc<Broker>,
    client: Arc<Client>,
    backlog: Backlog,
}

impl Session {
    pub(crate) fn new(broker: Arc<Broker>, client: Arc<Client>) -> Self {
        Self {
            broker,
            client,
            backlog: Backlog::new(),
        }
    }

    fn handle_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                self.reply_error(&e);
                return Flow::Continue;
            }
        };

        if self.client.is_inspecting() {
            if let Err(e) = self.check_deferrable(&command) {
                self.reply_error(&e);
                return Flow::Continue;
            }
            if command.is_restricted() {
                self.backlog.push(line);
                self.client.send(format!(
                    "> (QUEUED) '{line}' WILL RUN WHEN THE SERVER FINISHES INSPECTING"
                ));
                return Flow::Continue;
            }
        } else if !self.backlog.is_empty() {
            // Inspection ended but the watch wake-up has not run yet.
            self.replay_backlog();
        }

        self.execute(command)
    }

    /// Reject now what would only fail at replay: a subscriber cannot send
    /// and `list` is publisher-only.
    fn check_deferrable(&self, command: &Command) -> Result<(), ProtocolError> {
        if self.client.registration().role() != Some(Role::Subscriber) {
            return Ok(());
        }
        match command {
            Command::Send(_) | Command::Text(_) => Err(ProtocolError::SubscriberCannotSend),
            Command::List => Err(ProtocolError::PublisherOnly {
                command: "list".to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn replay_backlog(&mut self) {
        if self.backlog.is_empty() {
            return;
        }
        let entries = self.backlog.drain_ordered();
        debug!(client = self.client.id, count = entries.len(), "replaying queued commands");
        self.client
            .send(format!("> RUNNING {} QUEUED COMMAND(S)", entries.len()));
        for line in entries {
            self.handle_line(&line);
        }
    }

    fn execute(&mut self, command: Command) -> Flow {
        let result = match self.client.registration() {
            Registration::Unregistered => self.unregistered(command),
            Registration::Registered { role, topic } => self.registered(role, &topic, command),
        };
        match result {
            Ok(flow) => flow,
            Err(e) => {
                self.reply_error(&e);
                Flow::Continue
            }
        }
    }

    fn unregistered(&self, command: Command) -> Result<Flow, ProtocolError> {
        match command {
            Command::Publish(topic) => self.register(Role::Publisher, topic),
            Command::Subscribe(topic) => self.register(Role::Subscriber, topic),
            Command::Show => self.show(),
            Command::Quit => self.quit(),
            Command::Send(_) => Err(ProtocolError::NotRegistered("send".to_string())),
            Command::List => Err(ProtocolError::NotRegistered("list".to_string())),
            Command::ListAll => Err(ProtocolError::NotRegistered("listall".to_string())),
            Command::Text(text) => Err(ProtocolError::NotRegistered(command_word(&text))),
        }
    }

    fn registered(&self, role: Role, topic: &str, command: Command) -> Result<Flow, ProtocolError> {
        match command {
            Command::Publish(topic) => self.register(Role::Publisher, topic),
            Command::Subscribe(topic) => self.register(Role::Subscriber, topic),
            Command::Show => self.show(),
            Command::Quit => self.quit(),
            Command::ListAll => {
                let log = self.broker.snapshot(topic);
                self.client.send(render_log("LISTALL", topic, &log));
                Ok(Flow::Continue)
            }
            Command::List => {
                if role != Role::Publisher {
                    return Err(ProtocolError::PublisherOnly {
                        command: "list".to_string(),
                    });
                }
                let sent = self.client.sent_messages();
                self.client.send(render_log("LIST", topic, &sent));
                Ok(Flow::Continue)
            }
            Command::Send(body) | Command::Text(body) => {
                self.broker.publish(&self.client, &body)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn register(&self, role: Role, topic: TopicName) -> Result<Flow, ProtocolError> {
        self.broker.bind(&self.client, role, topic.clone())?;
        self.client.send(format!(
            "> REGISTERED AS {} ON TOPIC '{topic}'",
            role.as_str().to_uppercase()
        ));
        Ok(Flow::Continue)
    }

    fn show(&self) -> Result<Flow, ProtocolError> {
        self.client.send(render_summaries(&self.broker.topic_summaries()));
        Ok(Flow::Continue)
    }

    fn quit(&self) -> Result<Flow, ProtocolError> {
        self.client.send("> GOODBYE");
        Ok(Flow::Quit)
    }

    fn reply_error(&self, error: &ProtocolError) {
        debug!(client = self.client.id, %error, "protocol error");
        self.client.send(format!("> (ERROR) {error}"));
    }
}

fn command_word(text: &str) -> String {
    text.split_whitespace().next().unwrap_or_default().to_string()
}

#[cfg(test)]
impl Session {
    pub(crate) fn feed(&mut self, line: &str) -> bool {
        self.handle_line(line) == Flow::Quit
    }

    pub(crate) fn queued(&self) -> usize {
        self.backlog.len()
    }
}

