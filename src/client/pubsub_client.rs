//! Client representation
//!
//! `Client` models one accepted connection as the rest of the broker sees
//! it: its id, the sending side of its outbound line channel, its write-once
//! registration, the sent-log of messages it authored, and the flags the
//! console flips (alive, inspecting).
//!
//! All outbound traffic for a connection goes through `sender`; a single
//! writer task drains it, so direct replies and broadcasts never interleave
//! partial lines on the socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::broker::message::Message;
use crate::broker::topic::{ConnectionId, MessageId, TopicName};
use crate::client::registration::{Registration, Role};
use crate::transport::command::inspect_control_line;
use crate::utils::error::ProtocolError;
use crate::utils::sync::lock;

#[derive(Debug)]
pub struct Client {
    /// Monotonically assigned connection id.
    pub id: ConnectionId,

    /// Channel to the connection's writer task.
    sender: UnboundedSender<String>,

    registration: Mutex<Registration>,
    sent_log: Mutex<Vec<Arc<Message>>>,
    alive: AtomicBool,
    inspecting: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl Client {
    /// Create a client with a sender channel and the token that tears the
    /// connection down when cancelled.
    pub fn new(id: ConnectionId, sender: UnboundedSender<String>, cancel: CancellationToken) -> Self {
        let (inspecting, _) = watch::channel(false);
        Self {
            id,
            sender,
            registration: Mutex::new(Registration::Unregistered),
            sent_log: Mutex::new(Vec::new()),
            alive: AtomicBool::new(true),
            inspecting,
            cancel,
        }
    }

    /// Queue a line (or a multi-line block) for the writer task. Returns
    /// `false` when the writer is gone, i.e. the connection is broken.
    pub fn send(&self, line: impl Into<String>) -> bool {
        self.sender.send(line.into()).is_ok()
    }

    pub fn registration(&self) -> Registration {
        lock(&self.registration).clone()
    }

    pub fn role(&self) -> Option<Role> {
        lock(&self.registration).role()
    }

    pub fn topic(&self) -> Option<TopicName> {
        lock(&self.registration).topic().map(str::to_string)
    }

    pub(crate) fn register(&self, role: Role, topic: TopicName) -> Result<(), ProtocolError> {
        lock(&self.registration).register(role, topic)
    }

    pub(crate) fn record_sent(&self, message: &Arc<Message>) {
        lock(&self.sent_log).push(message.clone());
    }

    /// Copy of this client's sent-log, in send order.
    pub fn sent_messages(&self) -> Vec<Arc<Message>> {
        lock(&self.sent_log).clone()
    }

    pub fn sent_count(&self) -> usize {
        lock(&self.sent_log).len()
    }

    pub(crate) fn remove_sent(&self, id: MessageId) -> bool {
        let mut log = lock(&self.sent_log);
        match log.iter().position(|m| m.id == id) {
            Some(pos) => {
                log.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear_sent(&self) -> usize {
        let mut log = lock(&self.sent_log);
        let removed = log.len();
        log.clear();
        removed
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Flip the alive flag off. Only the first caller gets `true`, which
    /// makes teardown run exactly once.
    pub(crate) fn mark_dead(&self) -> bool {
        self.alive.swap(false, Ordering::SeqCst)
    }

    /// Flag (or unflag) this connection as bound to the inspected topic and
    /// tell the remote side with the control line plus a readable notice.
    pub fn set_inspecting(&self, inspecting: bool) {
        self.inspecting.send_replace(inspecting);
        self.send(inspect_control_line(inspecting));
        if inspecting {
            self.send("> SERVER IS INSPECTING THIS TOPIC: 'send', 'list' and 'listall' are queued until it ends");
        } else {
            self.send("> SERVER FINISHED INSPECTING THIS TOPIC");
        }
    }

    pub fn is_inspecting(&self) -> bool {
        *self.inspecting.borrow()
    }

    pub fn watch_inspecting(&self) -> watch::Receiver<bool> {
        self.inspecting.subscribe()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}
