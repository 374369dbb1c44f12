//! Broker engine
//!
//! This module contains the shared broker state responsible for:
//! - tracking connected clients by id (added at accept, removed exactly once)
//! - binding clients to topics and appending published messages
//! - fanning messages and server notices out to every bound client
//! - the inspect session and the administrative mutations (delete, clear,
//!   kick, shutdown) issued by the operator console
//!
//! Concurrency and usage notes:
//! - `Broker` is constructed once and shared as `Arc<Broker>`; each piece of
//!   state carries its own lock and no lock is held across an `.await`.
//! - Lock order is inspect session, then topic registry, then the clients
//!   map or a client's own sent-log. Nothing acquires them in reverse.
//! - Only the console task calls the inspect/delete/clear/kick/shutdown
//!   methods, which serializes inspect transitions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker::message::{Delivery, Message};
use crate::broker::topic::{ConnectionId, MessageId, TopicName, TopicRegistry, TopicSummary};
use crate::client::{Client, Registration, Role};
use crate::utils::error::{AdminError, ProtocolError};
use crate::utils::sync::{read, write};

#[derive(Debug)]
pub struct Broker {
    topics: TopicRegistry,
    clients: RwLock<HashMap<ConnectionId, Arc<Client>>>,
    next_client_id: AtomicU64,
    inspect: RwLock<Option<TopicName>>,
    shutdown: CancellationToken,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self {
            topics: TopicRegistry::new(),
            clients: RwLock::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
            inspect: RwLock::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn topics(&self) -> &TopicRegistry {
        &self.topics
    }

    /// Creates a client for a freshly accepted connection and makes it
    /// visible to kick/shutdown before its read loop starts.
    pub fn register_client(&self, sender: UnboundedSender<String>) -> Arc<Client> {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        let client = Arc::new(Client::new(id, sender, self.shutdown.child_token()));
        write(&self.clients).insert(id, client.clone());
        client
    }

    pub fn client(&self, id: ConnectionId) -> Option<Arc<Client>> {
        read(&self.clients).get(&id).cloned()
    }

    /// All connected clients ordered by id.
    pub fn clients(&self) -> Vec<Arc<Client>> {
        let mut clients: Vec<Arc<Client>> = read(&self.clients).values().cloned().collect();
        clients.sort_by_key(|c| c.id);
        clients
    }

    pub fn connection_count(&self) -> usize {
        read(&self.clients).len()
    }

    /// Removes a client from the clients map and every topic, and cancels
    /// its connection token. Runs once per client; later calls return `false`.
    pub fn cleanup_client(&self, client_id: ConnectionId) -> bool {
        let Some(client) = self.client(client_id) else {
            return false;
        };
        if !client.mark_dead() {
            return false;
        }

        write(&self.clients).remove(&client_id);
        self.topics.unregister(client_id);
        client.cancellation().cancel();

        info!(client = client_id, "cleaned up client");
        true
    }

    /// Bind `client` to `topic` as `role`. If the topic is under inspection
    /// the client is told before this returns, ahead of any other traffic.
    pub fn bind(&self, client: &Client, role: Role, topic: TopicName) -> Result<(), ProtocolError> {
        // Held across bind + notify so `begin_inspect`/`end_inspect` cannot
        // interleave with a registration on the inspected topic.
        let session = read(&self.inspect);

        client.register(role, topic.clone())?;
        self.topics.register(&topic, client.id, role);

        if session.as_deref() == Some(topic.as_str()) {
            client.set_inspecting(true);
        }

        info!(client = client.id, %role, %topic, "client registered");
        Ok(())
    }

    /// Append `body` to the author's topic and sent-log, then broadcast it.
    pub fn publish(&self, author: &Client, body: &str) -> Result<Arc<Message>, ProtocolError> {
        let (role, topic) = match author.registration() {
            Registration::Registered { role, topic } => (role, topic),
            Registration::Unregistered => {
                return Err(ProtocolError::NotRegistered(body.to_string()));
            }
        };
        if role != Role::Publisher {
            return Err(ProtocolError::SubscriberCannotSend);
        }

        let message = self
            .topics
            .append_with(&topic, author.id, body, |m| author.record_sent(m));
        debug!(client = author.id, id = message.id, %topic, "message published");

        self.broadcast_message(&message);
        Ok(message)
    }

    /// Deliver a rendered message to every live client bound to its topic.
    /// A broken recipient is torn down; the remaining deliveries still happen.
    pub fn broadcast_message(&self, message: &Message) {
        let sent = message.render(Some(Delivery::Sent));
        let received = message.render(Some(Delivery::Received));

        let mut broken = Vec::new();
        for client in self.bound_clients(&message.topic) {
            let block = if client.id == message.author {
                &sent
            } else {
                &received
            };
            if !client.send(block.as_str()) {
                warn!(client = client.id, id = message.id, "delivery failed");
                broken.push(client.id);
            }
        }

        for id in broken {
            self.cleanup_client(id);
        }
    }

    /// Send a server notice to every client bound to `topic`. Returns how many
    /// clients it reached.
    pub fn notify_topic(&self, topic: &str, notice: &str) -> usize {
        let mut reached = 0;
        let mut broken = Vec::new();
        for client in self.bound_clients(topic) {
            if client.send(notice) {
                reached += 1;
            } else {
                broken.push(client.id);
            }
        }
        for id in broken {
            self.cleanup_client(id);
        }
        reached
    }

    fn bound_clients(&self, topic: &str) -> Vec<Arc<Client>> {
        let ids = self.topics.bound(topic);
        let clients = read(&self.clients);
        ids.iter()
            .filter_map(|id| clients.get(id))
            .filter(|c| c.is_alive())
            .cloned()
            .collect()
    }

    pub fn topic_summaries(&self) -> Vec<TopicSummary> {
        self.topics.list_topics()
    }

    /// Point-in-time copy of a topic log; empty for an unknown topic.
    pub fn snapshot(&self, topic: &str) -> Vec<Arc<Message>> {
        self.topics.snapshot(topic).unwrap_or_default()
    }

    pub fn inspected_topic(&self) -> Option<TopicName> {
        read(&self.inspect).clone()
    }

    /// Start inspecting `topic` and flag every client bound to it.
    /// Returns the number of clients notified.
    pub fn begin_inspect(&self, topic: &str) -> Result<usize, AdminError> {
        let mut session = write(&self.inspect);
        if session.is_some() {
            return Err(AdminError::InspectActive("inspect"));
        }
        if !self.topics.contains(topic) {
            return Err(AdminError::TopicNotFound(topic.to_string()));
        }

        *session = Some(topic.to_string());
        let clients = self.bound_clients(topic);
        for client in &clients {
            client.set_inspecting(true);
        }

        info!(%topic, notified = clients.len(), "inspect mode started");
        Ok(clients.len())
    }

    /// Stop inspecting and unflag the clients bound to the inspected topic.
    pub fn end_inspect(&self) -> Result<(TopicName, usize), AdminError> {
        let mut session = write(&self.inspect);
        let Some(topic) = session.take() else {
            return Err(AdminError::InspectInactive("end"));
        };

        let clients = self.bound_clients(&topic);
        for client in &clients {
            client.set_inspecting(false);
        }

        info!(%topic, notified = clients.len(), "inspect mode ended");
        Ok((topic, clients.len()))
    }

    /// Delete message `id` from the inspected topic's log and from its
    /// author's sent-log. Both must hold the message or nothing is removed.
    pub fn delete_message(&self, id: MessageId) -> Result<(), AdminError> {
        let topic = self
            .inspected_topic()
            .ok_or(AdminError::InspectInactive("delete"))?;

        let removed = self.topics.remove_message_with(&topic, id, |message| {
            self.client(message.author)
                .is_some_and(|author| author.remove_sent(id))
        });
        if !removed {
            return Err(AdminError::MessageNotFound(id));
        }

        info!(%topic, id, "message deleted");
        self.notify_topic(&topic, &format!("> MESSAGE (ID {id}) DELETED BY SERVER"));
        Ok(())
    }

    /// Empty the inspected topic's log and the sent-logs of its publishers.
    /// Returns the number of messages removed from the topic log.
    pub fn clear_topic(&self) -> Result<usize, AdminError> {
        let topic = self
            .inspected_topic()
            .ok_or(AdminError::InspectInactive("clear"))?;

        let publishers: Vec<Arc<Client>> = self
            .bound_clients(&topic)
            .into_iter()
            .filter(|c| c.role() == Some(Role::Publisher))
            .collect();
        let removed = self.topics.clear_with(&topic, || {
            for publisher in &publishers {
                publisher.clear_sent();
            }
        });

        info!(%topic, removed, "topic cleared");
        self.notify_topic(&topic, "> ALL MESSAGES CLEARED BY SERVER");
        Ok(removed)
    }

    /// Forcibly disconnect a client, whatever its state.
    pub fn kick(&self, client_id: ConnectionId) -> Result<(), AdminError> {
        let client = self
            .client(client_id)
            .ok_or(AdminError::UserNotFound(client_id))?;

        client.send("> YOU HAVE BEEN KICKED BY THE SERVER");
        self.cleanup_client(client_id);
        info!(client = client_id, "client kicked");
        Ok(())
    }

    /// Tell every client the server is going away and cancel the root token.
    /// Refused while a topic is being inspected.
    pub fn shutdown(&self) -> Result<usize, AdminError> {
        if self.inspected_topic().is_some() {
            return Err(AdminError::InspectActive("quit"));
        }

        let clients = self.clients();
        for client in &clients {
            client.send("> SERVER SHUTTING DOWN");
        }
        self.shutdown.cancel();

        info!(clients = clients.len(), "broker shutting down");
        Ok(clients.len())
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }
}
