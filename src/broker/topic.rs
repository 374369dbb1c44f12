//! Topic management
//!
//! A `Topic` holds the ordered message log for a topic name and the set of
//! connections currently bound to it. Topics are created on first
//! registration and never removed; an idle topic keeps its log for listing
//! and export.
//!
//! `TopicRegistry` owns every topic behind one `RwLock` together with the
//! process-wide message id counter. Id assignment and the append happen
//! under the same write guard, so log order is id order and ids are unique
//! across topics. Readers take point-in-time snapshots (`Vec<Arc<Message>>`
//! clones) and never iterate a log outside the lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::broker::message::Message;
use crate::client::Role;
use crate::utils::sync::{read, write};

pub type ConnectionId = u64;
pub type MessageId = u64;
pub type TopicName = String;

/// Join registration tokens into a topic name: `["my", "topic"]` -> `my_topic`.
pub fn normalize_topic<S: AsRef<str>>(tokens: &[S]) -> Option<TopicName> {
    let parts: Vec<&str> = tokens
        .iter()
        .map(|t| t.as_ref())
        .filter(|t| !t.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("_"))
    }
}

#[derive(Debug, Default)]
pub struct Topic {
    pub name: TopicName,
    pub messages: Vec<Arc<Message>>,
    pub subscribers: HashMap<ConnectionId, Role>,
}

impl Topic {
    /// Create a new topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            messages: Vec::new(),
            subscribers: HashMap::new(),
        }
    }

    /// Bind a connection to the topic. Duplicate binds are ignored.
    pub fn subscribe(&mut self, id: ConnectionId, role: Role) {
        self.subscribers.entry(id).or_insert(role);
    }

    /// Remove a connection from the topic.
    pub fn unsubscribe(&mut self, id: &ConnectionId) {
        self.subscribers.remove(id);
    }

    pub fn count(&self, role: Role) -> usize {
        self.subscribers.values().filter(|r| **r == role).count()
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }
}

/// One row of `show` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub name: TopicName,
    pub publishers: usize,
    pub subscribers: usize,
    pub messages: usize,
}

/// Render `show` output for a set of topic summaries.
pub fn render_summaries(summaries: &[TopicSummary]) -> String {
    if summaries.is_empty() {
        return "> No topics available.".to_string();
    }
    let mut out = String::from("--- SHOW: EXISTING TOPICS ---\n");
    for s in summaries {
        out.push_str(&format!(
            "> Topic: {}\n> Publishers: {}\n> Subscribers: {}\n> Messages: {}\n",
            s.name, s.publishers, s.subscribers, s.messages
        ));
    }
    out.push_str("--- END OF SHOW TOPICS ---");
    out
}

#[derive(Debug)]
pub struct TopicRegistry {
    topics: RwLock<BTreeMap<TopicName, Topic>>,
    next_message_id: AtomicU64,
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(BTreeMap::new()),
            next_message_id: AtomicU64::new(1),
        }
    }

    /// Ensure the topic exists and bind `id` to it.
    pub fn register(&self, topic: &str, id: ConnectionId, role: Role) {
        let mut topics = write(&self.topics);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(id, role);
    }

    /// Unbind `id` from every topic.
    pub fn unregister(&self, id: ConnectionId) {
        let mut topics = write(&self.topics);
        for topic in topics.values_mut() {
            topic.unsubscribe(&id);
        }
    }

    pub fn contains(&self, topic: &str) -> bool {
        read(&self.topics).contains_key(topic)
    }

    pub fn append(&self, topic: &str, author: ConnectionId, body: &str) -> Arc<Message> {
        self.append_with(topic, author, body, |_| {})
    }

    /// Assign the next id, append to the topic log, and run `on_commit` with
    /// the new message while the registry guard is still held. The engine
    /// uses `on_commit` to record the author's sent-log copy so the two logs
    /// never disagree.
    pub fn append_with<F>(
        &self,
        topic: &str,
        author: ConnectionId,
        body: &str,
        on_commit: F,
    ) -> Arc<Message>
    where
        F: FnOnce(&Arc<Message>),
    {
        let mut topics = write(&self.topics);
        let entry = topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic));
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let message = Arc::new(Message::new(id, topic, author, body));
        entry.messages.push(message.clone());
        on_commit(&message);
        message
    }

    /// Point-in-time copy of a topic's log, or `None` for an unknown topic.
    pub fn snapshot(&self, topic: &str) -> Option<Vec<Arc<Message>>> {
        read(&self.topics).get(topic).map(|t| t.messages.clone())
    }

    /// Connections currently bound to `topic`.
    pub fn bound(&self, topic: &str) -> Vec<ConnectionId> {
        let topics = read(&self.topics);
        let mut ids: Vec<ConnectionId> = topics
            .get(topic)
            .map(|t| t.subscribers.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub fn remove_message(&self, topic: &str, id: MessageId) -> bool {
        self.remove_message_with(topic, id, |_| true)
    }

    /// Remove message `id` from `topic` only if `confirm` accepts it.
    ///
    /// `confirm` runs under the registry guard with the message about to be
    /// removed; returning `false` leaves the log untouched.
    pub fn remove_message_with<F>(&self, topic: &str, id: MessageId, confirm: F) -> bool
    where
        F: FnOnce(&Message) -> bool,
    {
        let mut topics = write(&self.topics);
        let Some(entry) = topics.get_mut(topic) else {
            return false;
        };
        let Some(pos) = entry.position(id) else {
            return false;
        };
        if !confirm(&entry.messages[pos]) {
            return false;
        }
        entry.messages.remove(pos);
        true
    }

    /// Empty a topic's log, running `on_clear` under the guard. Returns the
    /// number of messages removed.
    pub fn clear_with<F>(&self, topic: &str, on_clear: F) -> usize
    where
        F: FnOnce(),
    {
        let mut topics = write(&self.topics);
        let Some(entry) = topics.get_mut(topic) else {
            return 0;
        };
        let removed = entry.messages.len();
        entry.messages.clear();
        on_clear();
        removed
    }

    pub fn list_topics(&self) -> Vec<TopicSummary> {
        read(&self.topics)
            .values()
            .map(|t| TopicSummary {
                name: t.name.clone(),
                publishers: t.count(Role::Publisher),
                subscribers: t.count(Role::Subscriber),
                messages: t.messages.len(),
            })
            .collect()
    }
}
