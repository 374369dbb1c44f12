use super::console::{AdminCommand, AdminConsole};
use super::export::{ExportTarget, export_messages, parse_message_ids, read_message_ids};
use crate::broker::Broker;
use crate::client::{Client, Role};
use crate::utils::error::AdminError;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn connect(broker: &Broker) -> (Arc<Client>, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    (broker.register_client(tx), rx)
}

fn console_with_publisher(
    dir: &TempDir,
) -> (AdminConsole, Arc<Broker>, Arc<Client>, mpsc::UnboundedReceiver<String>) {
    let broker = Arc::new(Broker::new());
    let (publisher, rx) = connect(&broker);
    broker
        .bind(&publisher, Role::Publisher, "topic1".to_string())
        .unwrap();
    (
        AdminConsole::new(broker.clone(), dir.path()),
        broker,
        publisher,
        rx,
    )
}

#[test]
fn test_parse_admin_commands() {
    assert_eq!(AdminCommand::parse("").unwrap(), None);
    assert_eq!(
        AdminCommand::parse("INSPECT my topic").unwrap(),
        Some(AdminCommand::Inspect("my_topic".to_string()))
    );
    assert_eq!(
        AdminCommand::parse("delete 12").unwrap(),
        Some(AdminCommand::Delete(12))
    );
    assert_eq!(
        AdminCommand::parse("export topic a b").unwrap(),
        Some(AdminCommand::ExportTopic("a_b".to_string()))
    );
    assert_eq!(
        AdminCommand::parse("export user 3").unwrap(),
        Some(AdminCommand::ExportUser(3))
    );
    assert_eq!(AdminCommand::parse("users").unwrap(), Some(AdminCommand::Users));
}

#[test]
fn test_parse_rejects_bad_arguments() {
    assert!(matches!(
        AdminCommand::parse("kick -1"),
        Err(AdminError::Usage("kick <userID>"))
    ));
    assert!(matches!(
        AdminCommand::parse("delete"),
        Err(AdminError::Usage(_))
    ));
    assert!(matches!(
        AdminCommand::parse("user 1a"),
        Err(AdminError::Usage("user <userID>"))
    ));
    assert!(matches!(
        AdminCommand::parse("export file 1"),
        Err(AdminError::Usage(_))
    ));
    assert!(matches!(
        AdminCommand::parse("inspect"),
        Err(AdminError::Usage("inspect <topic>"))
    ));
    assert!(matches!(
        AdminCommand::parse("reboot"),
        Err(AdminError::UnknownCommand(cmd)) if cmd == "reboot"
    ));
}

#[test]
fn test_inspect_listall_delete_end() {
    let dir = TempDir::new().unwrap();
    let (mut console, broker, publisher, _rx) = console_with_publisher(&dir);
    let first = broker.publish(&publisher, "one").unwrap();
    broker.publish(&publisher, "two").unwrap();

    assert!(matches!(
        console.execute("listall"),
        Err(AdminError::InspectInactive("listall"))
    ));

    let reply = console.execute("inspect topic1").unwrap();
    assert!(reply.text.starts_with("--- INSPECT MODE STARTED ---"));

    let listing = console.execute("listall").unwrap();
    assert!(listing.text.starts_with("--- LISTALL: 2 MESSAGES IN 'topic1' ---"));

    let deleted = console.execute(&format!("delete {}", first.id)).unwrap();
    assert_eq!(
        deleted.text,
        format!("> (SUCCESS) Message with ID {} deleted.", first.id)
    );
    assert_eq!(broker.snapshot("topic1").len(), 1);

    assert!(matches!(
        console.execute("quit"),
        Err(AdminError::InspectActive("quit"))
    ));
    assert!(console.execute("end").unwrap().text.contains("INSPECT MODE ENDED"));
}

#[test]
fn test_clear_requires_confirmation() {
    let dir = TempDir::new().unwrap();
    let (mut console, broker, publisher, _rx) = console_with_publisher(&dir);
    broker.publish(&publisher, "one").unwrap();
    console.execute("inspect topic1").unwrap();

    let prompt = console.execute("clear").unwrap();
    assert!(prompt.text.ends_with("(y/n)"));
    assert!(console.awaiting_confirmation());
    assert_eq!(
        console.execute("no").unwrap().text,
        "> Clear operation cancelled."
    );
    assert_eq!(broker.snapshot("topic1").len(), 1);

    console.execute("clear").unwrap();
    console.execute("Y").unwrap();
    assert!(!console.awaiting_confirmation());
    assert!(broker.snapshot("topic1").is_empty());
    assert_eq!(publisher.sent_count(), 0);

    assert!(matches!(
        console.execute("clear"),
        Err(AdminError::NoMessages(_))
    ));
}

#[test]
fn test_users_and_kick() {
    let dir = TempDir::new().unwrap();
    let (mut console, broker, publisher, _rx) = console_with_publisher(&dir);
    let (_idle, _idle_rx) = connect(&broker);

    let users = console.execute("users").unwrap().text;
    assert!(users.contains(&format!("> User ID: {} | Topic: topic1 | Role: publisher", publisher.id)));
    assert!(users.contains("Topic: none | Role: unregistered"));

    let detail = console.execute(&format!("user {}", publisher.id)).unwrap().text;
    assert!(detail.contains("> Messages sent: 0 | Inspecting: no"));

    console.execute(&format!("kick {}", publisher.id)).unwrap();
    assert!(broker.client(publisher.id).is_none());
    assert_eq!(broker.topic_summaries()[0].publishers, 0);
    assert!(matches!(
        console.execute(&format!("user {}", publisher.id)),
        Err(AdminError::UserNotFound(_))
    ));
}

#[test]
fn test_help_depends_on_mode() {
    let dir = TempDir::new().unwrap();
    let (mut console, _broker, _publisher, _rx) = console_with_publisher(&dir);
    let normal = console.execute("help").unwrap().text;
    assert!(normal.contains("> inspect <topic>"));
    assert!(!normal.contains("> delete <messageID>"));

    console.execute("inspect topic1").unwrap();
    let inspecting = console.execute("help").unwrap().text;
    assert!(inspecting.contains("> delete <messageID>"));
    assert!(!inspecting.contains("> quit"));
}

#[test]
fn test_quit_shuts_down_broker() {
    let dir = TempDir::new().unwrap();
    let (mut console, broker, _publisher, mut rx) = console_with_publisher(&dir);
    let reply = console.execute("quit").unwrap();
    assert!(reply.shutdown);
    assert!(!broker.is_running());
    assert_eq!(rx.try_recv().unwrap(), "> SERVER SHUTTING DOWN");
}

#[test]
fn test_export_topic_round_trip_matches_snapshot() {
    let dir = TempDir::new().unwrap();
    let (mut console, broker, publisher, _rx) = console_with_publisher(&dir);
    let long = "long ".repeat(40);
    for body in ["a", "b", long.as_str()] {
        broker.publish(&publisher, body).unwrap();
    }

    let snapshot: Vec<u64> = broker.snapshot("topic1").iter().map(|m| m.id).collect();
    let reply = console.execute("export topic topic1").unwrap();
    assert!(reply.text.starts_with("> Messages in topic 'topic1' exported to"));

    let export_dir = dir.path().join("topic_exports");
    let entries: Vec<_> = std::fs::read_dir(&export_dir).unwrap().collect();
    assert_eq!(entries.len(), 1);
    let path = entries[0].as_ref().unwrap().path();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("export_"));
    assert!(name.ends_with("_topic_topic1.txt"));

    assert_eq!(read_message_ids(&path).unwrap(), snapshot);
}

#[test]
fn test_export_user_and_empty_selection() {
    let dir = TempDir::new().unwrap();
    let (mut console, broker, publisher, _rx) = console_with_publisher(&dir);

    assert!(matches!(
        console.execute(&format!("export user {}", publisher.id)),
        Err(AdminError::NoMessages(_))
    ));
    assert!(!dir.path().join("user_exports").exists());
    assert!(matches!(
        console.execute("export topic ghost"),
        Err(AdminError::TopicNotFound(_))
    ));

    let message = broker.publish(&publisher, "mine").unwrap();
    let path = export_messages(
        dir.path(),
        &ExportTarget::User(publisher.id),
        &publisher.sent_messages(),
    )
    .unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with(&format!(
        "--- EXPORTED MESSAGES FOR USER ID {} ---",
        publisher.id
    )));
    assert_eq!(parse_message_ids(&contents), vec![message.id]);
}

#[test]
fn test_parse_message_ids_accepts_tagged_blocks() {
    let broker = Broker::new();
    let message = broker.topics().append("t", 1, "hi");
    let tagged = message.render(Some(crate::broker::Delivery::Received));
    let text = format!("header\n\n{tagged}\n{message}\n");
    assert_eq!(parse_message_ids(&text), vec![message.id, message.id]);
    assert!(parse_message_ids("no blocks here").is_empty());
}

#[test]
fn test_export_keeps_ids_after_separator_shaped_body() {
    let dir = TempDir::new().unwrap();
    let (mut console, broker, publisher, _rx) = console_with_publisher(&dir);
    let dashes = "-".repeat(160);
    let forged = format!("{}[ID 999 | TOPIC 'topic1']", "x".repeat(80));
    for body in [dashes.as_str(), "second", forged.as_str(), "third"] {
        broker.publish(&publisher, body).unwrap();
    }
    let expected: Vec<u64> = broker.snapshot("topic1").iter().map(|m| m.id).collect();
    assert_eq!(expected.len(), 4);

    console.execute("export topic topic1").unwrap();
    let path = std::fs::read_dir(dir.path().join("topic_exports"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    assert_eq!(read_message_ids(&path).unwrap(), expected);
}
