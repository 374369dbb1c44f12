use super::pubsub_client::Client;
use super::registration::{Registration, Role};
use crate::utils::error::ProtocolError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn new_client(id: u64) -> (Client, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    (Client::new(id, tx, CancellationToken::new()), rx)
}

#[test]
fn test_client_new() {
    let (client, _rx) = new_client(1);
    assert_eq!(client.id, 1);
    assert!(client.is_alive());
    assert!(!client.is_inspecting());
    assert_eq!(client.registration(), Registration::Unregistered);
    assert_eq!(client.sent_count(), 0);
}

#[test]
fn registration_is_write_once() {
    let mut registration = Registration::default();
    registration
        .register(Role::Publisher, "news".to_string())
        .unwrap();

    let err = registration
        .register(Role::Subscriber, "sports".to_string())
        .unwrap_err();
    assert_eq!(
        err,
        ProtocolError::AlreadyRegistered {
            role: "publisher".to_string(),
            topic: "news".to_string(),
        }
    );
    assert_eq!(registration.role(), Some(Role::Publisher));
    assert_eq!(registration.topic(), Some("news"));
}

#[test]
fn send_fails_once_writer_is_gone() {
    let (client, rx) = new_client(2);
    assert!(client.send("hello"));
    drop(rx);
    assert!(!client.send("hello again"));
}

#[test]
fn mark_dead_only_succeeds_once() {
    let (client, _rx) = new_client(3);
    assert!(client.mark_dead());
    assert!(!client.mark_dead());
    assert!(!client.is_alive());
}

#[test]
fn set_inspecting_sends_control_line_and_flips_watch() {
    let (client, mut rx) = new_client(4);
    let watcher = client.watch_inspecting();

    client.set_inspecting(true);
    assert!(client.is_inspecting());
    assert!(*watcher.borrow());
    assert_eq!(rx.try_recv().unwrap(), "IS_SERVER_INSPECTING true");
    assert!(rx.try_recv().unwrap().starts_with("> SERVER IS INSPECTING"));

    client.set_inspecting(false);
    assert!(!client.is_inspecting());
    assert_eq!(rx.try_recv().unwrap(), "IS_SERVER_INSPECTING false");
}
