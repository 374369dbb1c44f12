use super::backlog::{Backlog, is_list_class};
use super::command::{Command, inspect_control_line, parse_inspect_control};
use super::connection::Session;
use crate::broker::Broker;
use crate::utils::error::ProtocolError;
use std::sync::Arc;
use tokio::sync::mpsc;

fn session(broker: &Arc<Broker>) -> (Session, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let client = broker.register_client(tx);
    (Session::new(broker.clone(), client), rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    lines
}

#[test]
fn test_parse_registration_joins_topic_tokens() {
    assert_eq!(
        Command::parse("publish my topic").unwrap(),
        Command::Publish("my_topic".to_string())
    );
    assert_eq!(
        Command::parse("SUBSCRIBE news").unwrap(),
        Command::Subscribe("news".to_string())
    );
    assert_eq!(
        Command::parse("publish").unwrap_err(),
        ProtocolError::MissingTopic { command: "publish" }
    );
    assert_eq!(
        Command::parse("subscribe   ").unwrap_err(),
        ProtocolError::MissingTopic { command: "subscribe" }
    );
}

#[test]
fn test_parse_commands_and_bodies() {
    assert_eq!(Command::parse("show").unwrap(), Command::Show);
    assert_eq!(Command::parse("List").unwrap(), Command::List);
    assert_eq!(Command::parse("listall").unwrap(), Command::ListAll);
    assert_eq!(Command::parse("quit").unwrap(), Command::Quit);
    assert_eq!(
        Command::parse("send  show me  ").unwrap(),
        Command::Send("show me".to_string())
    );
    assert_eq!(Command::parse("send").unwrap_err(), ProtocolError::EmptyBody);
    assert_eq!(
        Command::parse("hello world").unwrap(),
        Command::Text("hello world".to_string())
    );
}

#[test]
fn test_restricted_commands() {
    assert!(Command::Send("x".into()).is_restricted());
    assert!(Command::Text("x".into()).is_restricted());
    assert!(Command::List.is_restricted());
    assert!(Command::ListAll.is_restricted());
    assert!(!Command::Show.is_restricted());
    assert!(!Command::Quit.is_restricted());
    assert!(!Command::Publish("t".into()).is_restricted());
}

#[test]
fn test_inspect_control_line() {
    assert_eq!(inspect_control_line(true), "IS_SERVER_INSPECTING true");
    assert_eq!(parse_inspect_control("IS_SERVER_INSPECTING true"), Some(true));
    assert_eq!(parse_inspect_control("IS_SERVER_INSPECTING false"), Some(false));
    assert_eq!(parse_inspect_control("IS_SERVER_INSPECTING maybe"), None);
    assert_eq!(parse_inspect_control("IS_SERVER_INSPECTING true now"), None);
    assert_eq!(parse_inspect_control("> SERVER IS INSPECTING"), None);
    assert_eq!(parse_inspect_control("  IS_SERVER_INSPECTING true"), None);
    assert_eq!(parse_inspect_control("IS_SERVER_INSPECTING  false"), None);
}

#[test]
fn test_backlog_replays_list_class_last() {
    let mut backlog = Backlog::new();
    for line in ["send a", "listall", "send b", "list"] {
        backlog.push(line);
    }
    assert_eq!(backlog.len(), 4);
    assert_eq!(
        backlog.drain_ordered(),
        vec!["send a", "send b", "listall", "list"]
    );
    assert!(backlog.is_empty());
}

#[test]
fn test_backlog_clear_and_list_class() {
    let mut backlog = Backlog::new();
    backlog.push("send a");
    backlog.push("listall");
    assert_eq!(backlog.clear(), 2);
    assert!(backlog.drain_ordered().is_empty());

    assert!(is_list_class("LISTALL"));
    assert!(is_list_class("list"));
    assert!(!is_list_class("send list"));
    assert!(!is_list_class(""));
}

#[test]
fn test_unregistered_session_rejects_other_commands() {
    let broker = Arc::new(Broker::new());
    let (mut session, mut rx) = session(&broker);

    assert!(!session.feed("hello"));
    assert!(!session.feed("list"));
    assert!(!session.feed("   "));
    let replies = drain(&mut rx);
    assert_eq!(replies.len(), 2);
    assert!(replies[0].starts_with("> (ERROR) Unknown command 'hello'"));
    assert!(replies[1].starts_with("> (ERROR) Unknown command 'list'"));

    assert!(!session.feed("show"));
    assert_eq!(drain(&mut rx), vec!["> No topics available."]);
    assert!(session.feed("quit"));
}

#[test]
fn test_registered_publisher_flow() {
    let broker = Arc::new(Broker::new());
    let (mut publisher, mut pub_rx) = session(&broker);
    let (mut subscriber, mut sub_rx) = session(&broker);

    publisher.feed("publish news today");
    subscriber.feed("subscribe news today");
    assert_eq!(
        drain(&mut pub_rx),
        vec!["> REGISTERED AS PUBLISHER ON TOPIC 'news_today'"]
    );
    drain(&mut sub_rx);

    publisher.feed("hello");
    publisher.feed("send listall");
    let received = drain(&mut sub_rx);
    assert_eq!(received.len(), 2);
    assert!(received[0].contains("[RECEIVED |"));
    assert!(received[1].contains("BODY: listall"));

    drain(&mut pub_rx);
    publisher.feed("list");
    let listing = drain(&mut pub_rx);
    assert!(listing[0].starts_with("--- LIST: 2 MESSAGES IN 'news_today' ---"));

    publisher.feed("subscribe other");
    assert_eq!(
        drain(&mut pub_rx),
        vec!["> (ERROR) Already registered as publisher on topic 'news_today'"]
    );
}

#[test]
fn test_subscriber_restrictions() {
    let broker = Arc::new(Broker::new());
    let (mut subscriber, mut rx) = session(&broker);
    subscriber.feed("subscribe t");
    drain(&mut rx);

    subscriber.feed("list");
    subscriber.feed("hello");
    subscriber.feed("listall");
    let replies = drain(&mut rx);
    assert_eq!(
        replies[0],
        "> (ERROR) Command 'list' is only available to publishers"
    );
    assert_eq!(replies[1], "> (ERROR) Subscribers cannot send messages");
    assert_eq!(replies[2], "> No messages available for topic 't'.");
    assert!(broker.snapshot("t").is_empty());
}

#[test]
fn test_session_defers_while_inspecting() {
    let broker = Arc::new(Broker::new());
    let (mut publisher, mut rx) = session(&broker);
    publisher.feed("publish t");
    broker.begin_inspect("t").unwrap();
    drain(&mut rx);

    publisher.feed("listall");
    publisher.feed("x");
    publisher.feed("show");
    assert_eq!(publisher.queued(), 2);
    assert!(broker.snapshot("t").is_empty());
    let replies = drain(&mut rx);
    assert!(replies[0].starts_with("> (QUEUED) 'listall'"));
    assert!(replies[1].starts_with("> (QUEUED) 'x'"));
    assert!(replies[2].starts_with("--- SHOW: EXISTING TOPICS ---"));

    broker.end_inspect().unwrap();
    drain(&mut rx);
    publisher.replay_backlog();
    assert_eq!(publisher.queued(), 0);

    let replayed = drain(&mut rx);
    assert_eq!(replayed[0], "> RUNNING 2 QUEUED COMMAND(S)");
    assert!(replayed[1].contains("[SENT |"));
    assert!(replayed[2].starts_with("--- LISTALL: 1 MESSAGES IN 't' ---"));
}

#[test]
fn test_subscriber_text_is_rejected_not_queued_while_inspecting() {
    let broker = Arc::new(Broker::new());
    let (mut subscriber, mut rx) = session(&broker);
    subscriber.feed("subscribe t");
    broker.begin_inspect("t").unwrap();
    drain(&mut rx);

    subscriber.feed("hello");
    subscriber.feed("send hello");
    subscriber.feed("list");
    subscriber.feed("listall");
    assert_eq!(subscriber.queued(), 1);

    let replies = drain(&mut rx);
    assert_eq!(replies[0], "> (ERROR) Subscribers cannot send messages");
    assert_eq!(replies[1], "> (ERROR) Subscribers cannot send messages");
    assert_eq!(
        replies[2],
        "> (ERROR) Command 'list' is only available to publishers"
    );
    assert!(replies[3].starts_with("> (QUEUED) 'listall'"));
}
