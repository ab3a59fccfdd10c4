//! Integration tests for connecting and the name registration handshake.
//!
//! A test plays the server over a loopback connection: it queues the
//! handshake script, lets the session run, then checks what the client sent
//! and what it showed.

mod common;

use std::sync::Arc;

use chatline::session::{SessionError, SessionSettings, SessionState};
use chatline::transport::Connection;
use chatline_proto::message::{Message, MessageKind};

use common::{drain_sent, loopback_session, script, strings, wait_until};

#[tokio::test]
async fn rejected_name_is_retried_until_accepted() {
    let (session, server, sink) =
        loopback_session(&["alice", "alicia"], SessionSettings::default());
    script(
        &server,
        &[
            Message::request_name(),
            Message::name_used(),
            Message::name_accepted(["alicia", "bob"]),
        ],
    )
    .await;

    session.connect(4000).await.unwrap();

    assert_eq!(session.state(), SessionState::Registered);
    assert_eq!(session.roster(), strings(&["alicia", "bob"]));
    assert_eq!(sink.last_roster(), Some(strings(&["alicia", "bob"])));

    let sent = drain_sent(&server);
    assert_eq!(
        sent,
        vec![Message::user_name("alice"), Message::user_name("alicia")]
    );

    assert_eq!(sink.errors(), vec!["This name is already in use. Try another"]);
    let lines = sink.lines();
    assert_eq!(lines, vec!["You connected to the server", "Name accepted"]);
}

#[tokio::test]
async fn accepted_without_list_gives_empty_roster() {
    let (session, server, sink) = loopback_session(&["solo"], SessionSettings::default());
    script(
        &server,
        &[
            Message::request_name(),
            Message::bare(MessageKind::NameAccepted),
        ],
    )
    .await;

    session.connect(4000).await.unwrap();
    assert_eq!(session.state(), SessionState::Registered);
    assert!(session.roster().is_empty());
    assert_eq!(sink.last_roster(), Some(vec![]));
}

#[tokio::test]
async fn unexpected_kinds_during_handshake_are_ignored() {
    let (session, server, _sink) = loopback_session(&["me"], SessionSettings::default());
    script(
        &server,
        &[
            Message::text("too early"),
            Message::user_added("ghost"),
            Message::request_name(),
            Message::name_accepted(["me"]),
        ],
    )
    .await;

    session.connect(4000).await.unwrap();
    assert_eq!(session.roster(), strings(&["me"]));
}

#[tokio::test]
async fn cancelled_name_entry_disconnects() {
    let (session, server, sink) = loopback_session(&[], SessionSettings::default());
    script(&server, &[Message::request_name()]).await;

    let result = session.connect(4000).await;
    assert!(matches!(result, Err(SessionError::NameEntryCancelled)));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(drain_sent(&server).is_empty());
    assert_eq!(sink.errors().len(), 1);
}

#[tokio::test]
async fn name_attempt_limit_ends_handshake() {
    let settings = SessionSettings {
        max_name_attempts: Some(1),
        ..SessionSettings::default()
    };
    let (session, server, _sink) = loopback_session(&["taken", "unused"], settings);
    script(&server, &[Message::request_name(), Message::name_used()]).await;

    let result = session.connect(4000).await;
    assert!(matches!(
        result,
        Err(SessionError::NameAttemptsExhausted { attempts: 1 })
    ));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(drain_sent(&server), vec![Message::user_name("taken")]);
}

#[tokio::test]
async fn malformed_line_during_handshake_is_fatal() {
    let (session, server, sink) = loopback_session(&["me"], SessionSettings::default());
    server.send_line("this is not json").await.unwrap();

    let result = session.connect(4000).await;
    let err = result.unwrap_err();
    assert!(matches!(err, SessionError::Codec(_)));
    assert!(err.is_fatal());
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(sink.last_roster(), Some(vec![]));
}

#[tokio::test]
async fn server_hangup_during_handshake_is_fatal() {
    let (session, server, _sink) = loopback_session(&["me"], SessionSettings::default());
    drop(server);

    let result = session.connect(4000).await;
    assert!(matches!(result, Err(SessionError::Receive(_))));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn unreachable_server_then_retry() {
    let (session, server, sink) = loopback_session(&["me"], SessionSettings::default());
    // Use up the prepared endpoint with a failed handshake first.
    drop(server);
    let _ = session.connect(4000).await;

    let result = session.connect(4001).await;
    assert!(matches!(
        result,
        Err(SessionError::ConnectionFailed { port: 4001, .. })
    ));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(
        sink.errors()
            .iter()
            .any(|e| e.contains("could not connect to port 4001"))
    );
}

#[tokio::test]
async fn reconnect_after_failure_uses_fresh_connection() {
    let (session, server, _sink) = loopback_session(&["me", "me"], SessionSettings::default());
    server.send_line("garbage").await.unwrap();
    assert!(session.connect(4000).await.is_err());

    let second = session.connector().prepare(64);
    script(
        &second,
        &[Message::request_name(), Message::name_accepted(["me"])],
    )
    .await;
    session.connect(4000).await.unwrap();
    assert_eq!(session.state(), SessionState::Registered);
}

#[tokio::test]
async fn prompted_connect_without_port_fails() {
    let (session, _server, sink) = loopback_session(&["me"], SessionSettings::default());

    let result = session.run_prompted().await;
    assert!(matches!(result, Err(SessionError::NoPort)));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(sink.errors().len(), 1);
}

#[tokio::test]
async fn prompted_connect_uses_entered_port() {
    let (session, server, sink) = loopback_session(&["me"], SessionSettings::default());
    sink.push_port(4000);
    script(
        &server,
        &[Message::request_name(), Message::name_accepted(["me"])],
    )
    .await;

    let runner = Arc::clone(&session);
    let handle = tokio::spawn(async move { runner.run_prompted().await });
    wait_until(|| session.state() == SessionState::Registered).await;

    session.disable_client().await.unwrap();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn disconnect_during_handshake_interrupts_connect() {
    let (session, server, sink) = loopback_session(&["me"], SessionSettings::default());

    let connecting = Arc::clone(&session);
    let handle = tokio::spawn(async move { connecting.connect(4000).await });
    wait_until(|| session.state() == SessionState::AwaitingNameRequest).await;

    session.disable_client().await.unwrap();
    let result = handle.await.unwrap();
    assert!(matches!(result, Err(SessionError::Interrupted)));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(drain_sent(&server), vec![Message::disable_user()]);
    assert!(sink.errors().is_empty());
}
