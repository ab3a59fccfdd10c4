//! Integration tests for a registered session: incoming text, roster
//! updates, outbound sends and disconnect.

mod common;

use std::sync::Arc;

use chatline::session::{SessionError, SessionState};
use chatline::transport::Connection;
use chatline_proto::message::{Message, MessageKind};

use common::{
    drain_sent, recv_message, registered_session, script, strings, wait_until,
};

#[tokio::test]
async fn long_text_is_reflowed_short_text_is_not() {
    let (session, server, sink) = registered_session(&["me"]).await;
    let long = "a".repeat(130);
    script(
        &server,
        &[Message::text(long), Message::text("bob: hi")],
    )
    .await;
    drop(server);

    let _ = session.receive_loop().await;

    let lines = sink.lines();
    let expected = format!("{}-\n{}", "a".repeat(65), "a".repeat(65));
    assert!(lines.contains(&expected), "lines: {lines:?}");
    assert!(lines.contains(&"bob: hi".to_string()));
    let long_pos = lines.iter().position(|l| *l == expected).unwrap();
    let short_pos = lines.iter().position(|l| l == "bob: hi").unwrap();
    assert!(long_pos < short_pos, "display order must follow arrival order");
}

#[tokio::test]
async fn text_at_exact_width_is_untouched() {
    let (session, server, sink) = registered_session(&["me"]).await;
    let exact = "b".repeat(65);
    script(&server, &[Message::text(exact.clone())]).await;
    drop(server);

    let _ = session.receive_loop().await;
    assert!(sink.lines().contains(&exact));
}

#[tokio::test]
async fn join_then_leave_restores_roster() {
    let (session, server, sink) = registered_session(&["alice", "me"]).await;
    script(
        &server,
        &[Message::user_added("carol"), Message::removed_user("carol")],
    )
    .await;

    let looping = Arc::clone(&session);
    let handle = tokio::spawn(async move { looping.receive_loop().await });
    wait_until(|| sink.lines().iter().any(|l| l == "carol left the chat")).await;

    assert_eq!(session.roster(), strings(&["alice", "me"]));
    let rosters = sink.rosters();
    assert!(rosters.contains(&strings(&["alice", "carol", "me"])));
    assert_eq!(sink.last_roster(), Some(strings(&["alice", "me"])));
    assert!(sink.lines().iter().any(|l| l == "carol joined the chat"));

    session.disable_client().await.unwrap();
    assert!(handle.await.unwrap().is_ok());
    drop(server);
}

#[tokio::test]
async fn removing_unknown_user_is_harmless() {
    let (session, server, sink) = registered_session(&["me"]).await;
    script(&server, &[Message::removed_user("nobody")]).await;

    let looping = Arc::clone(&session);
    let handle = tokio::spawn(async move { looping.receive_loop().await });
    wait_until(|| sink.lines().iter().any(|l| l == "nobody left the chat")).await;

    assert_eq!(session.roster(), strings(&["me"]));
    assert_eq!(session.state(), SessionState::Registered);

    session.disable_client().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn other_kinds_are_ignored_in_steady_state() {
    let (session, server, sink) = registered_session(&["me"]).await;
    script(
        &server,
        &[
            Message::request_name(),
            Message::name_used(),
            Message::name_accepted(["intruder"]),
            Message::disable_user(),
            Message::text("still here"),
        ],
    )
    .await;

    let looping = Arc::clone(&session);
    let handle = tokio::spawn(async move { looping.receive_loop().await });
    wait_until(|| sink.lines().iter().any(|l| l == "still here")).await;

    assert_eq!(session.state(), SessionState::Registered);
    assert_eq!(session.roster(), strings(&["me"]));
    assert!(drain_sent(&server).is_empty());

    session.disable_client().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn transport_failure_empties_roster_and_disconnects() {
    let (session, server, sink) = registered_session(&["alice", "me"]).await;
    drop(server);

    let result = session.receive_loop().await;
    let err = result.unwrap_err();
    assert!(matches!(err, SessionError::Receive(_)));
    assert!(err.is_fatal());
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(session.roster().is_empty());
    assert_eq!(sink.last_roster(), Some(vec![]));
    assert_eq!(sink.errors().len(), 1);
}

#[tokio::test]
async fn malformed_line_in_steady_state_disconnects() {
    let (session, server, _sink) = registered_session(&["me"]).await;
    server.send_line("{\"typeMessage\":\"SHOUT\"}").await.unwrap();

    let result = session.receive_loop().await;
    assert!(matches!(result, Err(SessionError::Codec(_))));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn send_while_disconnected_is_rejected_without_dialling() {
    let (session, _server, sink) = common::loopback_session(&["me"], Default::default());

    let result = session.send("hello?").await;
    assert!(matches!(result, Err(SessionError::NotConnected)));
    assert_eq!(session.connector().attempts(), 0);
    assert_eq!(sink.errors(), vec!["not connected to a server"]);
}

#[tokio::test]
async fn send_before_registration_is_rejected() {
    let (session, server, sink) = common::loopback_session(&["me"], Default::default());

    let connecting = Arc::clone(&session);
    let handle = tokio::spawn(async move { connecting.connect(4000).await });
    wait_until(|| session.state() == SessionState::AwaitingNameRequest).await;

    let result = session.send("too soon").await;
    assert!(matches!(result, Err(SessionError::NotRegistered)));
    assert!(drain_sent(&server).is_empty());
    assert!(sink.errors().iter().any(|e| e.contains("registration")));

    session.disable_client().await.unwrap();
    let _ = handle.await.unwrap();
}

#[tokio::test]
async fn sends_reach_server_in_order() {
    let (session, server, _sink) = registered_session(&["me"]).await;

    for text in ["one", "two", "three"] {
        session.send(text).await.unwrap();
    }
    for text in ["one", "two", "three"] {
        assert_eq!(recv_message(&server).await, Message::text(text));
    }
}

#[tokio::test]
async fn send_failure_keeps_connection_state() {
    let (session, server, sink) = registered_session(&["me"]).await;
    drop(server);

    let result = session.send("lost").await;
    let err = result.unwrap_err();
    assert!(matches!(err, SessionError::SendFailed(_)));
    assert!(!err.is_fatal());
    assert_eq!(session.state(), SessionState::Registered);
    assert_eq!(session.roster(), strings(&["me"]));
    assert!(sink.errors()[0].starts_with("error sending message"));
}

#[tokio::test]
async fn disable_notifies_server_and_clears_roster() {
    let (session, server, sink) = registered_session(&["alice", "me"]).await;

    let looping = Arc::clone(&session);
    let handle = tokio::spawn(async move { looping.receive_loop().await });
    tokio::task::yield_now().await;

    session.disable_client().await.unwrap();
    assert_eq!(recv_message(&server).await.kind, MessageKind::DisableUser);
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(session.roster().is_empty());
    assert_eq!(sink.last_roster(), Some(vec![]));
    assert!(
        sink.lines()
            .iter()
            .any(|l| l == "You disconnected from the server")
    );

    // A local disconnect is a clean end for the loop and is not reported.
    assert!(handle.await.unwrap().is_ok());
    assert!(sink.errors().is_empty());
}

#[tokio::test]
async fn second_disable_is_a_noop() {
    let (session, server, sink) = registered_session(&["me"]).await;

    session.disable_client().await.unwrap();
    assert_eq!(drain_sent(&server), vec![Message::disable_user()]);

    let result = session.disable_client().await;
    assert!(matches!(result, Err(SessionError::AlreadyDisconnected)));
    assert!(drain_sent(&server).is_empty());
    assert_eq!(sink.errors(), vec!["you are already disconnected"]);
}

#[tokio::test]
async fn disable_with_dead_transport_still_disconnects() {
    let (session, server, sink) = registered_session(&["me"]).await;
    drop(server);

    let result = session.disable_client().await;
    assert!(matches!(result, Err(SessionError::DisconnectNotice(_))));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(session.roster().is_empty());
    assert_eq!(sink.errors().len(), 1);
}

#[tokio::test]
async fn reconnect_after_disable_starts_fresh() {
    let (session, server, sink) = registered_session(&["me", "old"]).await;
    session.disable_client().await.unwrap();
    drop(server);

    let second = session.connector().prepare(64);
    sink.push_name("me-again");
    script(
        &second,
        &[Message::request_name(), Message::name_accepted(["me-again", "new"])],
    )
    .await;

    session.connect(4000).await.unwrap();
    assert_eq!(session.state(), SessionState::Registered);
    assert_eq!(session.roster(), strings(&["me-again", "new"]));
    assert_eq!(recv_message(&second).await, Message::user_name("me-again"));
}
