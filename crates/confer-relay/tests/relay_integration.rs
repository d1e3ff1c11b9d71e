//! Integration tests: real client sessions against a relay on an
//! ephemeral port.

use std::net::SocketAddr;
use std::time::Duration;

use confer_client::{CollabSession, SessionConfig, connect_tcp};
use confer_relay::{RelayConfig, RelayServer};
use confer_types::{ChannelEvent, OnlineUser, SessionId, UserId};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

/// Start a relay on an ephemeral port and return its address.
async fn start_relay() -> SocketAddr {
    let server = RelayServer::bind(&RelayConfig::ephemeral()).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            eprintln!("relay error: {e}");
        }
    });
    addr
}

fn ada() -> OnlineUser {
    OnlineUser::new("u1", "Ada", "Lovelace", "ada@example.com")
}

fn bob() -> OnlineUser {
    OnlineUser::new("u2", "Bob", "", "bob@example.com")
}

async fn open(addr: SocketAddr, user: OnlineUser) -> CollabSession {
    connect_tcp(
        &SessionConfig::default(),
        user,
        SessionId::from("room-1"),
        &addr.to_string(),
        None,
    )
    .await
    .expect("session opens")
}

/// Pump `session` until `pred` holds.
async fn wait_for(session: &mut CollabSession, what: &str, pred: impl Fn(&CollabSession) -> bool) {
    let pumped = tokio::time::timeout(Duration::from_secs(5), async {
        while !pred(&*session) {
            if session.next_update().await.is_none() {
                panic!("session closed while waiting for {what}");
            }
        }
    })
    .await;
    assert!(pumped.is_ok(), "timed out waiting for {what}");
}

fn online_ids(session: &CollabSession) -> Vec<String> {
    session.online_users().map(|u| u.user_id.to_string()).collect()
}

#[tokio::test]
async fn test_two_sessions_see_each_other() {
    let addr = start_relay().await;

    let mut a = open(addr, ada()).await;
    wait_for(&mut a, "own presence", |s| online_ids(s) == ["u1"]).await;

    let mut b = open(addr, bob()).await;
    wait_for(&mut b, "snapshot with both", |s| online_ids(s) == ["u1", "u2"]).await;
    wait_for(&mut a, "bob's join", |s| online_ids(s) == ["u1", "u2"]).await;

    // Typing crosses over, never echoes back
    a.composer_input("hel", 3).unwrap();
    wait_for(&mut b, "ada typing", |s| s.typing_users().len() == 1).await;
    assert_eq!(b.typing_label().as_deref(), Some("Ada Lovelace is typing…"));
    assert!(a.typing_users().is_empty());

    // Sending stops typing and the relay echoes the message to both
    assert!(a.send_message("hello @Bob").unwrap());
    wait_for(&mut b, "message", |s| s.messages().len() == 1 && s.typing_users().is_empty()).await;
    wait_for(&mut a, "own echo", |s| s.messages().len() == 1).await;

    let msg = &b.messages()[0];
    assert_eq!(msg.from_user_id, UserId::from("u1"));
    assert_eq!(msg.from_user_name, "Ada Lovelace");
    assert_eq!(msg.message, "hello @Bob");
    assert_eq!(a.messages()[0].id, msg.id);
    assert_eq!(b.resolve_mentions(&msg.message), vec![UserId::from("u2")]);

    // Leaving clears presence on the other side
    a.close().await;
    wait_for(&mut b, "ada's leave", |s| online_ids(s) == ["u2"]).await;
}

#[tokio::test]
async fn test_dropped_session_stops_typing() {
    let addr = start_relay().await;
    let mut a = open(addr, ada()).await;
    let mut b = open(addr, bob()).await;
    wait_for(&mut a, "bob", |s| s.online_users().count() == 2).await;

    a.set_typing(true).unwrap();
    wait_for(&mut b, "ada typing", |s| s.typing_users().len() == 1).await;

    drop(a);
    wait_for(&mut b, "typing cleared and ada gone", |s| {
        s.typing_users().is_empty() && s.online_users().count() == 1
    })
    .await;
}

#[tokio::test]
async fn test_raw_socket_skips_garbage() {
    let addr = start_relay().await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut framed = Framed::new(stream, LinesCodec::new());

    framed.send("this is not json".to_string()).await.unwrap();
    framed
        .send(r#"{"type":"message:send","text":"before join"}"#.to_string())
        .await
        .unwrap();
    framed
        .send(
            r#"{"type":"session:join","sessionId":"room-9","user":{"userId":"u9","firstName":"Raw","lastName":"","email":""}}"#
                .to_string(),
        )
        .await
        .unwrap();

    let line = tokio::time::timeout(Duration::from_secs(5), framed.next())
        .await
        .expect("relay replies")
        .expect("stream open")
        .expect("valid line");
    let event: ChannelEvent = serde_json::from_str(&line).unwrap();
    let ChannelEvent::PresenceSnapshot { users } = event else {
        panic!("expected snapshot, got {line}");
    };
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].display_name(), "Raw");
}

#[tokio::test]
async fn test_raw_socket_survives_oversized_line() {
    let addr = start_relay().await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut framed = Framed::new(stream, LinesCodec::new());

    framed.send("y".repeat(70 * 1024)).await.unwrap();
    framed
        .send(
            r#"{"type":"session:join","sessionId":"room-9","user":{"userId":"u9","firstName":"Raw","lastName":"","email":""}}"#
                .to_string(),
        )
        .await
        .unwrap();

    let line = tokio::time::timeout(Duration::from_secs(5), framed.next())
        .await
        .expect("relay replies")
        .expect("stream open")
        .expect("valid line");
    let event: ChannelEvent = serde_json::from_str(&line).unwrap();
    assert!(matches!(event, ChannelEvent::PresenceSnapshot { .. }), "got {line}");
}

#[tokio::test]
async fn test_message_near_frame_limit_keeps_sessions_connected() {
    let addr = start_relay().await;
    let mut a = open(addr, ada()).await;
    let mut b = open(addr, bob()).await;
    wait_for(&mut a, "bob", |s| s.online_users().count() == 2).await;
    wait_for(&mut b, "ada", |s| s.online_users().count() == 2).await;

    // The send frame fits the relay's limit; the stamped message:new would not
    assert!(a.send_message(&"x".repeat(64 * 1024 - 100)).unwrap());
    assert!(a.send_message("after").unwrap());

    wait_for(&mut b, "the follow-up message", |s| !s.messages().is_empty()).await;
    assert_eq!(b.messages().len(), 1);
    assert_eq!(b.messages()[0].message, "after");
    assert!(b.connection_status().is_connected());
    assert_eq!(b.online_users().count(), 2);
}
