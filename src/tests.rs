//! End-to-end scenarios for the full client against a scripted fake AMI
//! peer, driven over an in-memory `tokio::io::duplex` pair (no real socket).
//! These exercise the whole stack — framer, codec, dispatcher, pending
//! table and subscription hub together — where the per-module unit tests
//! only exercise one component at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::client::{ActionIdGenerator, BackpressurePolicy, Client, ClientConfig, ClientError};

/// A deterministic `ActionIdGenerator` so scenario scripts can hard-code the
/// IDs they expect to see on the wire instead of matching on whatever a
/// fresh UUID happened to come out as.
struct SequentialIds(AtomicU64);

impl ActionIdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        format!("seq-{}", self.0.fetch_add(1, Ordering::SeqCst))
    }
}

fn sequential_config() -> ClientConfig {
    ClientConfig::new().with_action_id_generator(Box::new(SequentialIds(AtomicU64::new(0))))
}

async fn with_fake_server<S>(script: S) -> Client
where
    S: FnOnce(tokio::io::DuplexStream) + Send + 'static,
{
    let (client_side, server_side) = tokio::io::duplex(8192);
    tokio::spawn(async move { script(server_side) });
    Client::new(client_side, sequential_config())
}

async fn send(server: &mut tokio::io::DuplexStream, raw: &str) {
    server.write_all(raw.as_bytes()).await.unwrap();
}

/// S1 — simple request/reply.
#[tokio::test]
async fn s1_simple_request_reply() {
    let client = with_fake_server(|mut server| async move {
        send(&mut server, "Response: Pong\r\nActionID: seq-0\r\n\r\n").await;
    })
    .await;

    let reply = client.publish(client.action("Ping")).await.unwrap();
    assert_eq!(reply.get("Response"), Some("Pong"));
    assert_eq!(reply.action_id(), Some("seq-0"));
}

/// S2 — interleaved replies: the server answers the second request first,
/// and each publish must still complete with its own matching reply.
#[tokio::test]
async fn s2_interleaved_replies() {
    let client = with_fake_server(|mut server| async move {
        send(&mut server, "Response: ForB\r\nActionID: seq-1\r\n\r\n").await;
        send(&mut server, "Response: ForA\r\nActionID: seq-0\r\n\r\n").await;
    })
    .await;

    let a = client.action("Status");
    let b = client.action("Status");
    let (a_reply, b_reply) = tokio::join!(client.publish(a), client.publish(b));

    assert_eq!(a_reply.unwrap().get("Response"), Some("ForA"));
    assert_eq!(b_reply.unwrap().get("Response"), Some("ForB"));
}

/// S3 — an action gets exactly one reply, then follow-up events sharing its
/// ActionID are delivered to subscribers, not to the publisher.
#[tokio::test]
async fn s3_event_followup_with_same_id() {
    let client = with_fake_server(|mut server| async move {
        send(&mut server, "Response: Success\r\nActionID: seq-0\r\n\r\n").await;
        for n in 1..=3 {
            send(
                &mut server,
                &format!("Event: EndpointList\r\nActionID: seq-0\r\nObjectName: ep{n}\r\n\r\n"),
            )
            .await;
        }
        send(
            &mut server,
            "Event: EndpointListComplete\r\nActionID: seq-0\r\n\r\n",
        )
        .await;
    })
    .await;

    let mut events = client.subscribe().await;
    let reply = client.publish(client.action("PJSIPShowEndpoints")).await.unwrap();
    assert_eq!(reply.get("Response"), Some("Success"));

    for n in 1..=3 {
        let event = events.recv().await.unwrap().unwrap();
        assert_eq!(event.get("Event"), Some("EndpointList"));
        assert_eq!(event.get("ObjectName"), Some(format!("ep{n}").as_str()));
    }
    let last = events.recv().await.unwrap().unwrap();
    assert_eq!(last.get("Event"), Some("EndpointListComplete"));
}

/// S4 — unsolicited event with no ActionID reaches every subscriber and
/// disturbs no pending publish.
#[tokio::test]
async fn s4_unsolicited_event_reaches_every_subscriber() {
    let client = with_fake_server(|mut server| async move {
        send(&mut server, "Event: FullyBooted\r\n\r\n").await;
    })
    .await;

    let mut a = client.subscribe().await;
    let mut b = client.subscribe().await;

    let event_a = a.recv().await.unwrap().unwrap();
    let event_b = b.recv().await.unwrap().unwrap();
    assert_eq!(event_a.get("Event"), Some("FullyBooted"));
    assert_eq!(event_b.get("Event"), Some("FullyBooted"));
}

/// S5 — the server's non-conformant banner line is discarded, not delivered
/// as a message, and the first real message still parses correctly.
#[tokio::test]
async fn s5_banner_is_discarded_not_delivered() {
    let client = with_fake_server(|mut server| async move {
        send(&mut server, "Asterisk Call Manager/2.6.0\r\n").await;
        send(&mut server, "Response: Pong\r\nActionID: seq-0\r\n\r\n").await;
    })
    .await;

    let reply = client.publish(client.action("Ping")).await.unwrap();
    assert_eq!(reply.get("Response"), Some("Pong"));
}

/// S6 — clean EOF with an outstanding request: the publish completes with a
/// terminal cause, subscribers complete with the same cause, and any later
/// publish fails immediately with `ClientClosed`.
#[tokio::test]
async fn s6_clean_eof_with_outstanding_request() {
    let client = with_fake_server(|server| async move {
        drop(server); // close immediately without ever replying
    })
    .await;

    let mut events = client.subscribe().await;

    let publish_err = client.publish(client.action("Status")).await.unwrap_err();
    assert!(matches!(publish_err, ClientError::ClientClosed(_)));

    match events.recv().await {
        Some(Err(_cause)) => {}
        other => panic!("expected terminal completion, got {other:?}"),
    }

    let later = client.publish(client.action("Status")).await.unwrap_err();
    assert!(matches!(later, ClientError::ClientClosed(_)));
}

/// A cancelled publish removes its pending entry; a reply that arrives
/// afterwards for the same ActionID is delivered as an event instead of
/// being dropped silently (the Open Question in §9, resolved as "deliver as
/// event").
#[tokio::test]
async fn late_reply_after_cancellation_is_delivered_as_event() {
    let (client_side, mut server_side) = tokio::io::duplex(8192);
    let client = Client::new(client_side, sequential_config());
    let mut events = client.subscribe().await;

    let action = client.action("Status");
    let id = action.action_id().unwrap().to_string();

    // Dropping a `publish` future before it resolves is how a caller cancels
    // it (§5) — `timeout` drops the inner future in place once it elapses,
    // which is exactly that.
    let outcome = tokio::time::timeout(Duration::from_millis(20), client.publish(action)).await;
    assert!(outcome.is_err(), "nothing should have replied yet");

    send(&mut server_side, &format!("Response: TooLate\r\nActionID: {id}\r\n\r\n")).await;

    let event = events.recv().await.unwrap().unwrap();
    assert_eq!(event.get("Response"), Some("TooLate"));
    assert_eq!(event.action_id(), Some(id.as_str()));
}

/// A second `publish` issued with an ActionID already outstanding is a local
/// error; it does not disturb the first, still-outstanding request.
#[tokio::test]
async fn duplicate_action_id_is_local_not_terminal() {
    let (client_side, mut server_side) = tokio::io::duplex(8192);
    let client = Client::new(client_side, ClientConfig::new());

    let dup = crate::message::Message::new().with("Action", "Status").with("ActionID", "fixed");
    // Drive the first publish on its own task so it actually gets polled (and
    // registers its pending entry) instead of sitting as an unpolled future
    // while we build the second one.
    let first_client = client.clone();
    let first = tokio::spawn(async move { first_client.publish(dup).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = client
        .publish(
            crate::message::Message::new()
                .with("Action", "StatusAgain")
                .with("ActionID", "fixed"),
        )
        .await;
    assert!(matches!(second, Err(ClientError::DuplicateActionId(_))));

    send(&mut server_side, "Response: Success\r\nActionID: fixed\r\n\r\n").await;
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.get("Response"), Some("Success"));
}

/// Slow subscribers under the drop-oldest policy never stall delivery of a
/// reply to its publisher — the hub's back-pressure contract only applies to
/// the event side, never to the pending-request side.
#[tokio::test]
async fn slow_subscriber_never_blocks_a_pending_reply() {
    let (client_side, mut server_side) = tokio::io::duplex(8192);
    let config = ClientConfig::new().with_backpressure(BackpressurePolicy::DropOldest { capacity: 1 });
    let client = Client::new(client_side, config);

    // A subscriber that never calls `recv()` must not stop `publish` from
    // completing once the server answers.
    let _idle_subscriber = client.subscribe().await;

    send(&mut server_side, "Response: Pong\r\nActionID: fixed\r\n\r\n").await;
    let reply = client
        .publish(crate::message::Message::new().with("Action", "Ping").with("ActionID", "fixed"))
        .await
        .unwrap();
    assert_eq!(reply.get("Response"), Some("Pong"));
}
