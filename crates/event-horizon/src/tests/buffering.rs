//! Offline buffering and delivery.
//!
//! - Events submitted while disconnected are flushed as one batch on connect
//! - The buffer keeps only the newest `buffer_capacity` events
//! - Events submitted while connected bypass the buffer
//! - Send failures drop events instead of re-buffering them

use super::harness::{decode, test_config, Fixture, OpenBehavior};
use crate::{
    ConnectionState, EventRecord, HorizonClient, HorizonConfig, Properties, PropertyValue,
};
use chrono::{TimeZone, Utc};

fn submit_all(fixture: &Fixture, names: &[&str]) {
    submit_all_to(&fixture.client, names);
}

fn submit_all_to(client: &HorizonClient, names: &[&str]) {
    for name in names {
        client.on_event(*name, Properties::new());
    }
}

#[tokio::test]
async fn buffered_events_flush_as_one_batch() {
    let fixture = Fixture::start(test_config(), OpenBehavior::Manual);

    let names: Vec<String> = (0..10).map(|i| format!("event-{}", i)).collect();
    for name in &names {
        fixture.client.on_event(name.clone(), Properties::new());
    }
    assert_eq!(fixture.status().await.buffered, 10);

    let connection = fixture.connect().await;

    assert_eq!(connection.log.batches(), vec![names]);
    assert_eq!(fixture.status().await.buffered, 0);
}

#[tokio::test]
async fn drop_oldest_then_direct_send() {
    let config = HorizonConfig {
        buffer_capacity: 3,
        ..test_config()
    };
    let fixture = Fixture::start(config, OpenBehavior::Manual);

    submit_all(&fixture, &["A", "B", "C", "D", "E"]);
    assert_eq!(fixture.status().await.buffered, 3);

    let connection = fixture.connect().await;
    submit_all(&fixture, &["F"]);
    fixture.status().await;

    assert_eq!(
        connection.log.batches(),
        vec![vec!["C", "D", "E"], vec!["F"]]
    );
}

#[tokio::test]
async fn burst_beyond_capacity_keeps_newest_events() {
    let fixture = Fixture::start(test_config(), OpenBehavior::Manual);

    // No yield between submissions, so the supervisor sees the whole burst at once
    for i in 0..2_037 {
        fixture.client.on_event(format!("event-{}", i), Properties::new());
    }
    assert_eq!(fixture.status().await.buffered, 2_000);

    let connection = fixture.connect().await;
    let batches = connection.log.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2_000);
    assert_eq!(batches[0].first().map(String::as_str), Some("event-37"));
    assert_eq!(batches[0].last().map(String::as_str), Some("event-2036"));
}

#[tokio::test]
async fn connected_events_are_sent_individually() {
    let fixture = Fixture::start(test_config(), OpenBehavior::Manual);
    let connection = fixture.connect().await;

    submit_all(&fixture, &["first", "second"]);
    let status = fixture.status().await;

    assert_eq!(status.buffered, 0);
    assert_eq!(
        connection.log.batches(),
        vec![vec!["first"], vec!["second"]]
    );
}

#[tokio::test]
async fn payload_carries_reserved_fields() {
    let fixture = Fixture::start(test_config(), OpenBehavior::Manual);
    let connection = fixture.connect().await;

    let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
    let mut properties = Properties::new();
    properties.insert("speed".to_string(), PropertyValue::from(1.5f64));
    properties.insert("event".to_string(), PropertyValue::from("spoofed"));
    fixture.client.on_event_at("episode_played", at, properties);
    fixture.status().await;

    let sent = connection.log.sent();
    let event = &decode(&sent[0])[0];
    assert_eq!(event["event"], "episode_played");
    assert_eq!(event["timestamp"], 1_700_000_000_123i64);
    assert_eq!(event["anonymous_id"], "anon-test");
    assert_eq!(event["user_type"], "anon");
    assert_eq!(event["platform"], "test");
    assert_eq!(event["speed"], 1.5);
}

#[tokio::test]
async fn failed_flush_is_dropped_not_rebuffered() {
    let fixture = Fixture::start(test_config(), OpenBehavior::Manual);
    submit_all(&fixture, &["A", "B"]);

    fixture.sign_in().await;
    fixture.wait_for_opens(1).await;
    let connection = fixture.transport.last();
    connection.log.reject_sends(true);
    connection.listener.opened().await;
    let status = fixture
        .wait_until(|s| s.state == ConnectionState::Connected)
        .await;

    assert_eq!(status.buffered, 0);
    assert!(connection.log.sent().is_empty());

    submit_all(&fixture, &["C"]);
    assert_eq!(fixture.status().await.buffered, 0);

    connection.log.reject_sends(false);
    submit_all(&fixture, &["D"]);
    fixture.status().await;
    assert_eq!(connection.log.batches(), vec![vec!["D"]]);
}

#[tokio::test]
async fn events_do_not_compete_with_commands_for_queue_space() {
    let config = HorizonConfig {
        command_queue_capacity: 2,
        ..test_config()
    };
    let fixture = Fixture::start(config, OpenBehavior::Manual);

    for i in 0..100 {
        fixture.client.on_event(format!("event-{}", i), Properties::new());
    }

    assert_eq!(fixture.status().await.buffered, 100);
}

#[tokio::test]
async fn events_before_shutdown_are_flushed() {
    let fixture = Fixture::start(test_config(), OpenBehavior::Manual);
    let connection = fixture.connect().await;
    let Fixture { client, .. } = fixture;

    submit_all_to(&client, &["last"]);
    client.shutdown().await;

    assert_eq!(connection.log.batches(), vec![vec!["last"]]);
}

#[tokio::test]
async fn shutdown_closes_connection_and_stops() {
    let fixture = Fixture::start(test_config(), OpenBehavior::Manual);
    let connection = fixture.connect().await;
    let supervisor = fixture.supervisor().clone();
    let Fixture { client, .. } = fixture;

    client.shutdown().await;

    let closes = connection.log.closes();
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].code, 1000);
    assert_eq!(closes[0].reason, "client shutdown");
    assert!(supervisor.status().await.is_err());

    // Submitting after shutdown is silently dropped
    supervisor.submit(EventRecord::new(
        "late",
        Utc::now(),
        Properties::new(),
        "test",
    ));
}
