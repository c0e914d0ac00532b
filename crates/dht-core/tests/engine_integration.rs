//! End-to-end tests driving real `Engine` instances over loopback UDP,
//! exercising the client command protocol (§6.4) the way an external façade
//! would: through `engine::pipe::ClientHandle`, never by reaching into engine
//! internals.

use dht_core::engine::pipe::{self, ClientHandle};
use dht_core::{Config, Engine, Id, KeyPair, NullPersistence, Node, SeedEntry};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct TestNode {
    client: ClientHandle,
    node_id: Id,
    port: u16,
}

fn next_port() -> u16 {
    static NEXT_PORT: AtomicU16 = AtomicU16::new(19_100);
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Maintenance intervals long enough that none of them fire mid-test; tests
/// exercise command-driven lookups, not the background scheduler.
fn quiet_config(seeds: Vec<SeedEntry>) -> Config {
    Config {
        bind_port: next_port(),
        bind_port_retries: 0,
        seeds,
        neighbour_poll_interval: Duration::from_secs(3600),
        zone_poll_interval: Duration::from_secs(3600),
        verify_peers_interval: Duration::from_secs(3600),
        reap_interval: Duration::from_secs(3600),
        republish_interval: Duration::from_secs(3600),
        replicate_interval: Duration::from_secs(3600),
        transaction_timeout: Duration::from_millis(500),
        transaction_expire: Duration::from_secs(5),
        max_tick_wait: Duration::from_millis(50),
        ..Config::default()
    }
}

async fn spawn_engine(seeds: Vec<SeedEntry>) -> TestNode {
    let config = quiet_config(seeds);
    let keypair = KeyPair::generate();
    let node_id = keypair.public_id();

    let (socket, bound_port) = dht_core::bind_udp(&config).await.expect("bind udp socket");
    let (mut client, engine_handle) = pipe::pipe(8);
    let engine = Engine::new(config, keypair, bound_port, socket, engine_handle, Arc::new(NullPersistence));

    tokio::spawn(async move {
        engine.run().await.expect("engine run loop");
    });
    client.wait_ready().await;

    TestNode {
        client,
        node_id,
        port: bound_port,
    }
}

fn seed_for(node: &TestNode) -> SeedEntry {
    SeedEntry::parse(&format!(
        "127.0.0.1:{}:{}",
        node.port,
        dht_crypto::z85::encode(node.node_id.as_bytes())
    ))
    .expect("well-formed seed string")
}

#[tokio::test]
async fn node_command_reports_local_identity() {
    let node = spawn_engine(vec![]).await;

    let reply = node.client.call(vec!["NODE".to_string()]).await.expect("reply");
    let reported: Node = serde_json::from_str(&reply[0]).expect("valid node json");
    assert_eq!(reported.node_id(), node.node_id);
}

#[tokio::test]
async fn peers_command_includes_seeded_bootstrap_peer() {
    let seed_node = spawn_engine(vec![]).await;
    let other = spawn_engine(vec![seed_for(&seed_node)]).await;

    let reply = other.client.call(vec!["PEERS".to_string()]).await.expect("reply");
    let peers: Vec<Node> = serde_json::from_str(&reply[0]).expect("valid peers json");
    assert!(peers.iter().any(|p| p.node_id() == seed_node.node_id));
}

#[tokio::test]
async fn find_nodes_reaches_a_seeded_peer_over_the_wire() {
    let seed_node = spawn_engine(vec![]).await;
    let mut seeker = spawn_engine(vec![seed_for(&seed_node)]).await;

    let target = Id::for_key(b"some-lookup-target");
    let target_z85 = dht_crypto::z85::encode(target.as_bytes());
    let reply = seeker
        .client
        .call(vec!["FNOD".to_string(), target_z85])
        .await
        .expect("reply");
    let closest: Vec<Node> = serde_json::from_str(&reply[0]).expect("valid node list json");
    assert!(closest.iter().any(|n| n.node_id() == seed_node.node_id));

    seeker.client.stop().await;
}

#[tokio::test]
async fn store_then_find_value_round_trips_through_a_remote_peer() {
    let holder = spawn_engine(vec![]).await;
    let mut writer = spawn_engine(vec![seed_for(&holder)]).await;

    let store_reply = writer
        .client
        .call(vec![
            "STOR".to_string(),
            "my-key".to_string(),
            "my-value".to_string(),
            "ns".to_string(),
        ])
        .await
        .expect("store reply");
    let targets: Vec<Node> = serde_json::from_str(&store_reply[0]).expect("valid targets json");
    assert!(targets.iter().any(|n| n.node_id() == holder.node_id));

    let find_reply = writer
        .client
        .call(vec![
            "FVAL".to_string(),
            "my-key".to_string(),
            "ns".to_string(),
        ])
        .await
        .expect("find reply");
    let found: Option<String> = serde_json::from_str(&find_reply[0]).expect("valid value json");
    assert_eq!(found.as_deref(), Some("my-value"));

    writer.client.stop().await;
}

#[tokio::test]
async fn stop_command_tears_down_the_engine_cleanly() {
    let mut node = spawn_engine(vec![]).await;
    node.client.stop().await;
}

#[tokio::test]
async fn reset_command_replaces_the_local_identity() {
    let mut node = spawn_engine(vec![]).await;
    let original_id = node.node_id;

    let fresh = KeyPair::generate();
    let secret_z85 = dht_crypto::z85::encode(&fresh.secret_bytes());
    let reply = node
        .client
        .call(vec!["RESET".to_string(), "ignored".to_string(), secret_z85])
        .await
        .expect("reset reply");
    let reported: Node = serde_json::from_str(&reply[0]).expect("valid node json");

    assert_ne!(reported.node_id(), original_id);
    assert_eq!(reported.node_id(), fresh.public_id());

    node.client.stop().await;
}
