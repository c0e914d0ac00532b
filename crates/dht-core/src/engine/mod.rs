//! Engine event loop (spec §4.7): the single cooperative multiplexer that
//! owns every mutable piece of DHT state and drives the client pipe, the UDP
//! socket and the maintenance timer each tick.
//!
//! Grounded in the `tokio::select!`-based server loops of
//! `lib-network::mesh::server` and `zhtp::runtime::mod`: one task, one
//! `select!`, handlers that run to completion before the next iteration.
//! The one departure from that shape is [`Engine::await_transaction`], used
//! only while servicing a client command that must itself wait on wire
//! traffic (FNOD/FVAL/STOR/REMV) — see DESIGN.md for why a nested wait loop
//! was chosen over making those commands asynchronous from the client's
//! point of view.

pub mod command;
pub mod pipe;
pub mod verify;

use crate::config::Config;
use crate::error::EngineError;
use crate::messaging::{self, DiscoveryEvent, DiscoveryRegistry, HashtableEvent, HashtableRegistry, ValueTable};
use crate::node::{Endpoint, Node};
use crate::persistence::{self, PersistenceBackend, HASHTABLE_KEY, NODETREE_KEY};
use crate::routing::RoutingTree;
use crate::transaction::{
    FindNodesTransaction, FindValueTransaction, PingTransaction, StoreValueTransaction, Transaction, TransactionMap,
};
use crate::transport::packet::MAX_DATAGRAM_SIZE;
use crate::transport::Framer;
use command::ClientCommand;
use dht_crypto::{Id, KeyPair};
use pipe::EngineHandle;
use rand::seq::SliceRandom;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::time::sleep_until;
use tracing::{debug, info, warn};
use verify::verify_peer;

/// Binds the engine's UDP socket, retrying successive ports (spec §7).
/// Returns the bound socket and the port it actually landed on.
pub async fn bind_udp(config: &Config) -> Result<(UdpSocket, u16), EngineError> {
    let mut last_err = None;
    for offset in 0..=config.bind_port_retries {
        let port = config.bind_port.saturating_add(offset);
        match UdpSocket::bind(("0.0.0.0", port)).await {
            Ok(socket) => return Ok((socket, port)),
            Err(e) => {
                warn!(port, error = %e, "bind attempt failed, trying next port");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.map(EngineError::Io).unwrap_or(EngineError::NoPortAvailable))
}

/// Owns every mutable piece of DHT state. There is exactly one `Engine` per
/// running node (spec.md §9 "Global state"); it is driven to completion by
/// [`Engine::run`] and never shared across threads.
pub struct Engine {
    config: Config,
    keypair: KeyPair,
    local_node: Node,
    routing: RoutingTree,
    values: ValueTable,
    transactions: TransactionMap,
    framer: Framer,
    discovery: DiscoveryRegistry,
    hashtable: HashtableRegistry,
    socket: UdpSocket,
    client: EngineHandle,
    persistence: Arc<dyn PersistenceBackend>,
}

impl Engine {
    pub fn new(
        config: Config,
        keypair: KeyPair,
        bind_port: u16,
        socket: UdpSocket,
        client: EngineHandle,
        persistence: Arc<dyn PersistenceBackend>,
    ) -> Self {
        let local_id = keypair.public_id();
        let local_node = Node::new(
            local_id,
            Endpoint {
                address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                port: bind_port,
            },
        );
        Engine {
            routing: RoutingTree::new(local_id, config.k, config.extra_depth_bound),
            values: ValueTable::new(),
            transactions: TransactionMap::new(),
            framer: Framer::new(),
            discovery: DiscoveryRegistry::new(),
            hashtable: HashtableRegistry::new(),
            config,
            keypair,
            local_node,
            socket,
            client,
            persistence,
        }
    }

    fn local_id(&self) -> Id {
        self.keypair.public_id()
    }

    /// Loads persisted state, if any, and seeds the routing tree with the
    /// configured bootstrap peers (spec §4.7 "Bootstrap", §6.2).
    pub async fn bootstrap(&mut self) -> anyhow::Result<()> {
        if let Some(blob) = self.persistence.fetch(NODETREE_KEY).await? {
            match persistence::decode_nodetree(&blob) {
                Ok(nodes) => {
                    for node in nodes {
                        if node.node_id() != self.local_id() {
                            let _ = self.routing.add(node);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "failed to decode persisted nodetree, starting empty"),
            }
        }
        if let Some(blob) = self.persistence.fetch(HASHTABLE_KEY).await? {
            match persistence::decode_hashtable(&blob) {
                Ok(entries) => self.values = ValueTable::load(entries),
                Err(e) => warn!(error = %e, "failed to decode persisted hashtable, starting empty"),
            }
        }

        for seed in self.config.seeds.clone() {
            let Ok(key_bytes) = dht_crypto::z85::decode(&seed.public_key_z85) else {
                continue;
            };
            let Some(node_id) = dht_crypto::keys::public_id_from_bytes(&key_bytes) else {
                continue;
            };
            let Ok(address) = seed.address.parse::<IpAddr>() else {
                continue;
            };
            if node_id == self.local_id() {
                continue;
            }
            let _ = self.routing.add(Node::new(node_id, Endpoint { address, port: seed.port }));
        }
        Ok(())
    }

    /// Runs until a `STOP` command or a closed client pipe ends it.
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.bootstrap().await?;
        self.client.signal_ready();
        info!(node_id = %self.local_id(), "engine started");

        loop {
            let deadline = tokio::time::Instant::now() + self.config.max_tick_wait;
            let mut buf = [0u8; MAX_DATAGRAM_SIZE];

            tokio::select! {
                _ = sleep_until(deadline) => {}
                request = self.client.recv() => {
                    match request {
                        Some(request) => {
                            let frames = request.frames.clone();
                            let (reply, stop) = self.handle_client_frames(frames).await;
                            request.reply(reply);
                            if stop {
                                self.run_tick_maintenance().await;
                                self.persist().await;
                                self.client.signal_done();
                                return Ok(());
                            }
                        }
                        None => return Ok(()),
                    }
                }
                recv = self.socket.recv_from(&mut buf) => {
                    match recv {
                        Ok((n, addr)) => self.handle_datagram(&buf[..n], addr).await,
                        Err(e) => warn!(error = %e, "udp recv_from failed"),
                    }
                }
            }

            self.run_tick_maintenance().await;
            self.persist().await;
        }
    }

    // ---- inbound wire traffic ----------------------------------------

    async fn handle_datagram(&mut self, datagram: &[u8], addr: SocketAddr) {
        let msg = match self.framer.accept_datagram(&self.keypair, datagram) {
            Ok(Some(msg)) => msg,
            Ok(None) => return,
            Err(e) => {
                debug!(error = %e, %addr, "dropping malformed or undecryptable datagram");
                return;
            }
        };
        if msg.sender == self.local_id() {
            return;
        }

        let candidate = verify_peer(&mut self.routing, addr.ip(), addr.port(), msg.sender);
        if self.routing.get_by_id(msg.sender).is_none() {
            let _ = self.routing.add(candidate);
        }

        if messaging::is_query(msg.msg_type) {
            if let Some(node) = self.routing.get_mut(msg.sender) {
                node.record_query_in();
            }
            self.handle_peer_query(msg.sender, addr, msg.txid, msg.msg_type, msg.content).await;
        } else {
            let rtt = self
                .transactions
                .get(msg.txid)
                .ok()
                .and_then(|t| t.sent_at(msg.sender))
                .or_else(|| self.transactions.created_at(msg.txid))
                .map(|sent| sent.elapsed().as_secs_f64());
            if let Some(rtt) = rtt {
                if let Some(node) = self.routing.get_mut(msg.sender) {
                    node.record_response(rtt);
                }
            }
            self.handle_peer_response(msg.sender, msg.txid, msg.msg_type, msg.content).await;
        }
    }

    async fn handle_peer_query(&mut self, sender: Id, addr: SocketAddr, txid: u32, msg_type: u8, content: Vec<u8>) {
        let mut replied = false;
        match msg_type {
            messaging::PING => {
                self.send_raw(sender, addr, txid, messaging::PONG, &[]).await;
                replied = true;
            }
            messaging::FNOD => {
                if content.len() >= dht_crypto::ID_LEN {
                    let target = Id::from_slice(&content[..dht_crypto::ID_LEN]);
                    let closest = self.routing.closest_to(target, self.config.k);
                    let body = messaging::encode_node_reply(&closest);
                    self.send_raw(sender, addr, txid, messaging::NODE_REPLY_DISCOVERY, &body).await;
                    replied = true;
                }
            }
            messaging::FVAL => {
                if let Ok((key_id, _context)) = messaging::decode_fval_body(&content) {
                    let value = self.values.get(key_id).map(|e| e.value.clone());
                    match value {
                        Some(value) => {
                            self.send_raw(sender, addr, txid, messaging::VALUE_REPLY, &value).await;
                        }
                        None => {
                            let closest = self.routing.closest_to(key_id, self.config.k);
                            let body = messaging::encode_node_reply(&closest);
                            self.send_raw(sender, addr, txid, messaging::NODE_REPLY_DHT, &body).await;
                        }
                    }
                    replied = true;
                }
            }
            messaging::STOR => {
                if let Ok((key, _context, value)) = messaging::decode_stor_body(&content) {
                    let key_id = Id::for_key(&key);
                    self.values.insert(key_id, sender, key, value);
                }
            }
            messaging::REMV => {
                if let Ok((key, _context)) = messaging::decode_remove_body(&content) {
                    let key_id = Id::for_key(&key);
                    if self.values.get(key_id).map(|e| e.originator) == Some(sender) {
                        self.values.remove(key_id);
                    }
                }
            }
            _ => {}
        }
        if replied {
            if let Some(node) = self.routing.get_mut(sender) {
                node.record_response_out();
            }
        }
    }

    async fn handle_peer_response(&mut self, sender: Id, txid: u32, msg_type: u8, content: Vec<u8>) {
        let Some((mut tx, created_at)) = self.transactions.take(txid) else {
            return;
        };

        match msg_type {
            messaging::PONG => {
                if let Transaction::Ping(t) = &mut tx {
                    t.handle_response(sender, created_at.elapsed().as_secs_f64());
                }
            }
            messaging::NODE_REPLY_DISCOVERY | messaging::NODE_REPLY_DHT => {
                let offered = messaging::decode_node_reply(&content);
                let to_query = match &mut tx {
                    Transaction::FindNodes(t) => t.handle_response(sender, offered, &mut self.routing),
                    Transaction::FindValue(t) => t.handle_node_reply(sender, offered, &mut self.routing),
                    Transaction::StoreValue(t) => {
                        let (sent, targets) = t.handle_node_reply(sender, offered, &mut self.routing);
                        let body = messaging::encode_stor_body(t.key(), t.context(), t.value());
                        for node in targets {
                            self.send_to_node(node.node_id(), txid, messaging::STOR, &body).await;
                        }
                        sent
                    }
                    Transaction::Ping(_) => Vec::new(),
                };
                // FindValue re-queries with FVAL (so a holder can answer with
                // the value itself); every other lookup kind re-queries with
                // a bare FNOD targeting the same id.
                match &tx {
                    Transaction::FindValue(t) => {
                        let body = messaging::encode_fval_body(t.target(), "");
                        for id in to_query {
                            self.send_to_node(id, txid, messaging::FVAL, &body).await;
                        }
                    }
                    Transaction::FindNodes(t) => {
                        let body = t.target().as_bytes().to_vec();
                        for id in to_query {
                            self.send_to_node(id, txid, messaging::FNOD, &body).await;
                        }
                    }
                    Transaction::StoreValue(t) => {
                        let body = t.target().as_bytes().to_vec();
                        for id in to_query {
                            self.send_to_node(id, txid, messaging::FNOD, &body).await;
                        }
                    }
                    Transaction::Ping(_) => {}
                }
            }
            messaging::VALUE_REPLY => {
                if let Transaction::FindValue(t) = &mut tx {
                    let key_id = t.target();
                    let user_key = t.user_key().as_bytes().to_vec();
                    t.handle_value_reply(content.clone());
                    self.values.insert(key_id, sender, user_key, content);
                }
            }
            _ => {}
        }

        self.transactions.reinsert(txid, tx, created_at);
    }

    // ---- outbound sends -------------------------------------------------

    async fn send_to_node(&mut self, recipient: Id, txid: u32, msg_type: u8, content: &[u8]) {
        let Some(node) = self.routing.get_by_id(recipient) else {
            return;
        };
        let addr = SocketAddr::new(node.endpoint.address, node.endpoint.port);
        self.send_raw(recipient, addr, txid, msg_type, content).await;
        if let Some(n) = self.routing.get_mut(recipient) {
            if messaging::is_query(msg_type) {
                n.record_query_out();
            } else {
                n.record_response_out();
            }
        }
    }

    async fn send_raw(&self, recipient: Id, addr: SocketAddr, txid: u32, msg_type: u8, content: &[u8]) {
        for dgram in self.framer.frame_outgoing(&self.keypair, Some(&recipient), txid, msg_type, content) {
            if let Err(e) = self.socket.send_to(&dgram, addr).await {
                warn!(error = %e, %addr, "udp send_to failed");
            }
        }
    }

    /// Drives incoming wire traffic until `txid` reaches a terminal state or
    /// its own timeout elapses, servicing nothing else meanwhile. Used only
    /// from client-command handlers that must return a synchronous reply
    /// once a lookup completes (spec §6.4; see DESIGN.md for the tradeoff).
    async fn await_transaction(&mut self, txid: u32) {
        loop {
            let terminal = self.transactions.get(txid).map(|t| t.is_terminal()).unwrap_or(true);
            if terminal {
                return;
            }
            let Some(created_at) = self.transactions.created_at(txid) else {
                return;
            };
            let deadline = created_at + self.config.transaction_timeout;
            let now = Instant::now();
            if now >= deadline {
                if let Ok(t) = self.transactions.get_mut(txid) {
                    t.timeout();
                }
                continue;
            }
            let tokio_deadline = tokio::time::Instant::now() + (deadline - now);
            let mut buf = [0u8; MAX_DATAGRAM_SIZE];
            tokio::select! {
                _ = sleep_until(tokio_deadline) => {
                    if let Ok(t) = self.transactions.get_mut(txid) {
                        t.timeout();
                    }
                }
                recv = self.socket.recv_from(&mut buf) => {
                    if let Ok((n, addr)) = recv {
                        self.handle_datagram(&buf[..n], addr).await;
                    }
                }
            }
        }
    }

    // ---- scheduled maintenance ------------------------------------------

    async fn run_tick_maintenance(&mut self) {
        self.transactions.timeout(self.config.transaction_timeout);
        self.transactions.expire(self.config.transaction_expire);

        let discovery_events = self.discovery.trigger_events(&self.config);
        for event in discovery_events {
            self.run_discovery_event(event).await;
        }
        let hashtable_events = self.hashtable.trigger_events(&self.config);
        for event in hashtable_events {
            self.run_hashtable_event(event).await;
        }
    }

    async fn run_discovery_event(&mut self, event: DiscoveryEvent) {
        match event {
            DiscoveryEvent::PollNeighbours => {
                let local_id = self.local_id();
                self.start_find_nodes(local_id).await;
            }
            DiscoveryEvent::PollZone => self.start_find_nodes(dht_crypto::random_id()).await,
            DiscoveryEvent::VerifyPeers => self.verify_random_peers().await,
            DiscoveryEvent::Reap => self.reap_failed_peers(),
        }
    }

    async fn start_find_nodes(&mut self, target: Id) {
        let mut tx = FindNodesTransaction::new(target, self.config.k, self.config.alpha);
        let initial = tx.start(&self.routing);
        let txid = self.transactions.insert(Transaction::FindNodes(tx));
        let body = target.as_bytes().to_vec();
        for id in initial {
            self.send_to_node(id, txid, messaging::FNOD, &body).await;
        }
    }

    async fn verify_random_peers(&mut self) {
        let mut nodes = self.routing.get_all_nodes();
        nodes.shuffle(&mut rand::thread_rng());
        for node in nodes.into_iter().take(3) {
            let mut tx = PingTransaction::new(node.node_id());
            tx.start();
            let txid = self.transactions.insert(Transaction::Ping(tx));
            self.send_to_node(node.node_id(), txid, messaging::PING, &[]).await;
        }
    }

    fn reap_failed_peers(&mut self) {
        let failed: Vec<Id> = self
            .routing
            .get_all_nodes()
            .into_iter()
            .filter(|n| n.is_failed())
            .map(|n| n.node_id())
            .collect();
        for id in failed {
            self.routing.remove(id);
        }
    }

    async fn run_hashtable_event(&mut self, event: HashtableEvent) {
        match event {
            HashtableEvent::RepublishOwnValues => {
                let local_id = self.local_id();
                let due = self.values.due_for_republish(local_id, &self.config);
                for key_id in due {
                    self.values.touch(key_id);
                    let entry = self.values.get(key_id).map(|e| (e.key.clone(), e.value.clone()));
                    if let Some((key, value)) = entry {
                        self.start_store_value(key, String::new(), value).await;
                    }
                }
            }
            HashtableEvent::ReplicateForeignValues => {
                let local_id = self.local_id();
                let foreign = self.values.foreign_entries(local_id);
                for key_id in foreign {
                    let closest = self.routing.closest_to(key_id, 1);
                    let we_are_closest = match closest.first() {
                        Some(n) => local_id.distance(&key_id) < n.node_id().distance(&key_id),
                        None => true,
                    };
                    if we_are_closest {
                        self.values.touch(key_id);
                        let entry = self.values.get(key_id).map(|e| (e.key.clone(), e.value.clone()));
                        if let Some((key, value)) = entry {
                            self.start_store_value(key, String::new(), value).await;
                        }
                    }
                }
            }
            HashtableEvent::ExpireValues => {
                let local_id = self.local_id();
                self.values.expire(local_id, &self.config);
            }
        }
    }

    async fn start_store_value(&mut self, key: Vec<u8>, context: String, value: Vec<u8>) {
        let mut tx = StoreValueTransaction::new(key, context, value, self.config.k, self.config.alpha);
        let (initial, immediate_targets) = tx.start(&self.routing);
        let target = tx.target();
        let stor_body = messaging::encode_stor_body(tx.key(), tx.context(), tx.value());
        let txid = self.transactions.insert(Transaction::StoreValue(tx));
        let body = target.as_bytes().to_vec();
        for id in initial {
            self.send_to_node(id, txid, messaging::FNOD, &body).await;
        }
        for node in immediate_targets {
            self.send_to_node(node.node_id(), txid, messaging::STOR, &stor_body).await;
        }
    }

    async fn persist(&mut self) {
        let nodes = self.routing.get_all_nodes();
        match persistence::encode_nodetree(&nodes) {
            Ok(blob) => {
                if let Err(e) = self.persistence.store(NODETREE_KEY, blob).await {
                    warn!(error = %e, "failed to persist nodetree");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode nodetree"),
        }
        match persistence::encode_hashtable(self.values.snapshot()) {
            Ok(blob) => {
                if let Err(e) = self.persistence.store(HASHTABLE_KEY, blob).await {
                    warn!(error = %e, "failed to persist hashtable");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode hashtable"),
        }
    }

    // ---- client command protocol (spec §6.4) ----------------------------

    async fn handle_client_frames(&mut self, frames: Vec<String>) -> (Vec<String>, bool) {
        let command = match command::parse(&frames) {
            Ok(cmd) => cmd,
            Err(_) => return (vec![crate::error::INVALID_COMMAND_REPLY.to_string()], false),
        };

        match command {
            ClientCommand::Node => (vec![self.node_json()], false),
            ClientCommand::Peers => (vec![self.peers_json()], false),
            ClientCommand::Reset { node_id, secret_key } => {
                self.rekey(&node_id, &secret_key);
                (vec![self.node_json()], false)
            }
            ClientCommand::Start { node_id, secret_key } => {
                self.rekey(&node_id, &secret_key);
                (vec![self.node_json()], false)
            }
            ClientCommand::Stop => (vec![], true),
            ClientCommand::FindNodes { target } => (vec![self.run_find_nodes(&target).await], false),
            ClientCommand::FindValue { key, context } => {
                (vec![self.run_find_value(&key, &context).await], false)
            }
            ClientCommand::Store { key, content, context } => (
                vec![self.run_store_value(key.into_bytes(), context, content.into_bytes()).await],
                false,
            ),
            ClientCommand::Remove { key, context } => {
                self.run_remove(key.into_bytes(), &context).await;
                (vec![], false)
            }
            ClientCommand::Publish => (vec![self.publish_json()], false),
            ClientCommand::Hash => (vec![self.hash_json()], false),
        }
    }

    /// `RESET`/`START` both replace the local identity (spec §6.4); the
    /// routing tree is keyed to `local_id` so it's rebuilt from scratch
    /// rather than migrated. `node_id` is accepted for protocol symmetry
    /// with the seed-string format but not otherwise consulted — the public
    /// id is always the one the supplied (or freshly generated) secret key
    /// actually derives, per spec §9's open question on this command pair.
    fn rekey(&mut self, node_id: &str, secret_key: &str) {
        let _ = node_id;
        let keypair = match dht_crypto::z85::decode(secret_key) {
            Ok(bytes) if bytes.len() == 32 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                KeyPair::from_secret_bytes(arr)
            }
            _ => KeyPair::generate(),
        };
        let local_id = keypair.public_id();
        self.routing = RoutingTree::new(local_id, self.config.k, self.config.extra_depth_bound);
        self.local_node = Node::new(local_id, self.local_node.endpoint.clone());
        self.keypair = keypair;
    }

    fn node_json(&self) -> String {
        serde_json::to_string(&self.local_node).unwrap_or_else(|_| "{}".to_string())
    }

    fn peers_json(&self) -> String {
        serde_json::to_string(&self.routing.get_all_nodes()).unwrap_or_else(|_| "[]".to_string())
    }

    fn publish_json(&self) -> String {
        let local_id = self.local_id();
        let map: std::collections::HashMap<String, String> = self
            .values
            .iter()
            .filter(|(_, e)| e.originator == local_id)
            .map(|(k, e)| (k.to_string(), String::from_utf8_lossy(&e.value).into_owned()))
            .collect();
        serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
    }

    fn hash_json(&self) -> String {
        let map: std::collections::HashMap<String, String> = self
            .values
            .snapshot()
            .into_iter()
            .map(|(k, e)| (k.to_string(), String::from_utf8_lossy(&e.value).into_owned()))
            .collect();
        serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
    }

    async fn run_find_nodes(&mut self, target_z85: &str) -> String {
        let Ok(target_bytes) = dht_crypto::z85::decode(target_z85) else {
            return serde_json::to_string::<Vec<Node>>(&Vec::new()).unwrap_or_else(|_| "[]".to_string());
        };
        let target = Id::from_slice(&target_bytes);

        let mut tx = FindNodesTransaction::new(target, self.config.k, self.config.alpha);
        let initial = tx.start(&self.routing);
        let txid = self.transactions.insert(Transaction::FindNodes(tx));
        let body = target.as_bytes().to_vec();
        for id in initial {
            self.send_to_node(id, txid, messaging::FNOD, &body).await;
        }
        self.await_transaction(txid).await;

        let closest = match self.transactions.get(txid) {
            Ok(Transaction::FindNodes(t)) => t.closest().to_vec(),
            _ => Vec::new(),
        };
        serde_json::to_string(&closest).unwrap_or_else(|_| "[]".to_string())
    }

    async fn run_find_value(&mut self, key: &str, context: &str) -> String {
        let _ = context;
        let mut tx = FindValueTransaction::new(key.to_string(), self.config.k, self.config.alpha);
        let initial = tx.start(&self.routing);
        let target = tx.target();
        let txid = self.transactions.insert(Transaction::FindValue(tx));
        let body = messaging::encode_fval_body(target, "");
        for id in initial {
            self.send_to_node(id, txid, messaging::FVAL, &body).await;
        }
        self.await_transaction(txid).await;

        let found = match self.transactions.get(txid) {
            Ok(Transaction::FindValue(t)) => t.found_value().map(|v| v.to_vec()),
            _ => None,
        };
        let bytes = found.or_else(|| self.values.get(target).map(|e| e.value.clone()));
        match bytes {
            Some(bytes) => serde_json::to_string(&String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_else(|_| "null".to_string()),
            None => "null".to_string(),
        }
    }

    async fn run_store_value(&mut self, key: Vec<u8>, context: String, value: Vec<u8>) -> String {
        let mut tx = StoreValueTransaction::new(key, context, value, self.config.k, self.config.alpha);
        let (initial, immediate_targets) = tx.start(&self.routing);
        let target = tx.target();
        let stor_body = messaging::encode_stor_body(tx.key(), tx.context(), tx.value());
        let txid = self.transactions.insert(Transaction::StoreValue(tx));
        let body = target.as_bytes().to_vec();
        for id in initial {
            self.send_to_node(id, txid, messaging::FNOD, &body).await;
        }
        for node in immediate_targets {
            self.send_to_node(node.node_id(), txid, messaging::STOR, &stor_body).await;
        }
        self.await_transaction(txid).await;

        let (targets, key, value) = match self.transactions.get(txid) {
            Ok(Transaction::StoreValue(t)) => (t.targets().to_vec(), t.key().to_vec(), t.value().to_vec()),
            _ => (Vec::new(), Vec::new(), Vec::new()),
        };
        let local_id = self.local_id();
        self.values.insert(target, local_id, key, value);
        serde_json::to_string(&targets).unwrap_or_else(|_| "[]".to_string())
    }

    async fn run_remove(&mut self, key: Vec<u8>, context: &str) {
        let target = Id::for_key(&key);
        let mut tx = FindNodesTransaction::new(target, self.config.k, self.config.alpha);
        let initial = tx.start(&self.routing);
        let txid = self.transactions.insert(Transaction::FindNodes(tx));
        let body = target.as_bytes().to_vec();
        for id in initial {
            self.send_to_node(id, txid, messaging::FNOD, &body).await;
        }
        self.await_transaction(txid).await;

        let targets = match self.transactions.remove(txid) {
            Some(Transaction::FindNodes(t)) => t.closest().to_vec(),
            _ => Vec::new(),
        };
        let remv_body = messaging::encode_remove_body(&key, context);
        for node in targets {
            self.send_to_node(node.node_id(), txid, messaging::REMV, &remv_body).await;
        }

        if self.values.get(target).map(|e| e.originator) == Some(self.local_id()) {
            self.values.remove(target);
        }
    }
}
