//! Tunable constants collected into one struct, following the per-module
//! `*Config` convention used by `lib-network::mesh::config::MeshConfig` and
//! `lib-network::zdns::config` rather than scattering `const` items across
//! the crate.

use crate::error::ConfigError;
use std::time::Duration;

/// A `host:port:z85-public-key` seed entry, parsed at engine start (spec §6.2).
#[derive(Debug, Clone)]
pub struct SeedEntry {
    pub address: String,
    pub port: u16,
    pub public_key_z85: String,
}

impl SeedEntry {
    /// Parses the `address:port:z85-public-key` form used both in the seed
    /// configuration list and the client `START` command (spec §6.2, §6.4).
    pub fn parse(s: &str) -> Result<SeedEntry, ConfigError> {
        let mut parts = s.rsplitn(3, ':');
        let public_key_z85 = parts.next().ok_or(ConfigError::MalformedSeed)?;
        let port = parts.next().ok_or(ConfigError::MalformedSeed)?;
        let address = parts.next().ok_or(ConfigError::MalformedSeed)?;

        dht_crypto::z85::decode(public_key_z85).map_err(|_| ConfigError::InvalidPublicKey)?;
        let port: u16 = port.parse().map_err(|_| ConfigError::InvalidPort)?;

        Ok(SeedEntry {
            address: address.to_string(),
            port,
            public_key_z85: public_key_z85.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// First UDP port to attempt binding; the engine retries upward on failure.
    pub bind_port: u16,
    /// How many sequential ports to try before giving up.
    pub bind_port_retries: u16,

    pub seeds: Vec<SeedEntry>,

    /// alpha: bounded concurrency for iterative lookups.
    pub alpha: usize,
    /// K: bin capacity and closest-set size.
    pub k: usize,
    /// B: extra-depth bound for non-local-id subtrees.
    pub extra_depth_bound: u32,

    pub transaction_timeout: Duration,
    pub transaction_expire: Duration,

    pub neighbour_poll_interval: Duration,
    pub zone_poll_interval: Duration,
    pub verify_peers_interval: Duration,
    pub reap_interval: Duration,

    pub republish_interval: Duration,
    pub replicate_interval: Duration,
    /// Multiplier of `republish_interval` past which a foreign value expires.
    pub expire_factor: f64,

    /// Engine tick deadline ceiling (spec §4.7 item 1: "timeout derived from
    /// the next scheduled tick (≤ 1 s)").
    pub max_tick_wait: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_port: 7000,
            bind_port_retries: 32,
            seeds: Vec::new(),
            alpha: 3,
            k: 8,
            extra_depth_bound: 5,
            transaction_timeout: Duration::from_secs(5),
            transaction_expire: Duration::from_secs(30),
            neighbour_poll_interval: Duration::from_secs(120),
            zone_poll_interval: Duration::from_secs(300),
            verify_peers_interval: Duration::from_secs(61),
            reap_interval: Duration::from_secs(62),
            republish_interval: Duration::from_secs(600),
            replicate_interval: Duration::from_secs(300),
            expire_factor: 2.5,
            max_tick_wait: Duration::from_secs(1),
        }
    }
}
