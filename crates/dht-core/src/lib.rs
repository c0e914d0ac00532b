//! Kademlia-style DHT overlay core: routing tree, iterative lookup state
//! machines, transport framer and engine event loop. Split into submodules
//! the way `lib-storage`/`lib-network` split a large subsystem into one
//! module per concern, with `dht_crypto` pulled out into its own workspace
//! member for the identifier/key/AEAD primitives.
//!
//! `engine` is the only module that owns mutable state end-to-end; every
//! other module is a pure data structure or state machine the engine drives.

pub mod config;
pub mod engine;
pub mod error;
pub mod messaging;
pub mod node;
pub mod persistence;
pub mod routing;
pub mod transaction;
pub mod transport;

pub use config::{Config, SeedEntry};
pub use engine::{bind_udp, Engine};
pub use error::{CommandError, ConfigError, EngineError, FrameError, RoutingError, TransactionError};
pub use node::{Endpoint, Liveness, Node};
pub use persistence::{FilesystemPersistence, NullPersistence, PersistenceBackend};
pub use routing::RoutingTree;

pub use dht_crypto::{Id, KeyPair, ID_LEN};
