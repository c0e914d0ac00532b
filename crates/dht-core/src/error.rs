//! One `thiserror`-derived error enum per subsystem, following the manual
//! `HandshakeIoError` shape from `lib-network::handshake::core` but expressed
//! with `#[derive(thiserror::Error)]` per the newer modules in that workspace.
//! Public, fallible entry points still return `anyhow::Result<T>` throughout,
//! matching the convention used across this workspace; these enums are for
//! callers that need to pattern-match a specific failure mode.

use thiserror::Error;

/// Transport framer failures (spec §4.4 "Failure cases"). All three are
/// handled by dropping the datagram silently (spec §7); this type exists so
/// the engine can log/count them without parsing a string.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("datagram shorter than the minimum outer-header length")]
    TooShort,
    #[error("declared fragment content length exceeds the remaining payload")]
    ContentLengthOverflow,
    #[error("decryption or authentication failed")]
    DecryptionFailed,
    #[error("unknown packet mode byte")]
    UnknownMode,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RoutingError {
    #[error("cannot insert the local node into its own routing tree")]
    LocalNode,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransactionError {
    #[error("no live transaction with this id")]
    NotFound,
    #[error("response received from a peer not in the outstanding set")]
    UnexpectedResponder,
}

/// A single-frame reply emitted for an unrecognized client command
/// (spec §7 kind 3); never propagated as a hard error.
pub const INVALID_COMMAND_REPLY: &str = "Invalid Command";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to bind a UDP socket after exhausting the configured port range")]
    NoPortAvailable,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Seed-string / config parsing failures (spec §6.2).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("seed entry did not have the form address:port:z85-public-key")]
    MalformedSeed,
    #[error("seed port was not a valid u16")]
    InvalidPort,
    #[error("seed public key was not valid z85")]
    InvalidPublicKey,
}

/// Client command protocol failures (spec §6.4, §7 kind 3). Always mapped to
/// [`INVALID_COMMAND_REPLY`] on the wire; never propagated past the pipe.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unrecognized command name")]
    Unknown,
    #[error("wrong number or shape of arguments for this command")]
    MalformedArgs,
    #[error("argument was not valid z85, hex, or UTF-8 as required")]
    InvalidEncoding,
}
