//! Client command protocol (spec §6.4): parses the raw frames the pipe
//! carries into a typed command. The ergonomic, typed wrapper a caller would
//! build on top of this (e.g. a `find_nodes(id) -> Vec<Peer>` method) is the
//! "client façade" spec.md §1 marks out of scope; this module is only the
//! engine's side of interpreting what that façade would send down the wire.

use crate::error::CommandError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Node,
    Peers,
    Reset { node_id: String, secret_key: String },
    Start { node_id: String, secret_key: String },
    Stop,
    FindNodes { target: String },
    FindValue { key: String, context: String },
    Store { key: String, content: String, context: String },
    Remove { key: String, context: String },
    Publish,
    Hash,
}

/// `frames[0]` names the command; the rest are its positional arguments.
pub fn parse(frames: &[String]) -> Result<ClientCommand, CommandError> {
    let (name, args) = frames.split_first().ok_or(CommandError::MalformedArgs)?;

    match name.as_str() {
        "NODE" => Ok(ClientCommand::Node),
        "PEERS" => Ok(ClientCommand::Peers),
        "RESET" => {
            let [node_id, secret_key] = two(args)?;
            Ok(ClientCommand::Reset { node_id, secret_key })
        }
        "START" => {
            let [node_id, secret_key] = two(args)?;
            Ok(ClientCommand::Start { node_id, secret_key })
        }
        "STOP" => Ok(ClientCommand::Stop),
        "FNOD" => {
            let [target] = one(args)?;
            Ok(ClientCommand::FindNodes { target })
        }
        "FVAL" => {
            let [key, context] = two(args)?;
            Ok(ClientCommand::FindValue { key, context })
        }
        "STOR" => {
            let [key, content, context] = three(args)?;
            Ok(ClientCommand::Store { key, content, context })
        }
        "REMV" => {
            let [key, context] = two(args)?;
            Ok(ClientCommand::Remove { key, context })
        }
        "PUBL" => Ok(ClientCommand::Publish),
        "HASH" => Ok(ClientCommand::Hash),
        _ => Err(CommandError::Unknown),
    }
}

fn one(args: &[String]) -> Result<[String; 1], CommandError> {
    match args {
        [a] => Ok([a.clone()]),
        _ => Err(CommandError::MalformedArgs),
    }
}

fn two(args: &[String]) -> Result<[String; 2], CommandError> {
    match args {
        [a, b] => Ok([a.clone(), b.clone()]),
        _ => Err(CommandError::MalformedArgs),
    }
}

fn three(args: &[String]) -> Result<[String; 3], CommandError> {
    match args {
        [a, b, c] => Ok([a.clone(), b.clone(), c.clone()]),
        _ => Err(CommandError::MalformedArgs),
    }
}
