//! 错误类型
//!
//! 仿真核心的统一错误分类：调度契约、拓扑、传输层与配置错误。

use thiserror::Error;

use crate::net::NodeId;
use crate::sim::SimTime;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("cannot schedule event in the past: at={at:?}, now={now:?}")]
    ScheduleInPast { at: SimTime, now: SimTime },
    #[error("negative or non-finite schedule delay: {0}")]
    NegativeDelay(f64),

    #[error("application {app} is not running (state: {state})")]
    SourceNotRunning { app: String, state: &'static str },

    #[error("unknown node: {0:?}")]
    UnknownNode(NodeId),
    #[error("unknown node name: {0}")]
    UnknownNodeName(String),
    #[error("no link between {0:?} and {1:?}")]
    UnknownLink(NodeId, NodeId),
    #[error("duplicate link between {0:?} and {1:?}")]
    DuplicateLink(NodeId, NodeId),
    #[error("not valid to link node to itself: {0:?}")]
    SelfLink(NodeId),
    #[error("invalid loss probability (must be in [0, 1]): {0}")]
    InvalidLossProbability(f64),
    #[error("invalid data rate: {0} bps")]
    InvalidDataRate(u64),
    #[error("routes recomputed before topology was initialized")]
    TopologyUninitialized,

    #[error("unknown socket: {0}")]
    UnknownSocket(u64),
    #[error("socket {0} is not bound")]
    SocketNotBound(u64),
    #[error("socket {0} is not connected")]
    SocketNotConnected(u64),
    #[error("socket {0} is closed")]
    SocketClosed(u64),
    #[error("connection refused by {node:?}:{port}")]
    ConnectionRefused { node: NodeId, port: u16 },
    #[error("address in use: {node:?}:{port}")]
    AddressInUse { node: NodeId, port: u16 },

    #[error("invalid scenario: {0}")]
    Config(String),
    #[error("cannot parse {what} from {value:?}")]
    Parse { what: &'static str, value: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
