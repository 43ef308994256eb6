//! 拓扑与路由
//!
//! 命名节点、带差错模型的全双工点对点链路、逐跳转发，以及只在显式请求时整体重建的最短跳数路由表。

mod deliver_packet;
mod id;
mod link;
mod link_ready;
mod net_world;
mod network;
mod node;
mod packet;
mod routing;
mod stats;
mod transport;

pub use deliver_packet::DeliverPacket;
pub use id::{LinkId, NodeId};
pub use link::{ErrorUnit, Link, LinkParams};
pub use link_ready::LinkReady;
pub use net_world::NetWorld;
pub use network::{DEFAULT_SEED, Network};
pub use node::Node;
pub use packet::Packet;
pub use routing::RoutingTable;
pub use stats::Stats;
pub use transport::{TcpSegment, Transport};
