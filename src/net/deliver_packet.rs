//! 数据包交付事件
//!
//! 定义网络模拟中的数据包交付事件。

use super::id::{LinkId, NodeId};
use super::net_world::NetWorld;
use super::packet::Packet;
use crate::sim::{Event, Simulator, World};
use tracing::{error, trace};

/// 事件：一个 packet 经链路 `via` 传播完毕，交给节点 `to` 处理。
#[derive(Debug)]
pub struct DeliverPacket {
    pub to: NodeId,
    pub via: LinkId,
    pub pkt: Packet,
}

impl Event for DeliverPacket {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverPacket { to, via, pkt } = *self;
        trace!(pkt_id = pkt.id, to = ?to, now = ?sim.now(), "📨 数据包到达节点");

        let Some(w) = world.as_any_mut().downcast_mut::<NetWorld>() else {
            error!("world must be NetWorld");
            return;
        };
        w.net.deliver(to, via, pkt, sim);
    }
}
