//! 网络拓扑管理
//!
//! 定义网络拓扑结构：节点、链路、路由表、数据包转发与统计信息。
//! 拓扑只会在初始配置阶段增加链路，运行中只会被故障注入器断开链路；
//! 断链后必须显式调用 [`Network::recompute_routes`]。

use std::collections::HashMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, trace, warn};

use super::deliver_packet::DeliverPacket;
use super::id::{LinkId, NodeId};
use super::link::{Link, LinkParams};
use super::link_ready::LinkReady;
use super::node::Node;
use super::packet::Packet;
use super::routing::RoutingTable;
use super::stats::Stats;
use super::transport::Transport;
use crate::error::{Result, SimError};
use crate::proto::tcp::TcpStack;
use crate::sim::{SimTime, Simulator};

/// 默认的丢包采样种子
pub const DEFAULT_SEED: u64 = 1;

/// 网络拓扑
pub struct Network {
    nodes: Vec<Node>,
    links: Vec<Link>,
    names: HashMap<String, NodeId>,
    routes: RoutingTable,
    routes_version: u64,
    rng: StdRng,
    next_pkt_id: u64,
    pub stats: Stats,
    pub tcp: TcpStack,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl Network {
    /// 创建空网络；`seed` 决定丢包采样序列。
    pub fn new(seed: u64) -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            names: HashMap::new(),
            routes: RoutingTable::default(),
            routes_version: 0,
            rng: StdRng::seed_from_u64(seed),
            next_pkt_id: 0,
            stats: Stats::default(),
            tcp: TcpStack::default(),
        }
    }

    /// 添加节点
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let name = name.into();
        self.names.insert(name.clone(), id);
        self.nodes.push(Node::new(id, name));
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<LinkId> {
        self.nodes.get(a.0)?.link_to(b)
    }

    /// 连接两个节点（全双工点对点链路）
    pub fn add_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        data_rate_bps: u64,
        delay: SimTime,
        loss_probability: f64,
    ) -> Result<LinkId> {
        let params = LinkParams {
            data_rate_bps,
            delay,
            loss_probability,
            ..LinkParams::default()
        };
        self.add_link_with(a, b, &params)
    }

    /// 以完整参数连接两个节点
    pub fn add_link_with(&mut self, a: NodeId, b: NodeId, params: &LinkParams) -> Result<LinkId> {
        for n in [a, b] {
            if n.0 >= self.nodes.len() {
                return Err(SimError::UnknownNode(n));
            }
        }
        if a == b {
            return Err(SimError::SelfLink(a));
        }
        if self.link_between(a, b).is_some() {
            return Err(SimError::DuplicateLink(a, b));
        }
        params.validate()?;

        let id = LinkId(self.links.len());
        self.links.push(Link::new(a, b, params));
        self.nodes[a.0].attach(b, id);
        self.nodes[b.0].attach(a, id);
        debug!(
            link_id = ?id,
            a = ?a,
            b = ?b,
            data_rate_bps = params.data_rate_bps,
            delay = ?params.delay,
            loss_probability = params.loss_probability,
            "添加链路"
        );
        Ok(id)
    }

    /// 断开链路。对已断开的链路再次调用是无操作，返回 `Ok(false)`。
    ///
    /// 两个方向队列里的包被丢弃；已在传播中的包到达时也会被丢弃。
    /// 路由表不会自动更新。
    pub fn set_link_down(&mut self, a: NodeId, b: NodeId) -> Result<bool> {
        let id = self.link_between(a, b).ok_or(SimError::UnknownLink(a, b))?;
        let link = &mut self.links[id.0];
        if !link.up {
            debug!(link_id = ?id, "链路已处于 down 状态");
            return Ok(false);
        }
        link.up = false;
        let flushed: usize = link.channels.iter_mut().map(|c| c.queue.flush()).sum();
        self.stats.link_down_drops += flushed as u64;
        info!(link_id = ?id, a = ?a, b = ?b, flushed, "⛔ 链路断开");
        Ok(true)
    }

    /// 基于当前所有 up 链路整体重建路由表。
    pub fn recompute_routes(&mut self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(SimError::TopologyUninitialized);
        }
        let adj: Vec<Vec<NodeId>> = self
            .nodes
            .iter()
            .map(|n| {
                n.neighbors()
                    .filter(|(_, l)| self.links[l.0].up)
                    .map(|(nb, _)| nb)
                    .collect()
            })
            .collect();
        self.routes = RoutingTable::build(&adj);
        self.routes_version += 1;
        info!(
            entries = self.routes.len(),
            version = self.routes_version,
            "🧭 路由表已重建"
        );
        Ok(())
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routes
    }

    /// 路由表已被重建的次数
    pub fn routes_version(&self) -> u64 {
        self.routes_version
    }

    /// 按当前路由表判断 `a` 能否到达 `b`。
    pub fn is_reachable(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return a.0 < self.nodes.len();
        }
        self.routes.next_hop(a, b).is_some()
    }

    /// 创建数据包
    pub fn make_packet(
        &mut self,
        flow_id: u64,
        size_bytes: u32,
        src: NodeId,
        dst: NodeId,
        transport: Transport,
    ) -> Packet {
        let id = self.next_pkt_id;
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        Packet {
            id,
            flow_id,
            size_bytes,
            src,
            dst,
            hops: 0,
            transport,
        }
    }

    /// 临时取出 TCP 协议栈，避免 `&mut self` 与 `&mut self.tcp` 的重叠借用。
    pub fn with_tcp<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut TcpStack, &mut Network) -> R,
    {
        let mut tcp = std::mem::take(&mut self.tcp);
        let result = f(&mut tcp, self);
        self.tcp = tcp;
        result
    }

    /// 从指定节点转发数据包：查路由、入队，链路空闲则立即开始发送。
    #[tracing::instrument(skip(self, pkt, sim), fields(pkt_id = pkt.id, flow_id = pkt.flow_id, dst = ?pkt.dst))]
    pub fn forward_from(&mut self, from: NodeId, pkt: Packet, sim: &mut Simulator) {
        let Some(next) = self.routes.next_hop(from, pkt.dst) else {
            debug!("无可用路由，丢弃数据包");
            self.stats.no_route_drops += 1;
            return;
        };
        let Some(link_id) = self.link_between(from, next) else {
            warn!(next = ?next, "路由指向不存在的链路，丢弃数据包");
            self.stats.no_route_drops += 1;
            return;
        };
        let link = &mut self.links[link_id.0];
        if !link.up {
            debug!(link_id = ?link_id, "链路 down，丢弃数据包");
            self.stats.link_down_drops += 1;
            return;
        }
        let Some((dir, _)) = link.direction(from) else {
            return;
        };
        let channel = &mut link.channels[dir];
        if channel.queue.enqueue(pkt).is_err() {
            trace!(link_id = ?link_id, "队列已满，尾丢弃");
            self.stats.queue_drops += 1;
            return;
        }
        if !channel.busy {
            self.start_transmission(link_id, dir, sim);
        }
    }

    /// 从队首取一个包开始串行化发送；发送完成时触发 `LinkReady`。
    fn start_transmission(&mut self, link_id: LinkId, dir: usize, sim: &mut Simulator) {
        let link = &mut self.links[link_id.0];
        let Some(pkt) = link.channels[dir].queue.dequeue() else {
            return;
        };
        link.channels[dir].busy = true;

        let tx_time = link.tx_time(pkt.size_bytes);
        let arrive = tx_time.saturating_add(link.delay);
        let to = if dir == 0 { link.b } else { link.a };
        trace!(
            link_id = ?link_id,
            pkt_id = pkt.id,
            tx_time = ?tx_time,
            arrive_in = ?arrive,
            "开始发送"
        );

        sim.schedule_in(tx_time, LinkReady { link_id, dir });

        if link.sample_loss(pkt.size_bytes, &mut self.rng) {
            debug!(link_id = ?link_id, pkt_id = pkt.id, "差错模型丢弃数据包");
            self.stats.lost_pkts += 1;
            return;
        }
        sim.schedule_in(
            arrive,
            DeliverPacket {
                to,
                via: link_id,
                pkt,
            },
        );
    }

    /// 发送器空闲：继续发送队列中的下一个包。
    pub(crate) fn on_link_ready(&mut self, link_id: LinkId, dir: usize, sim: &mut Simulator) {
        let Some(link) = self.links.get_mut(link_id.0) else {
            return;
        };
        link.channels[dir].busy = false;
        if link.up && !link.channels[dir].queue.is_empty() {
            self.start_transmission(link_id, dir, sim);
        }
    }

    /// 数据包经链路 `via` 到达节点 `to`
    #[tracing::instrument(skip(self, pkt, sim), fields(pkt_id = pkt.id, flow_id = pkt.flow_id))]
    pub(crate) fn deliver(&mut self, to: NodeId, via: LinkId, mut pkt: Packet, sim: &mut Simulator) {
        if !self.links[via.0].up {
            debug!(link_id = ?via, "到达时链路已 down，丢弃数据包");
            self.stats.link_down_drops += 1;
            return;
        }
        pkt.hops += 1;
        if to == pkt.dst {
            self.on_delivered(to, pkt, sim);
        } else {
            trace!(at = ?to, "未到达目的地，继续转发");
            self.forward_from(to, pkt, sim);
        }
    }

    /// 数据包送达目的地时的处理：统计并交给传输层
    fn on_delivered(&mut self, at: NodeId, pkt: Packet, sim: &mut Simulator) {
        self.stats.delivered_pkts += 1;
        self.stats.delivered_bytes += pkt.size_bytes as u64;
        trace!(
            at = ?at,
            hops = pkt.hops,
            delivered_pkts = self.stats.delivered_pkts,
            "✅ 数据包送达目的地"
        );

        if let Transport::Tcp(seg) = pkt.transport {
            let conn_id = pkt.flow_id;
            self.with_tcp(|tcp, net| tcp.on_segment(conn_id, at, seg, sim, net));
        }
    }
}
