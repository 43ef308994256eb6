//! 故障注入
//!
//! 在指定时刻断开链路并随即重建路由表。同一时刻的所有断链与一次路由重建放在同一个事件里执行，
//! 因此任何其它事件都看不到“链路已断开但路由尚未重建”的中间状态。

use std::collections::BTreeMap;

use tracing::{error, info, warn};

use crate::error::{Result, SimError};
use crate::net::{NetWorld, Network, NodeId};
use crate::sim::{Event, EventId, SimTime, Simulator, World};

/// 一次链路故障：在 `at` 时刻断开 `a`-`b` 之间的链路。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkFault {
    pub a: NodeId,
    pub b: NodeId,
    pub at: SimTime,
}

/// 故障计划
#[derive(Debug, Default, Clone)]
pub struct FaultInjector {
    faults: Vec<LinkFault>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link_down(mut self, a: NodeId, b: NodeId, at: SimTime) -> Self {
        self.faults.push(LinkFault { a, b, at });
        self
    }

    pub fn push(&mut self, fault: LinkFault) {
        self.faults.push(fault);
    }

    pub fn faults(&self) -> &[LinkFault] {
        &self.faults
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    /// 校验所有故障链路都存在，然后按时刻分组调度。返回调度的事件句柄（每个时刻一个）。
    pub fn install(&self, sim: &mut Simulator, net: &Network) -> Result<Vec<EventId>> {
        let mut by_time: BTreeMap<SimTime, Vec<(NodeId, NodeId)>> = BTreeMap::new();
        for f in &self.faults {
            if net.link_between(f.a, f.b).is_none() {
                return Err(SimError::UnknownLink(f.a, f.b));
            }
            by_time.entry(f.at).or_default().push((f.a, f.b));
        }

        let mut ids = Vec::with_capacity(by_time.len());
        for (at, links) in by_time {
            info!(at = ?at, links = links.len(), "⚡ 调度链路故障");
            ids.push(sim.schedule_at(at, ApplyLinkFaults { links })?);
        }
        Ok(ids)
    }
}

/// 事件：断开一组链路，然后重建一次路由表。
#[derive(Debug)]
pub struct ApplyLinkFaults {
    pub links: Vec<(NodeId, NodeId)>,
}

impl ApplyLinkFaults {
    /// 直接作用在网络上（事件执行与测试共用）。
    pub fn apply(&self, net: &mut Network) -> Result<()> {
        for &(a, b) in &self.links {
            if !net.set_link_down(a, b)? {
                warn!(a = ?a, b = ?b, "链路已经断开，忽略重复故障");
            }
        }
        net.recompute_routes()
    }
}

impl Event for ApplyLinkFaults {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let Some(w) = world.as_any_mut().downcast_mut::<NetWorld>() else {
            error!("world must be NetWorld");
            return;
        };
        match self.apply(&mut w.net) {
            Ok(()) => info!(now = ?sim.now(), links = ?self.links, "链路故障已生效，路由已重建"),
            Err(e) => error!(now = ?sim.now(), error = %e, "故障注入失败"),
        }
    }
}
