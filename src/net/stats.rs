//! 统计信息
//!
//! 定义网络仿真统计数据结构。

use serde::Serialize;

/// 网络统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub delivered_pkts: u64,
    pub delivered_bytes: u64,
    /// 被链路差错模型丢弃
    pub lost_pkts: u64,
    /// 发送队列溢出
    pub queue_drops: u64,
    /// 没有可用路由
    pub no_route_drops: u64,
    /// 经过已断开的链路
    pub link_down_drops: u64,
}

impl Stats {
    pub fn dropped_pkts(&self) -> u64 {
        self.lost_pkts + self.queue_drops + self.no_route_drops + self.link_down_drops
    }
}
