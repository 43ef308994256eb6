//! 链路类型
//!
//! 全双工点对点链路：两个方向各有一个发送队列与发送器，共享速率、时延与差错模型。

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::id::NodeId;
use crate::error::{Result, SimError};
use crate::queue::{DEFAULT_QUEUE_PACKETS, DropTailQueue, PacketQueue};
use crate::sim::SimTime;

/// 差错率的计量单位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorUnit {
    /// 每个包以 `p` 的概率丢弃
    #[default]
    Packet,
    /// 每个字节以 `p` 的概率出错，包丢弃概率为 `1-(1-p)^bytes`
    Byte,
}

/// 链路创建参数
#[derive(Debug, Clone)]
pub struct LinkParams {
    pub data_rate_bps: u64,
    pub delay: SimTime,
    pub loss_probability: f64,
    pub error_unit: ErrorUnit,
    pub queue_packets: u32,
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            data_rate_bps: 5_000_000,
            delay: SimTime::from_millis(2),
            loss_probability: 0.0,
            error_unit: ErrorUnit::Packet,
            queue_packets: DEFAULT_QUEUE_PACKETS,
        }
    }
}

impl LinkParams {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.loss_probability) {
            return Err(SimError::InvalidLossProbability(self.loss_probability));
        }
        if self.data_rate_bps == 0 {
            return Err(SimError::InvalidDataRate(self.data_rate_bps));
        }
        Ok(())
    }
}

/// 单个方向的发送器
#[derive(Debug)]
pub(crate) struct Channel {
    pub(crate) busy: bool,
    pub(crate) queue: Box<dyn PacketQueue>,
}

/// 网络链路
#[derive(Debug)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    pub data_rate_bps: u64,
    pub delay: SimTime,
    pub loss_probability: f64,
    pub error_unit: ErrorUnit,
    pub(crate) up: bool,
    /// [a->b, b->a]
    pub(crate) channels: [Channel; 2],
}

impl Link {
    /// 创建新链路
    pub(crate) fn new(a: NodeId, b: NodeId, params: &LinkParams) -> Self {
        let channel = || Channel {
            busy: false,
            queue: Box::new(DropTailQueue::new(params.queue_packets)),
        };
        Self {
            a,
            b,
            data_rate_bps: params.data_rate_bps,
            delay: params.delay,
            loss_probability: params.loss_probability,
            error_unit: params.error_unit,
            up: true,
            channels: [channel(), channel()],
        }
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    /// 从 `from` 出发的方向下标及对端
    pub(crate) fn direction(&self, from: NodeId) -> Option<(usize, NodeId)> {
        if from == self.a {
            Some((0, self.b))
        } else if from == self.b {
            Some((1, self.a))
        } else {
            None
        }
    }

    /// 当前方向上排队的包数
    pub fn queued_packets(&self, from: NodeId) -> usize {
        self.direction(from)
            .map(|(dir, _)| self.channels[dir].queue.len())
            .unwrap_or(0)
    }

    /// 计算传输指定字节数所需的时间
    pub(crate) fn tx_time(&self, bytes: u32) -> SimTime {
        SimTime::for_bytes_at_rate(bytes as u64, self.data_rate_bps)
    }

    /// 对一个包做一次差错采样，返回是否丢弃
    pub(crate) fn sample_loss<R: Rng>(&self, bytes: u32, rng: &mut R) -> bool {
        if self.loss_probability <= 0.0 {
            return false;
        }
        let p = match self.error_unit {
            ErrorUnit::Packet => self.loss_probability,
            ErrorUnit::Byte => 1.0 - (1.0 - self.loss_probability).powi(bytes as i32),
        };
        rng.gen_bool(p.clamp(0.0, 1.0))
    }
}
