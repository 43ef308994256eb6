//! 队列策略（Queue disciplines）
//!
//! 点对点链路每个方向一个发送队列；目前只有 DropTail（尾丢弃），容量按包数计。

use crate::net::Packet;

mod drop_tail;

pub use drop_tail::DropTailQueue;

/// 默认队列容量（包）
pub const DEFAULT_QUEUE_PACKETS: u32 = 100;

/// Packet 队列抽象
pub trait PacketQueue: std::fmt::Debug + Send {
    /// 入队：成功返回 Ok；若被丢弃则返回 Err(pkt)
    fn enqueue(&mut self, pkt: Packet) -> Result<(), Packet>;
    /// 出队：按队列策略返回下一个 packet
    fn dequeue(&mut self) -> Option<Packet>;
    /// 清空队列，返回被丢弃的包数
    fn flush(&mut self) -> usize;

    fn len(&self) -> usize;
    fn bytes(&self) -> u64;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
