//! 数据包类型
//!
//! 定义网络数据包。路由在每一跳按当前路由表动态查找，包内只携带端点。

use super::id::NodeId;
use super::transport::Transport;

/// 网络数据包
#[derive(Debug, Clone)]
pub struct Packet {
    pub id: u64,
    pub flow_id: u64,
    pub size_bytes: u32,
    pub src: NodeId,
    pub dst: NodeId,
    /// 已经过的跳数
    pub hops: u32,
    pub transport: Transport,
}
