//! 数据包携带的传输层信息
//!
//! 网络层只负责按 `dst` 转发，送达目的节点后把这里的段交给 [`TcpStack`](crate::proto::tcp::TcpStack)。

/// 传输层标签
#[derive(Debug, Clone, Default)]
pub enum Transport {
    /// 无传输层负载（探测包、测试用包）
    #[default]
    None,
    Tcp(TcpSegment),
}

/// TCP 段：只保留仿真需要的字段，连接由包的 `flow_id`（即 socket id）标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpSegment {
    /// `seq` 为字节序号，`len` 为载荷字节数
    Data { seq: u64, len: u32 },
    /// 累计确认：期望收到的下一个字节
    Ack { ack: u64 },
}
