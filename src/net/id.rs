//! 节点与链路标识
//!
//! 均为创建顺序下标；节点和链路在仿真期间只增不删。

/// 节点标识，路由表按它排序以得到确定的等价下一跳
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(pub usize);
