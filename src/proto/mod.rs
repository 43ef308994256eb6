//! 传输层/协议模块
//!
//! 包含一个简化 TCP（NewReno）实现，作为仿真核心依赖的“网络协议栈”协作者。

pub mod tcp;
mod traced;

pub use traced::{TraceCallback, TracedValue};
