//! 预置拓扑
//!
//! 把几种常用的链式实验拓扑表示成 [`ScenarioSpec`](crate::config::ScenarioSpec)，
//! 运行驱动与命令行共用同一套构建路径。

mod chain;

pub use chain::{BulkChainOpts, PacedChainOpts, bulk_chain, bypass_chain, paced_chain};
