//! 链式拓扑
//!
//! - `paced_chain`：A <-> B <-> C <-> D，5Mbps / 2ms，定速发送端 A -> D，B-C 的误码率可调
//! - `bulk_chain`：A <-> B <-> C <-> D，1Mbps / 10ms，批量发送 1,000,000 字节
//! - `bypass_chain`：在 `bulk_chain` 基础上增加旁路 A <-> E <-> F <-> G <-> D，
//!   2s 时断开 B-C，之后流量改走旁路

use crate::config::{FaultSpec, FlowApp, FlowSpec, LinkSpec, SCHEMA_VERSION, ScenarioSpec, TraceSpec};
use crate::net::ErrorUnit;
use crate::queue::DEFAULT_QUEUE_PACKETS;

/// 定速链式拓扑配置选项
#[derive(Debug, Clone)]
pub struct PacedChainOpts {
    /// B-C 链路的误码率（按字节）
    pub ber: f64,
    /// 发送端速率
    pub data_rate: String,
    pub message_size: u32,
    pub message_count_limit: u64,
    pub seed: u64,
}

impl Default for PacedChainOpts {
    fn default() -> Self {
        Self {
            ber: 1e-6,
            data_rate: "5Mbps".to_string(),
            message_size: 1040,
            message_count_limit: 1000,
            seed: crate::net::DEFAULT_SEED,
        }
    }
}

/// 批量链式拓扑配置选项
#[derive(Debug, Clone)]
pub struct BulkChainOpts {
    /// 除 B-C 以外各链路的误码率
    pub edge_error_rate: f64,
    /// B-C 链路的误码率
    pub ber: f64,
    pub max_bytes: u64,
    pub seed: u64,
}

impl Default for BulkChainOpts {
    fn default() -> Self {
        Self {
            edge_error_rate: 1e-6,
            ber: 5e-5,
            max_bytes: 1_000_000,
            seed: crate::net::DEFAULT_SEED,
        }
    }
}

fn link(a: &str, b: &str, data_rate: &str, delay: &str, loss: f64) -> LinkSpec {
    LinkSpec {
        a: a.to_string(),
        b: b.to_string(),
        data_rate: data_rate.to_string(),
        delay: delay.to_string(),
        loss_probability: loss,
        error_unit: ErrorUnit::Byte,
        queue_packets: DEFAULT_QUEUE_PACKETS,
    }
}

fn nodes(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// 构建定速链式拓扑
///
/// 拓扑结构：A <-> B <-> C <-> D
/// 接收端 0s 开始监听，发送端 1s 启动、20s 停止。
pub fn paced_chain(opts: &PacedChainOpts) -> ScenarioSpec {
    let (rate, delay) = ("5Mbps", "2ms");
    ScenarioSpec {
        schema_version: SCHEMA_VERSION,
        seed: opts.seed,
        stop_time: "20s".to_string(),
        nodes: nodes(&["A", "B", "C", "D"]),
        links: vec![
            link("A", "B", rate, delay, 1e-6),
            link("B", "C", rate, delay, opts.ber),
            link("C", "D", rate, delay, 1e-6),
        ],
        flows: vec![FlowSpec {
            source: "A".to_string(),
            sink: "D".to_string(),
            port: 8080,
            start_time: "1s".to_string(),
            stop_time: "20s".to_string(),
            sink_start_time: Some("0s".to_string()),
            sink_stop_time: Some("20s".to_string()),
            app: FlowApp::Paced {
                message_size: opts.message_size,
                message_count_limit: Some(opts.message_count_limit),
                data_rate: opts.data_rate.clone(),
            },
        }],
        faults: Vec::new(),
        trace: Some(TraceSpec::default()),
        tcp: None,
    }
}

fn bulk_flow(start: &str, max_bytes: u64) -> FlowSpec {
    FlowSpec {
        source: "A".to_string(),
        sink: "D".to_string(),
        port: 8080,
        start_time: start.to_string(),
        stop_time: "30s".to_string(),
        sink_start_time: Some(start.to_string()),
        sink_stop_time: Some("30s".to_string()),
        app: FlowApp::Bulk {
            max_bytes,
            send_size: 512,
        },
    }
}

/// 构建批量链式拓扑
///
/// 拓扑结构：A <-> B <-> C <-> D
/// 发送端 0s 启动、30s 停止，仿真在 31s 结束。
pub fn bulk_chain(opts: &BulkChainOpts) -> ScenarioSpec {
    let (rate, delay) = ("1Mbps", "10ms");
    ScenarioSpec {
        schema_version: SCHEMA_VERSION,
        seed: opts.seed,
        stop_time: "31s".to_string(),
        nodes: nodes(&["A", "B", "C", "D"]),
        links: vec![
            link("A", "B", rate, delay, opts.edge_error_rate),
            link("B", "C", rate, delay, opts.ber),
            link("C", "D", rate, delay, opts.edge_error_rate),
        ],
        flows: vec![bulk_flow("0s", opts.max_bytes)],
        faults: Vec::new(),
        trace: Some(TraceSpec::default()),
        tcp: None,
    }
}

/// 构建带旁路的链式拓扑
///
/// 拓扑结构：
/// ```text
/// A <-> B <-> C <-> D
///  \               /
///   E <-> F <-> G
/// ```
/// 发送端 1s 启动；2s 时 B-C 断开并重建路由。
pub fn bypass_chain(opts: &BulkChainOpts) -> ScenarioSpec {
    let (rate, delay) = ("1Mbps", "10ms");
    let edge = opts.edge_error_rate;
    ScenarioSpec {
        schema_version: SCHEMA_VERSION,
        seed: opts.seed,
        stop_time: "31s".to_string(),
        nodes: nodes(&["A", "B", "C", "D", "E", "F", "G"]),
        links: vec![
            link("A", "B", rate, delay, edge),
            link("B", "C", rate, delay, opts.ber),
            link("C", "D", rate, delay, edge),
            link("A", "E", rate, delay, edge),
            link("E", "F", rate, delay, edge),
            link("F", "G", rate, delay, edge),
            link("G", "D", rate, delay, edge),
        ],
        flows: vec![bulk_flow("1s", opts.max_bytes)],
        faults: vec![FaultSpec {
            a: "B".to_string(),
            b: "C".to_string(),
            at: "2s".to_string(),
        }],
        trace: Some(TraceSpec::default()),
        tcp: None,
    }
}
