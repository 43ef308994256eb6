//! 场景描述文件
//!
//! JSON 格式的声明式场景：节点、链路、流、故障计划、拥塞跟踪与 TCP 参数覆盖。
//! 时间与速率沿用 ns-3 属性字符串写法（`"2ms"`、`"5Mbps"`）。
//! 所有检查都在 [`ScenarioSpec::validate`] 中完成，调度器启动之前就拒绝错误配置。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::net::ErrorUnit;
use crate::proto::tcp::TcpConfig;
use crate::queue::DEFAULT_QUEUE_PACKETS;
use crate::sim::SimTime;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub schema_version: u32,
    /// 丢包采样种子
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// 全局截止时间
    pub stop_time: String,
    pub nodes: Vec<String>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub flows: Vec<FlowSpec>,
    #[serde(default)]
    pub faults: Vec<FaultSpec>,
    #[serde(default)]
    pub trace: Option<TraceSpec>,
    #[serde(default)]
    pub tcp: Option<TcpSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    pub a: String,
    pub b: String,
    #[serde(default = "default_data_rate")]
    pub data_rate: String,
    #[serde(default = "default_delay")]
    pub delay: String,
    #[serde(default)]
    pub loss_probability: f64,
    #[serde(default)]
    pub error_unit: ErrorUnit,
    #[serde(default = "default_queue_packets")]
    pub queue_packets: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    pub source: String,
    pub sink: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub start_time: String,
    pub stop_time: String,
    /// 接收端开始监听的时间，缺省为 0
    #[serde(default)]
    pub sink_start_time: Option<String>,
    /// 接收端停止时间，缺省与发送端相同
    #[serde(default)]
    pub sink_stop_time: Option<String>,
    pub app: FlowApp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowApp {
    Paced {
        message_size: u32,
        #[serde(default)]
        message_count_limit: Option<u64>,
        data_rate: String,
    },
    Bulk {
        /// 0 表示不限
        #[serde(default)]
        max_bytes: u64,
        #[serde(default = "default_send_size")]
        send_size: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultSpec {
    pub a: String,
    pub b: String,
    pub at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceSpec {
    /// 被跟踪流在 `flows` 中的下标
    #[serde(default)]
    pub flow: usize,
    #[serde(default)]
    pub cwnd_path: Option<PathBuf>,
    #[serde(default)]
    pub ssthresh_path: Option<PathBuf>,
    #[serde(default)]
    pub combined_path: Option<PathBuf>,
}

/// TCP 参数覆盖，未给出的字段保持默认值。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TcpSpec {
    #[serde(default)]
    pub segment_size: Option<u32>,
    #[serde(default)]
    pub initial_cwnd_segments: Option<u32>,
    #[serde(default)]
    pub initial_ssthresh: Option<u32>,
    #[serde(default)]
    pub tx_buffer_bytes: Option<u64>,
    #[serde(default)]
    pub init_rto: Option<String>,
    #[serde(default)]
    pub min_rto: Option<String>,
}

fn default_seed() -> u64 {
    crate::net::DEFAULT_SEED
}
fn default_data_rate() -> String {
    "5Mbps".to_string()
}
fn default_delay() -> String {
    "2ms".to_string()
}
fn default_queue_packets() -> u32 {
    DEFAULT_QUEUE_PACKETS
}
fn default_port() -> u16 {
    8080
}
fn default_send_size() -> u32 {
    512
}

/// 解析时间字符串：`"1.5s"`、`"2ms"`、`"10us"`、`"100ns"`，不带单位按秒处理。
pub fn parse_time(s: &str) -> Result<SimTime> {
    let err = || SimError::Parse {
        what: "time",
        value: s.to_string(),
    };
    let (num, unit) = split_unit(s);
    let value: f64 = num.parse().map_err(|_| err())?;
    let scale = match unit {
        "" | "s" => 1.0,
        "ms" => 1e-3,
        "us" => 1e-6,
        "ns" => 1e-9,
        "min" => 60.0,
        "h" => 3600.0,
        _ => return Err(err()),
    };
    SimTime::from_secs_f64(value * scale).ok_or_else(err)
}

/// 解析速率字符串，返回 bit/s：`"5Mbps"`、`"100kbps"`、`"1Gbps"`、`"125kBps"`（字节每秒）。
pub fn parse_data_rate(s: &str) -> Result<u64> {
    let err = || SimError::Parse {
        what: "data rate",
        value: s.to_string(),
    };
    let (num, unit) = split_unit(s);
    let value: f64 = num.parse().map_err(|_| err())?;
    let scale = match unit {
        "" | "bps" | "b/s" => 1.0,
        "kbps" | "Kbps" | "kb/s" => 1e3,
        "Mbps" | "mbps" | "Mb/s" => 1e6,
        "Gbps" | "gbps" | "Gb/s" => 1e9,
        "Bps" | "B/s" => 8.0,
        "kBps" | "KBps" | "kB/s" => 8e3,
        "MBps" | "MB/s" => 8e6,
        "GBps" | "GB/s" => 8e9,
        _ => return Err(err()),
    };
    let bps = (value * scale).round();
    if !bps.is_finite() || bps <= 0.0 || bps >= u64::MAX as f64 {
        return Err(err());
    }
    Ok(bps as u64)
}

/// 拆分数字与单位。科学计数法中的 `e`/`E` 属于数字部分（`"1e6bps"`）。
fn split_unit(s: &str) -> (&str, &str) {
    let s = s.trim();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_digit() || c == b'.' || ((c == b'+' || c == b'-') && i == 0) {
            i += 1;
        } else if (c == b'e' || c == b'E') && is_exponent(&s[i + 1..]) {
            i += 2;
        } else {
            break;
        }
    }
    (&s[..i], s[i..].trim())
}

fn is_exponent(rest: &str) -> bool {
    let rest = rest.strip_prefix(['+', '-']).unwrap_or(rest);
    rest.starts_with(|c: char| c.is_ascii_digit())
}

impl ScenarioSpec {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn stop(&self) -> Result<SimTime> {
        parse_time(&self.stop_time)
    }

    /// 合并 TCP 参数覆盖
    pub fn tcp_config(&self) -> Result<TcpConfig> {
        let mut cfg = TcpConfig::default();
        let Some(t) = &self.tcp else {
            return Ok(cfg);
        };
        if let Some(v) = t.segment_size {
            cfg.segment_size = v;
        }
        if let Some(v) = t.initial_cwnd_segments {
            cfg.initial_cwnd_segments = v;
        }
        if let Some(v) = t.initial_ssthresh {
            cfg.initial_ssthresh = v;
        }
        if let Some(v) = t.tx_buffer_bytes {
            cfg.tx_buffer_bytes = v;
        }
        if let Some(v) = &t.init_rto {
            cfg.init_rto = parse_time(v)?;
        }
        if let Some(v) = &t.min_rto {
            cfg.min_rto = parse_time(v)?;
        }
        Ok(cfg)
    }

    fn check_node(&self, names: &HashSet<&str>, name: &str) -> Result<()> {
        if names.contains(name) {
            Ok(())
        } else {
            Err(SimError::UnknownNodeName(name.to_string()))
        }
    }

    /// 校验整个场景；任何错误都在仿真开始前返回。
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(SimError::Config(format!(
                "unsupported schema_version {} (expected {SCHEMA_VERSION})",
                self.schema_version
            )));
        }
        if self.nodes.is_empty() {
            return Err(SimError::Config("scenario has no nodes".to_string()));
        }
        let stop = self.stop()?;
        if stop == SimTime::ZERO {
            return Err(SimError::Config("stop_time must be positive".to_string()));
        }

        let mut names = HashSet::new();
        for n in &self.nodes {
            if !names.insert(n.as_str()) {
                return Err(SimError::Config(format!("duplicate node name {n:?}")));
            }
        }

        let mut pairs = HashSet::new();
        for l in &self.links {
            self.check_node(&names, &l.a)?;
            self.check_node(&names, &l.b)?;
            if l.a == l.b {
                return Err(SimError::Config(format!("self link on node {:?}", l.a)));
            }
            let key = if l.a < l.b {
                (l.a.as_str(), l.b.as_str())
            } else {
                (l.b.as_str(), l.a.as_str())
            };
            if !pairs.insert(key) {
                return Err(SimError::Config(format!(
                    "duplicate link between {:?} and {:?}",
                    l.a, l.b
                )));
            }
            if !(0.0..=1.0).contains(&l.loss_probability) {
                return Err(SimError::InvalidLossProbability(l.loss_probability));
            }
            parse_data_rate(&l.data_rate)?;
            parse_time(&l.delay)?;
            if l.queue_packets == 0 {
                return Err(SimError::Config(format!(
                    "link {:?}-{:?} has an empty queue",
                    l.a, l.b
                )));
            }
        }

        for (i, f) in self.flows.iter().enumerate() {
            self.check_node(&names, &f.source)?;
            self.check_node(&names, &f.sink)?;
            if f.source == f.sink {
                return Err(SimError::Config(format!("flow {i}: source equals sink")));
            }
            let start = parse_time(&f.start_time)?;
            let end = parse_time(&f.stop_time)?;
            if end <= start {
                return Err(SimError::Config(format!(
                    "flow {i}: stop_time must be after start_time"
                )));
            }
            if let Some(t) = &f.sink_start_time {
                parse_time(t)?;
            }
            if let Some(t) = &f.sink_stop_time {
                parse_time(t)?;
            }
            match &f.app {
                FlowApp::Paced {
                    message_size,
                    data_rate,
                    ..
                } => {
                    if *message_size == 0 {
                        return Err(SimError::Config(format!("flow {i}: message_size is zero")));
                    }
                    let rate = parse_data_rate(data_rate)?;
                    if SimTime::for_bytes_at_rate(*message_size as u64, rate) == SimTime::ZERO {
                        return Err(SimError::Config(format!(
                            "flow {i}: {message_size} B at {data_rate} gives a zero send interval"
                        )));
                    }
                }
                FlowApp::Bulk { send_size, .. } => {
                    if *send_size == 0 {
                        return Err(SimError::Config(format!("flow {i}: send_size is zero")));
                    }
                }
            }
        }

        for f in &self.faults {
            self.check_node(&names, &f.a)?;
            self.check_node(&names, &f.b)?;
            let key = if f.a < f.b {
                (f.a.as_str(), f.b.as_str())
            } else {
                (f.b.as_str(), f.a.as_str())
            };
            if !pairs.contains(&key) {
                return Err(SimError::Config(format!(
                    "fault on missing link {:?}-{:?}",
                    f.a, f.b
                )));
            }
            parse_time(&f.at)?;
        }

        if let Some(t) = &self.trace {
            if t.flow >= self.flows.len() {
                return Err(SimError::Config(format!(
                    "trace refers to flow {} but only {} flows exist",
                    t.flow,
                    self.flows.len()
                )));
            }
        }

        self.tcp_config()?;
        Ok(())
    }
}
