//! 仿真时间类型
//!
//! 定义仿真时间及其单位转换。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 仿真时间（纳秒）。既用作时刻，也用作非负时长。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);
    pub const MAX: SimTime = SimTime(u64::MAX);

    pub fn from_nanos(ns: u64) -> SimTime {
        SimTime(ns)
    }
    pub fn from_micros(us: u64) -> SimTime {
        SimTime(us.saturating_mul(1_000))
    }
    pub fn from_millis(ms: u64) -> SimTime {
        SimTime(ms.saturating_mul(1_000_000))
    }
    pub fn from_secs(s: u64) -> SimTime {
        SimTime(s.saturating_mul(1_000_000_000))
    }

    /// 浮点秒转换为纳秒（四舍五入）。负数或 NaN 返回 `None`。
    pub fn from_secs_f64(s: f64) -> Option<SimTime> {
        if !s.is_finite() || s < 0.0 {
            return None;
        }
        let ns = (s * 1e9).round();
        if ns >= u64::MAX as f64 {
            return Some(SimTime::MAX);
        }
        Some(SimTime(ns as u64))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    pub fn saturating_add(self, d: SimTime) -> SimTime {
        SimTime(self.0.saturating_add(d.0))
    }

    pub fn saturating_sub(self, d: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(d.0))
    }

    /// 以 `bits_per_sec` 速率发送 `bytes` 字节所需时间，四舍五入到纳秒。
    pub fn for_bytes_at_rate(bytes: u64, bits_per_sec: u64) -> SimTime {
        if bits_per_sec == 0 {
            return SimTime(u64::MAX / 4);
        }
        let bits = (bytes as u128).saturating_mul(8);
        let rate = bits_per_sec as u128;
        let nanos = (bits.saturating_mul(1_000_000_000u128) + rate / 2) / rate;
        SimTime(nanos.min(u64::MAX as u128) as u64)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}s", self.as_secs_f64())
    }
}
