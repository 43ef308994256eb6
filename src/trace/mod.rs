//! 拥塞状态跟踪
//!
//! 订阅某个 TCP socket 的 `cwnd` 与 `ssthresh` 变化，把两个独立变化的信号合并成一条按时间排序的序列：
//! 任一信号变化时，立即以当前仿真时间输出一条同时带有两个“最新已知值”的样本，
//! 另一个信号若未变化则沿用旧值。
//!
//! 输出为制表符分隔的文本行：`cwnd` 文件写 `t\tcwnd`，`ssthresh` 文件写 `t\tssthresh`，
//! 可选的合并文件写 `t\tcwnd\tssthresh`。时间按 `%g` 格式输出（见 [`format_seconds`]）。

mod format;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SimError};
use crate::proto::tcp::{SocketId, TcpStack};
use crate::sim::SimTime;

pub use format::format_seconds;

/// 一条合并后的拥塞样本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CongestionSample {
    pub at: SimTime,
    pub cwnd: u32,
    pub ssthresh: u32,
}

type Sink = Box<dyn Write + Send>;

/// 样本输出目标，均可缺省。
#[derive(Default)]
pub struct TraceSinks {
    cwnd: Option<Sink>,
    ssthresh: Option<Sink>,
    combined: Option<Sink>,
}

impl TraceSinks {
    pub fn none() -> Self {
        Self::default()
    }

    /// 按路径创建文件输出
    pub fn create(
        cwnd: Option<&Path>,
        ssthresh: Option<&Path>,
        combined: Option<&Path>,
    ) -> Result<Self> {
        fn open(p: Option<&Path>) -> Result<Option<Sink>> {
            match p {
                Some(p) => {
                    let f = File::create(p)?;
                    Ok(Some(Box::new(BufWriter::new(f))))
                }
                None => Ok(None),
            }
        }
        Ok(Self {
            cwnd: open(cwnd)?,
            ssthresh: open(ssthresh)?,
            combined: open(combined)?,
        })
    }

    pub fn with_cwnd(mut self, w: impl Write + Send + 'static) -> Self {
        self.cwnd = Some(Box::new(w));
        self
    }

    pub fn with_ssthresh(mut self, w: impl Write + Send + 'static) -> Self {
        self.ssthresh = Some(Box::new(w));
        self
    }

    pub fn with_combined(mut self, w: impl Write + Send + 'static) -> Self {
        self.combined = Some(Box::new(w));
        self
    }

    fn write(&mut self, s: &CongestionSample) -> io::Result<()> {
        let t = format_seconds(s.at.as_secs_f64());
        if let Some(w) = self.cwnd.as_mut() {
            writeln!(w, "{t}\t{}", s.cwnd)?;
        }
        if let Some(w) = self.ssthresh.as_mut() {
            writeln!(w, "{t}\t{}", s.ssthresh)?;
        }
        if let Some(w) = self.combined.as_mut() {
            writeln!(w, "{t}\t{}\t{}", s.cwnd, s.ssthresh)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        for w in [&mut self.cwnd, &mut self.ssthresh, &mut self.combined]
            .into_iter()
            .flatten()
        {
            w.flush()?;
        }
        Ok(())
    }
}

/// 拥塞状态跟踪器，持有两个信号的最新已知值和全部样本。
pub struct CongestionTracer {
    cwnd: u32,
    ssthresh: u32,
    samples: Vec<CongestionSample>,
    sinks: TraceSinks,
    io_error: Option<io::Error>,
}

/// 跟踪回调挂在 socket 上，跟踪器本身由运行驱动和回调共享。
pub type SharedTracer = Arc<Mutex<CongestionTracer>>;

impl CongestionTracer {
    pub fn new(initial_cwnd: u32, initial_ssthresh: u32, sinks: TraceSinks) -> Self {
        Self {
            cwnd: initial_cwnd,
            ssthresh: initial_ssthresh,
            samples: Vec::new(),
            sinks,
            io_error: None,
        }
    }

    pub fn shared(self) -> SharedTracer {
        Arc::new(Mutex::new(self))
    }

    pub fn last_cwnd(&self) -> u32 {
        self.cwnd
    }

    pub fn last_ssthresh(&self) -> u32 {
        self.ssthresh
    }

    pub fn samples(&self) -> &[CongestionSample] {
        &self.samples
    }

    /// 用 socket 的当前值覆盖最新已知值（挂接时调用）。
    pub fn seed(&mut self, cwnd: u32, ssthresh: u32) {
        self.cwnd = cwnd;
        self.ssthresh = ssthresh;
    }

    pub fn on_cwnd_change(&mut self, now: SimTime, old: u32, new: u32) {
        debug!(now = %format_seconds(now.as_secs_f64()), old, new, "cwnd 变化");
        self.cwnd = new;
        self.emit(now);
    }

    pub fn on_ssthresh_change(&mut self, now: SimTime, old: u32, new: u32) {
        debug!(now = %format_seconds(now.as_secs_f64()), old, new, "ssthresh 变化");
        self.ssthresh = new;
        self.emit(now);
    }

    fn emit(&mut self, at: SimTime) {
        let sample = CongestionSample {
            at,
            cwnd: self.cwnd,
            ssthresh: self.ssthresh,
        };
        if let Some(last) = self.samples.last() {
            debug_assert!(last.at <= at, "samples must be time ordered");
        }
        self.samples.push(sample);
        if self.io_error.is_some() {
            return;
        }
        if let Err(e) = self.sinks.write(&sample) {
            warn!(error = %e, "写入跟踪文件失败，后续样本只保留在内存中");
            self.io_error = Some(e);
        }
    }

    /// 刷新所有输出；返回运行期间遇到的第一个 I/O 错误。
    pub fn finish(&mut self) -> Result<()> {
        if let Some(e) = self.io_error.take() {
            return Err(SimError::Io(e));
        }
        self.sinks.flush()?;
        Ok(())
    }
}

fn lock(t: &SharedTracer) -> MutexGuard<'_, CongestionTracer> {
    t.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 把跟踪器挂到 socket 上：以 socket 当前的 cwnd/ssthresh 作为初始已知值，并订阅两者的变化。
pub fn attach(tracer: &SharedTracer, tcp: &mut TcpStack, socket: SocketId) -> Result<()> {
    let sock = tcp.socket(socket).ok_or(SimError::UnknownSocket(socket))?;
    lock(tracer).seed(sock.cwnd(), sock.ssthresh());

    let t = Arc::clone(tracer);
    tcp.trace_cwnd(
        socket,
        Box::new(move |now: SimTime, old: u32, new: u32| lock(&t).on_cwnd_change(now, old, new)),
    )?;
    let t = Arc::clone(tracer);
    tcp.trace_ssthresh(
        socket,
        Box::new(move |now: SimTime, old: u32, new: u32| lock(&t).on_ssthresh_change(now, old, new)),
    )?;
    Ok(())
}

/// 读取共享跟踪器中的样本副本
pub fn snapshot(tracer: &SharedTracer) -> Vec<CongestionSample> {
    lock(tracer).samples().to_vec()
}

/// 刷新共享跟踪器的输出
pub fn finish(tracer: &SharedTracer) -> Result<()> {
    lock(tracer).finish()
}
