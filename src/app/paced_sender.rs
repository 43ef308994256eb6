//! 定速发送端
//!
//! 在开始时间绑定 socket、连接对端并立即发送第一条消息；之后每次把消息交给传输层，
//! 只要未达到消息数上限，就按 `message_size * 8 / data_rate` 的间隔给自己调度下一次发送。
//! 间隔只由消息大小和速率决定，不参考任何拥塞信号。
//!
//! 发送缓冲区放不下整条消息时该消息被整条丢弃，但仍计入已发送消息数。
//!
//! 停止（外部停止时间或达到上限）时取消尚未触发的发送事件并关闭 socket，
//! 进入 `Stopped` 后不会再发送任何消息。传输层错误（如连接被拒绝）只记录日志并停止，不重试。

use std::any::Any;

use tracing::{debug, info, warn};

use super::{AppId, AppSendTimer, AppState, AppSummary, Application};
use crate::error::{Result, SimError};
use crate::net::{Network, NodeId};
use crate::proto::tcp::SocketId;
use crate::sim::{EventId, SimTime, Simulator};

#[derive(Debug, Clone)]
pub struct PacedSenderConfig {
    /// 每条消息的字节数
    pub message_size: u32,
    /// 消息数上限；`None` 表示不限
    pub message_count_limit: Option<u64>,
    pub data_rate_bps: u64,
}

#[derive(Debug)]
pub struct PacedSender {
    name: String,
    socket: SocketId,
    peer: (NodeId, u16),
    cfg: PacedSenderConfig,
    packets_sent: u64,
    bytes_accepted: u64,
    state: AppState,
    pending_send: Option<EventId>,
    first_send_at: Option<SimTime>,
    last_send_at: Option<SimTime>,
}

impl PacedSender {
    /// `socket` 由调用方预先在源节点上创建（以便在开始前挂上跟踪器）。
    pub fn new(
        name: impl Into<String>,
        socket: SocketId,
        peer: NodeId,
        port: u16,
        cfg: PacedSenderConfig,
    ) -> Self {
        Self {
            name: name.into(),
            socket,
            peer: (peer, port),
            cfg,
            packets_sent: 0,
            bytes_accepted: 0,
            state: AppState::Idle,
            pending_send: None,
            first_send_at: None,
            last_send_at: None,
        }
    }

    pub fn socket(&self) -> SocketId {
        self.socket
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn is_running(&self) -> bool {
        self.state == AppState::Running
    }

    pub fn pending_send_event(&self) -> Option<EventId> {
        self.pending_send
    }

    pub fn first_send_at(&self) -> Option<SimTime> {
        self.first_send_at
    }

    pub fn last_send_at(&self) -> Option<SimTime> {
        self.last_send_at
    }

    /// 两次发送之间的间隔，至少 1ns，保证时间向前推进
    pub fn send_interval(&self) -> SimTime {
        SimTime::for_bytes_at_rate(self.cfg.message_size as u64, self.cfg.data_rate_bps)
            .max(SimTime(1))
    }

    fn limit_reached(&self) -> bool {
        self.cfg
            .message_count_limit
            .is_some_and(|limit| self.packets_sent >= limit)
    }

    /// 把一条消息交给传输层；只能在 `Running` 状态下调用。
    pub fn send_message(&mut self, id: AppId, sim: &mut Simulator, net: &mut Network) -> Result<()> {
        if self.state != AppState::Running {
            return Err(SimError::SourceNotRunning {
                app: self.name.clone(),
                state: self.state.as_str(),
            });
        }
        let (socket, size) = (self.socket, self.cfg.message_size as u64);
        // 缓冲区放不下整条消息时整条拒绝，消息仍计入已发送
        let accepted = if net.tcp.tx_available(socket)? < size {
            debug!(app = %self.name, size, "发送缓冲区不足，消息被丢弃");
            0
        } else {
            net.with_tcp(|tcp, net| tcp.send(socket, size, sim, net))?
        };
        self.packets_sent += 1;
        self.bytes_accepted += accepted;
        self.first_send_at.get_or_insert(sim.now());
        self.last_send_at = Some(sim.now());

        if self.limit_reached() {
            info!(app = %self.name, packets_sent = self.packets_sent, "达到消息数上限");
            self.finish(sim, net);
        } else {
            self.pending_send = Some(sim.schedule_in(self.send_interval(), AppSendTimer { app: id }));
        }
        Ok(())
    }

    /// 进入 `Stopped`：取消挂起的发送并关闭 socket。
    fn finish(&mut self, sim: &mut Simulator, net: &mut Network) {
        if let Some(ev) = self.pending_send.take() {
            sim.cancel(ev);
        }
        if let Err(e) = net.tcp.close(self.socket, sim) {
            warn!(app = %self.name, error = %e, "关闭 socket 失败");
        }
        self.state = AppState::Stopped;
        info!(app = %self.name, packets_sent = self.packets_sent, now = ?sim.now(), "⏹️  定速发送端停止");
    }

    fn fail(&mut self, err: SimError, sim: &mut Simulator, net: &mut Network) {
        warn!(app = %self.name, error = %err, "传输层错误，发送端停止");
        self.finish(sim, net);
    }
}

impl Application for PacedSender {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> AppState {
        self.state
    }

    fn start(&mut self, id: AppId, sim: &mut Simulator, net: &mut Network) {
        if self.state != AppState::Idle {
            warn!(app = %self.name, state = self.state.as_str(), "重复启动，忽略");
            return;
        }
        let (peer, port) = self.peer;
        let opened = net
            .tcp
            .bind(self.socket)
            .and_then(|_| net.tcp.connect(self.socket, peer, port));
        if let Err(e) = opened {
            self.fail(e, sim, net);
            return;
        }
        self.state = AppState::Running;
        info!(app = %self.name, now = ?sim.now(), interval = ?self.send_interval(), "▶️  定速发送端启动");

        if let Err(e) = self.send_message(id, sim, net) {
            self.fail(e, sim, net);
        }
    }

    fn stop(&mut self, _id: AppId, sim: &mut Simulator, net: &mut Network) {
        match self.state {
            AppState::Idle | AppState::Running => self.finish(sim, net),
            AppState::Stopped => {}
        }
    }

    fn on_send_timer(&mut self, id: AppId, sim: &mut Simulator, net: &mut Network) {
        self.pending_send = None;
        if self.state != AppState::Running {
            return;
        }
        if let Err(e) = self.send_message(id, sim, net) {
            self.fail(e, sim, net);
        }
    }

    fn summary(&self, _net: &Network) -> AppSummary {
        AppSummary {
            name: self.name.clone(),
            kind: "paced",
            state: self.state.as_str(),
            packets_sent: self.packets_sent,
            bytes_sent: self.bytes_accepted,
            bytes_received: 0,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
