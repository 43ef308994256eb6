//! 批量发送端
//!
//! 尽可能快地把数据塞进发送缓冲区：每次写 `send_size` 字节，直到缓冲区满，
//! 之后等传输层的“有空间”通知再继续。写满 `max_bytes` 后关闭 socket；`max_bytes == 0` 表示不限。

use std::any::Any;

use tracing::{debug, info, warn};

use super::{AppId, AppSendSpace, AppState, AppSummary, Application};
use crate::error::SimError;
use crate::net::{Network, NodeId};
use crate::proto::tcp::SocketId;
use crate::sim::{SimTime, Simulator};

#[derive(Debug)]
pub struct BulkSender {
    name: String,
    socket: SocketId,
    peer: (NodeId, u16),
    max_bytes: u64,
    send_size: u32,
    total_bytes: u64,
    writes: u64,
    state: AppState,
}

impl BulkSender {
    pub fn new(
        name: impl Into<String>,
        socket: SocketId,
        peer: NodeId,
        port: u16,
        max_bytes: u64,
        send_size: u32,
    ) -> Self {
        Self {
            name: name.into(),
            socket,
            peer: (peer, port),
            max_bytes,
            send_size: send_size.max(1),
            total_bytes: 0,
            writes: 0,
            state: AppState::Idle,
        }
    }

    pub fn socket(&self) -> SocketId {
        self.socket
    }

    /// 已被传输层接受的字节数
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn remaining(&self) -> Option<u64> {
        (self.max_bytes > 0).then(|| self.max_bytes.saturating_sub(self.total_bytes))
    }

    fn send_data(&mut self, sim: &mut Simulator, net: &mut Network) {
        while self.state == AppState::Running {
            let want = match self.remaining() {
                Some(0) => {
                    info!(app = %self.name, total_bytes = self.total_bytes, "数据已全部写入");
                    self.finish(sim, net);
                    return;
                }
                Some(rest) => rest.min(self.send_size as u64),
                None => self.send_size as u64,
            };
            let socket = self.socket;
            let accepted = match net.with_tcp(|tcp, net| tcp.send(socket, want, sim, net)) {
                Ok(n) => n,
                Err(e) => {
                    self.fail(e, sim, net);
                    return;
                }
            };
            self.total_bytes += accepted;
            if accepted > 0 {
                self.writes += 1;
            }
            if accepted < want {
                debug!(app = %self.name, total_bytes = self.total_bytes, "发送缓冲区已满，等待空间");
                if self.remaining() == Some(0) {
                    continue;
                }
                return;
            }
        }
    }

    fn finish(&mut self, sim: &mut Simulator, net: &mut Network) {
        if let Err(e) = net.tcp.close(self.socket, sim) {
            warn!(app = %self.name, error = %e, "关闭 socket 失败");
        }
        self.state = AppState::Stopped;
        info!(app = %self.name, total_bytes = self.total_bytes, now = ?sim.now(), "⏹️  批量发送端停止");
    }

    fn fail(&mut self, err: SimError, sim: &mut Simulator, net: &mut Network) {
        warn!(app = %self.name, error = %err, "传输层错误，发送端停止");
        self.finish(sim, net);
    }
}

impl Application for BulkSender {
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
        let socket = self.socket;
        let opened = net
            .tcp
            .bind(socket)
            .and_then(|_| net.tcp.connect(socket, peer, port))
            .and_then(|_| {
                net.tcp.set_send_callback(
                    socket,
                    Box::new(move |_: SocketId, _: u64, sim: &mut Simulator| {
                        sim.schedule_in(SimTime::ZERO, AppSendSpace { app: id });
                    }),
                )
            });
        if let Err(e) = opened {
            self.fail(e, sim, net);
            return;
        }
        self.state = AppState::Running;
        info!(app = %self.name, now = ?sim.now(), max_bytes = self.max_bytes, "▶️  批量发送端启动");
        self.send_data(sim, net);
    }

    fn stop(&mut self, _id: AppId, sim: &mut Simulator, net: &mut Network) {
        if self.state != AppState::Stopped {
            self.finish(sim, net);
        }
    }

    fn on_send_space(&mut self, _id: AppId, sim: &mut Simulator, net: &mut Network) {
        self.send_data(sim, net);
    }

    fn summary(&self, _net: &Network) -> AppSummary {
        AppSummary {
            name: self.name.clone(),
            kind: "bulk",
            state: self.state.as_str(),
            packets_sent: self.writes,
            bytes_sent: self.total_bytes,
            bytes_received: 0,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
