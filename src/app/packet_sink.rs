//! 接收端：在 (node, port) 上监听并统计收到的按序字节数。

use std::any::Any;

use tracing::{info, warn};

use super::{AppId, AppState, AppSummary, Application};
use crate::net::{Network, NodeId};
use crate::proto::tcp::ListenerId;
use crate::sim::Simulator;

#[derive(Debug)]
pub struct PacketSink {
    name: String,
    node: NodeId,
    port: u16,
    listener: Option<ListenerId>,
    state: AppState,
}

impl PacketSink {
    pub fn new(name: impl Into<String>, node: NodeId, port: u16) -> Self {
        Self {
            name: name.into(),
            node,
            port,
            listener: None,
            state: AppState::Idle,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// 收到的按序字节数
    pub fn bytes_received(&self, net: &Network) -> u64 {
        self.listener
            .map(|l| net.tcp.listener_rx_bytes(l))
            .unwrap_or(0)
    }
}

impl Application for PacketSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> AppState {
        self.state
    }

    fn start(&mut self, _id: AppId, sim: &mut Simulator, net: &mut Network) {
        if self.state != AppState::Idle {
            return;
        }
        match net.tcp.listen(self.node, self.port) {
            Ok(l) => {
                self.listener = Some(l);
                self.state = AppState::Running;
                info!(app = %self.name, node = ?self.node, port = self.port, now = ?sim.now(), "👂 接收端开始监听");
            }
            Err(e) => {
                warn!(app = %self.name, error = %e, "监听失败");
                self.state = AppState::Stopped;
            }
        }
    }

    fn stop(&mut self, _id: AppId, sim: &mut Simulator, net: &mut Network) {
        if self.state == AppState::Stopped {
            return;
        }
        if let Some(l) = self.listener {
            net.tcp.close_listener(l);
        }
        self.state = AppState::Stopped;
        info!(
            app = %self.name,
            bytes_received = self.bytes_received(net),
            now = ?sim.now(),
            "⏹️  接收端停止"
        );
    }

    fn summary(&self, net: &Network) -> AppSummary {
        AppSummary {
            name: self.name.clone(),
            kind: "sink",
            state: self.state.as_str(),
            packets_sent: 0,
            bytes_sent: 0,
            bytes_received: self.bytes_received(net),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
