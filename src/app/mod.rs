//! 应用层
//!
//! 安装在节点上的应用（定速发送端、批量发送端、接收端）共享同一个生命周期接口：
//! `Idle → Running → Stopped`，由 [`AppStart`] / [`AppStop`] 事件驱动，
//! 发送端通过调度器给自己安排后续发送。

mod bulk_sender;
mod paced_sender;
mod packet_sink;

use std::any::Any;

use serde::Serialize;
use tracing::{error, warn};

use crate::error::Result;
use crate::net::{NetWorld, Network};
use crate::sim::{Event, SimTime, Simulator, World};

pub use bulk_sender::BulkSender;
pub use paced_sender::{PacedSender, PacedSenderConfig};
pub use packet_sink::PacketSink;

/// 应用标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppId(pub usize);

/// 应用生命周期状态，`Stopped` 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Idle,
    Running,
    Stopped,
}

impl AppState {
    pub fn as_str(self) -> &'static str {
        match self {
            AppState::Idle => "idle",
            AppState::Running => "running",
            AppState::Stopped => "stopped",
        }
    }
}

/// 应用结束时的摘要
#[derive(Debug, Clone, Serialize)]
pub struct AppSummary {
    pub name: String,
    pub kind: &'static str,
    pub state: &'static str,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// 应用接口
pub trait Application: Send + Any {
    fn name(&self) -> &str;

    fn state(&self) -> AppState;

    /// 到达开始时间
    fn start(&mut self, id: AppId, sim: &mut Simulator, net: &mut Network);

    /// 到达停止时间或运行结束
    fn stop(&mut self, id: AppId, sim: &mut Simulator, net: &mut Network);

    /// 自调度的发送定时器到期
    fn on_send_timer(&mut self, _id: AppId, _sim: &mut Simulator, _net: &mut Network) {}

    /// 传输层发送缓冲区重新有空间
    fn on_send_space(&mut self, _id: AppId, _sim: &mut Simulator, _net: &mut Network) {}

    fn summary(&self, net: &Network) -> AppSummary;

    fn as_any(&self) -> &dyn Any;
}

/// 已安装的应用集合
#[derive(Default)]
pub struct Applications {
    slots: Vec<Option<Box<dyn Application>>>,
}

impl Applications {
    pub fn install(&mut self, app: Box<dyn Application>) -> AppId {
        let id = AppId(self.slots.len());
        self.slots.push(Some(app));
        id
    }

    /// 按开始/停止时间调度生命周期事件
    pub fn schedule_lifecycle(
        &self,
        id: AppId,
        start: SimTime,
        stop: SimTime,
        sim: &mut Simulator,
    ) -> Result<()> {
        sim.schedule_at(start, AppStart { app: id })?;
        sim.schedule_at(stop, AppStop { app: id })?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 按具体类型访问应用
    pub fn get<T: Application>(&self, id: AppId) -> Option<&T> {
        self.slots
            .get(id.0)?
            .as_deref()
            .and_then(|a| a.as_any().downcast_ref::<T>())
    }

    pub fn summaries(&self, net: &Network) -> Vec<AppSummary> {
        self.slots
            .iter()
            .flatten()
            .map(|a| a.summary(net))
            .collect()
    }

    /// 停止所有仍在运行的应用（仿真结束时调用）
    pub fn stop_all(&mut self, sim: &mut Simulator, net: &mut Network) {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if let Some(app) = slot {
                if app.state() != AppState::Stopped {
                    app.stop(AppId(idx), sim, net);
                }
            }
        }
    }

    fn take(&mut self, id: AppId) -> Option<Box<dyn Application>> {
        self.slots.get_mut(id.0)?.take()
    }

    fn restore(&mut self, id: AppId, app: Box<dyn Application>) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            *slot = Some(app);
        }
    }
}

/// 暂时把应用取出来，避免 `&mut world.apps` 与 `&mut world.net` 的重叠借用。
fn dispatch<F>(world: &mut dyn World, sim: &mut Simulator, id: AppId, f: F)
where
    F: FnOnce(&mut dyn Application, &mut Simulator, &mut Network),
{
    let Some(w) = world.as_any_mut().downcast_mut::<NetWorld>() else {
        error!("world must be NetWorld");
        return;
    };
    let Some(mut app) = w.apps.take(id) else {
        warn!(app = ?id, "应用不存在");
        return;
    };
    f(app.as_mut(), sim, &mut w.net);
    w.apps.restore(id, app);
}

/// 事件：应用到达开始时间
#[derive(Debug)]
pub struct AppStart {
    pub app: AppId,
}

impl Event for AppStart {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let id = self.app;
        dispatch(world, sim, id, |app, sim, net| app.start(id, sim, net));
    }
}

/// 事件：应用到达停止时间
#[derive(Debug)]
pub struct AppStop {
    pub app: AppId,
}

impl Event for AppStop {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let id = self.app;
        dispatch(world, sim, id, |app, sim, net| app.stop(id, sim, net));
    }
}

/// 事件：发送端自调度的下一次发送
#[derive(Debug)]
pub struct AppSendTimer {
    pub app: AppId,
}

impl Event for AppSendTimer {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let id = self.app;
        dispatch(world, sim, id, |app, sim, net| app.on_send_timer(id, sim, net));
    }
}

/// 事件：发送缓冲区有空间
#[derive(Debug)]
pub struct AppSendSpace {
    pub app: AppId,
}

impl Event for AppSendSpace {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let id = self.app;
        dispatch(world, sim, id, |app, sim, net| app.on_send_space(id, sim, net));
    }
}
