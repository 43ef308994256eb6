//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与事件队列。

use super::event::{Event, EventId, FnEvent};
use super::scheduled_event::ScheduledEvent;
use super::time::SimTime;
use super::world::World;
use crate::error::{Result, SimError};
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, info, trace};

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    q: BinaryHeap<ScheduledEvent>,
    /// 仍在队列中且未被取消的事件。
    pending: HashSet<EventId>,
    executed: u64,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 已执行的事件总数
    pub fn events_executed(&self) -> u64 {
        self.executed
    }

    /// 队列中尚未触发、未被取消的事件数
    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains(&id)
    }

    /// 在 `delay` 之后调度事件。时长无符号，不会落在过去。
    #[tracing::instrument(skip(self, ev), fields(event_type = std::any::type_name::<E>()))]
    pub fn schedule_in<E: Event>(&mut self, delay: SimTime, ev: E) -> EventId {
        let at = self.now.saturating_add(delay);
        self.push(at, Box::new(ev))
    }

    /// 调度事件在指定时刻执行；早于当前时间属于调用方契约错误。
    #[tracing::instrument(skip(self, ev), fields(event_type = std::any::type_name::<E>()))]
    pub fn schedule_at<E: Event>(&mut self, at: SimTime, ev: E) -> Result<EventId> {
        if at < self.now {
            return Err(SimError::ScheduleInPast { at, now: self.now });
        }
        Ok(self.push(at, Box::new(ev)))
    }

    /// 以浮点秒给出延迟；负数或非有限值会被报告而不是截断。
    pub fn schedule_in_secs<E: Event>(&mut self, delay_secs: f64, ev: E) -> Result<EventId> {
        let delay =
            SimTime::from_secs_f64(delay_secs).ok_or(SimError::NegativeDelay(delay_secs))?;
        Ok(self.schedule_in(delay, ev))
    }

    /// 调度一个闭包
    pub fn schedule_fn<F>(&mut self, delay: SimTime, f: F) -> EventId
    where
        F: FnOnce(&mut Simulator, &mut dyn World) + Send + 'static,
    {
        self.schedule_in(delay, FnEvent(f))
    }

    fn push(&mut self, at: SimTime, ev: Box<dyn Event>) -> EventId {
        let id = EventId(self.next_seq);
        trace!(now = ?self.now, seq = id.0, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(ScheduledEvent { at, id, ev });
        self.pending.insert(id);

        debug!(queue_size = self.q.len(), "事件已加入队列");
        id
    }

    /// 取消尚未触发的事件。已触发、已取消或未知的句柄返回 `false`，不视为错误。
    pub fn cancel(&mut self, id: EventId) -> bool {
        let removed = self.pending.remove(&id);
        trace!(seq = id.0, removed, "取消事件");
        removed
    }

    fn pop_live(&mut self, until: Option<SimTime>) -> Option<ScheduledEvent> {
        while let Some(top) = self.q.peek() {
            if until.is_some_and(|u| top.at > u) {
                return None;
            }
            let item = self.q.pop()?;
            if self.pending.remove(&item.id) {
                return Some(item);
            }
            trace!(seq = item.id.0, "跳过已取消事件");
        }
        None
    }

    /// 执行所有 `at <= until` 的事件（包括执行期间新调度的），然后把时间推进到 `until`。
    /// 晚于 `until` 的事件保留在队列中，由 [`Simulator::shutdown`] 丢弃。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) {
        while let Some(item) = self.pop_live(Some(until)) {
            self.now = item.at;
            self.executed += 1;
            item.ev.execute(self, world);
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!("▶️  开始运行仿真");
        debug!(now = ?self.now, queue_size = self.q.len(), "初始状态");

        let mut event_count = 0;
        while let Some(item) = self.pop_live(None) {
            event_count += 1;
            self.executed += 1;
            self.now = item.at;

            debug!(
                event_num = event_count,
                now = ?self.now,
                seq = item.id.0,
                remaining_queue = self.q.len(),
                "执行事件"
            );

            item.ev.execute(self, world);
        }

        info!(
            total_events = event_count,
            final_time = ?self.now,
            "✅ 仿真完成"
        );
    }

    /// 会话结束：丢弃所有剩余事件，返回被丢弃的（未取消）事件数。
    pub fn shutdown(&mut self) -> usize {
        let discarded = self.pending.len();
        self.q.clear();
        self.pending.clear();
        info!(discarded, now = ?self.now, "🛑 仿真结束，丢弃剩余事件");
        discarded
    }
}
