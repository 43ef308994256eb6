//! 事件调度器
//!
//! 单线程离散事件核心：按 (时刻, 入队序号) 顺序执行事件，支持取消、有界运行与会话结束时丢弃剩余事件。

mod event;
mod scheduled_event;
mod simulator;
mod time;
mod world;

pub use event::{Event, EventId, FnEvent};
pub use scheduled_event::ScheduledEvent;
pub use simulator::Simulator;
pub use time::SimTime;
pub use world::World;
