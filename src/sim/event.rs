//! 事件 trait
//!
//! 定义仿真事件接口。

use super::simulator::Simulator;
use super::world::World;

/// 事件：可被调度执行。使用 `self: Box<Self>` 以支持 move/所有权转移。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);
}

/// 已入队事件的句柄，可用于在触发前取消。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub(crate) u64);

/// 把一个闭包包装成事件。
pub struct FnEvent<F>(pub F);

impl<F> Event for FnEvent<F>
where
    F: FnOnce(&mut Simulator, &mut dyn World) + Send + 'static,
{
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        (self.0)(sim, world)
    }
}
