//! 仿真世界
//!
//! 调度器只认识 `dyn World`；事件执行时再向下转型到具体世界（如 [`NetWorld`](crate::net::NetWorld)）。

use std::any::Any;

pub trait World: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
