//! 可订阅的状态值
//!
//! 值变化时同步回调所有订阅者，参数为 `(now, old, new)`；写入相同的值不会触发回调。

use std::fmt;

use crate::sim::SimTime;

pub type TraceCallback<T> = Box<dyn FnMut(SimTime, T, T) + Send>;

pub struct TracedValue<T> {
    value: T,
    sinks: Vec<TraceCallback<T>>,
}

impl<T: Copy + PartialEq> TracedValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            sinks: Vec::new(),
        }
    }

    pub fn get(&self) -> T {
        self.value
    }

    pub fn set(&mut self, now: SimTime, value: T) {
        if value == self.value {
            return;
        }
        let old = self.value;
        self.value = value;
        for sink in &mut self.sinks {
            sink(now, old, value);
        }
    }

    pub fn connect(&mut self, cb: TraceCallback<T>) {
        self.sinks.push(cb);
    }

    pub fn subscribers(&self) -> usize {
        self.sinks.len()
    }
}

impl<T: fmt::Debug> fmt::Debug for TracedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedValue")
            .field("value", &self.value)
            .field("subscribers", &self.sinks.len())
            .finish()
    }
}
