//! 网络世界实现
//!
//! 定义网络仿真的世界（World）实现，持有网络拓扑与已安装的应用。

use super::network::Network;
use crate::app::Applications;
use crate::sim::World;
use std::any::Any;

/// 默认的网络世界实现：持有 Network 与应用。
#[derive(Default)]
pub struct NetWorld {
    pub net: Network,
    pub apps: Applications,
}

impl NetWorld {
    pub fn new(net: Network) -> Self {
        Self {
            net,
            apps: Applications::default(),
        }
    }
}

impl World for NetWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
