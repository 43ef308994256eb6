//! 节点类型

use std::collections::BTreeMap;

use super::id::{LinkId, NodeId};

/// 网络节点：标识 + 邻居到链路的映射。生命周期与整个仿真相同。
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    name: String,
    neighbors: BTreeMap<NodeId, LinkId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            neighbors: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 邻居（按 NodeId 有序）
    pub fn neighbors(&self) -> impl Iterator<Item = (NodeId, LinkId)> + '_ {
        self.neighbors.iter().map(|(n, l)| (*n, *l))
    }

    pub fn link_to(&self, neighbor: NodeId) -> Option<LinkId> {
        self.neighbors.get(&neighbor).copied()
    }

    pub(crate) fn attach(&mut self, neighbor: NodeId, link: LinkId) {
        self.neighbors.insert(neighbor, link);
    }
}
