//! 最短跳数路由
//!
//! 路由表只能整体重建：给定当前所有“up”链路构成的邻接表，对每个目的节点在图上做 BFS，
//! 为每个 (from, dst) 记录所有等价最短路径的下一跳候选，转发时取编号最小的一个。
//! 相同输入总是得到相同的表，因此重复重建是幂等的。

use std::collections::{BTreeMap, VecDeque};

use super::id::NodeId;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    /// (from, dst) -> 多个等价最短路径下一跳（升序）
    next_hops: BTreeMap<(NodeId, NodeId), Vec<NodeId>>,
}

impl RoutingTable {
    /// 基于邻接表构建路由表。
    ///
    /// `adj[from]` 为从 `from` 出发可用的所有邻居。
    pub fn build(adj: &[Vec<NodeId>]) -> Self {
        let n = adj.len();
        let mut rev_adj: Vec<Vec<NodeId>> = vec![Vec::new(); n];
        for (from, nbrs) in adj.iter().enumerate() {
            for &to in nbrs {
                rev_adj[to.0].push(NodeId(from));
            }
        }

        let mut next_hops = BTreeMap::new();

        // 对每个 dst 在反向图上做 BFS，得到到 dst 的最短跳数距离 dist[*]。
        // 然后对每个 from，选出所有满足 dist[next] = dist[from] - 1 的 next 作为候选。
        let mut dist: Vec<u32> = vec![u32::MAX; n];
        let mut q: VecDeque<NodeId> = VecDeque::new();

        for dst_idx in 0..n {
            dist.fill(u32::MAX);
            q.clear();

            let dst = NodeId(dst_idx);
            dist[dst_idx] = 0;
            q.push_back(dst);

            while let Some(v) = q.pop_front() {
                let dv = dist[v.0];
                for &pred in &rev_adj[v.0] {
                    if dist[pred.0] == u32::MAX {
                        dist[pred.0] = dv.saturating_add(1);
                        q.push_back(pred);
                    }
                }
            }

            for from_idx in 0..n {
                let df = dist[from_idx];
                if from_idx == dst_idx || df == u32::MAX {
                    continue;
                }
                let mut cands: Vec<NodeId> = adj[from_idx]
                    .iter()
                    .copied()
                    .filter(|nh| dist[nh.0] == df - 1)
                    .collect();
                cands.sort();
                cands.dedup();
                if !cands.is_empty() {
                    next_hops.insert((NodeId(from_idx), dst), cands);
                }
            }
        }

        Self { next_hops }
    }

    /// 获取 (from, dst) 的等价下一跳候选集合。
    pub fn next_hops(&self, from: NodeId, dst: NodeId) -> Option<&[NodeId]> {
        self.next_hops.get(&(from, dst)).map(|v| v.as_slice())
    }

    /// 转发使用的下一跳（候选中编号最小者）。
    pub fn next_hop(&self, from: NodeId, dst: NodeId) -> Option<NodeId> {
        self.next_hops(from, dst).and_then(|c| c.first().copied())
    }

    /// 沿下一跳走出的完整路径（含两端）；不可达返回 `None`。
    pub fn path(&self, src: NodeId, dst: NodeId) -> Option<Vec<NodeId>> {
        let mut path = vec![src];
        let mut at = src;
        while at != dst {
            at = self.next_hop(at, dst)?;
            path.push(at);
            if path.len() > self.next_hops.len() + 2 {
                return None;
            }
        }
        Some(path)
    }

    /// 表项数
    pub fn len(&self) -> usize {
        self.next_hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next_hops.is_empty()
    }
}
