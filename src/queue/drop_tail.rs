//! DropTail（尾丢弃）队列
//!
//! 当队列已满（按包数）时，直接丢弃新到达的 packet。

use std::collections::VecDeque;

use crate::net::Packet;

use super::PacketQueue;

#[derive(Debug)]
pub struct DropTailQueue {
    max_packets: usize,
    cur_bytes: u64,
    q: VecDeque<Packet>,
}

impl DropTailQueue {
    pub fn new(max_packets: u32) -> Self {
        Self {
            max_packets: max_packets as usize,
            cur_bytes: 0,
            q: VecDeque::new(),
        }
    }

    pub fn capacity_packets(&self) -> usize {
        self.max_packets
    }
}

impl PacketQueue for DropTailQueue {
    fn enqueue(&mut self, pkt: Packet) -> Result<(), Packet> {
        if self.q.len() >= self.max_packets {
            return Err(pkt);
        }
        self.cur_bytes = self.cur_bytes.saturating_add(pkt.size_bytes as u64);
        self.q.push_back(pkt);
        Ok(())
    }

    fn dequeue(&mut self) -> Option<Packet> {
        let pkt = self.q.pop_front()?;
        self.cur_bytes = self.cur_bytes.saturating_sub(pkt.size_bytes as u64);
        Some(pkt)
    }

    fn flush(&mut self) -> usize {
        let n = self.q.len();
        self.q.clear();
        self.cur_bytes = 0;
        n
    }

    fn len(&self) -> usize {
        self.q.len()
    }

    fn bytes(&self) -> u64 {
        self.cur_bytes
    }
}
