use crate::net::{NodeId, Packet, Transport};
use crate::queue::{DropTailQueue, PacketQueue};

fn pkt(id: u64, size_bytes: u32) -> Packet {
    Packet {
        id,
        flow_id: 0,
        size_bytes,
        src: NodeId(0),
        dst: NodeId(1),
        hops: 0,
        transport: Transport::None,
    }
}

#[test]
fn droptail_queue_enforces_packet_capacity_and_preserves_order() {
    let mut q = DropTailQueue::new(2);
    assert_eq!(q.capacity_packets(), 2);
    assert!(q.is_empty());

    assert!(q.enqueue(pkt(1, 60)).is_ok());
    assert!(q.enqueue(pkt(2, 1500)).is_ok());
    assert_eq!(q.len(), 2);
    assert_eq!(q.bytes(), 1560);

    let dropped = q.enqueue(pkt(3, 10)).expect_err("should drop");
    assert_eq!(dropped.id, 3);
    assert_eq!(q.len(), 2);

    assert_eq!(q.dequeue().expect("pkt").id, 1);
    assert_eq!(q.bytes(), 1500);
    assert_eq!(q.dequeue().expect("pkt").id, 2);
    assert!(q.dequeue().is_none());
    assert_eq!(q.bytes(), 0);
}

#[test]
fn droptail_flush_discards_everything() {
    let mut q = DropTailQueue::new(10);
    for i in 0..4 {
        assert!(q.enqueue(pkt(i, 100)).is_ok());
    }
    assert_eq!(q.flush(), 4);
    assert!(q.is_empty());
    assert_eq!(q.bytes(), 0);
    assert_eq!(q.flush(), 0);
}
