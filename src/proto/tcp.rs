//! TCP（简化版 NewReno）协议实现
//!
//! 仿真核心之外的“网络协议栈”协作者，只提供链式 TCP 实验需要的最小功能：
//! - socket：create / bind / connect / send / close，监听端（packet sink）
//! - NewReno 拥塞控制：慢启动、拥塞避免、3 dupACK 快速重传 + 快速恢复（含部分 ACK）
//! - 超时重传：Jacobson/Karels RTT 估计、Karn 规则、指数退避；RTO 定时器可取消
//! - 接收端：累计 ACK + 乱序重组
//! - `cwnd` / `ssthresh` 变化通过 [`TracedValue`] 通知订阅者
//!
//! 注意：不实现握手/FIN/窗口通告/选择确认等。connect 在对端存在监听时立即成功。

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, trace};

use super::traced::{TraceCallback, TracedValue};
use crate::error::{Result, SimError};
use crate::net::{NetWorld, Network, NodeId, TcpSegment, Transport};
use crate::sim::{Event, EventId, SimTime, Simulator, World};

/// 一个 TCP socket 的唯一标识（同时作为其数据包的 `flow_id`）。
pub type SocketId = u64;
pub type ListenerId = usize;
/// 发送缓冲区重新有空间时的回调：`(socket, 可用字节, sim)`
pub type SendSpaceCallback = Box<dyn FnMut(SocketId, u64, &mut Simulator) + Send>;

const EPHEMERAL_PORT_BASE: u16 = 49153;

#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// 数据段载荷大小（字节）
    pub segment_size: u32,
    /// IP + TCP 头部开销（字节），ACK 包大小也取此值
    pub header_bytes: u32,
    /// 初始 cwnd（单位：段）
    pub initial_cwnd_segments: u32,
    /// 初始 ssthresh（字节）
    pub initial_ssthresh: u32,
    /// 初始 RTO
    pub init_rto: SimTime,
    pub min_rto: SimTime,
    /// 最大 RTO（用于退避上限）
    pub max_rto: SimTime,
    pub dup_ack_threshold: u32,
    /// 发送缓冲区容量（字节，含已发送未确认）
    pub tx_buffer_bytes: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            segment_size: 536,
            header_bytes: 40,
            initial_cwnd_segments: 1,
            initial_ssthresh: u32::MAX,
            init_rto: SimTime::from_secs(1),
            min_rto: SimTime::from_millis(200),
            max_rto: SimTime::from_secs(60),
            dup_ack_threshold: 3,
            tx_buffer_bytes: 131_072,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Created,
    Bound,
    Connected,
    /// 应用已关闭，缓冲区内的数据仍在发送
    Closing,
    Closed,
}

impl SocketState {
    pub fn as_str(self) -> &'static str {
        match self {
            SocketState::Created => "created",
            SocketState::Bound => "bound",
            SocketState::Connected => "connected",
            SocketState::Closing => "closing",
            SocketState::Closed => "closed",
        }
    }
}

#[derive(Debug)]
struct Listener {
    node: NodeId,
    port: u16,
    open: bool,
    rx_bytes: u64,
}

#[derive(Debug)]
pub struct TcpSocket {
    id: SocketId,
    node: NodeId,
    local_port: Option<u16>,
    peer: Option<(NodeId, u16)>,
    listener: Option<ListenerId>,
    state: SocketState,
    cfg: TcpConfig,

    // sender
    written: u64,
    next_seq: u64,
    high_tx: u64,
    last_acked: u64,
    dup_acks: u32,
    in_recovery: bool,
    recover: u64,
    cwnd: TracedValue<u32>,
    ssthresh: TracedValue<u32>,
    srtt: Option<f64>,
    rttvar: f64,
    rto: SimTime,
    rtt_probe: Option<(u64, SimTime)>, // (seq end, sent at)
    rto_event: Option<EventId>,
    send_blocked: bool,

    // receiver
    rcv_nxt: u64,
    ooo: BTreeMap<u64, u64>, // start -> end

    // stats
    segments_sent: u64,
    retransmits: u64,
    timeouts: u64,
}

impl TcpSocket {
    fn new(id: SocketId, node: NodeId, cfg: TcpConfig) -> Self {
        let seg = cfg.segment_size.max(1);
        let cwnd = seg.saturating_mul(cfg.initial_cwnd_segments.max(1));
        let ssthresh = cfg.initial_ssthresh;
        let rto = cfg.init_rto;
        Self {
            id,
            node,
            local_port: None,
            peer: None,
            listener: None,
            state: SocketState::Created,
            cfg,
            written: 0,
            next_seq: 0,
            high_tx: 0,
            last_acked: 0,
            dup_acks: 0,
            in_recovery: false,
            recover: 0,
            cwnd: TracedValue::new(cwnd),
            ssthresh: TracedValue::new(ssthresh),
            srtt: None,
            rttvar: 0.0,
            rto,
            rtt_probe: None,
            rto_event: None,
            send_blocked: false,
            rcv_nxt: 0,
            ooo: BTreeMap::new(),
            segments_sent: 0,
            retransmits: 0,
            timeouts: 0,
        }
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn cwnd(&self) -> u32 {
        self.cwnd.get()
    }

    pub fn ssthresh(&self) -> u32 {
        self.ssthresh.get()
    }

    pub fn rto(&self) -> SimTime {
        self.rto
    }

    /// `(cwnd, ssthresh)` 的订阅者数量
    pub fn trace_subscribers(&self) -> (usize, usize) {
        (self.cwnd.subscribers(), self.ssthresh.subscribers())
    }

    /// 应用写入发送缓冲区的总字节数
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// 已被对端累计确认的字节数
    pub fn bytes_acked(&self) -> u64 {
        self.last_acked
    }

    pub fn segments_sent(&self) -> u64 {
        self.segments_sent
    }

    pub fn retransmits(&self) -> u64 {
        self.retransmits
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    fn seg(&self) -> u64 {
        self.cfg.segment_size.max(1) as u64
    }

    fn in_flight(&self) -> u64 {
        self.next_seq.saturating_sub(self.last_acked)
    }

    fn outstanding(&self) -> u64 {
        self.high_tx.saturating_sub(self.last_acked)
    }

    fn buffer_space(&self) -> u64 {
        let used = self.written.saturating_sub(self.last_acked);
        self.cfg.tx_buffer_bytes.saturating_sub(used)
    }

    fn set_cwnd(&mut self, now: SimTime, v: u64) {
        self.cwnd.set(now, v.min(u32::MAX as u64) as u32);
    }

    fn set_ssthresh(&mut self, now: SimTime, v: u64) {
        self.ssthresh.set(now, v.min(u32::MAX as u64) as u32);
    }

    fn arm_rto(&mut self, sim: &mut Simulator) {
        if let Some(old) = self.rto_event.take() {
            sim.cancel(old);
        }
        self.rto_event = Some(sim.schedule_in(self.rto, TcpRto { socket: self.id }));
    }

    fn disarm_rto(&mut self, sim: &mut Simulator) {
        if let Some(old) = self.rto_event.take() {
            sim.cancel(old);
        }
    }

    fn send_segment(&mut self, seq: u64, len: u32, sim: &mut Simulator, net: &mut Network) {
        let Some((dst, _)) = self.peer else {
            return;
        };
        let retrans = seq < self.high_tx;
        if retrans {
            self.retransmits += 1;
            // Karn：重传覆盖了测量段，放弃这次 RTT 采样
            if self.rtt_probe.is_some_and(|(end, _)| seq < end) {
                self.rtt_probe = None;
            }
        } else if self.rtt_probe.is_none() {
            self.rtt_probe = Some((seq + len as u64, sim.now()));
        }
        self.segments_sent += 1;
        self.high_tx = self.high_tx.max(seq + len as u64);

        let size = len.saturating_add(self.cfg.header_bytes);
        let pkt = net.make_packet(
            self.id,
            size,
            self.node,
            dst,
            Transport::Tcp(TcpSegment::Data { seq, len }),
        );
        trace!(socket = self.id, seq, len, retrans, "发送数据段");
        net.forward_from(self.node, pkt, sim);
    }

    /// 在 cwnd 允许的范围内发送缓冲区中尚未发送的数据
    fn try_send(&mut self, sim: &mut Simulator, net: &mut Network) {
        if !matches!(self.state, SocketState::Connected | SocketState::Closing) {
            return;
        }
        loop {
            let unsent = self.written.saturating_sub(self.next_seq);
            if unsent == 0 {
                break;
            }
            let len = self.seg().min(unsent);
            let in_flight = self.in_flight();
            if in_flight > 0 && in_flight + len > self.cwnd.get() as u64 {
                break;
            }
            let seq = self.next_seq;
            self.next_seq += len;
            self.send_segment(seq, len as u32, sim, net);
            if self.rto_event.is_none() {
                self.arm_rto(sim);
            }
        }
    }

    fn retransmit_head(&mut self, sim: &mut Simulator, net: &mut Network) {
        let len = self.seg().min(self.written.saturating_sub(self.last_acked));
        if len > 0 {
            self.send_segment(self.last_acked, len as u32, sim, net);
        }
    }

    fn update_rtt(&mut self, sample: SimTime) {
        let r = sample.as_secs_f64();
        match self.srtt {
            None => {
                self.srtt = Some(r);
                self.rttvar = r / 2.0;
            }
            Some(srtt) => {
                self.rttvar = 0.75 * self.rttvar + 0.25 * (srtt - r).abs();
                self.srtt = Some(0.875 * srtt + 0.125 * r);
            }
        }
        let srtt = self.srtt.unwrap_or(r);
        let rto = SimTime::from_secs_f64(srtt + 4.0 * self.rttvar).unwrap_or(self.cfg.max_rto);
        self.rto = rto.max(self.cfg.min_rto).min(self.cfg.max_rto);
    }

    /// 处理 ACK。返回 `true` 表示发送缓冲区从满变为有空间。
    fn on_ack(&mut self, ack: u64, sim: &mut Simulator, net: &mut Network) -> bool {
        let now = sim.now();
        let seg = self.seg();
        if ack > self.high_tx {
            return false;
        }

        if ack > self.last_acked {
            let newly = ack - self.last_acked;
            self.last_acked = ack;
            self.next_seq = self.next_seq.max(ack);

            if let Some((end, sent_at)) = self.rtt_probe {
                if ack >= end {
                    self.update_rtt(now.saturating_sub(sent_at));
                    self.rtt_probe = None;
                }
            }

            if self.in_recovery {
                if ack >= self.recover {
                    self.in_recovery = false;
                    self.dup_acks = 0;
                    let ssthresh = self.ssthresh.get() as u64;
                    self.set_cwnd(now, ssthresh);
                    debug!(socket = self.id, ack, "退出快速恢复");
                } else {
                    // NewReno 部分 ACK：重传下一个缺口，窗口收缩已确认的量
                    self.retransmit_head(sim, net);
                    let cwnd = (self.cwnd.get() as u64).saturating_sub(newly) + seg;
                    self.set_cwnd(now, cwnd);
                }
            } else {
                self.dup_acks = 0;
                let cwnd = self.cwnd.get() as u64;
                let next = if cwnd < self.ssthresh.get() as u64 {
                    cwnd + newly.min(seg)
                } else {
                    cwnd + (seg * seg / cwnd.max(1)).max(1)
                };
                self.set_cwnd(now, next);
            }

            if self.outstanding() > 0 {
                self.arm_rto(sim);
            } else {
                self.disarm_rto(sim);
            }

            if self.state == SocketState::Closing && self.last_acked >= self.written {
                self.state = SocketState::Closed;
                self.disarm_rto(sim);
                info!(socket = self.id, acked = self.last_acked, "socket 已关闭，数据全部确认");
                return false;
            }

            let freed = self.send_blocked && self.buffer_space() > 0;
            if freed {
                self.send_blocked = false;
            }
            self.try_send(sim, net);
            freed
        } else {
            if ack == self.last_acked && self.outstanding() > 0 {
                self.dup_acks = self.dup_acks.saturating_add(1);
                if !self.in_recovery && self.dup_acks == self.cfg.dup_ack_threshold {
                    let ssthresh = (self.outstanding() / 2).max(2 * seg);
                    self.set_ssthresh(now, ssthresh);
                    self.recover = self.high_tx;
                    self.in_recovery = true;
                    debug!(socket = self.id, ack, ssthresh, "3 dupACK，快速重传");
                    self.retransmit_head(sim, net);
                    self.set_cwnd(now, ssthresh + 3 * seg);
                } else if self.in_recovery {
                    let cwnd = self.cwnd.get() as u64 + seg;
                    self.set_cwnd(now, cwnd);
                    self.try_send(sim, net);
                }
            }
            false
        }
    }

    fn on_timeout(&mut self, sim: &mut Simulator, net: &mut Network) {
        self.rto_event = None;
        if self.state == SocketState::Closed || self.outstanding() == 0 {
            return;
        }
        let now = sim.now();
        let seg = self.seg();
        self.timeouts += 1;

        // 超时：回到慢启动，从最早未确认处重新发送
        let ssthresh = (self.outstanding() / 2).max(2 * seg);
        self.set_ssthresh(now, ssthresh);
        self.set_cwnd(now, seg);
        self.in_recovery = false;
        self.dup_acks = 0;
        self.next_seq = self.last_acked;
        self.rtt_probe = None;
        self.rto = SimTime(self.rto.0.saturating_mul(2)).min(self.cfg.max_rto);
        debug!(socket = self.id, seq = self.last_acked, rto = ?self.rto, "RTO 超时重传");

        self.try_send(sim, net);
    }

    /// 接收端处理数据段，返回 (累计 ACK, 本次按序推进的字节数)
    fn on_data(&mut self, seq: u64, len: u32) -> (u64, u64) {
        let before = self.rcv_nxt;
        let end = seq + len as u64;
        if seq <= self.rcv_nxt {
            self.rcv_nxt = self.rcv_nxt.max(end);
        } else {
            let e = self.ooo.entry(seq).or_insert(end);
            *e = (*e).max(end);
        }
        while let Some((&start, &e)) = self.ooo.iter().next() {
            if start > self.rcv_nxt {
                break;
            }
            self.ooo.remove(&start);
            self.rcv_nxt = self.rcv_nxt.max(e);
        }
        (self.rcv_nxt, self.rcv_nxt - before)
    }
}

#[derive(Default)]
pub struct TcpStack {
    pub cfg: TcpConfig,
    sockets: HashMap<SocketId, TcpSocket>,
    listeners: Vec<Listener>,
    send_callbacks: HashMap<SocketId, SendSpaceCallback>,
    next_socket: SocketId,
    next_ephemeral: u16,
}

impl TcpStack {
    pub fn new(cfg: TcpConfig) -> Self {
        Self {
            cfg,
            ..Self::default()
        }
    }

    /// 在节点上创建 socket（使用协议栈默认配置）
    pub fn create_socket(&mut self, node: NodeId) -> SocketId {
        let cfg = self.cfg.clone();
        self.create_socket_with(node, cfg)
    }

    pub fn create_socket_with(&mut self, node: NodeId, cfg: TcpConfig) -> SocketId {
        let id = self.next_socket;
        self.next_socket += 1;
        self.sockets.insert(id, TcpSocket::new(id, node, cfg));
        debug!(socket = id, node = ?node, "创建 socket");
        id
    }

    pub fn socket(&self, id: SocketId) -> Option<&TcpSocket> {
        self.sockets.get(&id)
    }

    fn socket_mut(&mut self, id: SocketId) -> Result<&mut TcpSocket> {
        self.sockets.get_mut(&id).ok_or(SimError::UnknownSocket(id))
    }

    /// 分配本地临时端口
    pub fn bind(&mut self, id: SocketId) -> Result<u16> {
        let port = EPHEMERAL_PORT_BASE.wrapping_add(self.next_ephemeral);
        let sock = self.socket_mut(id)?;
        match sock.state {
            SocketState::Created => {}
            SocketState::Bound => return sock.local_port.ok_or(SimError::SocketNotBound(id)),
            _ => return Err(SimError::SocketClosed(id)),
        }
        sock.local_port = Some(port);
        sock.state = SocketState::Bound;
        self.next_ephemeral = self.next_ephemeral.wrapping_add(1);
        Ok(port)
    }

    /// 在 (node, port) 上监听
    pub fn listen(&mut self, node: NodeId, port: u16) -> Result<ListenerId> {
        if self
            .listeners
            .iter()
            .any(|l| l.open && l.node == node && l.port == port)
        {
            return Err(SimError::AddressInUse { node, port });
        }
        self.listeners.push(Listener {
            node,
            port,
            open: true,
            rx_bytes: 0,
        });
        Ok(self.listeners.len() - 1)
    }

    pub fn close_listener(&mut self, id: ListenerId) {
        if let Some(l) = self.listeners.get_mut(id) {
            l.open = false;
        }
    }

    /// 监听端累计收到的按序字节数
    pub fn listener_rx_bytes(&self, id: ListenerId) -> u64 {
        self.listeners.get(id).map(|l| l.rx_bytes).unwrap_or(0)
    }

    /// 连接到对端监听；对端没有打开的监听时返回 `ConnectionRefused`。
    pub fn connect(&mut self, id: SocketId, node: NodeId, port: u16) -> Result<()> {
        let listener = self
            .listeners
            .iter()
            .position(|l| l.open && l.node == node && l.port == port);
        let sock = self.socket_mut(id)?;
        match sock.state {
            SocketState::Bound => {}
            SocketState::Created => return Err(SimError::SocketNotBound(id)),
            _ => return Err(SimError::SocketClosed(id)),
        }
        let listener = listener.ok_or(SimError::ConnectionRefused { node, port })?;
        sock.peer = Some((node, port));
        sock.listener = Some(listener);
        sock.state = SocketState::Connected;
        info!(socket = id, peer = ?node, port, "🔗 连接建立");
        Ok(())
    }

    /// 写入最多 `bytes` 字节，返回实际接受的字节数（受发送缓冲区限制）。
    pub fn send(
        &mut self,
        id: SocketId,
        bytes: u64,
        sim: &mut Simulator,
        net: &mut Network,
    ) -> Result<u64> {
        let sock = self.socket_mut(id)?;
        match sock.state {
            SocketState::Connected => {}
            SocketState::Created | SocketState::Bound => {
                return Err(SimError::SocketNotConnected(id));
            }
            SocketState::Closing | SocketState::Closed => return Err(SimError::SocketClosed(id)),
        }
        let accepted = bytes.min(sock.buffer_space());
        if accepted < bytes {
            sock.send_blocked = true;
        }
        sock.written += accepted;
        sock.try_send(sim, net);
        Ok(accepted)
    }

    /// 发送缓冲区当前可接受的字节数；只对已连接的 socket 有意义。
    pub fn tx_available(&self, id: SocketId) -> Result<u64> {
        let sock = self.sockets.get(&id).ok_or(SimError::UnknownSocket(id))?;
        match sock.state {
            SocketState::Connected => Ok(sock.buffer_space()),
            SocketState::Created | SocketState::Bound => Err(SimError::SocketNotConnected(id)),
            SocketState::Closing | SocketState::Closed => Err(SimError::SocketClosed(id)),
        }
    }

    /// 关闭 socket。已写入的数据仍会发送完；重复关闭是无操作。
    pub fn close(&mut self, id: SocketId, sim: &mut Simulator) -> Result<()> {
        self.send_callbacks.remove(&id);
        let sock = self.socket_mut(id)?;
        match sock.state {
            SocketState::Created | SocketState::Bound => sock.state = SocketState::Closed,
            SocketState::Connected => {
                if sock.last_acked >= sock.written {
                    sock.state = SocketState::Closed;
                    sock.disarm_rto(sim);
                } else {
                    sock.state = SocketState::Closing;
                }
            }
            SocketState::Closing | SocketState::Closed => {}
        }
        debug!(socket = id, state = sock.state.as_str(), "关闭 socket");
        Ok(())
    }

    /// 订阅拥塞窗口变化
    pub fn trace_cwnd(&mut self, id: SocketId, cb: TraceCallback<u32>) -> Result<()> {
        self.socket_mut(id)?.cwnd.connect(cb);
        Ok(())
    }

    /// 订阅慢启动阈值变化
    pub fn trace_ssthresh(&mut self, id: SocketId, cb: TraceCallback<u32>) -> Result<()> {
        self.socket_mut(id)?.ssthresh.connect(cb);
        Ok(())
    }

    pub fn set_send_callback(&mut self, id: SocketId, cb: SendSpaceCallback) -> Result<()> {
        self.socket_mut(id)?;
        self.send_callbacks.insert(id, cb);
        Ok(())
    }

    pub(crate) fn on_segment(
        &mut self,
        conn_id: SocketId,
        at: NodeId,
        seg: TcpSegment,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        let Some(sock) = self.sockets.get_mut(&conn_id) else {
            return;
        };
        match seg {
            TcpSegment::Data { seq, len } => {
                let Some((peer, _)) = sock.peer else {
                    return;
                };
                if at != peer {
                    return;
                }
                let (ack, advanced) = sock.on_data(seq, len);
                let (src, header) = (sock.node, sock.cfg.header_bytes);
                if advanced > 0 {
                    if let Some(l) = sock.listener.and_then(|i| self.listeners.get_mut(i)) {
                        if l.open {
                            l.rx_bytes += advanced;
                        }
                    }
                }
                let pkt = net.make_packet(
                    conn_id,
                    header,
                    at,
                    src,
                    Transport::Tcp(TcpSegment::Ack { ack }),
                );
                net.forward_from(at, pkt, sim);
            }
            TcpSegment::Ack { ack } => {
                if at != sock.node {
                    return;
                }
                if sock.on_ack(ack, sim, net) {
                    let space = sock.buffer_space();
                    if let Some(cb) = self.send_callbacks.get_mut(&conn_id) {
                        cb(conn_id, space, sim);
                    }
                }
            }
        }
    }

    pub(crate) fn on_timeout(&mut self, id: SocketId, sim: &mut Simulator, net: &mut Network) {
        if let Some(sock) = self.sockets.get_mut(&id) {
            sock.on_timeout(sim, net);
        }
    }
}

/// TCP RTO 事件：仍有未确认数据时触发超时重传（过期定时器已被取消）
#[derive(Debug)]
pub struct TcpRto {
    pub socket: SocketId,
}

impl Event for TcpRto {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let TcpRto { socket } = *self;
        let Some(w) = world.as_any_mut().downcast_mut::<NetWorld>() else {
            return;
        };
        w.net.with_tcp(|tcp, net| tcp.on_timeout(socket, sim, net));
    }
}
