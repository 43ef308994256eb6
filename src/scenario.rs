//! 运行驱动
//!
//! 从 [`ScenarioSpec`] 构建网络、安装接收端与发送端、挂接拥塞跟踪器与故障计划，
//! 运行到全局截止时间后关闭会话：停止仍在运行的应用，丢弃剩余事件，刷新跟踪输出。

use serde::Serialize;
use tracing::info;

use crate::app::{AppId, AppSummary, BulkSender, PacedSender, PacedSenderConfig, PacketSink};
use crate::config::{FlowApp, ScenarioSpec, parse_data_rate, parse_time};
use crate::error::{Result, SimError};
use crate::fault::{FaultInjector, LinkFault};
use crate::net::{LinkParams, NetWorld, Network, NodeId, Stats};
use crate::proto::tcp::{SocketId, TcpStack};
use crate::sim::{SimTime, Simulator};
use crate::trace::{self, CongestionSample, CongestionTracer, SharedTracer, TraceSinks};

/// 一条流安装后的句柄
#[derive(Debug, Clone, Copy)]
pub struct FlowHandle {
    pub source: AppId,
    pub sink: AppId,
    pub socket: SocketId,
    pub source_node: NodeId,
    pub sink_node: NodeId,
}

/// 运行结果
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub end_time_secs: f64,
    pub events_executed: u64,
    pub events_discarded: usize,
    pub routes_version: u64,
    pub stats: Stats,
    pub apps: Vec<AppSummary>,
    pub sample_count: usize,
    #[serde(skip_serializing)]
    pub samples: Vec<CongestionSample>,
}

/// 一次可运行的仿真会话
pub struct Scenario {
    sim: Simulator,
    world: NetWorld,
    stop: SimTime,
    flows: Vec<FlowHandle>,
    tracer: Option<SharedTracer>,
    faults: FaultInjector,
}

fn node(net: &Network, name: &str) -> Result<NodeId> {
    net.node_by_name(name)
        .ok_or_else(|| SimError::UnknownNodeName(name.to_string()))
}

impl Scenario {
    /// 校验并构建场景；配置错误在调度器启动之前返回。
    pub fn build(spec: &ScenarioSpec) -> Result<Self> {
        spec.validate()?;
        let stop = spec.stop()?;

        let mut net = Network::new(spec.seed);
        net.tcp = TcpStack::new(spec.tcp_config()?);
        for name in &spec.nodes {
            net.add_node(name.as_str());
        }
        for l in &spec.links {
            let params = LinkParams {
                data_rate_bps: parse_data_rate(&l.data_rate)?,
                delay: parse_time(&l.delay)?,
                loss_probability: l.loss_probability,
                error_unit: l.error_unit,
                queue_packets: l.queue_packets,
            };
            let (a, b) = (node(&net, &l.a)?, node(&net, &l.b)?);
            net.add_link_with(a, b, &params)?;
        }
        net.recompute_routes()?;

        let mut sim = Simulator::default();
        let mut world = NetWorld::new(net);
        let mut flows = Vec::with_capacity(spec.flows.len());

        for (i, f) in spec.flows.iter().enumerate() {
            let src = node(&world.net, &f.source)?;
            let dst = node(&world.net, &f.sink)?;
            let start = parse_time(&f.start_time)?;
            let end = parse_time(&f.stop_time)?;
            let sink_start = f
                .sink_start_time
                .as_deref()
                .map(parse_time)
                .transpose()?
                .unwrap_or(SimTime::ZERO);
            let sink_stop = f
                .sink_stop_time
                .as_deref()
                .map(parse_time)
                .transpose()?
                .unwrap_or(end);

            // 接收端先安装，同一时刻启动时先于发送端开始监听
            let sink = world
                .apps
                .install(Box::new(PacketSink::new(format!("sink{i}"), dst, f.port)));
            world.apps.schedule_lifecycle(sink, sink_start, sink_stop, &mut sim)?;

            let socket = world.net.tcp.create_socket(src);
            let source = match &f.app {
                FlowApp::Paced {
                    message_size,
                    message_count_limit,
                    data_rate,
                } => {
                    let cfg = PacedSenderConfig {
                        message_size: *message_size,
                        message_count_limit: *message_count_limit,
                        data_rate_bps: parse_data_rate(data_rate)?,
                    };
                    world.apps.install(Box::new(PacedSender::new(
                        format!("paced{i}"),
                        socket,
                        dst,
                        f.port,
                        cfg,
                    )))
                }
                FlowApp::Bulk {
                    max_bytes,
                    send_size,
                } => world.apps.install(Box::new(BulkSender::new(
                    format!("bulk{i}"),
                    socket,
                    dst,
                    f.port,
                    *max_bytes,
                    *send_size,
                ))),
            };
            world.apps.schedule_lifecycle(source, start, end, &mut sim)?;
            flows.push(FlowHandle {
                source,
                sink,
                socket,
                source_node: src,
                sink_node: dst,
            });
        }

        let tracer = match &spec.trace {
            Some(t) => {
                let sinks = TraceSinks::create(
                    t.cwnd_path.as_deref(),
                    t.ssthresh_path.as_deref(),
                    t.combined_path.as_deref(),
                )?;
                let tracer = CongestionTracer::new(0, 0, sinks).shared();
                let socket = flows
                    .get(t.flow)
                    .map(|h| h.socket)
                    .ok_or_else(|| SimError::Config(format!("no flow {}", t.flow)))?;
                trace::attach(&tracer, &mut world.net.tcp, socket)?;
                Some(tracer)
            }
            None => None,
        };

        let mut faults = FaultInjector::new();
        for f in &spec.faults {
            faults.push(LinkFault {
                a: node(&world.net, &f.a)?,
                b: node(&world.net, &f.b)?,
                at: parse_time(&f.at)?,
            });
        }
        faults.install(&mut sim, &world.net)?;

        info!(
            nodes = spec.nodes.len(),
            links = spec.links.len(),
            flows = flows.len(),
            faults = faults.faults().len(),
            stop = ?stop,
            "场景构建完成"
        );
        Ok(Self {
            sim,
            world,
            stop,
            flows,
            tracer,
            faults,
        })
    }

    pub fn network(&self) -> &Network {
        &self.world.net
    }

    pub fn world(&self) -> &NetWorld {
        &self.world
    }

    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    pub fn flows(&self) -> &[FlowHandle] {
        &self.flows
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub fn stop_time(&self) -> SimTime {
        self.stop
    }

    pub fn tracer(&self) -> Option<&SharedTracer> {
        self.tracer.as_ref()
    }

    /// 推进到 `t`（不超过截止时间），之后可以继续推进或调用 [`Scenario::run`]。
    pub fn advance_to(&mut self, t: SimTime) {
        self.sim.run_until(t.min(self.stop), &mut self.world);
    }

    /// 运行到截止时间并结束会话
    pub fn run(mut self) -> Result<RunReport> {
        info!(stop = ?self.stop, "▶️  开始运行场景");
        self.sim.run_until(self.stop, &mut self.world);

        let NetWorld { net, apps } = &mut self.world;
        apps.stop_all(&mut self.sim, net);
        let events_discarded = self.sim.shutdown();

        let samples = match &self.tracer {
            Some(t) => {
                trace::finish(t)?;
                trace::snapshot(t)
            }
            None => Vec::new(),
        };

        let net = &self.world.net;
        let report = RunReport {
            end_time_secs: self.sim.now().as_secs_f64(),
            events_executed: self.sim.events_executed(),
            events_discarded,
            routes_version: net.routes_version(),
            stats: net.stats.clone(),
            apps: self.world.apps.summaries(net),
            sample_count: samples.len(),
            samples,
        };
        info!(
            end_time = report.end_time_secs,
            events_executed = report.events_executed,
            events_discarded = report.events_discarded,
            delivered_pkts = report.stats.delivered_pkts,
            dropped_pkts = report.stats.dropped_pkts(),
            samples = report.sample_count,
            "✅ 场景运行完成"
        );
        Ok(report)
    }
}
