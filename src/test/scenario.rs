use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::app::{AppState, Application, BulkSender, PacketSink};
use crate::error::SimError;
use crate::scenario::{RunReport, Scenario};
use crate::sim::SimTime;
use crate::topo::{BulkChainOpts, PacedChainOpts, bulk_chain, bypass_chain, paced_chain};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn sink_bytes(report: &RunReport) -> u64 {
    report
        .apps
        .iter()
        .find(|a| a.kind == "sink")
        .map(|a| a.bytes_received)
        .expect("sink summary")
}

#[test]
fn invalid_scenario_fails_before_running() {
    let mut spec = bulk_chain(&BulkChainOpts::default());
    spec.links[2].b = "X".into();
    assert!(matches!(
        Scenario::build(&spec),
        Err(SimError::UnknownNodeName(n)) if n == "X"
    ));
}

#[test]
fn bulk_chain_is_deterministic_for_a_seed() {
    let spec = bulk_chain(&BulkChainOpts::default());
    let first = Scenario::build(&spec).expect("build").run().expect("run");
    let second = Scenario::build(&spec).expect("build").run().expect("run");

    assert_eq!(first.stats, second.stats);
    assert_eq!(first.samples, second.samples);
    assert_eq!(sink_bytes(&first), sink_bytes(&second));
    assert_eq!(first.events_executed, second.events_executed);

    assert_eq!(first.end_time_secs, 31.0);
    assert_eq!(first.routes_version, 1);
    let rx = sink_bytes(&first);
    assert!(rx > 0 && rx <= 1_000_000, "rx={rx}");
    assert!(first.stats.lost_pkts > 0);
    assert_eq!(first.sample_count, first.samples.len());
    assert!(first.samples.windows(2).all(|w| w[0].at <= w[1].at));
    assert!(first.samples.iter().all(|s| s.at <= SimTime::from_secs(31)));
}

#[test]
fn different_seeds_change_loss_pattern() {
    let a = Scenario::build(&bulk_chain(&BulkChainOpts::default()))
        .expect("build")
        .run()
        .expect("run");
    let b = Scenario::build(&bulk_chain(&BulkChainOpts {
        seed: 99,
        ..BulkChainOpts::default()
    }))
    .expect("build")
    .run()
    .expect("run");
    assert_ne!(a.samples, b.samples);
}

#[test]
fn bulk_sender_stops_after_max_bytes() {
    let spec = bulk_chain(&BulkChainOpts {
        ber: 0.0,
        edge_error_rate: 0.0,
        max_bytes: 20_000,
        ..BulkChainOpts::default()
    });
    let mut scenario = Scenario::build(&spec).expect("build");
    let flow = scenario.flows()[0];
    scenario.advance_to(SimTime::from_secs(10));

    let world = scenario.world();
    let bulk = world.apps.get::<BulkSender>(flow.source).expect("bulk");
    assert_eq!(bulk.state(), AppState::Stopped);
    assert_eq!(bulk.total_bytes(), 20_000);
    let sink = world.apps.get::<PacketSink>(flow.sink).expect("sink");
    assert_eq!(sink.bytes_received(scenario.network()), 20_000);
    assert_eq!(scenario.network().stats.dropped_pkts(), 0);
}

#[test]
fn bypass_reroutes_after_link_failure() {
    let spec = bypass_chain(&BulkChainOpts::default());
    let mut scenario = Scenario::build(&spec).expect("build");
    let flow = scenario.flows()[0];
    assert_eq!(scenario.faults().faults().len(), 1);

    scenario.advance_to(SimTime::from_secs(2));
    let net = scenario.network();
    assert_eq!(net.routes_version(), 2);
    let b = net.node_by_name("B").expect("B");
    let c = net.node_by_name("C").expect("C");
    let e = net.node_by_name("E").expect("E");
    let bc = net.link_between(b, c).expect("B-C");
    assert!(!net.link(bc).expect("link").is_up());
    assert_eq!(
        net.routing_table().next_hop(flow.source_node, flow.sink_node),
        Some(e)
    );
    let before = scenario
        .world()
        .apps
        .get::<PacketSink>(flow.sink)
        .expect("sink")
        .bytes_received(scenario.network());

    let report = scenario.run().expect("run");
    assert_eq!(report.routes_version, 2);
    assert!(sink_bytes(&report) > before);
}

#[test]
fn paced_chain_writes_trace_files() {
    let dir = unique_temp_dir("tcpchain-scenario");
    let mut spec = paced_chain(&PacedChainOpts::default());
    let trace = spec.trace.get_or_insert_with(Default::default);
    trace.cwnd_path = Some(dir.join("cwnd.data"));
    trace.ssthresh_path = Some(dir.join("ssthresh.data"));
    trace.combined_path = Some(dir.join("combined.data"));

    let report = Scenario::build(&spec).expect("build").run().expect("run");
    assert!(report.sample_count > 0);
    let paced = report
        .apps
        .iter()
        .find(|a| a.kind == "paced")
        .expect("paced summary");
    assert_eq!(paced.packets_sent, 1000);
    assert!(paced.bytes_sent > 0 && paced.bytes_sent <= 1_040_000);

    let cwnd = fs::read_to_string(dir.join("cwnd.data")).expect("cwnd file");
    let ssthresh = fs::read_to_string(dir.join("ssthresh.data")).expect("ssthresh file");
    let combined = fs::read_to_string(dir.join("combined.data")).expect("combined file");
    assert_eq!(cwnd.lines().count(), report.sample_count);
    assert_eq!(ssthresh.lines().count(), report.sample_count);
    assert_eq!(combined.lines().count(), report.sample_count);

    for (i, line) in combined.lines().enumerate() {
        let cols: Vec<&str> = line.split('\t').collect();
        assert_eq!(cols.len(), 3, "line {i}: {line:?}");
        let s = report.samples[i];
        assert_eq!(cols[1], s.cwnd.to_string());
        assert_eq!(cols[2], s.ssthresh.to_string());
        let t: f64 = cols[0].parse().expect("time column");
        assert!((t - s.at.as_secs_f64()).abs() < 1e-5 * t.max(1.0));
    }
    // 第一条样本来自第一个 ACK，发送端 1s 才启动
    assert!(report.samples[0].at > SimTime::from_secs(1));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_trace_directory_is_an_error() {
    let mut spec = paced_chain(&PacedChainOpts::default());
    spec.trace = Some(crate::config::TraceSpec {
        cwnd_path: Some(PathBuf::from("/nonexistent-dir/for/tcpchain/cwnd.data")),
        ..Default::default()
    });
    assert!(matches!(Scenario::build(&spec), Err(SimError::Io(_))));
}
