use crate::config::{FlowApp, ScenarioSpec, parse_data_rate, parse_time};
use crate::error::SimError;
use crate::net::ErrorUnit;
use crate::sim::SimTime;
use crate::topo::{BulkChainOpts, PacedChainOpts, bulk_chain, bypass_chain, paced_chain};

const MINIMAL: &str = r#"{
  "schema_version": 1,
  "stop_time": "10s",
  "nodes": ["A", "B", "C"],
  "links": [
    { "a": "A", "b": "B" },
    { "a": "B", "b": "C", "data_rate": "1Mbps", "delay": "10ms",
      "loss_probability": 0.00005, "error_unit": "byte" }
  ],
  "flows": [
    { "source": "A", "sink": "C", "start_time": "1s", "stop_time": "9s",
      "app": { "kind": "paced", "message_size": 1040, "message_count_limit": 10,
               "data_rate": "5Mbps" } }
  ],
  "faults": [ { "a": "C", "b": "B", "at": "5s" } ],
  "trace": { "flow": 0 }
}"#;

fn minimal() -> ScenarioSpec {
    ScenarioSpec::from_json_str(MINIMAL).expect("parse")
}

#[test]
fn parse_time_units() {
    assert_eq!(parse_time("2ms").expect("2ms"), SimTime::from_millis(2));
    assert_eq!(parse_time("1.5s").expect("1.5s"), SimTime(1_500_000_000));
    assert_eq!(parse_time("10").expect("10"), SimTime::from_secs(10));
    assert_eq!(parse_time("250us").expect("us"), SimTime(250_000));
    assert_eq!(parse_time(" 1min ").expect("min"), SimTime::from_secs(60));
    assert!(matches!(
        parse_time("abc"),
        Err(SimError::Parse { what: "time", .. })
    ));
    assert!(parse_time("-1s").is_err());
    assert!(parse_time("3 parsecs").is_err());
}

#[test]
fn parse_data_rate_units() {
    assert_eq!(parse_data_rate("5Mbps").expect("5Mbps"), 5_000_000);
    assert_eq!(parse_data_rate("100kbps").expect("kbps"), 100_000);
    assert_eq!(parse_data_rate("1e6bps").expect("exp"), 1_000_000);
    assert_eq!(parse_data_rate("125kBps").expect("kBps"), 1_000_000);
    assert_eq!(parse_data_rate("1Gbps").expect("Gbps"), 1_000_000_000);
    assert!(parse_data_rate("0Mbps").is_err());
    assert!(parse_data_rate("5Xbps").is_err());
    assert!(parse_data_rate("").is_err());
}

#[test]
fn json_defaults_are_filled() {
    let spec = minimal();
    spec.validate().expect("valid");
    assert_eq!(spec.seed, crate::net::DEFAULT_SEED);
    let ab = &spec.links[0];
    assert_eq!(ab.data_rate, "5Mbps");
    assert_eq!(ab.delay, "2ms");
    assert_eq!(ab.loss_probability, 0.0);
    assert_eq!(ab.queue_packets, 100);
    assert_eq!(spec.links[1].error_unit, ErrorUnit::Byte);
    assert_eq!(spec.flows[0].port, 8080);
    assert!(matches!(
        spec.flows[0].app,
        FlowApp::Paced {
            message_count_limit: Some(10),
            ..
        }
    ));
    assert_eq!(spec.stop().expect("stop"), SimTime::from_secs(10));
}

#[test]
fn dumped_scenario_parses_back() {
    let spec = paced_chain(&PacedChainOpts::default());
    let text = spec.to_json_pretty().expect("dump");
    let back = ScenarioSpec::from_json_str(&text).expect("parse");
    back.validate().expect("valid");
    assert_eq!(back.nodes, spec.nodes);
    assert_eq!(back.links.len(), 3);
}

#[test]
fn validate_rejects_bad_scenarios() {
    let mut s = minimal();
    s.links[0].b = "Z".into();
    assert!(matches!(s.validate(), Err(SimError::UnknownNodeName(n)) if n == "Z"));

    let mut s = minimal();
    s.links[1].loss_probability = 1.5;
    assert!(matches!(
        s.validate(),
        Err(SimError::InvalidLossProbability(p)) if p == 1.5
    ));

    let mut s = minimal();
    let mut dup = s.links[0].clone();
    std::mem::swap(&mut dup.a, &mut dup.b);
    s.links.push(dup);
    assert!(matches!(s.validate(), Err(SimError::Config(_))));

    let mut s = minimal();
    s.links[0].b = "A".into();
    assert!(matches!(s.validate(), Err(SimError::Config(_))));

    let mut s = minimal();
    s.flows[0].stop_time = "1s".into();
    assert!(matches!(s.validate(), Err(SimError::Config(_))));

    let mut s = minimal();
    s.flows[0].sink = "A".into();
    assert!(matches!(s.validate(), Err(SimError::Config(_))));

    let mut s = minimal();
    s.trace.get_or_insert_with(Default::default).flow = 3;
    assert!(matches!(s.validate(), Err(SimError::Config(_))));

    let mut s = minimal();
    s.faults[0].b = "A".into();
    assert!(matches!(s.validate(), Err(SimError::Config(_))));

    let mut s = minimal();
    s.schema_version = 2;
    assert!(matches!(s.validate(), Err(SimError::Config(_))));

    let mut s = minimal();
    s.stop_time = "0s".into();
    assert!(matches!(s.validate(), Err(SimError::Config(_))));

    let mut s = minimal();
    s.links[1].data_rate = "fast".into();
    assert!(matches!(s.validate(), Err(SimError::Parse { .. })));
}

#[test]
fn unknown_app_kind_fails_to_parse() {
    let text = MINIMAL.replace("\"paced\"", "\"onoff\"");
    assert!(matches!(
        ScenarioSpec::from_json_str(&text),
        Err(SimError::Json(_))
    ));
}

#[test]
fn tcp_overrides_merge_with_defaults() {
    let mut s = minimal();
    s.tcp = Some(crate::config::TcpSpec {
        segment_size: Some(1000),
        min_rto: Some("1s".into()),
        ..Default::default()
    });
    let cfg = s.tcp_config().expect("tcp");
    assert_eq!(cfg.segment_size, 1000);
    assert_eq!(cfg.min_rto, SimTime::from_secs(1));
    assert_eq!(cfg.dup_ack_threshold, 3);

    s.tcp.as_mut().expect("tcp").init_rto = Some("soon".into());
    assert!(s.validate().is_err());
}

#[test]
fn presets_validate() {
    paced_chain(&PacedChainOpts::default())
        .validate()
        .expect("paced");
    bulk_chain(&BulkChainOpts::default()).validate().expect("chain");
    let bypass = bypass_chain(&BulkChainOpts::default());
    bypass.validate().expect("bypass");
    assert_eq!(bypass.nodes.len(), 7);
    assert_eq!(bypass.faults.len(), 1);
}

#[test]
fn validate_rejects_zero_send_interval() {
    let mut s = minimal();
    s.flows[0].stop_time = "1.001s".into();
    if let FlowApp::Paced {
        message_size,
        message_count_limit,
        data_rate,
    } = &mut s.flows[0].app
    {
        *message_size = 1;
        *message_count_limit = None;
        *data_rate = "100Gbps".into();
    }
    assert!(matches!(s.validate(), Err(SimError::Config(m)) if m.contains("zero send interval")));
    assert!(crate::scenario::Scenario::build(&s).is_err());

    // 8 bit @ 8Gbps = 1ns，仍然可以推进
    if let FlowApp::Paced { data_rate, .. } = &mut s.flows[0].app {
        *data_rate = "8Gbps".into();
    }
    s.validate().expect("1ns interval");
}
