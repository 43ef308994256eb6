use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "tcpchain-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_file(dir: &PathBuf, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write temp file");
    path
}

fn stdout_value<'a>(stdout: &'a str, key: &str) -> Option<&'a str> {
    let prefix = format!("{key}=");
    stdout
        .split_whitespace()
        .find_map(|tok| tok.strip_prefix(prefix.as_str()))
}

#[test]
fn paced_preset_writes_trace_files() {
    let dir = unique_temp_dir("paced-trace");
    let cwnd = dir.join("cwnd.data");
    let ssthresh = dir.join("ssthresh.data");
    let combined = dir.join("combined.data");
    let report = dir.join("report.json");

    let output = Command::new(env!("CARGO_BIN_EXE_tcpchain"))
        .args([
            "--preset",
            "paced",
            "--cwnd-out",
            cwnd.to_str().unwrap(),
            "--ssthresh-out",
            ssthresh.to_str().unwrap(),
            "--combined-out",
            combined.to_str().unwrap(),
            "--report-json",
            report.to_str().unwrap(),
        ])
        .output()
        .expect("run tcpchain");
    assert!(
        output.status.success(),
        "tcpchain failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout_value(&stdout, "end_time"), Some("20"));
    let samples: usize = stdout_value(&stdout, "samples")
        .expect("samples line")
        .parse()
        .expect("samples count");
    assert!(samples > 0);
    assert!(stdout.contains("kind=paced"), "stdout={stdout}");
    assert!(stdout.contains("kind=sink"), "stdout={stdout}");

    let cwnd_raw = fs::read_to_string(&cwnd).expect("read cwnd");
    let ssthresh_raw = fs::read_to_string(&ssthresh).expect("read ssthresh");
    let combined_raw = fs::read_to_string(&combined).expect("read combined");
    assert_eq!(cwnd_raw.lines().count(), samples);
    assert_eq!(ssthresh_raw.lines().count(), samples);

    let mut last_t = 0.0_f64;
    for (c, (s, m)) in cwnd_raw
        .lines()
        .zip(ssthresh_raw.lines().zip(combined_raw.lines()))
    {
        let c: Vec<&str> = c.split('\t').collect();
        let s: Vec<&str> = s.split('\t').collect();
        let m: Vec<&str> = m.split('\t').collect();
        assert_eq!((c.len(), s.len(), m.len()), (2, 2, 3));
        assert_eq!(c[0], s[0]);
        assert_eq!(c[0], m[0]);
        assert_eq!(c[1], m[1]);
        assert_eq!(s[1], m[2]);
        let t: f64 = c[0].parse().expect("time");
        assert!(t >= last_t, "time went backwards: {t} < {last_t}");
        last_t = t;
    }

    let v: Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("read report")).expect("json");
    assert_eq!(v["sample_count"].as_u64(), Some(samples as u64));
    assert!(v.get("samples").is_none());
    assert!(v["stats"]["delivered_pkts"].as_u64().unwrap_or(0) > 0);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn bypass_preset_recomputes_routes() {
    let output = Command::new(env!("CARGO_BIN_EXE_tcpchain"))
        .args(["--preset", "bypass", "--stop", "5s"])
        .output()
        .expect("run tcpchain");
    assert!(
        output.status.success(),
        "tcpchain failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout_value(&stdout, "routes_version"), Some("2"));
    assert_eq!(stdout_value(&stdout, "end_time"), Some("5"));
}

#[test]
fn scenario_file_runs() {
    let dir = unique_temp_dir("scenario-file");
    let scenario = write_file(
        &dir,
        "scenario.json",
        r#"
{
    "schema_version": 1,
    "stop_time": "3s",
    "nodes": ["A", "B"],
    "links": [ { "a": "A", "b": "B", "data_rate": "10Mbps" } ],
    "flows": [
        { "source": "A", "sink": "B", "start_time": "0s", "stop_time": "3s",
          "app": { "kind": "bulk", "max_bytes": 10000 } }
    ]
}
        "#,
    );

    let output = Command::new(env!("CARGO_BIN_EXE_tcpchain"))
        .args(["--scenario", scenario.to_str().unwrap()])
        .output()
        .expect("run tcpchain");
    assert!(
        output.status.success(),
        "tcpchain failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("bytes_received=10000"), "stdout={stdout}");
    assert_eq!(stdout_value(&stdout, "samples"), Some("0"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn dump_scenario_prints_json() {
    let output = Command::new(env!("CARGO_BIN_EXE_tcpchain"))
        .args(["--preset", "chain", "--seed", "42", "--dump-scenario"])
        .output()
        .expect("run tcpchain");
    assert!(output.status.success());
    let v: Value = serde_json::from_slice(&output.stdout).expect("scenario json");
    assert_eq!(v["seed"].as_u64(), Some(42));
    assert_eq!(v["stop_time"].as_str(), Some("31s"));
    assert_eq!(v["flows"][0]["app"]["kind"].as_str(), Some("bulk"));
}

#[test]
fn invalid_ber_exits_nonzero() {
    let output = Command::new(env!("CARGO_BIN_EXE_tcpchain"))
        .args(["--ber", "2.0"])
        .output()
        .expect("run tcpchain");
    assert!(!output.status.success(), "expected non-zero exit");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid loss probability"),
        "stderr did not contain expected message: {stderr}"
    );
}

#[test]
fn invalid_scenario_exits_nonzero() {
    let dir = unique_temp_dir("bad-scenario");
    let scenario = write_file(
        &dir,
        "scenario.json",
        r#"
{
    "schema_version": 1,
    "stop_time": "3s",
    "nodes": ["A", "B"],
    "links": [ { "a": "A", "b": "C" } ]
}
        "#,
    );

    let output = Command::new(env!("CARGO_BIN_EXE_tcpchain"))
        .args(["--scenario", scenario.to_str().unwrap()])
        .output()
        .expect("run tcpchain");
    assert!(!output.status.success(), "expected non-zero exit");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("unknown node name: C"),
        "stderr did not contain expected message: {stderr}"
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unknown_flag_exits_nonzero() {
    let output = Command::new(env!("CARGO_BIN_EXE_tcpchain"))
        .args(["--no-such-flag"])
        .output()
        .expect("run tcpchain");
    assert!(!output.status.success());
}
