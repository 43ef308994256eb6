use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tcpchain_sim::config::{FlowApp, ScenarioSpec};
use tcpchain_sim::error::Result;
use tcpchain_sim::scenario::Scenario;
use tcpchain_sim::topo::{BulkChainOpts, PacedChainOpts, bulk_chain, bypass_chain, paced_chain};
use tcpchain_sim::trace::format_seconds;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    /// A-B-C-D, 5Mbps/2ms, paced sender 1040B x 1000
    Paced,
    /// A-B-C-D, 1Mbps/10ms, bulk sender 1,000,000B
    Chain,
    /// chain plus bypass A-E-F-G-D, B-C goes down at 2s
    Bypass,
}

#[derive(Debug, Parser)]
#[command(
    name = "tcpchain",
    about = "Simulate a TCP flow over a lossy multi-hop chain and trace cwnd/ssthresh"
)]
struct Args {
    /// Path to scenario.json
    #[arg(long, conflicts_with = "preset")]
    scenario: Option<PathBuf>,

    /// Built-in topology (default: paced)
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Byte error rate on the B-C link (presets only)
    #[arg(long)]
    ber: Option<f64>,

    /// Paced sender data rate, e.g. 5Mbps
    #[arg(long)]
    data_rate: Option<String>,

    /// Loss sampling seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override global stop time, e.g. 20s
    #[arg(long)]
    stop: Option<String>,

    /// Output file for `time\tcwnd` records
    #[arg(long)]
    cwnd_out: Option<PathBuf>,

    /// Output file for `time\tssthresh` records
    #[arg(long)]
    ssthresh_out: Option<PathBuf>,

    /// Output file for `time\tcwnd\tssthresh` records
    #[arg(long)]
    combined_out: Option<PathBuf>,

    /// Write the run report as JSON
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Print the resolved scenario as JSON and exit
    #[arg(long)]
    dump_scenario: bool,
}

fn resolve_spec(args: &Args) -> Result<ScenarioSpec> {
    let mut spec = match (&args.scenario, args.preset.unwrap_or(Preset::Paced)) {
        (Some(path), _) => {
            let mut spec = ScenarioSpec::from_path(path)?;
            if args.ber.is_some() {
                warn!("--ber only applies to presets, ignored");
            }
            if let Some(rate) = &args.data_rate {
                for f in &mut spec.flows {
                    if let FlowApp::Paced { data_rate, .. } = &mut f.app {
                        *data_rate = rate.clone();
                    }
                }
            }
            spec
        }
        (None, Preset::Paced) => {
            let mut opts = PacedChainOpts::default();
            if let Some(ber) = args.ber {
                opts.ber = ber;
            }
            if let Some(rate) = &args.data_rate {
                opts.data_rate = rate.clone();
            }
            paced_chain(&opts)
        }
        (None, preset) => {
            let mut opts = BulkChainOpts::default();
            if let Some(ber) = args.ber {
                opts.ber = ber;
            }
            if args.data_rate.is_some() {
                warn!("--data-rate only applies to paced senders, ignored");
            }
            if preset == Preset::Bypass {
                bypass_chain(&opts)
            } else {
                bulk_chain(&opts)
            }
        }
    };

    if let Some(seed) = args.seed {
        spec.seed = seed;
    }
    if let Some(stop) = &args.stop {
        spec.stop_time = stop.clone();
    }
    if args.cwnd_out.is_some() || args.ssthresh_out.is_some() || args.combined_out.is_some() {
        let trace = spec.trace.get_or_insert_with(Default::default);
        if args.cwnd_out.is_some() {
            trace.cwnd_path = args.cwnd_out.clone();
        }
        if args.ssthresh_out.is_some() {
            trace.ssthresh_path = args.ssthresh_out.clone();
        }
        if args.combined_out.is_some() {
            trace.combined_path = args.combined_out.clone();
        }
    }
    Ok(spec)
}

fn run(args: &Args) -> Result<()> {
    let spec = resolve_spec(args)?;
    if args.dump_scenario {
        println!("{}", spec.to_json_pretty()?);
        return Ok(());
    }

    let report = Scenario::build(&spec)?.run()?;

    println!(
        "end_time={} events_executed={} events_discarded={} routes_version={}",
        format_seconds(report.end_time_secs),
        report.events_executed,
        report.events_discarded,
        report.routes_version
    );
    let s = &report.stats;
    println!(
        "delivered_pkts={} delivered_bytes={} lost_pkts={} queue_drops={} no_route_drops={} link_down_drops={}",
        s.delivered_pkts,
        s.delivered_bytes,
        s.lost_pkts,
        s.queue_drops,
        s.no_route_drops,
        s.link_down_drops
    );
    for a in &report.apps {
        println!(
            "app name={} kind={} state={} packets_sent={} bytes_sent={} bytes_received={}",
            a.name, a.kind, a.state, a.packets_sent, a.bytes_sent, a.bytes_received
        );
    }
    println!("samples={}", report.sample_count);

    if let Some(path) = &args.report_json {
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        eprintln!("wrote run report to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
