use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rdt_lab_abstract::{ProtocolConfig, SimConfig};
use rdt_lab_rust::{BuiltinProtocol, builtin_by_name};
use rdt_lab_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stop-and-Wait / Go-Back-N ARQ simulator")]
struct Args {
    /// Protocol to run: `saw` (Stop-and-Wait) or `gbn` (Go-Back-N).
    #[arg(long, default_value = "saw")]
    protocol: String,

    /// Load a scenario from disk instead of the generated message stream.
    #[arg(long)]
    scenario: Option<PathBuf>,

    #[arg(long, default_value_t = 0.1)]
    loss_rate: f64,
    #[arg(long, default_value_t = 0.1)]
    corrupt_rate: f64,
    #[arg(long, default_value_t = 10)]
    min_latency: u64,
    #[arg(long, default_value_t = 100)]
    max_latency: u64,
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Stop processing events after this simulated time.
    #[arg(long)]
    max_duration: Option<u64>,

    /// Number of application messages to generate.
    #[arg(long, default_value_t = 10)]
    messages: u32,

    /// Simulated time between generated messages.
    #[arg(long, default_value_t = 300)]
    interval: u64,

    /// Retransmission timeout.
    #[arg(long, default_value_t = ProtocolConfig::default().timeout)]
    timeout: u64,

    /// Go-Back-N window size.
    #[arg(long, default_value_t = ProtocolConfig::default().window_size)]
    window: usize,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();
    info!("rdt-lab-sim-cli starting…");

    let protocol = builtin_by_name(&args.protocol)?;
    let report = match &args.scenario {
        Some(path) => run_scenario(&args, protocol, path)?,
        None => run_default_sim(&args, protocol),
    };
    log_summary(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    fn protocol_config(&self) -> ProtocolConfig {
        ProtocolConfig {
            timeout: self.timeout,
            window_size: self.window,
        }
    }

    fn sim_config(&self) -> SimConfig {
        SimConfig {
            loss_rate: self.loss_rate,
            corrupt_rate: self.corrupt_rate,
            min_latency: self.min_latency,
            max_latency: self.max_latency.max(self.min_latency),
            seed: self.seed,
            max_duration: self.max_duration,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_default_sim(args: &Args, protocol: BuiltinProtocol) -> SimulationReport {
    let (sender, receiver) = protocol.pair(&args.protocol_config());
    let mut sim = Simulator::new(args.sim_config(), sender, receiver);
    for i in 0..args.messages {
        sim.schedule_app_send(u64::from(i) * args.interval, format!("Packet {}", i + 1));
    }
    info!(
        "Starting {:?} simulation with {} messages…",
        protocol, args.messages
    );
    sim.run_until_complete();
    info!("Simulation complete.");
    sim.export_report()
}

fn run_scenario(args: &Args, protocol: BuiltinProtocol, path: &Path) -> Result<SimulationReport> {
    let scenario = scenario_runner::load_scenario(path)?;
    let mut config = args.protocol_config();
    scenario.protocol.apply_to(&mut config);
    let (sender, receiver) = protocol.pair(&config);
    scenario_runner::run_scenario(&scenario, sender, receiver)
}

fn log_summary(report: &SimulationReport) {
    info!(
        "Simulation time: {} | sender packets: {} | receiver packets: {} | deliveries: {} | refused: {}",
        report.duration,
        report.sender_packet_count,
        report.receiver_packet_count,
        report.delivered_data.len(),
        report.refused_messages.len()
    );
    if report.timer_violations > 0 {
        tracing::warn!(
            "Protocol restarted a running timer {} time(s)",
            report.timer_violations
        );
    }
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
