use anyhow::{Context, Result};
use rdt_lab_abstract::{
    IN_FLIGHT_METRIC, SimConfig, TestAction, TestAssertion, TestScenario, TransportProtocol,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

pub fn load_scenario(path: impl AsRef<Path>) -> Result<TestScenario> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse scenario file {}", path.display()))
}

/// Build a simulator with the scenario's config overrides and actions applied.
pub fn build_simulator(
    scenario: &TestScenario,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> Result<Simulator> {
    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);
    validate_config(&config)
        .with_context(|| format!("Invalid [config] in scenario '{}'", scenario.name))?;
    let mut sim = Simulator::new(config, sender, receiver);
    configure_actions(&mut sim, &scenario.actions);
    Ok(sim)
}

fn validate_config(config: &SimConfig) -> Result<()> {
    anyhow::ensure!(
        config.min_latency <= config.max_latency,
        "min_latency {} exceeds max_latency {}",
        config.min_latency,
        config.max_latency
    );
    for (name, rate) in [
        ("loss_rate", config.loss_rate),
        ("corrupt_rate", config.corrupt_rate),
    ] {
        anyhow::ensure!(
            (0.0..=1.0).contains(&rate),
            "{name} {rate} is outside [0, 1]"
        );
    }
    Ok(())
}

pub fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => sim.schedule_app_send(*time, data.clone()),
            TestAction::DropNextFromSenderSeq { seq } => sim.add_drop_sender_seq_once(*seq),
            TestAction::DropNextFromReceiverAck { ack } => sim.add_drop_receiver_ack_once(*ack),
            TestAction::CorruptNextFromSenderSeq { seq } => sim.add_corrupt_sender_seq_once(*seq),
        }
    }
}

/// Run a scenario to completion and fail if any assertion does not hold.
pub fn run_scenario(
    scenario: &TestScenario,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> Result<SimulationReport> {
    info!("Running scenario '{}': {}", scenario.name, scenario.description);
    let mut sim = build_simulator(scenario, sender, receiver)?;
    sim.run_until_complete();
    let report = sim.export_report();

    let failures = evaluate(&report, &scenario.actions, &scenario.assertions);
    if !failures.is_empty() {
        anyhow::bail!(
            "Scenario '{}' failed {} assertion(s):\n  {}",
            scenario.name,
            failures.len(),
            failures.join("\n  ")
        );
    }
    info!(
        "Scenario '{}' passed {} assertion(s)",
        scenario.name,
        scenario.assertions.len()
    );
    Ok(report)
}

/// Check every assertion, returning a description of each one that failed.
pub fn evaluate(
    report: &SimulationReport,
    actions: &[TestAction],
    assertions: &[TestAssertion],
) -> Vec<String> {
    let mut sends: HashMap<&str, usize> = HashMap::new();
    for action in actions {
        if let TestAction::AppSend { data, .. } = action {
            *sends.entry(data.as_str()).or_default() += 1;
        }
    }
    assertions
        .iter()
        .filter_map(|assertion| check(report, &sends, assertion).err())
        .collect()
}

fn check(
    report: &SimulationReport,
    sends: &HashMap<&str, usize>,
    assertion: &TestAssertion,
) -> Result<(), String> {
    match assertion {
        TestAssertion::DataDelivered { data } => {
            if report.delivered_data.iter().any(|d| d == data) {
                Ok(())
            } else {
                Err(format!("{data:?} was never delivered"))
            }
        }
        TestAssertion::DeliveredInOrder { data } => {
            if &report.delivered_data == data {
                Ok(())
            } else {
                Err(format!(
                    "delivered {:?}, expected {:?}",
                    report.delivered_data, data
                ))
            }
        }
        TestAssertion::NoDuplicateDelivery => {
            // A payload the scenario never scheduled may still arrive once.
            let allowed = |d: &str| sends.get(d).copied().unwrap_or(0).max(1);
            let mut delivered: HashMap<&str, usize> = HashMap::new();
            for d in &report.delivered_data {
                *delivered.entry(d.as_str()).or_default() += 1;
            }
            let mut extra: Vec<(&str, usize)> = delivered
                .into_iter()
                .filter(|&(d, n)| n > allowed(d))
                .collect();
            extra.sort();
            match extra.first() {
                Some(&(dup, n)) => Err(format!(
                    "{dup:?} was delivered {n} times, sent {}",
                    allowed(dup)
                )),
                None => Ok(()),
            }
        }
        TestAssertion::SenderPacketCount { min, max } => {
            let count = report.sender_packet_count;
            if count < *min || max.is_some_and(|m| count > m) {
                Err(format!(
                    "sender sent {count} packets, expected {min}..={}",
                    max.map_or("".to_string(), |m| m.to_string())
                ))
            } else {
                Ok(())
            }
        }
        TestAssertion::MaxInFlight { max } => match report.metric_max(IN_FLIGHT_METRIC) {
            None => Err(format!("{IN_FLIGHT_METRIC} metric never recorded")),
            Some(peak) if peak > f64::from(*max) => {
                Err(format!("{peak} packets in flight, limit {max}"))
            }
            Some(_) => Ok(()),
        },
        TestAssertion::RefusedCount { count } => {
            let refused = report.refused_messages.len();
            if refused == *count as usize {
                Ok(())
            } else {
                Err(format!("{refused} messages refused, expected {count}"))
            }
        }
        TestAssertion::MaxDuration { ms } => {
            if report.duration <= *ms {
                Ok(())
            } else {
                Err(format!("finished at {}, limit {ms}", report.duration))
            }
        }
    }
}
