use rdt_lab_abstract::SimConfig;
use serde::Serialize;
use std::collections::HashMap;

use crate::engine::LinkEventSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    /// Simulated time of the last processed event.
    pub duration: u64,
    pub delivered_data: Vec<String>,
    pub sender_packet_count: u32,
    pub receiver_packet_count: u32,
    pub refused_messages: Vec<String>,
    pub timer_violations: u32,
    pub metrics: HashMap<String, Vec<(u64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
}

impl SimulationReport {
    /// Largest sample recorded for `name`, if the metric was ever reported.
    pub fn metric_max(&self, name: &str) -> Option<f64> {
        self.metrics
            .get(name)?
            .iter()
            .map(|(_, v)| *v)
            .reduce(f64::max)
    }
}
