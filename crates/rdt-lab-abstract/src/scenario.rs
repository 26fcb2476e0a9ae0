use crate::config::{ProtocolConfig, SimConfig};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    #[serde(default)]
    pub protocol: ProtocolConfigOverride,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
    pub max_duration: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.max_duration {
            config.max_duration = Some(v);
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProtocolConfigOverride {
    pub timeout: Option<u64>,
    pub window_size: Option<usize>,
}

impl ProtocolConfigOverride {
    pub fn apply_to(&self, config: &mut ProtocolConfig) {
        if let Some(v) = self.timeout {
            config.timeout = v;
        }
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application sends data at a specific time
    AppSend { time: u64, data: String },
    /// Deterministically drop the first packet sent by Sender with given seq number
    DropNextFromSenderSeq { seq: u32 },
    /// Deterministically drop the first ACK sent by Receiver acknowledging `ack`
    DropNextFromReceiverAck { ack: u32 },
    /// Deterministically corrupt the first packet sent by Sender with given seq number
    CorruptNextFromSenderSeq { seq: u32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Assert that specific data was delivered to the application layer
    DataDelivered { data: String },
    /// Assert that exactly this sequence of messages was delivered, in order
    DeliveredInOrder { data: Vec<String> },
    /// Assert that no payload was delivered more often than the scenario's
    /// `app_send` actions scheduled it
    NoDuplicateDelivery,
    /// Assert that the total number of packets sent by Sender is within range
    SenderPacketCount { min: u32, max: Option<u32> },
    /// Assert that the `in_flight` metric was recorded and never exceeded `max`
    MaxInFlight { max: u32 },
    /// Assert how many application messages the sender refused
    RefusedCount { count: u32 },
    /// Assert that simulation finishes within time
    MaxDuration { ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_scenario() {
        let text = r#"
            name = "gbn-loss"
            description = "one data packet lost"

            [config]
            loss_rate = 0.0
            seed = 7

            [protocol]
            window_size = 3

            [[actions]]
            type = "app_send"
            time = 0
            data = "A"

            [[actions]]
            type = "drop_next_from_sender_seq"
            seq = 0

            [[assertions]]
            type = "delivered_in_order"
            data = ["A"]

            [[assertions]]
            type = "no_duplicate_delivery"

            [[assertions]]
            type = "sender_packet_count"
            min = 2
        "#;
        let scenario: TestScenario = toml::from_str(text).unwrap();
        assert_eq!(scenario.name, "gbn-loss");
        assert_eq!(scenario.actions.len(), 2);
        assert!(matches!(
            scenario.actions[1],
            TestAction::DropNextFromSenderSeq { seq: 0 }
        ));
        assert!(matches!(
            scenario.assertions[2],
            TestAssertion::SenderPacketCount { min: 2, max: None }
        ));

        let mut protocol = ProtocolConfig::default();
        scenario.protocol.apply_to(&mut protocol);
        assert_eq!(protocol.window_size, 3);
        assert_eq!(protocol.timeout, ProtocolConfig::default().timeout);
    }

    #[test]
    fn overrides_leave_unset_fields_alone() {
        let scenario: TestScenario = toml::from_str("name = \"bare\"").unwrap();
        assert!(scenario.actions.is_empty());

        let mut config = SimConfig::default();
        let over = SimConfigOverride {
            corrupt_rate: Some(0.25),
            max_duration: Some(5_000),
            ..Default::default()
        };
        over.apply_to(&mut config);
        assert_eq!(config.corrupt_rate, 0.25);
        assert_eq!(config.max_duration, Some(5_000));
        assert_eq!(config.max_latency, SimConfig::default().max_latency);
    }
}
