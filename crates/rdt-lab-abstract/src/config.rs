use serde::{Deserialize, Serialize};

/// Channel model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
    /// Events scheduled after this time are left unprocessed.
    pub max_duration: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            min_latency: 10,
            max_latency: 100,
            seed: 0,
            max_duration: None,
        }
    }
}

/// Tunables shared by the built-in ARQ endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Retransmission timeout. Keep it above the worst round trip, otherwise
    /// stale duplicates can outlive the alternating sequence space.
    pub timeout: u64,
    /// Go-Back-N window. Stop-and-Wait ignores it.
    pub window_size: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            timeout: 250,
            window_size: 4,
        }
    }
}
