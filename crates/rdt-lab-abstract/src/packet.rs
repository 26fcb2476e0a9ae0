use serde::{Deserialize, Serialize};

/// Additive checksum: `seq + ack + sum of payload bytes`, wrapping on overflow.
///
/// This only catches damage that changes the sum. Two flipped bits that cancel
/// each other out go unnoticed.
pub fn checksum(seq: u32, ack: u32, payload: &str) -> u32 {
    payload
        .bytes()
        .fold(seq.wrapping_add(ack), |sum, b| sum.wrapping_add(b as u32))
}

/// The unit exchanged over the simulated channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Packet {
    /// Sequence number of a data packet, or the acknowledged sequence number of an ACK.
    pub sequence_number: u32,
    /// Acknowledgment field. Stop-and-Wait senders alternate it; receivers leave it at 0.
    pub ack_number: u32,
    /// Carried checksum as computed by the sender of this packet.
    pub checksum: u32,
    /// Application payload, empty for pure ACKs.
    pub payload: String,
}

impl Packet {
    /// Build a packet with a freshly computed checksum.
    pub fn new(seq: u32, ack: u32, payload: impl Into<String>) -> Self {
        let payload = payload.into();
        Self {
            sequence_number: seq,
            ack_number: ack,
            checksum: checksum(seq, ack, &payload),
            payload,
        }
    }

    /// Build a packet carrying an explicit checksum, e.g. one read back from a trace.
    pub fn with_checksum(seq: u32, ack: u32, check: u32, payload: impl Into<String>) -> Self {
        Self {
            sequence_number: seq,
            ack_number: ack,
            checksum: check,
            payload: payload.into(),
        }
    }

    /// Create a pure ACK for `seq`.
    pub fn new_ack(seq: u32) -> Self {
        Self::new(seq, 0, String::new())
    }

    /// Recompute the checksum from the carried fields and compare.
    pub fn is_corrupted(&self) -> bool {
        checksum(self.sequence_number, self.ack_number, &self.payload) != self.checksum
    }

    pub fn is_ack(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
