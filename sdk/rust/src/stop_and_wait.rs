use rdt_lab_abstract::{Packet, SendError, SystemContext, TransportProtocol};

/// The other value of an alternating bit.
fn alternate(bit: u32) -> u32 {
    bit ^ 1
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SenderState {
    Idle,
    /// One packet in flight, retained for retransmission.
    WaitingForAck { packet: Packet },
}

/// Alternating-bit sender: at most one unacknowledged packet.
#[derive(Debug)]
pub struct StopAndWaitSender {
    timeout: u64,
    seq: u32,
    ack: u32,
    state: SenderState,
}

impl StopAndWaitSender {
    pub fn new(timeout: u64) -> Self {
        Self {
            timeout,
            seq: 0,
            ack: 0,
            state: SenderState::Idle,
        }
    }

    /// Sequence number of the outstanding packet, or of the next one when idle.
    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.state, SenderState::WaitingForAck { .. })
    }
}

impl TransportProtocol for StopAndWaitSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.seq = 0;
        self.ack = 0;
        self.state = SenderState::Idle;
        ctx.log("Stop-and-Wait sender ready");
    }

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, data: &str) -> Result<(), SendError> {
        if let SenderState::WaitingForAck { packet } = &self.state {
            ctx.log(&format!(
                "SAW sender busy with seq {}, refusing {} bytes",
                packet.sequence_number,
                data.len()
            ));
            return Err(SendError::Busy {
                seq: packet.sequence_number,
            });
        }

        let packet = Packet::new(self.seq, self.ack, data);
        ctx.log(&format!(
            "SAW send seq={} ack={} ({} bytes)",
            packet.sequence_number,
            packet.ack_number,
            packet.len()
        ));
        ctx.send_packet(packet.clone());
        ctx.start_timer(self.timeout);
        self.state = SenderState::WaitingForAck { packet };
        Ok(())
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if !self.is_waiting() {
            ctx.log(&format!(
                "SAW sender idle, ignoring ACK {}",
                packet.sequence_number
            ));
            return;
        }
        if packet.is_corrupted() {
            ctx.log("SAW sender got corrupted ACK, waiting for timeout");
            return;
        }
        // An ACK carrying the next sequence number repeats an older exchange.
        if packet.sequence_number == alternate(self.seq) {
            ctx.log(&format!(
                "SAW sender got duplicate ACK {}, waiting for timeout",
                packet.sequence_number
            ));
            return;
        }

        ctx.log(&format!("SAW received ACK for seq {}", self.seq));
        ctx.stop_timer();
        self.state = SenderState::Idle;
        self.seq = alternate(self.seq);
        self.ack = alternate(self.ack);
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        ctx.start_timer(self.timeout);
        if let SenderState::WaitingForAck { packet } = &self.state {
            ctx.log(&format!(
                "SAW timeout, retransmitting seq {}",
                packet.sequence_number
            ));
            ctx.send_packet(packet.clone());
        }
    }
}

/// Alternating-bit receiver. Its only state is the expected sequence number.
#[derive(Debug, Default)]
pub struct StopAndWaitReceiver {
    expected: u32,
}

impl StopAndWaitReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }
}

impl TransportProtocol for StopAndWaitReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.expected = 0;
        ctx.log("Stop-and-Wait receiver ready");
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if packet.is_corrupted() {
            ctx.log(&format!(
                "SAW checksum mismatch for seq {} (carried {}), dropping",
                packet.sequence_number, packet.checksum
            ));
            return;
        }

        let seq = packet.sequence_number;
        if seq == self.expected {
            ctx.log(&format!("SAW received seq {} ({} bytes)", seq, packet.len()));
            ctx.deliver_data(&packet.payload);
            ctx.send_packet(Packet::new_ack(seq));
            self.expected = alternate(seq);
        } else if seq == alternate(self.expected) {
            // Our last ACK was lost; repeat it without redelivering.
            ctx.log(&format!("SAW duplicate seq {}, re-ACK", seq));
            ctx.send_packet(Packet::new_ack(seq));
            self.expected = alternate(seq);
        } else {
            ctx.log(&format!("SAW ignoring out-of-range seq {}", seq));
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingContext;

    const TIMEOUT: u64 = 40;

    fn ready_pair(ctx: &mut RecordingContext) -> (StopAndWaitSender, StopAndWaitReceiver) {
        let mut sender = StopAndWaitSender::new(TIMEOUT);
        let mut receiver = StopAndWaitReceiver::new();
        sender.init(ctx);
        receiver.init(ctx);
        (sender, receiver)
    }

    #[test]
    fn first_message_round_trip() {
        let mut sctx = RecordingContext::default();
        let mut rctx = RecordingContext::default();
        let (mut sender, mut receiver) = ready_pair(&mut sctx);

        sender.on_app_data(&mut sctx, "A").unwrap();
        let sent = sctx.take_sent();
        assert_eq!(sent, vec![Packet::with_checksum(0, 0, 65, "A")]);
        assert_eq!(sctx.timer, Some(TIMEOUT));
        assert!(sender.is_waiting());

        receiver.on_packet(&mut rctx, sent[0].clone());
        assert_eq!(rctx.delivered, vec!["A"]);
        let acks = rctx.take_sent();
        assert_eq!(acks, vec![Packet::with_checksum(0, 0, 0, "")]);
        assert_eq!(receiver.expected(), 1);

        sender.on_packet(&mut sctx, acks[0].clone());
        assert!(!sender.is_waiting());
        assert_eq!(sender.seq(), 1);
        assert_eq!(sctx.timer, None);
    }

    #[test]
    fn second_message_uses_flipped_bits() {
        let mut ctx = RecordingContext::default();
        let (mut sender, _) = ready_pair(&mut ctx);

        sender.on_app_data(&mut ctx, "A").unwrap();
        sender.on_packet(&mut ctx, Packet::new_ack(0));
        ctx.take_sent();

        sender.on_app_data(&mut ctx, "B").unwrap();
        assert_eq!(ctx.take_sent(), vec![Packet::new(1, 1, "B")]);
    }

    #[test]
    fn busy_sender_refuses_without_queueing() {
        let mut ctx = RecordingContext::default();
        let (mut sender, _) = ready_pair(&mut ctx);

        sender.on_app_data(&mut ctx, "A").unwrap();
        assert_eq!(
            sender.on_app_data(&mut ctx, "B"),
            Err(SendError::Busy { seq: 0 })
        );
        assert_eq!(ctx.take_sent().len(), 1);

        // After the ACK nothing queued shows up.
        sender.on_packet(&mut ctx, Packet::new_ack(0));
        assert!(ctx.take_sent().is_empty());
    }

    #[test]
    fn corrupted_and_duplicate_acks_are_ignored() {
        let mut ctx = RecordingContext::default();
        let (mut sender, _) = ready_pair(&mut ctx);
        sender.on_app_data(&mut ctx, "A").unwrap();

        let mut bad = Packet::new_ack(0);
        bad.checksum = 99;
        sender.on_packet(&mut ctx, bad);
        assert!(sender.is_waiting());

        sender.on_packet(&mut ctx, Packet::new_ack(1));
        assert!(sender.is_waiting());
        assert_eq!(ctx.timer, Some(TIMEOUT));
        assert_eq!(ctx.timer_stops, 0);
    }

    #[test]
    fn late_ack_while_idle_is_ignored() {
        let mut ctx = RecordingContext::default();
        let (mut sender, _) = ready_pair(&mut ctx);
        sender.on_app_data(&mut ctx, "A").unwrap();
        sender.on_packet(&mut ctx, Packet::new_ack(0));
        let (starts, stops) = (ctx.timer_starts, ctx.timer_stops);

        // A retransmission's ACK arrives after the exchange completed.
        sender.on_packet(&mut ctx, Packet::new_ack(0));
        sender.on_packet(&mut ctx, Packet::new_ack(1));

        assert!(!sender.is_waiting());
        assert_eq!(sender.seq(), 1);
        assert_eq!((ctx.timer_starts, ctx.timer_stops), (starts, stops));
        assert_eq!(ctx.timer, None);
    }

    #[test]
    fn timeout_retransmits_identical_packet() {
        let mut ctx = RecordingContext::default();
        let (mut sender, _) = ready_pair(&mut ctx);
        sender.on_app_data(&mut ctx, "hello").unwrap();
        let original = ctx.take_sent();

        ctx.expire_timer();
        sender.on_timer(&mut ctx);
        assert_eq!(ctx.take_sent(), original);
        assert_eq!(ctx.timer, Some(TIMEOUT));
        assert_eq!(ctx.timer_starts, 2);
    }

    #[test]
    fn lost_ack_does_not_redeliver() {
        let mut ctx = RecordingContext::default();
        let (_, mut receiver) = ready_pair(&mut ctx);
        let packet = Packet::new(0, 0, "A");

        receiver.on_packet(&mut ctx, packet.clone());
        // First ACK lost; the retransmission arrives.
        receiver.on_packet(&mut ctx, packet);

        assert_eq!(ctx.delivered, vec!["A"]);
        assert_eq!(ctx.take_sent(), vec![Packet::new_ack(0), Packet::new_ack(0)]);
        assert_eq!(receiver.expected(), 1);
    }

    #[test]
    fn corrupted_data_gets_no_ack() {
        let mut ctx = RecordingContext::default();
        let (_, mut receiver) = ready_pair(&mut ctx);
        let mut packet = Packet::new(0, 0, "A");
        packet.payload = "B".to_string();

        receiver.on_packet(&mut ctx, packet);
        assert!(ctx.delivered.is_empty());
        assert!(ctx.sent.is_empty());
        assert_eq!(receiver.expected(), 0);
    }
}
