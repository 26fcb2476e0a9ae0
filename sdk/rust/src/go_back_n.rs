use std::collections::VecDeque;

use rdt_lab_abstract::{IN_FLIGHT_METRIC, Packet, SendError, SystemContext, TransportProtocol};

/// Go-Back-N sender with a fixed window and a single timer for the oldest
/// unacknowledged packet.
///
/// ```text
///  base               next_seq
///    │                   │
///  ──┼───────────────────┼──────────────▶ seq space
///    │ <── in flight ──▶ │ <── usable (window_size - in flight)
/// ```
#[derive(Debug)]
pub struct GoBackNSender {
    timeout: u64,
    window_size: usize,
    requested_window: usize,
    base: u32,
    next_seq: u32,
    /// Packets `base..next_seq`, oldest at the front.
    outstanding: VecDeque<Packet>,
}

impl GoBackNSender {
    /// A `window_size` of 0 is raised to 1.
    pub fn new(timeout: u64, requested_window: usize) -> Self {
        let window_size = requested_window.max(1);
        Self {
            timeout,
            window_size,
            requested_window,
            base: 0,
            next_seq: 0,
            outstanding: VecDeque::with_capacity(window_size),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn in_flight(&self) -> usize {
        self.outstanding.len()
    }

    pub fn can_send(&self) -> bool {
        self.outstanding.len() < self.window_size
    }

    fn report_in_flight(&self, ctx: &mut dyn SystemContext) {
        ctx.record_metric(IN_FLIGHT_METRIC, self.outstanding.len() as f64);
    }
}

impl TransportProtocol for GoBackNSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.base = 0;
        self.next_seq = 0;
        self.outstanding.clear();
        if self.requested_window != self.window_size {
            ctx.log(&format!(
                "GBN window size {} is unusable, clamped to {}",
                self.requested_window, self.window_size
            ));
        }
        ctx.log(&format!(
            "Go-Back-N sender ready (window={})",
            self.window_size
        ));
    }

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, data: &str) -> Result<(), SendError> {
        if !self.can_send() {
            ctx.log(&format!(
                "GBN window full [{}, {}), refusing {} bytes",
                self.base,
                self.next_seq,
                data.len()
            ));
            return Err(SendError::WindowFull {
                base: self.base,
                next_seq: self.next_seq,
                window_size: self.window_size,
            });
        }

        let packet = Packet::new(self.next_seq, 0, data);
        ctx.log(&format!(
            "GBN send seq={} ({} bytes)",
            packet.sequence_number,
            packet.len()
        ));
        ctx.send_packet(packet.clone());
        self.outstanding.push_back(packet);
        self.next_seq += 1;
        if self.outstanding.len() == 1 {
            ctx.start_timer(self.timeout);
        }
        self.report_in_flight(ctx);
        Ok(())
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if packet.is_corrupted() {
            ctx.log("GBN sender got corrupted ACK, ignoring");
            return;
        }

        let acked = packet.sequence_number;
        if acked < self.base || acked >= self.next_seq {
            ctx.log(&format!(
                "GBN stale ACK {} outside [{}, {})",
                acked, self.base, self.next_seq
            ));
            return;
        }

        // Cumulative: everything up to and including `acked` is confirmed.
        while self
            .outstanding
            .front()
            .is_some_and(|p| p.sequence_number <= acked)
        {
            self.outstanding.pop_front();
        }
        self.base = acked + 1;
        ctx.log(&format!("GBN ACK {} slides base to {}", acked, self.base));

        ctx.stop_timer();
        if !self.outstanding.is_empty() {
            ctx.start_timer(self.timeout);
        }
        self.report_in_flight(ctx);
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        if self.outstanding.is_empty() {
            return;
        }
        ctx.log(&format!(
            "GBN timeout, going back to {} ({} packets)",
            self.base,
            self.outstanding.len()
        ));
        for packet in &self.outstanding {
            ctx.send_packet(packet.clone());
        }
        ctx.start_timer(self.timeout);
    }
}

/// Go-Back-N receiver: strict in-order acceptance, nothing buffered.
#[derive(Debug, Default)]
pub struct GoBackNReceiver {
    expected: u32,
}

impl GoBackNReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }
}

impl TransportProtocol for GoBackNReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.expected = 0;
        ctx.log("Go-Back-N receiver ready");
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if !packet.is_corrupted() && packet.sequence_number == self.expected {
            ctx.log(&format!(
                "GBN received seq {} ({} bytes)",
                self.expected,
                packet.len()
            ));
            ctx.deliver_data(&packet.payload);
            ctx.send_packet(Packet::new_ack(self.expected));
            self.expected += 1;
            return;
        }

        // Nothing has been accepted yet when expected == 0, so there is no ACK to repeat.
        match self.expected.checked_sub(1) {
            Some(last) => {
                ctx.log(&format!(
                    "GBN discarding seq {} (expect {}), re-ACK {}",
                    packet.sequence_number, self.expected, last
                ));
                ctx.send_packet(Packet::new_ack(last));
            }
            None => ctx.log(&format!(
                "GBN discarding seq {} before first delivery",
                packet.sequence_number
            )),
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingContext;

    const TIMEOUT: u64 = 100;

    fn sender_with(window: usize, messages: u32, ctx: &mut RecordingContext) -> GoBackNSender {
        let mut sender = GoBackNSender::new(TIMEOUT, window);
        sender.init(ctx);
        for i in 0..messages {
            sender.on_app_data(ctx, &format!("m{i}")).unwrap();
        }
        sender
    }

    fn seqs(packets: &[Packet]) -> Vec<u32> {
        packets.iter().map(|p| p.sequence_number).collect()
    }

    #[test]
    fn fills_window_then_refuses() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(3, 3, &mut ctx);

        assert_eq!(seqs(&ctx.take_sent()), vec![0, 1, 2]);
        assert_eq!(ctx.timer_starts, 1);
        assert_eq!(ctx.last_metric(IN_FLIGHT_METRIC), Some(3.0));
        assert_eq!(
            sender.on_app_data(&mut ctx, "overflow"),
            Err(SendError::WindowFull {
                base: 0,
                next_seq: 3,
                window_size: 3
            })
        );
        assert!(ctx.sent.is_empty());
        assert_eq!(sender.in_flight(), 3);
    }

    #[test]
    fn cumulative_ack_slides_past_confirmed_packets() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(8, 8, &mut ctx);
        sender.on_packet(&mut ctx, Packet::new_ack(4));
        assert_eq!(sender.base(), 5);
        assert_eq!(sender.in_flight(), 3);
        assert_eq!(ctx.timer, Some(TIMEOUT));

        sender.on_packet(&mut ctx, Packet::new_ack(7));
        assert_eq!(sender.base(), 8);
        assert_eq!(sender.in_flight(), 0);
        assert_eq!(ctx.timer, None);
        assert_eq!(ctx.last_metric(IN_FLIGHT_METRIC), Some(0.0));
    }

    #[test]
    fn timeout_goes_back_over_whole_window() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(8, 8, &mut ctx);
        sender.on_packet(&mut ctx, Packet::new_ack(4));
        assert_eq!((sender.base(), sender.next_seq()), (5, 8));
        ctx.take_sent();

        ctx.expire_timer();
        sender.on_timer(&mut ctx);
        let resent = ctx.take_sent();
        assert_eq!(seqs(&resent), vec![5, 6, 7]);
        assert_eq!(resent[0], Packet::new(5, 0, "m5"));
        assert_eq!(ctx.timer, Some(TIMEOUT));
    }

    #[test]
    fn stale_and_corrupted_acks_change_nothing() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(4, 4, &mut ctx);
        sender.on_packet(&mut ctx, Packet::new_ack(1));
        let stops = ctx.timer_stops;

        sender.on_packet(&mut ctx, Packet::new_ack(0));
        sender.on_packet(&mut ctx, Packet::new_ack(9));
        let mut bad = Packet::new_ack(3);
        bad.sequence_number = 2;
        sender.on_packet(&mut ctx, bad);

        assert_eq!(sender.base(), 2);
        assert_eq!(sender.in_flight(), 2);
        assert_eq!(ctx.timer_stops, stops);
    }

    #[test]
    fn zero_window_is_clamped_and_logged() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(0, 1, &mut ctx);

        assert!(ctx.logs.iter().any(|l| l.contains("clamped to 1")));
        assert_eq!(
            sender.on_app_data(&mut ctx, "m1"),
            Err(SendError::WindowFull {
                base: 0,
                next_seq: 1,
                window_size: 1
            })
        );
    }

    #[test]
    fn window_frees_up_after_ack() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(2, 2, &mut ctx);
        assert!(!sender.can_send());
        sender.on_packet(&mut ctx, Packet::new_ack(0));
        sender.on_app_data(&mut ctx, "m2").unwrap();
        assert_eq!(sender.next_seq(), 3);
        assert_eq!(sender.in_flight(), 2);
    }

    #[test]
    fn receiver_accepts_only_in_order() {
        let mut ctx = RecordingContext::default();
        let mut receiver = GoBackNReceiver::new();
        receiver.init(&mut ctx);

        receiver.on_packet(&mut ctx, Packet::new(0, 0, "a"));
        receiver.on_packet(&mut ctx, Packet::new(2, 0, "c"));
        receiver.on_packet(&mut ctx, Packet::new(1, 0, "b"));
        receiver.on_packet(&mut ctx, Packet::new(2, 0, "c"));

        assert_eq!(ctx.delivered, vec!["a", "b", "c"]);
        assert_eq!(seqs(&ctx.take_sent()), vec![0, 0, 1, 2]);
        assert_eq!(receiver.expected(), 3);
    }

    #[test]
    fn receiver_re_acks_last_good_on_corruption() {
        let mut ctx = RecordingContext::default();
        let mut receiver = GoBackNReceiver::new();

        let mut early = Packet::new(0, 0, "a");
        early.payload = "z".to_string();
        receiver.on_packet(&mut ctx, early);
        assert!(ctx.take_sent().is_empty());

        receiver.on_packet(&mut ctx, Packet::new(0, 0, "a"));
        let mut damaged = Packet::new(1, 0, "b");
        damaged.checksum += 1;
        receiver.on_packet(&mut ctx, damaged);

        assert_eq!(ctx.delivered, vec!["a"]);
        assert_eq!(ctx.take_sent(), vec![Packet::new_ack(0), Packet::new_ack(0)]);
    }
}
