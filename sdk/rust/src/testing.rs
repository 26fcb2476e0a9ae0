use rdt_lab_abstract::{Packet, SystemContext};

/// Records every side effect a protocol asks for, in call order.
#[derive(Default)]
pub struct RecordingContext {
    pub now: u64,
    pub sent: Vec<Packet>,
    pub delivered: Vec<String>,
    pub logs: Vec<String>,
    pub metrics: Vec<(String, f64)>,
    /// Delay of the armed timer, if any.
    pub timer: Option<u64>,
    pub timer_starts: u32,
    pub timer_stops: u32,
}

impl RecordingContext {
    pub fn take_sent(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.sent)
    }

    /// Disarm the timer as the simulator does right before calling `on_timer`.
    pub fn expire_timer(&mut self) {
        assert!(self.timer.take().is_some(), "no timer armed");
    }

    pub fn last_metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.sent.push(packet);
    }

    fn start_timer(&mut self, delay: u64) {
        assert!(self.timer.is_none(), "timer started while already armed");
        self.timer = Some(delay);
        self.timer_starts += 1;
    }

    fn stop_timer(&mut self) {
        self.timer = None;
        self.timer_stops += 1;
    }

    fn deliver_data(&mut self, data: &str) {
        self.delivered.push(data.to_string());
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.metrics.push((name.to_string(), value));
    }
}
