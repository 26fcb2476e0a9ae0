use crate::trace::SimulationReport;
use rand::Rng;
use rdt_lab_abstract::{Packet, SimConfig};
use rdt_lab_abstract::{SystemContext, TransportProtocol};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival { to: NodeId, packet: Packet },
    TimerExpiry { node: NodeId, generation: u64 },
    AppSend { data: String },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events for visualization.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

#[derive(Debug, Clone, Copy)]
enum TimerOp {
    Start(u64),
    Stop,
}

/// Per-node timer bookkeeping. Bumping `generation` invalidates queued expiries.
#[derive(Debug, Default, Clone, Copy)]
struct TimerSlot {
    generation: u64,
    armed: bool,
}

/// Actions buffered during a protocol handler call
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    timer_ops: Vec<TimerOp>,
    logs: Vec<String>,
    delivered_data: Vec<String>,
    metrics: Vec<(String, f64)>,
}

/// Context implementation passed to the protocol
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl SystemContext for ScopedContext<'_> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, delay: u64) {
        self.buffer.timer_ops.push(TimerOp::Start(delay));
    }

    fn stop_timer(&mut self) {
        self.buffer.timer_ops.push(TimerOp::Stop);
    }

    fn deliver_data(&mut self, data: &str) {
        self.buffer.delivered_data.push(data.to_string());
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.buffer.metrics.push((name.to_string(), value));
    }
}

pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    rng: rand::rngs::StdRng,

    pub sender: Box<dyn TransportProtocol>,
    pub receiver: Box<dyn TransportProtocol>,

    // Stats for the report
    pub delivered_data: Vec<String>,
    pub sender_packet_count: u32,
    pub receiver_packet_count: u32,
    /// Application messages the sender refused (busy or window full).
    pub refused_messages: Vec<String>,
    /// Times a node armed its timer while it was already running.
    pub timer_violations: u32,

    /// Arbitrary time-series metrics recorded via `SystemContext::record_metric`
    /// Key: metric name (e.g., "in_flight"), Value: Vec<(time, value)>
    pub metrics: HashMap<String, Vec<(u64, f64)>>,

    // Deterministic fault injection, each entry consumed by its first match
    drop_sender_seq_once: Vec<u32>,
    drop_receiver_ack_once: Vec<u32>,
    corrupt_sender_seq_once: Vec<u32>,

    /// Timeline of link events (drops, corruptions, sends, deliveries).
    pub link_events: Vec<LinkEventSummary>,

    timers: HashMap<NodeId, TimerSlot>,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        sender: Box<dyn TransportProtocol>,
        receiver: Box<dyn TransportProtocol>,
    ) -> Self {
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            rng,
            sender,
            receiver,
            delivered_data: Vec::new(),
            sender_packet_count: 0,
            receiver_packet_count: 0,
            refused_messages: Vec::new(),
            timer_violations: 0,
            metrics: HashMap::new(),
            drop_sender_seq_once: Vec::new(),
            drop_receiver_ack_once: Vec::new(),
            corrupt_sender_seq_once: Vec::new(),
            link_events: Vec::new(),
            timers: HashMap::new(),
        }
    }

    /// Register a deterministic fault: drop the first packet sent by Sender whose seq equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: u32) {
        self.drop_sender_seq_once.push(seq);
    }

    /// Register a deterministic fault: drop the first ACK sent by Receiver acknowledging `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: u32) {
        self.drop_receiver_ack_once.push(ack);
    }

    /// Register a deterministic fault: corrupt the first packet sent by Sender whose seq equals `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: u32) {
        self.corrupt_sender_seq_once.push(seq);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Return a slice of (time, value) samples for a named metric, if present.
    pub fn metric_series(&self, name: &str) -> Option<&[(u64, f64)]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, data: impl Into<String>) {
        self.push_event(time, EventType::AppSend { data: data.into() });
    }

    pub fn init(&mut self) {
        let mut buffer = ActionBuffer::default();
        let mut ctx = ScopedContext {
            buffer: &mut buffer,
            now: self.time,
        };
        self.sender.init(&mut ctx);
        self.process_actions(NodeId::Sender, buffer);

        let mut buffer = ActionBuffer::default();
        let mut ctx = ScopedContext {
            buffer: &mut buffer,
            now: self.time,
        };
        self.receiver.init(&mut ctx);
        self.process_actions(NodeId::Receiver, buffer);
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Process the next event. Returns false once the queue is empty or the
    /// next event lies past `max_duration`.
    pub fn step(&mut self) -> bool {
        if let (Some(next), Some(limit)) = (self.peek_next_event_time(), self.config.max_duration)
            && next > limit
        {
            debug!("Stopping at horizon {} ({} events left)", limit, self.remaining_events());
            return false;
        }
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        // A cancelled timer is not an event; it must not advance the clock.
        if let EventType::TimerExpiry { node, generation } = event.event_type
            && !self.timer_is_live(node, generation)
        {
            debug!("Skipping cancelled timer event for {:?}", node);
            return true;
        }

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        let mut buffer = ActionBuffer::default();
        let node = match event.event_type {
            EventType::PacketArrival { to, packet } => {
                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    now: self.time,
                };
                match to {
                    NodeId::Sender => self.sender.on_packet(&mut ctx, packet),
                    NodeId::Receiver => self.receiver.on_packet(&mut ctx, packet),
                }
                to
            }
            EventType::TimerExpiry { node, .. } => {
                self.timers.entry(node).or_default().armed = false;

                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    now: self.time,
                };
                match node {
                    NodeId::Sender => self.sender.on_timer(&mut ctx),
                    NodeId::Receiver => self.receiver.on_timer(&mut ctx),
                }
                node
            }
            EventType::AppSend { data } => {
                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    now: self.time,
                };
                if let Err(err) = self.sender.on_app_data(&mut ctx, &data) {
                    warn!("[Sender] refused application data {:?}: {}", data, err);
                    self.link_events.push(LinkEventSummary {
                        time: self.time,
                        description: format!("[Sender] REFUSED {} bytes ({err})", data.len()),
                    });
                    self.refused_messages.push(data);
                }
                NodeId::Sender
            }
        };
        self.process_actions(node, buffer);
        true
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration: self.time,
            delivered_data: self.delivered_data.clone(),
            sender_packet_count: self.sender_packet_count,
            receiver_packet_count: self.receiver_packet_count,
            refused_messages: self.refused_messages.clone(),
            timer_violations: self.timer_violations,
            metrics: self.metrics.clone(),
            link_events: self.link_events.clone(),
        }
    }

    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    fn timer_is_live(&self, node: NodeId, generation: u64) -> bool {
        self.timers
            .get(&node)
            .is_some_and(|slot| slot.armed && slot.generation == generation)
    }

    fn apply_timer_op(&mut self, node: NodeId, op: TimerOp) {
        let slot = self.timers.entry(node).or_default();
        match op {
            TimerOp::Stop => {
                slot.generation += 1;
                slot.armed = false;
            }
            TimerOp::Start(delay) => {
                if slot.armed {
                    warn!("[{:?}] timer started while already running; restarting it", node);
                    self.timer_violations += 1;
                }
                slot.generation += 1;
                slot.armed = true;
                let generation = slot.generation;
                self.push_event(self.time + delay, EventType::TimerExpiry { node, generation });
            }
        }
    }

    /// Take the first entry equal to `seq` out of a one-shot fault list.
    fn take_fault(list: &mut Vec<u32>, seq: u32) -> bool {
        match list.iter().position(|s| *s == seq) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Damage one field so the additive checksum no longer matches.
    fn corrupt(&mut self, packet: &mut Packet) {
        match self.rng.random_range(0..3) {
            0 if !packet.payload.is_empty() => {
                let mut chars: Vec<char> = packet.payload.chars().collect();
                let idx = self.rng.random_range(0..chars.len());
                chars[idx] = if chars[idx] == '#' { '$' } else { '#' };
                packet.payload = chars.into_iter().collect();
            }
            1 => packet.sequence_number = packet.sequence_number.wrapping_add(1),
            _ => packet.checksum = !packet.checksum,
        }
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        // First, fold metrics into simulator-wide store
        for (name, value) in buffer.metrics {
            self.metrics
                .entry(name)
                .or_default()
                .push((self.time, value));
        }

        for log in buffer.logs {
            info!("[{:?}] {}", source_node, log);
        }

        for data in buffer.delivered_data {
            info!("[{:?}] DELIVERED DATA: {} bytes", source_node, data.len());
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}] DELIVERED {} bytes to application",
                    source_node,
                    data.len()
                ),
            });
            self.delivered_data.push(data);
        }

        for op in buffer.timer_ops {
            self.apply_timer_op(source_node, op);
        }

        // Packet transmission logic (Channel)
        let target_node = source_node.peer();
        for mut packet in buffer.outgoing_packets {
            let seq = packet.sequence_number;
            match source_node {
                NodeId::Sender => {
                    self.sender_packet_count += 1;
                    if Self::take_fault(&mut self.drop_sender_seq_once, seq) {
                        self.link_events.push(LinkEventSummary {
                            time: self.time,
                            description: format!(
                                "[Sender->Receiver] DROP (deterministic seq) seq={seq}"
                            ),
                        });
                        debug!("Deterministically dropping sender packet with seq={}", seq);
                        continue;
                    }
                }
                NodeId::Receiver => {
                    self.receiver_packet_count += 1;
                    if Self::take_fault(&mut self.drop_receiver_ack_once, seq) {
                        self.link_events.push(LinkEventSummary {
                            time: self.time,
                            description: format!(
                                "[Receiver->Sender] DROP (deterministic ack) ack={seq}"
                            ),
                        });
                        debug!("Deterministically dropping receiver ACK for seq={}", seq);
                        continue;
                    }
                }
            }

            // 1. Check Loss
            if self.rng.random::<f64>() < self.config.loss_rate {
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] DROP (random loss) seq={} ack={}",
                        source_node, target_node, seq, packet.ack_number
                    ),
                });
                debug!("Packet lost in channel");
                continue;
            }

            // 2. Check Corruption
            let forced = source_node == NodeId::Sender
                && Self::take_fault(&mut self.corrupt_sender_seq_once, seq);
            if forced || self.rng.random::<f64>() < self.config.corrupt_rate {
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] CORRUPT seq={} ack={}",
                        source_node, target_node, seq, packet.ack_number
                    ),
                });
                debug!("Packet corrupted in channel");
                self.corrupt(&mut packet);
            }

            // 3. Calculate Latency
            let latency = self
                .rng
                .random_range(self.config.min_latency..=self.config.max_latency);
            let arrival_time = self.time + latency;

            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}->{:?}] SEND seq={} ack={} (latency={})",
                    source_node, target_node, seq, packet.ack_number, latency
                ),
            });

            self.push_event(
                arrival_time,
                EventType::PacketArrival {
                    to: target_node,
                    packet,
                },
            );
        }
    }
}
