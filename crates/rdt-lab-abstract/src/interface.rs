use crate::error::SendError;
use crate::packet::Packet;

/// Metric reporting how many packets a sender has awaiting acknowledgement.
pub const IN_FLIGHT_METRIC: &str = "in_flight";

/// The capability provided by the simulator to a protocol endpoint.
/// Every call is fire-and-forget; effects are applied after the handler returns.
pub trait SystemContext {
    /// Send a packet into the unreliable channel.
    fn send_packet(&mut self, packet: Packet);

    /// Arm this node's single timer to fire `delay` time units from now.
    /// Arming a timer that is already running is a protocol bug; stop it first.
    fn start_timer(&mut self, delay: u64);

    /// Disarm this node's timer. A no-op when no timer is running.
    fn stop_timer(&mut self);

    /// Hand validated, in-order data to the application layer.
    fn deliver_data(&mut self, data: &str);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, message: &str);

    /// Current simulation time. Informational only.
    fn now(&self) -> u64;

    /// Record a numeric metric (e.g. packets in flight) for the report.
    fn record_metric(&mut self, _name: &str, _value: f64) {
        // Default no-op so non-visual environments don't need to care.
    }
}

/// An ARQ endpoint driven by the simulator. Handlers never run concurrently.
pub trait TransportProtocol {
    /// Called once when the simulation starts.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when a (possibly corrupted) packet arrives from the channel.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// Called when this node's timer expires.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext);

    /// Called when the application layer wants `data` sent reliably.
    /// Returns an error when the endpoint has no room; the data is then dropped.
    fn on_app_data(&mut self, _ctx: &mut dyn SystemContext, _data: &str) -> Result<(), SendError> {
        Ok(())
    }
}
