use rdt_lab_abstract::{IN_FLIGHT_METRIC, SimConfig};
use rdt_lab_rust::{GoBackNReceiver, GoBackNSender};
use rdt_lab_simulator::Simulator;

fn main() {
    tracing_subscriber::fmt::init();

    let config = SimConfig {
        loss_rate: 0.1,
        corrupt_rate: 0.1,
        seed: 42,
        ..Default::default()
    };
    let mut sim = Simulator::new(
        config,
        Box::new(GoBackNSender::new(250, 5)),
        Box::new(GoBackNReceiver::new()),
    );
    for i in 0..20u64 {
        sim.schedule_app_send(i * 40, format!("segment-{i:02}"));
    }
    sim.run_until_complete();

    let report = sim.export_report();
    println!(
        "Delivered {} messages in {} time units, {} sender packets, peak in flight {:?}",
        report.delivered_data.len(),
        report.duration,
        report.sender_packet_count,
        report.metric_max(IN_FLIGHT_METRIC)
    );
}
