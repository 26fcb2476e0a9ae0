use rdt_lab_abstract::SimConfig;
use rdt_lab_rust::{StopAndWaitReceiver, StopAndWaitSender};
use rdt_lab_simulator::{SimulationReport, Simulator};

fn main() {
    tracing_subscriber::fmt::init();

    let config = SimConfig {
        loss_rate: 0.2,
        corrupt_rate: 0.2,
        seed: 7,
        ..Default::default()
    };
    let mut sim = Simulator::new(
        config,
        Box::new(StopAndWaitSender::new(250)),
        Box::new(StopAndWaitReceiver::new()),
    );
    for (i, word) in ["alpha", "bravo", "charlie", "delta"].iter().enumerate() {
        sim.schedule_app_send(i as u64 * 1000, *word);
    }
    sim.run_until_complete();

    let report: SimulationReport = sim.export_report();
    println!(
        "Delivered {:?} using {} sender packets ({} refused)",
        report.delivered_data,
        report.sender_packet_count,
        report.refused_messages.len()
    );
}
