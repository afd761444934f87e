//! Replay a short recorded session and print each tick decision

fn main() {
    let ndjson = r#"
        {"at":"2024-01-15T14:00:00Z","visual":0.1,"focus":0.2}
        {"at":"2024-01-15T14:00:03Z","visual":0.35,"focus":0.4,"typing":0.1}
        {"at":"2024-01-15T14:00:06Z","visual":0.2,"focus":0.45,"typing":0.1}
        {"at":"2024-01-15T14:00:09Z","visual":0.9,"focus":0.9,"typing":0.7,"suppressed":true,"suppression_reason":"Game detected: Celeste - triggers disabled"}
        {"at":"2024-01-15T14:00:12Z","visual":0.75,"focus":0.8,"typing":0.5}
        {"at":"2024-01-15T14:00:15Z","visual":0.95,"focus":0.9,"typing":0.9}
        {"at":"2024-01-15T14:02:15Z","visual":0.0,"focus":0.1}
    "#;

    let result = deproductify::ReplayFrame::parse_ndjson(ndjson).and_then(|frames| {
        let mut replayer = deproductify::Replayer::new(deproductify::EngineConfig::default())?;
        replayer.run(&frames)
    });

    match result {
        Ok(report) => {
            for outcome in &report.outcomes {
                println!(
                    "{} {:>10} {:.2} {}",
                    outcome.timestamp.format("%H:%M:%S"),
                    format!("{:?}", outcome.kind),
                    outcome.score,
                    outcome.reason
                );
            }
            println!("{} trigger(s), {} event(s)", report.snapshot.triggers, report.events.len());
        }
        Err(e) => eprintln!("Error: {e}"),
    }
}
