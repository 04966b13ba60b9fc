//! Demonstration of the Keystroke Sampler capture and curation pipeline.
//!
//! This example shows how to:
//! 1. Build a replay collector over synthetic key signals
//! 2. Feed the signals through a sampler into the CSV sample files
//! 3. Load the millisecond file and curate it
//!
//! Run with: cargo run --example replay_demo

use keystroke_sampler::{
    collector::{CollectorConfig, Key, KeySignal, ManualClock, Modifier, ReplayCollector},
    core::{curate, CurationConfig, FeatureSchema, Label, Timestamp},
    dataset::LabeledTable,
    export::SampleExporter,
    sampler::{Sampler, SamplerEvent},
    CAPTURE_NOTICE,
};

const TARGET: &str = ".tie5Roanl";

/// One attempt at the password with the given hold and gap times, then Enter.
fn attempt(start_ms: i64, hold_ms: i64, gap_ms: i64) -> Vec<KeySignal> {
    let mut signals = Vec::new();
    let mut t = start_ms;
    for c in TARGET.chars() {
        if c.is_ascii_uppercase() {
            signals.push(KeySignal::down(Key::Modifier(Modifier::Shift)).at(Timestamp::from_millis(t - 15)));
        }
        signals.push(KeySignal::down(Key::Char(c)).at(Timestamp::from_millis(t)));
        signals.push(KeySignal::up(Key::Char(c)).at(Timestamp::from_millis(t + hold_ms)));
        if c.is_ascii_uppercase() {
            signals.push(KeySignal::up(Key::Modifier(Modifier::Shift)).at(Timestamp::from_millis(t + hold_ms + 5)));
        }
        t += hold_ms + gap_ms;
    }
    signals.push(KeySignal::down(Key::Enter).at(Timestamp::from_millis(t + 200)));
    signals.push(KeySignal::up(Key::Enter).at(Timestamp::from_millis(t + 260)));
    signals
}

fn main() -> anyhow::Result<()> {
    println!("Keystroke Sampler - Replay Demo");
    println!("===============================");
    println!("{CAPTURE_NOTICE}");

    let dir = tempfile::tempdir()?;
    let schema = FeatureSchema::for_password(TARGET);
    let exporter = SampleExporter::new(
        dir.path().join("Keystrokes.csv"),
        dir.path().join("KeystrokesInNano.csv"),
        &schema,
    );
    let mut sampler = Sampler::new(TARGET, exporter, ManualClock::new());

    // A practiced typist and a slower second participant
    let participants = [
        ("alice", Label::Genuine, 60, 90),
        ("mallory", Label::Imposter, 110, 220),
    ];

    for (user, label, hold, gap) in participants {
        sampler.set_user(user);
        sampler.set_label(label);

        let mut signals = Vec::new();
        for i in 0..8 {
            let start = i * 10_000;
            signals.extend(attempt(start, hold + i % 3 * 5, gap + i % 4 * 10));
        }

        let mut collector =
            ReplayCollector::from_signals(CollectorConfig::new("synthetic"), signals);
        collector.start()?;
        let receiver = collector.receiver().clone();

        while let Ok(signal) = receiver.recv() {
            if let SamplerEvent::Saved { user, count, .. } = sampler.handle(signal)? {
                println!("[{user}] sample {count} saved");
            }
        }
        collector.stop();
    }

    println!();
    println!("{}", sampler.ledger().summary());
    println!();

    let (table, _) = LabeledTable::read_csv(dir.path().join("Keystrokes.csv"))?;
    let report = curate(&table, &CurationConfig::default())?;
    println!("{}", report.summary());

    Ok(())
}
