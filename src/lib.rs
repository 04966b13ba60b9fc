//! Keystroke Sampler - keystroke-dynamics capture and dataset curation.
//!
//! This library records the press/release timing of a fixed password typed
//! repeatedly by study participants, turns each accepted attempt into a
//! hold / down-down / up-down feature vector, and later filters the collected
//! corpus down to the samples a baseline classifier finds unambiguous.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Keystroke Sampler                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │  Collector  │──▶│   Capture   │──▶│   Timing    │         │
//! │  │  (replay)   │   │   Session   │   │  Features   │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! │                           │                 │                │
//! │                           ▼                 ▼                │
//! │                    ┌─────────────┐   ┌─────────────┐         │
//! │                    │   Sample    │   │  CSV sinks  │         │
//! │                    │   Ledger    │   │  (ms + ns)  │         │
//! │                    └─────────────┘   └─────────────┘         │
//! │                                             │                │
//! │                                             ▼                │
//! │                                      ┌─────────────┐         │
//! │                                      │   Curator   │         │
//! │                                      │  (offline)  │         │
//! │                                      └─────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use keystroke_sampler::collector::{Key, KeySignal, ManualClock};
//! use keystroke_sampler::{Label, Sampler, SampleExporter};
//! use keystroke_sampler::core::FeatureSchema;
//!
//! let target = ".tie5Roanl";
//! let schema = FeatureSchema::for_password(target);
//! let exporter = SampleExporter::new("Keystrokes.csv", "KeystrokesInNano.csv", &schema);
//! let mut sampler = Sampler::new(target, exporter, ManualClock::new());
//! sampler.set_user("participant-01");
//! sampler.set_label(Label::Genuine);
//!
//! sampler.handle(KeySignal::down(Key::Char('.'))).unwrap();
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod dataset;
pub mod export;
pub mod ledger;
pub mod sampler;

// Re-export key types at crate root for convenience
pub use collector::{Clock, CollectorError, Key, KeySignal, ReplayCollector};
pub use config::Config;
pub use core::{
    curate, extract_ms, extract_ns, CaptureSession, CommitOutcome, CurationConfig,
    CurationReport, EventStore, FeatureSchema, Label, RejectReason,
};
pub use dataset::{DatasetError, LabeledTable};
pub use export::{ExportError, SampleExporter};
pub use ledger::{LedgerStats, SampleLedger};
pub use sampler::{Sampler, SamplerEvent};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notice shown to participants before a capture session.
pub const CAPTURE_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              KEYSTROKE SAMPLER - PARTICIPANT NOTICE              ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This tool records how you type a fixed study password.          ║
║                                                                  ║
║  ✓ WHAT WE RECORD:                                               ║
║    • When each key of the study password is pressed              ║
║    • When each key is released                                   ║
║    • The participant name and label you enter                    ║
║                                                                  ║
║  ✗ WHAT WE NEVER RECORD:                                         ║
║    • Anything typed outside the capture session                  ║
║    • The timing of modifier keys (Shift, Control, Alt)           ║
║    • Attempts that do not match the study password               ║
║                                                                  ║
║  Press Backspace at any point to discard the current attempt.    ║
║                                                                  ║
║  You can view per-participant sample counts anytime with:        ║
║    keystroke-sampler status                                      ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_notice_contents() {
        assert!(CAPTURE_NOTICE.contains("NOTICE"));
        assert!(CAPTURE_NOTICE.contains("NEVER RECORD"));
        assert!(CAPTURE_NOTICE.contains("Backspace"));
    }
}
