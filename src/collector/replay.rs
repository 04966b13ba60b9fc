//! Replay collector: feeds recorded key signals from a script file.
//!
//! A script is JSON lines, one signal per line:
//!
//! ```text
//! {"key": "period", "down": true, "at_ns": 1000000000}
//! {"key": "period", "down": false, "at_ns": 1082000000}
//! {"key": "Shift_R", "down": true}
//! ```
//!
//! `at_ns` is optional. Blank lines and lines starting with `#` are skipped.

use crate::collector::types::{Key, KeyDirection, KeySignal};
use crate::core::Timestamp;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a blocked send waits before checking for a stop request.
const SEND_POLL: Duration = Duration::from_millis(50);

/// Configuration for a replay run.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Path of the key script
    pub script: PathBuf,
    /// Sleep between timestamped signals so they arrive at their recorded pace
    pub pace: bool,
}

impl CollectorConfig {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            pace: false,
        }
    }
}

/// Errors that can occur while loading or replaying a script.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyRunning,
    IoError(String),
    /// A script line could not be parsed (1-based line number)
    InvalidLine { line: usize, reason: String },
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Collector is already running"),
            CollectorError::IoError(e) => write!(f, "IO error: {e}"),
            CollectorError::InvalidLine { line, reason } => {
                write!(f, "Invalid script line {line}: {reason}")
            }
        }
    }
}

impl std::error::Error for CollectorError {}

/// One line of a key script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptLine {
    pub key: Key,
    pub down: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_ns: Option<i64>,
}

impl From<ScriptLine> for KeySignal {
    fn from(line: ScriptLine) -> Self {
        KeySignal {
            key: line.key,
            direction: if line.down {
                KeyDirection::Down
            } else {
                KeyDirection::Up
            },
            at: line.at_ns.map(Timestamp::from_nanos),
        }
    }
}

impl From<&KeySignal> for ScriptLine {
    fn from(signal: &KeySignal) -> Self {
        ScriptLine {
            key: signal.key.clone(),
            down: signal.is_key_down(),
            at_ns: signal.at.map(|t| t.ns()),
        }
    }
}

/// Parse a key script.
pub fn parse_script<R: BufRead>(reader: R) -> Result<Vec<KeySignal>, CollectorError> {
    let mut signals = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| CollectorError::IoError(e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parsed: ScriptLine =
            serde_json::from_str(trimmed).map_err(|e| CollectorError::InvalidLine {
                line: idx + 1,
                reason: e.to_string(),
            })?;
        signals.push(parsed.into());
    }

    Ok(signals)
}

/// Collector that replays a loaded key script on a background thread.
pub struct ReplayCollector {
    config: CollectorConfig,
    signals: Arc<Vec<KeySignal>>,
    sender: Option<Sender<KeySignal>>,
    receiver: Receiver<KeySignal>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<usize>>,
}

impl ReplayCollector {
    /// Load the script named in the configuration.
    pub fn new(config: CollectorConfig) -> Result<Self, CollectorError> {
        let file = std::fs::File::open(&config.script)
            .map_err(|e| CollectorError::IoError(format!("{}: {e}", config.script.display())))?;
        let signals = parse_script(std::io::BufReader::new(file))?;
        Ok(Self::from_signals(config, signals))
    }

    /// Build a collector over signals already in memory.
    pub fn from_signals(config: CollectorConfig, signals: Vec<KeySignal>) -> Self {
        let (sender, receiver) = bounded(10_000);
        Self {
            config,
            signals: Arc::new(signals),
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Number of signals in the loaded script.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    pub fn script_path(&self) -> &Path {
        &self.config.script
    }

    /// Start replaying.
    ///
    /// The channel disconnects once the whole script has been delivered, so a
    /// collector replays its script exactly once.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        let sender = self.sender.take().ok_or(CollectorError::AlreadyRunning)?;
        self.running.store(true, Ordering::SeqCst);

        let signals = Arc::clone(&self.signals);
        let running = Arc::clone(&self.running);
        let pace = self.config.pace;

        self.handle = Some(thread::spawn(move || {
            let mut delivered = 0;
            let mut previous: Option<Timestamp> = None;

            'replay: for signal in signals.iter() {
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                if pace {
                    if let (Some(prev), Some(at)) = (previous, signal.at) {
                        let gap = at.ns() - prev.ns();
                        if gap > 0 {
                            thread::sleep(Duration::from_nanos(gap as u64));
                        }
                    }
                    previous = signal.at.or(previous);
                }

                // A full channel must not block a stop request
                let mut pending = signal.clone();
                loop {
                    match sender.send_timeout(pending, SEND_POLL) {
                        Ok(()) => break,
                        Err(SendTimeoutError::Timeout(returned)) => {
                            if !running.load(Ordering::SeqCst) {
                                break 'replay;
                            }
                            pending = returned;
                        }
                        Err(SendTimeoutError::Disconnected(_)) => break 'replay,
                    }
                }
                delivered += 1;
            }

            tracing::debug!(delivered, "replay finished");
            running.store(false, Ordering::SeqCst);
            delivered
        }));

        Ok(())
    }

    /// Stop replaying. Signals already queued stay in the channel.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Check if the collector is currently replaying.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for key signals.
    pub fn receiver(&self) -> &Receiver<KeySignal> {
        &self.receiver
    }

    /// Try to receive a signal without blocking.
    pub fn try_recv(&self) -> Option<KeySignal> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for ReplayCollector {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SCRIPT: &str = r#"
# two keys
{"key": "period", "down": true, "at_ns": 100000000}
{"key": "period", "down": false, "at_ns": 150000000}

{"key": "Shift_R", "down": true}
"#;

    #[test]
    fn test_parse_script() {
        let signals = parse_script(Cursor::new(SCRIPT)).unwrap();
        assert_eq!(signals.len(), 3);
        assert_eq!(signals[0].key, Key::Char('.'));
        assert!(signals[0].is_key_down());
        assert_eq!(signals[1].at.map(|t| t.ms()), Some(150));
        assert!(signals[2].key.is_modifier());
        assert_eq!(signals[2].at, None);
    }

    #[test]
    fn test_parse_script_reports_line_number() {
        let err = parse_script(Cursor::new("\n{\"key\": \"a\"}\n")).unwrap_err();
        match err {
            CollectorError::InvalidLine { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_replay_delivers_all_signals_then_disconnects() {
        let signals = parse_script(Cursor::new(SCRIPT)).unwrap();
        let mut collector =
            ReplayCollector::from_signals(CollectorConfig::new("inline"), signals);
        assert!(!collector.is_running());

        collector.start().unwrap();
        let received: Vec<KeySignal> = collector.receiver().iter().collect();
        assert_eq!(received.len(), 3);

        collector.stop();
        assert!(!collector.is_running());
    }

    #[test]
    fn test_stop_with_full_channel_returns() {
        let signals: Vec<KeySignal> = (0..20_050)
            .map(|i| {
                let key = Key::Char('a');
                if i % 2 == 0 {
                    KeySignal::down(key)
                } else {
                    KeySignal::up(key)
                }
            })
            .collect();
        let mut collector = ReplayCollector::from_signals(CollectorConfig::new("inline"), signals);
        collector.start().unwrap();

        // Nobody reads, so the replay thread fills the channel and waits
        while collector.receiver().len() < 10_000 {
            thread::sleep(Duration::from_millis(5));
        }

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            collector.stop();
            let _ = done_tx.send(collector.receiver().len());
        });

        let queued = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("stop() did not return while the channel was full");
        assert_eq!(queued, 10_000);
    }

    #[test]
    fn test_replay_starts_once() {
        let mut collector = ReplayCollector::from_signals(CollectorConfig::new("inline"), vec![]);
        collector.start().unwrap();
        assert!(matches!(
            collector.start(),
            Err(CollectorError::AlreadyRunning)
        ));
    }
}
