//! Capture state machine for one password attempt.
//!
//! Key-downs append events, key-ups release them in press order, Backspace
//! discards the attempt and Enter asks the caller to commit it. Modifiers are
//! invisible to the session.
//!
//! Releases are matched to presses by position: each key-up releases the
//! oldest event that has not been released yet, whichever key it belongs to.
//! This tolerates overlapping presses as long as keys come up in the order
//! they went down.

use crate::collector::types::Key;
use crate::core::features::{extract_ms, extract_ns, ExtractionError, MsFeatures, NsFeatures};
use crate::core::store::{EventStore, Timestamp};
use serde::{Deserialize, Serialize};

/// Observable state of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    /// Nothing buffered
    Idle,
    /// At least one key press buffered
    Collecting,
}

/// What a single key signal did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// A press was appended at this index
    Buffered { index: usize },
    /// The event at this index was released
    Released { index: usize },
    /// Key-up with no unreleased event left
    Spurious,
    /// Modifier, or a key-up of Backspace/Enter
    Ignored,
    /// Backspace discarded the attempt
    Reset,
    /// Enter was pressed; the caller should commit
    CommitRequested,
}

/// Why a commit produced no sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Typed text differs from the target password
    TextMismatch,
    /// Fewer than two key events, or a key still held at commit
    InsufficientData,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::TextMismatch => write!(f, "text_mismatch"),
            RejectReason::InsufficientData => write!(f, "insufficient_data"),
        }
    }
}

/// Both feature renditions of one accepted attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub ms: MsFeatures,
    pub ns: NsFeatures,
}

/// Result of a commit attempt. The session is idle afterwards either way.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Committed(Sample),
    Rejected(RejectReason),
}

/// State of one capture session.
#[derive(Debug, Clone, Default)]
pub struct CaptureSession {
    store: EventStore,
    press_cursor: usize,
    release_cursor: usize,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        if self.store.is_empty() {
            CaptureState::Idle
        } else {
            CaptureState::Collecting
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Number of presses buffered since the last reset.
    pub fn press_cursor(&self) -> usize {
        self.press_cursor
    }

    /// Index of the next event a key-up will release.
    pub fn release_cursor(&self) -> usize {
        self.release_cursor
    }

    /// Handle a key-down.
    pub fn on_key_down(&mut self, key: &Key, at: Timestamp) -> KeyAction {
        match key {
            Key::Modifier(_) => KeyAction::Ignored,
            Key::Backspace => {
                tracing::debug!(discarded = self.store.len(), "attempt cleared");
                self.reset();
                KeyAction::Reset
            }
            Key::Enter => KeyAction::CommitRequested,
            _ => {
                let index = self.store.push_press(at);
                self.press_cursor += 1;
                tracing::trace!(%key, index, press_ns = at.ns(), "key down");
                KeyAction::Buffered { index }
            }
        }
    }

    /// Handle a key-up.
    pub fn on_key_up(&mut self, key: &Key, at: Timestamp) -> KeyAction {
        if matches!(key, Key::Modifier(_) | Key::Backspace | Key::Enter) {
            return KeyAction::Ignored;
        }

        let index = self.release_cursor;
        match self.store.get_mut(index) {
            Some(event) => {
                event.set_release(at);
                self.release_cursor += 1;
                tracing::trace!(%key, index, release_ns = at.ns(), "key up");
                KeyAction::Released { index }
            }
            None => {
                tracing::trace!(%key, "release without a pending press");
                KeyAction::Spurious
            }
        }
    }

    /// Commit the buffered attempt against the target password.
    ///
    /// A mismatch discards the attempt without extracting anything. The
    /// session is reset in every case.
    pub fn commit(&mut self, typed_text: &str, target_text: &str) -> CommitOutcome {
        let outcome = if typed_text != target_text {
            CommitOutcome::Rejected(RejectReason::TextMismatch)
        } else {
            match self.extract() {
                Ok(sample) => CommitOutcome::Committed(sample),
                Err(e) => {
                    tracing::debug!("{e}");
                    CommitOutcome::Rejected(RejectReason::InsufficientData)
                }
            }
        };

        self.reset();
        outcome
    }

    /// Discard everything buffered and return to idle.
    pub fn reset(&mut self) {
        self.store.clear();
        self.press_cursor = 0;
        self.release_cursor = 0;
    }

    fn extract(&self) -> Result<Sample, ExtractionError> {
        Ok(Sample {
            ms: extract_ms(&self.store)?,
            ns: extract_ns(&self.store)?,
        })
    }
}
