//! Capture shell around the core state machine.
//!
//! A [`Sampler`] owns one capture session together with the things the
//! session deliberately knows nothing about: the typed-text buffer, the
//! participant and label, the CSV sinks and the sample ledger. Feed it key
//! signals one at a time from a single thread.

use crate::collector::clock::Clock;
use crate::collector::types::{KeyDirection, KeySignal};
use crate::core::capture::{CaptureSession, CaptureState, CommitOutcome, KeyAction, RejectReason};
use crate::core::label::Label;
use crate::export::{ExportError, SampleExporter};
use crate::ledger::SampleLedger;

/// What handling one signal amounted to, from the participant's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerEvent {
    /// Key timing buffered or released, or the signal was ignored
    Key(KeyAction),
    /// Backspace cleared the attempt
    Cleared,
    /// Sample written to both sinks
    Saved {
        user: String,
        label: Label,
        count: u64,
    },
    /// Commit rejected; the attempt was discarded
    Rejected(RejectReason),
    /// Commit blocked because no participant name is set; the attempt is kept
    MissingIdentity,
}

impl SamplerEvent {
    /// Message for the participant, if this event warrants one.
    pub fn message(&self) -> Option<String> {
        match self {
            SamplerEvent::Key(_) => None,
            SamplerEvent::Cleared => Some("State cleared. Please start over.".to_string()),
            SamplerEvent::Saved { user, label, .. } => {
                Some(format!("Sample saved for '{user}' with target '{label}'."))
            }
            SamplerEvent::Rejected(RejectReason::TextMismatch) => {
                Some("Password does not match. Please try again.".to_string())
            }
            SamplerEvent::Rejected(RejectReason::InsufficientData) => {
                Some("Not enough keys typed to save a sample.".to_string())
            }
            SamplerEvent::MissingIdentity => Some("Username cannot be empty.".to_string()),
        }
    }
}

/// Drives capture for one study password.
pub struct Sampler<C: Clock> {
    session: CaptureSession,
    typed: String,
    target: String,
    user: String,
    label: Label,
    exporter: SampleExporter,
    ledger: SampleLedger,
    clock: C,
}

impl<C: Clock> Sampler<C> {
    /// Create a sampler with an in-memory ledger and a goal of 20 samples.
    pub fn new(target: impl Into<String>, exporter: SampleExporter, clock: C) -> Self {
        Self::with_ledger(target, exporter, SampleLedger::new(20), clock)
    }

    pub fn with_ledger(
        target: impl Into<String>,
        exporter: SampleExporter,
        ledger: SampleLedger,
        clock: C,
    ) -> Self {
        Self {
            session: CaptureSession::new(),
            typed: String::new(),
            target: target.into(),
            user: String::new(),
            label: Label::default(),
            exporter,
            ledger,
            clock,
        }
    }

    pub fn set_user(&mut self, user: &str) {
        self.user = user.trim().to_string();
    }

    pub fn set_label(&mut self, label: Label) {
        self.label = label;
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Text typed in the current attempt.
    pub fn typed_text(&self) -> &str {
        &self.typed
    }

    pub fn state(&self) -> CaptureState {
        self.session.state()
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn ledger(&self) -> &SampleLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut SampleLedger {
        &mut self.ledger
    }

    pub fn exporter(&self) -> &SampleExporter {
        &self.exporter
    }

    /// Handle one key signal.
    ///
    /// Only a failed write to the sample files is an error; every capture
    /// problem is reported as an event and leaves the sampler usable.
    pub fn handle(&mut self, signal: KeySignal) -> Result<SamplerEvent, ExportError> {
        let at = signal.at.unwrap_or_else(|| self.clock.now());

        match signal.direction {
            KeyDirection::Up => Ok(SamplerEvent::Key(self.session.on_key_up(&signal.key, at))),
            KeyDirection::Down => match self.session.on_key_down(&signal.key, at) {
                KeyAction::Reset => {
                    self.typed.clear();
                    self.ledger.record_reset();
                    Ok(SamplerEvent::Cleared)
                }
                KeyAction::CommitRequested => self.commit(),
                action => {
                    if let (KeyAction::Buffered { .. }, Some(c)) = (action, signal.key.as_char()) {
                        self.typed.push(c);
                    }
                    Ok(SamplerEvent::Key(action))
                }
            },
        }
    }

    fn commit(&mut self) -> Result<SamplerEvent, ExportError> {
        if self.user.is_empty() {
            tracing::warn!("commit blocked: no participant name set");
            return Ok(SamplerEvent::MissingIdentity);
        }

        let outcome = self.session.commit(&self.typed, &self.target);
        self.typed.clear();

        match outcome {
            CommitOutcome::Committed(sample) => {
                self.exporter.export(&self.user, self.label, &sample)?;
                let count = self.ledger.record_sample(&self.user);
                tracing::info!(
                    user = %self.user,
                    label = %self.label,
                    count,
                    features = sample.ms.len(),
                    "sample saved"
                );
                Ok(SamplerEvent::Saved {
                    user: self.user.clone(),
                    label: self.label,
                    count,
                })
            }
            CommitOutcome::Rejected(reason) => {
                tracing::warn!(%reason, user = %self.user, "sample rejected");
                self.ledger.record_rejection(reason);
                Ok(SamplerEvent::Rejected(reason))
            }
        }
    }
}
