//! Per-participant sample bookkeeping.
//!
//! Tracks how many samples each participant has contributed against the
//! study goal, plus how many attempts were rejected or cleared.

use crate::core::capture::RejectReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Sample counts for the current session and before.
#[derive(Debug)]
pub struct SampleLedger {
    /// Committed samples per participant
    counts: BTreeMap<String, u64>,
    /// Attempts whose text did not match the target
    mismatches: u64,
    /// Attempts with too few completed keys
    insufficient: u64,
    /// Attempts discarded with Backspace
    resets: u64,
    /// Goal per participant
    goal: u64,
    /// Identifier of this capture session
    session_id: Uuid,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting counts
    persist_path: Option<PathBuf>,
}

impl SampleLedger {
    /// Create a new ledger.
    pub fn new(goal: u64) -> Self {
        Self {
            counts: BTreeMap::new(),
            mismatches: 0,
            insufficient: 0,
            resets: 0,
            goal,
            session_id: Uuid::new_v4(),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a ledger that loads and saves its counts at `path`.
    pub fn with_persistence(goal: u64, path: PathBuf) -> Self {
        let mut ledger = Self::new(goal);
        ledger.persist_path = Some(path);

        if let Err(e) = ledger.load() {
            tracing::warn!("Could not load previous sample counts: {e}");
        }

        ledger
    }

    /// Record a committed sample and return the participant's new count.
    pub fn record_sample(&mut self, user: &str) -> u64 {
        let count = self.counts.entry(user.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Record a rejected commit.
    pub fn record_rejection(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::TextMismatch => self.mismatches += 1,
            RejectReason::InsufficientData => self.insufficient += 1,
        }
    }

    /// Record an attempt cleared with Backspace.
    pub fn record_reset(&mut self) {
        self.resets += 1;
    }

    pub fn count_for(&self, user: &str) -> u64 {
        self.counts.get(user).copied().unwrap_or(0)
    }

    pub fn goal(&self) -> u64 {
        self.goal
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether the participant has reached the goal.
    pub fn is_complete(&self, user: &str) -> bool {
        self.count_for(user) >= self.goal
    }

    /// Progress line for one participant.
    pub fn progress_line(&self, user: &str) -> String {
        format!(
            "Samples collected for '{user}': {} / {}",
            self.count_for(user),
            self.goal
        )
    }

    /// Get the current statistics.
    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            samples_by_user: self.counts.clone(),
            total_samples: self.counts.values().sum(),
            mismatches: self.mismatches,
            insufficient: self.insufficient,
            resets: self.resets,
            session_id: self.session_id,
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let mut out = format!(
            "Session Statistics:\n\
             - Samples saved (all participants): {}\n\
             - Rejected, text mismatch: {}\n\
             - Rejected, not enough keys: {}\n\
             - Attempts cleared: {}\n\
             - Session duration: {} seconds",
            stats.total_samples,
            stats.mismatches,
            stats.insufficient,
            stats.resets,
            stats.session_duration_secs
        );

        if !self.counts.is_empty() {
            out.push_str("\n\nParticipants:");
            for user in self.counts.keys() {
                out.push_str("\n  ");
                out.push_str(&self.progress_line(user));
            }
        }
        out
    }

    /// Save counts to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            // Ensure parent directory exists
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let persisted = PersistedLedger {
                samples_by_user: self.counts.clone(),
                mismatches: self.mismatches,
                insufficient: self.insufficient,
                resets: self.resets,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load counts from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedLedger =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.counts = persisted.samples_by_user;
                self.mismatches = persisted.mismatches;
                self.insufficient = persisted.insufficient;
                self.resets = persisted.resets;
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&mut self) {
        self.counts.clear();
        self.mismatches = 0;
        self.insufficient = 0;
        self.resets = 0;
    }
}

/// Snapshot of ledger statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStats {
    pub samples_by_user: BTreeMap<String, u64>,
    pub total_samples: u64,
    pub mismatches: u64,
    pub insufficient: u64,
    pub resets: u64,
    pub session_id: Uuid,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Ledger format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedLedger {
    samples_by_user: BTreeMap<String, u64>,
    mismatches: u64,
    insufficient: u64,
    resets: u64,
    last_updated: DateTime<Utc>,
}
