//! Sample ledger for the Keystroke Sampler.
//!
//! This module keeps per-participant sample counts outside the capture core,
//! so the capture session itself carries no cross-attempt state.

pub mod samples;

// Re-export commonly used types
pub use samples::{LedgerStats, SampleLedger};
