//! Core functionality for the Keystroke Sampler.
//!
//! This module contains:
//! - Key event storage and the capture state machine for one attempt
//! - Timing feature extraction (hold, down-down, up-down)
//! - The column schema shared by export and curation
//! - Confidence-based curation of labeled sample tables

pub mod capture;
pub mod curation;
pub mod features;
pub mod label;
pub mod linalg;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use capture::{CaptureSession, CaptureState, CommitOutcome, KeyAction, RejectReason, Sample};
pub use curation::{
    curate, is_confident, CurationConfig, CurationError, CurationReport, LogisticModel,
    StandardScaler,
};
pub use features::{
    extract, extract_ms, extract_ns, feature_len, ExtractionError, FeatureVector, Millis,
    MsFeatures, Nanos, NsFeatures, Resolution,
};
pub use label::Label;
pub use schema::{FeatureSchema, LABEL_COLUMN, USER_COLUMN};
pub use store::{EventStore, KeyEvent, Timestamp};
