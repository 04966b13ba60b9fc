//! Timing feature extraction from a completed attempt.
//!
//! For N captured keys the feature vector holds, for every adjacent pair
//! `(i, i+1)`, the triple (hold, down-down, up-down), followed by the last
//! key's hold time: `3 * (N - 1) + 1` values in total.
//!
//! The same algorithm runs at two resolutions. The millisecond rendition
//! reports seconds (millisecond differences divided by 1000); the nanosecond
//! rendition reports raw integer nanosecond differences. Negative values
//! (overlapping presses) are passed through as-is.

use crate::core::store::{EventStore, KeyEvent, Timestamp};
use serde::{Deserialize, Serialize};

/// Arithmetic of one feature resolution.
pub trait Resolution {
    type Value: Copy;

    /// `later - earlier` in this resolution's unit.
    fn delta(later: Timestamp, earlier: Timestamp) -> Self::Value;
}

/// Millisecond-resolution timings, reported in seconds.
#[derive(Debug, Clone, Copy)]
pub struct Millis;

impl Resolution for Millis {
    type Value = f64;

    fn delta(later: Timestamp, earlier: Timestamp) -> f64 {
        (later.ms() - earlier.ms()) as f64 / 1000.0
    }
}

/// Nanosecond-resolution timings, reported in nanoseconds.
#[derive(Debug, Clone, Copy)]
pub struct Nanos;

impl Resolution for Nanos {
    type Value = i64;

    fn delta(later: Timestamp, earlier: Timestamp) -> i64 {
        later.ns() - earlier.ns()
    }
}

/// Fixed-length timing features of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector<T> {
    values: Vec<T>,
}

impl<T> FeatureVector<T> {
    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.values
    }
}

/// Features in seconds, derived from millisecond timestamps.
pub type MsFeatures = FeatureVector<f64>;

/// Features in nanoseconds.
pub type NsFeatures = FeatureVector<i64>;

/// Why a store could not be turned into features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// Fewer than two key events, or some key was never released
    InsufficientData { events: usize, completed: usize },
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::InsufficientData { events, completed } => write!(
                f,
                "Insufficient data: {completed} of {events} key events completed, need at least 2 and all released"
            ),
        }
    }
}

impl std::error::Error for ExtractionError {}

/// Number of features produced for `keys` captured keys.
pub fn feature_len(keys: usize) -> usize {
    if keys == 0 {
        0
    } else {
        3 * (keys - 1) + 1
    }
}

/// Extract features at the given resolution.
pub fn extract<R: Resolution>(store: &EventStore) -> Result<FeatureVector<R::Value>, ExtractionError> {
    let events = completed_events(store)?;

    let mut values = Vec::with_capacity(feature_len(events.len()));
    for pair in events.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        values.push(R::delta(current.1, current.0));
        values.push(R::delta(next.0, current.0));
        values.push(R::delta(next.0, current.1));
    }

    if let Some(&(press, release)) = events.last() {
        values.push(R::delta(release, press));
    }

    Ok(FeatureVector { values })
}

/// Millisecond-resolution features, in seconds.
pub fn extract_ms(store: &EventStore) -> Result<MsFeatures, ExtractionError> {
    extract::<Millis>(store)
}

/// Nanosecond-resolution features.
pub fn extract_ns(store: &EventStore) -> Result<NsFeatures, ExtractionError> {
    extract::<Nanos>(store)
}

/// (press, release) pairs, provided the store holds at least two events and
/// every one of them was released.
fn completed_events(store: &EventStore) -> Result<Vec<(Timestamp, Timestamp)>, ExtractionError> {
    let insufficient = || ExtractionError::InsufficientData {
        events: store.len(),
        completed: store.completed_count(),
    };

    if store.len() < 2 {
        return Err(insufficient());
    }

    store
        .iter()
        .map(|e: &KeyEvent| e.release().map(|release| (e.press(), release)))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(insufficient)
}
