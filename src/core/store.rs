//! Key event storage for a single capture attempt.

use serde::{Deserialize, Serialize};

/// A single clock reading expressed in both capture units.
///
/// Both values come from one nanosecond reading; the millisecond value is
/// the nanosecond value divided by 1,000,000, truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    ms: i64,
    ns: i64,
}

impl Timestamp {
    pub const NANOS_PER_MILLI: i64 = 1_000_000;

    pub fn from_nanos(ns: i64) -> Self {
        Self {
            ms: ns / Self::NANOS_PER_MILLI,
            ns,
        }
    }

    pub fn from_millis(ms: i64) -> Self {
        Self::from_nanos(ms * Self::NANOS_PER_MILLI)
    }

    pub fn ms(&self) -> i64 {
        self.ms
    }

    pub fn ns(&self) -> i64 {
        self.ns
    }
}

/// One physical key press and its matching release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    press: Timestamp,
    release: Option<Timestamp>,
}

impl KeyEvent {
    /// A freshly pressed key with no release yet.
    pub fn pressed(at: Timestamp) -> Self {
        Self {
            press: at,
            release: None,
        }
    }

    /// Record the release time. A release is recorded at most once; later
    /// calls are ignored and return `false`.
    pub fn set_release(&mut self, at: Timestamp) -> bool {
        if self.release.is_some() {
            return false;
        }
        self.release = Some(at);
        true
    }

    pub fn press(&self) -> Timestamp {
        self.press
    }

    pub fn release(&self) -> Option<Timestamp> {
        self.release
    }

    pub fn is_released(&self) -> bool {
        self.release.is_some()
    }

    pub fn press_time_ms(&self) -> i64 {
        self.press.ms()
    }

    pub fn press_time_ns(&self) -> i64 {
        self.press.ns()
    }

    pub fn release_time_ms(&self) -> Option<i64> {
        self.release.map(|t| t.ms())
    }

    pub fn release_time_ns(&self) -> Option<i64> {
        self.release.map(|t| t.ns())
    }
}

/// Ordered key events of the current attempt, in typing order.
///
/// Events are only ever appended or cleared as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventStore {
    events: Vec<KeyEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new pressed key and return its index.
    pub fn push_press(&mut self, at: Timestamp) -> usize {
        self.events.push(KeyEvent::pressed(at));
        self.events.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&KeyEvent> {
        self.events.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut KeyEvent> {
        self.events.get_mut(index)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events with a recorded release.
    pub fn completed_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_released()).count()
    }

    pub fn events(&self) -> &[KeyEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyEvent> {
        self.events.iter()
    }
}

impl FromIterator<KeyEvent> for EventStore {
    fn from_iter<I: IntoIterator<Item = KeyEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_truncates_to_millis() {
        let t = Timestamp::from_nanos(1_999_999);
        assert_eq!(t.ms(), 1);
        assert_eq!(t.ns(), 1_999_999);
        assert_eq!(Timestamp::from_millis(42).ns(), 42_000_000);
    }

    #[test]
    fn test_release_recorded_once() {
        let mut event = KeyEvent::pressed(Timestamp::from_millis(100));
        assert!(!event.is_released());
        assert_eq!(event.release_time_ms(), None);

        assert!(event.set_release(Timestamp::from_millis(150)));
        assert!(!event.set_release(Timestamp::from_millis(999)));
        assert_eq!(event.release_time_ms(), Some(150));
        assert_eq!(event.release_time_ns(), Some(150_000_000));
    }

    #[test]
    fn test_store_append_and_clear() {
        let mut store = EventStore::new();
        assert_eq!(store.push_press(Timestamp::from_millis(1)), 0);
        assert_eq!(store.push_press(Timestamp::from_millis(2)), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.completed_count(), 0);

        store.get_mut(0).unwrap().set_release(Timestamp::from_millis(3));
        assert_eq!(store.completed_count(), 1);

        store.clear();
        assert!(store.is_empty());
    }
}
