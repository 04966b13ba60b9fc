//! Key signal collection for the Keystroke Sampler.
//!
//! Collectors deliver raw key-down/key-up signals over a channel. Clocks stamp
//! signals that arrive without a recorded time.

pub mod clock;
pub mod replay;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use replay::{parse_script, CollectorConfig, CollectorError, ReplayCollector, ScriptLine};
pub use types::{Key, KeyDirection, KeySignal, Modifier};
