//! Clock port.
//!
//! All timing in the engine is a comparison between stored timestamps and
//! "now", so "now" is injected rather than read ad hoc.

use crate::domain::foundation::Timestamp;

/// Source of wall-clock time.
///
/// Production code injects `SystemClock`; tests inject a settable clock.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current wall-clock time.
    fn now(&self) -> Timestamp;
}
