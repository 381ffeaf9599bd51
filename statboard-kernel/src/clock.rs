//! Source de temps injectable.
//!
//! Le décodeur, l'upkeep et l'agrégateur lisent "maintenant" via ce trait,
//! ce qui permet de les piloter de façon déterministe en test.

use std::sync::Arc;
use time::OffsetDateTime;

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub type SharedClock = Arc<dyn Clock>;

/// Horloge murale UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[cfg(test)]
pub use manual::ManualClock;


#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(datetime!(2024-03-01 12:00 UTC));
        clock.advance(time::Duration::seconds(90));
        assert_eq!(clock.now(), datetime!(2024-03-01 12:01:30 UTC));
    }

    #[test]
    fn test_system_clock_is_utc() {
        assert!(SystemClock.now().offset().is_utc());
    }
}
