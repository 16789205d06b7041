use chrono::{DateTime, FixedOffset, Local, Utc};
use chrono_tz::Tz;

/// Source of local wall-clock time for slides and the night-mode gate.
///
/// The local fields drive display and quiet hours; the offset lets slides
/// compare against absolute timestamps from remote APIs.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Reads the host clock, shifted into `timezone` when one is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    timezone: Option<Tz>,
}

impl SystemClock {
    pub fn new(timezone: Option<Tz>) -> Self {
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).fixed_offset(),
            None => Local::now().fixed_offset(),
        }
    }
}
