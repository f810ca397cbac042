// Clock - injected "now"
// The forecast and series code never read wall-clock time themselves.

use chrono::{DateTime, FixedOffset, Offset, Utc};

pub trait Clock {
    /// Current instant, expressed in the calendar zone used for month math
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock viewed through a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    pub offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
