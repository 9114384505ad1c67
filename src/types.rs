use serde::Serialize;

/// Simulation time in months. Month 1 is the first simulated month; index 0
/// of a cash path is the opening balance, before any month has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Month(pub u32);

impl Month {
    pub const FIRST: Month = Month(1);

    /// Iterate months 1..=horizon.
    pub fn through(horizon: u32) -> impl Iterator<Item = Month> {
        (1..=horizon).map(Month)
    }

    /// True when this month falls in `[start, start + len)`. Bounds come from
    /// user-supplied scenario parameters and may be zero or negative.
    pub fn in_window(self, start: i64, len: i64) -> bool {
        let m = i64::from(self.0);
        start <= m && m < start.saturating_add(len)
    }

    /// True when this month is `start` or later.
    pub fn on_or_after(self, start: i64) -> bool {
        i64::from(self.0) >= start
    }
}
