use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Source of "now". Calendar dates are UTC dates.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Noon UTC on `date`.
    pub fn at_date(date: NaiveDate) -> Self {
        let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc();
        Self::new(noon)
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|guard| *guard).unwrap_or_else(|e| *e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_rolls_over_at_midnight() {
        let clock = FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
        assert_eq!(clock.today().to_string(), "2024-06-10");
        clock.advance(Duration::hours(12));
        assert_eq!(clock.today().to_string(), "2024-06-11");
    }
}
