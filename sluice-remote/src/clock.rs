//! Calendar clock used to pick daily partitions.

use chrono::{Days, NaiveDate, Utc};
use std::sync::RwLock;

/// Source of "today" for daily partitioning.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// UTC wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    today: RwLock<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: RwLock::new(today),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.today.write().unwrap_or_else(|err| err.into_inner()) = date;
    }

    /// Move the clock forward by whole days.
    pub fn advance_days(&self, days: u64) {
        let mut today = self.today.write().unwrap_or_else(|err| err.into_inner());
        if let Some(next) = today.checked_add_days(Days::new(days)) {
            *today = next;
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.today.read().unwrap_or_else(|err| err.into_inner())
    }
}
