//! Injectable time source.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, PoisonError};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self {
      now: Mutex::new(start),
    }
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
    *now += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_manual_clock_advances() {
    let start = Utc::now();
    let clock = ManualClock::new(start);
    assert_eq!(clock.now(), start);

    clock.advance(Duration::days(2));
    assert_eq!(clock.now(), start + Duration::days(2));
  }
}
