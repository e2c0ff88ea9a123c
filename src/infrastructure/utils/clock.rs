use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Millisecond clock that never returns the same value twice.
///
/// Storage keys embed this value, so two uploads of the same filename to the
/// same harvest still land on distinct paths.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut previous = self.last.load(Ordering::Acquire);
        loop {
            let candidate = now.max(previous + 1);
            match self.last.compare_exchange_weak(previous, candidate, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return candidate,
                Err(actual) => previous = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashSet, sync::Arc, thread};

    #[test]
    fn values_strictly_increase() {
        let clock = MonotonicClock::new();
        let a = clock.next_millis();
        let b = clock.next_millis();
        let c = clock.next_millis();
        assert!(a < b && b < c);
    }

    #[test]
    fn concurrent_callers_get_distinct_values() {
        let clock = Arc::new(MonotonicClock::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || (0..250).map(|_| clock.next_millis()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(seen.insert(value));
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
