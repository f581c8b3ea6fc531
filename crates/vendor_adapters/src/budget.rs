use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// Sliding-window request budget.
#[derive(Debug)]
pub struct RequestBudget {
    limit: usize,
    window: Duration,
    sent: VecDeque<Instant>,
}

impl RequestBudget {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            sent: VecDeque::with_capacity(limit),
        }
    }

    pub fn per_minute(limit: usize) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Records a request at `now` if the window still has room.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        while let Some(oldest) = self.sent.front() {
            if now.duration_since(*oldest) >= self.window {
                self.sent.pop_front();
            } else {
                break;
            }
        }

        if self.sent.len() < self.limit {
            self.sent.push_back(now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_past_limit_within_window() {
        let start = Instant::now();
        let mut budget = RequestBudget::new(3, Duration::from_secs(60));

        assert!(budget.try_acquire(start));
        assert!(budget.try_acquire(start + Duration::from_secs(1)));
        assert!(budget.try_acquire(start + Duration::from_secs(2)));
        assert!(!budget.try_acquire(start + Duration::from_secs(3)));
    }

    #[test]
    fn frees_slots_as_window_slides() {
        let start = Instant::now();
        let mut budget = RequestBudget::new(2, Duration::from_secs(10));

        assert!(budget.try_acquire(start));
        assert!(budget.try_acquire(start + Duration::from_secs(5)));
        assert!(!budget.try_acquire(start + Duration::from_secs(9)));
        assert!(budget.try_acquire(start + Duration::from_secs(10)));
        assert!(!budget.try_acquire(start + Duration::from_secs(11)));
        assert!(budget.try_acquire(start + Duration::from_secs(15)));
    }

    #[test]
    fn zero_limit_never_allows() {
        let mut budget = RequestBudget::per_minute(0);
        assert!(!budget.try_acquire(Instant::now()));
    }
}
