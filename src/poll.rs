use std::time::{Duration, Instant};

/// Says when something slow (a fetch, a countdown refresh) is due again,
/// independent of how fast the render loop spins. Due immediately until
/// the first attempt; after that, once per `interval` since the last one,
/// whether it worked or not.
#[derive(Debug)]
pub struct PollTimer {
    interval: Duration,
    last_attempt: Option<Instant>,
}

impl PollTimer {
    pub fn new(interval: Duration) -> PollTimer {
        return PollTimer{
            interval: interval,
            last_attempt: None,
        };
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_attempt {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    pub fn mark_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }

    /// Checks and re-arms in one step.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.mark_attempt(now);
        return true;
    }

    pub fn time_until_due(&self, now: Instant) -> Duration {
        match self.last_attempt {
            None => Duration::from_secs(0),
            Some(last) => self.interval.checked_sub(now.saturating_duration_since(last))
                .unwrap_or(Duration::from_secs(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PollTimer;
    use std::time::{Duration, Instant};

    #[test]
    fn due_before_first_attempt() {
        let timer = PollTimer::new(Duration::from_secs(300));
        assert!(timer.is_due(Instant::now()));
    }

    #[test]
    fn rearms_after_attempt() {
        let start = Instant::now();
        let mut timer = PollTimer::new(Duration::from_secs(300));
        assert!(timer.take_due(start));

        assert!(!timer.is_due(start + Duration::from_secs(1)));
        assert!(!timer.is_due(start + Duration::from_secs(299)));
        assert!(timer.is_due(start + Duration::from_secs(300)));
        assert_eq!(Duration::from_secs(100), timer.time_until_due(start + Duration::from_secs(200)));
    }

    #[test]
    fn take_due_only_fires_once_per_interval() {
        let start = Instant::now();
        let mut timer = PollTimer::new(Duration::from_secs(30));
        let fired: Vec<bool> = (0..=90).step_by(10)
            .map(|s| timer.take_due(start + Duration::from_secs(s)))
            .collect();
        assert_eq!(vec![true, false, false, true, false, false, true, false, false, true], fired);
    }

    #[test]
    fn clock_going_backwards_is_not_due() {
        let start = Instant::now() + Duration::from_secs(10);
        let mut timer = PollTimer::new(Duration::from_secs(30));
        timer.mark_attempt(start);
        assert!(!timer.is_due(start - Duration::from_secs(5)));
    }
}
