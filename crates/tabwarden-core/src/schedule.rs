//! Daily budget reset controller

use chrono::{DateTime, Local};

/// Tracks the last budget reset
///
/// A reset is due whenever the local calendar date differs from the date of
/// the last reset. Elapsed time since the reset plays no part.
#[derive(Debug, Clone, Default)]
pub struct DailyReset {
    last_reset: Option<DateTime<Local>>,
}

impl DailyReset {
    pub fn new(last_reset: Option<DateTime<Local>>) -> Self {
        Self { last_reset }
    }

    pub fn last_reset(&self) -> Option<DateTime<Local>> {
        self.last_reset
    }

    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        match self.last_reset {
            Some(last) => last.date_naive() != now.date_naive(),
            None => true,
        }
    }

    pub fn mark(&mut self, now: DateTime<Local>) {
        self.last_reset = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn first_run_is_due() {
        assert!(DailyReset::default().is_due(tabwarden_util::now()));
    }

    #[test]
    fn due_at_midnight_not_after_24h() {
        let eleven_pm = Local.with_ymd_and_hms(2025, 4, 1, 23, 0, 0).unwrap();
        let mut reset = DailyReset::new(Some(eleven_pm));

        assert!(!reset.is_due(Local.with_ymd_and_hms(2025, 4, 1, 23, 59, 59).unwrap()));

        let just_after_midnight = Local.with_ymd_and_hms(2025, 4, 2, 0, 0, 1).unwrap();
        assert!(reset.is_due(just_after_midnight));
        reset.mark(just_after_midnight);

        // 24h after the previous reset, same calendar day as the last one
        assert!(!reset.is_due(Local.with_ymd_and_hms(2025, 4, 2, 23, 0, 0).unwrap()));
    }
}
