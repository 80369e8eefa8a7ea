//! Wall-clock milestones of a capture session

// Millisecond delays are logged as integers
#![allow(clippy::cast_possible_truncation)]

use std::time::Instant;

use log::info;

#[derive(Debug, Clone)]
pub struct SessionTimes {
    pub created: Instant,
    pub initialized: Option<Instant>,
    pub start_requested: Option<Instant>,
    pub capture_requested: Option<Instant>,
    pub capture_started: Option<Instant>,
    pub capture_finished: Option<Instant>,
}

impl Default for SessionTimes {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTimes {
    #[must_use]
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            initialized: None,
            start_requested: None,
            capture_requested: None,
            capture_started: None,
            capture_finished: None,
        }
    }

    /// Milliseconds from `from` to `to`, if both happened
    #[must_use]
    pub fn delay_ms(from: Option<Instant>, to: Option<Instant>) -> Option<u64> {
        Some(to?.saturating_duration_since(from?).as_millis() as u64)
    }

    pub fn log_times(&self) {
        let created = Some(self.created);
        let show = |delay: Option<u64>| delay.map_or_else(|| "n/a".to_string(), |ms| format!("{ms} ms"));

        info!("-------------- TIMES --------------------");
        info!("Session created -- initialized: {}", show(Self::delay_ms(created, self.initialized)));
        info!("Session created -- capture requested: {}", show(Self::delay_ms(created, self.capture_requested)));
        info!(
            "Start requested -- capture requested: {}",
            show(Self::delay_ms(self.start_requested, self.capture_requested))
        );
        info!("Session created -- capture started: {}", show(Self::delay_ms(created, self.capture_started)));
        info!(
            "Capture started -- capture finished: {}",
            show(Self::delay_ms(self.capture_started, self.capture_finished))
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_delay_requires_both_marks() {
        let now = Instant::now();
        let later = now + Duration::from_millis(25);

        assert_eq!(SessionTimes::delay_ms(Some(now), Some(later)), Some(25));
        assert_eq!(SessionTimes::delay_ms(Some(now), None), None);
        assert_eq!(SessionTimes::delay_ms(Some(later), Some(now)), Some(0));
    }
}
