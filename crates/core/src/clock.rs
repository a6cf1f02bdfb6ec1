//! Round countdown arithmetic
//!
//! The timer task measures real elapsed time and feeds it here, so a late
//! tick shortens the next wait instead of stretching the round.

use std::time::Duration;

/// Remaining time of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    round: u64,
    remaining: Duration,
}

impl Countdown {
    pub fn new(round: u64, seconds: u32) -> Self {
        Self {
            round,
            remaining: Duration::from_secs(u64::from(seconds)),
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    /// Whole seconds shown to the room, rounded up
    pub fn seconds(&self) -> u32 {
        let secs = self.remaining.as_secs();
        let rounded = if self.remaining.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        };
        u32::try_from(rounded).unwrap_or(u32::MAX)
    }

    pub fn is_expired(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Re-base on the room's round when it moved on without us.
    ///
    /// Within one round the countdown is authoritative. Returns true if the
    /// countdown was re-based.
    pub fn sync(&mut self, round: u64, seconds: u32) -> bool {
        if self.round == round {
            return false;
        }
        *self = Countdown::new(round, seconds);
        true
    }

    /// Subtract measured elapsed time and return the displayed seconds
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.remaining = self.remaining.saturating_sub(elapsed);
        self.seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_seconds_count_down() {
        let mut countdown = Countdown::new(1, 3);
        assert_eq!(countdown.advance(Duration::from_secs(1)), 2);
        assert_eq!(countdown.advance(Duration::from_secs(1)), 1);
        assert_eq!(countdown.advance(Duration::from_secs(1)), 0);
        assert!(countdown.is_expired());
        assert_eq!(countdown.advance(Duration::from_secs(1)), 0);
    }

    #[test]
    fn test_jitter_does_not_accumulate() {
        let mut countdown = Countdown::new(1, 30);
        // Ten late ticks of 1.05s each are 10.5s in total
        for _ in 0..10 {
            countdown.advance(Duration::from_millis(1_050));
        }
        assert_eq!(countdown.seconds(), 20);
        countdown.advance(Duration::from_millis(500));
        assert_eq!(countdown.seconds(), 19);
    }

    #[test]
    fn test_sync_rebases_only_on_new_round() {
        let mut countdown = Countdown::new(4, 30);
        countdown.advance(Duration::from_millis(12_400));
        assert_eq!(countdown.seconds(), 18);

        // Same round keeps the sub-second remainder, whatever the room shows
        assert!(!countdown.sync(4, 18));
        assert!(!countdown.sync(4, 30));
        assert_eq!(countdown.advance(Duration::from_millis(600)), 17);

        assert!(countdown.sync(5, 30));
        assert_eq!(countdown.round(), 5);
        assert_eq!(countdown.seconds(), 30);
    }
}
