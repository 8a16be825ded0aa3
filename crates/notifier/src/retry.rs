//! Retry policy: decides what happens to a notification after a failed delivery.
//!
//! The policy is a pure function of the incremented retry count and the
//! configured maximum. It never touches the store.

use herald_common::types::NotificationStatus;

/// Default number of failed attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Outcome of the retry policy for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the notification back in the pending queue for the next cycle.
    Retry,
    /// Stop trying; the notification is marked failed.
    GiveUp,
}

impl RetryDecision {
    /// Status the notification moves to from `Processing`.
    pub fn next_status(self) -> NotificationStatus {
        match self {
            RetryDecision::Retry => NotificationStatus::Pending,
            RetryDecision::GiveUp => NotificationStatus::Failed,
        }
    }
}

/// Decide from `retry_count`, which must already include the attempt that just failed.
pub fn decide(retry_count: u32, max_retries: u32) -> RetryDecision {
    if retry_count >= max_retries {
        RetryDecision::GiveUp
    } else {
        RetryDecision::Retry
    }
}

/// Retry policy bound to a configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        decide(retry_count, self.max_retries)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::first_failure(1, 3, RetryDecision::Retry)]
    #[case::second_failure(2, 3, RetryDecision::Retry)]
    #[case::third_failure(3, 3, RetryDecision::GiveUp)]
    #[case::past_the_limit(4, 3, RetryDecision::GiveUp)]
    #[case::single_attempt(1, 1, RetryDecision::GiveUp)]
    #[case::no_retries_allowed(1, 0, RetryDecision::GiveUp)]
    #[case::generous_limit(9, 10, RetryDecision::Retry)]
    fn test_decide_table(#[case] count: u32, #[case] max: u32, #[case] expected: RetryDecision) {
        assert_eq!(decide(count, max), expected);
    }

    #[test]
    fn test_default_policy_gives_up_on_third_failure() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.decide(2), RetryDecision::Retry);
        assert_eq!(policy.decide(3), RetryDecision::GiveUp);
    }

    #[test]
    fn test_retry_never_maps_to_failed() {
        for max in 1..=5 {
            for count in 0..max {
                assert_eq!(
                    RetryPolicy::new(max).decide(count).next_status(),
                    NotificationStatus::Pending
                );
            }
        }
    }

    #[test]
    fn test_give_up_maps_to_failed() {
        assert_eq!(RetryDecision::GiveUp.next_status(), NotificationStatus::Failed);
    }
}
