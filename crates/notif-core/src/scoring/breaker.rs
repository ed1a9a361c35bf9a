use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerState {
    state: State,
    failures: u32,
    last_failure_at: Option<Instant>,
}

/// Read-only snapshot of a [`CircuitBreaker`]'s condition, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Failure-isolation state machine guarding the external/AI scorer call.
/// Every transition happens under one lock, so `can_attempt` and
/// `record_success`/`record_failure` can never race each other.
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState {
                state: State::Closed,
                failures: 0,
                last_failure_at: None,
            }),
            failure_threshold,
            reset_timeout,
        }
    }

    /// Returns whether a call should be attempted right now. May itself
    /// transition OPEN → HALF_OPEN once the reset timeout has elapsed.
    pub fn can_attempt(&self) -> bool {
        let mut guard = self.state.lock().expect("breaker lock poisoned");
        match guard.state {
            State::Closed | State::HalfOpen => true,
            State::Open => {
                let elapsed_ok = guard
                    .last_failure_at
                    .map(|t| t.elapsed() > self.reset_timeout)
                    .unwrap_or(true);
                if elapsed_ok {
                    guard.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Current state without attempting any transition (unlike `can_attempt`,
    /// which may itself flip OPEN → HALF_OPEN as a side effect).
    pub fn state(&self) -> BreakerStatus {
        let guard = self.state.lock().expect("breaker lock poisoned");
        match guard.state {
            State::Closed => BreakerStatus::Closed,
            State::Open => BreakerStatus::Open,
            State::HalfOpen => BreakerStatus::HalfOpen,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state(), BreakerStatus::Closed)
    }

    pub fn record_success(&self) {
        let mut guard = self.state.lock().expect("breaker lock poisoned");
        guard.failures = 0;
        guard.state = State::Closed;
    }

    pub fn record_failure(&self) {
        let mut guard = self.state.lock().expect("breaker lock poisoned");
        match guard.state {
            State::HalfOpen => {
                guard.state = State::Open;
                guard.last_failure_at = Some(Instant::now());
            }
            State::Closed | State::Open => {
                guard.failures += 1;
                if guard.failures >= self.failure_threshold {
                    guard.state = State::Open;
                    guard.last_failure_at = Some(Instant::now());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let b = CircuitBreaker::new(3, Duration::from_secs(30));
        assert!(b.can_attempt());
        b.record_failure();
        b.record_failure();
        assert!(b.can_attempt());
        b.record_failure();
        assert!(!b.can_attempt());
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let b = CircuitBreaker::new(1, Duration::from_millis(10));
        b.record_failure();
        assert!(!b.can_attempt());
        std::thread::sleep(Duration::from_millis(20));
        assert!(b.can_attempt()); // transitions to half-open
        b.record_failure();
        assert!(!b.can_attempt());
    }

    #[test]
    fn half_open_success_closes_and_resets_failures() {
        let b = CircuitBreaker::new(2, Duration::from_millis(10));
        b.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(b.can_attempt()); // half-open
        b.record_success();
        // failures reset; one more failure should not reopen a threshold-2 breaker
        b.record_failure();
        assert!(b.can_attempt());
    }

    #[test]
    fn state_does_not_mutate_on_read() {
        let b = CircuitBreaker::new(1, Duration::from_millis(10));
        b.record_failure();
        assert_eq!(b.state(), BreakerStatus::Open);
        std::thread::sleep(Duration::from_millis(20));
        // state() must not itself transition OPEN -> HALF_OPEN
        assert_eq!(b.state(), BreakerStatus::Open);
        assert!(!b.is_closed());
        assert!(b.can_attempt());
        assert_eq!(b.state(), BreakerStatus::HalfOpen);
    }

    #[test]
    fn record_success_unconditionally_closes() {
        let b = CircuitBreaker::new(1, Duration::from_secs(30));
        b.record_failure();
        assert!(!b.can_attempt());
        b.record_success();
        assert!(b.can_attempt());
    }
}
