//! Deadline and cancellation plumbing shared by every solve engine.

use crate::solution::Status;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Clonable cancellation flag. All clones observe the same flag.
///
/// ```
/// use fundalloc_core::control::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    TimeLimit,
    Cancelled,
}

impl From<Interrupt> for Status {
    fn from(interrupt: Interrupt) -> Status {
        match interrupt {
            Interrupt::TimeLimit => Status::TimeLimit,
            Interrupt::Cancelled => Status::Cancelled,
        }
    }
}

/// Per-call stop conditions. Engines poll [`SolveControl::interrupted`] at
/// every node and pivot.
#[derive(Debug, Clone)]
pub struct SolveControl {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl SolveControl {
    pub fn new(time_limit: Option<Duration>, token: CancellationToken) -> Self {
        let deadline = time_limit.and_then(|limit| Instant::now().checked_add(limit));
        Self { deadline, token }
    }

    /// Same token, with the deadline moved earlier if `limit` from now ends first.
    pub fn tightened(&self, limit: Option<Duration>) -> Self {
        let own = limit.and_then(|limit| Instant::now().checked_add(limit));
        let deadline = match (self.deadline, own) {
            (Some(current), Some(own)) => Some(current.min(own)),
            (current, own) => current.or(own),
        };
        Self {
            deadline,
            token: self.token.clone(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None, CancellationToken::new())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn interrupted(&self) -> Option<Interrupt> {
        if self.token.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupt::TimeLimit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let control = SolveControl::new(None, token.clone());
        assert_eq!(control.interrupted(), None);
        token.cancel();
        assert_eq!(control.interrupted(), Some(Interrupt::Cancelled));
    }

    #[test]
    fn zero_time_limit_expires_immediately() {
        let control = SolveControl::new(Some(Duration::ZERO), CancellationToken::new());
        assert_eq!(control.interrupted(), Some(Interrupt::TimeLimit));
        assert_eq!(control.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn huge_time_limit_does_not_overflow() {
        let control = SolveControl::new(Some(Duration::MAX), CancellationToken::new());
        assert!(control.deadline().is_none());
        assert_eq!(control.interrupted(), None);
    }

    #[test]
    fn tightening_keeps_the_earlier_deadline() {
        let token = CancellationToken::new();
        let loose = SolveControl::new(Some(Duration::from_secs(3600)), token.clone());
        let tight = loose.tightened(Some(Duration::ZERO));
        assert_eq!(tight.interrupted(), Some(Interrupt::TimeLimit));
        assert_eq!(loose.tightened(None).deadline(), loose.deadline());
        assert!(SolveControl::unbounded().tightened(None).deadline().is_none());
        token.cancel();
        assert_eq!(tight.interrupted(), Some(Interrupt::Cancelled));
    }

    #[test]
    fn cancellation_wins_over_deadline() {
        let token = CancellationToken::new();
        token.cancel();
        let control = SolveControl::new(Some(Duration::ZERO), token);
        assert_eq!(control.interrupted(), Some(Interrupt::Cancelled));
        assert_eq!(Status::from(Interrupt::Cancelled), Status::Cancelled);
    }
}
