//! Retry policy model.
//!
//! A [`RetryPolicy`] describes when a failed attempt is tried again and how
//! long to wait first. The engine asks a per-call [`RetrySchedule`] after every
//! failure; the schedule answers with the delay before the next attempt, or
//! `None` to surface the error.
//!
//! Without a custom [`RetryStrategy`], failures are classified with
//! [`Error::is_retryable`] and delays come from the [`Backoff`]. A custom
//! strategy replaces both, but attempts, the time budget and cancellation
//! still bound it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::{Error, Result};

/// Delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `min(initial * multiplier^(attempt - 1), max)`, widened by `± jitter`.
    Exponential {
        /// Delay after the first failure.
        initial: Duration,
        /// Upper bound before jitter.
        max: Duration,
        /// Growth factor, at least 1.
        multiplier: f64,
        /// Random spread as a fraction of the delay, within `[0, 1]`.
        jitter: f64,
    },
    /// Always the same delay.
    Fixed(Duration),
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            initial: Duration::from_millis(50),
            max: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl Backoff {
    /// Validated exponential backoff.
    pub fn exponential(
        initial: Duration,
        max: Duration,
        multiplier: f64,
        jitter: f64,
    ) -> Result<Self> {
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::config(format!(
                "retry multiplier must be at least 1, got {multiplier}"
            )));
        }
        if !(0.0..=1.0).contains(&jitter) {
            return Err(Error::config(format!(
                "retry jitter must be within [0, 1], got {jitter}"
            )));
        }
        if initial > max {
            return Err(Error::config(format!(
                "initial retry delay {initial:?} exceeds max delay {max:?}"
            )));
        }
        Ok(Self::Exponential {
            initial,
            max,
            multiplier,
            jitter,
        })
    }

    /// Delay after the given number of failed attempts (starting at 1).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential {
                initial,
                max,
                multiplier,
                jitter,
            } => {
                if initial.is_zero() {
                    return Duration::ZERO;
                }
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let base = (initial.as_secs_f64() * multiplier.powi(exponent))
                    .min(max.as_secs_f64());
                let spread = if jitter <= f64::EPSILON {
                    0.0
                } else {
                    rand::rng().random_range(-jitter..=jitter)
                };
                Duration::try_from_secs_f64((base * (1.0 + spread)).max(0.0)).unwrap_or(max)
            }
        }
    }
}

/// What a [`RetryStrategy`] wants after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Surface the error.
    Stop,
    /// Try again after the delay.
    Wait(Duration),
}

/// Custom retry decisions.
///
/// A strategy is created fresh for every call, so it may keep its own state
/// (an attempt counter, a budget, ...).
pub trait RetryStrategy: Send {
    /// Decide after the `attempt`-th failure.
    fn decide(&mut self, attempt: u32, error: &Error) -> RetryDecision;
}

impl<F> RetryStrategy for F
where
    F: FnMut(u32, &Error) -> RetryDecision + Send,
{
    fn decide(&mut self, attempt: u32, error: &Error) -> RetryDecision {
        self(attempt, error)
    }
}

/// Builds a fresh [`RetryStrategy`] for each call.
pub type StrategyFactory = Arc<dyn Fn() -> Box<dyn RetryStrategy> + Send + Sync>;

/// Retry settings of an enabled client.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    max_duration: Duration,
    backoff: Backoff,
    speedup: u32,
    strategy: Option<StrategyFactory>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_duration: Duration::from_secs(30),
            backoff: Backoff::default(),
            speedup: 1,
            strategy: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("max_duration", &self.max_duration)
            .field("backoff", &self.backoff)
            .field("speedup", &self.speedup)
            .field("custom_strategy", &self.strategy.is_some())
            .finish()
    }
}

impl RetryPolicy {
    /// Total attempts, first one included.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::config("retry max attempts must be at least 1"));
        }
        self.max_attempts = max_attempts;
        Ok(self)
    }

    /// Wall-time budget for the whole call.
    #[must_use]
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Delay computation.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Divide every delay by `factor`.
    pub fn with_speedup(mut self, factor: u32) -> Result<Self> {
        if factor == 0 {
            return Err(Error::config("retry speedup factor must be at least 1"));
        }
        self.speedup = factor;
        Ok(self)
    }

    /// Replace classification and delays with a custom strategy.
    #[must_use]
    pub fn with_strategy(mut self, factory: StrategyFactory) -> Self {
        self.strategy = Some(factory);
        self
    }

    /// Total attempts, first one included.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wall-time budget for the whole call.
    #[must_use]
    pub const fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// Delay computation.
    #[must_use]
    pub const fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Speedup factor applied to every delay.
    #[must_use]
    pub const fn speedup(&self) -> u32 {
        self.speedup
    }

    /// Start the retry bookkeeping of one call.
    #[must_use]
    pub fn schedule(&self) -> RetrySchedule<'_> {
        RetrySchedule {
            policy: self,
            strategy: self.strategy.as_ref().map(|factory| factory()),
        }
    }
}

/// Retry state of a single call.
pub struct RetrySchedule<'a> {
    policy: &'a RetryPolicy,
    strategy: Option<Box<dyn RetryStrategy>>,
}

impl RetrySchedule<'_> {
    /// Delay before the next attempt, or `None` to give up.
    ///
    /// `attempt` is the number of attempts made so far and `elapsed` the time
    /// since the call started.
    pub fn next_delay(
        &mut self,
        attempt: u32,
        error: &Error,
        elapsed: Duration,
    ) -> Option<Duration> {
        if error.is_cancelled() || attempt >= self.policy.max_attempts {
            return None;
        }

        let delay = match &mut self.strategy {
            Some(strategy) => match strategy.decide(attempt, error) {
                RetryDecision::Stop => return None,
                RetryDecision::Wait(delay) => delay,
            },
            None if error.is_retryable() => self.policy.backoff.delay(attempt),
            None => return None,
        };
        let delay = delay / self.policy.speedup;

        elapsed
            .checked_add(delay)
            .is_some_and(|end| end <= self.policy.max_duration)
            .then_some(delay)
    }
}

impl fmt::Debug for RetrySchedule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySchedule")
            .field("policy", self.policy)
            .finish_non_exhaustive()
    }
}
