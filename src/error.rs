use std::time::Duration;

use thiserror::Error;

/// Why the breaker refused to let a call through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
	#[error("circuit is open, retry in {}ms", retry_in.as_millis())]
	CoolingDown { retry_in: Duration },
	#[error("circuit is half-open and a probe is already in flight")]
	ProbeInFlight,
}

impl Rejection {
	/// How long the caller should wait before asking again, if known.
	pub fn retry_in(&self) -> Option<Duration> {
		match self {
			Rejection::CoolingDown { retry_in } => Some(*retry_in),
			Rejection::ProbeInFlight => None,
		}
	}
}

/// Error returned by [`SharedCircuitBreaker::call`](crate::SharedCircuitBreaker::call).
#[derive(Debug, Error)]
pub enum CallError<E> {
	#[error(transparent)]
	Rejected(Rejection),
	#[error(transparent)]
	Inner(E),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
	#[error("error_threshold must be at least 1")]
	ZeroThreshold,
	#[error("cooldown must be longer than zero")]
	ZeroCooldown,
}
