//! Observability sink for breaker events.
//!
//! The breaker never configures logging itself. It hands every event to an
//! [`Observer`]; the default one forwards to `tracing` and leaves subscriber
//! setup to the application.

use std::sync::Arc;

use tracing::Level;

use crate::circuit_breaker::{Outcome, State};
use crate::error::Rejection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
	Transition {
		from: State,
		to: State,
	},
	Attempt {
		outcome: Outcome,
		failure_count: usize,
		error_threshold: usize,
	},
	Rejected {
		reason: Rejection,
	},
}

impl Event {
	/// Severity of the event. Transitions are keyed to the destination state.
	pub fn level(&self) -> Level {
		match self {
			Event::Transition { to: State::Open, .. } => Level::ERROR,
			Event::Transition { to: State::HalfOpen, .. } => Level::WARN,
			Event::Transition { to: State::Closed, .. } => Level::INFO,
			Event::Attempt {
				outcome: Outcome::Success,
				..
			} => Level::INFO,
			Event::Attempt {
				outcome: Outcome::Failure,
				..
			} => Level::WARN,
			Event::Rejected { .. } => Level::DEBUG,
		}
	}
}

pub trait Observer: Send + Sync {
	fn emit(&self, event: &Event);
}

impl<O: Observer + ?Sized> Observer for Arc<O> {
	fn emit(&self, event: &Event) {
		(**self).emit(event)
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
	fn emit(&self, event: &Event) {
		match *event {
			Event::Transition { from, to } => match to {
				State::Open => tracing::error!(%from, %to, "Changed state from {from} to {to}"),
				State::HalfOpen => tracing::warn!(%from, %to, "Changed state from {from} to {to}"),
				State::Closed => tracing::info!(%from, %to, "Changed state from {from} to {to}"),
			},
			Event::Attempt {
				outcome: Outcome::Success,
				failure_count,
				error_threshold,
			} => tracing::info!(failure_count, error_threshold, "Successful request"),
			Event::Attempt {
				outcome: Outcome::Failure,
				failure_count,
				error_threshold,
			} => tracing::warn!(
				failure_count,
				error_threshold,
				"Failed request, error count is {failure_count}, threshold is {error_threshold}"
			),
			Event::Rejected { reason } => {
				tracing::debug!(retry_in = ?reason.retry_in(), "Rejected request: {reason}")
			},
		}
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
	fn emit(&self, _event: &Event) {}
}
