use std::fmt;
use std::time::{Duration, Instant};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{Rejection, SettingsError};
use crate::observer::{Event, Observer, TracingObserver};

/// Status code a guarded call reports on success. Any other code is a failure.
pub const SUCCESS_STATUS: u16 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
	Closed,
	Open,
	HalfOpen,
}

impl fmt::Display for State {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			State::Closed => "closed",
			State::Open => "open",
			State::HalfOpen => "half_open",
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
	Success,
	Failure,
}

impl Outcome {
	pub fn from_status_code(code: u16) -> Self {
		if code == SUCCESS_STATUS {
			Outcome::Success
		} else {
			Outcome::Failure
		}
	}

	pub fn is_success(self) -> bool {
		matches!(self, Outcome::Success)
	}
}

impl From<bool> for Outcome {
	fn from(success: bool) -> Self {
		if success {
			Outcome::Success
		} else {
			Outcome::Failure
		}
	}
}

impl<T, E> From<&Result<T, E>> for Outcome {
	fn from(result: &Result<T, E>) -> Self {
		Outcome::from(result.is_ok())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
	error_threshold: usize,
	cooldown: Duration,
}

impl Settings {
	pub fn new(error_threshold: usize, cooldown: Duration) -> Self {
		Self {
			error_threshold,
			cooldown,
		}
	}

	pub fn error_threshold(&self) -> usize {
		self.error_threshold
	}

	pub fn cooldown(&self) -> Duration {
		self.cooldown
	}

	pub fn set_error_threshold(mut self, threshold: usize) -> Self {
		self.error_threshold = threshold;
		self
	}

	pub fn set_cooldown(mut self, cooldown: Duration) -> Self {
		self.cooldown = cooldown;
		self
	}

	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.error_threshold == 0 {
			return Err(SettingsError::ZeroThreshold);
		}
		if self.cooldown.is_zero() {
			return Err(SettingsError::ZeroCooldown);
		}
		Ok(())
	}
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			error_threshold: 3,
			cooldown: Duration::from_secs(30),
		}
	}
}

/// Point-in-time copy of what the breaker exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
	pub state: State,
	pub failure_count: usize,
	pub error_threshold: usize,
	pub cooldown_remaining: Duration,
}

/// Consecutive-failure circuit breaker.
///
/// Single-owner: every operation takes `&mut self`. Wrap it in a
/// [`SharedCircuitBreaker`](crate::SharedCircuitBreaker) to share it between
/// concurrent callers.
#[derive(Debug)]
pub struct CircuitBreaker<C = MonotonicClock, O = TracingObserver> {
	settings: Settings,
	state: State,
	failure_count: usize,
	last_attempt: Option<Instant>,
	closed_period: u64,
	clock: C,
	observer: O,
}

impl CircuitBreaker {
	pub fn new(settings: Settings) -> Result<Self, SettingsError> {
		settings.validate()?;
		Ok(Self {
			settings,
			state: State::Closed,
			failure_count: 0,
			last_attempt: None,
			closed_period: 0,
			clock: MonotonicClock,
			observer: TracingObserver,
		})
	}
}

impl<C: Clock, O: Observer> CircuitBreaker<C, O> {
	/// Swaps the time source. An earlier attempt is re-stamped with the new
	/// clock, so an open circuit starts a fresh cooldown.
	pub fn with_clock<N: Clock>(self, clock: N) -> CircuitBreaker<N, O> {
		CircuitBreaker {
			settings: self.settings,
			state: self.state,
			failure_count: self.failure_count,
			last_attempt: self.last_attempt.map(|_| clock.now()),
			closed_period: self.closed_period,
			clock,
			observer: self.observer,
		}
	}

	pub fn with_observer<N: Observer>(self, observer: N) -> CircuitBreaker<C, N> {
		CircuitBreaker {
			settings: self.settings,
			state: self.state,
			failure_count: self.failure_count,
			last_attempt: self.last_attempt,
			closed_period: self.closed_period,
			clock: self.clock,
			observer,
		}
	}

	pub fn current_state(&self) -> State {
		self.state
	}

	pub fn failure_count(&self) -> usize {
		self.failure_count
	}

	pub fn error_threshold(&self) -> usize {
		self.settings.error_threshold
	}

	pub fn cooldown(&self) -> Duration {
		self.settings.cooldown
	}

	pub fn last_attempt(&self) -> Option<Instant> {
		self.last_attempt
	}

	/// Number of times the circuit has re-entered closed since creation.
	pub fn closed_period(&self) -> u64 {
		self.closed_period
	}

	/// Time left before an open circuit admits a probe. Zero in any other state.
	pub fn remaining_cooldown(&self) -> Duration {
		match (self.state, self.last_attempt) {
			(State::Open, Some(last)) => {
				// Cooldowns past what `Instant` can represent never end.
				let elapsed = self.clock.now().saturating_duration_since(last);
				match last.checked_add(self.settings.cooldown) {
					Some(_) => self.settings.cooldown.saturating_sub(elapsed),
					None => self.settings.cooldown,
				}
			},
			_ => Duration::ZERO,
		}
	}

	pub fn snapshot(&self) -> Snapshot {
		Snapshot {
			state: self.state,
			failure_count: self.failure_count,
			error_threshold: self.settings.error_threshold,
			cooldown_remaining: self.remaining_cooldown(),
		}
	}

	/// Runs `call` through whichever path matches the current state.
	///
	/// When the circuit is open and cooling down, `call` is not invoked.
	pub fn evaluate<F>(&mut self, call: F) -> Result<State, Rejection>
	where
		F: FnOnce() -> Outcome,
	{
		match self.state {
			State::Closed => {
				self.evaluate_closed(call());
				Ok(self.state)
			},
			State::Open | State::HalfOpen => self.evaluate_open_or_half_open(call),
		}
	}

	/// Records the outcome of an attempt made while the circuit is closed.
	///
	/// # Panics
	/// If the circuit is not closed.
	pub fn evaluate_closed(&mut self, outcome: Outcome) {
		assert_eq!(
			self.state,
			State::Closed,
			"evaluate_closed called while the circuit is {}",
			self.state
		);

		self.last_attempt = Some(self.clock.now());
		match outcome {
			Outcome::Success => self.failure_count = 0,
			Outcome::Failure => self.failure_count += 1,
		}
		self.emit_attempt(outcome);

		if self.failure_count >= self.settings.error_threshold {
			self.set_state(State::Open);
		}
	}

	/// Probes an open circuit once its cooldown has elapsed.
	///
	/// Returns the state the probe resolved to. A circuit that is still cooling
	/// down rejects immediately without running `probe`.
	///
	/// # Panics
	/// If the circuit is closed.
	pub fn evaluate_open_or_half_open<F>(&mut self, probe: F) -> Result<State, Rejection>
	where
		F: FnOnce() -> Outcome,
	{
		self.admit_probe()?;
		Ok(self.resolve_probe(probe()))
	}

	/// Moves an open circuit to half-open if the cooldown has elapsed.
	///
	/// The caller then owns the single probe and must hand its outcome to
	/// [`resolve_probe`](Self::resolve_probe).
	///
	/// # Panics
	/// If the circuit is closed.
	pub fn admit_probe(&mut self) -> Result<(), Rejection> {
		assert_ne!(self.state, State::Closed, "admit_probe called while the circuit is closed");

		// Elapsed time is measured against the previous attempt, before anything is updated.
		let reason = match self.state {
			State::HalfOpen => Rejection::ProbeInFlight,
			_ => {
				let retry_in = self.remaining_cooldown();
				if retry_in.is_zero() {
					self.set_state(State::HalfOpen);
					return Ok(());
				}
				Rejection::CoolingDown { retry_in }
			},
		};

		self.observer.emit(&Event::Rejected { reason });
		Err(reason)
	}

	/// Settles the in-flight probe.
	///
	/// # Panics
	/// If the circuit is not half-open.
	pub fn resolve_probe(&mut self, outcome: Outcome) -> State {
		assert_eq!(
			self.state,
			State::HalfOpen,
			"resolve_probe called while the circuit is {}",
			self.state
		);

		self.last_attempt = Some(self.clock.now());
		match outcome {
			Outcome::Success => {
				self.failure_count = 0;
				self.emit_attempt(outcome);
				self.set_state(State::Closed);
			},
			Outcome::Failure => {
				self.failure_count += 1;
				self.emit_attempt(outcome);
				self.set_state(State::Open);
			},
		}
		self.state
	}

	fn set_state(&mut self, state: State) {
		let from = self.state;
		self.state = state;
		if state == State::Closed {
			self.closed_period += 1;
		}
		self.observer.emit(&Event::Transition { from, to: state });
	}

	fn emit_attempt(&self, outcome: Outcome) {
		self.observer.emit(&Event::Attempt {
			outcome,
			failure_count: self.failure_count,
			error_threshold: self.settings.error_threshold,
		});
	}
}
