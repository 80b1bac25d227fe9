//! Breaker shared between concurrent callers.
//!
//! # Design
//! - One mutex guards the whole state machine; it is never held across the
//!   guarded call or across a sleep
//! - An open circuit fails fast, waiting is opt-in through [`SharedCircuitBreaker::ready`]
//! - A half-open circuit hands out exactly one probe permit

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::circuit_breaker::{CircuitBreaker, Outcome, Snapshot, State};
use crate::clock::{Clock, MonotonicClock};
use crate::error::{CallError, Rejection};
use crate::observer::{Observer, TracingObserver};

pub struct SharedCircuitBreaker<C = MonotonicClock, O = TracingObserver> {
	inner: Arc<Mutex<CircuitBreaker<C, O>>>,
}

impl<C, O> Clone for SharedCircuitBreaker<C, O> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<C: Clock, O: Observer> SharedCircuitBreaker<C, O> {
	pub fn new(breaker: CircuitBreaker<C, O>) -> Self {
		Self {
			inner: Arc::new(Mutex::new(breaker)),
		}
	}

	pub fn current_state(&self) -> State {
		self.inner.lock().current_state()
	}

	pub fn snapshot(&self) -> Snapshot {
		self.inner.lock().snapshot()
	}

	/// Asks for permission to make one call.
	///
	/// A closed circuit always grants a permit. An open circuit grants the single
	/// probe permit once its cooldown has elapsed and rejects otherwise.
	pub fn acquire(&self) -> Result<Permit<C, O>, Rejection> {
		let mut breaker = self.inner.lock();
		let kind = match breaker.current_state() {
			State::Closed => PermitKind::Call,
			State::Open | State::HalfOpen => {
				breaker.admit_probe()?;
				PermitKind::Probe
			},
		};

		Ok(Permit {
			closed_period: breaker.closed_period(),
			breaker: Arc::clone(&self.inner),
			kind,
			settled: false,
		})
	}

	/// Waits on a timer until an open circuit's cooldown has elapsed.
	///
	/// Returns immediately in any other state. Another caller may still win the
	/// probe, so [`acquire`](Self::acquire) can reject afterwards.
	pub async fn ready(&self) {
		loop {
			let remaining = self.inner.lock().remaining_cooldown();
			if remaining.is_zero() {
				return;
			}
			tokio::time::sleep(remaining).await;
		}
	}

	/// Runs `operation` under the breaker. `Err` counts as a failure.
	pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CallError<E>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		let permit = self.acquire().map_err(CallError::Rejected)?;
		let result = operation().await;
		permit.record(Outcome::from(&result));
		result.map_err(CallError::Inner)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermitKind {
	Call,
	Probe,
}

/// Permission for one call. Report what happened with [`Permit::record`].
///
/// Dropping a permit without recording counts as a failure, so a caller that
/// times out or is cancelled still reports against the breaker.
#[must_use = "a permit must be settled with `record`"]
pub struct Permit<C: Clock, O: Observer> {
	breaker: Arc<Mutex<CircuitBreaker<C, O>>>,
	kind: PermitKind,
	closed_period: u64,
	settled: bool,
}

impl<C: Clock, O: Observer> Permit<C, O> {
	pub fn is_probe(&self) -> bool {
		self.kind == PermitKind::Probe
	}

	/// Reports the outcome and returns the state the breaker settled in.
	pub fn record(mut self, outcome: Outcome) -> State {
		self.settled = true;
		self.settle(outcome)
	}

	fn settle(&self, outcome: Outcome) -> State {
		let mut breaker = self.breaker.lock();
		match self.kind {
			PermitKind::Probe => breaker.resolve_probe(outcome),
			PermitKind::Call
				if breaker.current_state() == State::Closed && breaker.closed_period() == self.closed_period =>
			{
				breaker.evaluate_closed(outcome);
				breaker.current_state()
			},
			PermitKind::Call => {
				// Granted in an earlier closed period; the circuit has tripped since.
				tracing::debug!(?outcome, state = %breaker.current_state(), "Discarding stale outcome");
				breaker.current_state()
			},
		}
	}
}

impl<C: Clock, O: Observer> Drop for Permit<C, O> {
	fn drop(&mut self) {
		if !self.settled {
			self.settle(Outcome::Failure);
		}
	}
}

#[cfg(test)]
mod test {
	use std::sync::Barrier;
	use std::thread;
	use std::time::{Duration, Instant};

	use super::*;
	use crate::circuit_breaker::Settings;
	use crate::clock::ManualClock;
	use crate::observer::NoopObserver;

	fn shared(threshold: usize) -> (SharedCircuitBreaker<ManualClock, NoopObserver>, ManualClock) {
		let clock = ManualClock::new();
		let cb = CircuitBreaker::new(Settings::new(threshold, Duration::from_secs(30)))
			.unwrap()
			.with_clock(clock.clone())
			.with_observer(NoopObserver);
		(SharedCircuitBreaker::new(cb), clock)
	}

	fn trip(cb: &SharedCircuitBreaker<ManualClock, NoopObserver>) {
		while cb.current_state() == State::Closed {
			cb.acquire().unwrap().record(Outcome::Failure);
		}
	}

	#[test]
	fn closed_permits_test() {
		let (cb, _) = shared(2);
		let permit = cb.acquire().unwrap();
		assert!(!permit.is_probe());
		assert_eq!(permit.record(Outcome::Failure), State::Closed);
		assert_eq!(cb.acquire().unwrap().record(Outcome::Failure), State::Open);
		assert_eq!(cb.snapshot().failure_count, 2);
	}

	#[test]
	fn open_fails_fast_test() {
		let (cb, clock) = shared(1);
		trip(&cb);
		clock.advance(Duration::from_secs(5));
		assert_eq!(
			cb.acquire().err(),
			Some(Rejection::CoolingDown {
				retry_in: Duration::from_secs(25)
			})
		);
	}

	#[test]
	fn single_probe_permit_test() {
		let (cb, clock) = shared(1);
		trip(&cb);
		clock.advance(Duration::from_secs(30));

		let probe = cb.acquire().unwrap();
		assert!(probe.is_probe());
		assert_eq!(cb.current_state(), State::HalfOpen);
		assert_eq!(cb.acquire().err(), Some(Rejection::ProbeInFlight));
		assert_eq!(cb.acquire().err(), Some(Rejection::ProbeInFlight));

		assert_eq!(probe.record(Outcome::Success), State::Closed);
		assert_eq!(cb.snapshot().failure_count, 0);
		let permit = cb.acquire().unwrap();
		assert!(!permit.is_probe());
		assert_eq!(permit.record(Outcome::Success), State::Closed);
	}

	#[test]
	fn dropped_probe_counts_as_failure_test() {
		let (cb, clock) = shared(3);
		trip(&cb);
		clock.advance(Duration::from_secs(30));

		drop(cb.acquire().unwrap());
		assert_eq!(cb.current_state(), State::Open);
		assert_eq!(cb.snapshot().failure_count, 4);
		assert_eq!(cb.snapshot().cooldown_remaining, Duration::from_secs(30));
	}

	#[test]
	fn stale_call_outcome_is_discarded_test() {
		let (cb, clock) = shared(2);
		let slow = cb.acquire().unwrap();
		trip(&cb);
		clock.advance(Duration::from_secs(10));

		assert_eq!(slow.record(Outcome::Success), State::Open);
		assert_eq!(cb.snapshot().failure_count, 2);
		assert_eq!(cb.snapshot().cooldown_remaining, Duration::from_secs(20));
	}

	#[test]
	fn outcome_from_earlier_closed_period_is_discarded_test() {
		let (cb, clock) = shared(1);
		let slow = cb.acquire().unwrap();
		trip(&cb);
		clock.advance(Duration::from_secs(30));
		assert_eq!(cb.acquire().unwrap().record(Outcome::Success), State::Closed);

		assert_eq!(slow.record(Outcome::Failure), State::Closed);
		assert_eq!(cb.snapshot().failure_count, 0);
	}

	#[test]
	fn dropped_call_permit_counts_as_failure_test() {
		let (cb, _) = shared(2);
		drop(cb.acquire().unwrap());
		assert_eq!(cb.snapshot().failure_count, 1);
		drop(cb.acquire().unwrap());
		assert_eq!(cb.current_state(), State::Open);
	}

	#[test]
	fn dropped_stale_call_permit_is_discarded_test() {
		let (cb, clock) = shared(1);
		let slow = cb.acquire().unwrap();
		trip(&cb);
		clock.advance(Duration::from_secs(30));
		assert_eq!(cb.acquire().unwrap().record(Outcome::Success), State::Closed);

		drop(slow);
		assert_eq!(cb.current_state(), State::Closed);
		assert_eq!(cb.snapshot().failure_count, 0);
	}

	#[test]
	fn concurrent_callers_get_one_probe_test() {
		let (cb, clock) = shared(1);
		trip(&cb);
		clock.advance(Duration::from_secs(30));

		let callers = 16;
		let barrier = Arc::new(Barrier::new(callers));
		let handles: Vec<_> = (0..callers)
			.map(|_| {
				let cb = cb.clone();
				let barrier = Arc::clone(&barrier);
				thread::spawn(move || {
					barrier.wait();
					cb.acquire().ok().map(|permit| permit.is_probe())
				})
			})
			.collect();

		let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
		assert_eq!(results.iter().filter(|r| **r == Some(true)).count(), 1);
		assert_eq!(results.iter().filter(|r| r.is_none()).count(), callers - 1);
		// The winning permit was dropped unrecorded inside its thread.
		assert_eq!(cb.current_state(), State::Open);
	}

	#[tokio::test]
	async fn call_test() {
		let (cb, _) = shared(2);

		let ok: Result<u16, CallError<&str>> = cb.call(|| async { Ok(200) }).await;
		assert_eq!(ok.unwrap(), 200);

		for _ in 0..2 {
			let err = cb.call(|| async { Err::<(), _>("boom") }).await;
			assert!(matches!(err, Err(CallError::Inner("boom"))));
		}
		assert_eq!(cb.current_state(), State::Open);

		let mut ran = false;
		let rejected = cb
			.call(|| {
				ran = true;
				async { Ok::<(), &str>(()) }
			})
			.await;
		assert!(matches!(rejected, Err(CallError::Rejected(Rejection::CoolingDown { .. }))));
		assert!(!ran);
	}

	#[tokio::test]
	async fn timed_out_call_counts_as_failure_test() {
		let (cb, _) = shared(1);
		let slow = cb.call(|| async {
			tokio::time::sleep(Duration::from_secs(5)).await;
			Ok::<(), &str>(())
		});

		assert!(tokio::time::timeout(Duration::from_millis(10), slow).await.is_err());
		assert_eq!(cb.current_state(), State::Open);
		assert_eq!(cb.snapshot().failure_count, 1);
	}

	#[tokio::test]
	async fn ready_waits_for_cooldown_test() {
		let cooldown = Duration::from_millis(50);
		let cb = SharedCircuitBreaker::new(
			CircuitBreaker::new(Settings::new(1, cooldown))
				.unwrap()
				.with_observer(NoopObserver),
		);
		cb.acquire().unwrap().record(Outcome::Failure);
		assert_eq!(cb.current_state(), State::Open);

		let start = Instant::now();
		cb.ready().await;
		assert!(start.elapsed() >= Duration::from_millis(40));

		let probe = cb.acquire().unwrap();
		assert!(probe.is_probe());
		assert_eq!(probe.record(Outcome::Success), State::Closed);
	}

	#[tokio::test]
	async fn ready_returns_immediately_when_closed_test() {
		let (cb, _) = shared(3);
		tokio::time::timeout(Duration::from_millis(100), cb.ready())
			.await
			.expect("closed breaker should be ready");
	}
}
