//! Synthetic outcome sources for the demo driver and tests.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::circuit_breaker::{Outcome, SUCCESS_STATUS};

const FAILURE_STATUS: u16 = 500;

pub trait OutcomeSource {
	fn next_outcome(&mut self) -> Outcome;
}

/// Stub client that answers 200 or 500 at random.
#[derive(Debug)]
pub struct RandomOutcomes {
	rng: StdRng,
	failure_rate: f64,
}

impl RandomOutcomes {
	/// `failure_rate` is clamped to `0.0..=1.0`.
	pub fn new(failure_rate: f64, seed: Option<u64>) -> Self {
		let rng = match seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_entropy(),
		};
		Self {
			rng,
			failure_rate: failure_rate.clamp(0.0, 1.0),
		}
	}

	pub fn next_status_code(&mut self) -> u16 {
		if self.rng.gen_bool(self.failure_rate) {
			FAILURE_STATUS
		} else {
			SUCCESS_STATUS
		}
	}
}

impl OutcomeSource for RandomOutcomes {
	fn next_outcome(&mut self) -> Outcome {
		Outcome::from_status_code(self.next_status_code())
	}
}

/// Replays a fixed sequence, then keeps returning `fallback`.
#[derive(Debug, Clone)]
pub struct ScriptedOutcomes {
	script: VecDeque<Outcome>,
	fallback: Outcome,
}

impl ScriptedOutcomes {
	pub fn new(script: impl IntoIterator<Item = Outcome>, fallback: Outcome) -> Self {
		Self {
			script: script.into_iter().collect(),
			fallback,
		}
	}

	pub fn remaining(&self) -> usize {
		self.script.len()
	}
}

impl OutcomeSource for ScriptedOutcomes {
	fn next_outcome(&mut self) -> Outcome {
		self.script.pop_front().unwrap_or(self.fallback)
	}
}
