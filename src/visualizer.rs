use crate::circuit_breaker::{Snapshot, State};

#[derive(Debug, PartialEq)]
pub struct Visualizer<'a> {
	snapshot: &'a Snapshot,
	width: usize,
}

impl<'a> Visualizer<'a> {
	pub fn new(snapshot: &'a Snapshot) -> Self {
		let width = Self::body(snapshot, Self::label(snapshot.state)).chars().count();
		Self { snapshot, width }
	}

	fn label(state: State) -> &'static str {
		match state {
			State::Closed => "CLOSED   ",
			State::Open => "OPEN     ",
			State::HalfOpen => "HALF-OPEN",
		}
	}

	fn color(state: State) -> &'static str {
		match state {
			State::Closed => "\x1b[42m",
			State::HalfOpen => "\x1b[43m",
			State::Open => "\x1b[41m",
		}
	}

	fn body(snapshot: &Snapshot, label: &str) -> String {
		format!(
			" {label} failures {:0>3}/{:0>3}  retry in {:>6.1}s ",
			snapshot.failure_count,
			snapshot.error_threshold,
			snapshot.cooldown_remaining.as_secs_f64()
		)
	}

	fn is_open(&self) -> bool {
		self.snapshot.state == State::Open
	}

	fn render_top(&self) -> String {
		match self.is_open() {
			true => format!("┏{}┓", "━".repeat(self.width)),
			false => format!("┌{}┐", "─".repeat(self.width)),
		}
	}

	fn render_middle(&self) -> String {
		let state = self.snapshot.state;
		let label = format!("{}{}\x1b[0m", Self::color(state), Self::label(state));
		let body = Self::body(self.snapshot, &label);
		match self.is_open() {
			true => format!("┃{body}┃"),
			false => format!("│{body}│"),
		}
	}

	fn render_bottom(&self) -> String {
		match self.is_open() {
			true => format!("┗{}┛", "━".repeat(self.width)),
			false => format!("└{}┘", "─".repeat(self.width)),
		}
	}

	pub fn render(&self) -> String {
		[self.render_top(), self.render_middle(), self.render_bottom()].join("\n")
	}
}
