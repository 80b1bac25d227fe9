use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use circuitguard::Settings;

#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "circuitguard", version)]
#[command(about = "Drive a circuit breaker against a simulated flaky dependency", long_about = None)]
pub struct Args {
	/// TOML file with error_threshold and cooldown_secs. Flags override it.
	#[arg(short, long)]
	pub config: Option<PathBuf>,

	/// Consecutive failures that trip the circuit open.
	#[arg(short, long = "error_threshold", value_name = "NUMBER")]
	pub error_threshold: Option<usize>,

	/// Seconds the circuit stays open before a probe is allowed.
	#[arg(short = 'r', long, value_name = "SECONDS")]
	pub cooldown: Option<u64>,

	/// Probability that a simulated call fails.
	#[arg(short, long = "failure_rate", value_name = "FLOAT", default_value_t = 0.5, value_parser = parse_rate)]
	pub failure_rate: f64,

	/// Milliseconds between attempts.
	#[arg(short, long, value_name = "MILLIS", default_value_t = 1000)]
	pub interval: u64,

	/// Stop after this many attempts instead of running forever.
	#[arg(short = 'n', long, value_name = "NUMBER")]
	pub attempts: Option<u64>,

	/// Seed for a reproducible simulation.
	#[arg(short, long, value_name = "NUMBER")]
	pub seed: Option<u64>,

	/// Wait on the cooldown timer instead of polling at the interval.
	#[arg(short, long)]
	pub wait: bool,

	/// Don't print the status panel after each attempt.
	#[arg(short, long)]
	pub quiet: bool,
}

impl Args {
	/// Applies flag overrides on top of `base`.
	pub fn settings(&self, base: Settings) -> Settings {
		let mut settings = base;
		if let Some(threshold) = self.error_threshold {
			settings = settings.set_error_threshold(threshold);
		}
		if let Some(cooldown) = self.cooldown {
			settings = settings.set_cooldown(Duration::from_secs(cooldown));
		}
		settings
	}

	pub fn interval(&self) -> Duration {
		Duration::from_millis(self.interval)
	}
}

fn parse_rate(value: &str) -> Result<f64, String> {
	let rate: f64 = value.parse().map_err(|_| format!("`{value}` is not a number"))?;
	if (0.0..=1.0).contains(&rate) {
		Ok(rate)
	} else {
		Err(format!("`{value}` is not between 0.0 and 1.0"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse_args(args: &[&str]) -> Result<Args, clap::Error> {
		Args::try_parse_from(std::iter::once("circuitguard").chain(args.iter().copied()))
	}

	#[test]
	fn parse_args_defaults() {
		let args = parse_args(&[]).unwrap();
		assert_eq!(
			args,
			Args {
				config: None,
				error_threshold: None,
				cooldown: None,
				failure_rate: 0.5,
				interval: 1000,
				attempts: None,
				seed: None,
				wait: false,
				quiet: false,
			}
		);
		assert_eq!(args.settings(Settings::default()), Settings::default());
	}

	#[test]
	fn parse_args_long_flags() {
		assert_eq!(
			parse_args(&[
				"--config",
				"breaker.toml",
				"--error_threshold",
				"42",
				"--cooldown",
				"200",
				"--failure_rate",
				"0.25",
				"--interval",
				"550",
				"--attempts",
				"666",
				"--seed",
				"7",
				"--wait",
				"--quiet",
			])
			.unwrap(),
			Args {
				config: Some(PathBuf::from("breaker.toml")),
				error_threshold: Some(42),
				cooldown: Some(200),
				failure_rate: 0.25,
				interval: 550,
				attempts: Some(666),
				seed: Some(7),
				wait: true,
				quiet: true,
			}
		);
	}

	#[test]
	fn parse_args_short_flags() {
		assert_eq!(
			parse_args(&[
				"-c", "b.toml", "-e", "5", "-r", "62", "-f", "1", "-i", "10", "-n", "3", "-s", "1", "-w", "-q",
			])
			.unwrap(),
			Args {
				config: Some(PathBuf::from("b.toml")),
				error_threshold: Some(5),
				cooldown: Some(62),
				failure_rate: 1.0,
				interval: 10,
				attempts: Some(3),
				seed: Some(1),
				wait: true,
				quiet: true,
			}
		);
	}

	#[test]
	fn parse_args_overrides_settings() {
		let base = Settings::new(9, Duration::from_secs(90));
		assert_eq!(
			parse_args(&["-e", "2"]).unwrap().settings(base),
			Settings::new(2, Duration::from_secs(90))
		);
		assert_eq!(
			parse_args(&["-r", "5"]).unwrap().settings(base),
			Settings::new(9, Duration::from_secs(5))
		);
		assert_eq!(parse_args(&["-i", "250"]).unwrap().interval(), Duration::from_millis(250));
	}

	#[test]
	fn parse_args_error_threshold_error_negative() {
		assert!(parse_args(&["-e", "-9"]).is_err());
	}

	#[test]
	fn parse_args_error_threshold_error_missing() {
		assert!(parse_args(&["-e"]).is_err());
	}

	#[test]
	fn parse_args_cooldown_error_not_a_number() {
		assert!(parse_args(&["--cooldown", "soon"]).is_err());
	}

	#[test]
	fn parse_args_failure_rate_out_of_range() {
		assert!(parse_args(&["-f", "1.5"]).is_err());
		assert!(parse_args(&["-f", "-0.1"]).is_err());
		assert!(parse_args(&["-f", "half"]).is_err());
	}

	#[test]
	fn parse_args_unknown_flag() {
		assert!(parse_args(&["--buffer_size", "5"]).is_err());
	}
}
