mod cli_args;

use anyhow::Context;
use circuitguard::config::load_settings;
use circuitguard::simulation::{OutcomeSource, RandomOutcomes};
use circuitguard::visualizer::Visualizer;
use circuitguard::{CircuitBreaker, Rejection, Settings, SharedCircuitBreaker};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli_args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "circuitguard=info".into()))
		.with(tracing_subscriber::fmt::layer())
		.init();

	let args = Args::parse();

	let base = match &args.config {
		Some(path) => load_settings(path).with_context(|| format!("loading {}", path.display()))?,
		None => Settings::default(),
	};
	let settings = args.settings(base);
	let breaker = SharedCircuitBreaker::new(CircuitBreaker::new(settings).context("invalid breaker settings")?);

	tracing::info!(
		error_threshold = settings.error_threshold(),
		cooldown_secs = settings.cooldown().as_secs(),
		"Starting circuit breaker simulation"
	);

	let mut source = RandomOutcomes::new(args.failure_rate, args.seed);
	tokio::select! {
		_ = drive(&args, &breaker, &mut source) => {},
		_ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
	}

	Ok(())
}

async fn drive(args: &Args, breaker: &SharedCircuitBreaker, source: &mut impl OutcomeSource) {
	let mut attempt = 0u64;
	while args.attempts.map_or(true, |limit| attempt < limit) {
		attempt += 1;

		match breaker.acquire() {
			Ok(permit) => {
				permit.record(source.next_outcome());
			},
			Err(Rejection::CoolingDown { retry_in }) if args.wait => {
				tracing::warn!("Retry after {:.1} secs", retry_in.as_secs_f64());
				breaker.ready().await;
				continue;
			},
			Err(rejection) => tracing::debug!(%rejection, "Skipped attempt"),
		}

		if !args.quiet {
			println!("{}", Visualizer::new(&breaker.snapshot()).render());
		}
		tokio::time::sleep(args.interval()).await;
	}
}
