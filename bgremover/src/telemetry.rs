//! Subscriber setup shared by the CLI and the server.
//!
//! The library only emits `tracing` events; binaries call [`TracingConfig::init`] once.

use std::str::FromStr;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
	#[default]
	Compact,
	Pretty,
	Json
}

impl FromStr for LogFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"compact" => Ok(Self::Compact),
			"pretty" => Ok(Self::Pretty),
			"json" => Ok(Self::Json),
			other => Err(format!("unknown log format {other:?} (expected compact, pretty or json)"))
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
	/// 0 = info, 1 = debug, 2+ = trace. Ignored when `RUST_LOG` is set.
	pub verbosity: u8,
	pub format: LogFormat
}

impl TracingConfig {
	pub fn new(verbosity: u8, format: LogFormat) -> Self {
		Self { verbosity, format }
	}

	pub fn verbosity_to_filter(&self) -> &'static str {
		match self.verbosity {
			0 => "info",
			1 => "debug",
			_ => "trace"
		}
	}

	pub fn init(self) -> anyhow::Result<()> {
		let filter = match EnvFilter::try_from_default_env() {
			Ok(f) => f,
			Err(_) => EnvFilter::try_new(self.verbosity_to_filter())?
		};
		let registry = tracing_subscriber::registry().with(filter);

		// Logs go to stderr so CLI output stays pipeable.
		match self.format {
			LogFormat::Compact => registry
				.with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
				.try_init()?,
			LogFormat::Pretty => registry.with(fmt::layer().with_writer(std::io::stderr).pretty()).try_init()?,
			LogFormat::Json => registry
				.with(fmt::layer().with_writer(std::io::stderr).json().with_current_span(true))
				.try_init()?
		}
		Ok(())
	}
}
