use std::fs::File;
use std::io::BufReader;

use anyhow::{bail, Context};
use clap::Parser;
use neuroseries_core::persist::{ClassTag, Payload, Persist};
use neuroseries_core::{GapMethod, IntervalSet, Samples, TimeSeries, Ts, Tsd, TsdFrame};
use neuroseries_utils::time::TimeUnit;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Parser)]
#[clap(about, version, author)]
struct Config {
    /// persisted series payload
    #[clap(long)]
    pub path: String,

    /// minimum gap, in `unit` for the absolute method or as a multiple of the
    /// median step for the median method
    #[clap(long, default_value_t = 1.0)]
    pub min_gap: f64,

    #[clap(long, default_value_t = GapMethod::Absolute)]
    pub method: GapMethod,

    #[clap(long, default_value_t = TimeUnit::S)]
    pub unit: TimeUnit,

    #[clap(long, default_value = "info")]
    pub log_level: String,
}

fn print_intervals(title: &str, set: &IntervalSet, unit: TimeUnit) {
    println!("{} ({} intervals, {} {})", title, set.len(), set.tot_length(unit), unit);
    for (s, e) in set.iter() {
        println!("{:>16} {:>16}", unit.to_unit(s), unit.to_unit(e));
    }
}

fn report<D: Samples>(series: &TimeSeries<D>, config: &Config) {
    let min_gap = match config.method {
        GapMethod::Absolute => config.min_gap * config.unit.factor() as f64,
        GapMethod::Median => config.min_gap,
    };

    println!("{} samples", series.len());
    print_intervals("gaps", &series.gaps(min_gap, config.method), config.unit);
    print_intervals("support", &series.support(min_gap, config.method), config.unit);
}

fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(?config, "starting");
    if config.path.is_empty() {
        bail!("path MUST not be empty!");
    }

    let file = File::open(&config.path).with_context(|| format!("open {}", config.path))?;
    let payload = Payload::from_reader(BufReader::new(file)).with_context(|| format!("read {}", config.path))?;

    match payload.class {
        ClassTag::Ts => report(&Ts::restore(&payload)?, &config),
        ClassTag::Tsd => report(&Tsd::restore(&payload)?, &config),
        ClassTag::TsdFrame => report(&TsdFrame::restore(&payload)?, &config),
        class => bail!("{} payload is not a time series", class),
    }

    Ok(())
}
