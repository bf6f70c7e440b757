use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::Result;
use dpcount_engine::NoiseRng;
use dpcount_visits::{load_config, Config, ConfigError, ConfigFormat, VisitsPerHour};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "dpcount-visits",
    version,
    about = "Counts restaurant visits per hour, exactly and with differential privacy"
)]
struct Cli {
    /// Path to configuration file (TOML or YAML). Built-in defaults when omitted.
    #[arg(long, env = "DPCOUNT_CONFIG")]
    config: Option<PathBuf>,
    /// Explicit configuration format override.
    #[arg(long, value_enum, default_value_t = ConfigFormat::Auto)]
    config_format: ConfigFormat,
    /// Visits CSV to read.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Where the exact counts are written.
    #[arg(long)]
    non_private_output: Option<PathBuf>,
    /// Where the noisy counts are written.
    #[arg(long)]
    private_output: Option<PathBuf>,
    /// Privacy budget for the whole run.
    #[arg(long)]
    epsilon: Option<f64>,
    /// Hours a single visitor may contribute to.
    #[arg(long)]
    max_partitions: Option<u32>,
    /// Only count visits from this day.
    #[arg(long)]
    day: Option<i64>,
    /// Ingest with this many parallel shards.
    #[arg(long)]
    shards: Option<usize>,
    /// Derive the noise seed from a label. Reproducible, and therefore NOT private.
    #[arg(long)]
    seed_label: Option<String>,
    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = match &cli.config {
        Some(path) => load_config(path, cli.config_format)?,
        None => Config::sample(),
    };
    apply_overrides(&mut config, &cli);
    config.validate().map_err(|err| match err {
        ConfigError::Validation(reason) => color_eyre::eyre::eyre!(reason),
        other => other.into(),
    })?;

    let rng = match &cli.seed_label {
        Some(label) => {
            warn!(label = %label, "noise seeded from a label; published counts are not private");
            NoiseRng::from_label(label)
        }
        None => NoiseRng::secure(),
    };

    let outcome = VisitsPerHour::new(config).run_files(Arc::new(rng))?;
    println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(input) = &cli.input {
        config.io.input = input.clone();
    }
    if let Some(path) = &cli.non_private_output {
        config.io.non_private_output = path.clone();
    }
    if let Some(path) = &cli.private_output {
        config.io.private_output = path.clone();
    }
    if let Some(epsilon) = cli.epsilon {
        config.privacy.epsilon = epsilon;
    }
    if let Some(max) = cli.max_partitions {
        config.privacy.max_partitions_per_entity = max;
    }
    if cli.day.is_some() {
        config.scenario.day = cli.day;
    }
    if let Some(shards) = cli.shards {
        config.scenario.shards = shards;
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
