use anyhow::{Context, Result};
use clap::Parser;
use common::cli::{CommonArgs, CommonCommands, ConfigOverrides, utils};
use detector::{DetectionSettings, IdleTopicDetector, KafkaConnector, ReportWriter};

#[derive(Parser)]
#[command(name = "kafka-idle-topics")]
#[command(about = "Find Kafka topics with no production, no consumers and no stored data")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Option<CommonCommands>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    // Defaults, then file, then IDLE_TOPICS__* env, then flags
    let mut config = utils::load_config(cli.common.config.as_ref())?;
    cli.overrides.apply(&mut config);

    let command = cli.command.unwrap_or_default();
    if utils::handle_common_command(&command, &config)? {
        return Ok(());
    }

    utils::validate_config(&config)?;
    let settings = DetectionSettings::from_config(&config.assessment)
        .context("Failed to resolve assessment settings")?;

    log::info!("Assessing cluster at {}", config.kafka.bootstrap_servers);
    log::info!("  Production mode: {:?}", settings.production_mode);
    if !settings.skip.is_empty() {
        let skipped: Vec<&str> = settings.skip.iter().map(|stage| stage.as_str()).collect();
        log::info!("  Skipping checks: {}", skipped.join(","));
    }

    let connector =
        KafkaConnector::new(&config.kafka).with_max_concurrency(settings.lookup.max_concurrency);
    let detector = IdleTopicDetector::new(connector, settings);
    let report = detector
        .run()
        .await
        .context("Idle topic detection failed")?;

    let path = ReportWriter::new(&config.report.filename)
        .write(&report.candidates)
        .context("Failed to write idle topic report")?;

    log::info!(
        "Done! You can delete {} topics and {} partitions! A list of found idle topics is available at: {}",
        report.candidates.len(),
        report.partition_count,
        path.display()
    );

    Ok(())
}
