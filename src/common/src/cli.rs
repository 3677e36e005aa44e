use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::config::{Configuration, SecurityProtocol, Stage};
use crate::string_set::StringSetSource;

/// Common CLI arguments
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Subcommands available besides the assessment itself
#[derive(Subcommand, Debug, Clone, Default)]
pub enum CommonCommands {
    /// Assess the cluster and write the idle topic report (default behavior)
    #[default]
    Run,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Cluster connection flags. Each falls back to the environment variable the
/// tool has always honored.
#[derive(Args, Debug, Clone, Default)]
pub struct ClusterArgs {
    #[arg(
        long = "bootstrap-servers",
        alias = "bootstrapServers",
        env = "KAFKA_BOOTSTRAP",
        help = "Address of the target Kafka cluster. Separate multiple endpoints with a comma"
    )]
    pub bootstrap_servers: Option<String>,

    #[arg(long, env = "KAFKA_USERNAME", help = "Username for the PLAIN mechanism")]
    pub username: Option<String>,

    #[arg(
        long,
        env = "KAFKA_PASSWORD",
        hide_env_values = true,
        help = "Password for the PLAIN mechanism"
    )]
    pub password: Option<String>,

    #[arg(
        long = "kafka-security",
        alias = "kafkaSecurity",
        help = "Connection type: none, tls, plain, plain_tls, gssapi, gssapi_tls"
    )]
    pub kafka_security: Option<SecurityProtocol>,

    #[arg(
        long = "gssapi-keytab",
        alias = "gssapiKeytab",
        env = "KAFKA_GSSAPI_KEYTAB",
        help = "Keytab file path for the GSSAPI mechanism"
    )]
    pub gssapi_keytab: Option<String>,

    #[arg(
        long = "gssapi-servicename",
        alias = "gssapiServicename",
        env = "KAFKA_GSSAPI_SERVICENAME",
        help = "Kafka service name for the GSSAPI mechanism"
    )]
    pub gssapi_service_name: Option<String>,
}

/// Assessment flags.
#[derive(Args, Debug, Clone, Default)]
pub struct AssessmentArgs {
    #[arg(
        long = "production-assessment-time-ms",
        alias = "productionAssessmentTimeMs",
        help = "Timeframe in milliseconds to assess active production"
    )]
    pub production_assessment_time_ms: Option<u64>,

    #[arg(
        long = "idle-minutes",
        alias = "idleMinutes",
        env = "KAFKA_IDLE_MINUTES",
        help = "Minutes a topic must be without production to be reported"
    )]
    pub idle_minutes: Option<i64>,

    #[arg(
        long = "hide-internal-topics",
        alias = "hideInternalTopics",
        help = "Hide broker-internal topics such as __consumer_offsets from assessment"
    )]
    pub hide_internal_topics: bool,

    #[arg(
        long = "hide-topics-prefixes",
        alias = "hideTopicsPrefixes",
        help = "Prefixes disqualified from assessment. A comma-delimited list or a path to a file"
    )]
    pub hide_topics_prefixes: Option<String>,

    #[arg(
        long = "allow-list",
        alias = "allowList",
        help = "Topics to evaluate. A comma-delimited list or a path to a file"
    )]
    pub allow_list: Option<String>,

    #[arg(
        long = "disallow-list",
        alias = "disallowList",
        help = "Topics to exclude from evaluation. A comma-delimited list or a path to a file"
    )]
    pub disallow_list: Option<String>,

    #[arg(
        long,
        value_delimiter = ',',
        help = "Checks to skip: production, consumption, storage. Comma-delimited"
    )]
    pub skip: Vec<Stage>,

    #[arg(
        long = "lookup-retries",
        help = "Retries for a failing partition offset lookup before aborting"
    )]
    pub lookup_retries: Option<u32>,

    #[arg(
        long = "max-concurrent-lookups",
        help = "Upper bound on concurrent partition offset lookups"
    )]
    pub max_concurrent_lookups: Option<usize>,

    #[arg(long, alias = "fileName", help = "Output file for the idle topic list")]
    pub filename: Option<PathBuf>,
}

/// Flags layered on top of the loaded configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    #[command(flatten)]
    pub cluster: ClusterArgs,

    #[command(flatten)]
    pub assessment: AssessmentArgs,
}

impl ConfigOverrides {
    /// Apply every flag that was given; flags win over file and environment.
    pub fn apply(&self, config: &mut Configuration) {
        let cluster = &self.cluster;
        let kafka = &mut config.kafka;
        if let Some(servers) = &cluster.bootstrap_servers {
            kafka.bootstrap_servers = servers.clone();
        }
        if let Some(security) = cluster.kafka_security {
            kafka.security = security;
        }
        override_option(&mut kafka.username, &cluster.username);
        override_option(&mut kafka.password, &cluster.password);
        override_option(&mut kafka.gssapi_keytab, &cluster.gssapi_keytab);
        override_option(&mut kafka.gssapi_service_name, &cluster.gssapi_service_name);

        let args = &self.assessment;
        let assessment = &mut config.assessment;
        if let Some(ms) = args.production_assessment_time_ms {
            assessment.production_assessment_time_ms = ms;
        }
        if let Some(minutes) = args.idle_minutes {
            assessment.idle_minutes = minutes;
        }
        if args.hide_internal_topics {
            assessment.hide_internal_topics = true;
        }
        if let Some(prefixes) = &args.hide_topics_prefixes {
            assessment.hide_topic_prefixes = StringSetSource::new(prefixes.clone());
        }
        if let Some(allow) = &args.allow_list {
            assessment.allow_list = StringSetSource::new(allow.clone());
        }
        if let Some(disallow) = &args.disallow_list {
            assessment.disallow_list = StringSetSource::new(disallow.clone());
        }
        if !args.skip.is_empty() {
            assessment.skip = args.skip.clone();
        }
        if let Some(retries) = args.lookup_retries {
            assessment.lookup_retries = retries;
        }
        if let Some(limit) = args.max_concurrent_lookups {
            assessment.max_concurrent_lookups = limit;
        }
        if let Some(filename) = &args.filename {
            config.report.filename = filename.clone();
        }
    }
}

fn override_option(target: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        *target = Some(value.clone());
    }
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Initialize logging based on CLI arguments. `RUST_LOG` takes precedence.
    pub fn init_logging(args: &CommonArgs) {
        let level = if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        let config = config.redacted();
        if json {
            let json = serde_json::to_string_pretty(&config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("kafka-idle-topics configuration:");
            println!("================================");
            println!("Bootstrap servers: {}", config.kafka.bootstrap_servers);
            println!("Security: {}", config.kafka.security);
            println!("Request timeout: {:?}", config.kafka.request_timeout);

            let assessment = &config.assessment;
            println!("Production mode: {:?}", assessment.production_mode());
            println!("Hide internal topics: {}", assessment.hide_internal_topics);
            println!("Hidden prefixes: {}", assessment.hide_topic_prefixes.as_str());
            println!("Allow list: {}", assessment.allow_list.as_str());
            println!("Disallow list: {}", assessment.disallow_list.as_str());
            let skip: Vec<&str> = assessment.skip.iter().map(Stage::as_str).collect();
            println!("Skipped checks: {}", skip.join(","));
            println!("Lookup retries: {}", assessment.lookup_retries);
            println!("Max concurrent lookups: {}", assessment.max_concurrent_lookups);

            println!("Report file: {}", config.report.filename.display());
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        config.validate().context("Invalid configuration")?;

        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle commands that don't run an assessment.
    ///
    /// Returns `true` when the command was handled and the process should exit.
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(true)
            }
            CommonCommands::Run => Ok(false),
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use figment::Jail;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        overrides: ConfigOverrides,

        #[command(subcommand)]
        command: Option<CommonCommands>,
    }

    /// Call from inside a `Jail` so the `KAFKA_*` fallbacks only see
    /// variables the test sets.
    fn parse_jailed(args: &[&str]) -> figment::error::Result<TestCli> {
        TestCli::try_parse_from(args)
            .map_err(|e| figment::Error::from(e.to_string()))
    }

    #[test]
    fn test_common_commands_default() {
        let default_cmd = CommonCommands::default();
        assert!(matches!(default_cmd, CommonCommands::Run));
    }

    #[test]
    fn test_version_info() {
        let version = utils::version_info();
        assert!(version.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_flags_override_configuration() {
        Jail::expect_with(|_jail| {
            let cli = parse_jailed(&[
                "kafka-idle-topics",
                "--bootstrap-servers",
                "broker:9092",
                "--kafka-security",
                "PLAIN",
                "--username",
                "svc",
                "--idle-minutes",
                "60",
                "--skip",
                "consumption,STORAGE",
                "--hide-internal-topics",
                "--allow-list",
                "orders,payments",
                "--filename",
                "report.txt",
            ])?;

            let mut config = Configuration::default();
            cli.overrides.apply(&mut config);

            assert_eq!(config.kafka.bootstrap_servers, "broker:9092");
            assert_eq!(config.kafka.security, SecurityProtocol::Plain);
            assert_eq!(config.kafka.username.as_deref(), Some("svc"));
            assert_eq!(config.assessment.idle_minutes, 60);
            assert_eq!(
                config.assessment.skip,
                vec![Stage::Consumption, Stage::Storage]
            );
            assert!(config.assessment.hide_internal_topics);
            assert_eq!(config.assessment.allow_list.as_str(), "orders,payments");
            assert_eq!(config.report.filename, PathBuf::from("report.txt"));
            assert!(cli.command.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_legacy_camel_case_flags_are_accepted() {
        Jail::expect_with(|_jail| {
            let cli = parse_jailed(&[
                "kafka-idle-topics",
                "--bootstrapServers",
                "broker:9092",
                "--productionAssessmentTimeMs",
                "5000",
                "--disallowList",
                "audit",
                "--hideTopicsPrefixes",
                "tmp_",
            ])?;

            let mut config = Configuration::default();
            cli.overrides.apply(&mut config);

            assert_eq!(config.assessment.production_assessment_time_ms, 5000);
            assert_eq!(config.assessment.disallow_list.as_str(), "audit");
            assert_eq!(config.assessment.hide_topic_prefixes.as_str(), "tmp_");
            Ok(())
        });
    }

    #[test]
    fn test_absent_flags_leave_configuration_untouched() {
        Jail::expect_with(|_jail| {
            let cli = parse_jailed(&["kafka-idle-topics", "validate"])?;

            let mut config = Configuration::default();
            config.assessment.skip = vec![Stage::Storage];
            config.assessment.lookup_retries = 3;
            cli.overrides.apply(&mut config);

            assert_eq!(config.assessment.skip, vec![Stage::Storage]);
            assert_eq!(config.assessment.lookup_retries, 3);
            assert!(matches!(cli.command, Some(CommonCommands::Validate)));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_skip_stage_is_rejected() {
        Jail::expect_with(|_jail| {
            let result = parse_jailed(&["kafka-idle-topics", "--skip", "lag"]);
            assert!(result.is_err());
            Ok(())
        });
    }

    #[test]
    fn test_legacy_env_vars_override_config_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                Configuration::DEFAULT_FILE,
                r#"
                [kafka]
                bootstrap_servers = "file-broker:9092"
                username = "file-user"

                [assessment]
                idle_minutes = 10
                "#,
            )?;
            jail.set_env("KAFKA_BOOTSTRAP", "env-broker:9092");
            jail.set_env("KAFKA_USERNAME", "env-user");
            jail.set_env("KAFKA_PASSWORD", "env-secret");
            jail.set_env("KAFKA_GSSAPI_KEYTAB", "/etc/env.keytab");
            jail.set_env("KAFKA_GSSAPI_SERVICENAME", "env-kafka");
            jail.set_env("KAFKA_IDLE_MINUTES", "45");

            let cli = parse_jailed(&["kafka-idle-topics"])?;
            let mut config = Configuration::load().map_err(|e| *e)?;
            assert_eq!(config.kafka.bootstrap_servers, "file-broker:9092");
            assert_eq!(config.assessment.idle_minutes, 10);

            cli.overrides.apply(&mut config);

            assert_eq!(config.kafka.bootstrap_servers, "env-broker:9092");
            assert_eq!(config.kafka.username.as_deref(), Some("env-user"));
            assert_eq!(config.kafka.password.as_deref(), Some("env-secret"));
            assert_eq!(
                config.kafka.gssapi_keytab.as_deref(),
                Some("/etc/env.keytab")
            );
            assert_eq!(
                config.kafka.gssapi_service_name.as_deref(),
                Some("env-kafka")
            );
            assert_eq!(config.assessment.idle_minutes, 45);
            Ok(())
        });
    }

    #[test]
    fn test_flag_beats_legacy_env_var() {
        Jail::expect_with(|jail| {
            jail.set_env("KAFKA_BOOTSTRAP", "env-broker:9092");
            jail.set_env("KAFKA_IDLE_MINUTES", "45");

            let cli = parse_jailed(&[
                "kafka-idle-topics",
                "--bootstrap-servers",
                "flag-broker:9092",
                "--idle-minutes",
                "90",
            ])?;
            let mut config = Configuration::default();
            cli.overrides.apply(&mut config);

            assert_eq!(config.kafka.bootstrap_servers, "flag-broker:9092");
            assert_eq!(config.assessment.idle_minutes, 90);
            Ok(())
        });
    }

    #[test]
    fn test_non_numeric_idle_minutes_env_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("KAFKA_IDLE_MINUTES", "abc");

            let err = TestCli::try_parse_from(["kafka-idle-topics"]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
            Ok(())
        });
    }
}
