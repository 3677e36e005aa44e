use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

mod assessment;
mod kafka;

pub use assessment::{AssessmentConfig, FilterLists, ProductionMode, Stage};
pub use kafka::{KafkaConfig, SecurityProtocol};

/// Configuration errors detected before any network call is made.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("bootstrap servers must be set (flag --bootstrap-servers or env KAFKA_BOOTSTRAP)")]
    EmptyBootstrap,

    #[error("{field} is required for the {mechanism} mechanism")]
    MissingCredential {
        field: &'static str,
        mechanism: &'static str,
    },

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read list file {}", path.display())]
    ListSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Where the list of idle topics is written.
    pub filename: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            filename: PathBuf::from("idleTopics.txt"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Configuration {
    /// Cluster connection and authentication
    pub kafka: KafkaConfig,
    /// Idleness thresholds, skipped checks and topic lists
    pub assessment: AssessmentConfig,
    /// Report destination
    pub report: ReportConfig,
}

impl Configuration {
    pub const DEFAULT_FILE: &'static str = "idle-topics.toml";
    pub const ENV_PREFIX: &'static str = "IDLE_TOPICS__";

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from_path(Path::new(Self::DEFAULT_FILE))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        let config = Self::figment(path).extract().map_err(Box::new)?;

        Ok(config)
    }

    /// Validate everything that can be checked without touching the cluster.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.kafka.validate()?;
        self.assessment.validate()?;
        Ok(())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.kafka.password.is_some() {
            config.kafka.password = Some("<redacted>".to_string());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::time::Duration;

    #[test]
    fn test_defaults_match_legacy_flags() {
        let config = Configuration::default();

        assert_eq!(config.assessment.production_assessment_time_ms, 30_000);
        assert_eq!(config.assessment.idle_minutes, 0);
        assert!(!config.assessment.hide_internal_topics);
        assert!(config.assessment.skip.is_empty());
        assert_eq!(config.report.filename, PathBuf::from("idleTopics.txt"));
        assert_eq!(config.kafka.security, SecurityProtocol::None);
    }

    #[test]
    fn test_configless_operation() {
        Jail::expect_with(|_jail| {
            let config = Configuration::load().map_err(|e| *e)?;
            assert_eq!(config.kafka.client_id, "kafka-idle-topics");
            assert_eq!(config.kafka.request_timeout, Duration::from_secs(30));
            assert_eq!(config.assessment.retry_backoff, Duration::from_millis(200));
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "idle-topics.toml",
                r#"
                [kafka]
                bootstrap_servers = "broker-1:9092,broker-2:9092"
                security = "plain_tls"
                username = "svc"
                password = "pw"
                request_timeout = "5s"

                [assessment]
                idle_minutes = 120
                skip = ["consumption", "storage"]
                allow_list = "orders,payments"
                "#,
            )?;

            let config = Configuration::load().map_err(|e| *e)?;
            assert_eq!(
                config.kafka.bootstrap_servers,
                "broker-1:9092,broker-2:9092"
            );
            assert_eq!(config.kafka.security, SecurityProtocol::PlainTls);
            assert_eq!(config.kafka.request_timeout, Duration::from_secs(5));
            assert_eq!(
                config.assessment.production_mode(),
                ProductionMode::IdleSince { minutes: 120 }
            );
            assert_eq!(
                config.assessment.skip,
                vec![Stage::Consumption, Stage::Storage]
            );
            assert_eq!(config.assessment.allow_list.as_str(), "orders,payments");
            assert!(config.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_env_var_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                [kafka]
                bootstrap_servers = "from-file:9092"
                "#,
            )?;
            jail.set_env("IDLE_TOPICS__KAFKA__BOOTSTRAP_SERVERS", "from-env:9092");
            jail.set_env("IDLE_TOPICS__ASSESSMENT__HIDE_INTERNAL_TOPICS", "true");
            jail.set_env("IDLE_TOPICS__REPORT__FILENAME", "out/idle.txt");

            let config = Configuration::load_from_path(Path::new("custom.toml"))
                .map_err(|e| *e)?;
            assert_eq!(config.kafka.bootstrap_servers, "from-env:9092");
            assert!(config.assessment.hide_internal_topics);
            assert_eq!(config.report.filename, PathBuf::from("out/idle.txt"));
            Ok(())
        });
    }

    #[test]
    fn test_validate_reports_missing_credential_first() {
        let config = Configuration {
            kafka: KafkaConfig {
                bootstrap_servers: "localhost:9092".to_string(),
                security: SecurityProtocol::Plain,
                ..Default::default()
            },
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "username is required for the PLAIN mechanism"
        );
    }

    #[test]
    fn test_redacted_masks_password() {
        let mut config = Configuration::default();
        config.kafka.password = Some("hunter2".to_string());

        let redacted = config.redacted();
        assert_eq!(redacted.kafka.password.as_deref(), Some("<redacted>"));
        assert_eq!(config.kafka.password.as_deref(), Some("hunter2"));
    }
}
