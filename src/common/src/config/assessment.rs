//! Idleness assessment settings: thresholds, skipped stages and topic lists.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::string_set::StringSetSource;

/// One of the idleness checks that can be bypassed with `skip`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Production,
    Consumption,
    Storage,
}

impl Stage {
    /// Stages in pipeline order.
    pub const ALL: [Stage; 3] = [Stage::Production, Stage::Consumption, Stage::Storage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Production => "production",
            Stage::Consumption => "consumption",
            Stage::Storage => "storage",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(Stage::Production),
            "consumption" => Ok(Stage::Consumption),
            "storage" => Ok(Stage::Storage),
            other => Err(ConfigError::InvalidValue {
                field: "assessment.skip",
                reason: format!(
                    "unknown stage '{other}', expected production, consumption or storage"
                ),
            }),
        }
    }
}

/// How the production check decides whether a topic is still written to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductionMode {
    /// Watch high-water-marks for the given window; any advance means active.
    SamplingWindow(Duration),
    /// Look for messages newer than `minutes` ago via timestamp offset lookup.
    IdleSince { minutes: u64 },
}

/// Resolved topic lists, ready for the detector.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterLists {
    pub allow: BTreeSet<String>,
    pub disallow: BTreeSet<String>,
    pub hidden_prefixes: BTreeSet<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    /// Sampling window for the production check, in milliseconds.
    ///
    /// Only used when `idle_minutes` is zero.
    pub production_assessment_time_ms: u64,

    /// Report topics without production for this many minutes. Zero selects
    /// the sampling window instead.
    ///
    /// Env: IDLE_TOPICS__ASSESSMENT__IDLE_MINUTES (or KAFKA_IDLE_MINUTES via the CLI)
    pub idle_minutes: i64,

    /// Leave broker-managed topics out of the assessment.
    pub hide_internal_topics: bool,

    /// Topic name prefixes excluded before any check runs.
    pub hide_topic_prefixes: StringSetSource,

    /// If non-empty, only these topics can be reported.
    pub allow_list: StringSetSource,

    /// Topics that are never reported.
    pub disallow_list: StringSetSource,

    /// Checks to bypass.
    pub skip: Vec<Stage>,

    /// Extra attempts for a failing partition lookup before the run aborts.
    pub lookup_retries: u32,

    /// Delay before the first retry; doubled on every further attempt.
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,

    /// Upper bound on in-flight partition lookups.
    pub max_concurrent_lookups: usize,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            production_assessment_time_ms: 30_000,
            idle_minutes: 0,
            hide_internal_topics: false,
            hide_topic_prefixes: StringSetSource::default(),
            allow_list: StringSetSource::default(),
            disallow_list: StringSetSource::default(),
            skip: Vec::new(),
            lookup_retries: 0,
            retry_backoff: Duration::from_millis(200),
            max_concurrent_lookups: 16,
        }
    }
}

impl AssessmentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_minutes < 0 {
            return Err(ConfigError::InvalidValue {
                field: "assessment.idle_minutes",
                reason: format!("must not be negative, got {}", self.idle_minutes),
            });
        }

        if self.idle_minutes == 0 && self.production_assessment_time_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "assessment.production_assessment_time_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.max_concurrent_lookups == 0 {
            return Err(ConfigError::InvalidValue {
                field: "assessment.max_concurrent_lookups",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// The production check mode. `idle_minutes == 0` selects the sampling
    /// window.
    pub fn production_mode(&self) -> ProductionMode {
        if self.idle_minutes > 0 {
            ProductionMode::IdleSince {
                minutes: self.idle_minutes as u64,
            }
        } else {
            ProductionMode::SamplingWindow(Duration::from_millis(
                self.production_assessment_time_ms,
            ))
        }
    }

    pub fn skip_set(&self) -> BTreeSet<Stage> {
        self.skip.iter().copied().collect()
    }

    /// Resolve the allow, disallow and prefix sources.
    pub fn filter_lists(&self) -> Result<FilterLists, ConfigError> {
        Ok(FilterLists {
            allow: self.allow_list.resolve()?,
            disallow: self.disallow_list.resolve()?,
            hidden_prefixes: self.hide_topic_prefixes.resolve()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_thirty_second_sampling_window() {
        let config = AssessmentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.production_mode(),
            ProductionMode::SamplingWindow(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_positive_idle_minutes_selects_idle_since() {
        let config = AssessmentConfig {
            idle_minutes: 90,
            ..Default::default()
        };
        assert_eq!(
            config.production_mode(),
            ProductionMode::IdleSince { minutes: 90 }
        );
    }

    #[test]
    fn test_negative_idle_minutes_is_invalid() {
        let config = AssessmentConfig {
            idle_minutes: -5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "assessment.idle_minutes",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_concurrency_is_invalid() {
        let config = AssessmentConfig {
            max_concurrent_lookups: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stage_parsing_accepts_uppercase() {
        assert_eq!("PRODUCTION".parse::<Stage>().unwrap(), Stage::Production);
        assert_eq!(" storage ".parse::<Stage>().unwrap(), Stage::Storage);
        assert!("lag".parse::<Stage>().is_err());
    }

    #[test]
    fn test_skip_set_deduplicates() {
        let config = AssessmentConfig {
            skip: vec![Stage::Storage, Stage::Consumption, Stage::Storage],
            ..Default::default()
        };
        let skip = config.skip_set();
        assert_eq!(skip.len(), 2);
        assert!(skip.contains(&Stage::Consumption));
        assert!(!skip.contains(&Stage::Production));
    }

    #[test]
    fn test_filter_lists_resolve_inline_sources() {
        let config = AssessmentConfig {
            allow_list: "a,b".into(),
            disallow_list: "b".into(),
            hide_topic_prefixes: "tmp_".into(),
            ..Default::default()
        };
        let lists = config.filter_lists().unwrap();
        assert_eq!(lists.allow.len(), 2);
        assert!(lists.disallow.contains("b"));
        assert!(lists.hidden_prefixes.contains("tmp_"));
    }
}
