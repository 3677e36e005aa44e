use std::collections::BTreeSet;

use common::config::{AssessmentConfig, ConfigError, FilterLists, ProductionMode, Stage};

use crate::lookup::LookupPolicy;

/// Everything a detection run needs besides the cluster, resolved from
/// configuration up front so list files are read before any network call.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionSettings {
    pub production_mode: ProductionMode,
    pub skip: BTreeSet<Stage>,
    pub hide_internal_topics: bool,
    pub lists: FilterLists,
    pub lookup: LookupPolicy,
}

impl DetectionSettings {
    pub fn from_config(config: &AssessmentConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            production_mode: config.production_mode(),
            skip: config.skip_set(),
            hide_internal_topics: config.hide_internal_topics,
            lists: config.filter_lists()?,
            lookup: LookupPolicy {
                max_concurrency: config.max_concurrent_lookups,
                retries: config.lookup_retries,
                retry_backoff: config.retry_backoff,
            },
        })
    }

    pub fn skips(&self, stage: Stage) -> bool {
        self.skip.contains(&stage)
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        let config = AssessmentConfig::default();
        Self {
            production_mode: config.production_mode(),
            skip: BTreeSet::new(),
            hide_internal_topics: config.hide_internal_topics,
            lists: FilterLists::default(),
            lookup: LookupPolicy::default(),
        }
    }
}
