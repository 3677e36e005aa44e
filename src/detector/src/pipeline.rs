//! Detection run orchestration.
//!
//! A run moves through a fixed sequence of phases:
//!
//! 1. **Inventory**: list topics, dropping hidden, internal and unlisted ones
//! 2. **Production**: remove topics written to recently
//! 3. **Consumption**: remove topics with committed consumer offsets
//! 4. **Storage**: remove topics still holding messages
//! 5. **Reduce**: apply the allow, disallow and prefix rules
//!
//! Phases 2 to 4 can be skipped individually. Any error aborts the run and
//! nothing is returned, so a partial candidate list never reaches the report.

use std::time::Instant;

use common::config::Stage;

use crate::cluster::ClusterConnector;
use crate::error::DetectorError;
use crate::filters::{ConsumptionFilter, ProductionFilter, StorageFilter, TopicFilter};
use crate::inventory::{InventoryRules, fetch_inventory};
use crate::model::{DeleteCandidates, TopicPartitionMap};
use crate::reducer::reduce;
use crate::settings::DetectionSettings;

/// What one stage did to the working set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageSummary {
    pub stage: Stage,
    /// Topics under consideration when the stage started.
    pub evaluated: usize,
    /// Topics the stage proved active.
    pub removed: usize,
    pub skipped: bool,
}

/// Result of a detection run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectionReport {
    pub candidates: DeleteCandidates,
    /// Partitions across all candidates.
    pub partition_count: usize,
    /// Topics kept by the inventory.
    pub inventoried: usize,
    pub stages: Vec<StageSummary>,
}

impl DetectionReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageSummary> {
        self.stages.iter().find(|summary| summary.stage == stage)
    }
}

pub struct IdleTopicDetector<C> {
    connector: C,
    settings: DetectionSettings,
}

impl<C: ClusterConnector> IdleTopicDetector<C> {
    pub fn new(connector: C, settings: DetectionSettings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    fn filters(&self) -> Vec<Box<dyn TopicFilter>> {
        let policy = self.settings.lookup;
        vec![
            Box::new(ProductionFilter::new(self.settings.production_mode, policy)),
            Box::new(ConsumptionFilter),
            Box::new(StorageFilter::new(policy)),
        ]
    }

    pub async fn run(&self) -> Result<DetectionReport, DetectorError> {
        let started = Instant::now();
        let mut topics = self.inventory().await?;
        let inventoried = topics.len();

        let mut stages = Vec::with_capacity(Stage::ALL.len());
        for filter in self.filters() {
            stages.push(self.apply(filter.as_ref(), &mut topics).await?);
        }

        let candidates = reduce(&topics, &self.settings.lists);
        let partition_count = candidates.partition_count();

        tracing::info!(
            candidates = candidates.len(),
            partitions = partition_count,
            elapsed = ?started.elapsed(),
            "Detection complete"
        );

        Ok(DetectionReport {
            candidates,
            partition_count,
            inventoried,
            stages,
        })
    }

    async fn inventory(&self) -> Result<TopicPartitionMap, DetectorError> {
        let started = Instant::now();
        let cluster = self
            .connector
            .connect()
            .map_err(|e| DetectorError::connect("inventory", e))?;

        let rules = InventoryRules {
            hide_internal: self.settings.hide_internal_topics,
            lists: &self.settings.lists,
        };
        let topics = fetch_inventory(cluster.as_ref(), rules).await?;

        tracing::info!(
            stage = "inventory",
            topics = topics.len(),
            partitions = topics.partition_count(),
            elapsed = ?started.elapsed(),
            "Stage finished"
        );
        Ok(topics)
    }

    async fn apply(
        &self,
        filter: &dyn TopicFilter,
        topics: &mut TopicPartitionMap,
    ) -> Result<StageSummary, DetectorError> {
        let stage = filter.stage();
        let evaluated = topics.len();

        if self.settings.skips(stage) {
            tracing::info!(stage = %stage, topics = evaluated, "Stage skipped");
            return Ok(StageSummary {
                stage,
                evaluated,
                removed: 0,
                skipped: true,
            });
        }

        let started = Instant::now();
        let active = {
            let cluster = self
                .connector
                .connect()
                .map_err(|e| DetectorError::connect(stage.as_str(), e))?;
            filter.find_active(cluster.as_ref(), topics).await?
        };
        let removed = topics.remove_topics(&active);

        tracing::info!(
            stage = %stage,
            evaluated,
            removed,
            remaining = topics.len(),
            elapsed = ?started.elapsed(),
            "Stage finished"
        );

        Ok(StageSummary {
            stage,
            evaluated,
            removed,
            skipped: false,
        })
    }
}
