use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use common::config::{ProductionMode, Stage};

use super::TopicFilter;
use crate::cluster::{ClusterAdmin, ClusterError};
use crate::error::DetectorError;
use crate::lookup::{LookupPolicy, for_each_partition};
use crate::model::{PartitionId, TopicPartitionMap};

/// Removes topics that are still being written to.
pub struct ProductionFilter {
    mode: ProductionMode,
    policy: LookupPolicy,
}

impl ProductionFilter {
    pub fn new(mode: ProductionMode, policy: LookupPolicy) -> Self {
        Self { mode, policy }
    }

    pub fn mode(&self) -> ProductionMode {
        self.mode
    }

    async fn high_watermarks<'a>(
        &self,
        cluster: &dyn ClusterAdmin,
        topics: &'a TopicPartitionMap,
    ) -> Result<BTreeMap<(&'a str, PartitionId), i64>, DetectorError> {
        let snapshot = for_each_partition(topics, &self.policy, |topic, partition| async move {
            cluster
                .fetch_watermarks(topic, partition)
                .await
                .map(|w| w.high)
        })
        .await?;

        Ok(snapshot
            .into_iter()
            .map(|(topic, partition, high)| ((topic, partition), high))
            .collect())
    }

    /// Topics whose high-water-mark moved on any partition during `window`.
    async fn sample(
        &self,
        cluster: &dyn ClusterAdmin,
        topics: &TopicPartitionMap,
        window: Duration,
    ) -> Result<BTreeSet<String>, DetectorError> {
        let before = self.high_watermarks(cluster, topics).await?;

        tracing::info!(
            topics = topics.len(),
            window = ?window,
            "Sampling production"
        );
        tokio::time::sleep(window).await;

        let after = self.high_watermarks(cluster, topics).await?;

        let mut active = BTreeSet::new();
        for ((topic, partition), high) in after {
            if before.get(&(topic, partition)) != Some(&high) {
                tracing::debug!(topic, partition, high, "Observed production");
                active.insert(topic.to_string());
            }
        }
        Ok(active)
    }

    /// Topics with at least one message written after `cutoff` on any
    /// partition.
    async fn produced_since(
        &self,
        cluster: &dyn ClusterAdmin,
        topics: &TopicPartitionMap,
        cutoff: DateTime<Utc>,
    ) -> Result<BTreeSet<String>, DetectorError> {
        let cutoff_ms = cutoff.timestamp_millis();

        let lookups = for_each_partition(topics, &self.policy, |topic, partition| async move {
            let Some(offset) = cluster.offset_for_time(topic, partition, cutoff_ms).await? else {
                return Ok::<_, ClusterError>(false);
            };
            let watermarks = cluster.fetch_watermarks(topic, partition).await?;
            Ok(offset < watermarks.high)
        })
        .await?;

        Ok(lookups
            .into_iter()
            .filter(|(_, _, produced)| *produced)
            .map(|(topic, _, _)| topic.to_string())
            .collect())
    }
}

/// `now` minus `minutes`, never earlier than the Unix epoch. Negative
/// timestamps are sentinel values in the offset lookup protocol.
fn idle_cutoff(now: DateTime<Utc>, minutes: u64) -> DateTime<Utc> {
    let epoch = DateTime::<Utc>::UNIX_EPOCH;
    i64::try_from(minutes)
        .ok()
        .and_then(TimeDelta::try_minutes)
        .and_then(|lookback| now.checked_sub_signed(lookback))
        .map_or(epoch, |cutoff| cutoff.max(epoch))
}

#[async_trait]
impl TopicFilter for ProductionFilter {
    fn stage(&self) -> Stage {
        Stage::Production
    }

    async fn find_active(
        &self,
        cluster: &dyn ClusterAdmin,
        topics: &TopicPartitionMap,
    ) -> Result<BTreeSet<String>, DetectorError> {
        if topics.is_empty() {
            return Ok(BTreeSet::new());
        }

        match self.mode {
            ProductionMode::SamplingWindow(window) => self.sample(cluster, topics, window).await,
            ProductionMode::IdleSince { minutes } => {
                let cutoff = idle_cutoff(Utc::now(), minutes);
                tracing::debug!(%cutoff, "Looking up offsets by timestamp");
                self.produced_since(cluster, topics, cutoff).await
            }
        }
    }
}
