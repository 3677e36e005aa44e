use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use common::config::Stage;

use super::TopicFilter;
use crate::cluster::ClusterAdmin;
use crate::error::DetectorError;
use crate::model::TopicPartitionMap;

/// Removes topics that any consumer group has committed offsets for.
#[derive(Debug, Default)]
pub struct ConsumptionFilter;

#[async_trait]
impl TopicFilter for ConsumptionFilter {
    fn stage(&self) -> Stage {
        Stage::Consumption
    }

    async fn find_active(
        &self,
        cluster: &dyn ClusterAdmin,
        topics: &TopicPartitionMap,
    ) -> Result<BTreeSet<String>, DetectorError> {
        if topics.is_empty() {
            return Ok(BTreeSet::new());
        }

        let groups = cluster
            .group_offsets(topics)
            .await
            .map_err(DetectorError::ConsumerGroups)?;

        // topic -> groups holding a committed offset on it
        let mut consumers: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for group in &groups {
            for committed in &group.offsets {
                if topics.contains(&committed.topic) {
                    consumers
                        .entry(committed.topic.as_str())
                        .or_default()
                        .insert(group.group.as_str());
                }
            }
        }

        tracing::debug!(
            groups = groups.len(),
            consumed_topics = consumers.len(),
            "Bucketed committed offsets"
        );

        Ok(consumers
            .into_iter()
            .map(|(topic, groups)| {
                tracing::trace!(topic, groups = ?groups, "Topic has consumers");
                topic.to_string()
            })
            .collect())
    }
}
