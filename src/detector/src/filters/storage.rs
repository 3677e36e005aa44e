use std::collections::BTreeSet;

use async_trait::async_trait;
use common::config::Stage;

use super::TopicFilter;
use crate::cluster::ClusterAdmin;
use crate::error::DetectorError;
use crate::lookup::{LookupPolicy, for_each_partition};
use crate::model::TopicPartitionMap;

/// Removes topics that still hold messages on any partition.
pub struct StorageFilter {
    policy: LookupPolicy,
}

impl StorageFilter {
    pub fn new(policy: LookupPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl TopicFilter for StorageFilter {
    fn stage(&self) -> Stage {
        Stage::Storage
    }

    async fn find_active(
        &self,
        cluster: &dyn ClusterAdmin,
        topics: &TopicPartitionMap,
    ) -> Result<BTreeSet<String>, DetectorError> {
        let watermarks = for_each_partition(topics, &self.policy, |topic, partition| {
            cluster.fetch_watermarks(topic, partition)
        })
        .await?;

        Ok(watermarks
            .into_iter()
            .filter(|(_, _, watermarks)| watermarks.holds_data())
            .map(|(topic, partition, watermarks)| {
                tracing::trace!(
                    topic,
                    partition,
                    low = watermarks.low,
                    high = watermarks.high,
                    "Partition holds data"
                );
                topic.to_string()
            })
            .collect())
    }
}
