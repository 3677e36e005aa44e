//! Topic inventory: the initial working set of a run.

use common::config::FilterLists;

use crate::cluster::ClusterAdmin;
use crate::error::DetectorError;
use crate::model::{TopicMetadata, TopicPartitionMap};

/// Which topics the inventory keeps.
#[derive(Clone, Copy, Debug)]
pub struct InventoryRules<'a> {
    pub hide_internal: bool,
    pub lists: &'a FilterLists,
}

impl InventoryRules<'_> {
    pub fn admits(&self, topic: &TopicMetadata) -> bool {
        if self.hide_internal && topic.internal {
            return false;
        }
        if has_hidden_prefix(&topic.name, self.lists) {
            return false;
        }
        if !self.lists.allow.is_empty() && !self.lists.allow.contains(&topic.name) {
            return false;
        }
        !self.lists.disallow.contains(&topic.name)
    }
}

pub(crate) fn has_hidden_prefix(topic: &str, lists: &FilterLists) -> bool {
    lists
        .hidden_prefixes
        .iter()
        .any(|prefix| topic.starts_with(prefix.as_str()))
}

/// List every topic in cluster metadata and keep those the rules admit.
/// Any failure here aborts the run.
pub async fn fetch_inventory(
    cluster: &dyn ClusterAdmin,
    rules: InventoryRules<'_>,
) -> Result<TopicPartitionMap, DetectorError> {
    let topics = cluster
        .list_topics()
        .await
        .map_err(DetectorError::Inventory)?;
    let listed = topics.len();

    let inventory: TopicPartitionMap = topics
        .into_iter()
        .filter(|topic| {
            let keep = rules.admits(topic);
            if !keep {
                tracing::trace!(topic = %topic.name, "Excluded from inventory");
            }
            keep
        })
        .map(|topic| (topic.name, topic.partitions))
        .collect();

    tracing::debug!(
        listed,
        kept = inventory.len(),
        partitions = inventory.partition_count(),
        "Fetched topic inventory"
    );

    Ok(inventory)
}
