//! rdkafka-backed cluster sessions.
//!
//! librdkafka's metadata and offset calls block the calling thread, so every
//! request runs on the blocking pool via `spawn_blocking`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::{Offset, TopicPartitionList};

use common::config::KafkaConfig;

use crate::cluster::{ClusterAdmin, ClusterConnector, ClusterError};
use crate::model::{
    CommittedOffset, GroupOffsets, PartitionId, TopicMetadata, TopicPartitionMap, Watermarks,
};

/// Topics the broker itself flags as internal. librdkafka metadata carries no
/// internal flag, so the name decides.
pub const INTERNAL_TOPICS: [&str; 3] = [
    "__consumer_offsets",
    "__transaction_state",
    "__share_group_state",
];

pub fn is_internal_topic(name: &str) -> bool {
    INTERNAL_TOPICS.contains(&name)
}

/// Creates [`KafkaCluster`] sessions from the connection settings.
#[derive(Clone)]
pub struct KafkaConnector {
    client_config: ClientConfig,
    timeout: Duration,
    max_concurrency: usize,
}

const DEFAULT_MAX_CONCURRENCY: usize = 16;

impl KafkaConnector {
    pub fn new(config: &KafkaConfig) -> Self {
        let mut client_config = ClientConfig::new();
        for (key, value) in config.client_properties() {
            client_config.set(key, value);
        }
        client_config
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false");

        Self {
            client_config,
            timeout: config.request_timeout,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Cap on consumer-group offset fetches in flight per session.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn client_config(&self) -> &ClientConfig {
        &self.client_config
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

impl ClusterConnector for KafkaConnector {
    fn connect(&self) -> Result<Box<dyn ClusterAdmin>, ClusterError> {
        let cluster = KafkaCluster::new(self.client_config.clone(), self.timeout)?
            .with_max_concurrency(self.max_concurrency);
        Ok(Box::new(cluster))
    }
}

/// One session against the cluster. Dropping it closes the client.
pub struct KafkaCluster {
    consumer: Arc<BaseConsumer>,
    client_config: ClientConfig,
    timeout: Duration,
    max_concurrency: usize,
}

impl KafkaCluster {
    pub fn new(client_config: ClientConfig, timeout: Duration) -> Result<Self, ClusterError> {
        let consumer: BaseConsumer = client_config
            .create()
            .map_err(|e| ClusterError::Client(e.to_string()))?;

        Ok(Self {
            consumer: Arc::new(consumer),
            client_config,
            timeout,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        })
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }
}

/// Committed offsets of one group for `partitions`. OffsetFetch needs a
/// client bound to the group; it never joins.
fn fetch_committed(
    client_config: &ClientConfig,
    group: String,
    partitions: &TopicPartitionList,
    timeout: Duration,
) -> Result<GroupOffsets, ClusterError> {
    let group_consumer: BaseConsumer = client_config
        .clone()
        .set("group.id", &group)
        .create()
        .map_err(|e| ClusterError::Client(e.to_string()))?;

    let committed = group_consumer
        .committed_offsets(partitions.clone(), timeout)
        .map_err(|e| ClusterError::ConsumerGroups(format!("group {group}: {e}")))?;

    let offsets = committed
        .elements()
        .iter()
        .filter_map(|elem| match elem.offset() {
            Offset::Offset(offset) => Some(CommittedOffset {
                topic: elem.topic().to_string(),
                partition: elem.partition(),
                offset,
            }),
            _ => None,
        })
        .collect();

    Ok(GroupOffsets { group, offsets })
}

async fn blocking<T, F>(call: F) -> Result<T, ClusterError>
where
    F: FnOnce() -> Result<T, ClusterError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ClusterError::Task(e.to_string()))?
}

#[async_trait]
impl ClusterAdmin for KafkaCluster {
    async fn list_topics(&self) -> Result<Vec<TopicMetadata>, ClusterError> {
        let consumer = Arc::clone(&self.consumer);
        let timeout = self.timeout;

        blocking(move || {
            let metadata = consumer
                .fetch_metadata(None, timeout)
                .map_err(|e| ClusterError::Metadata(e.to_string()))?;

            metadata
                .topics()
                .iter()
                .map(|topic| {
                    if let Some(err) = topic.error() {
                        return Err(ClusterError::Metadata(format!(
                            "topic {} reported {err:?}",
                            topic.name()
                        )));
                    }
                    Ok(TopicMetadata {
                        name: topic.name().to_string(),
                        partitions: topic.partitions().iter().map(|p| p.id()).collect(),
                        internal: is_internal_topic(topic.name()),
                    })
                })
                .collect()
        })
        .await
    }

    async fn fetch_watermarks(
        &self,
        topic: &str,
        partition: PartitionId,
    ) -> Result<Watermarks, ClusterError> {
        let consumer = Arc::clone(&self.consumer);
        let timeout = self.timeout;
        let topic = topic.to_string();

        blocking(move || {
            let (low, high) = consumer
                .fetch_watermarks(&topic, partition, timeout)
                .map_err(|e| ClusterError::Offsets(format!("{topic}-{partition}: {e}")))?;
            Ok(Watermarks::new(low, high))
        })
        .await
    }

    async fn offset_for_time(
        &self,
        topic: &str,
        partition: PartitionId,
        timestamp_ms: i64,
    ) -> Result<Option<i64>, ClusterError> {
        let consumer = Arc::clone(&self.consumer);
        let timeout = self.timeout;
        let topic = topic.to_string();

        blocking(move || {
            let mut request = TopicPartitionList::new();
            request
                .add_partition_offset(&topic, partition, Offset::Offset(timestamp_ms))
                .map_err(|e| ClusterError::Offsets(e.to_string()))?;

            let response = consumer
                .offsets_for_times(request, timeout)
                .map_err(|e| ClusterError::Offsets(format!("{topic}-{partition}: {e}")))?;

            let elem = response.find_partition(&topic, partition).ok_or_else(|| {
                ClusterError::Offsets(format!("{topic}-{partition}: missing from response"))
            })?;
            elem.error()
                .map_err(|e| ClusterError::Offsets(format!("{topic}-{partition}: {e}")))?;

            match elem.offset() {
                Offset::Offset(offset) => Ok(Some(offset)),
                // No message at or after the timestamp
                Offset::End => Ok(None),
                other => Err(ClusterError::Offsets(format!(
                    "{topic}-{partition}: unexpected offset {other:?}"
                ))),
            }
        })
        .await
    }

    async fn group_offsets(
        &self,
        scope: &TopicPartitionMap,
    ) -> Result<Vec<GroupOffsets>, ClusterError> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }

        let consumer = Arc::clone(&self.consumer);
        let timeout = self.timeout;

        let mut partitions = TopicPartitionList::new();
        for (topic, partition) in scope.topic_partitions() {
            partitions.add_partition(topic, partition);
        }

        let names: Vec<String> = blocking(move || {
            let groups = consumer
                .fetch_group_list(None, timeout)
                .map_err(|e| ClusterError::ConsumerGroups(e.to_string()))?;
            Ok(groups
                .groups()
                .iter()
                .map(|group| group.name().to_string())
                .collect())
        })
        .await?;

        let pending: Vec<_> = names
            .into_iter()
            .map(|group| {
                let client_config = self.client_config.clone();
                let partitions = partitions.clone();
                blocking(move || {
                    fetch_committed(&client_config, group, &partitions, timeout)
                })
            })
            .collect();

        stream::iter(pending)
            .buffer_unordered(self.max_concurrency)
            .try_collect()
            .await
    }
}
