//! The cluster operations the detector relies on.
//!
//! [`ClusterAdmin`] is the seam between the idleness checks and the broker:
//! the rdkafka-backed [`crate::kafka::KafkaCluster`] implements it for real
//! runs and [`crate::testing::FakeCluster`] for tests. A
//! [`ClusterConnector`] hands out one session per pipeline stage.

use async_trait::async_trait;

use crate::model::{GroupOffsets, PartitionId, TopicMetadata, TopicPartitionMap, Watermarks};

/// Errors raised by a cluster session.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("failed to create Kafka client: {0}")]
    Client(String),

    #[error("metadata request failed: {0}")]
    Metadata(String),

    #[error("offset request failed: {0}")]
    Offsets(String),

    #[error("consumer group request failed: {0}")]
    ConsumerGroups(String),

    #[error("blocking client call did not complete: {0}")]
    Task(String),
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ClusterAdmin: Send + Sync {
    /// Every topic visible in cluster metadata.
    async fn list_topics(&self) -> Result<Vec<TopicMetadata>, ClusterError>;

    /// Low and high watermarks of one partition.
    async fn fetch_watermarks(
        &self,
        topic: &str,
        partition: PartitionId,
    ) -> Result<Watermarks, ClusterError>;

    /// Offset of the first message at or after `timestamp_ms`, or `None` if
    /// the partition holds no such message.
    async fn offset_for_time(
        &self,
        topic: &str,
        partition: PartitionId,
        timestamp_ms: i64,
    ) -> Result<Option<i64>, ClusterError>;

    /// Committed offsets of every consumer group, restricted to the
    /// partitions in `scope`.
    async fn group_offsets(
        &self,
        scope: &TopicPartitionMap,
    ) -> Result<Vec<GroupOffsets>, ClusterError>;
}

/// Opens cluster sessions. Each stage gets its own and drops it when done.
pub trait ClusterConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn ClusterAdmin>, ClusterError>;
}
