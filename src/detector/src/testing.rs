//! In-memory cluster for tests.
//!
//! [`FakeCluster`] holds topics, partition watermarks, production timestamps
//! and consumer group offsets. Clones share state, so a test can keep a handle
//! while the detector owns another and inspect it afterwards.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cluster::{ClusterAdmin, ClusterConnector, ClusterError};
use crate::model::{
    CommittedOffset, GroupOffsets, PartitionId, TopicMetadata, TopicPartitionMap, Watermarks,
};

#[derive(Clone, Debug, Default)]
struct FakePartition {
    low: i64,
    high: i64,
    last_produced: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default)]
struct FakeTopic {
    internal: bool,
    /// Every watermark read appends a message to each partition.
    producing: bool,
    partitions: BTreeMap<PartitionId, FakePartition>,
}

#[derive(Debug, Default)]
struct State {
    topics: BTreeMap<String, FakeTopic>,
    groups: BTreeMap<String, Vec<CommittedOffset>>,
    /// Remaining injected failures per partition.
    failures: BTreeMap<(String, PartitionId), u32>,
    refuse_connections: bool,
    connections: usize,
    lookups: usize,
}

#[derive(Clone, Debug, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<State>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an empty topic with partitions `0..partitions`.
    pub fn with_topic(self, name: &str, partitions: PartitionId) -> Self {
        self.insert_topic(name, partitions, false)
    }

    pub fn with_internal_topic(self, name: &str, partitions: PartitionId) -> Self {
        self.insert_topic(name, partitions, true)
    }

    fn insert_topic(self, name: &str, partitions: PartitionId, internal: bool) -> Self {
        let topic = FakeTopic {
            internal,
            producing: false,
            partitions: (0..partitions)
                .map(|id| (id, FakePartition::default()))
                .collect(),
        };
        self.state().topics.insert(name.to_string(), topic);
        self
    }

    /// Append `count` messages to a partition, the last one written at
    /// `produced_at`. Creates the partition if needed.
    pub fn with_messages(
        self,
        topic: &str,
        partition: PartitionId,
        count: i64,
        produced_at: DateTime<Utc>,
    ) -> Self {
        {
            let mut state = self.state();
            let entry = state
                .topics
                .entry(topic.to_string())
                .or_default()
                .partitions
                .entry(partition)
                .or_default();
            entry.high += count;
            entry.last_produced = Some(produced_at);
        }
        self
    }

    /// Drop every stored message of the topic, keeping its offsets.
    pub fn with_retention_applied(self, topic: &str) -> Self {
        if let Some(topic) = self.state().topics.get_mut(topic) {
            for partition in topic.partitions.values_mut() {
                partition.low = partition.high;
            }
        }
        self
    }

    /// Keep writing to the topic while the test runs: one message lands on
    /// every partition now and on every watermark read.
    pub fn producing(self, topic: &str) -> Self {
        if let Some(topic) = self.state().topics.get_mut(topic) {
            topic.producing = true;
            for partition in topic.partitions.values_mut() {
                partition.high += 1;
                partition.last_produced = Some(Utc::now());
            }
        }
        self
    }

    /// Record a committed offset for `group`.
    pub fn with_committed_offset(
        self,
        group: &str,
        topic: &str,
        partition: PartitionId,
        offset: i64,
    ) -> Self {
        self.state()
            .groups
            .entry(group.to_string())
            .or_default()
            .push(CommittedOffset {
                topic: topic.to_string(),
                partition,
                offset,
            });
        self
    }

    /// A consumer group with no committed offsets.
    pub fn with_empty_group(self, group: &str) -> Self {
        self.state().groups.entry(group.to_string()).or_default();
        self
    }

    /// Fail the next `times` lookups against one partition.
    pub fn failing_lookups(self, topic: &str, partition: PartitionId, times: u32) -> Self {
        self.state()
            .failures
            .insert((topic.to_string(), partition), times);
        self
    }

    pub fn refusing_connections(self) -> Self {
        self.state().refuse_connections = true;
        self
    }

    /// Sessions opened so far.
    pub fn connections(&self) -> usize {
        self.state().connections
    }

    /// Partition lookups served so far, failed ones included.
    pub fn lookups(&self) -> usize {
        self.state().lookups
    }

    fn partition<'s>(
        state: &'s mut State,
        topic: &str,
        partition: PartitionId,
    ) -> Result<(&'s mut FakePartition, bool), ClusterError> {
        state.lookups += 1;

        let key = (topic.to_string(), partition);
        if let Some(remaining) = state.failures.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ClusterError::Offsets(format!(
                    "{topic}-{partition}: request timed out"
                )));
            }
        }

        let fake_topic = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| ClusterError::Offsets(format!("unknown topic {topic}")))?;
        let producing = fake_topic.producing;
        let fake_partition = fake_topic.partitions.get_mut(&partition).ok_or_else(|| {
            ClusterError::Offsets(format!("unknown partition {topic}-{partition}"))
        })?;
        Ok((fake_partition, producing))
    }
}

#[async_trait]
impl ClusterAdmin for FakeCluster {
    async fn list_topics(&self) -> Result<Vec<TopicMetadata>, ClusterError> {
        Ok(self
            .state()
            .topics
            .iter()
            .map(|(name, topic)| TopicMetadata {
                name: name.clone(),
                partitions: topic.partitions.keys().copied().collect(),
                internal: topic.internal,
            })
            .collect())
    }

    async fn fetch_watermarks(
        &self,
        topic: &str,
        partition: PartitionId,
    ) -> Result<Watermarks, ClusterError> {
        let mut state = self.state();
        let (fake, producing) = Self::partition(&mut state, topic, partition)?;
        if producing {
            fake.high += 1;
            fake.last_produced = Some(Utc::now());
        }
        Ok(Watermarks::new(fake.low, fake.high))
    }

    async fn offset_for_time(
        &self,
        topic: &str,
        partition: PartitionId,
        timestamp_ms: i64,
    ) -> Result<Option<i64>, ClusterError> {
        let mut state = self.state();
        let (fake, _) = Self::partition(&mut state, topic, partition)?;
        let offset = match fake.last_produced {
            Some(at) if at.timestamp_millis() >= timestamp_ms && fake.high > 0 => {
                Some(fake.high - 1)
            }
            _ => None,
        };
        Ok(offset)
    }

    async fn group_offsets(
        &self,
        scope: &TopicPartitionMap,
    ) -> Result<Vec<GroupOffsets>, ClusterError> {
        let in_scope = |committed: &CommittedOffset| {
            scope
                .partitions(&committed.topic)
                .is_some_and(|partitions| partitions.contains(&committed.partition))
        };

        Ok(self
            .state()
            .groups
            .iter()
            .map(|(group, offsets)| GroupOffsets {
                group: group.clone(),
                offsets: offsets.iter().filter(|c| in_scope(c)).cloned().collect(),
            })
            .collect())
    }
}

impl ClusterConnector for FakeCluster {
    fn connect(&self) -> Result<Box<dyn ClusterAdmin>, ClusterError> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(ClusterError::Client("connection refused".to_string()));
        }
        state.connections += 1;
        Ok(Box::new(self.clone()))
    }
}
