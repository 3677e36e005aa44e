//! Working sets threaded through the detection pipeline.

use std::collections::{BTreeMap, BTreeSet};

pub type PartitionId = i32;

/// Topics still under consideration, each with its sorted partition ids.
///
/// Stages never remove entries themselves; they report active topics and the
/// pipeline calls [`TopicPartitionMap::remove_topics`], so the map can only
/// shrink over a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicPartitionMap {
    topics: BTreeMap<String, Vec<PartitionId>>,
}

impl TopicPartitionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, topic: impl Into<String>, mut partitions: Vec<PartitionId>) {
        partitions.sort_unstable();
        partitions.dedup();
        self.topics.insert(topic.into(), partitions);
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn partitions(&self, topic: &str) -> Option<&[PartitionId]> {
        self.topics.get(topic).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Total number of partitions across all topics.
    pub fn partition_count(&self) -> usize {
        self.topics.values().map(Vec::len).sum()
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> + '_ {
        self.topics.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PartitionId])> + '_ {
        self.topics
            .iter()
            .map(|(topic, partitions)| (topic.as_str(), partitions.as_slice()))
    }

    /// Every (topic, partition) pair, in topic then partition order.
    pub fn topic_partitions(&self) -> impl Iterator<Item = (&str, PartitionId)> + '_ {
        self.iter().flat_map(|(topic, partitions)| {
            partitions.iter().map(move |partition| (topic, *partition))
        })
    }

    /// Drop the given topics, returning how many were present.
    pub fn remove_topics(&mut self, topics: &BTreeSet<String>) -> usize {
        let before = self.topics.len();
        self.topics.retain(|topic, _| !topics.contains(topic));
        before - self.topics.len()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &[PartitionId]) -> bool) {
        self.topics
            .retain(|topic, partitions| keep(topic.as_str(), partitions.as_slice()));
    }
}

impl FromIterator<(String, Vec<PartitionId>)> for TopicPartitionMap {
    fn from_iter<I: IntoIterator<Item = (String, Vec<PartitionId>)>>(iter: I) -> Self {
        let mut map = TopicPartitionMap::new();
        for (topic, partitions) in iter {
            map.insert(topic, partitions);
        }
        map
    }
}

/// Final report content: candidate topics and their partition counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteCandidates {
    topics: BTreeMap<String, usize>,
}

impl DeleteCandidates {
    pub(crate) fn insert(&mut self, topic: impl Into<String>, partitions: usize) {
        self.topics.insert(topic.into(), partitions);
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Candidate names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.topics.keys().map(String::as_str)
    }

    pub fn partition_count(&self) -> usize {
        self.topics.values().sum()
    }
}

/// Metadata for one topic as reported by the cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicMetadata {
    pub name: String,
    pub partitions: Vec<PartitionId>,
    pub internal: bool,
}

/// Low and high watermark offsets of a partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Watermarks {
    /// Earliest retained offset.
    pub low: i64,
    /// Offset of the next message to be written.
    pub high: i64,
}

impl Watermarks {
    pub fn new(low: i64, high: i64) -> Self {
        Self { low, high }
    }

    pub fn holds_data(&self) -> bool {
        self.high > self.low
    }
}

/// A committed offset held by a consumer group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedOffset {
    pub topic: String,
    pub partition: PartitionId,
    pub offset: i64,
}

/// Committed offsets of one consumer group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupOffsets {
    pub group: String,
    pub offsets: Vec<CommittedOffset>,
}
