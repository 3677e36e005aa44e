use common::config::FilterLists;

use crate::inventory::has_hidden_prefix;
use crate::model::{DeleteCandidates, TopicPartitionMap};

/// Turn the topics that survived every check into delete candidates.
///
/// A non-empty allow list keeps only listed topics; the disallow list and
/// hidden prefixes always exclude. A topic on both lists is excluded.
pub fn reduce(survivors: &TopicPartitionMap, lists: &FilterLists) -> DeleteCandidates {
    let mut candidates = DeleteCandidates::default();

    for (topic, partitions) in survivors.iter() {
        if !lists.allow.is_empty() && !lists.allow.contains(topic) {
            continue;
        }
        if lists.disallow.contains(topic) || has_hidden_prefix(topic, lists) {
            continue;
        }
        candidates.insert(topic, partitions.len());
    }

    candidates
}
