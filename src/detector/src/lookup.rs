//! Bounded per-partition fan-out with retries.

use std::future::Future;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt, stream};

use crate::cluster::ClusterError;
use crate::error::DetectorError;
use crate::model::{PartitionId, TopicPartitionMap};

/// Concurrency and retry limits for partition lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupPolicy {
    pub max_concurrency: usize,
    /// Extra attempts after the first failure. Zero aborts immediately.
    pub retries: u32,
    pub retry_backoff: Duration,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            retries: 0,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

impl LookupPolicy {
    /// Run `lookup` for one partition until it succeeds or retries run out.
    pub async fn attempt<T, F, Fut>(
        &self,
        topic: &str,
        partition: PartitionId,
        mut lookup: F,
    ) -> Result<T, DetectorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClusterError>>,
    {
        let mut attempts = 0u32;
        let mut backoff = self.retry_backoff;

        loop {
            attempts += 1;
            match lookup().await {
                Ok(value) => return Ok(value),
                Err(source) if attempts > self.retries => {
                    return Err(DetectorError::PartitionLookup {
                        topic: topic.to_string(),
                        partition,
                        attempts,
                        source,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        topic,
                        partition,
                        attempt = attempts,
                        retry_in = ?backoff,
                        error = %e,
                        "Partition lookup failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
            }
        }
    }
}

/// Run `lookup` for every partition in `topics`, at most
/// `policy.max_concurrency` at a time. Results come back in completion order
/// tagged with their topic and partition. The first exhausted lookup fails
/// the whole call.
pub async fn for_each_partition<'a, T, F, Fut>(
    topics: &'a TopicPartitionMap,
    policy: &LookupPolicy,
    lookup: F,
) -> Result<Vec<(&'a str, PartitionId, T)>, DetectorError>
where
    F: Fn(&'a str, PartitionId) -> Fut,
    Fut: Future<Output = Result<T, ClusterError>>,
{
    let lookup = &lookup;
    // Built up front: a borrowing closure stored in the stream makes the
    // callers' `#[async_trait]` futures fail the `Send` bound.
    let pending: Vec<_> = topics
        .topic_partitions()
        .map(|(topic, partition)| async move {
            let value = policy
                .attempt(topic, partition, || lookup(topic, partition))
                .await?;
            Ok::<_, DetectorError>((topic, partition, value))
        })
        .collect();

    stream::iter(pending)
        .buffer_unordered(policy.max_concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterAdmin, MockClusterAdmin};
    use crate::model::Watermarks;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn topics() -> TopicPartitionMap {
        [
            ("orders".to_string(), vec![0, 1]),
            ("audit".to_string(), vec![0]),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_visits_every_partition_once() {
        let map = topics();
        let mut results = for_each_partition(&map, &LookupPolicy::default(), |topic, partition| {
            async move { Ok(format!("{topic}-{partition}")) }
        })
        .await
        .unwrap();
        results.sort();

        let labels: Vec<_> = results.into_iter().map(|(_, _, label)| label).collect();
        assert_eq!(labels, vec!["audit-0", "orders-0", "orders-1"]);
    }

    fn require_send<T: Send>(value: T) -> T {
        value
    }

    #[tokio::test]
    async fn test_fan_out_over_cluster_session_is_send() {
        let mut cluster = MockClusterAdmin::new();
        cluster
            .expect_fetch_watermarks()
            .times(3)
            .returning(|_, partition| Ok(Watermarks::new(0, i64::from(partition))));
        let cluster: &dyn ClusterAdmin = &cluster;
        let map = topics();
        let policy = LookupPolicy {
            max_concurrency: 2,
            ..Default::default()
        };

        let results = require_send(for_each_partition(&map, &policy, |topic, partition| {
            cluster.fetch_watermarks(topic, partition)
        }))
        .await
        .unwrap();

        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_fails_on_first_error() {
        let calls = AtomicU32::new(0);
        let policy = LookupPolicy::default();

        let result: Result<(), _> = policy
            .attempt("orders", 3, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ClusterError::Offsets("broker went away".to_string())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match result {
            Err(DetectorError::PartitionLookup {
                topic,
                partition,
                attempts,
                ..
            }) => {
                assert_eq!(topic, "orders");
                assert_eq!(partition, 3);
                assert_eq!(attempts, 1);
            }
            other => panic!("expected PartitionLookup error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let calls = AtomicU32::new(0);
        let policy = LookupPolicy {
            retries: 2,
            ..Default::default()
        };

        let value = policy
            .attempt("orders", 0, || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err(ClusterError::Offsets("timed out".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_reports_attempts() {
        let policy = LookupPolicy {
            retries: 1,
            ..Default::default()
        };

        let result: Result<(), _> = policy
            .attempt("orders", 0, || async {
                Err(ClusterError::Offsets("timed out".to_string()))
            })
            .await;

        assert!(matches!(
            result,
            Err(DetectorError::PartitionLookup { attempts: 2, .. })
        ));
    }
}
