//! Idle topic detection for Kafka clusters.
//!
//! [`IdleTopicDetector`] lists the cluster's topics, removes every topic that
//! shows production, consumption or stored data, and reduces the survivors to
//! a list of [`DeleteCandidates`]. It never deletes anything; the caller
//! decides what to do with the result, typically via [`ReportWriter`].

pub mod cluster;
pub mod error;
pub mod filters;
pub mod inventory;
pub mod kafka;
pub mod lookup;
pub mod model;
pub mod pipeline;
pub mod reducer;
pub mod report;
pub mod settings;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cluster::{ClusterAdmin, ClusterConnector, ClusterError};
pub use error::DetectorError;
pub use kafka::KafkaConnector;
pub use lookup::LookupPolicy;
pub use model::{DeleteCandidates, PartitionId, TopicPartitionMap};
pub use pipeline::{DetectionReport, IdleTopicDetector, StageSummary};
pub use report::ReportWriter;
pub use settings::DetectionSettings;
