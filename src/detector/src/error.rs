use std::path::PathBuf;

use crate::cluster::ClusterError;
use crate::model::PartitionId;

/// Errors that abort a detection run. No report is written after any of them.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("failed to open a cluster session for the {stage} stage")]
    Connect {
        stage: &'static str,
        #[source]
        source: ClusterError,
    },

    #[error("failed to fetch topic inventory")]
    Inventory(#[source] ClusterError),

    #[error("offset lookup for {topic}-{partition} failed after {attempts} attempt(s)")]
    PartitionLookup {
        topic: String,
        partition: PartitionId,
        attempts: u32,
        #[source]
        source: ClusterError,
    },

    #[error("failed to list consumer group offsets")]
    ConsumerGroups(#[source] ClusterError),

    #[error("failed to write report to {}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DetectorError {
    pub(crate) fn connect(stage: &'static str, source: ClusterError) -> Self {
        DetectorError::Connect { stage, source }
    }
}
