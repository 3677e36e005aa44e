//! The idleness checks.
//!
//! A filter inspects the topics still under consideration and returns the
//! ones it proves active. It never touches the map; the pipeline removes the
//! returned topics once the filter has finished.

use std::collections::BTreeSet;

use async_trait::async_trait;
use common::config::Stage;

use crate::cluster::ClusterAdmin;
use crate::error::DetectorError;
use crate::model::TopicPartitionMap;

mod consumption;
mod production;
mod storage;

pub use consumption::ConsumptionFilter;
pub use production::ProductionFilter;
pub use storage::StorageFilter;

#[async_trait]
pub trait TopicFilter: Send + Sync {
    fn stage(&self) -> Stage;

    /// Topics from `topics` that show activity for this stage.
    async fn find_active(
        &self,
        cluster: &dyn ClusterAdmin,
        topics: &TopicPartitionMap,
    ) -> Result<BTreeSet<String>, DetectorError>;
}
