use std::fs;

use common::config::{AssessmentConfig, Stage};
use detector::testing::FakeCluster;
use detector::{DetectionSettings, DetectorError, IdleTopicDetector, ReportWriter};

#[tokio::test]
async fn test_detection_run_writes_sorted_report() {
    let cluster = FakeCluster::new()
        .with_topic("orders", 3)
        .with_topic("audit", 1)
        .with_topic("payments", 2)
        .with_committed_offset("billing", "payments", 0, 17)
        .with_topic("tmp_scratch", 1);

    let config = AssessmentConfig {
        idle_minutes: 30,
        hide_topic_prefixes: "tmp_".into(),
        ..Default::default()
    };
    let settings = DetectionSettings::from_config(&config).unwrap();

    let report = IdleTopicDetector::new(cluster, settings)
        .run()
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idleTopics.txt");
    let written = ReportWriter::new(&path).write(&report.candidates).unwrap();

    assert_eq!(written, path.canonicalize().unwrap());
    assert_eq!(fs::read_to_string(&path).unwrap(), "audit\norders\n");
    assert_eq!(report.partition_count, 4);
}

#[tokio::test]
async fn test_failed_lookup_aborts_run() {
    let cluster = FakeCluster::new()
        .with_topic("orders", 1)
        .failing_lookups("orders", 0, 1);
    let config = AssessmentConfig {
        idle_minutes: 30,
        skip: vec![Stage::Production, Stage::Consumption],
        ..Default::default()
    };
    let settings = DetectionSettings::from_config(&config).unwrap();

    let result = IdleTopicDetector::new(cluster, settings).run().await;

    match result {
        Err(DetectorError::PartitionLookup {
            topic,
            partition,
            attempts,
            ..
        }) => {
            assert_eq!(topic, "orders");
            assert_eq!(partition, 0);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected a partition lookup failure, got {other:?}"),
    }
}
