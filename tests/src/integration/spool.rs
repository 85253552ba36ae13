//! # Spool-Backed Round Trip
//!
//! Client and processor each open their own `SpoolQueueService` on the same
//! directory, the way separate processes on one host would.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use cq_01_client::{Client, ClientError};
    use serde_json::json;
    use shared_queue::{QueueService, SpoolQueueService};
    use shared_types::Status;

    use crate::fixtures::{client_options, demo_builder, Harness, WORK_QUEUE};

    async fn open(dir: &std::path::Path) -> Arc<dyn QueueService> {
        Arc::new(
            SpoolQueueService::open(dir)
                .await
                .unwrap()
                .with_poll_interval(Duration::from_millis(20)),
        )
    }

    #[tokio::test]
    async fn test_round_trip_across_spool_instances() {
        let dir = tempfile::tempdir().unwrap();
        let harness = Harness::start_on(open(dir.path()).await, demo_builder()).await;

        let client = Client::connect(open(dir.path()).await, WORK_QUEUE, client_options())
            .await
            .unwrap();
        let channel_dir = dir.path().join(client.reply_channel_name());
        assert!(channel_dir.is_dir());

        let reply = client.call("Ping", json!({ "item_id": 3 })).await.unwrap();
        assert_eq!(reply["item_id"], 3);

        let err = client.call("Unknown", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::Response(ref r) if r.status == Status::CommandNotFound));

        client.close().await.unwrap();
        assert!(!channel_dir.exists());

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_fails_without_work_queue() {
        let dir = tempfile::tempdir().unwrap();
        let err = Client::connect(open(dir.path()).await, "missing", client_options())
            .await
            .err()
            .expect("connect should fail");
        assert!(matches!(err, ClientError::Queue(ref e) if e.is_not_found()));
    }
}
